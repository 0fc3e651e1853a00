//! Persistence for users and listings.
//!
//! Every backend implements [`Store`]; the rest of the crate only ever holds
//! an `Arc<dyn Store>`, picked once at startup from [`StoreConfig`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::auth::repo_types::{NewUser, User};
use crate::config::{StoreBackend, StoreConfig};
use crate::listings::repo_types::{Listing, ListingStatus, NewListing, Tag};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The only error a store backend may surface. Infrastructure detail stays
/// inside `Storage` and is logged, never sent to callers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    /// The record breaks a schema constraint every backend enforces.
    #[error("{0}")]
    Invalid(String),

    #[error("storage failure")]
    Storage(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed query primitives over users and listings.
///
/// List operations return listings newest first by `created_at` (ties by id,
/// newest first). Reads never mutate.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, id: i32) -> StoreResult<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn get_all_listings(&self) -> StoreResult<Vec<Listing>>;

    async fn get_listings_by_status(&self, status: ListingStatus) -> StoreResult<Vec<Listing>>;

    async fn get_approved_listings(&self) -> StoreResult<Vec<Listing>> {
        self.get_listings_by_status(ListingStatus::Approved).await
    }

    /// Approved listings carrying `tag`.
    async fn get_listings_by_tag(&self, tag: Tag) -> StoreResult<Vec<Listing>>;

    /// Approved listings whose name or description contains `text`,
    /// ignoring case.
    async fn search_listings(&self, text: &str) -> StoreResult<Vec<Listing>>;

    async fn get_listing_by_id(&self, id: i32) -> StoreResult<Option<Listing>>;

    /// Inserts as `pending` with `created_at == updated_at`. Fails with
    /// [`StoreError::Invalid`] when `tags` is empty.
    async fn create_listing(&self, listing: NewListing) -> StoreResult<Listing>;

    /// Sets `status` and advances `updated_at`; nothing else is touched.
    async fn update_listing_status(
        &self,
        id: i32,
        status: ListingStatus,
    ) -> StoreResult<Option<Listing>>;

    /// Compare-and-set on `status`: moves listing `id` to `to` only while it
    /// still carries `from`, advancing `updated_at` like
    /// [`Store::update_listing_status`]. `Ok(None)` when the listing is missing
    /// or its status is no longer `from`.
    async fn transition_listing_status(
        &self,
        id: i32,
        from: ListingStatus,
        to: ListingStatus,
    ) -> StoreResult<Option<Listing>>;
}

pub(crate) fn check_new_listing(listing: &NewListing) -> StoreResult<()> {
    if listing.tags.is_empty() {
        return Err(StoreError::Invalid("a listing needs at least one tag".into()));
    }
    Ok(())
}

/// Builds the backend named by the config.
pub async fn connect(cfg: &StoreConfig) -> anyhow::Result<Arc<dyn Store>> {
    match cfg.backend {
        StoreBackend::Memory => {
            info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("postgres backend requires DATABASE_URL"))?;
            let store = PgStore::connect(
                url,
                cfg.max_connections,
                cfg.acquire_timeout,
                cfg.query_timeout,
            )
            .await?;
            store.migrate().await?;
            info!("using postgres store");
            Ok(Arc::new(store))
        }
    }
}
