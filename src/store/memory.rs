use std::collections::BTreeMap;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use super::{check_new_listing, Store, StoreError, StoreResult};
use crate::auth::repo_types::{NewUser, User};
use crate::listings::repo_types::{Listing, ListingStatus, NewListing, Tag};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    listings: BTreeMap<i32, Listing>,
    next_user_id: i32,
    next_listing_id: i32,
}

/// Process-local store. Every mutation runs under a single write lock, so
/// uniqueness checks and timestamp stamping cannot interleave.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select<F>(&self, pred: F) -> Vec<Listing>
    where
        F: Fn(&Listing) -> bool,
    {
        let tables = self.tables.read().await;
        let mut out: Vec<Listing> = tables
            .listings
            .values()
            .filter(|l| pred(l))
            .cloned()
            .collect();
        newest_first(&mut out);
        out
    }
}

fn stamp_status(listing: &mut Listing, status: ListingStatus) {
    let now = OffsetDateTime::now_utc();
    listing.updated_at = if now > listing.updated_at {
        now
    } else {
        listing.updated_at + Duration::microseconds(1)
    };
    listing.status = status;
}

fn newest_first(listings: &mut [Listing]) {
    listings.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {:?} already exists",
                user.username
            )));
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_all_listings(&self) -> StoreResult<Vec<Listing>> {
        Ok(self.select(|_| true).await)
    }

    async fn get_listings_by_status(&self, status: ListingStatus) -> StoreResult<Vec<Listing>> {
        Ok(self.select(|l| l.status == status).await)
    }

    async fn get_listings_by_tag(&self, tag: Tag) -> StoreResult<Vec<Listing>> {
        Ok(self
            .select(|l| l.status == ListingStatus::Approved && l.has_tag(tag))
            .await)
    }

    async fn search_listings(&self, text: &str) -> StoreResult<Vec<Listing>> {
        let needle = text.to_lowercase();
        Ok(self
            .select(|l| l.status == ListingStatus::Approved && l.matches_text(&needle))
            .await)
    }

    async fn get_listing_by_id(&self, id: i32) -> StoreResult<Option<Listing>> {
        Ok(self.tables.read().await.listings.get(&id).cloned())
    }

    async fn create_listing(&self, listing: NewListing) -> StoreResult<Listing> {
        check_new_listing(&listing)?;
        let mut tables = self.tables.write().await;
        tables.next_listing_id += 1;
        let now = OffsetDateTime::now_utc();
        let created = Listing {
            id: tables.next_listing_id,
            name: listing.name,
            description: listing.description,
            image: listing.image,
            github_link: listing.github_link,
            demo_link: listing.demo_link,
            twitter_link: listing.twitter_link,
            tags: listing.tags,
            submitted_by: listing.submitted_by,
            status: ListingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.listings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_listing_status(
        &self,
        id: i32,
        status: ListingStatus,
    ) -> StoreResult<Option<Listing>> {
        let mut tables = self.tables.write().await;
        let Some(listing) = tables.listings.get_mut(&id) else {
            return Ok(None);
        };
        stamp_status(listing, status);
        Ok(Some(listing.clone()))
    }

    async fn transition_listing_status(
        &self,
        id: i32,
        from: ListingStatus,
        to: ListingStatus,
    ) -> StoreResult<Option<Listing>> {
        let mut tables = self.tables.write().await;
        match tables.listings.get_mut(&id) {
            Some(listing) if listing.status == from => {
                stamp_status(listing, to);
                Ok(Some(listing.clone()))
            }
            _ => Ok(None),
        }
    }
}
