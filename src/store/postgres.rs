use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::error;

use super::{check_new_listing, Store, StoreError, StoreResult};
use crate::auth::repo_types::{NewUser, User};
use crate::listings::repo_types::{Listing, ListingRow, ListingStatus, NewListing, Tag};

const USER_COLUMNS: &str = "id, username, password AS password_hash, is_admin, created_at";
const LISTING_COLUMNS: &str = "id, name, description, image, github_link, demo_link, \
     twitter_link, tags, submitted_by, status, created_at, updated_at";

/// Table-backed store over a Postgres pool. Every call, pool checkout
/// included, is bounded by `query_timeout`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        query_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .context("connect to database")?;
        Ok(Self::from_pool(pool, query_timeout))
    }

    pub fn from_pool(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn fetch_listings(
        &self,
        op: &'static str,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, ListingRow, sqlx::postgres::PgArguments>,
    ) -> StoreResult<Vec<Listing>> {
        let rows = with_deadline(op, self.query_timeout, query.fetch_all(&self.pool)).await?;
        rows.into_iter().map(|r| decode(op, r)).collect()
    }
}

/// Runs one driver call under `limit`. A call still pending at the deadline
/// is dropped and reported as a storage failure.
async fn with_deadline<T, F>(op: &'static str, limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(storage(op)),
        Err(_) => {
            error!(op, timeout_ms = limit.as_millis() as u64, "postgres query timed out");
            Err(StoreError::Storage(anyhow::anyhow!(
                "{op}: timed out after {limit:?}"
            )))
        }
    }
}

/// Maps a driver error into the store taxonomy. Unique violations become
/// conflicts, check violations invalid input; everything else is a storage
/// failure.
fn storage(op: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict(format!("{op}: duplicate value"));
            }
            if db.is_check_violation() {
                return StoreError::Invalid(format!("{op}: constraint violated"));
            }
        }
        error!(error = %e, op, "postgres query failed");
        StoreError::Storage(anyhow::Error::new(e).context(op))
    }
}

fn decode(op: &'static str, row: ListingRow) -> StoreResult<Listing> {
    Listing::try_from(row).map_err(|e| {
        error!(error = %e, op, "corrupt listing row");
        StoreError::Storage(anyhow::anyhow!("{op}: {e}"))
    })
}

/// Lowercased `%text%` pattern with LIKE metacharacters escaped.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn tag_strings(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(|t| t.as_str().to_string()).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn get_user(&self, id: i32) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let query = sqlx::query_as::<_, User>(&sql).bind(id);
        with_deadline("get_user", self.query_timeout, query.fetch_optional(&self.pool)).await
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let query = sqlx::query_as::<_, User>(&sql).bind(username);
        with_deadline(
            "get_user_by_username",
            self.query_timeout,
            query.fetch_optional(&self.pool),
        )
        .await
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (username, password, is_admin)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        );
        let query = sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.is_admin);
        with_deadline("create_user", self.query_timeout, query.fetch_one(&self.pool))
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => {
                    StoreError::Conflict(format!("username {:?} already exists", user.username))
                }
                other => other,
            })
    }

    async fn get_all_listings(&self) -> StoreResult<Vec<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM products ORDER BY created_at DESC, id DESC"
        );
        self.fetch_listings("get_all_listings", sqlx::query_as(&sql))
            .await
    }

    async fn get_listings_by_status(&self, status: ListingStatus) -> StoreResult<Vec<Listing>> {
        let sql = format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM products
            WHERE status = $1
            ORDER BY created_at DESC, id DESC
            "#
        );
        self.fetch_listings(
            "get_listings_by_status",
            sqlx::query_as(&sql).bind(status.as_str()),
        )
        .await
    }

    async fn get_listings_by_tag(&self, tag: Tag) -> StoreResult<Vec<Listing>> {
        let sql = format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM products
            WHERE status = 'approved' AND $1 = ANY(tags)
            ORDER BY created_at DESC, id DESC
            "#
        );
        self.fetch_listings("get_listings_by_tag", sqlx::query_as(&sql).bind(tag.as_str()))
            .await
    }

    async fn search_listings(&self, text: &str) -> StoreResult<Vec<Listing>> {
        let sql = format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM products
            WHERE status = 'approved'
              AND (LOWER(name) LIKE $1 ESCAPE '\' OR LOWER(description) LIKE $1 ESCAPE '\')
            ORDER BY created_at DESC, id DESC
            "#
        );
        self.fetch_listings("search_listings", sqlx::query_as(&sql).bind(like_pattern(text)))
            .await
    }

    async fn get_listing_by_id(&self, id: i32) -> StoreResult<Option<Listing>> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM products WHERE id = $1");
        let query = sqlx::query_as::<_, ListingRow>(&sql).bind(id);
        let row = with_deadline(
            "get_listing_by_id",
            self.query_timeout,
            query.fetch_optional(&self.pool),
        )
        .await?;
        row.map(|r| decode("get_listing_by_id", r)).transpose()
    }

    async fn create_listing(&self, listing: NewListing) -> StoreResult<Listing> {
        check_new_listing(&listing)?;
        // One statement, one now(): created_at and updated_at are identical.
        let sql = format!(
            r#"
            INSERT INTO products
                (name, description, image, github_link, demo_link, twitter_link,
                 tags, submitted_by, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', now(), now())
            RETURNING {LISTING_COLUMNS}
            "#
        );
        let query = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(&listing.name)
            .bind(&listing.description)
            .bind(&listing.image)
            .bind(&listing.github_link)
            .bind(&listing.demo_link)
            .bind(&listing.twitter_link)
            .bind(tag_strings(&listing.tags))
            .bind(&listing.submitted_by);
        let row =
            with_deadline("create_listing", self.query_timeout, query.fetch_one(&self.pool))
                .await?;
        decode("create_listing", row)
    }

    async fn update_listing_status(
        &self,
        id: i32,
        status: ListingStatus,
    ) -> StoreResult<Option<Listing>> {
        let sql = format!(
            r#"
            UPDATE products
            SET status = $2,
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond')
            WHERE id = $1
            RETURNING {LISTING_COLUMNS}
            "#
        );
        let query = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(id)
            .bind(status.as_str());
        let row = with_deadline(
            "update_listing_status",
            self.query_timeout,
            query.fetch_optional(&self.pool),
        )
        .await?;
        row.map(|r| decode("update_listing_status", r)).transpose()
    }

    async fn transition_listing_status(
        &self,
        id: i32,
        from: ListingStatus,
        to: ListingStatus,
    ) -> StoreResult<Option<Listing>> {
        // The status predicate makes the row lock decide between racing reviews.
        let sql = format!(
            r#"
            UPDATE products
            SET status = $3,
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond')
            WHERE id = $1 AND status = $2
            RETURNING {LISTING_COLUMNS}
            "#
        );
        let query = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str());
        let row = with_deadline(
            "transition_listing_status",
            self.query_timeout,
            query.fetch_optional(&self.pool),
        )
        .await?;
        row.map(|r| decode("transition_listing_status", r)).transpose()
    }
}
