//! Review lifecycle of a listing.
//!
//! ```text
//! pending ──approve──▶ approved
//!    └─────reject────▶ rejected
//! ```
//!
//! Both decided states are terminal. Repeating the decision a listing already
//! carries is a logged no-op; asking for the opposite decision is refused.

use std::str::FromStr;

use tracing::{debug, info, warn};

use super::repo_types::{Listing, ListingStatus};
use crate::auth::repo_types::User;
use crate::error::{AppError, AppResult};
use crate::store::Store;

/// What an admin may decide about a listing. `pending` is not a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn target(self) -> ListingStatus {
        match self {
            ReviewDecision::Approve => ListingStatus::Approved,
            ReviewDecision::Reject => ListingStatus::Rejected,
        }
    }
}

impl FromStr for ReviewDecision {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ReviewDecision::Approve),
            "rejected" => Ok(ReviewDecision::Reject),
            other => Err(AppError::Validation(format!(
                "Validation error: Invalid status {other:?}; expected 'approved' or 'rejected' at \"status\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the new status.
    Apply(ListingStatus),
    /// The listing already carries the requested status.
    Unchanged,
}

/// Decides what a review does to a listing currently in `current`.
pub fn plan(current: ListingStatus, decision: ReviewDecision) -> AppResult<Transition> {
    let target = decision.target();
    match current {
        ListingStatus::Pending => Ok(Transition::Apply(target)),
        decided if decided == target => Ok(Transition::Unchanged),
        decided => Err(AppError::InvalidTransition {
            current: decided,
            requested: target,
        }),
    }
}

/// Applies an admin's decision. The caller must already have passed the
/// admin gate; `reviewer` is only used for the audit log.
///
/// The write only lands if the listing still carries the status it was
/// planned against. A review that loses a race re-plans against the winner's
/// status; decided states are terminal, so that happens at most once.
pub async fn review(
    store: &dyn Store,
    reviewer: &User,
    id: i32,
    decision: ReviewDecision,
) -> AppResult<Listing> {
    loop {
        let current = store
            .get_listing_by_id(id)
            .await?
            .ok_or(AppError::NotFound("Product"))?;

        match plan(current.status, decision) {
            Ok(Transition::Apply(status)) => {
                let Some(updated) = store
                    .transition_listing_status(id, current.status, status)
                    .await?
                else {
                    debug!(listing_id = id, "listing changed during review; re-reading");
                    continue;
                };
                info!(
                    listing_id = id,
                    reviewer = %reviewer.username,
                    from = %current.status,
                    to = %updated.status,
                    "listing reviewed"
                );
                return Ok(updated);
            }
            Ok(Transition::Unchanged) => {
                info!(
                    listing_id = id,
                    reviewer = %reviewer.username,
                    status = %current.status,
                    "repeated review ignored"
                );
                return Ok(current);
            }
            Err(e) => {
                warn!(
                    listing_id = id,
                    reviewer = %reviewer.username,
                    from = %current.status,
                    to = %decision.target(),
                    "review refused"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use tokio::sync::Barrier;

    use super::*;
    use crate::auth::repo_types::NewUser;
    use crate::listings::repo_types::{NewListing, Tag};
    use crate::store::{MemoryStore, StoreResult};

    fn admin() -> User {
        User {
            id: 1,
            username: "admin".into(),
            password_hash: String::new(),
            is_admin: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    async fn pending(store: &MemoryStore) -> Listing {
        store
            .create_listing(NewListing {
                name: "My dApp".into(),
                description: "Something worth reviewing".into(),
                image: "data:image/png;base64,AAAA".into(),
                github_link: "https://github.com/me/dapp".into(),
                demo_link: "https://dapp.example".into(),
                twitter_link: None,
                tags: vec![Tag::Defi],
                submitted_by: "me".into(),
            })
            .await
            .unwrap()
    }

    #[test]
    fn plan_covers_every_state() {
        use ListingStatus::*;
        use ReviewDecision::*;
        assert_eq!(plan(Pending, Approve).unwrap(), Transition::Apply(Approved));
        assert_eq!(plan(Pending, Reject).unwrap(), Transition::Apply(Rejected));
        assert_eq!(plan(Approved, Approve).unwrap(), Transition::Unchanged);
        assert_eq!(plan(Rejected, Reject).unwrap(), Transition::Unchanged);
        assert!(matches!(
            plan(Approved, Reject),
            Err(AppError::InvalidTransition { current: Approved, requested: Rejected })
        ));
        assert!(matches!(
            plan(Rejected, Approve),
            Err(AppError::InvalidTransition { current: Rejected, requested: Approved })
        ));
    }

    #[test]
    fn pending_is_not_a_decision() {
        assert!(matches!(
            "pending".parse::<ReviewDecision>(),
            Err(AppError::Validation(_))
        ));
        assert!("archived".parse::<ReviewDecision>().is_err());
        assert_eq!("approved".parse::<ReviewDecision>().unwrap(), ReviewDecision::Approve);
        assert_eq!("rejected".parse::<ReviewDecision>().unwrap(), ReviewDecision::Reject);
    }

    #[tokio::test]
    async fn approving_pending_listing_moves_it_into_approved_reads() {
        let store = MemoryStore::new();
        let listing = pending(&store).await;

        let reviewed = review(&store, &admin(), listing.id, ReviewDecision::Approve)
            .await
            .unwrap();
        assert_eq!(reviewed.status, ListingStatus::Approved);
        assert!(reviewed.updated_at > listing.updated_at);

        let approved = store.get_approved_listings().await.unwrap();
        assert!(approved.iter().any(|l| l.id == listing.id));
        let still_pending = store
            .get_listings_by_status(ListingStatus::Pending)
            .await
            .unwrap();
        assert!(still_pending.iter().all(|l| l.id != listing.id));
    }

    #[tokio::test]
    async fn repeated_decision_leaves_record_untouched() {
        let store = MemoryStore::new();
        let listing = pending(&store).await;
        let first = review(&store, &admin(), listing.id, ReviewDecision::Reject)
            .await
            .unwrap();
        let again = review(&store, &admin(), listing.id, ReviewDecision::Reject)
            .await
            .unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn opposite_decision_is_refused() {
        let store = MemoryStore::new();
        let listing = pending(&store).await;
        review(&store, &admin(), listing.id, ReviewDecision::Approve)
            .await
            .unwrap();
        let err = review(&store, &admin(), listing.id, ReviewDecision::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        let stored = store.get_listing_by_id(listing.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ListingStatus::Approved);
    }

    /// Holds the first two listing reads until both callers have made them,
    /// so both reviews plan against `pending`.
    struct RendezvousStore {
        inner: MemoryStore,
        barrier: Barrier,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl Store for RendezvousStore {
        async fn get_user(&self, id: i32) -> StoreResult<Option<User>> {
            self.inner.get_user(id).await
        }

        async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
            self.inner.get_user_by_username(username).await
        }

        async fn create_user(&self, user: NewUser) -> StoreResult<User> {
            self.inner.create_user(user).await
        }

        async fn get_all_listings(&self) -> StoreResult<Vec<Listing>> {
            self.inner.get_all_listings().await
        }

        async fn get_listings_by_status(&self, status: ListingStatus) -> StoreResult<Vec<Listing>> {
            self.inner.get_listings_by_status(status).await
        }

        async fn get_listings_by_tag(&self, tag: Tag) -> StoreResult<Vec<Listing>> {
            self.inner.get_listings_by_tag(tag).await
        }

        async fn search_listings(&self, text: &str) -> StoreResult<Vec<Listing>> {
            self.inner.search_listings(text).await
        }

        async fn get_listing_by_id(&self, id: i32) -> StoreResult<Option<Listing>> {
            let found = self.inner.get_listing_by_id(id).await;
            if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.barrier.wait().await;
            }
            found
        }

        async fn create_listing(&self, listing: NewListing) -> StoreResult<Listing> {
            self.inner.create_listing(listing).await
        }

        async fn update_listing_status(
            &self,
            id: i32,
            status: ListingStatus,
        ) -> StoreResult<Option<Listing>> {
            self.inner.update_listing_status(id, status).await
        }

        async fn transition_listing_status(
            &self,
            id: i32,
            from: ListingStatus,
            to: ListingStatus,
        ) -> StoreResult<Option<Listing>> {
            self.inner.transition_listing_status(id, from, to).await
        }
    }

    #[tokio::test]
    async fn concurrent_opposite_decisions_cannot_both_land() {
        let inner = MemoryStore::new();
        let listing = pending(&inner).await;
        let store = Arc::new(RendezvousStore {
            inner,
            barrier: Barrier::new(2),
            reads: AtomicUsize::new(0),
        });

        let id = listing.id;
        let spawn_review = |decision: ReviewDecision| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { review(store.as_ref(), &admin(), id, decision).await })
        };
        let approve = spawn_review(ReviewDecision::Approve);
        let reject = spawn_review(ReviewDecision::Reject);
        let approve = approve.await.unwrap();
        let reject = reject.await.unwrap();

        let (winner, loser) = match (approve, reject) {
            (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
            (a, r) => panic!("exactly one decision must land: {a:?} / {r:?}"),
        };
        assert!(matches!(loser, AppError::InvalidTransition { .. }));
        let stored = store.get_listing_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, winner.status);
        assert_eq!(stored.updated_at, winner.updated_at);
    }

    #[tokio::test]
    async fn reviewing_missing_listing_is_not_found() {
        let store = MemoryStore::new();
        let err = review(&store, &admin(), 404, ReviewDecision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
