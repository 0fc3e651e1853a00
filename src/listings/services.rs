use tracing::info;

use super::dto::SubmissionRequest;
use super::repo_types::Listing;
use super::validation::validate_submission;
use crate::error::AppResult;
use crate::store::Store;

/// Validates a public submission and stores it as `pending`.
pub async fn submit(store: &dyn Store, req: SubmissionRequest) -> AppResult<Listing> {
    let new = validate_submission(req)?;
    let listing = store.create_listing(new).await?;
    info!(
        listing_id = listing.id,
        name = %listing.name,
        submitted_by = %listing.submitted_by,
        "listing submitted"
    );
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::listings::repo_types::ListingStatus;
    use crate::store::MemoryStore;

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            name: "My dApp".into(),
            description: "A decentralised application".into(),
            image: "data:image/png;base64,AAAA".into(),
            github_link: "https://github.com/me/my-dapp".into(),
            demo_link: "https://my-dapp.example".into(),
            twitter_link: None,
            tags: vec!["defi".into()],
            submitted_by: "me".into(),
            terms_accepted: true,
        }
    }

    #[tokio::test]
    async fn valid_submission_is_stored_pending() {
        let store = MemoryStore::new();
        let listing = submit(&store, request()).await.unwrap();
        assert_eq!(listing.status, ListingStatus::Pending);
        assert_eq!(listing.created_at, listing.updated_at);
        assert!(store.get_approved_listings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_submission_writes_nothing() {
        let store = MemoryStore::new();
        let mut req = request();
        req.terms_accepted = false;
        let err = submit(&store, req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.get_all_listings().await.unwrap().is_empty());
    }
}
