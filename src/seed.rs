//! Startup seeding: an admin account from config, and optionally a handful of
//! sample listings for an empty store.

use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::auth::repo_types::NewUser;
use crate::config::SeedConfig;
use crate::listings::repo_types::{ListingStatus, NewListing, Tag};
use crate::store::{Store, StoreError};

const PLACEHOLDER_IMAGE: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

struct Sample {
    name: &'static str,
    description: &'static str,
    github_link: &'static str,
    demo_link: &'static str,
    submitted_by: &'static str,
    tags: &'static [Tag],
    status: ListingStatus,
}

// Oldest first, so insertion order matches creation order.
const SAMPLES: &[Sample] = &[
    Sample {
        name: "NFT Marketplace",
        description: "A decentralized marketplace for creating, buying, and selling NFTs with low gas fees.",
        github_link: "https://github.com/fakerepo/nft-market",
        demo_link: "https://demo.nftmarket.crypto",
        submitted_by: "nftCreator",
        tags: &[Tag::Nft, Tag::Marketplace],
        status: ListingStatus::Approved,
    },
    Sample {
        name: "Crypto Payment Gateway",
        description: "A secure payment gateway that accepts multiple cryptocurrencies for e-commerce websites.",
        github_link: "https://github.com/fakerepo/payment-gateway",
        demo_link: "https://demo.fakepayment.crypto",
        submitted_by: "cryptoDev",
        tags: &[Tag::Payment, Tag::Defi],
        status: ListingStatus::Approved,
    },
    Sample {
        name: "DeFi Yield Aggregator",
        description: "An aggregator that helps users find the best yield farming opportunities across multiple protocols.",
        github_link: "https://github.com/fakerepo/yield-aggregator",
        demo_link: "https://demo.yieldagg.finance",
        submitted_by: "defiDev",
        tags: &[Tag::Defi, Tag::Tools],
        status: ListingStatus::Approved,
    },
    Sample {
        name: "Crypto Portfolio Tracker",
        description: "A comprehensive tool to track your crypto portfolio across multiple wallets and exchanges.",
        github_link: "https://github.com/fakerepo/portfolio-tracker",
        demo_link: "https://demo.cryptofolio.app",
        submitted_by: "trackerDev",
        tags: &[Tag::Wallet, Tag::Defi],
        status: ListingStatus::Pending,
    },
];

pub async fn run(store: &dyn Store, cfg: &SeedConfig) -> anyhow::Result<()> {
    match cfg.admin_password.as_deref() {
        Some(password) => seed_admin(store, &cfg.admin_username, password).await?,
        None => info!("ADMIN_PASSWORD not set; skipping admin seeding"),
    }
    if cfg.sample_listings {
        seed_sample_listings(store).await?;
    }
    Ok(())
}

/// Ensures an admin named `username` exists. An existing account with that
/// name is left as it is.
pub async fn seed_admin(store: &dyn Store, username: &str, password: &str) -> anyhow::Result<()> {
    if store.get_user_by_username(username).await?.is_some() {
        info!(%username, "admin user already exists, skipping creation");
        return Ok(());
    }
    let password_hash = hash_password(password)?;
    match store
        .create_user(NewUser {
            username: username.to_string(),
            password_hash,
            is_admin: true,
        })
        .await
    {
        Ok(user) => {
            info!(user_id = user.id, %username, "admin user created");
            Ok(())
        }
        Err(StoreError::Conflict(_)) => {
            warn!(%username, "admin user created concurrently, skipping");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Inserts the sample listings when the store holds none. Returns how many
/// were inserted.
pub async fn seed_sample_listings(store: &dyn Store) -> anyhow::Result<usize> {
    if !store.get_all_listings().await?.is_empty() {
        info!("listings already exist, skipping sample data");
        return Ok(0);
    }
    for sample in SAMPLES {
        let listing = store
            .create_listing(NewListing {
                name: sample.name.to_string(),
                description: sample.description.to_string(),
                image: PLACEHOLDER_IMAGE.to_string(),
                github_link: sample.github_link.to_string(),
                demo_link: sample.demo_link.to_string(),
                twitter_link: None,
                tags: sample.tags.to_vec(),
                submitted_by: sample.submitted_by.to_string(),
            })
            .await?;
        if sample.status != ListingStatus::Pending {
            store.update_listing_status(listing.id, sample.status).await?;
        }
    }
    info!(count = SAMPLES.len(), "sample listings created");
    Ok(SAMPLES.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn admin_is_created_once() {
        let store = MemoryStore::new();
        seed_admin(&store, "admin", "first").await.unwrap();
        seed_admin(&store, "admin", "second").await.unwrap();

        let admin = store.get_user_by_username("admin").await.unwrap().unwrap();
        assert!(admin.is_admin);
        assert!(verify_password("first", &admin.password_hash).unwrap());
        assert!(!verify_password("second", &admin.password_hash).unwrap());
    }

    #[tokio::test]
    async fn samples_only_fill_an_empty_store() {
        let store = MemoryStore::new();
        assert_eq!(seed_sample_listings(&store).await.unwrap(), SAMPLES.len());
        assert_eq!(seed_sample_listings(&store).await.unwrap(), 0);

        let all = store.get_all_listings().await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].name, "Crypto Portfolio Tracker");
        assert_eq!(all[0].status, ListingStatus::Pending);
        assert_eq!(store.get_approved_listings().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn run_honours_config() {
        let store = MemoryStore::new();
        let cfg = SeedConfig {
            admin_username: "root".into(),
            admin_password: None,
            sample_listings: false,
        };
        run(&store, &cfg).await.unwrap();
        assert!(store.get_user_by_username("root").await.unwrap().is_none());
        assert!(store.get_all_listings().await.unwrap().is_empty());

        let cfg = SeedConfig {
            admin_password: Some("pw".into()),
            sample_listings: true,
            ..cfg
        };
        run(&store, &cfg).await.unwrap();
        assert!(store.get_user_by_username("root").await.unwrap().is_some());
        assert_eq!(store.get_all_listings().await.unwrap().len(), 4);
    }
}
