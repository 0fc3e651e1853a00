use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Category labels a listing can carry. Closed set shared by submission
/// validation and query filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Defi,
    Payment,
    Nft,
    Dao,
    Gaming,
    Wallet,
    Governance,
    Marketplace,
    Social,
    Tools,
    Infrastructure,
    Other,
}

impl Tag {
    pub const ALL: [Tag; 12] = [
        Tag::Defi,
        Tag::Payment,
        Tag::Nft,
        Tag::Dao,
        Tag::Gaming,
        Tag::Wallet,
        Tag::Governance,
        Tag::Marketplace,
        Tag::Social,
        Tag::Tools,
        Tag::Infrastructure,
        Tag::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Defi => "defi",
            Tag::Payment => "payment",
            Tag::Nft => "nft",
            Tag::Dao => "dao",
            Tag::Gaming => "gaming",
            Tag::Wallet => "wallet",
            Tag::Governance => "governance",
            Tag::Marketplace => "marketplace",
            Tag::Social => "social",
            Tag::Tools => "tools",
            Tag::Infrastructure => "infrastructure",
            Tag::Other => "other",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown tag {s:?}"))
    }
}

/// Review lifecycle of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Pending,
    Approved,
    Rejected,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ListingStatus::Pending),
            "approved" => Ok(ListingStatus::Approved),
            "rejected" => Ok(ListingStatus::Rejected),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// A submitted project as it is stored and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub image: String,
    pub github_link: String,
    pub demo_link: String,
    pub twitter_link: Option<String>,
    pub tags: Vec<Tag>,
    pub submitted_by: String,
    pub status: ListingStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Listing {
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// Case-insensitive substring match on name or description.
    /// `needle` must already be lowercased.
    pub fn matches_text(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

/// Fields accepted when a listing is created. Status and timestamps are
/// always assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub name: String,
    pub description: String,
    pub image: String,
    pub github_link: String,
    pub demo_link: String,
    pub twitter_link: Option<String>,
    pub tags: Vec<Tag>,
    pub submitted_by: String,
}

/// Raw `products` row; tags and status are still text here.
#[derive(Debug, FromRow)]
pub struct ListingRow {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub image: String,
    pub github_link: String,
    pub demo_link: String,
    pub twitter_link: Option<String>,
    pub tags: Vec<String>,
    pub submitted_by: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ListingRow> for Listing {
    type Error = String;

    fn try_from(r: ListingRow) -> Result<Self, Self::Error> {
        let tags = r
            .tags
            .iter()
            .map(|t| t.parse::<Tag>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("listing {}: {e}", r.id))?;
        let status = r
            .status
            .parse::<ListingStatus>()
            .map_err(|e| format!("listing {}: {e}", r.id))?;
        Ok(Self {
            id: r.id,
            name: r.name,
            description: r.description,
            image: r.image,
            github_link: r.github_link,
            demo_link: r.demo_link,
            twitter_link: r.twitter_link,
            tags,
            submitted_by: r.submitted_by,
            status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tags: &[&str], status: &str) -> ListingRow {
        let now = OffsetDateTime::now_utc();
        ListingRow {
            id: 7,
            name: "Wallet".into(),
            description: "A wallet for everyone".into(),
            image: "data:image/png;base64,AAAA".into(),
            github_link: "https://github.com/x/y".into(),
            demo_link: "https://demo.example".into(),
            twitter_link: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            submitted_by: "alice".into(),
            status: status.into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tag_names_parse_back() {
        for tag in Tag::ALL {
            assert_eq!(tag.as_str().parse::<Tag>().unwrap(), tag);
        }
        assert!("yield".parse::<Tag>().is_err());
        assert!("DeFi".parse::<Tag>().is_err());
    }

    #[test]
    fn row_converts_into_listing() {
        let listing = Listing::try_from(row(&["wallet", "defi"], "approved")).unwrap();
        assert_eq!(listing.tags, vec![Tag::Wallet, Tag::Defi]);
        assert_eq!(listing.status, ListingStatus::Approved);
    }

    #[test]
    fn row_with_unknown_tag_or_status_is_rejected() {
        assert!(Listing::try_from(row(&["yield"], "approved")).is_err());
        assert!(Listing::try_from(row(&["defi"], "archived")).is_err());
    }

    #[test]
    fn listing_serializes_camel_case() {
        let listing = Listing::try_from(row(&["nft"], "pending")).unwrap();
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["githubLink"], "https://github.com/x/y");
        assert_eq!(json["submittedBy"], "alice");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["tags"][0], "nft");
        assert!(json["twitterLink"].is_null());
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn text_match_is_case_insensitive_on_name_and_description() {
        let listing = Listing::try_from(row(&["nft"], "approved")).unwrap();
        assert!(listing.matches_text("wall"));
        assert!(listing.matches_text("everyone"));
        assert!(!listing.matches_text("portfolio"));
    }
}
