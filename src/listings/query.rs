//! Listing Query Service: turns the public read parameters into one ordered
//! result set, and slices result sets into pages.

use tracing::debug;

use super::repo_types::{Listing, ListingStatus, Tag};
use super::validation::parse_tags;
use crate::error::{AppError, AppResult};
use crate::store::Store;

pub const PAGE_SIZE: usize = 6;

/// Filter for the public listing view. Only approved listings are ever
/// returned through it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListingFilter {
    pub tags: Vec<Tag>,
    pub search: Option<String>,
}

impl ListingFilter {
    /// Builds a filter from raw query parameters. `tag` and the
    /// comma-separated `tags` are merged; empty values are ignored.
    pub fn from_params(
        tag: Option<&str>,
        tags: Option<&str>,
        search: Option<&str>,
    ) -> AppResult<Self> {
        let names = tag
            .into_iter()
            .chain(tags.into_iter().flat_map(|t| t.split(',')))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let tags = parse_tags(names)
            .map_err(|e| AppError::Validation(format!("Validation error: {e} at \"tag\"")))?;
        let search = search.filter(|s| !s.is_empty()).map(str::to_string);
        Ok(Self { tags, search })
    }
}

/// Approved listings matching `filter`, newest first.
///
/// A single tag takes precedence over search. With several tags the candidate
/// set is the search result (or the first tag's listings when there is no
/// search) narrowed to listings carrying every requested tag.
pub async fn find_public(store: &dyn Store, filter: &ListingFilter) -> AppResult<Vec<Listing>> {
    let listings = match (filter.tags.as_slice(), filter.search.as_deref()) {
        ([], Some(text)) => {
            debug!(search = %text, "listing search");
            store.search_listings(text).await?
        }
        ([], None) => store.get_approved_listings().await?,
        ([tag], _) => {
            debug!(%tag, "listing tag filter");
            store.get_listings_by_tag(*tag).await?
        }
        ([first, ..], search) => {
            debug!(tags = ?filter.tags, ?search, "listing multi-tag filter");
            let candidates = match search {
                Some(text) => store.search_listings(text).await?,
                None => store.get_listings_by_tag(*first).await?,
            };
            require_all_tags(candidates, &filter.tags)
        }
    };
    Ok(listings)
}

/// Keeps listings that carry every tag in `tags`.
pub fn require_all_tags(listings: Vec<Listing>, tags: &[Tag]) -> Vec<Listing> {
    listings
        .into_iter()
        .filter(|l| tags.iter().all(|t| l.has_tag(*t)))
        .collect()
}

/// Admin view: status-scoped, or everything when no status is given.
pub async fn find_for_admin(
    store: &dyn Store,
    status: Option<ListingStatus>,
) -> AppResult<Vec<Listing>> {
    Ok(match status {
        Some(status) => store.get_listings_by_status(status).await?,
        None => store.get_all_listings().await?,
    })
}

/// One slice of an ordered result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Cuts page `page` (1-based) out of `items`. Pages past the end, and page 0,
/// are empty.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let slice = match page.checked_sub(1) {
        Some(idx) => items
            .iter()
            .skip(idx.saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    Page {
        items: slice,
        page,
        total_items,
        total_pages,
    }
}

/// Parses a 1-based page number from a query parameter.
pub fn parse_page(raw: Option<&str>) -> AppResult<Option<usize>> {
    match raw.map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) => match p.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(Some(n)),
            _ => Err(AppError::Validation(
                "Validation error: page must be a positive integer at \"page\"".into(),
            )),
        },
    }
}
