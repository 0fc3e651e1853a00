use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{AdminListQuery, ListQuery, ReviewRequest, SubmissionRequest};
use super::query::{self, paginate, parse_page, ListingFilter, PAGE_SIZE};
use super::repo_types::{Listing, ListingStatus};
use super::review::{self, ReviewDecision};
use super::services;
use crate::{
    auth::extractors::AdminUser,
    error::{AppError, AppResult},
    state::AppState,
};

/// Inline data-URL images make submissions large.
const SUBMISSION_BODY_LIMIT: usize = 10 * 1024 * 1024;

// --- routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route(
        "/products",
        post(create_product).layer(DefaultBodyLimit::max(SUBMISSION_BODY_LIMIT)),
    )
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/products", get(admin_list_products))
        .route("/admin/products/:id", patch(review_product))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<(HeaderMap, Json<Vec<Listing>>)> {
    let Query(q) = params?;
    let filter =
        ListingFilter::from_params(q.tag.as_deref(), q.tags.as_deref(), q.search.as_deref())?;
    let page = parse_page(q.page.as_deref())?;
    let listings = query::find_public(state.store.as_ref(), &filter).await?;
    Ok(paged(listings, page))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Listing>> {
    let id = parse_id(&id)?;
    let listing = state
        .store
        .get_listing_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(Json(listing))
}

#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> AppResult<(StatusCode, HeaderMap, Json<Listing>)> {
    let Json(payload) = payload?;
    let listing = services::submit(state.store.as_ref(), payload).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/products/{}", listing.id))
        .map_err(|e| AppError::Internal(e.into()))?;
    headers.insert(header::LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(listing)))
}

#[instrument(skip(state, _admin))]
pub async fn admin_list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
    params: Result<Query<AdminListQuery>, QueryRejection>,
) -> AppResult<(HeaderMap, Json<Vec<Listing>>)> {
    let Query(q) = params?;
    let status = match q.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<ListingStatus>().map_err(|e| {
            AppError::Validation(format!("Validation error: {e} at \"status\""))
        })?),
        None => None,
    };
    let page = parse_page(q.page.as_deref())?;
    let listings = query::find_for_admin(state.store.as_ref(), status).await?;
    Ok(paged(listings, page))
}

#[instrument(skip(state, admin, payload))]
pub async fn review_product(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> AppResult<Json<Listing>> {
    let AdminUser(reviewer) = admin;
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let decision = payload.status.parse::<ReviewDecision>()?;
    let listing = review::review(state.store.as_ref(), &reviewer, id, decision).await?;
    Ok(Json(listing))
}

// --- helpers ---

fn parse_id(raw: &str) -> AppResult<i32> {
    raw.parse::<i32>()
        .map_err(|_| AppError::Validation("Invalid product ID".into()))
}

/// Without a page number the whole sequence is returned. With one, only that
/// page is returned and the totals travel in headers.
fn paged(listings: Vec<Listing>, page: Option<usize>) -> (HeaderMap, Json<Vec<Listing>>) {
    let mut headers = HeaderMap::new();
    let Some(page) = page else {
        return (headers, Json(listings));
    };
    let p = paginate(&listings, page, PAGE_SIZE);
    headers.insert("x-total-count", HeaderValue::from(p.total_items));
    headers.insert("x-total-pages", HeaderValue::from(p.total_pages));
    headers.insert("x-page", HeaderValue::from(p.page));
    (headers, Json(p.items))
}
