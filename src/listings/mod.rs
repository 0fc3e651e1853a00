pub mod dto;
pub mod handlers;
pub mod query;
pub mod repo_types;
pub mod review;
pub mod services;
pub mod validation;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
        .merge(handlers::admin_routes())
}
