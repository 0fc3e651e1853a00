use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        repo_types::PublicUser,
        services,
    },
    error::{AppError, AppResult, AuthError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(payload) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let resp = services::login(state.store.as_ref(), &keys, &payload).await?;
    Ok(Json(resp))
}

#[instrument(skip(state, identity))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = state.store.get_user(identity.id).await?.ok_or_else(|| {
        warn!(user_id = identity.id, "token refers to missing user");
        AppError::from(AuthError::InvalidToken)
    })?;
    Ok(Json(PublicUser::from(&user)))
}
