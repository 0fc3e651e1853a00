use tracing::{info, warn};

use super::claims::Identity;
use super::dto::{AuthResponse, LoginRequest};
use super::jwt::JwtKeys;
use super::password::{verify_dummy, verify_password};
use super::repo_types::{PublicUser, User};
use crate::error::{AppError, AppResult, AuthError};
use crate::store::Store;

/// Both fields are required and must be non-empty.
pub fn validate_login(payload: &LoginRequest) -> AppResult<()> {
    let mut problems = Vec::new();
    if payload.username.is_empty() {
        problems.push("Username is required at \"username\"");
    }
    if payload.password.is_empty() {
        problems.push("Password is required at \"password\"");
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Validation error: {}",
            problems.join("; ")
        )))
    }
}

/// Checks credentials and issues a session token.
pub async fn login(
    store: &dyn Store,
    keys: &JwtKeys,
    payload: &LoginRequest,
) -> AppResult<AuthResponse> {
    validate_login(payload)?;

    let plain = payload.password.clone();
    let Some(user) = store.get_user_by_username(&payload.username).await? else {
        let _ = tokio::task::spawn_blocking(move || verify_dummy(&plain)).await;
        warn!(username = %payload.username, "login unknown username");
        return Err(AuthError::InvalidCredentials.into());
    };

    // Argon2 is CPU-bound; keep it off the async workers.
    let hash = user.password_hash.clone();
    let verdict = tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    // A stored credential that is not a valid hash can never match.
    if !verdict.unwrap_or(false) {
        warn!(user_id = user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = keys.sign(&user).map_err(AppError::Internal)?;
    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(AuthResponse {
        token,
        user: PublicUser::from(&user),
    })
}

/// Resolves the bearer token from an `Authorization` header value. The
/// scheme name is matched without regard to case.
pub fn verify(keys: &JwtKeys, header: Option<&str>) -> Result<Identity, AuthError> {
    let token = header
        .and_then(|h| h.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    match keys.verify(token) {
        Ok(claims) => Ok(Identity::from(claims)),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            Err(AuthError::InvalidToken)
        }
    }
}

/// Re-reads the user so that promotion or revocation since the token was
/// issued takes effect immediately. The token's own `isAdmin` claim is ignored.
pub async fn require_admin(store: &dyn Store, identity: &Identity) -> AppResult<User> {
    match store.get_user(identity.id).await? {
        Some(user) if user.is_admin => Ok(user),
        Some(_) => {
            warn!(user_id = identity.id, "admin access denied");
            Err(AuthError::Forbidden.into())
        }
        None => {
            warn!(user_id = identity.id, "token refers to missing user");
            Err(AuthError::Forbidden.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::extract::FromRef;

    use super::*;
    use crate::auth::password::hash_password;
    use crate::auth::repo_types::NewUser;
    use crate::state::AppState;

    async fn state_with_user(username: &str, password: &str, is_admin: bool) -> (AppState, User) {
        let state = AppState::fake();
        let user = state
            .store
            .create_user(NewUser {
                username: username.into(),
                password_hash: hash_password(password).unwrap(),
                is_admin,
            })
            .await
            .unwrap();
        (state, user)
    }

    fn req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn empty_login_fields_are_rejected() {
        let err = validate_login(&req("", "")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Username is required"));
        assert!(msg.contains("Password is required"));
        assert!(validate_login(&req("admin", "x")).is_ok());
    }

    #[tokio::test]
    async fn login_issues_token_for_correct_password() {
        let (state, user) = state_with_user("admin", "admin123", true).await;
        let keys = JwtKeys::from_ref(&state);
        let resp = login(state.store.as_ref(), &keys, &req("admin", "admin123"))
            .await
            .unwrap();
        assert_eq!(resp.user, PublicUser::from(&user));
        let identity = verify(&keys, Some(format!("Bearer {}", resp.token).as_str())).unwrap();
        assert_eq!(identity.id, user.id);
        assert!(identity.is_admin);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_invalid_credentials() {
        let (state, _) = state_with_user("admin", "admin123", true).await;
        let keys = JwtKeys::from_ref(&state);
        let err = login(state.store.as_ref(), &keys, &req("admin", "admin124"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn login_with_unknown_user_is_invalid_credentials() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let err = login(state.store.as_ref(), &keys, &req("ghost", "whatever"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn plaintext_stored_password_never_matches() {
        let state = AppState::fake();
        state
            .store
            .create_user(NewUser {
                username: "legacy".into(),
                password_hash: "admin123".into(),
                is_admin: true,
            })
            .await
            .unwrap();
        let keys = JwtKeys::from_ref(&state);
        let err = login(state.store.as_ref(), &keys, &req("legacy", "admin123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[test]
    fn verify_distinguishes_missing_from_invalid() {
        let keys = JwtKeys::from_ref(&AppState::fake());
        assert_eq!(verify(&keys, None), Err(AuthError::MissingToken));
        assert_eq!(verify(&keys, Some("Bearer ")), Err(AuthError::MissingToken));
        assert_eq!(verify(&keys, Some("Basic abc")), Err(AuthError::MissingToken));
        assert_eq!(verify(&keys, Some("Bearer nope")), Err(AuthError::InvalidToken));
        assert_eq!(verify(&keys, Some("Bearertoken")), Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn bearer_scheme_is_case_insensitive() {
        let (state, user) = state_with_user("admin", "admin123", true).await;
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign(&user).unwrap();
        for scheme in ["Bearer", "bearer", "BEARER", "bEaReR"] {
            let identity = verify(&keys, Some(format!("{scheme} {token}").as_str())).unwrap();
            assert_eq!(identity.id, user.id);
        }
        assert_eq!(verify(&keys, Some("BEARER nope")), Err(AuthError::InvalidToken));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn password_check_leaves_the_runtime_free() {
        let (state, _) = state_with_user("admin", "admin123", true).await;
        let keys = JwtKeys::from_ref(&state);
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            })
        };

        login(state.store.as_ref(), &keys, &req("admin", "admin123"))
            .await
            .unwrap();
        let err = login(state.store.as_ref(), &keys, &req("ghost", "admin123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
        ticker.abort();
        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn require_admin_rejects_non_admin_with_valid_token() {
        let (state, user) = state_with_user("visitor", "password1", false).await;
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign(&user).unwrap();
        let identity = verify(&keys, Some(format!("Bearer {token}").as_str())).unwrap();
        let err = require_admin(state.store.as_ref(), &identity).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn require_admin_ignores_stale_admin_claim() {
        let (state, user) = state_with_user("visitor", "password1", false).await;
        let forged = Identity {
            id: user.id,
            username: user.username.clone(),
            is_admin: true,
        };
        let err = require_admin(state.store.as_ref(), &forged).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn require_admin_rejects_deleted_user() {
        let state = AppState::fake();
        let ghost = Identity {
            id: 99,
            username: "ghost".into(),
            is_admin: true,
        };
        let err = require_admin(state.store.as_ref(), &ghost).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn require_admin_accepts_live_admin() {
        let (state, user) = state_with_user("admin", "admin123", true).await;
        let identity = Identity {
            id: user.id,
            username: user.username.clone(),
            is_admin: true,
        };
        let admin = require_admin(state.store.as_ref(), &identity).await.unwrap();
        assert_eq!(admin.id, user.id);
    }
}
