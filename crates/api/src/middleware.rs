//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use oddhay_core::PushNotificationService;
use oddhay_db::repositories::UserRepository;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_repo: UserRepository,
    pub push_service: PushNotificationService,
}

/// Authentication middleware.
///
/// Resolves a bearer token to a user and stashes the user model in the
/// request extensions for the [`crate::extractors::AuthUser`] family of
/// extractors. An invalid or missing token leaves the request
/// anonymous; individual endpoints decide whether that is acceptable.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_repo.find_by_token(token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Token lookup failed");
            }
        }
    }

    next.run(req).await
}
