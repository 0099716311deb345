use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::types::{GrcError, User};
use crate::AppState;

/// Header naming the acting user
pub const USER_HEADER: &str = "X-User-Id";

/// Middleware to validate API key for service-to-service authentication.
///
/// If `API_KEY` is configured, all requests must include a matching `X-API-Key` header.
/// If `API_KEY` is not set, all requests are allowed (open mode).
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected_key) = &state.config.api_key else {
        return Ok(next.run(request).await);
    };

    let provided_key = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());

    match provided_key {
        Some(key) if key == expected_key => Ok(next.run(request).await),
        Some(_) => {
            warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!("Missing X-API-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Middleware to validate Admin API key for catalog and settings management.
///
/// ADMIN_API_KEY is REQUIRED for admin endpoints. If not configured, admin endpoints are disabled.
pub async fn require_admin_api_key(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected_key) = &state.config.admin_api_key else {
        warn!("Admin endpoint called but ADMIN_API_KEY is not configured");
        return Err(StatusCode::FORBIDDEN);
    };

    let provided_key = request
        .headers()
        .get("X-Admin-API-Key")
        .and_then(|v| v.to_str().ok());

    match provided_key {
        Some(key) if key == expected_key => Ok(next.run(request).await),
        Some(_) => {
            warn!("Invalid admin API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!("Missing X-Admin-API-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// The user performing the request, resolved from `X-User-Id`
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = GrcError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                GrcError::Unauthenticated(format!("Missing {} header", USER_HEADER))
            })?;

        match state.store.user(user_id).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                warn!("Request from unknown user {}", user_id);
                Err(GrcError::Unauthenticated(format!("Unknown user {}", user_id)))
            }
        }
    }
}
