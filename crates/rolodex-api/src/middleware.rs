use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use rolodex_types::api::TokenScope;

use crate::auth::{AppState, decode_token};
use crate::error::ApiError;

/// Validate the access token and attach the resolved `User` to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let claims = decode_token(&state.jwt_secret, token, TokenScope::AccessToken)?;

    let user = state
        .users
        .resolve(&claims.sub)
        .await?
        .ok_or_else(|| {
            debug!("Token for unknown user {}", claims.sub);
            ApiError::unauthorized("Could not validate credentials")
        })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}
