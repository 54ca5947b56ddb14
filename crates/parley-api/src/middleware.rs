use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::auth::{self, AppState};
use crate::error::ApiError;

/// Extract and verify the bearer token from the Authorization header, then
/// expose its claims to downstream handlers via request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let claims = auth::decode_token(&state.jwt_secret, token)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
