//! API token authentication middleware
//!
//! Clients send `Authorization: Token <value>`. The value must match the
//! configured token exactly. With no token configured every request passes
//! (a warning is logged once at startup).

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::AppState;

const TOKEN_SCHEME: &str = "Token ";

/// Reject requests without the configured API token
///
/// Applied to protected routes only; `/health` stays open.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token_matches = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(TOKEN_SCHEME))
        .map(|token| token == expected);

    match token_matches {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            warn!(path = %request.uri().path(), "Rejected request with wrong API token");
            Err(AuthError)
        }
        None => Err(AuthError),
    }
}

/// Authentication failure; deliberately carries no detail
#[derive(Debug)]
pub struct AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        StatusCode::UNAUTHORIZED.into_response()
    }
}
