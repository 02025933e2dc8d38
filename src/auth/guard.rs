use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::cookies::{
    clear_cookies, read_cookie, set_cookies, ACCESS_TOKEN_COOKIE, CSRF_HEADER, SESSION_ID_COOKIE,
};
use crate::auth::scheme::Presented;
use crate::auth::tokens::TokenKeys;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated identity attached to the request by `require_auth`.
/// Always fully populated; a partial identity never reaches a handler.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub session_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::InvalidToken)
    }
}

/// Session-guard middleware for protected routes. Resolves the identity
/// through the configured credential scheme; on any failure the scheme's
/// cookies are cleared on the 401 before it is sent.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let keys = TokenKeys::from_ref(&state);
    let headers = req.headers();
    let presented = Presented {
        session_id: read_cookie(headers, SESSION_ID_COOKIE),
        access_token: read_cookie(headers, ACCESS_TOKEN_COOKIE),
        csrf_token: headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
    };

    match state
        .scheme
        .authenticate(&keys, state.store.as_ref(), &presented)
        .await
    {
        Ok(auth) => {
            let refreshed = auth.refreshed;
            req.extensions_mut().insert(auth.user);
            let mut response = next.run(req).await;
            if let Some(cookie) = refreshed {
                set_cookies(response.headers_mut(), &[cookie], state.config.production);
            }
            response
        }
        Err(err) => {
            warn!(code = err.code(), "request authentication failed");
            let mut response = err.into_response();
            clear_cookies(response.headers_mut(), state.scheme.cookie_names());
            response
        }
    }
}
