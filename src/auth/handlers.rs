use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::cookies::{clear_cookies, set_cookies};
use crate::auth::dto::{
    LoginRequest, LoginResponse, MessageResponse, PublicUser, RegisterRequest,
    UpdatePasswordRequest,
};
use crate::auth::guard::CurrentUser;
use crate::auth::service;
use crate::auth::tokens::TokenKeys;
use crate::auth::validate::FieldError;
use crate::error::AppError;
use crate::state::AppState;

/// Routes that need no session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes behind the session guard.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/update-password", post(update_password))
        .route("/me", get(get_me))
}

/// A missing or undecodable JSON body is one validation detail, distinct
/// from field-level failures.
fn require_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|_| {
        AppError::Validation(vec![FieldError::new("", "Request body is required")])
    })
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let body = require_body(payload)?;
    service::register(state.store.as_ref(), &body.name, &body.email, &body.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully",
        }),
    ))
}

#[instrument(skip(state, headers, payload))]
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<LoginResponse>), AppError> {
    let body = require_body(payload)?;
    let keys = TokenKeys::from_ref(&state);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let outcome = service::login(
        state.store.as_ref(),
        state.scheme.as_ref(),
        &keys,
        &state.config.auth,
        &body.email,
        &body.password,
        user_agent,
        client_ip,
    )
    .await?;

    let mut response_headers = HeaderMap::new();
    set_cookies(&mut response_headers, &outcome.cookies, state.config.production);
    Ok((
        response_headers,
        Json(LoginResponse {
            session_id: outcome.session_id,
            token: outcome.token,
        }),
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<(HeaderMap, Json<MessageResponse>), AppError> {
    service::logout(state.store.as_ref(), user.session_id).await?;
    let mut headers = HeaderMap::new();
    clear_cookies(&mut headers, state.scheme.cookie_names());
    Ok((
        headers,
        Json(MessageResponse {
            message: "User logged out successfully",
        }),
    ))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
async fn update_password(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let body = require_body(payload)?;
    service::update_password(
        state.store.as_ref(),
        user.id,
        &body.new_password,
        &body.confirm_password,
        &body.verification_code,
        Some(user.session_id),
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully",
    }))
}

#[instrument(skip(user), fields(user_id = %user.id))]
async fn get_me(user: CurrentUser) -> Json<PublicUser> {
    Json(PublicUser {
        id: user.id,
        name: user.name,
        email: user.email,
    })
}
