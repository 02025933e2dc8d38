use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use crate::auth::dto::MessageResponse;
use crate::auth::validate::FieldError;
use crate::email::service;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/email/verification-code", post(request_verification_code))
}

#[derive(Debug, Deserialize)]
struct VerificationCodeRequest {
    email: String,
}

#[instrument(skip(state, payload))]
async fn request_verification_code(
    State(state): State<AppState>,
    payload: Result<Json<VerificationCodeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let body = payload.map(|Json(b)| b).map_err(|_| {
        AppError::Validation(vec![FieldError::new("", "Request body is required")])
    })?;
    service::send_verification_code(
        state.store.as_ref(),
        state.mailer.as_ref(),
        state.config.auth.code_ttl_minutes,
        &body.email,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Verification code sent",
    }))
}
