use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::store::StoreError;
use crate::auth::validate::FieldError;

/// Domain error taxonomy. Every variant carries a stable machine code and
/// maps to one HTTP status; unexpected errors collapse into `Internal` and
/// are logged server-side without leaking detail to the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("Duplicate entry for the unique field '{field}'")]
    DuplicateEntry { field: String },
    #[error("This record is linked to another resource and cannot be deleted or modified")]
    ForeignKeyConflict,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Invalid session")]
    InvalidSession,
    #[error("Session has been revoked")]
    SessionRevoked,
    #[error("Session has expired")]
    SessionExpired,
    #[error("User not found")]
    UserNotFound,
    #[error("Meal not found")]
    MealNotFound,
    #[error("Invalid or expired verification code")]
    InvalidOrExpiredCode,
    #[error("Verification code has already been used")]
    CodeAlreadyUsed,
    #[error("An unknown error occurred")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DuplicateEntry { .. } => "DUPLICATE_ENTRY",
            AppError::ForeignKeyConflict => "FOREIGN_KEY_CONFLICT",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::InvalidSession => "INVALID_SESSION",
            AppError::SessionRevoked => "SESSION_REVOKED",
            AppError::SessionExpired => "SESSION_EXPIRED",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::MealNotFound => "MEAL_NOT_FOUND",
            AppError::InvalidOrExpiredCode => "INVALID_OR_EXPIRED_CODE",
            AppError::CodeAlreadyUsed => "CODE_ALREADY_USED",
            AppError::Internal(_) => "UNKNOWN_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::DuplicateEntry { .. }
            | AppError::InvalidOrExpiredCode
            | AppError::CodeAlreadyUsed => StatusCode::BAD_REQUEST,
            AppError::ForeignKeyConflict => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::InvalidSession
            | AppError::SessionRevoked
            | AppError::SessionExpired => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound | AppError::MealNotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    name: &'static str,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = match self {
            AppError::Validation(details) => ("Validation failed".to_string(), Some(details)),
            AppError::Internal(source) => {
                error!(error = %source, "internal error");
                ("An unknown error occurred".to_string(), None)
            }
            other => (other.to_string(), None),
        };
        let body = ErrorBody {
            name: "AppError",
            code,
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint } => AppError::DuplicateEntry {
                field: field_from_constraint(&constraint),
            },
            StoreError::ForeignKeyViolation { .. } => AppError::ForeignKeyConflict,
            StoreError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

/// Best-effort column name out of a Postgres constraint like `users_email_key`.
fn field_from_constraint(constraint: &str) -> String {
    constraint
        .strip_suffix("_key")
        .or_else(|| constraint.strip_suffix("_unique"))
        .or_else(|| constraint.strip_suffix("_fkey"))
        .and_then(|s| s.split_once('_').map(|(_, col)| col))
        .unwrap_or(constraint)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_name_maps_to_column() {
        assert_eq!(field_from_constraint("users_email_key"), "email");
        assert_eq!(field_from_constraint("sessions_user_id_fkey"), "user_id");
        assert_eq!(field_from_constraint("weird"), "weird");
    }

    #[test]
    fn unique_violation_becomes_duplicate_entry() {
        let err = AppError::from(StoreError::UniqueViolation {
            constraint: "users_email_key".into(),
        });
        match err {
            AppError::DuplicateEntry { field } => assert_eq!(field, "email"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::SessionRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::CodeAlreadyUsed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::ForeignKeyConflict.status(), StatusCode::CONFLICT);
    }
}
