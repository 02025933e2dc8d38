use rand::Rng;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::auth::store::AuthStore;
use crate::auth::validate::{is_valid_email, FieldError};
use crate::email::Mailer;
use crate::error::AppError;

/// Zero-padded 6-digit code.
fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Generate and deliver a password-reset code for the given address.
/// The code is stored with a short expiry before delivery is attempted.
pub async fn send_verification_code(
    store: &dyn AuthStore,
    mailer: &dyn Mailer,
    code_ttl_minutes: i64,
    email: &str,
) -> Result<(), AppError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation(vec![FieldError::new(
            "email",
            "Invalid email",
        )]));
    }

    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let code = generate_code();
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(code_ttl_minutes);
    store
        .create_verification_code(user.id, &code, expires_at)
        .await?;

    mailer.send_verification_code(&email, &code).await?;
    info!(user_id = %user.id, "verification code issued");
    Ok(())
}
