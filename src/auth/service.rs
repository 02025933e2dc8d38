use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::auth::cookies::{Cookie, SESSION_ID_COOKIE};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::records::User;
use crate::auth::scheme::CredentialScheme;
use crate::auth::store::{AuthStore, NewSession};
use crate::auth::tokens::TokenKeys;
use crate::auth::validate::{validate_login, validate_password_update, validate_register};
use crate::config::AuthConfig;
use crate::error::AppError;

/// What a successful login hands back to the HTTP layer.
#[derive(Debug)]
pub struct LoginOutcome {
    pub session_id: Uuid,
    pub token: String,
    pub cookies: Vec<Cookie>,
}

/// Create a user. No session is issued; login is a separate step.
pub async fn register(
    store: &dyn AuthStore,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = email.trim().to_lowercase();
    validate_register(name, &email, password)?;

    let hash = hash_password(password)?;
    let user = store.create_user(name, &email, &hash).await?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Verify credentials and open a session under the configured scheme.
///
/// An unknown email and a wrong password both fail with the same
/// `InvalidCredentials`, so responses cannot be used to enumerate users.
#[allow(clippy::too_many_arguments)]
pub async fn login(
    store: &dyn AuthStore,
    scheme: &dyn CredentialScheme,
    keys: &TokenKeys,
    auth_config: &AuthConfig,
    email: &str,
    password: &str,
    user_agent: Option<String>,
    ip_address: Option<String>,
) -> Result<LoginOutcome, AppError> {
    let email = email.trim().to_lowercase();
    validate_login(&email)?;

    let user = store.find_user_by_email(&email).await?;
    let user = match user {
        Some(u) if verify_password(password, &u.password_hash)? => u,
        _ => return Err(AppError::InvalidCredentials),
    };

    let issued = scheme.issue(keys, &user)?;
    let session_id = Uuid::new_v4();
    let expires_at = OffsetDateTime::now_utc() + Duration::days(auth_config.session_ttl_days);
    store
        .create_session(NewSession {
            id: session_id,
            user_id: user.id,
            credential_material: issued.credential_material,
            user_agent,
            ip_address,
            expires_at,
        })
        .await?;

    info!(user_id = %user.id, session_id = %session_id, "user logged in");
    Ok(LoginOutcome {
        session_id,
        token: issued.token,
        cookies: vec![
            Cookie::new(SESSION_ID_COOKIE, session_id.to_string(), true),
            issued.cookie,
        ],
    })
}

/// Revoke the session. Idempotent: revoking an unknown or already-revoked
/// session is treated as already logged out.
pub async fn logout(store: &dyn AuthStore, session_id: Uuid) -> Result<(), AppError> {
    let revoked = store.revoke_session(session_id).await?;
    if revoked > 0 {
        info!(session_id = %session_id, "session revoked");
    }
    Ok(())
}

/// Verification-code-gated password change. On success the code is marked
/// used, the hash rewritten, and every other session of the user revoked,
/// all inside one storage transaction; `current_session` survives so the
/// client performing the reset stays logged in.
pub async fn update_password(
    store: &dyn AuthStore,
    user_id: Uuid,
    new_password: &str,
    confirm_password: &str,
    verification_code: &str,
    current_session: Option<Uuid>,
) -> Result<(), AppError> {
    validate_password_update(new_password, confirm_password, verification_code)?;

    let code = store
        .find_verification_code(user_id, verification_code)
        .await?
        .ok_or(AppError::InvalidOrExpiredCode)?;
    if code.used {
        return Err(AppError::CodeAlreadyUsed);
    }
    if code.expires_at <= OffsetDateTime::now_utc() {
        return Err(AppError::InvalidOrExpiredCode);
    }

    let hash = hash_password(new_password)?;
    let applied = store
        .reset_password(user_id, code.id, &hash, current_session)
        .await?;
    if !applied {
        // Lost the mark-used race inside the transaction; nothing changed.
        return Err(AppError::CodeAlreadyUsed);
    }

    info!(user_id = %user_id, "password updated, other sessions revoked");
    Ok(())
}
