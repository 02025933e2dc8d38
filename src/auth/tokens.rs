use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::records::User;
use crate::auth::store::AuthStore;
use crate::config::JwtConfig;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Minimal identity claim: id, name, email. Never the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct TokenKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            refresh_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_minutes as u64) * 60),
        }
    }
}

impl TokenKeys {
    fn sign_with_kind(&self, user: &User, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        self.sign_with_kind(user, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user: &User) -> anyhow::Result<String> {
        self.sign_with_kind(user, TokenKind::Refresh)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    /// Full verification: signature, issuer, audience, expiry. An expiry
    /// failure is reported as its own variant so the guard can branch into
    /// rotation.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            }
        })?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    /// Decode with expiry validation disabled; every other check stays on.
    /// Only rotation may use this.
    pub fn decode_expired(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = self.validation();
        validation.validate_exp = false;
        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(TokenError::Invalid)?;
        Ok(data.claims)
    }
}

/// Opaque anti-forgery token: 32 bytes from the OS CSPRNG, hex-encoded.
pub fn csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Refresh-token rotation, the replay-defense point of the bearer scheme.
///
/// Recovers the claimed identity from the *expired* access token, confirms
/// the user and session still stand, then swaps in a fresh refresh token
/// with a renewed expiry. The swap is a compare-and-swap on the session's
/// current credential material, so a stale access token cannot self-extend
/// a revoked or expired session and concurrent rotations cannot both win.
pub async fn rotate_access_token(
    keys: &TokenKeys,
    store: &dyn AuthStore,
    old_access_token: &str,
    session_id: Uuid,
) -> Result<String, AppError> {
    let claims = keys
        .decode_expired(old_access_token)
        .map_err(|_| AppError::InvalidToken)?;
    if claims.kind != TokenKind::Access {
        return Err(AppError::InvalidToken);
    }

    let user = store
        .find_user_by_id(claims.sub)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let session = store
        .find_session_for_user(user.id, session_id)
        .await?
        .ok_or(AppError::InvalidSession)?;
    if session.revoked {
        return Err(AppError::SessionRevoked);
    }
    let now = OffsetDateTime::now_utc();
    if session.expires_at <= now {
        return Err(AppError::SessionExpired);
    }

    let new_access = keys.sign_access(&user)?;
    let new_refresh = keys.sign_refresh(&user)?;
    let new_expiry = now + TimeDuration::seconds(keys.refresh_ttl.as_secs() as i64);

    let rotated = store
        .rotate_session_credential(session_id, &session.credential_material, &new_refresh, new_expiry)
        .await?;
    if rotated == 0 {
        // A concurrent rotation or revocation got there first.
        return Err(AppError::InvalidSession);
    }

    debug!(user_id = %user.id, session_id = %session_id, "refresh token rotated");
    Ok(new_access)
}
