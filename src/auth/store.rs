use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::records::{Session, User, VerificationCode};

/// Storage-layer error contract. Constraint violations are surfaced as
/// their own variants so the domain can name the offending field instead
/// of leaking a raw database error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error by Postgres SQLSTATE: 23505 unique, 23503 FK.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            let constraint = db.constraint().unwrap_or_default().to_string();
            match db.code().as_deref() {
                Some("23505") => return StoreError::UniqueViolation { constraint },
                Some("23503") => return StoreError::ForeignKeyViolation { constraint },
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// Fields for a session row inserted at login.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub credential_material: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: OffsetDateTime,
}

/// The auth subsystem's storage client. Constructed once at startup and
/// passed around as `Arc<dyn AuthStore>`; the Postgres implementation lives
/// in `pg.rs`, tests run against an in-memory double.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    async fn find_session_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Session>, StoreError>;

    /// Marks the session revoked. Returns the affected-row count; revoking
    /// an already-revoked or unknown session affects zero rows.
    async fn revoke_session(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Compare-and-swap rotation: replaces `credential_material` and renews
    /// the expiry only while the row still holds `old_material`, is not
    /// revoked, and has not expired. Zero affected rows means a concurrent
    /// rotation or revocation won.
    async fn rotate_session_credential(
        &self,
        id: Uuid,
        old_material: &str,
        new_material: &str,
        expires_at: OffsetDateTime,
    ) -> Result<u64, StoreError>;

    async fn create_verification_code(
        &self,
        user_id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<VerificationCode, StoreError>;

    async fn find_verification_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<VerificationCode>, StoreError>;

    /// The three-table password reset, atomically: mark the code used,
    /// rewrite the password hash, revoke every other live session of the
    /// user (`keep_session` survives). Returns `false` without applying
    /// anything when the conditional code-mark hits zero rows, i.e. the
    /// code was consumed concurrently or expired in the meantime.
    async fn reset_password(
        &self,
        user_id: Uuid,
        code_id: Uuid,
        new_password_hash: &str,
        keep_session: Option<Uuid>,
    ) -> Result<bool, StoreError>;
}
