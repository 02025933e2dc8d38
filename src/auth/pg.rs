use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::records::{Session, User, VerificationCode};
use crate::auth::store::{AuthStore, NewSession, StoreError};

/// Postgres-backed `AuthStore`.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, credential_material, user_agent, ip_address, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, credential_material, user_agent, ip_address,
                      expires_at, revoked, created_at, updated_at
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.credential_material)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.expires_at)
        .fetch_one(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, credential_material, user_agent, ip_address,
                   expires_at, revoked, created_at, updated_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_session_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, credential_material, user_agent, ip_address,
                   expires_at, revoked, created_at, updated_at
            FROM sessions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn revoke_session(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked = TRUE, updated_at = now()
            WHERE id = $1 AND revoked = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn rotate_session_credential(
        &self,
        id: Uuid,
        old_material: &str,
        new_material: &str,
        expires_at: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        // CAS on the previously read material: under two concurrent
        // rotations only the first UPDATE matches, the loser sees 0 rows.
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET credential_material = $3, expires_at = $4, updated_at = now()
            WHERE id = $1
              AND credential_material = $2
              AND revoked = FALSE
              AND expires_at > now()
            "#,
        )
        .bind(id)
        .bind(old_material)
        .bind(new_material)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn create_verification_code(
        &self,
        user_id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<VerificationCode, StoreError> {
        sqlx::query_as::<_, VerificationCode>(
            r#"
            INSERT INTO verification_codes (user_id, code, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, code, expires_at, used, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_verification_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<VerificationCode>, StoreError> {
        sqlx::query_as::<_, VerificationCode>(
            r#"
            SELECT id, user_id, code, expires_at, used, created_at, updated_at
            FROM verification_codes
            WHERE user_id = $1 AND code = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn reset_password(
        &self,
        user_id: Uuid,
        code_id: Uuid,
        new_password_hash: &str,
        keep_session: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.db.begin().await.map_err(StoreError::from_sqlx)?;

        // Conditional mark-used: losing this race rolls the whole reset back.
        let marked = sqlx::query(
            r#"
            UPDATE verification_codes
            SET used = TRUE, updated_at = now()
            WHERE id = $1 AND used = FALSE AND expires_at > now()
            "#,
        )
        .bind(code_id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if marked.rows_affected() == 0 {
            tx.rollback().await.map_err(StoreError::from_sqlx)?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        sqlx::query(
            r#"
            UPDATE sessions
            SET revoked = TRUE, updated_at = now()
            WHERE user_id = $1 AND revoked = FALSE AND id IS DISTINCT FROM $2
            "#,
        )
        .bind(user_id)
        .bind(keep_session)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(true)
    }
}
