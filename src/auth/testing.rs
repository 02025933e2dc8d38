//! In-memory test doubles mirroring the conditional-update semantics of
//! the Postgres store, so the service and guard logic is testable without
//! a database.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use axum::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::records::{Session, User, VerificationCode};
use crate::auth::store::{AuthStore, NewSession, StoreError};
use crate::auth::tokens::{Claims, TokenKeys, TokenKind};
use crate::config::AuthConfig;
use crate::email::Mailer;

#[derive(Default)]
pub struct MemStore {
    users: Mutex<HashMap<Uuid, User>>,
    sessions: Mutex<HashMap<Uuid, Session>>,
    codes: Mutex<HashMap<Uuid, VerificationCode>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) -> User {
        self.users.lock().unwrap().insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl AuthStore for MemStore {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::UniqueViolation {
                constraint: "users_email_key".into(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
        if !self.users.lock().unwrap().contains_key(&session.user_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "sessions_user_id_fkey".into(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let row = Session {
            id: session.id,
            user_id: session.user_id,
            credential_material: session.credential_material,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            expires_at: session.expires_at,
            revoked: false,
            created_at: now,
            updated_at: now,
        };
        self.sessions.lock().unwrap().insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn find_session_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn revoke_session(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&id) {
            Some(s) if !s.revoked => {
                s.revoked = true;
                s.updated_at = OffsetDateTime::now_utc();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn rotate_session_credential(
        &self,
        id: Uuid,
        old_material: &str,
        new_material: &str,
        expires_at: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        let now = OffsetDateTime::now_utc();
        match sessions.get_mut(&id) {
            Some(s)
                if s.credential_material == old_material && !s.revoked && s.expires_at > now =>
            {
                s.credential_material = new_material.into();
                s.expires_at = expires_at;
                s.updated_at = now;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn create_verification_code(
        &self,
        user_id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<VerificationCode, StoreError> {
        if !self.users.lock().unwrap().contains_key(&user_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "verification_codes_user_id_fkey".into(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let row = VerificationCode {
            id: Uuid::new_v4(),
            user_id,
            code: code.into(),
            expires_at,
            used: false,
            created_at: now,
            updated_at: now,
        };
        self.codes.lock().unwrap().insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_verification_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<VerificationCode>, StoreError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id && c.code == code)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn reset_password(
        &self,
        user_id: Uuid,
        code_id: Uuid,
        new_password_hash: &str,
        keep_session: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let now = OffsetDateTime::now_utc();
        {
            let mut codes = self.codes.lock().unwrap();
            match codes.get_mut(&code_id) {
                Some(c) if !c.used && c.expires_at > now => {
                    c.used = true;
                    c.updated_at = now;
                }
                _ => return Ok(false),
            }
        }
        if let Some(user) = self.users.lock().unwrap().get_mut(&user_id) {
            user.password_hash = new_password_hash.into();
            user.updated_at = now;
        }
        for session in self.sessions.lock().unwrap().values_mut() {
            if session.user_id == user_id && !session.revoked && Some(session.id) != keep_session {
                session.revoked = true;
                session.updated_at = now;
            }
        }
        Ok(true)
    }
}

/// Mailer that records instead of sending.
#[derive(Default)]
pub struct MockMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((to.into(), code.into()));
        Ok(())
    }
}

pub fn test_keys() -> TokenKeys {
    TokenKeys {
        encoding: EncodingKey::from_secret(b"test-secret"),
        decoding: jsonwebtoken::DecodingKey::from_secret(b"test-secret"),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
        access_ttl: Duration::from_secs(15 * 60),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
    }
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        scheme: crate::auth::scheme::SchemeKind::Bearer,
        session_ttl_days: 7,
        code_ttl_minutes: 5,
    }
}

/// An access token whose expiry is far enough in the past to beat the
/// verifier's leeway.
pub fn expired_access_token(keys: &TokenKeys, user: &User) -> String {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        iat: (now.unix_timestamp() - 3600) as usize,
        exp: (now.unix_timestamp() - 600) as usize,
        iss: keys.issuer.clone(),
        aud: keys.audience.clone(),
        kind: TokenKind::Access,
    };
    encode(&Header::default(), &claims, &keys.encoding).expect("sign expired token")
}
