use std::str::FromStr;

use axum::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::cookies::{Cookie, ACCESS_TOKEN_COOKIE, CSRF_TOKEN_COOKIE, SESSION_ID_COOKIE};
use crate::auth::guard::CurrentUser;
use crate::auth::records::User;
use crate::auth::store::AuthStore;
use crate::auth::tokens::{self, rotate_access_token, TokenError, TokenKeys, TokenKind};
use crate::error::AppError;

/// Which credential scheme the deployment runs. Selected once at
/// composition time (`AUTH_SCHEME`), never per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Bearer,
    Csrf,
}

impl FromStr for SchemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bearer" => Ok(SchemeKind::Bearer),
            "csrf" => Ok(SchemeKind::Csrf),
            other => Err(format!("unknown auth scheme '{other}'")),
        }
    }
}

/// Login artifacts produced by a scheme: the opaque material persisted on
/// the session row, the token handed back in the response body, and the
/// scheme's own cookie (the session-id cookie is added by the service).
#[derive(Debug)]
pub struct Issued {
    pub credential_material: String,
    pub token: String,
    pub cookie: Cookie,
}

/// Credentials as read off an incoming request.
#[derive(Debug, Default)]
pub struct Presented {
    pub session_id: Option<String>,
    pub access_token: Option<String>,
    pub csrf_token: Option<String>,
}

/// A fully resolved identity, plus a replacement access-token cookie when
/// the bearer scheme rotated mid-request.
#[derive(Debug)]
pub struct Authenticated {
    pub user: CurrentUser,
    pub refreshed: Option<Cookie>,
}

#[async_trait]
pub trait CredentialScheme: Send + Sync {
    fn issue(&self, keys: &TokenKeys, user: &User) -> anyhow::Result<Issued>;

    async fn authenticate(
        &self,
        keys: &TokenKeys,
        store: &dyn AuthStore,
        presented: &Presented,
    ) -> Result<Authenticated, AppError>;

    /// Every cookie the scheme may have set, for clearing on failure.
    fn cookie_names(&self) -> &'static [&'static str];
}

pub fn build_scheme(kind: SchemeKind) -> Box<dyn CredentialScheme> {
    match kind {
        SchemeKind::Bearer => Box::new(BearerRefresh),
        SchemeKind::Csrf => Box::new(CsrfSession),
    }
}

fn parse_session_id(presented: &Presented) -> Result<Uuid, AppError> {
    presented
        .session_id
        .as_deref()
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(AppError::InvalidToken)
}

/// Short-lived access JWT plus a refresh JWT stored on the session row;
/// an expired access token is rotated in place by the guard.
pub struct BearerRefresh;

#[async_trait]
impl CredentialScheme for BearerRefresh {
    fn issue(&self, keys: &TokenKeys, user: &User) -> anyhow::Result<Issued> {
        let access = keys.sign_access(user)?;
        let refresh = keys.sign_refresh(user)?;
        Ok(Issued {
            credential_material: refresh,
            cookie: Cookie::new(ACCESS_TOKEN_COOKIE, access.clone(), true),
            token: access,
        })
    }

    async fn authenticate(
        &self,
        keys: &TokenKeys,
        store: &dyn AuthStore,
        presented: &Presented,
    ) -> Result<Authenticated, AppError> {
        let session_id = parse_session_id(presented)?;
        let token = presented.access_token.as_deref().ok_or(AppError::InvalidToken)?;

        match keys.verify(token) {
            Ok(claims) => {
                if claims.kind != TokenKind::Access {
                    return Err(AppError::InvalidToken);
                }
                let session = store
                    .find_session_for_user(claims.sub, session_id)
                    .await?
                    .ok_or(AppError::InvalidSession)?;
                if session.revoked {
                    return Err(AppError::SessionRevoked);
                }
                if session.expires_at <= OffsetDateTime::now_utc() {
                    return Err(AppError::SessionExpired);
                }
                Ok(Authenticated {
                    user: CurrentUser {
                        id: claims.sub,
                        name: claims.name,
                        email: claims.email,
                        session_id,
                    },
                    refreshed: None,
                })
            }
            // Signature fine, only the expiry failed: rotate.
            Err(TokenError::Expired) => {
                let new_access = rotate_access_token(keys, store, token, session_id).await?;
                let claims = keys.verify(&new_access).map_err(|_| AppError::InvalidToken)?;
                Ok(Authenticated {
                    user: CurrentUser {
                        id: claims.sub,
                        name: claims.name,
                        email: claims.email,
                        session_id,
                    },
                    refreshed: Some(Cookie::new(ACCESS_TOKEN_COOKIE, new_access, true)),
                })
            }
            Err(TokenError::Invalid(_)) => Err(AppError::InvalidToken),
        }
    }

    fn cookie_names(&self) -> &'static [&'static str] {
        &[ACCESS_TOKEN_COOKIE, SESSION_ID_COOKIE]
    }
}

/// HTTP-only session cookie plus a JS-readable CSRF token echoed back in a
/// header; the CSRF token doubles as the session's credential material.
pub struct CsrfSession;

#[async_trait]
impl CredentialScheme for CsrfSession {
    fn issue(&self, _keys: &TokenKeys, _user: &User) -> anyhow::Result<Issued> {
        let csrf = tokens::csrf_token();
        Ok(Issued {
            credential_material: csrf.clone(),
            cookie: Cookie::new(CSRF_TOKEN_COOKIE, csrf.clone(), false),
            token: csrf,
        })
    }

    async fn authenticate(
        &self,
        _keys: &TokenKeys,
        store: &dyn AuthStore,
        presented: &Presented,
    ) -> Result<Authenticated, AppError> {
        let session_id = parse_session_id(presented)?;
        let csrf = presented.csrf_token.as_deref().ok_or(AppError::InvalidToken)?;

        let session = store
            .find_session(session_id)
            .await?
            .ok_or(AppError::InvalidSession)?;
        if session.revoked {
            return Err(AppError::SessionRevoked);
        }
        if session.expires_at <= OffsetDateTime::now_utc() {
            return Err(AppError::SessionExpired);
        }
        if session.credential_material != csrf {
            return Err(AppError::InvalidToken);
        }

        let user = store
            .find_user_by_id(session.user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        Ok(Authenticated {
            user: CurrentUser {
                id: user.id,
                name: user.name,
                email: user.email,
                session_id,
            },
            refreshed: None,
        })
    }

    fn cookie_names(&self) -> &'static [&'static str] {
        &[CSRF_TOKEN_COOKIE, SESSION_ID_COOKIE]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::NewSession;
    use crate::auth::testing::{expired_access_token, test_keys, MemStore};
    use time::Duration;

    fn seed_user(id: Uuid) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id,
            name: "a".into(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed_session(
        store: &MemStore,
        user_id: Uuid,
        material: &str,
        ttl: Duration,
    ) -> Uuid {
        store
            .create_session(NewSession {
                id: Uuid::new_v4(),
                user_id,
                credential_material: material.into(),
                user_agent: None,
                ip_address: None,
                expires_at: OffsetDateTime::now_utc() + ttl,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn bearer_accepts_valid_token_and_live_session() {
        let keys = test_keys();
        let store = MemStore::new();
        let u = store.insert_user(seed_user(Uuid::new_v4())).await;
        let sid = seed_session(&store, u.id, "refresh", Duration::days(7)).await;

        let presented = Presented {
            session_id: Some(sid.to_string()),
            access_token: Some(keys.sign_access(&u).unwrap()),
            csrf_token: None,
        };
        let auth = BearerRefresh
            .authenticate(&keys, &store, &presented)
            .await
            .expect("authenticate");
        assert_eq!(auth.user.id, u.id);
        assert_eq!(auth.user.session_id, sid);
        assert!(auth.refreshed.is_none());
    }

    #[tokio::test]
    async fn bearer_rotates_on_expired_access_token() {
        let keys = test_keys();
        let store = MemStore::new();
        let u = store.insert_user(seed_user(Uuid::new_v4())).await;
        let sid = seed_session(&store, u.id, "refresh", Duration::days(7)).await;

        let presented = Presented {
            session_id: Some(sid.to_string()),
            access_token: Some(expired_access_token(&keys, &u)),
            csrf_token: None,
        };
        let auth = BearerRefresh
            .authenticate(&keys, &store, &presented)
            .await
            .expect("rotation path");
        assert_eq!(auth.user.id, u.id);
        let refreshed = auth.refreshed.expect("new access cookie");
        assert_eq!(refreshed.name, ACCESS_TOKEN_COOKIE);
        assert!(keys.verify(&refreshed.value).is_ok());
    }

    #[tokio::test]
    async fn bearer_expired_token_on_revoked_session_is_rejected() {
        let keys = test_keys();
        let store = MemStore::new();
        let u = store.insert_user(seed_user(Uuid::new_v4())).await;
        let sid = seed_session(&store, u.id, "refresh", Duration::days(7)).await;
        store.revoke_session(sid).await.unwrap();

        let presented = Presented {
            session_id: Some(sid.to_string()),
            access_token: Some(expired_access_token(&keys, &u)),
            csrf_token: None,
        };
        let err = BearerRefresh
            .authenticate(&keys, &store, &presented)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionRevoked));
    }

    #[tokio::test]
    async fn bearer_rejects_valid_token_on_expired_session() {
        let keys = test_keys();
        let store = MemStore::new();
        let u = store.insert_user(seed_user(Uuid::new_v4())).await;
        let sid = seed_session(&store, u.id, "refresh", Duration::minutes(-1)).await;

        let presented = Presented {
            session_id: Some(sid.to_string()),
            access_token: Some(keys.sign_access(&u).unwrap()),
            csrf_token: None,
        };
        let err = BearerRefresh
            .authenticate(&keys, &store, &presented)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));
    }

    #[tokio::test]
    async fn bearer_rejects_missing_or_malformed_artifacts() {
        let keys = test_keys();
        let store = MemStore::new();
        let err = BearerRefresh
            .authenticate(&keys, &store, &Presented::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        let presented = Presented {
            session_id: Some(Uuid::new_v4().to_string()),
            access_token: Some("not-a-jwt".into()),
            csrf_token: None,
        };
        let err = BearerRefresh
            .authenticate(&keys, &store, &presented)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn csrf_accepts_matching_token() {
        let keys = test_keys();
        let store = MemStore::new();
        let u = store.insert_user(seed_user(Uuid::new_v4())).await;
        let sid = seed_session(&store, u.id, "csrf-secret", Duration::days(7)).await;

        let presented = Presented {
            session_id: Some(sid.to_string()),
            access_token: None,
            csrf_token: Some("csrf-secret".into()),
        };
        let auth = CsrfSession
            .authenticate(&keys, &store, &presented)
            .await
            .expect("authenticate");
        assert_eq!(auth.user.id, u.id);
        assert_eq!(auth.user.email, "a@x.com");
    }

    #[tokio::test]
    async fn csrf_mismatch_is_a_generic_token_error() {
        let keys = test_keys();
        let store = MemStore::new();
        let u = store.insert_user(seed_user(Uuid::new_v4())).await;
        let sid = seed_session(&store, u.id, "csrf-secret", Duration::days(7)).await;

        let presented = Presented {
            session_id: Some(sid.to_string()),
            access_token: None,
            csrf_token: Some("wrong".into()),
        };
        let err = CsrfSession
            .authenticate(&keys, &store, &presented)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn csrf_categorizes_revoked_and_expired_sessions() {
        let keys = test_keys();
        let store = MemStore::new();
        let u = store.insert_user(seed_user(Uuid::new_v4())).await;

        let revoked = seed_session(&store, u.id, "m", Duration::days(7)).await;
        store.revoke_session(revoked).await.unwrap();
        let presented = Presented {
            session_id: Some(revoked.to_string()),
            access_token: None,
            csrf_token: Some("m".into()),
        };
        let err = CsrfSession
            .authenticate(&keys, &store, &presented)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionRevoked));

        let expired = seed_session(&store, u.id, "m", Duration::minutes(-1)).await;
        let presented = Presented {
            session_id: Some(expired.to_string()),
            access_token: None,
            csrf_token: Some("m".into()),
        };
        let err = CsrfSession
            .authenticate(&keys, &store, &presented)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));
    }

    #[test]
    fn scheme_kind_parses_from_env_strings() {
        assert_eq!("bearer".parse::<SchemeKind>().unwrap(), SchemeKind::Bearer);
        assert_eq!("csrf".parse::<SchemeKind>().unwrap(), SchemeKind::Csrf);
        assert!("jwt".parse::<SchemeKind>().is_err());
    }
}
