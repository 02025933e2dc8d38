use serde::Deserialize;

use crate::auth::scheme::SchemeKind;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub scheme: SchemeKind,
    pub session_ttl_days: i64,
    pub code_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub production: bool,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let production = std::env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dailydiet".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dailydiet-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };
        let auth = AuthConfig {
            scheme: std::env::var("AUTH_SCHEME")
                .ok()
                .and_then(|v| v.parse::<SchemeKind>().ok())
                .unwrap_or(SchemeKind::Bearer),
            session_ttl_days: std::env::var("SESSION_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(7),
            code_ttl_minutes: std::env::var("VERIFICATION_CODE_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(5),
        };
        // SMTP is optional; without it verification codes are only logged.
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                username: std::env::var("SMTP_USERNAME")?,
                password: std::env::var("SMTP_PASSWORD")?,
                from: std::env::var("SMTP_FROM")?,
            }),
            Err(_) => None,
        };
        Ok(Self {
            database_url,
            production,
            jwt,
            auth,
            smtp,
        })
    }
}
