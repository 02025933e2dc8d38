use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

/// Delivery seam for verification-code emails. The auth core only sees
/// this trait; production wires SMTP, dev falls back to logging.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .context("smtp relay")?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        let from = config.from.parse::<Mailbox>().context("smtp from address")?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("recipient address")?)
            .subject("Daily Diet - Verification Code")
            .body(format!(
                "Your verification code is {code}. It expires in a few minutes."
            ))
            .context("build email")?;
        self.transport.send(message).await.context("smtp send")?;
        info!(to = %to, "verification code email sent");
        Ok(())
    }
}

/// Used when no SMTP configuration is present: the code ends up in the
/// server log instead of an inbox.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        info!(to = %to, code = %code, "smtp not configured, logging verification code");
        Ok(())
    }
}
