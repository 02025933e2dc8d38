mod handlers;
mod mailer;
pub mod service;

pub use handlers::router;
pub use mailer::{LogMailer, Mailer, SmtpMailer};
