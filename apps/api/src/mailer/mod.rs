//! Outgoing email. Without SMTP credentials the mailer only logs what it
//! would have sent, which keeps local setups working.

pub mod templates;

use lettre::{
    address::AddressError,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use templates::EmailContent;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    frontend_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let frontend_url = config.frontend_url.trim_end_matches('/').to_string();
        let from = config
            .smtp_from_email
            .clone()
            .or_else(|| config.smtp_user.clone())
            .unwrap_or_else(|| "noreply@localhost".to_string());

        let transport = if config.smtp_enabled() {
            let credentials = Credentials::new(
                config.smtp_user.clone().unwrap_or_default(),
                config.smtp_password.clone().unwrap_or_default(),
            );
            Some(
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                    .port(config.smtp_port)
                    .credentials(credentials)
                    .build(),
            )
        } else {
            warn!("SMTP credentials not configured, emails will only be logged");
            None
        };

        Ok(Self {
            transport,
            from,
            frontend_url,
        })
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/verify-email?token={token}", self.frontend_url)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={token}", self.frontend_url)
    }

    pub async fn send_verification_email(
        &self,
        to: &str,
        first_name: &str,
        token: &str,
    ) -> Result<(), MailError> {
        let content = templates::verification_email(first_name, &self.verification_link(token));
        self.send(to, content).await
    }

    pub async fn send_password_reset_email(
        &self,
        to: &str,
        first_name: &str,
        token: &str,
    ) -> Result<(), MailError> {
        let content = templates::password_reset_email(first_name, &self.reset_link(token));
        self.send(to, content).await
    }

    async fn send(&self, to: &str, content: EmailContent) -> Result<(), MailError> {
        let Some(transport) = &self.transport else {
            info!("[simulated email] to={to} subject={}", content.subject);
            return Ok(());
        };

        let message = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .to(to.parse::<Mailbox>()?)
            .subject(content.subject)
            .multipart(MultiPart::alternative_plain_html(content.text, content.html))?;

        transport.send(message).await?;
        info!("Email sent to {to}");
        Ok(())
    }
}
