use anyhow::{Context, Result};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use super::Channel;
use crate::config::EmailSettings;
use crate::error::NotifyError;
use crate::monitoring::TransitionEvent;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Email notifications over SMTP submission with STARTTLS
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    pub fn new(settings: &EmailSettings, to: &str) -> Result<Self> {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
            .with_context(|| format!("Invalid SMTP relay {}", settings.smtp_host))?
            .port(settings.smtp_port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let sender = if settings.from.is_empty() { &settings.username } else { &settings.from };
        let from = sender
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid sender address {sender:?}"))?;
        let to = to.parse::<Mailbox>().with_context(|| format!("Invalid recipient address {to:?}"))?;

        Ok(Self { transport, from, to })
    }

    fn build_message(&self, event: &TransitionEvent) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(event.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(event.summary())
            .map_err(|e| NotifyError::delivery("email", e))
    }
}

#[async_trait::async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, event: &TransitionEvent) -> Result<(), NotifyError> {
        let message = self.build_message(event)?;

        self.transport.send(message).await.map_err(|e| NotifyError::delivery(self.name(), e))?;

        Ok(())
    }
}
