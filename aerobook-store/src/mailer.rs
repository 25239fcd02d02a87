//! Email transports for the notification dispatcher.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use aerobook_core::notification::{Channel, NotificationTransport, TransportError};
use aerobook_shared::Masked;

use crate::app_config::SmtpConfig;

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| TransportError(format!("SMTP relay error: {e}")))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl NotificationTransport for SmtpMailer {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| TransportError(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| TransportError(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(format!("<p>{}</p>", body))
            .map_err(|e| TransportError(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| TransportError(format!("Failed to send email: {e}")))?;

        info!("Email '{}' sent to {}", subject, Masked(to));
        Ok(())
    }
}

/// Stand-in when SMTP is not configured: the message is only logged.
pub struct LogMailer;

#[async_trait]
impl NotificationTransport for LogMailer {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), TransportError> {
        info!(
            "SMTP not configured; email '{}' to {} logged only",
            subject,
            Masked(to)
        );
        Ok(())
    }
}
