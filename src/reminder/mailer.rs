use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::AppConfig;
use crate::error::AppError;

pub const BIRTHDAY_SUBJECT: &str = "Happy birthday from Roy Barbershop";

pub const BIRTHDAY_BODY: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Happy Birthday!</title>
</head>
<body>
    <h2>Happy birthday!</h2>
    <p>We would like to open your birthday week with our warmest wishes and a special invitation.</p>
    <p>Within the next 5 days you are welcome to a free haircut on us, as a thank you for being with us all this time.</p>
    <p>Let us make your special day a sharp one!</p>
    <p>Book your visit at <a href="https://roybarbershop.com/dat-lich">roybarbershop.com/dat-lich</a>.</p>
    <p>Best regards,<br>Roy Barbershop</p>
</body>
</html>
"#;

/// Outgoing email, HTML body.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}

/// SMTP relay with STARTTLS and PLAIN credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let address: Address = config.sender_email.parse().map_err(|e| {
            AppError::Validation(format!("Invalid SENDER_EMAIL {}: {e}", config.sender_email))
        })?;
        let from = Mailbox::new(Some(config.sender_name.clone()), address);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::ExternalService(format!("SMTP relay {}: {e}", config.smtp_host)))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.sender_email.clone(),
                config.sender_password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid email address {to}: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| AppError::ExternalService(format!("Cannot build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP send to {to} failed: {e}")))?;
        Ok(())
    }
}

/// Used when no SMTP credentials are configured: logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), AppError> {
        tracing::info!(to = %to, subject = %subject, "Email delivery disabled, message not sent");
        Ok(())
    }
}
