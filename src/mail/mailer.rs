use async_trait::async_trait;
use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, SinglePart, header},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("mail task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outgoing HTML mail
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}

/// SMTP delivery over STARTTLS
#[derive(Clone)]
pub struct SmtpMailer {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(
        server: &str,
        port: u16,
        username: &str,
        password: &str,
        from: &str,
    ) -> Result<Self, MailError> {
        let creds = Credentials::new(username.to_string(), password.to_string());
        let transport = SmtpTransport::starttls_relay(server)?
            .credentials(creds)
            .port(port)
            .build();

        Ok(SmtpMailer {
            from: from.parse()?,
            transport,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_HTML)
                    .body(html_body.to_string()),
            )?;

        // lettre's SmtpTransport is blocking
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&email)).await??;

        tracing::info!(to, subject, "email sent");
        Ok(())
    }
}

/// Used when no SMTP server is configured: the mail is only logged
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        tracing::info!(to, subject, "SMTP not configured, email logged instead of sent");
        tracing::debug!(to, body = html_body, "email body");
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingMailer;
