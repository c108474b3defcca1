//! Outbound mail collaborator.
//!
//! Only activation mails are sent. Delivery is a trait object wired at the
//! composition root; the bundled `LogMailer` writes the mail to the log.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// An activation mail ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationMail {
    pub username: String,
    pub email: String,
    pub activation_url: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation(&self, mail: &ActivationMail) -> Result<(), MailError>;
}

/// Logs activation mails instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_activation(&self, mail: &ActivationMail) -> Result<(), MailError> {
        tracing::info!(
            username = %mail.username,
            email = %mail.email,
            activation_url = %mail.activation_url,
            "Activation mail"
        );
        Ok(())
    }
}

/// `<frontend_url>/confirm/<token>`.
pub fn activation_url(frontend_url: &str, token: &str) -> String {
    format!("{}/confirm/{}", frontend_url.trim_end_matches('/'), token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_url() {
        assert_eq!(
            activation_url("https://forum.example/", "abc"),
            "https://forum.example/confirm/abc"
        );
        assert_eq!(activation_url("http://localhost:5173", "t"), "http://localhost:5173/confirm/t");
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let mail = ActivationMail {
            username: "dave".into(),
            email: "dave@example.com".into(),
            activation_url: activation_url("http://localhost", "t"),
        };
        assert_eq!(LogMailer.send_activation(&mail).await, Ok(()));
    }
}
