//! Outgoing mail.
//!
//! Uses lettre over SMTP. With `email.mock = true` (the default) messages
//! are logged instead of sent.

pub mod smtp;

use crate::app_config::{self, EmailConfig};

pub type EmailResult<T> = Result<T, EmailError>;

#[derive(Debug)]
pub enum EmailError {
    /// Bad addresses or SMTP settings
    ConfigError(String),
    BuildError(lettre::error::Error),
    SendError(lettre::transport::smtp::Error),
}

impl std::fmt::Display for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailError::ConfigError(msg) => write!(f, "Email config error: {}", msg),
            EmailError::BuildError(e) => write!(f, "Email build error: {}", e),
            EmailError::SendError(e) => write!(f, "Email send error: {}", e),
        }
    }
}

impl std::error::Error for EmailError {}

impl From<lettre::error::Error> for EmailError {
    fn from(e: lettre::error::Error) -> Self {
        EmailError::BuildError(e)
    }
}

impl From<lettre::transport::smtp::Error> for EmailError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        EmailError::SendError(e)
    }
}

/// A rendered message ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body_text: String,
}

pub fn password_reset_email(to: &str, display_name: &str, token: &str) -> OutgoingEmail {
    let site = app_config::site();
    let link = format!(
        "{}/reset-password?token={}",
        site.base_url.trim_end_matches('/'),
        token
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Reset your {} password", site.name),
        body_text: format!(
            "Hi {},\n\n\
             Someone asked to reset the password for your {} account.\n\
             Open this link within the next hour to choose a new one:\n\n\
             {}\n\n\
             If this wasn't you, ignore this email and your password stays the same.\n",
            display_name, site.name, link
        ),
    }
}

/// Send an email, or log it in mock mode.
pub async fn send_email(email: &OutgoingEmail) -> EmailResult<()> {
    let config: EmailConfig = app_config::email();

    if config.mock {
        log::info!("MOCK EMAIL:");
        log::info!("  To: {}", email.to);
        log::info!("  Subject: {}", email.subject);
        log::info!("  Body: {}", email.body_text);
        return Ok(());
    }

    smtp::send_email(&config, email).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_reset_email_links_to_token() {
        let email = password_reset_email("meera@example.com", "Meera", "abc123");
        assert_eq!(email.to, "meera@example.com");
        assert!(email.subject.starts_with("Reset your"));
        assert!(email
            .body_text
            .contains("/reset-password?token=abc123"));
        assert!(email.body_text.contains("Hi Meera"));
    }
}
