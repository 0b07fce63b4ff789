use super::{EmailError, EmailResult, OutgoingEmail};
use crate::app_config::EmailConfig;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// Send a plain-text email via SMTP
pub async fn send_email(config: &EmailConfig, email: &OutgoingEmail) -> EmailResult<()> {
    let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
        .parse()
        .map_err(|e| EmailError::ConfigError(format!("Invalid from address: {}", e)))?;

    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| EmailError::ConfigError(format!("Invalid to address: {}", e)))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body_text.clone())?;

    let mailer = if config.smtp_tls {
        SmtpTransport::relay(&config.smtp_host)?
    } else {
        SmtpTransport::builder_dangerous(&config.smtp_host)
    };
    let mailer = if config.smtp_username.is_empty() {
        mailer.port(config.smtp_port).build()
    } else {
        mailer
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .port(config.smtp_port)
            .build()
    };

    // lettre's SmtpTransport is blocking.
    actix_web::web::block(move || mailer.send(&message))
        .await
        .map_err(|e| EmailError::ConfigError(e.to_string()))??;

    log::info!("Email sent to: {}", email.to);
    Ok(())
}
