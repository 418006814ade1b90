//! System email for account recovery.
//!
//! Sends password reset links through the SMTP relay from the main config.
//! When no relay is configured the mail is skipped with a warning.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Service for sending system emails
pub struct SystemEmailService {
    config: EmailConfig,
}

impl SystemEmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a password reset link
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        user_name: &str,
        reset_url: &str,
        expires_in_minutes: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping password reset email to {}",
                to_email
            );
            return Ok(());
        }

        let subject = "Reset your PanchSutra password";
        let html_body = render_reset_html(user_name, reset_url, expires_in_minutes);
        let text_body = render_reset_text(user_name, reset_url, expires_in_minutes);

        self.send_email(to_email, subject, &html_body, &text_body)
            .await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(
            to = %to_email,
            subject = %subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

fn render_reset_html(user_name: &str, reset_url: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Password Reset</title>
</head>
<body style="font-family: Arial, sans-serif; background-color: #f5f5f5; margin: 0; padding: 40px 20px;">
    <div style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 8px; padding: 32px 24px;">
        <h1 style="color: #1d4ed8; font-size: 22px;">Password Reset</h1>
        <p>Namaste {user_name},</p>
        <p>We received a request to reset the password for your PanchSutra account.</p>
        <p style="text-align: center; margin: 32px 0;">
            <a href="{reset_url}" style="background: #2563eb; color: #ffffff; padding: 14px 32px; border-radius: 6px; text-decoration: none;">Reset Password</a>
        </p>
        <p style="color: #6b7280; font-size: 13px;">This link expires in {expires_in_minutes} minutes. If you did not ask for a reset, you can ignore this email.</p>
    </div>
</body>
</html>"#,
        user_name = html_escape(user_name),
        reset_url = html_escape(reset_url),
        expires_in_minutes = expires_in_minutes,
    )
}

fn render_reset_text(user_name: &str, reset_url: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"Password Reset

Namaste {user_name},

We received a request to reset the password for your PanchSutra account.

To choose a new password, visit:
{reset_url}

This link expires in {expires_in_minutes} minutes. If you did not ask for a reset, you can ignore this email."#,
    )
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
