//! System email service for the password reset flow, using the SMTP
//! configuration from the main config file.

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

    /// Send a password reset email with the raw token embedded in a link.
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

        let subject = "Reset your Gearbid password";
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

        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
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

/// Render the HTML version of the password reset email
fn render_reset_html(user_name: &str, reset_url: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Password Reset</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            margin: 0;
            padding: 0;
            background-color: #f5f5f5;
        }}
        .container {{
            max-width: 560px;
            margin: 0 auto;
            padding: 40px 20px;
        }}
        .card {{
            background-color: #ffffff;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0, 0, 0, 0.06);
            overflow: hidden;
        }}
        .header {{
            background: linear-gradient(135deg, #0f766e 0%, #115e59 100%);
            color: white;
            padding: 32px 24px;
            text-align: center;
        }}
        .header h1 {{
            margin: 0;
            font-size: 24px;
            font-weight: 600;
        }}
        .content {{
            padding: 32px 24px;
        }}
        .content p {{
            margin: 0 0 16px;
            color: #374151;
            line-height: 1.6;
        }}
        .button-container {{
            text-align: center;
            margin: 32px 0;
        }}
        .button {{
            display: inline-block;
            background: linear-gradient(135deg, #0f766e 0%, #115e59 100%);
            color: white !important;
            text-decoration: none;
            padding: 14px 32px;
            border-radius: 6px;
            font-weight: 500;
            font-size: 16px;
        }}
        .note {{
            color: #6b7280;
            font-size: 13px;
            text-align: center;
            margin-top: 24px;
        }}
        .footer {{
            padding: 24px;
            text-align: center;
            color: #9ca3af;
            font-size: 12px;
            border-top: 1px solid #f3f4f6;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <div class="header">
                <h1>Password Reset</h1>
            </div>
            <div class="content">
                <p>Hi {user_name},</p>
                <p>We received a request to reset the password for your Gearbid account. Click the button below to choose a new password.</p>

                <div class="button-container">
                    <a href="{reset_url}" class="button">Reset Password</a>
                </div>

                <p class="note">This link will expire in {expires_in_minutes} minutes and can be used once. If you didn't request a reset, you can safely ignore this email.</p>
            </div>
            <div class="footer">
                <p>Sent by Gearbid - Buy and sell vehicles with confidence</p>
            </div>
        </div>
    </div>
</body>
</html>"#,
        user_name = html_escape(user_name),
        reset_url = reset_url,
        expires_in_minutes = expires_in_minutes,
    )
}

/// Render the plain text version of the password reset email
fn render_reset_text(user_name: &str, reset_url: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"Password Reset

Hi {user_name},

We received a request to reset the password for your Gearbid account.

To choose a new password, visit:
{reset_url}

This link will expire in {expires_in_minutes} minutes and can be used once.

If you didn't request a reset, you can safely ignore this email.

---
Sent by Gearbid - Buy and sell vehicles with confidence"#,
        user_name = user_name,
        reset_url = reset_url,
        expires_in_minutes = expires_in_minutes,
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
