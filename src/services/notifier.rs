// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Out-of-band delivery of OTP codes.

use crate::error::AppError;
use crate::services::otp::OTP_VALIDITY_MINUTES;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a code is being sent. Only changes the message copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Signup,
    Signin,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::Signin => "signin",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "Your sign-up code",
            OtpPurpose::Signin => "Your sign-in code",
        }
    }

    fn lead(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "Use this code to finish creating your account:",
            OtpPurpose::Signin => "Use this code to sign in:",
        }
    }
}

/// Delivers a code to an email address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError>;
}

/// Sends OTP emails through the SendGrid v3 mail API.
pub struct SendGridNotifier {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

impl SendGridNotifier {
    pub fn new(api_key: String, from: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { http, api_key, from })
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn notify(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": email }] }],
            "from": { "email": self.from },
            "subject": purpose.subject(),
            "content": [{ "type": "text/html", "value": render_email(code, purpose) }],
        });

        let response = self
            .http
            .post(SENDGRID_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Notifier(format!("SendGrid request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Notifier(format!("SendGrid HTTP {}: {}", status, text)));
        }

        tracing::info!(purpose = purpose.as_str(), "OTP email sent");
        Ok(())
    }
}

/// Development notifier: writes the code to the log instead of emailing it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError> {
        tracing::info!(
            email,
            code,
            purpose = purpose.as_str(),
            "OTP email (not sent: SENDGRID_API_KEY unset)"
        );
        Ok(())
    }
}

fn render_email(code: &str, purpose: OtpPurpose) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2 style="text-align: center;">{subject}</h2>
  <p style="text-align: center;">{lead}</p>
  <p style="text-align: center; font-size: 32px; letter-spacing: 4px; font-family: monospace;"><strong>{code}</strong></p>
  <p style="text-align: center; color: #888;">This code expires in {minutes} minutes.</p>
  <p style="text-align: center; color: #aaa; font-size: 12px;">If you didn't request this code, you can ignore this email.</p>
</div>"#,
        subject = purpose.subject(),
        lead = purpose.lead(),
        code = code,
        minutes = OTP_VALIDITY_MINUTES,
    )
}
