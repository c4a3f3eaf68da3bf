//! Transactional Email
//!
//! Thin wrapper over the Resend `/emails` API.

use serde::{Deserialize, Serialize};

use farchat_core::{FarchatError, Result};

pub const RESEND_BASE_URL: &str = "https://api.resend.com";
pub const DEFAULT_FROM: &str = "FARchat <login@farchat.app>";

/// An outgoing message
#[derive(Clone, Debug)]
pub struct EmailRequest {
    pub to: String,
    pub subject: String,
    pub html: String,

    /// Sender; the mailer default when absent
    pub from: Option<String>,
}

impl EmailRequest {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            from: None,
        }
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

#[derive(Serialize)]
struct SendBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Resend client
#[derive(Clone, Debug)]
pub struct Mailer {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    default_from: String,
}

impl Mailer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: RESEND_BASE_URL.into(),
            default_from: DEFAULT_FROM.into(),
        }
    }

    /// Point at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_from(mut self, from: impl Into<String>) -> Self {
        self.default_from = from.into();
        self
    }

    /// `RESEND_API_KEY` is required; `EMAIL_FROM` overrides the sender
    pub fn from_env() -> Result<Self> {
        let Ok(api_key) = std::env::var("RESEND_API_KEY") else {
            tracing::warn!("RESEND_API_KEY not set. Email not sent.");
            return Err(FarchatError::Config("RESEND_API_KEY missing".into()));
        };

        let mailer = Self::new(api_key);
        Ok(match std::env::var("EMAIL_FROM") {
            Ok(from) => mailer.with_default_from(from),
            Err(_) => mailer,
        })
    }

    /// Send and return the provider's message id
    pub async fn send(&self, email: &EmailRequest) -> Result<String> {
        let body = SendBody {
            from: email.from.as_deref().unwrap_or(&self.default_from),
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .http
            .post(format!("{}/emails", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Email send exception");
                FarchatError::Email(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(text);
            tracing::error!(status = status.as_u16(), error = %message, "Resend error");
            return Err(FarchatError::Email(message));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| FarchatError::Email(e.to_string()))?;

        tracing::info!(id = %sent.id, to = %email.to, "Email sent");
        Ok(sent.id)
    }
}
