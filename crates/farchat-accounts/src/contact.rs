//! Contact Form Intake
//!
//! Validates contact submissions and throttles them per client.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AccountError, Result};

/// A contact form submission
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContactSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

/// Acknowledgement for an accepted submission
#[derive(Clone, Debug, Serialize)]
pub struct ContactReceipt {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
}

impl ContactSubmission {
    /// Check required fields and email shape
    pub fn validate(&self) -> Result<()> {
        let missing = [&self.name, &self.email, &self.subject, &self.message]
            .iter()
            .any(|field| field.trim().is_empty());
        if missing {
            return Err(AccountError::Validation("Missing required fields".into()));
        }

        if !is_valid_email(&self.email) {
            return Err(AccountError::Validation("Invalid email format".into()));
        }

        Ok(())
    }

    /// Validate and stamp the submission
    pub fn accept(&self) -> Result<ContactReceipt> {
        self.validate()?;

        let receipt = ContactReceipt {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
        };

        tracing::info!(
            submission_id = %receipt.id,
            email = %self.email,
            company = self.company.as_deref().unwrap_or("Not provided"),
            subject = %self.subject,
            "Contact form submission"
        );

        Ok(receipt)
    }

    /// HTML body for forwarding the submission to the team inbox
    pub fn to_html(&self) -> String {
        format!(
            "<p><strong>From:</strong> {} &lt;{}&gt;</p>\
             <p><strong>Company:</strong> {}</p>\
             <p><strong>Subject:</strong> {}</p>\
             <pre>{}</pre>",
            escape_html(&self.name),
            escape_html(&self.email),
            escape_html(self.company.as_deref().unwrap_or("Not provided")),
            escape_html(&self.subject),
            escape_html(&self.message),
        )
    }
}

/// `local@domain.tld` with no whitespace and a single `@`
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    !local.is_empty()
        && domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[derive(Clone, Copy, Debug)]
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window request limiter keyed by client (usually the IP address)
pub struct ContactRateLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<String, Window>>,
}

impl Default for ContactRateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 5)
    }
}

impl ContactRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request from `client`
    pub fn check(&self, client: &str) -> Result<()> {
        self.check_at(client, Instant::now())
    }

    /// Clients with a window currently held in memory
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Count a request from `client` at `now`.
    ///
    /// Starting a new window also drops every other expired window.
    pub fn check_at(&self, client: &str, now: Instant) -> Result<()> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| AccountError::Storage("rate limiter lock poisoned".into()))?;

        let current = clients
            .get(client)
            .copied()
            .filter(|w| now.duration_since(w.started) <= self.window);

        let next = match current {
            Some(window) if window.count >= self.max_requests => {
                tracing::warn!(client = %client, "Contact form rate limited");
                return Err(AccountError::RateLimited);
            }
            Some(window) => Window {
                count: window.count + 1,
                ..window
            },
            None => {
                clients.retain(|_, w| now.duration_since(w.started) <= self.window);
                Window {
                    count: 1,
                    started: now,
                }
            }
        };

        clients.insert(client.to_string(), next);
        Ok(())
    }
}
