//! Error Types

use thiserror::Error;

/// Result type alias for FARchat operations
pub type Result<T> = std::result::Result<T, FarchatError>;

/// FARchat error types
#[derive(Error, Debug)]
pub enum FarchatError {
    /// Usage oracle could not determine usage
    #[error("Usage oracle error: {0}")]
    Oracle(String),

    /// Identity provider failed to resolve the current user
    #[error("Identity error: {0}")]
    Identity(String),

    /// Chat backend answered with a non-success status
    #[error("Chat backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Upstream completion provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Database (PostgREST) call failed. `code` is the Postgres error code when reported.
    #[error("Database error{}: {message}", code.as_deref().map(|c| format!(" {c}")).unwrap_or_default())]
    Database {
        code: Option<String>,
        message: String,
    },

    /// Transactional email failed
    #[error("Email error: {0}")]
    Email(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl FarchatError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Oracle(_) => "You have reached your query limit.".into(),
            Self::Identity(_) => "We could not verify your account. Please sign in again.".into(),
            Self::Backend { .. } | Self::Provider(_) => {
                "The assistant is unavailable right now. Please try again.".into()
            }
            Self::Http(_) => "A network error occurred. Check your connection.".into(),
            Self::Email(_) => "We could not send your message.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            Self::Validation(msg) => msg.clone(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for FarchatError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
