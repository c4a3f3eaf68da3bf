//! Account Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, AccountError>;

/// Account-related errors
#[derive(Error, Debug)]
pub enum AccountError {
    /// Ledger backend failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Daily query allowance used up
    #[error("Daily limit reached")]
    LimitReached,

    /// Too many requests from one client
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Submitted data failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AccountError {
    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            Self::LimitReached => "Daily limit reached.",
            Self::RateLimited => "Too many requests. Please try again later.",
            Self::Validation(msg) => msg,
            Self::Config(_) => "Service configuration error.",
            Self::Storage(_) => "An error occurred processing your request.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(AccountError::LimitReached.user_message(), "Daily limit reached.");
        assert_eq!(
            AccountError::Validation("Invalid email format".into()).user_message(),
            "Invalid email format"
        );
    }
}
