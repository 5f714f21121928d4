//! Error types for token refresh coordination.

use thiserror::Error;

/// Failure reported by an [`IdentityProvider`](crate::auth::IdentityProvider)
/// while exchanging a refresh token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Refresh token rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,
}

/// Primary error type for all refresh operations.
///
/// `Clone` because a single outcome is handed to every caller that joined an
/// in-flight operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Will not attempt refresh using token that failed previously: {}",
        mask_token(.refresh_token)
    )]
    PreviouslyFailed { refresh_token: String },

    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Token callback failed: {0}")]
    Callback(String),

    #[error("In-flight operation interrupted: {0}")]
    Interrupted(String),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    KnownInvalidToken,
    Rejected,
    Network,
    Cancelled,
    Storage,
    Callback,
    Interrupted,
}

impl RefreshError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::PreviouslyFailed { .. } => ErrorCategory::KnownInvalidToken,
            Self::Provider(ProviderError::Rejected(_)) => ErrorCategory::Rejected,
            Self::Provider(ProviderError::Network(_)) => ErrorCategory::Network,
            Self::Provider(ProviderError::Cancelled) => ErrorCategory::Cancelled,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Callback(_) => ErrorCategory::Callback,
            Self::Interrupted(_) => ErrorCategory::Interrupted,
        }
    }

    /// Whether an outer caller could reasonably try again.
    ///
    /// A provider failure always blacklists its refresh token, so a retry
    /// only helps once storage hands out a different one.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Storage | ErrorCategory::Interrupted
        )
    }
}

impl From<tokio::task::JoinError> for RefreshError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Interrupted(error.to_string())
    }
}

/// Shorten a secret for display: keep a short prefix, hide the rest.
pub(crate) fn mask_token(token: &str) -> String {
    const VISIBLE: usize = 4;
    if token.chars().count() <= VISIBLE * 2 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(VISIBLE).collect();
    format!("{prefix}***")
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RefreshError>;
