use thiserror::Error;

use crate::provider::ProviderError;
use crate::secret::SecretError;

/// Result type for hook operations
pub type HookResult<T> = Result<T, HookError>;

/// Errors that abort a hook invocation
#[derive(Debug, Error)]
pub enum HookError {
    /// Credentials or settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Positional arguments did not match what the event expects
    #[error("Invalid arguments for '{event}': expected {expected}, got {got} argument(s)")]
    InvalidArguments {
        event: String,
        expected: &'static str,
        got: usize,
    },

    #[error("Unknown hook event: {0}")]
    UnknownEvent(String),

    #[error("Invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    /// The provider has no zone for the registrable domain
    #[error("Zone not found for domain '{domain}' (looked up as '{apex}')")]
    ZoneNotFound { domain: String, apex: String },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("TXT record '{name}' did not propagate within {elapsed_secs}s")]
    PropagationTimeout { name: String, elapsed_secs: u64 },

    #[error("Cancelled while waiting for '{name}' to propagate")]
    Cancelled { name: String },
}

impl HookError {
    /// Create an invalid domain error
    pub fn invalid_domain(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<SecretError> for HookError {
    fn from(err: SecretError) -> Self {
        Self::Config(err.to_string())
    }
}
