//! Secret references for credentials in the hook config
//!
//! A credential value in the config file can be given inline or point at
//! where the real value lives:
//!
//! - `env://VAR_NAME` - read from the process environment
//! - `file:///path/to/file` - read from a file (e.g. a mounted secret)
//! - anything else - the literal value
//!
//! Resolved values are trimmed, so a trailing newline in a secret file is
//! harmless.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Errors that can occur while resolving a secret reference
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Invalid secret reference '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Environment variable '{var}' not set")]
    EnvNotSet { var: String },

    #[error("Failed to read secret file '{path}': {message}")]
    FileError { path: PathBuf, message: String },
}

/// Where a secret value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum SecretRef {
    /// Literal value
    Plain(String),

    /// `env://VAR_NAME`
    Env { var_name: String },

    /// `file:///path/to/file`
    File { path: PathBuf },
}

impl SecretRef {
    /// Backend name for logging (never the value itself)
    pub fn backend_name(&self) -> &'static str {
        match self {
            SecretRef::Plain(_) => "plain",
            SecretRef::Env { .. } => "env",
            SecretRef::File { .. } => "file",
        }
    }

    /// Resolve to the secret value, trimmed of surrounding whitespace
    pub fn resolve(&self) -> Result<String, SecretError> {
        tracing::debug!(backend = self.backend_name(), "Resolving secret");

        let value = match self {
            SecretRef::Plain(value) => value.clone(),
            SecretRef::Env { var_name } => {
                std::env::var(var_name).map_err(|_| SecretError::EnvNotSet {
                    var: var_name.clone(),
                })?
            }
            SecretRef::File { path } => {
                std::fs::read_to_string(path).map_err(|e| SecretError::FileError {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
        };

        Ok(value.trim().to_string())
    }
}

impl FromStr for SecretRef {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(var_name) = s.strip_prefix("env://") {
            if var_name.is_empty() {
                return Err(SecretError::InvalidUri {
                    uri: s.to_string(),
                    reason: "env reference must name a variable".to_string(),
                });
            }
            Ok(SecretRef::Env {
                var_name: var_name.to_string(),
            })
        } else if let Some(path) = s.strip_prefix("file://") {
            if path.is_empty() {
                return Err(SecretError::InvalidUri {
                    uri: s.to_string(),
                    reason: "file reference must specify a path".to_string(),
                });
            }
            Ok(SecretRef::File {
                path: PathBuf::from(path),
            })
        } else {
            Ok(SecretRef::Plain(s.to_string()))
        }
    }
}

/// Parse and resolve a secret reference in one step
pub fn resolve_secret(source: &str) -> Result<String, SecretError> {
    source.parse::<SecretRef>()?.resolve()
}
