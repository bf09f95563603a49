//! Domain names and challenge tokens

use std::fmt;
use std::str::FromStr;

use crate::error::HookError;

/// ACME challenge record label
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A validated, lowercased DNS name being proven for a certificate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the TXT record the CA looks up, e.g. `_acme-challenge.example.com`
    pub fn challenge_record_name(&self) -> String {
        format!("{}.{}", ACME_CHALLENGE_LABEL, self.0)
    }
}

impl FromStr for Domain {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Wildcard certificates are validated on their base name
        let name = trimmed.strip_prefix("*.").unwrap_or(trimmed);
        let name = name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase();

        if name.is_empty() {
            return Err(HookError::invalid_domain(s, "empty name"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(HookError::invalid_domain(
                s,
                format!("longer than {} characters", MAX_NAME_LEN),
            ));
        }

        for label in name.split('.') {
            if label.is_empty() {
                return Err(HookError::invalid_domain(s, "empty label"));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(HookError::invalid_domain(
                    s,
                    format!("label '{}' longer than {} characters", label, MAX_LABEL_LEN),
                ));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(HookError::invalid_domain(
                    s,
                    format!("label '{}' starts or ends with '-'", label),
                ));
            }
            if let Some(c) = label
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
            {
                return Err(HookError::invalid_domain(
                    s,
                    format!("invalid character '{}'", c),
                ));
            }
        }

        Ok(Self(name))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof value the CA expects in the TXT record. Never interpreted.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?})", self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_record_name() {
        let domain: Domain = "example.com".parse().unwrap();
        assert_eq!(domain.challenge_record_name(), "_acme-challenge.example.com");
    }

    #[test]
    fn test_normalization() {
        let domain: Domain = "WWW.Example.COM.".parse().unwrap();
        assert_eq!(domain.as_str(), "www.example.com");

        let wildcard: Domain = "*.example.com".parse().unwrap();
        assert_eq!(
            wildcard.challenge_record_name(),
            "_acme-challenge.example.com"
        );
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "",
            ".",
            "example..com",
            "-bad.example.com",
            "bad-.example.com",
            "exa mple.com",
            "example.com/path",
        ] {
            assert!(
                matches!(name.parse::<Domain>(), Err(HookError::InvalidDomain { .. })),
                "{:?} should be rejected",
                name
            );
        }

        let long_label = format!("{}.com", "a".repeat(64));
        assert!(long_label.parse::<Domain>().is_err());

        let long_name = format!("{}.com", vec!["a".repeat(60); 5].join("."));
        assert!(long_name.parse::<Domain>().is_err());
    }

    #[test]
    fn test_underscore_labels_allowed() {
        assert!("_dmarc.example.com".parse::<Domain>().is_ok());
    }
}
