//! DNS provider abstraction for challenge record management
//!
//! This trait allows the hook to run against Cloudflare in production and an
//! in-memory provider in tests.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Provider-assigned zone identifier. Opaque: only ever obtained from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneId(String);

impl ZoneId {
    /// Wrap an identifier as returned by the provider
    pub fn from_provider(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-assigned DNS record identifier. Opaque: only ever obtained from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an identifier as returned by the provider
    pub fn from_provider(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from DNS provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport failure (connect, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response with `success: false`
    #[error("API error: {0}")]
    Api(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Remote operations the challenge workflow needs from a DNS provider
///
/// None of these are idempotent against retries: a `create_txt_record` retried
/// after a timeout may leave a duplicate record behind.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the zone whose name is exactly `apex`
    ///
    /// # Returns
    /// The first matching zone, or `None` if the account has no such zone
    async fn find_zone(&self, apex: &str) -> Result<Option<ZoneId>, ProviderError>;

    /// Create a TXT record without checking for existing records of the same name
    ///
    /// # Returns
    /// The record ID for later deletion
    async fn create_txt_record(
        &self,
        zone: &ZoneId,
        name: &str,
        content: &str,
    ) -> Result<RecordId, ProviderError>;

    /// Find the TXT record matching both `name` and exact `content`
    async fn find_txt_record(
        &self,
        zone: &ZoneId,
        name: &str,
        content: &str,
    ) -> Result<Option<RecordId>, ProviderError>;

    /// Delete a DNS record by its ID
    async fn delete_record(&self, zone: &ZoneId, record: &RecordId) -> Result<(), ProviderError>;
}
