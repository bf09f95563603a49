//! TXT record lifecycle within a zone

use std::sync::Arc;

use crate::domain::Token;
use crate::error::HookResult;
use crate::provider::{DnsProvider, RecordId, ZoneId};

/// Creates, locates and deletes challenge TXT records
///
/// Record IDs are never cached here: every lookup goes to the provider, so a
/// stop invocation finds exactly what exists remotely.
pub struct RecordStore {
    provider: Arc<dyn DnsProvider>,
}

impl RecordStore {
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self { provider }
    }

    /// Publish `content` under `name`
    ///
    /// Existing TXT records of the same name are left alone; DNS allows
    /// several values per name and concurrent challenges rely on that.
    pub async fn create(&self, zone: &ZoneId, name: &str, content: &Token) -> HookResult<RecordId> {
        let record = self
            .provider
            .create_txt_record(zone, name, content.as_str())
            .await?;
        tracing::debug!(zone = %zone, name = %name, record = %record, "TXT record created");
        Ok(record)
    }

    /// Find the record carrying exactly `content` under `name`
    pub async fn find(
        &self,
        zone: &ZoneId,
        name: &str,
        content: &Token,
    ) -> HookResult<Option<RecordId>> {
        let record = self
            .provider
            .find_txt_record(zone, name, content.as_str())
            .await?;
        if record.is_none() {
            tracing::info!("Unable to locate TXT record {} with the expected token", name);
        }
        Ok(record)
    }

    /// Delete a record; a missing record is reported as the provider reports it
    pub async fn delete(&self, zone: &ZoneId, record: &RecordId) -> HookResult<()> {
        self.provider.delete_record(zone, record).await?;
        Ok(())
    }
}
