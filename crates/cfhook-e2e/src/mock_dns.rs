//! Mock DNS provider for E2E tests
//!
//! This module provides an in-memory implementation of the DnsProvider trait
//! that records every call, so tests can assert on what the hook asked the
//! provider to do.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use cfhook::{DnsProvider, ProviderError, RecordId, ZoneId};

/// A TXT record held by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRecord {
    pub zone: ZoneId,
    pub name: String,
    pub content: String,
}

/// One call made against the provider, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    FindZone { apex: String },
    CreateTxt { zone: String, name: String, content: String },
    FindTxt { zone: String, name: String, content: String },
    Delete { zone: String, record: String },
}

/// Mock DNS provider that tracks operations without making real API calls
pub struct MockDnsProvider {
    /// Zones by apex name
    zones: DashMap<String, ZoneId>,
    /// Tracks created records: record_id -> record
    records: DashMap<String, MockRecord>,
    calls: Mutex<Vec<ProviderCall>>,
    /// Counter for generating unique record IDs
    record_counter: AtomicU64,
    /// HTTP status to fail zone lookups with (0 = succeed)
    zone_lookup_status: AtomicU16,
    /// Whether to simulate failures on create
    fail_create: AtomicBool,
    /// Whether to simulate failures on delete
    fail_delete: AtomicBool,
}

impl MockDnsProvider {
    /// Create a new mock DNS provider
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a zone the account manages
    pub fn add_zone(&self, apex: &str, zone_id: &str) {
        self.zones
            .insert(apex.to_string(), ZoneId::from_provider(zone_id));
    }

    /// Get the record with the given ID (for test assertions)
    pub fn get_record(&self, record_id: &RecordId) -> Option<MockRecord> {
        self.records.get(record_id.as_str()).map(|r| r.value().clone())
    }

    /// Contents of all records published under `name`
    pub fn contents_for(&self, name: &str) -> Vec<String> {
        let mut contents: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.value().name == name)
            .map(|r| r.value().content.clone())
            .collect();
        contents.sort();
        contents
    }

    /// Get the number of active records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// Whether any delete call was made
    pub fn delete_called(&self) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|c| matches!(c, ProviderCall::Delete { .. }))
    }

    /// Fail zone lookups with the given HTTP status (0 to succeed again)
    pub fn set_zone_lookup_status(&self, status: u16) {
        self.zone_lookup_status.store(status, Ordering::SeqCst);
    }

    /// Configure mock to fail on create operations
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Configure mock to fail on delete operations
    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    fn record_call(&self, call: ProviderCall) {
        self.calls.lock().push(call);
    }
}

impl Default for MockDnsProvider {
    fn default() -> Self {
        Self {
            zones: DashMap::new(),
            records: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            record_counter: AtomicU64::new(1),
            zone_lookup_status: AtomicU16::new(0),
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_zone(&self, apex: &str) -> Result<Option<ZoneId>, ProviderError> {
        self.record_call(ProviderCall::FindZone {
            apex: apex.to_string(),
        });

        let status = self.zone_lookup_status.load(Ordering::SeqCst);
        if status != 0 {
            return Err(ProviderError::Status {
                status,
                body: "Simulated zone lookup failure".into(),
            });
        }

        Ok(self.zones.get(apex).map(|z| z.value().clone()))
    }

    async fn create_txt_record(
        &self,
        zone: &ZoneId,
        name: &str,
        content: &str,
    ) -> Result<RecordId, ProviderError> {
        self.record_call(ProviderCall::CreateTxt {
            zone: zone.to_string(),
            name: name.to_string(),
            content: content.to_string(),
        });

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ProviderError::Api("Simulated create failure".into()));
        }

        let record_id = format!(
            "mock-record-{}",
            self.record_counter.fetch_add(1, Ordering::Relaxed)
        );
        self.records.insert(
            record_id.clone(),
            MockRecord {
                zone: zone.clone(),
                name: name.to_string(),
                content: content.to_string(),
            },
        );
        tracing::debug!("MockDnsProvider: created record {} for {}", record_id, name);
        Ok(RecordId::from_provider(record_id))
    }

    async fn find_txt_record(
        &self,
        zone: &ZoneId,
        name: &str,
        content: &str,
    ) -> Result<Option<RecordId>, ProviderError> {
        self.record_call(ProviderCall::FindTxt {
            zone: zone.to_string(),
            name: name.to_string(),
            content: content.to_string(),
        });

        Ok(self
            .records
            .iter()
            .find(|r| {
                let record = r.value();
                record.zone == *zone && record.name == name && record.content == content
            })
            .map(|r| RecordId::from_provider(r.key().clone())))
    }

    async fn delete_record(&self, zone: &ZoneId, record: &RecordId) -> Result<(), ProviderError> {
        self.record_call(ProviderCall::Delete {
            zone: zone.to_string(),
            record: record.to_string(),
        });

        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ProviderError::Api("Simulated delete failure".into()));
        }

        match self.records.remove(record.as_str()) {
            Some(_) => {
                tracing::debug!("MockDnsProvider: deleted record {}", record);
                Ok(())
            }
            None => Err(ProviderError::Status {
                status: 404,
                body: format!("Record {} does not exist", record),
            }),
        }
    }
}
