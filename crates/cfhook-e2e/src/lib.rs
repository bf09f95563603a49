//! End-to-end test utilities for the cfhook DNS-01 hook
//!
//! This crate provides test harnesses and utilities for running E2E tests
//! of the challenge workflow without requiring Cloudflare or live DNS.

pub mod harness;
pub mod mock_dns;
pub mod scripted_dns;

pub use harness::{init_test, TestHook};
pub use mock_dns::{MockDnsProvider, MockRecord, ProviderCall};
pub use scripted_dns::ScriptedLookup;
