//! Cloudflare DNS-01 hook library
//!
//! This library provides the components behind the `cfhook` binary: it
//! publishes ACME challenge tokens as TXT records through the Cloudflare API,
//! waits until resolvers serve them, and removes them afterwards. It can be
//! embedded in other ACME clients or driven with a mock provider in tests.

mod challenge;
mod cloudflare;
mod config;
mod dispatch;
mod domain;
mod error;
mod propagation;
mod provider;
mod records;
mod secret;
mod zone;

// Re-export public types
pub use challenge::{
    ChallengeOrchestrator, ChallengeState, PropagationTiming, StartOutcome, StopOutcome,
};
pub use cloudflare::CloudflareClient;
pub use config::{
    parse_resolver_addr, CloudflareConfig, CloudflareCredentials, DnsConfig, HookConfig,
    ResolvedCloudflareConfig, ResolvedConfig, DEFAULT_API_BASE, DEFAULT_CONFIG_PATH,
};
pub use dispatch::{DeployedCertificate, HookCommand, HookDispatcher};
pub use domain::{Domain, Token, ACME_CHALLENGE_LABEL};
pub use error::{HookError, HookResult};
pub use propagation::{HickoryLookup, LookupFailure, PropagationChecker, TxtLookup};
pub use provider::{DnsProvider, ProviderError, RecordId, ZoneId};
pub use records::RecordStore;
pub use secret::{resolve_secret, SecretError, SecretRef};
pub use zone::{registrable_domain, ZoneResolver};
