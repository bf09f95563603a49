//! DNS propagation checking for DNS-01 challenges
//!
//! A lookup failure during a challenge window (NXDOMAIN, empty answer,
//! timeout, SERVFAIL) is indistinguishable from "not published yet", so the
//! checker only ever answers yes or no. Failures are classified and logged.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::{ResolveError, Resolver, TokioResolver};
use thiserror::Error;

use crate::domain::Token;
use crate::error::{HookError, HookResult};

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
const QUERY_ATTEMPTS: usize = 2;

/// Why a TXT lookup produced no answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    #[error("NXDOMAIN")]
    NxDomain,

    #[error("no TXT records")]
    NoRecords,

    #[error("timed out")]
    Timeout,

    /// SERVFAIL, refused, connection errors
    #[error("{0}")]
    Other(String),
}

/// TXT query backend
#[async_trait]
pub trait TxtLookup: Send + Sync {
    /// Every TXT value published under `name`, one entry per record
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure>;
}

/// TXT lookups through hickory-resolver
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl HickoryLookup {
    /// Query `nameservers`, or the system resolvers when the list is empty
    pub fn new(nameservers: &[SocketAddr]) -> HookResult<Self> {
        let mut opts = ResolverOpts::default();
        opts.timeout = QUERY_TIMEOUT;
        opts.attempts = QUERY_ATTEMPTS;
        opts.cache_size = 0; // Every poll must reach the resolver

        let builder = if nameservers.is_empty() {
            TokioResolver::builder_tokio().map_err(|e| {
                HookError::config(format!("Failed to read system resolver configuration: {}", e))
            })?
        } else {
            let mut resolver_config = ResolverConfig::new();
            for addr in nameservers {
                resolver_config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
                resolver_config.add_name_server(NameServerConfig::new(*addr, Protocol::Tcp));
            }
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
        };

        Ok(Self {
            resolver: builder.with_options(opts).build(),
        })
    }
}

#[async_trait]
impl TxtLookup for HickoryLookup {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure> {
        // Outer bound in case every attempt on every server stalls
        let budget = QUERY_TIMEOUT * (QUERY_ATTEMPTS as u32 + 1);
        let lookup = tokio::time::timeout(budget, self.resolver.txt_lookup(name))
            .await
            .map_err(|_| LookupFailure::Timeout)?;

        match lookup {
            Ok(records) => Ok(records
                .iter()
                .map(|record| {
                    // A long value is split into 255-byte strings; rejoin them
                    record
                        .txt_data()
                        .iter()
                        .map(|data| String::from_utf8_lossy(data))
                        .collect::<String>()
                })
                .collect()),
            Err(e) => Err(classify_error(&e)),
        }
    }
}

fn classify_error(error: &ResolveError) -> LookupFailure {
    // NXDOMAIN is a no-records answer with that response code; test it first
    if error.is_nx_domain() {
        LookupFailure::NxDomain
    } else if error.is_no_records_found() {
        LookupFailure::NoRecords
    } else if error
        .proto()
        .is_some_and(|proto| matches!(proto.kind(), ProtoErrorKind::Timeout))
    {
        LookupFailure::Timeout
    } else {
        LookupFailure::Other(error.to_string())
    }
}

/// Decides whether a challenge token is visible in DNS
pub struct PropagationChecker {
    lookup: Arc<dyn TxtLookup>,
}

impl PropagationChecker {
    pub fn new(lookup: Arc<dyn TxtLookup>) -> Self {
        Self { lookup }
    }

    /// Checker backed by hickory-resolver against `nameservers` (system if empty)
    pub fn with_nameservers(nameservers: &[SocketAddr]) -> HookResult<Self> {
        Ok(Self::new(Arc::new(HickoryLookup::new(nameservers)?)))
    }

    /// True iff one TXT value under `name` equals `token` exactly
    pub async fn is_propagated(&self, name: &str, token: &Token) -> bool {
        match self.lookup.lookup_txt(name).await {
            Ok(values) => {
                tracing::trace!(record = %name, found = ?values, "TXT answer");
                values.iter().any(|value| value == token.as_str())
            }
            Err(failure @ LookupFailure::Other(_)) => {
                tracing::warn!(record = %name, error = %failure, "TXT lookup failed");
                false
            }
            Err(failure) => {
                tracing::info!(record = %name, error = %failure, "TXT record not visible yet");
                false
            }
        }
    }
}
