//! Domain to zone resolution
//!
//! Providers key zones by registrable domain, so `www.example.co.uk` must be
//! looked up as `example.co.uk`. The apex is derived from the public suffix
//! list; splitting on the last two labels would give `co.uk`.

use std::sync::Arc;

use crate::domain::Domain;
use crate::error::{HookError, HookResult};
use crate::provider::{DnsProvider, ZoneId};

/// Registrable domain (public-suffix-aware apex) of a name
pub fn registrable_domain(domain: &Domain) -> HookResult<&str> {
    psl::domain_str(domain.as_str()).ok_or_else(|| {
        HookError::invalid_domain(domain.as_str(), "no registrable domain (public suffix only)")
    })
}

/// Maps domains to the provider zone that manages them
pub struct ZoneResolver {
    provider: Arc<dyn DnsProvider>,
}

impl ZoneResolver {
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self { provider }
    }

    /// Resolve the zone managing `domain`
    pub async fn resolve(&self, domain: &Domain) -> HookResult<ZoneId> {
        let apex = registrable_domain(domain)?;

        match self.provider.find_zone(apex).await? {
            Some(zone) => {
                tracing::debug!(domain = %domain, apex = %apex, zone = %zone, "Resolved zone");
                Ok(zone)
            }
            None => Err(HookError::ZoneNotFound {
                domain: domain.to_string(),
                apex: apex.to_string(),
            }),
        }
    }
}
