//! Test hook harness for E2E tests
//!
//! Wires a complete challenge orchestrator to the mock provider and the
//! scripted resolver.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cfhook::{
    ChallengeOrchestrator, DnsProvider, HookDispatcher, PropagationChecker, PropagationTiming,
};

use crate::mock_dns::MockDnsProvider;
use crate::scripted_dns::ScriptedLookup;

/// Initialize tracing for tests
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cfhook=debug,cfhook_e2e=debug")
        .with_test_writer()
        .try_init();
}

/// A hook wired to in-memory collaborators
pub struct TestHook {
    /// Mock DNS provider for assertions
    pub provider: Arc<MockDnsProvider>,
    /// Scripted resolver for assertions
    pub lookup: Arc<ScriptedLookup>,
    /// Cancels an in-flight propagation wait
    pub cancel: CancellationToken,
    pub orchestrator: ChallengeOrchestrator,
}

impl TestHook {
    /// Hook with the production default timing
    pub fn new() -> Self {
        Self::with_timing(PropagationTiming::default())
    }

    pub fn with_timing(timing: PropagationTiming) -> Self {
        let provider = MockDnsProvider::new();
        let lookup = ScriptedLookup::new();
        let cancel = CancellationToken::new();

        let orchestrator = ChallengeOrchestrator::new(
            provider.clone() as Arc<dyn DnsProvider>,
            PropagationChecker::new(lookup.clone()),
            timing,
            cancel.clone(),
        );

        Self {
            provider,
            lookup,
            cancel,
            orchestrator,
        }
    }

    /// Timing with a short overall deadline, for timeout tests
    pub fn short_deadline(max_wait: Duration) -> PropagationTiming {
        PropagationTiming {
            max_wait,
            ..PropagationTiming::default()
        }
    }

    /// Turn the harness into a dispatcher, keeping handles for assertions
    pub fn into_dispatcher(self) -> (HookDispatcher, Arc<MockDnsProvider>, Arc<ScriptedLookup>) {
        (
            HookDispatcher::new(self.orchestrator),
            self.provider,
            self.lookup,
        )
    }
}

impl Default for TestHook {
    fn default() -> Self {
        Self::new()
    }
}
