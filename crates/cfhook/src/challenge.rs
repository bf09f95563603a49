//! DNS-01 challenge rounds
//!
//! One round is either a start (publish the token and wait until resolvers
//! see it) or a stop (remove the published token). Nothing is carried over
//! between rounds: the zone and record are looked up from the provider every
//! time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::{Domain, Token};
use crate::error::{HookError, HookResult};
use crate::propagation::PropagationChecker;
use crate::provider::{DnsProvider, RecordId};
use crate::records::RecordStore;
use crate::zone::ZoneResolver;

/// Longest accepted overall deadline
const MAX_WAIT_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest accepted backoff multiplier
const MAX_BACKOFF_FACTOR: f64 = 10.0;

/// Timing of the wait for a published record to become visible
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationTiming {
    /// Pause after creating the record so the first query doesn't cache a negative answer
    pub settle_delay: Duration,
    /// Delay between the first checks
    pub poll_interval: Duration,
    /// Upper bound on the delay when backing off
    pub max_poll_interval: Duration,
    /// Delay multiplier after each miss; 1.0 polls at a fixed interval
    pub backoff_factor: f64,
    /// Overall deadline, settle delay included
    pub max_wait: Duration,
}

impl Default for PropagationTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(30),
            max_poll_interval: Duration::from_secs(30),
            backoff_factor: 1.0,
            max_wait: Duration::from_secs(600),
        }
    }
}

impl PropagationTiming {
    pub fn validate(&self) -> HookResult<()> {
        if self.poll_interval.is_zero() {
            return Err(HookError::config("dns.poll_interval_secs must be greater than zero"));
        }
        if self.max_wait.is_zero() {
            return Err(HookError::config("dns.max_wait_secs must be greater than zero"));
        }
        if self.max_wait > MAX_WAIT_LIMIT {
            return Err(HookError::config(format!(
                "dns.max_wait_secs must be at most {}, got {}",
                MAX_WAIT_LIMIT.as_secs(),
                self.max_wait.as_secs()
            )));
        }
        if self.poll_interval.max(self.max_poll_interval) > MAX_WAIT_LIMIT {
            return Err(HookError::config(format!(
                "dns poll intervals must be at most {}s",
                MAX_WAIT_LIMIT.as_secs()
            )));
        }
        if self.settle_delay >= self.max_wait {
            return Err(HookError::config(format!(
                "dns.settle_delay_secs ({}) must be shorter than dns.max_wait_secs ({})",
                self.settle_delay.as_secs(),
                self.max_wait.as_secs()
            )));
        }
        if !self.backoff_factor.is_finite()
            || !(1.0..=MAX_BACKOFF_FACTOR).contains(&self.backoff_factor)
        {
            return Err(HookError::config(format!(
                "dns.backoff_factor must be between 1.0 and {}, got {}",
                MAX_BACKOFF_FACTOR, self.backoff_factor
            )));
        }
        Ok(())
    }

    fn next_interval(&self, current: Duration) -> Duration {
        let cap = self.max_poll_interval.max(self.poll_interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .map_or(cap, |next| next.min(cap))
    }
}

/// Progress of one challenge round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Idle,
    ZoneResolved,
    RecordPublished,
    Propagated,
    RecordLocated,
    Deleted,
    Done,
}

impl fmt::Display for ChallengeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ZoneResolved => "zone-resolved",
            Self::RecordPublished => "record-published",
            Self::Propagated => "propagated",
            Self::RecordLocated => "record-located",
            Self::Deleted => "deleted",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// State of a round in flight; dropped when the operation returns
struct Round<'a> {
    domain: &'a Domain,
    state: ChallengeState,
}

impl<'a> Round<'a> {
    fn new(domain: &'a Domain) -> Self {
        Self {
            domain,
            state: ChallengeState::Idle,
        }
    }

    fn advance(&mut self, next: ChallengeState) {
        tracing::debug!(domain = %self.domain, from = %self.state, to = %next, "Challenge state");
        self.state = next;
    }
}

/// Result of a successful start round
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub record_id: RecordId,
    /// DNS checks performed, the successful one included
    pub polls: u32,
    pub elapsed: Duration,
}

/// Result of a successful stop round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Deleted(RecordId),
    /// No record carried the token; nothing to clean up
    AlreadyGone,
}

/// Sequences zone resolution, record management and propagation checks
pub struct ChallengeOrchestrator {
    zones: ZoneResolver,
    records: RecordStore,
    checker: PropagationChecker,
    timing: PropagationTiming,
    cancel: CancellationToken,
}

impl ChallengeOrchestrator {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        checker: PropagationChecker,
        timing: PropagationTiming,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            zones: ZoneResolver::new(provider.clone()),
            records: RecordStore::new(provider),
            checker,
            timing,
            cancel,
        }
    }

    /// Publish `token` for `domain` and wait until DNS serves it
    ///
    /// On timeout or cancellation the record is left in place; the stop
    /// round removes it.
    pub async fn start(&self, domain: &Domain, token: &Token) -> HookResult<StartOutcome> {
        let started = Instant::now();
        let mut round = Round::new(domain);

        let zone = self.zones.resolve(domain).await?;
        round.advance(ChallengeState::ZoneResolved);

        let name = domain.challenge_record_name();
        let record_id = self.records.create(&zone, &name, token).await?;
        round.advance(ChallengeState::RecordPublished);

        let polls = self.wait_for_propagation(&name, token, started).await?;
        round.advance(ChallengeState::Propagated);

        let elapsed = started.elapsed();
        tracing::info!(
            "TXT record {} propagated after {} check(s) in {}s",
            name,
            polls,
            elapsed.as_secs()
        );
        round.advance(ChallengeState::Done);

        Ok(StartOutcome {
            record_id,
            polls,
            elapsed,
        })
    }

    /// Remove the record publishing `token` for `domain`, if any
    pub async fn stop(&self, domain: &Domain, token: &Token) -> HookResult<StopOutcome> {
        let mut round = Round::new(domain);

        let zone = self.zones.resolve(domain).await?;
        round.advance(ChallengeState::ZoneResolved);

        let name = domain.challenge_record_name();
        let Some(record_id) = self.records.find(&zone, &name, token).await? else {
            tracing::info!("Nothing to delete for {}", name);
            round.advance(ChallengeState::Done);
            return Ok(StopOutcome::AlreadyGone);
        };
        round.advance(ChallengeState::RecordLocated);

        tracing::debug!("Deleting TXT record {} ({})", name, record_id);
        self.records.delete(&zone, &record_id).await?;
        round.advance(ChallengeState::Deleted);
        round.advance(ChallengeState::Done);

        Ok(StopOutcome::Deleted(record_id))
    }

    /// Poll until the token is visible; returns the number of checks made
    async fn wait_for_propagation(
        &self,
        name: &str,
        token: &Token,
        started: Instant,
    ) -> HookResult<u32> {
        let deadline = started.checked_add(self.timing.max_wait).ok_or_else(|| {
            HookError::config(format!(
                "dns.max_wait_secs is out of range: {}",
                self.timing.max_wait.as_secs()
            ))
        })?;

        let settle = self
            .timing
            .settle_delay
            .min(deadline.saturating_duration_since(Instant::now()));
        tracing::info!("Settling down for {}s...", settle.as_secs());
        self.pause(settle, name).await?;

        let mut interval = self.timing.poll_interval;
        let mut polls = 0;
        loop {
            polls += 1;
            if self.checker.is_propagated(name, token).await {
                return Ok(polls);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(record = %name, polls, "Giving up on DNS propagation");
                return Err(HookError::PropagationTimeout {
                    name: name.to_string(),
                    elapsed_secs: started.elapsed().as_secs(),
                });
            }

            let wait = interval.min(deadline - now);
            tracing::info!("DNS not propagated, waiting {}s...", wait.as_secs());
            self.pause(wait, name).await?;
            interval = self.timing.next_interval(interval);
        }
    }

    async fn pause(&self, duration: Duration, name: &str) -> HookResult<()> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(HookError::Cancelled {
                name: name.to_string(),
            }),
        }
    }
}
