//! Hook event decoding and dispatch
//!
//! The ACME client calls the hook as `cfhook EVENT ARGS...`. The event name
//! and its positional arguments are decoded once into a [`HookCommand`], so
//! nothing downstream indexes into raw argument lists.

use std::path::PathBuf;

use crate::challenge::{ChallengeOrchestrator, StopOutcome};
use crate::domain::{Domain, Token};
use crate::error::{HookError, HookResult};

pub const EVENT_DNS_START: &str = "challenge-dns-start";
pub const EVENT_DNS_STOP: &str = "challenge-dns-stop";
pub const EVENT_HTTP_START: &str = "challenge-http-start";
pub const EVENT_HTTP_STOP: &str = "challenge-http-stop";
pub const EVENT_LIVE_UPDATED: &str = "live-updated";

const CHALLENGE_ARGS: &str = "<domain> <validation-path> <token>";
const DEPLOY_ARGS: &str = "<domain> <private-key> <cert> <fullchain> <chain>";

/// Paths of a freshly issued certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedCertificate {
    pub domain: String,
    pub private_key: PathBuf,
    pub cert: PathBuf,
    pub fullchain: PathBuf,
    pub chain: PathBuf,
}

/// A decoded hook invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCommand {
    /// `challenge-dns-start`: publish the token and wait for propagation
    StartChallenge { domain: Domain, token: Token },

    /// `challenge-dns-stop`: remove the published token
    StopChallenge { domain: Domain, token: Token },

    /// `challenge-http-start` / `challenge-http-stop`: not handled by this hook
    HttpNoop { event: String },

    /// `live-updated`: a certificate was issued
    DeployNotify(DeployedCertificate),
}

impl HookCommand {
    /// Decode an event name and its positional arguments
    ///
    /// Trailing arguments beyond those an event uses are ignored.
    pub fn parse(event: &str, args: &[String]) -> HookResult<Self> {
        match event {
            EVENT_DNS_START => {
                let (domain, token) = challenge_args(event, args)?;
                Ok(Self::StartChallenge { domain, token })
            }
            EVENT_DNS_STOP => {
                let (domain, token) = challenge_args(event, args)?;
                Ok(Self::StopChallenge { domain, token })
            }
            EVENT_HTTP_START | EVENT_HTTP_STOP => Ok(Self::HttpNoop {
                event: event.to_string(),
            }),
            EVENT_LIVE_UPDATED => {
                let [domain, private_key, cert, fullchain, chain] =
                    take_args::<5>(event, args, DEPLOY_ARGS)?;
                Ok(Self::DeployNotify(DeployedCertificate {
                    domain: domain.clone(),
                    private_key: PathBuf::from(private_key),
                    cert: PathBuf::from(cert),
                    fullchain: PathBuf::from(fullchain),
                    chain: PathBuf::from(chain),
                }))
            }
            other => Err(HookError::UnknownEvent(other.to_string())),
        }
    }

    /// Event name this command was decoded from
    pub fn event(&self) -> &str {
        match self {
            Self::StartChallenge { .. } => EVENT_DNS_START,
            Self::StopChallenge { .. } => EVENT_DNS_STOP,
            Self::HttpNoop { event } => event.as_str(),
            Self::DeployNotify(_) => EVENT_LIVE_UPDATED,
        }
    }
}

/// First `N` arguments, or an arity error naming what the event expects
fn take_args<'a, const N: usize>(
    event: &str,
    args: &'a [String],
    expected: &'static str,
) -> HookResult<&'a [String; N]> {
    args.get(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or_else(|| HookError::InvalidArguments {
            event: event.to_string(),
            expected,
            got: args.len(),
        })
}

fn challenge_args(event: &str, args: &[String]) -> HookResult<(Domain, Token)> {
    let [domain, _validation_path, token] = take_args::<3>(event, args, CHALLENGE_ARGS)?;
    if domain.trim().is_empty() {
        return Err(HookError::InvalidArguments {
            event: event.to_string(),
            expected: CHALLENGE_ARGS,
            got: args.len(),
        });
    }
    Ok((domain.parse()?, Token::new(token.as_str())))
}

/// Runs decoded commands against the challenge orchestrator
pub struct HookDispatcher {
    orchestrator: ChallengeOrchestrator,
}

impl HookDispatcher {
    pub fn new(orchestrator: ChallengeOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn run(&self, command: HookCommand) -> HookResult<()> {
        tracing::info!("Cloudflare hook executing: {}", command.event());

        match command {
            HookCommand::StartChallenge { domain, token } => {
                let outcome = self.orchestrator.start(&domain, &token).await?;
                tracing::debug!(record = %outcome.record_id, "Challenge record published");
            }
            HookCommand::StopChallenge { domain, token } => {
                match self.orchestrator.stop(&domain, &token).await? {
                    StopOutcome::Deleted(record) => {
                        tracing::info!("Deleted challenge record {} for {}", record, domain)
                    }
                    StopOutcome::AlreadyGone => {
                        tracing::info!("No challenge record left for {}", domain)
                    }
                }
            }
            HookCommand::HttpNoop { event } => {
                tracing::info!("Operation not supported: {}", event);
            }
            HookCommand::DeployNotify(deployed) => {
                tracing::info!("Certificate updated for {}", deployed.domain);
                tracing::info!("ssl_certificate: {}", deployed.fullchain.display());
                tracing::info!("ssl_certificate_key: {}", deployed.private_key.display());
                tracing::debug!(
                    cert = %deployed.cert.display(),
                    chain = %deployed.chain.display(),
                    "Other certificate files"
                );
            }
        }

        Ok(())
    }
}
