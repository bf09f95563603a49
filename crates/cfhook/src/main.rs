use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cfhook::{
    ChallengeOrchestrator, CloudflareClient, HookCommand, HookConfig, HookDispatcher,
    PropagationChecker, DEFAULT_CONFIG_PATH,
};

/// ACME hook - proves domain control with Cloudflare DNS TXT records
#[derive(Parser, Debug)]
#[command(name = "cfhook")]
#[command(about = "DNS-01 challenge hook for the Cloudflare API")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "CFHOOK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Hook event (challenge-dns-start, challenge-dns-stop, live-updated, ...)
    event: String,

    /// Event arguments, passed through from the ACME client
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; stdout is left to the ACME client
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cfhook=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    // Reject unknown events and bad arguments before touching config or network
    let command = HookCommand::parse(&args.event, &args.args)?;

    // Load and resolve configuration (resolves all secrets)
    let config = HookConfig::load_and_resolve(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let cloudflare = Arc::new(
        CloudflareClient::new(&config.cloudflare).context("Failed to create Cloudflare client")?,
    );
    let checker = PropagationChecker::with_nameservers(&config.resolvers)
        .context("Failed to create DNS resolver")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let dispatcher = HookDispatcher::new(ChallengeOrchestrator::new(
        cloudflare,
        checker,
        config.timing,
        cancel,
    ));

    dispatcher.run(command).await?;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}
