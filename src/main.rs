//! Aperture Binary Entry Point
//!
//! Runs the agent against a configuration root, reloading on SIGHUP and
//! shutting down on Ctrl+C or SIGTERM.

use aperture::Agent;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Aperture - Metrics Collection Agent
#[derive(Parser, Debug)]
#[command(name = "aperture", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration root directory
    #[arg(short, long, default_value = "conf", env = "APERTURE_CONFIGS")]
    configs: String,

    /// Debug mode ("true" or "false")
    #[arg(long, default_value = "false", env = "APERTURE_DEBUG")]
    debug: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aperture=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Aperture - Metrics Collection Agent");

    let cli = Cli::parse();

    let mut agent = Agent::new(&cli.configs, &cli.debug)?;
    agent.start().await?;

    run_signal_loop(&mut agent).await;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Block on signals: SIGHUP reloads, Ctrl+C / SIGTERM stops and returns.
async fn run_signal_loop(agent: &mut Agent) {
    #[cfg(unix)]
    let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        .expect("failed to install SIGHUP handler");
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");

    loop {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received Ctrl+C");
                    break;
                }
                _ = terminate.recv() => {
                    tracing::info!("received terminate signal");
                    break;
                }
                _ = hangup.recv() => {
                    // A failed reload leaves the agent idle until the next
                    // HUP; the process keeps serving signals.
                    if let Err(e) = agent.reload().await {
                        tracing::error!(error = %e, "reload failed");
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received Ctrl+C");
            break;
        }
    }

    agent.stop().await;
}
