//! Resilient fetch service (interactive CLI).
//!
//! Front end for the fetch layer: type a resource id to request it, `clear`
//! to empty the result cache, `quit` (or EOF / ctrl-c) to exit. The remote
//! endpoint, breaker tuning and observability settings come from a TOML
//! config file with sensible defaults.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use resilient_fetch::config::{self, FetchConfig};
use resilient_fetch::fetch::{
    FetchController, FetchDriver, FetchState, HttpResourceFetcher, ResourceId,
};
use resilient_fetch::lifecycle::Shutdown;
use resilient_fetch::observability::{logging, metrics};
use resilient_fetch::resilience::CircuitBreaker;

#[derive(Parser)]
#[command(name = "resilient-fetch")]
#[command(about = "Circuit-broken, cached fetcher for a flaky remote resource", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured remote base URL.
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => FetchConfig::default(),
    };
    if let Some(base_url) = cli.base_url {
        config.remote.base_url = base_url;
    }

    logging::init_logging(&config.observability);
    tracing::info!("resilient-fetch v0.1.0 starting");
    tracing::info!(
        base_url = %config.remote.base_url,
        failure_threshold = config.breaker.failure_threshold,
        cooldown_ms = config.breaker.cooldown_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let breaker = CircuitBreaker::new(config.breaker.clone());
    let fetcher = HttpResourceFetcher::<serde_json::Value>::new(&config.remote)?;
    let controller = FetchController::new(fetcher, breaker);

    let (desired_tx, desired_rx) = watch::channel(None);
    let shutdown = Shutdown::new();

    let driver = FetchDriver::new(controller.clone(), desired_rx);
    let driver_shutdown = shutdown.subscribe();
    tokio::spawn(async move { driver.run(driver_shutdown).await });

    // Report every observable state change.
    let mut state_rx = controller.subscribe();
    let reporter_controller = controller.clone();
    let mut reporter_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    report_state(&state, &reporter_controller);
                }
                _ = reporter_shutdown.recv() => break,
            }
        }
    });

    println!("Enter a resource id, 'clear' to empty the cache, or 'quit' to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break; // EOF
                };
                let cmd = line.trim();
                if cmd.is_empty() {
                    continue;
                }
                if cmd.eq_ignore_ascii_case("quit") {
                    break;
                }
                if cmd.eq_ignore_ascii_case("clear") {
                    controller.clear_cache();
                    continue;
                }
                match cmd.parse::<u64>() {
                    Ok(raw) => {
                        let _ = desired_tx.send(Some(ResourceId(raw)));
                    }
                    Err(_) => tracing::warn!(
                        input = %cmd,
                        "Unrecognized command (expected an id, 'clear' or 'quit')"
                    ),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn report_state(
    state: &FetchState<serde_json::Value>,
    controller: &FetchController<HttpResourceFetcher<serde_json::Value>>,
) {
    let id = state.id.map(u64::from);
    if state.loading {
        tracing::info!(id = ?id, "Loading");
    } else if let Some(err) = &state.error {
        let breaker = controller.breaker();
        tracing::warn!(
            id = ?id,
            breaker_state = breaker.state().as_str(),
            failures = breaker.failure_count(),
            error = %err,
            "Request did not resolve"
        );
    } else if let Some(value) = &state.value {
        tracing::info!(
            id = ?id,
            cache_size = controller.cache_size(),
            value = %value,
            "Resolved"
        );
    }
}
