use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Instant};

use egi_widgets::cli::Cli;
use egi_widgets::config::Config;
use egi_widgets::{logging, WidgetEvent, WidgetHost};

const DEFAULT_CONFIG_PATH: &str = "config/widgets.toml";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.debug, cli.log_file.as_deref()).context("Failed to open log file")?;

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = if config_path.exists() {
        Config::load(&config_path)
            .with_context(|| format!("Failed to load configuration from {:?}", config_path))?
    } else {
        warn!("No configuration at {:?}, using defaults", config_path);
        Config::default()
    };
    config.apply_env();
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    info!("Using backend at {}", config.api.base_url);

    let mut host = WidgetHost::from_config(config)?;
    let mut events = host.bus().subscribe();
    let mounted = host.init()?;
    if mounted == 0 {
        warn!("No components declared, nothing to do");
        return Ok(());
    }

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        let carousel_deadline = host.next_carousel_deadline();
        tokio::select! {
            _ = &mut interrupted => {
                info!("Interrupted, tearing down widgets...");
                break;
            }
            event = events.recv() => match event {
                Ok(WidgetEvent::RateUpdated { badge_id, formatted, timestamp, .. }) => {
                    info!("{}: 1 EUR = {} ALGO (as of {})", badge_id, formatted, timestamp);
                }
                Ok(other) => debug!("Event: {:?}", other),
                Err(RecvError::Lagged(skipped)) => warn!("Event log skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = async {
                match carousel_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                for id in host.advance_carousels(Instant::now()) {
                    if let Ok(carousel) = host.carousel(&id) {
                        debug!("{} advanced to card {}", id, carousel.index());
                    }
                }
            }
        }
    }

    host.shutdown().await;
    Ok(())
}
