use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hpmon::{ChangeSink, MonitorConfig, PlayerRole, StopSignal, session};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hpmon")]
#[command(about = "GGST health and position monitor")]
struct Args {
    /// TOML config with process/module names, offsets and timings.
    /// Built-in defaults are used when the file does not exist.
    #[arg(short, long, default_value = "hpmon.toml")]
    config: PathBuf,

    /// Override the target process name from the config.
    #[arg(long)]
    process: Option<String>,

    /// Override the target module name from the config.
    #[arg(long)]
    module: Option<String>,
}

/// Logs every health transition as it is detected.
struct LogSink;

impl ChangeSink for LogSink {
    fn on_health_changed(&self, role: PlayerRole, new_value: i32, old_value: i32) {
        info!("{} health {} -> {}", role, old_value, new_value);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hpmon=info".parse()?))
        .init();

    let args = Args::parse();
    let mut config = load_config(&args.config);
    if let Some(process) = args.process {
        config.process_name = process;
    }
    if let Some(module) = args.module {
        config.module_name = module;
    }

    let shutdown = Arc::new(StopSignal::new());
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.raise())
            .context("failed to install Ctrl-C handler")?;
    }

    // Wait for the game, then monitor until Ctrl-C.
    loop {
        if shutdown.is_raised() {
            break;
        }
        match session::initialize(&config, Some(Arc::new(LogSink) as Arc<dyn ChangeSink>)) {
            Ok(()) => {
                session::start();
                info!("monitoring {}; press Ctrl-C to exit", config.process_name);
                run_until_shutdown(&shutdown);
                session::stop();
                break;
            }
            Err(e) => {
                info!("waiting for {} ({e})", config.process_name);
                if shutdown.wait(Duration::from_secs(5)) {
                    break;
                }
            }
        }
    }

    info!("shut down");
    Ok(())
}

fn run_until_shutdown(shutdown: &StopSignal) {
    while !shutdown.wait(Duration::from_secs(2)) {
        let positions = session::positions();
        debug!(
            p1 = session::player_health(1),
            p2 = session::player_health(2),
            net = positions.net,
            local = positions.local,
            "snapshot"
        );
    }
}

fn load_config(path: &Path) -> MonitorConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str(&text) {
            Ok(config) => {
                info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("invalid config {}: {e}; using defaults", path.display());
                MonitorConfig::default()
            }
        },
        Err(_) => {
            info!("no config at {}, using defaults", path.display());
            MonitorConfig::default()
        }
    }
}
