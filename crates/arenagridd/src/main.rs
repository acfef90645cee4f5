//! arenagridd — the ArenaGrid daemon.
//!
//! Single binary that assembles the control plane:
//! - State store (redb)
//! - Standalone queue, fleet, cluster and stack-output backends
//! - Session broker behind the REST API
//! - Capacity scaler
//!
//! # Usage
//!
//! ```text
//! arenagridd standalone --config arenagrid.toml --port 8080 --data-dir /var/lib/arenagrid
//! arenagridd print-config --config arenagrid.toml
//! ```

mod standalone;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use arenagrid_core::ArenaConfig;

#[derive(Parser)]
#[command(name = "arenagridd", about = "ArenaGrid daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run in standalone mode (all collaborators backed by the local store).
    Standalone {
        /// Path to arenagrid.toml. Built-in defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/arenagrid")]
        data_dir: PathBuf,
    },

    /// Print the effective configuration as TOML and exit.
    PrintConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Standalone {
            config,
            port,
            data_dir,
        } => {
            let config = load_config(config.as_deref())?;
            standalone::run_standalone(config, port, data_dir).await
        }
        Command::PrintConfig { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,arenagrid=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ArenaConfig> {
    match path {
        Some(path) => {
            let config = ArenaConfig::from_file(path)?;
            tracing::info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => {
            tracing::info!("no configuration file given, using defaults");
            Ok(ArenaConfig::default())
        }
    }
}
