// beacons-bridge-cli — host-side driver for the beacon bridge
//
// Plays the role of the host application: attaches the bridge, then reads
// NDJSON requests on stdin and writes responses and beacon events as NDJSON
// on stdout. Scanning is backed by a simulated engine.

mod config;
mod session;
mod simulated;

use anyhow::{Context, Result};
use beacons_bridge_core::{init_logging, BridgeConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beacons-bridge")]
#[command(about = "Drive the beacon scanning bridge over NDJSON", long_about = None)]
#[command(version)]
struct Cli {
    /// Bridge config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach the bridge and serve NDJSON requests from stdin
    Run {
        /// Storage directory for preferences
        #[arg(short, long)]
        storage: Option<PathBuf>,
        /// Application id reported on engine attach
        #[arg(long, default_value = "com.example.beacons")]
        app_id: String,
        /// Also attach a foreground surface with this id at startup
        #[arg(long)]
        activity: Option<String>,
    },
    /// Inspect or change the bridge config
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let bridge_config = config::load(cli.config.as_deref())?;
    init_logging(&bridge_config.log_filter);

    match cli.command {
        Commands::Run {
            storage,
            app_id,
            activity,
        } => {
            let storage = match storage {
                Some(dir) => dir,
                None => config::data_dir()?,
            };
            session::run(bridge_config, storage, app_id, activity).await
        }
        Commands::Config { action } => cmd_config(cli.config, bridge_config, action),
    }
}

fn cmd_config(path: Option<PathBuf>, current: BridgeConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let updated = config::set(current, &key, &value)?;
            let file = match path {
                Some(path) => path,
                None => config::default_config_file()?,
            };
            updated
                .save(&file)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            println!("{} = {}", key, value);
        }
        ConfigAction::Get { key } => match config::get(&current, &key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Unknown config key: {}", key),
        },
        ConfigAction::List => {
            println!(
                "{}",
                serde_json::to_string_pretty(&current).context("Failed to serialize config")?
            );
        }
    }
    Ok(())
}
