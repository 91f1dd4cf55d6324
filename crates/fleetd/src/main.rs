//! fleetd — the fleet housekeeping daemon.
//!
//! Single binary that opens the fleet state store and drives the
//! housekeeping routines on their own intervals:
//! - Spare pool top-up
//! - Expired appliance / load-balancer cleanup
//! - Coalesced write memory
//!
//! It also carries small admin subcommands for inspecting and editing
//! appliance and load-balancer records.
//!
//! # Usage
//!
//! ```text
//! fleetd --config /etc/fleet/fleet.toml run
//! fleetd once cleanup
//! fleetd appliance add --project-id p1 --device-name vt-1 --ip 10.0.0.1
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use fleet_core::FleetConfig;
use fleet_state::StateStore;

mod admin;
mod collaborators;
mod housekeeping;

use admin::{ApplianceCommand, LoadBalancerCommand};
use housekeeping::Housekeeping;

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleet housekeeping daemon")]
struct Cli {
    /// Path to fleet.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the state store (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every housekeeping routine on its schedule until Ctrl-C.
    Run,

    /// Run a single routine once and exit.
    Once {
        #[arg(value_enum)]
        routine: Routine,
    },

    /// Inspect or edit appliance records.
    #[command(subcommand)]
    Appliance(ApplianceCommand),

    /// Inspect or edit load-balancer records.
    #[command(subcommand)]
    LoadBalancer(LoadBalancerCommand),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Routine {
    SparePool,
    Cleanup,
    WriteMemory,
}

/// Used when `RUST_LOG` is unset. The `fleet` prefix covers every
/// `fleet_*` library crate.
const DEFAULT_LOG_FILTER: &str = "info,fleetd=debug,fleet=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FleetConfig::from_file(path)?,
        None => FleetConfig::default(),
    };
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_dir());
    let state = open_state(&data_dir)?;

    match cli.command {
        Command::Run => {
            let housekeeping = Housekeeping::new(
                state,
                &config.pool_config()?,
                config.schedule_config()?,
            );
            housekeeping.run_until_ctrl_c().await
        }
        Command::Once { routine } => {
            let mut housekeeping = Housekeeping::new(
                state,
                &config.pool_config()?,
                config.schedule_config()?,
            );
            housekeeping.run_once(routine).await
        }
        Command::Appliance(cmd) => admin::appliance(&state, cmd),
        Command::LoadBalancer(cmd) => admin::load_balancer(&state, cmd),
    }
}

fn open_state(data_dir: &std::path::Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("fleet.redb");
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(state)
}
