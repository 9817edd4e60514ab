use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hearth::{db, Config, MemorySystem};

/// Hearth - per-device conversational memory for voice assistants
#[derive(Parser)]
#[command(name = "hearth", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "HEARTH_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a device or update its name and location
    Register {
        /// Hardware address (e.g. D8:0F:99:D8:00:96)
        hw_addr: String,
        /// Human-assigned device name
        name: String,
        /// Installation location
        #[arg(short, long)]
        location: Option<String>,
    },
    /// List registered devices with recent activity
    Devices {
        /// Activity window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },
    /// Show combined stats for a device, or registry-wide totals
    Stats {
        /// Hardware address; omit for registry-wide statistics
        hw_addr: Option<String>,
    },
    /// Show conversation insights for a device
    Insights {
        /// Hardware address
        hw_addr: String,
    },
    /// Export a device's full report to a JSON file
    Export {
        /// Hardware address
        hw_addr: String,
        /// Output path; defaults to a timestamped file in the data dir
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Recompute all device profiles now
    Refresh,
    /// Print the personalization context block for a device
    Context {
        /// Hardware address
        hw_addr: String,
        /// Fallback name for unregistered devices
        #[arg(short, long, default_value = "unknown")]
        name: String,
        /// Current device location
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Run the memory engine with the periodic profile refresh scheduler
    Run,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,hearth=info",
        1 => "info,hearth=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    std::fs::create_dir_all(&config.data_dir)?;

    let pool = db::init(&config.db_path())?;
    let system = MemorySystem::new(pool, config);

    match cli.command {
        Command::Register {
            hw_addr,
            name,
            location,
        } => {
            let device = system.register_device(&hw_addr, &name, location.as_deref())?;
            println!(
                "Registered {} as \"{}\" ({} connections)",
                device.hw_addr, device.name, device.total_connections
            );
        }
        Command::Devices { hours } => {
            let active = system.registry().active_devices(hours)?;
            if active.is_empty() {
                println!("No devices seen in the last {hours}h");
            }
            for entry in active {
                let location = entry.device.location.as_deref().unwrap_or("-");
                println!(
                    "{}  {:20} {:10} {:5} conns  last seen {:.1}h ago",
                    entry.device.hw_addr,
                    entry.device.name,
                    location,
                    entry.device.total_connections,
                    entry.hours_ago
                );
            }
        }
        Command::Stats { hw_addr } => match hw_addr {
            Some(hw_addr) => {
                let stats = system.device_stats(&hw_addr)?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            None => {
                let stats = system.registry().statistics()?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
        },
        Command::Insights { hw_addr } => {
            for line in system.conversation_insights(&hw_addr)? {
                println!("- {line}");
            }
        }
        Command::Export { hw_addr, output } => {
            let path = system.export_device_report(&hw_addr, output.as_deref())?;
            println!("Exported to {}", path.display());
        }
        Command::Refresh => {
            let report = system.refresh_profiles()?;
            println!("Refreshed {} profiles", report.updated);
            for hw_addr in &report.failed {
                println!("  failed: {hw_addr}");
            }
        }
        Command::Context {
            hw_addr,
            name,
            location,
        } => {
            print!(
                "{}",
                system.personalized_context(&hw_addr, &name, location.as_deref())
            );
        }
        Command::Run => {
            let system = Arc::new(system);
            tracing::info!("hearth memory engine running");
            let task = Arc::clone(&system).spawn_refresh_task();
            tokio::signal::ctrl_c().await?;
            task.abort();
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
