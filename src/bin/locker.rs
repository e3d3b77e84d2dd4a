//! Locker Station command-line driver
//!
//! Thin front end over [`LockerEngine`]: every invocation restores the
//! station from its snapshot, runs one operation and saves it back.
//!
//! # Examples
//!
//! ```bash
//! # Provision lockers from a config file
//! locker --config station.toml provision
//!
//! # Store a medium package (id generated when omitted)
//! locker store A123 --size M
//!
//! # Pick it up again
//! locker retrieve A123
//!
//! # Show occupancy
//! locker status --json
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use locker_station::locker::{EngineSnapshot, LockerEngine, SizeClass};
use locker_station::{metrics, StationConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Locker Station - best-fit locker allocation
#[derive(Parser, Debug)]
#[command(name = "locker")]
#[command(version = locker_station::VERSION)]
#[command(about = "Assign packages to the smallest free locker that fits", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Station config file (TOML)
    #[arg(short, long, global = true, env = "LOCKER_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "LOCKER_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "LOCKER_LOG_LEVEL")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the configured lockers into a fresh station
    Provision {
        /// Overwrite an existing station
        #[arg(short, long)]
        force: bool,
    },

    /// Store a package in the smallest locker that fits
    Store {
        /// Package id (a UUID is generated when omitted)
        item: Option<String>,
        /// Package size (XS, S, M, L, XL)
        #[arg(short, long)]
        size: SizeClass,
    },

    /// Retrieve a package and free its locker
    Retrieve {
        /// Package id
        item: String,
    },

    /// Show which locker holds a package
    Locate {
        /// Package id
        item: String,
    },

    /// Show locker occupancy
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print Prometheus metrics for the station
    Metrics,

    /// Print the effective configuration
    Config,

    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    let mut config = StationConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Provision { force } => provision_command(&config, force),
        Commands::Store { item, size } => store_command(&config, item, size),
        Commands::Retrieve { item } => retrieve_command(&config, &item),
        Commands::Locate { item } => locate_command(&config, &item),
        Commands::Status { json } => status_command(&config, json),
        Commands::Metrics => {
            metrics::init_metrics();
            // Restoring publishes the occupancy gauges
            open_station(&config)?;
            print!("{}", metrics::export_metrics());
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Version => {
            println!("Locker Station {}", locker_station::VERSION);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and stderr output
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "locker.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .compact(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

fn open_station(config: &StationConfig) -> anyhow::Result<LockerEngine> {
    let path = config.snapshot_path();
    if !path.exists() {
        bail!(
            "Station not provisioned ({} missing); run `locker provision` first",
            path.display()
        );
    }

    let snapshot = EngineSnapshot::load(&path)?;
    let engine = LockerEngine::restore(&config.name, snapshot)
        .with_context(|| format!("Failed to restore station from {}", path.display()))?;
    Ok(engine)
}

fn save_station(config: &StationConfig, engine: &LockerEngine) -> anyhow::Result<()> {
    engine.snapshot().save(config.snapshot_path())?;
    Ok(())
}

fn provision_command(config: &StationConfig, force: bool) -> anyhow::Result<()> {
    let path = config.snapshot_path();
    if path.exists() && !force {
        bail!(
            "Station already provisioned at {}; pass --force to start over",
            path.display()
        );
    }

    let (sizes, ids) = config.provisioning();
    if ids.is_empty() {
        bail!("No lockers configured; add [[lockers]] or [counts] to the config");
    }

    let engine = LockerEngine::new(config.name.clone());
    engine.provision(&sizes, &ids)?;
    save_station(config, &engine)?;

    info!(station = %config.name, lockers = ids.len(), "Station provisioned");
    println!("✅ Provisioned {} lockers for station '{}'", ids.len(), config.name);
    Ok(())
}

fn store_command(config: &StationConfig, item: Option<String>, size: SizeClass) -> anyhow::Result<()> {
    let engine = open_station(config)?;
    let item = item.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let slot = engine.store(&item, size)?;
    save_station(config, &engine)?;

    println!("📦 Package {} stored in locker {}", item, slot);
    Ok(())
}

fn retrieve_command(config: &StationConfig, item: &str) -> anyhow::Result<()> {
    let engine = open_station(config)?;

    let slot = engine.retrieve(item)?;
    save_station(config, &engine)?;

    println!("✅ Package {} picked up from locker {}", item, slot);
    Ok(())
}

fn locate_command(config: &StationConfig, item: &str) -> anyhow::Result<()> {
    let engine = open_station(config)?;

    match engine.locate(item) {
        Some(assignment) => {
            println!(
                "Package {} is in locker {} (size {})",
                item, assignment.slot, assignment.class
            );
            Ok(())
        }
        None => bail!("Package {} is not stored here", item),
    }
}

fn status_command(config: &StationConfig, json: bool) -> anyhow::Result<()> {
    let engine = open_station(config)?;
    let stats = engine.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Station: {}", stats.station);
    println!("───────────────────────────────");
    println!("{:<6}{:>8}{:>8}{:>10}", "Size", "Total", "Free", "Occupied");
    for class in &stats.classes {
        println!(
            "{:<6}{:>8}{:>8}{:>10}",
            class.class.as_str(),
            class.total,
            class.free,
            class.occupied
        );
    }
    println!("───────────────────────────────");
    println!(
        "Lockers: {} total, {} free; packages waiting: {}",
        stats.total_lockers, stats.free_lockers, stats.outstanding_items
    );
    Ok(())
}
