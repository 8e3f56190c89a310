//! Foundry command-line host.
//!
//! # Usage
//!
//! ```bash
//! # Check a balance file (and optionally an automation file)
//! cargo run -p foundry_tools -- validate game.ron --automations automations.ron
//!
//! # Print the built-in balance as RON
//! cargo run -p foundry_tools -- default-config > game.ron
//!
//! # Play five minutes against a save, generating ten miners
//! cargo run -p foundry_tools -- simulate --save session.sav --seconds 300 --generate 10
//!
//! # Show a save as JSON
//! cargo run -p foundry_tools -- inspect session.sav
//! ```
//!
//! Logs go to stderr; reports go to stdout.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foundry_core::config::GameConfig;
use foundry_core::kinds::SystemKind;
use foundry_core::simulation::SimulationClock;
use foundry_tools::save::{delete_save, SaveFile};
use foundry_tools::session::{SessionOptions, SessionRunner, SessionSummary, DEFAULT_AUTOSAVE_INTERVAL};
use foundry_tools::validate::{load_config_or_default, validate_files};
use foundry_tools::{Result, ToolError};

#[derive(Parser)]
#[command(name = "foundry")]
#[command(about = "Headless host for the foundry idle simulation")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a balance file
    Validate {
        /// Balance configuration (RON)
        config: PathBuf,

        /// Automation definitions (RON)
        #[arg(long)]
        automations: Option<PathBuf>,
    },

    /// Print the built-in balance configuration
    DefaultConfig,

    /// Play a session headlessly
    Simulate {
        /// Balance configuration (RON); built-ins when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Save file to resume from and write back to
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Simulated seconds to play
        #[arg(long, default_value = "60")]
        seconds: f64,

        /// Frames per simulated second
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Villagers to generate
        #[arg(short, long, default_value = "0")]
        generate: u32,

        /// Line receiving villagers and taps
        #[arg(short, long, default_value = "mining", value_parser = parse_line)]
        target: SystemKind,

        /// Taps to register on the target line
        #[arg(long, default_value = "0")]
        taps: u32,

        /// Simulated seconds between autosaves
        #[arg(long, default_value_t = DEFAULT_AUTOSAVE_INTERVAL)]
        autosave: f64,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a save file as JSON
    Inspect {
        /// Save file
        save: PathBuf,

        /// Balance configuration the save was played with
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Delete a save file
    Reset {
        /// Save file
        save: PathBuf,
    },
}

fn parse_line(name: &str) -> std::result::Result<SystemKind, String> {
    SystemKind::from_name(&name.to_ascii_lowercase()).ok_or_else(|| {
        let known: Vec<_> = SystemKind::ALL.iter().map(|kind| kind.name()).collect();
        format!("unknown line '{name}', expected one of: {}", known.join(", "))
    })
}

fn main() {
    let cli = Cli::parse();

    // Logs on stderr, reports on stdout. RUST_LOG overrides --verbose.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Validate {
            config,
            automations,
        } => cmd_validate(config, automations),
        Commands::DefaultConfig => cmd_default_config(),
        Commands::Simulate {
            config,
            save,
            seconds,
            fps,
            generate,
            target,
            taps,
            autosave,
            json,
        } => cmd_simulate(
            config,
            SessionOptions {
                save_path: save,
                seconds,
                fps,
                generate,
                target,
                taps,
                autosave_interval: autosave,
                now: unix_now(),
            },
            json,
        ),
        Commands::Inspect { save, config } => cmd_inspect(save, config),
        Commands::Reset { save } => cmd_reset(save),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

fn cmd_validate(config: PathBuf, automations: Option<PathBuf>) -> Result<()> {
    tracing::info!("Validating {}", config.display());
    let report = validate_files(&config, automations.as_deref())?;

    println!(
        "OK: {} configured lines{}",
        report.configured_lines,
        report
            .automation_roles
            .map(|n| format!(", {n} automation roles"))
            .unwrap_or_default()
    );
    Ok(())
}

fn cmd_default_config() -> Result<()> {
    println!("{}", GameConfig::default().to_ron()?);
    Ok(())
}

fn cmd_simulate(config: Option<PathBuf>, options: SessionOptions, json: bool) -> Result<()> {
    let config = load_config_or_default(config.as_deref())?;

    tracing::info!(
        seconds = options.seconds,
        fps = options.fps,
        target = %options.target,
        "Starting session"
    );
    let summary = SessionRunner::open(config, options)?.run()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.to_text());
    }
    Ok(())
}

fn cmd_inspect(save: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = load_config_or_default(config.as_deref())?;
    let Some(file) = SaveFile::load_if_exists(&save)? else {
        return Err(ToolError::InvalidArgument(format!(
            "no save at {}",
            save.display()
        )));
    };

    let clock = SimulationClock::restore(config, file.snapshot)?;
    println!("{}", serde_json::to_string_pretty(&SessionSummary::of(&clock))?);
    Ok(())
}

fn cmd_reset(save: PathBuf) -> Result<()> {
    if delete_save(&save)? {
        tracing::info!("Deleted {}", save.display());
    } else {
        tracing::info!("No save at {}", save.display());
    }
    Ok(())
}
