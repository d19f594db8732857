//! Binary entry point for signin.
//!
//! Drives the attendance engine from the command line against Redis, or
//! against a throwaway in-memory store with `--memory`.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use signin::config::{Settings, parse_date};
use signin::observability::{self, LoggingConfig};
use signin::{BitStore, InMemoryBitStore, RedisBitStore, SignInService};
use std::path::PathBuf;
use std::process::ExitCode;

/// Signin - bitmap attendance tracking on Redis.
#[derive(Parser)]
#[command(name = "signin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "SIGNIN_CONFIG")]
    config: Option<PathBuf>,

    /// Epoch start date, overriding the configuration.
    #[arg(long, global = true)]
    epoch_start: Option<String>,

    /// Use a process-local store instead of Redis.
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Sign a subject in for the bucket containing a date.
    Sign {
        /// Subject identifier.
        subject: String,

        /// Date to sign for (defaults to now).
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<DateTime<Utc>>,
    },

    /// Count signed buckets over a byte range of the bitmap.
    Count {
        /// Subject identifier.
        subject: String,

        /// First byte index.
        #[arg(long = "start", default_value_t = 0, allow_hyphen_values = true)]
        start_byte: i64,

        /// Last byte index, inclusive; negative counts from the end.
        #[arg(long = "end", default_value_t = -1, allow_hyphen_values = true)]
        end_byte: i64,
    },

    /// Show the current run of consecutive signed buckets.
    Streak {
        /// Subject identifier.
        subject: String,

        /// Earliest date the run may reach back to (defaults to epoch start).
        #[arg(short, long, value_parser = parse_date_arg)]
        from: Option<DateTime<Utc>>,
    },

    /// Print per-bucket states as JSON.
    States {
        /// Subject identifier.
        subject: String,

        /// Last date to include (defaults to now).
        #[arg(short, long, value_parser = parse_date_arg)]
        until: Option<DateTime<Utc>>,
    },

    /// Print the store key for a subject.
    Key {
        /// Subject identifier.
        subject: String,
    },

    /// Print the bucket offset of a date.
    Offset {
        /// Date to map.
        #[arg(value_parser = parse_date_arg)]
        date: DateTime<Utc>,
    },

    /// Check that the store answers.
    Ping,
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging =
        LoggingConfig::from_settings(Some(&settings.logging), cli.verbose || settings.debug());
    if let Err(e) = observability::init(logging) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads settings from `--config` or the default location.
fn load_settings(cli: &Cli) -> signin::Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::load_default(),
    };
    Ok(match &cli.epoch_start {
        Some(start) => settings.with_start_date(start.clone()),
        None => settings,
    })
}

/// Builds the store and runs the selected command.
fn run_command(cli: Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings.signin_config()?;

    if cli.memory {
        let service = SignInService::new(InMemoryBitStore::new(), config)?;
        return execute(&service, cli.command);
    }

    let store = RedisBitStore::from_settings(&settings.store)?;
    let service = SignInService::new(store, config)?;
    let result = execute(&service, cli.command);
    service.close()?;
    result
}

/// Runs one command against a service.
fn execute<S: BitStore>(
    service: &SignInService<S>,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Sign { subject, date } => {
            let outcome = service.sign(&subject, date.unwrap_or_else(Utc::now))?;
            if outcome.is_first() {
                println!("Signed {subject}");
            } else {
                println!("{subject} was already signed");
            }
        },
        Commands::Count {
            subject,
            start_byte,
            end_byte,
        } => {
            println!("{}", service.sign_count(&subject, start_byte, end_byte)?);
        },
        Commands::Streak { subject, from } => {
            let from = from.unwrap_or_else(|| service.config().start_date());
            println!("{}", service.consecutive_sign_count(&subject, from)?);
        },
        Commands::States { subject, until } => {
            let states = service.get_sign_states(&subject, until.unwrap_or_else(Utc::now))?;
            println!("{}", serde_json::to_string_pretty(&states)?);
        },
        Commands::Key { subject } => {
            println!("{}", service.key_for(&subject));
        },
        Commands::Offset { date } => {
            println!("{}", service.offset_of(date)?);
        },
        Commands::Ping => {
            service.ping()?;
            println!("PONG");
        },
    }
    Ok(())
}

/// Parses a date argument.
fn parse_date_arg(value: &str) -> Result<DateTime<Utc>, String> {
    parse_date(value).map_err(|e| e.to_string())
}
