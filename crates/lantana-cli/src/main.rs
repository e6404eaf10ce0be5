//! Lantana - Anchoring & Triple Signature CLI
//!
//! Usage:
//!     lantana anchor
//!     lantana anchor --peace-bond "003:TERRA:Earth Resources" --output bundle.json
//!     lantana verify triple_signature_bundle.json
//!     lantana status

mod commands;
mod error;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lantana_core::persist::DEFAULT_BUNDLE_PATH;
use lantana_core::{BuildConfig, MIN_COHERENCE};

use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "lantana")]
#[command(about = "Lantana OS anchoring and triple signature bundles")]
#[command(version)]
struct Args {
    /// Minimum overall coherence for a synchronized bundle
    #[arg(long, global = true, default_value_t = MIN_COHERENCE)]
    min_coherence: f64,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true, default_value = "warn", value_parser = logging::LEVELS)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register bonds, build a triple signature bundle and write it out
    Anchor {
        /// Bond as ID:NAME:TYPE (repeatable; replaces the default bonds)
        #[arg(long = "peace-bond", value_name = "ID:NAME:TYPE")]
        peace_bonds: Vec<String>,

        /// Output file for the bundle
        #[arg(long, default_value = DEFAULT_BUNDLE_PATH)]
        output: PathBuf,
    },

    /// Verify a triple signature bundle file
    Verify {
        /// Path to the bundle JSON file
        bundle_file: PathBuf,
    },

    /// Show node synchronization status
    Status,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_with_filter(&args.log_level);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} Error: {}", logging::prefix::FAIL, e);
            if e.is_recoverable() {
                eprintln!("  hint: check the --peace-bond arguments (ID:NAME:TYPE, unique IDs) and run again");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = BuildConfig::new().with_min_coherence(args.min_coherence)?;

    match args.command {
        Command::Anchor {
            peace_bonds,
            output,
        } => {
            commands::anchor(&config, &peace_bonds, &output)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { bundle_file } => {
            if commands::verify(&config, &bundle_file)? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Status => {
            commands::status(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
