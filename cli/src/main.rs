//! Stagesale CLI - inspect sale curves and replay purchase scenarios
//!
//! Everything runs against the in-memory host: the config is validated, the
//! price/cap curve can be printed, and a scenario file of accounts and
//! purchases is settled through the real engine.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod config;
mod report;
mod simulate;

#[derive(Parser)]
#[command(name = "stagesale")]
#[command(about = "Staged sale settlement engine - inspect curves and replay scenarios", long_about = None)]
#[command(version)]
struct Cli {
    /// Sale config file (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the sale config and print its key figures
    Check,

    /// Print the price/cap curve for a range of stages
    Curve {
        /// First stage to print
        #[arg(long, default_value = "0")]
        from: u16,

        /// Number of stages
        #[arg(short = 'n', long, default_value = "20")]
        count: u16,
    },

    /// Show the stage range and total caps of one season
    Season {
        /// Season number (1-based)
        season: u16,
    },

    /// Replay a purchase scenario against an in-memory ledger
    Simulate {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let sale_config = config::load_sale_config(cli.config.as_deref())?;

    if cli.verbose {
        match &cli.config {
            Some(path) => println!("{} {}", "Config:".bright_cyan(), path.display()),
            None => println!("{} {}", "Config:".bright_cyan(), "built-in defaults".dimmed()),
        }
    }

    match cli.command {
        Commands::Check => {
            if cli.json {
                report::print_json(&sale_config)?;
            } else {
                report::print_check(&sale_config)?;
            }
        }
        Commands::Curve { from, count } => {
            report::print_curve(&sale_config, from, count, cli.json)?;
        }
        Commands::Season { season } => {
            report::print_season(&sale_config, season, cli.json)?;
        }
        Commands::Simulate { scenario, no_progress } => {
            let scenario = config::load_scenario(&scenario)?;
            let show_progress = !no_progress && !cli.json;
            let outcome = simulate::run(sale_config.clone(), &scenario, show_progress)?;
            report::print_simulation(&outcome, &sale_config, cli.json)?;
            if !outcome.invariants_hold {
                anyhow::bail!("bookkeeping invariants violated");
            }
        }
    }

    Ok(())
}
