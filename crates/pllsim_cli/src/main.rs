//! pllsim CLI: runs the PLL configuration testbench.
//!
//! `pllsim run` simulates the PMU host programming the PLL and waiting for
//! lock; `pllsim check` validates a `pllsim.toml` and prints what it
//! resolves to.

#![warn(missing_docs)]

mod check;
mod config;
mod run;

use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "pllsim", version, about = "PLL/PMU discrete-event simulation")]
pub struct Cli {
    /// Suppress the summary and everything below error-level logging.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file or directory containing `pllsim.toml`.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the simulation.
    Run(RunArgs),
    /// Validate the configuration without simulating.
    Check,
}

/// Arguments for `pllsim run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Write a VCD waveform to this path (overrides `waveform.path`).
    #[arg(long)]
    pub vcd: Option<String>,

    /// Do not write a waveform even if one is configured.
    #[arg(long, conflicts_with = "vcd")]
    pub no_waveform: bool,

    /// Stop the simulation at this time (e.g. "50us").
    #[arg(long)]
    pub time: Option<String>,

    /// Print the run report as JSON instead of the transcript.
    #[arg(long)]
    pub json: bool,

    /// Exit with code 2 when the PLL does not lock.
    #[arg(long)]
    pub fail_on_timeout: bool,
}

/// Options shared by every subcommand.
pub struct GlobalArgs {
    /// Suppress the summary.
    pub quiet: bool,
    /// Explicit configuration path.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::Check => check::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the flags.
fn init_logging(quiet: bool, verbose: u8) {
    let level = log_level(quiet, verbose);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
