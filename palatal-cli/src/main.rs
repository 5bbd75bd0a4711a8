//! palatal: logistic-regression case study of consonant-cluster
//! palatalization.
//!
//! CLI entry point using clap for argument parsing.

mod commands;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "palatal",
    version,
    about = "Cluster palatalization analysis: binomial GLMs with stepwise selection",
    long_about = "Loads a table of annotated consonant-cluster tokens, collapses it to\n\
                  word types, fits factorial and subset binomial regression models with\n\
                  backward stepwise selection, and reports marginal means, Tukey-adjusted\n\
                  contrasts, and predicted probabilities."
)]
struct Cli {
    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis pipeline and write the report
    Run(commands::run::RunArgs),

    /// Print grouped counts for a set of factor columns
    Counts(commands::counts::CountsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Counts(args) => commands::counts::run(args),
    }
}
