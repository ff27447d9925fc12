mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::association::AssocArgs;
use commands::banding::BandStatsArgs;
use commands::model::LogitArgs;
use commands::report::ReportArgs;

/// Credit score banding and validation analytics
#[derive(Parser)]
#[command(
    name = "rba",
    version,
    about = "Credit score banding and validation analytics",
    long_about = "A CLI for banding continuous credit-risk scores into ordinal bands \
                  with decimal precision. Produces per-band descriptive statistics, a \
                  chi-squared association test with WoE/IV detail, and a logistic \
                  validation model with per-band predicted default probabilities."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full banding report (band, aggregate, test, model, predict)
    Report(ReportArgs),
    /// Per-band descriptive statistics
    BandStats(BandStatsArgs),
    /// Chi-squared association test between band and default outcome
    Assoc(AssocArgs),
    /// Fit the logistic validation model on band membership
    Logit(LogitArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Report(args) => commands::report::run_banding_report(args),
        Commands::BandStats(args) => commands::banding::run_band_stats(args),
        Commands::Assoc(args) => commands::association::run_assoc(args),
        Commands::Logit(args) => commands::model::run_logit(args),
        Commands::Version => {
            println!("rba {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
