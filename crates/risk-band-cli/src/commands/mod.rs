pub mod association;
pub mod banding;
pub mod model;
pub mod report;

use clap::Args;
use rust_decimal::Decimal;

use risk_band_core::banding::BandThresholds;
use risk_band_core::LoanRecord;

use crate::input;

/// Dataset flags shared by every data subcommand.
#[derive(Args)]
pub struct DatasetArgs {
    /// Path to the loans file (.csv, or .json with an array of records)
    #[arg(long)]
    pub input: Option<String>,

    /// CSV column holding the model score
    #[arg(long, default_value = "risk_score")]
    pub score_col: String,

    /// CSV column holding the binary default flag
    #[arg(long, default_value = "default")]
    pub default_col: String,

    /// Upper boundary of the Low band (inclusive)
    #[arg(long, default_value = "0.3")]
    pub low: Decimal,

    /// Upper boundary of the Medium band (inclusive)
    #[arg(long, default_value = "0.7")]
    pub high: Decimal,
}

/// Resolve the dataset: CSV or JSON file when --input is given, otherwise
/// a JSON array of records on piped stdin.
pub fn load_dataset(
    args: &DatasetArgs,
) -> Result<(Vec<LoanRecord>, BandThresholds), Box<dyn std::error::Error>> {
    let thresholds = BandThresholds {
        low_cutoff: args.low,
        high_cutoff: args.high,
    };

    let records: Vec<LoanRecord> = if let Some(ref path) = args.input {
        if path.to_ascii_lowercase().ends_with(".json") {
            input::file::read_json(path)?
        } else {
            input::dataset::read_csv(path, &args.score_col, &args.default_col)?
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <loans.csv> or stdin required".into());
    };

    Ok((records, thresholds))
}
