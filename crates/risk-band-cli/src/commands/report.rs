use clap::Args;
use serde_json::Value;

use risk_band_core::report::{run_report, ReportInput};

use super::{load_dataset, DatasetArgs};

#[derive(Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
}

pub fn run_banding_report(args: ReportArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (records, thresholds) = load_dataset(&args.dataset)?;
    let result = run_report(&ReportInput {
        records,
        thresholds,
    })?;
    Ok(serde_json::to_value(result)?)
}
