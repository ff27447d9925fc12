use clap::Args;
use serde_json::Value;

use risk_band_core::association::contingency_from_records;
use risk_band_core::logistic::{calculate_band_model, BandModelInput};

use super::{load_dataset, DatasetArgs};

#[derive(Args)]
pub struct LogitArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
}

pub fn run_logit(args: LogitArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (records, thresholds) = load_dataset(&args.dataset)?;
    let cells = contingency_from_records(&records, &thresholds)?;
    let result = calculate_band_model(&BandModelInput { cells })?;
    Ok(serde_json::to_value(result)?)
}
