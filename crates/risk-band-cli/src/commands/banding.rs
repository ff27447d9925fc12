use clap::Args;
use serde_json::Value;

use risk_band_core::descriptive::{calculate_descriptive, DescriptiveInput};

use super::{load_dataset, DatasetArgs};

#[derive(Args)]
pub struct BandStatsArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
}

pub fn run_band_stats(args: BandStatsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (records, thresholds) = load_dataset(&args.dataset)?;
    let result = calculate_descriptive(&DescriptiveInput {
        records,
        thresholds,
    })?;
    Ok(serde_json::to_value(result)?)
}
