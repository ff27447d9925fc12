use clap::Args;
use serde_json::Value;

use risk_band_core::association::{
    calculate_association, contingency_from_records, AssociationInput,
};

use super::{load_dataset, DatasetArgs};

#[derive(Args)]
pub struct AssocArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
}

pub fn run_assoc(args: AssocArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (records, thresholds) = load_dataset(&args.dataset)?;
    let cells = contingency_from_records(&records, &thresholds)?;
    let result = calculate_association(&AssociationInput { cells })?;
    Ok(serde_json::to_value(result)?)
}
