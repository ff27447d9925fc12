//! The full banding report: band, aggregate, test, model, predict.
//!
//! Composes the descriptive, association, and logistic modules over one
//! dataset and wraps the result in the standard computation envelope with
//! methodology, assumptions, and warnings.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::association::{self, AssociationOutput};
use crate::banding::BandThresholds;
use crate::descriptive::{self, BandSummary, DescriptiveInput};
use crate::error::RiskBandError;
use crate::logistic::{self, BandModelInput, BandModelOutput};
use crate::types::{with_metadata, ComputationOutput, LoanRecord, Rate};
use crate::RiskBandResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Input for the full report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    /// Scored loan records.
    pub records: Vec<LoanRecord>,
    /// Band rule boundaries.
    pub thresholds: BandThresholds,
}

/// The full report body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    /// Per-band descriptive statistics in presentation order.
    pub bands: Vec<BandSummary>,
    pub total_records: u64,
    pub overall_default_rate: Rate,
    pub missing_share: Rate,
    /// Chi-squared association test with WoE/IV detail.
    pub association: AssociationOutput,
    /// Validation model; `None` when a band's outcomes are one-sided,
    /// with the skip recorded as a warning.
    pub model: Option<BandModelOutput>,
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Run the full banding report over a dataset.
pub fn run_report(input: &ReportInput) -> RiskBandResult<ComputationOutput<ReportOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let desc = descriptive::calculate_descriptive(&DescriptiveInput {
        records: input.records.clone(),
        thresholds: input.thresholds,
    })?;

    let cells = association::contingency_from_records(&input.records, &input.thresholds)?;
    let assoc = association::calculate_association(&association::AssociationInput {
        cells: cells.clone(),
    })?;

    if assoc.low_expected_count {
        warnings.push(
            "Expected cell counts below 5; the chi-squared approximation may be unreliable."
                .into(),
        );
    }
    if !assoc.excluded_bands.is_empty() {
        let names: Vec<&str> = assoc.excluded_bands.iter().map(|b| b.as_str()).collect();
        warnings.push(format!(
            "Bands with no observations excluded from the test: {}.",
            names.join(", ")
        ));
    }

    let model = match logistic::calculate_band_model(&BandModelInput { cells }) {
        Ok(m) => Some(m),
        Err(RiskBandError::InsufficientData(msg)) => {
            warnings.push(format!("Validation model skipped: {}", msg));
            None
        }
        Err(e) => return Err(e),
    };

    let result = ReportOutput {
        bands: desc.bands,
        total_records: desc.total_records,
        overall_default_rate: desc.overall_default_rate,
        missing_share: desc.missing_share,
        association: assoc,
        model,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rule-based score banding with chi-squared association test and logistic validation model",
        &input.thresholds,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
