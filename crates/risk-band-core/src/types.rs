use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Model scores. Wraps Decimal to prevent accidental f64 usage.
pub type Score = Decimal;

/// Probabilities and rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Probability = Decimal;

/// Rates and shares of a population (0.25 = 25%)
pub type Rate = Decimal;

/// One row of the scored-loan dataset.
///
/// `score` is the model's probability-of-default estimate in [0, 1];
/// a missing score is carried as `None` rather than a sentinel value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    /// Observed outcome: 0 = no default, 1 = default.
    pub defaulted: u8,
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
