//! Rule-based banding of a continuous credit-risk score.
//!
//! Covers:
//! 1. **Band assignment** -- map a score in [0, 1] to Low / Medium / High,
//!    with missing scores carried as an explicit Missing band.
//! 2. **Band distribution** -- counts and population shares per band.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RiskBandError;
use crate::types::{LoanRecord, Rate, Score};
use crate::RiskBandResult;

// ---------------------------------------------------------------------------
// Bands and thresholds
// ---------------------------------------------------------------------------

/// Ordinal risk band. `Missing` is a first-class band, not an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Missing,
}

impl RiskBand {
    /// Presentation order used by every per-band output.
    pub const ALL: [RiskBand; 4] = [
        RiskBand::Low,
        RiskBand::Medium,
        RiskBand::High,
        RiskBand::Missing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low",
            RiskBand::Medium => "Medium",
            RiskBand::High => "High",
            RiskBand::Missing => "Missing",
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Band rule boundaries. Both cutoffs are inclusive on the lower band:
/// score <= low_cutoff is Low, score <= high_cutoff is Medium, else High.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BandThresholds {
    pub low_cutoff: Score,
    pub high_cutoff: Score,
}

impl Default for BandThresholds {
    fn default() -> Self {
        BandThresholds {
            low_cutoff: dec!(0.3),
            high_cutoff: dec!(0.7),
        }
    }
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Input for the band distribution calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandingInput {
    /// Scored loan records.
    pub records: Vec<LoanRecord>,
    /// Band rule boundaries.
    pub thresholds: BandThresholds,
}

/// Count and share for a single band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandCount {
    pub band: RiskBand,
    pub count: u64,
    /// Share of all records, in [0, 1].
    pub share: Rate,
}

/// Output of the band distribution calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandingOutput {
    /// One entry per band in presentation order, empty bands included.
    pub bands: Vec<BandCount>,
    pub total_records: u64,
    pub thresholds: BandThresholds,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Assign a single score to its band.
///
/// `None` maps to `Missing`. Scores outside [0, 1] are rejected: the score
/// is a probability of default and out-of-range values indicate a broken
/// upstream model rather than a new band.
pub fn assign_band(
    score: Option<Score>,
    thresholds: &BandThresholds,
) -> RiskBandResult<RiskBand> {
    validate_thresholds(thresholds)?;
    let s = match score {
        None => return Ok(RiskBand::Missing),
        Some(s) => s,
    };
    if s < Decimal::ZERO || s > Decimal::ONE {
        return Err(RiskBandError::InvalidInput {
            field: "score".into(),
            reason: format!("Score {} is outside [0, 1].", s),
        });
    }
    if s <= thresholds.low_cutoff {
        Ok(RiskBand::Low)
    } else if s <= thresholds.high_cutoff {
        Ok(RiskBand::Medium)
    } else {
        Ok(RiskBand::High)
    }
}

/// Band every record and report counts and shares per band.
pub fn calculate_banding(input: &BandingInput) -> RiskBandResult<BandingOutput> {
    validate_banding_input(input)?;

    let mut counts = [0u64; 4];
    for record in &input.records {
        let band = assign_band(record.score, &input.thresholds)?;
        let idx = RiskBand::ALL
            .iter()
            .position(|b| *b == band)
            .unwrap_or(0);
        counts[idx] += 1;
    }

    let total = input.records.len() as u64;
    let total_d = Decimal::from(total);

    let bands = RiskBand::ALL
        .iter()
        .zip(counts.iter())
        .map(|(band, count)| BandCount {
            band: *band,
            count: *count,
            share: Decimal::from(*count) / total_d,
        })
        .collect();

    Ok(BandingOutput {
        bands,
        total_records: total,
        thresholds: input.thresholds,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub(crate) fn validate_thresholds(thresholds: &BandThresholds) -> RiskBandResult<()> {
    if thresholds.low_cutoff <= Decimal::ZERO || thresholds.low_cutoff >= Decimal::ONE {
        return Err(RiskBandError::InvalidInput {
            field: "low_cutoff".into(),
            reason: "Low cutoff must lie strictly inside (0, 1).".into(),
        });
    }
    if thresholds.high_cutoff <= Decimal::ZERO || thresholds.high_cutoff >= Decimal::ONE {
        return Err(RiskBandError::InvalidInput {
            field: "high_cutoff".into(),
            reason: "High cutoff must lie strictly inside (0, 1).".into(),
        });
    }
    if thresholds.low_cutoff >= thresholds.high_cutoff {
        return Err(RiskBandError::InvalidInput {
            field: "thresholds".into(),
            reason: "Low cutoff must be below the high cutoff.".into(),
        });
    }
    Ok(())
}

fn validate_banding_input(input: &BandingInput) -> RiskBandResult<()> {
    validate_thresholds(&input.thresholds)?;
    if input.records.is_empty() {
        return Err(RiskBandError::InsufficientData(
            "At least one record is required.".into(),
        ));
    }
    for record in &input.records {
        if record.defaulted > 1 {
            return Err(RiskBandError::InvalidInput {
                field: "defaulted".into(),
                reason: "Default flag must be 0 or 1.".into(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
