//! Per-band descriptive statistics.
//!
//! Covers:
//! 1. **Band distribution** -- count and share per band.
//! 2. **Score statistics** -- mean, sample standard deviation, min, max,
//!    median of the score within each band.
//! 3. **Outcome statistics** -- default count and default rate per band and
//!    overall.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::banding::{assign_band, validate_thresholds, BandThresholds, RiskBand};
use crate::error::RiskBandError;
use crate::types::{LoanRecord, Rate, Score};
use crate::RiskBandResult;

// ---------------------------------------------------------------------------
// Math helpers
// ---------------------------------------------------------------------------

/// Square root via Newton's method (20 iterations).
fn decimal_sqrt(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut guess = x / dec!(2);
    if guess.is_zero() {
        guess = Decimal::ONE;
    }
    for _ in 0..20 {
        guess = (guess + x / guess) / dec!(2);
    }
    guess
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Input for the descriptive statistics calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveInput {
    /// Scored loan records.
    pub records: Vec<LoanRecord>,
    /// Band rule boundaries.
    pub thresholds: BandThresholds,
}

/// Descriptive statistics for a single band.
///
/// Score statistics are `None` for the Missing band and for empty bands;
/// the standard deviation additionally needs at least two observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandSummary {
    pub band: RiskBand,
    pub count: u64,
    pub share: Rate,
    pub score_mean: Option<Score>,
    pub score_std_dev: Option<Score>,
    pub score_min: Option<Score>,
    pub score_max: Option<Score>,
    pub score_median: Option<Score>,
    pub default_count: u64,
    /// Default rate within the band; `None` when the band is empty.
    pub default_rate: Option<Rate>,
}

/// Output of the descriptive statistics calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveOutput {
    /// One entry per band in presentation order, empty bands included.
    pub bands: Vec<BandSummary>,
    pub total_records: u64,
    pub total_defaults: u64,
    pub overall_default_rate: Rate,
    /// Share of records with no score.
    pub missing_share: Rate,
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Group records by band and compute per-band descriptive statistics.
pub fn calculate_descriptive(input: &DescriptiveInput) -> RiskBandResult<DescriptiveOutput> {
    validate_descriptive_input(input)?;

    let mut grouped: [(Vec<Score>, u64, u64); 4] = [
        (Vec::new(), 0, 0),
        (Vec::new(), 0, 0),
        (Vec::new(), 0, 0),
        (Vec::new(), 0, 0),
    ];

    for record in &input.records {
        let band = assign_band(record.score, &input.thresholds)?;
        let idx = RiskBand::ALL.iter().position(|b| *b == band).unwrap_or(0);
        let slot = &mut grouped[idx];
        slot.1 += 1;
        if record.defaulted == 1 {
            slot.2 += 1;
        }
        if let Some(s) = record.score {
            slot.0.push(s);
        }
    }

    let total = input.records.len() as u64;
    let total_d = Decimal::from(total);
    let total_defaults: u64 = grouped.iter().map(|g| g.2).sum();

    let mut bands = Vec::with_capacity(4);
    for (band, (scores, count, defaults)) in RiskBand::ALL.iter().zip(grouped.iter_mut()) {
        let count_d = Decimal::from(*count);
        let default_rate = if *count == 0 {
            None
        } else {
            Some(Decimal::from(*defaults) / count_d)
        };

        let (mean, std_dev, min, max, median) = score_stats(scores);

        bands.push(BandSummary {
            band: *band,
            count: *count,
            share: count_d / total_d,
            score_mean: mean,
            score_std_dev: std_dev,
            score_min: min,
            score_max: max,
            score_median: median,
            default_count: *defaults,
            default_rate,
        });
    }

    let missing_count = bands
        .iter()
        .find(|b| b.band == RiskBand::Missing)
        .map(|b| b.count)
        .unwrap_or(0);

    Ok(DescriptiveOutput {
        bands,
        total_records: total,
        total_defaults,
        overall_default_rate: Decimal::from(total_defaults) / total_d,
        missing_share: Decimal::from(missing_count) / total_d,
    })
}

/// Mean, sample standard deviation, min, max, median of a score sample.
fn score_stats(
    scores: &mut Vec<Score>,
) -> (
    Option<Score>,
    Option<Score>,
    Option<Score>,
    Option<Score>,
    Option<Score>,
) {
    if scores.is_empty() {
        return (None, None, None, None, None);
    }

    let n = Decimal::from(scores.len() as u64);
    let sum: Decimal = scores.iter().copied().sum();
    let mean = sum / n;

    let std_dev = if scores.len() < 2 {
        None
    } else {
        let ss: Decimal = scores.iter().map(|s| (*s - mean) * (*s - mean)).sum();
        Some(decimal_sqrt(ss / (n - Decimal::ONE)))
    };

    scores.sort();
    let min = scores[0];
    let max = scores[scores.len() - 1];
    let mid = scores.len() / 2;
    let median = if scores.len() % 2 == 1 {
        scores[mid]
    } else {
        (scores[mid - 1] + scores[mid]) / dec!(2)
    };

    (Some(mean), std_dev, Some(min), Some(max), Some(median))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_descriptive_input(input: &DescriptiveInput) -> RiskBandResult<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn rec(score: Option<Decimal>, defaulted: u8) -> LoanRecord {
        LoanRecord { score, defaulted }
    }

    fn sample_input() -> DescriptiveInput {
        DescriptiveInput {
            records: vec![
                rec(Some(dec!(0.1)), 0),
                rec(Some(dec!(0.2)), 0),
                rec(Some(dec!(0.3)), 1),
                rec(Some(dec!(0.4)), 0),
                rec(Some(dec!(0.6)), 1),
                rec(Some(dec!(0.8)), 1),
                rec(Some(dec!(0.9)), 1),
                rec(None, 0),
                rec(None, 1),
            ],
            thresholds: BandThresholds::default(),
        }
    }

    #[test]
    fn test_band_counts() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        // Low: 0.1, 0.2, 0.3 / Medium: 0.4, 0.6 / High: 0.8, 0.9 / Missing: 2
        assert_eq!(out.bands[0].count, 3);
        assert_eq!(out.bands[1].count, 2);
        assert_eq!(out.bands[2].count, 2);
        assert_eq!(out.bands[3].count, 2);
    }

    #[test]
    fn test_low_band_mean() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        // (0.1 + 0.2 + 0.3) / 3 = 0.2
        assert!(approx_eq(
            out.bands[0].score_mean.unwrap(),
            dec!(0.2),
            dec!(0.0000001)
        ));
    }

    #[test]
    fn test_low_band_std_dev() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        // Sample std dev of {0.1, 0.2, 0.3} = 0.1
        assert!(approx_eq(
            out.bands[0].score_std_dev.unwrap(),
            dec!(0.1),
            dec!(0.0001)
        ));
    }

    #[test]
    fn test_min_max_median() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        assert_eq!(out.bands[0].score_min.unwrap(), dec!(0.1));
        assert_eq!(out.bands[0].score_max.unwrap(), dec!(0.3));
        assert_eq!(out.bands[0].score_median.unwrap(), dec!(0.2));
    }

    #[test]
    fn test_even_count_median_averages() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        // Medium scores {0.4, 0.6} -> median 0.5
        assert_eq!(out.bands[1].score_median.unwrap(), dec!(0.5));
    }

    #[test]
    fn test_missing_band_has_no_score_stats() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        let missing = &out.bands[3];
        assert!(missing.score_mean.is_none());
        assert!(missing.score_std_dev.is_none());
        assert!(missing.score_min.is_none());
        assert!(missing.score_median.is_none());
    }

    #[test]
    fn test_default_rates_rise_with_band() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        // Low 1/3, Medium 1/2, High 2/2
        let low = out.bands[0].default_rate.unwrap();
        let medium = out.bands[1].default_rate.unwrap();
        let high = out.bands[2].default_rate.unwrap();
        assert!(low < medium && medium < high);
        assert_eq!(high, Decimal::ONE);
    }

    #[test]
    fn test_overall_default_rate() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        // 5 defaults over 9 records
        assert!(approx_eq(
            out.overall_default_rate,
            dec!(5) / dec!(9),
            dec!(0.0000001)
        ));
        assert_eq!(out.total_defaults, 5);
    }

    #[test]
    fn test_missing_share() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        assert!(approx_eq(
            out.missing_share,
            dec!(2) / dec!(9),
            dec!(0.0000001)
        ));
    }

    #[test]
    fn test_empty_band_summary() {
        let input = DescriptiveInput {
            records: vec![rec(Some(dec!(0.2)), 0), rec(Some(dec!(0.25)), 1)],
            thresholds: BandThresholds::default(),
        };
        let out = calculate_descriptive(&input).unwrap();
        let high = &out.bands[2];
        assert_eq!(high.count, 0);
        assert_eq!(high.share, Decimal::ZERO);
        assert!(high.default_rate.is_none());
        assert!(high.score_mean.is_none());
    }

    #[test]
    fn test_single_observation_band_has_no_std_dev() {
        let input = DescriptiveInput {
            records: vec![rec(Some(dec!(0.9)), 1), rec(Some(dec!(0.1)), 0)],
            thresholds: BandThresholds::default(),
        };
        let out = calculate_descriptive(&input).unwrap();
        let high = &out.bands[2];
        assert_eq!(high.count, 1);
        assert!(high.score_std_dev.is_none());
        assert_eq!(high.score_mean.unwrap(), dec!(0.9));
    }

    #[test]
    fn test_shares_sum_to_one() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        let sum: Decimal = out.bands.iter().map(|b| b.share).sum();
        assert!(approx_eq(sum, Decimal::ONE, dec!(0.0000001)));
    }

    #[test]
    fn test_reject_empty_records() {
        let input = DescriptiveInput {
            records: vec![],
            thresholds: BandThresholds::default(),
        };
        assert!(calculate_descriptive(&input).is_err());
    }

    #[test]
    fn test_reject_bad_default_flag() {
        let input = DescriptiveInput {
            records: vec![rec(Some(dec!(0.5)), 3)],
            thresholds: BandThresholds::default(),
        };
        assert!(calculate_descriptive(&input).is_err());
    }

    #[test]
    fn test_decimal_sqrt_known_values() {
        assert!(approx_eq(decimal_sqrt(dec!(4)), dec!(2), dec!(0.0000001)));
        assert!(approx_eq(
            decimal_sqrt(dec!(2)),
            dec!(1.41421356),
            dec!(0.0001)
        ));
        assert_eq!(decimal_sqrt(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let out = calculate_descriptive(&sample_input()).unwrap();
        let json = serde_json::to_string(&out).unwrap();
        let _: DescriptiveOutput = serde_json::from_str(&json).unwrap();
    }
}
