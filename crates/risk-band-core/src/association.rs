//! Association between risk band and default outcome.
//!
//! Covers:
//! 1. **Contingency table** -- observed vs expected counts per band.
//! 2. **Chi-squared test** -- statistic, degrees of freedom, p-value via the
//!    Wilson-Hilferty normal approximation.
//! 3. **Cramer's V** -- effect size for the band/outcome table.
//! 4. **WoE / IV** -- ln(good_rate / bad_rate) per band and total
//!    Information Value with strength classification.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::banding::{assign_band, validate_thresholds, BandThresholds, RiskBand};
use crate::error::RiskBandError;
use crate::types::LoanRecord;
use crate::RiskBandResult;

// ---------------------------------------------------------------------------
// Math helpers
// ---------------------------------------------------------------------------

/// Exponential via Taylor series.
fn decimal_exp(x: Decimal) -> Decimal {
    let ln2 = dec!(0.6931471805599453);
    let n_raw = x / ln2;
    let n = if n_raw >= Decimal::ZERO {
        n_raw.floor()
    } else {
        n_raw.ceil() - Decimal::ONE
    };
    let r = x - n * ln2;

    let mut term = Decimal::ONE;
    let mut sum = Decimal::ONE;
    for i in 1u32..40 {
        term = term * r / Decimal::from(i);
        sum += term;
    }

    let n_i64 = n.to_string().parse::<i64>().unwrap_or(0);
    if n_i64 >= 0 {
        let mut pow2 = Decimal::ONE;
        for _ in 0..n_i64 {
            pow2 *= dec!(2);
        }
        sum * pow2
    } else {
        let mut pow2 = Decimal::ONE;
        for _ in 0..(-n_i64) {
            pow2 *= dec!(2);
        }
        sum / pow2
    }
}

/// Natural logarithm via Taylor series around 1. ln(x) for x > 0.
fn decimal_ln(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let ln2 = dec!(0.6931471805599453);
    let mut val = x;
    let mut adjust = Decimal::ZERO;
    while val > dec!(2.0) {
        val /= dec!(2);
        adjust += ln2;
    }
    while val < dec!(0.5) {
        val *= dec!(2);
        adjust -= ln2;
    }
    let z = (val - Decimal::ONE) / (val + Decimal::ONE);
    let z2 = z * z;
    let mut term = z;
    let mut sum = z;
    for k in 1u32..40 {
        term *= z2;
        let denom = Decimal::from(2 * k + 1);
        sum += term / denom;
    }
    dec!(2) * sum + adjust
}

/// Square root via Newton's method (20 iterations).
fn newton_sqrt(x: Decimal) -> Decimal {
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

/// Cube root via Newton's method.
fn newton_cbrt(x: Decimal) -> Decimal {
    if x.is_zero() {
        return Decimal::ZERO;
    }
    let is_neg = x < Decimal::ZERO;
    let abs_x = x.abs();
    let mut guess = abs_x / dec!(3) + dec!(0.5);
    for _ in 0..30 {
        let g2 = guess * guess;
        if g2.is_zero() {
            break;
        }
        guess = (dec!(2) * guess + abs_x / g2) / dec!(3);
    }
    if is_neg {
        -guess
    } else {
        guess
    }
}

/// Cumulative normal approximation (Abramowitz & Stegun).
fn norm_cdf_approx(x: Decimal) -> Decimal {
    if x < dec!(-10) {
        return Decimal::ZERO;
    }
    if x > dec!(10) {
        return Decimal::ONE;
    }
    let is_neg = x < Decimal::ZERO;
    let abs_x = x.abs();

    let p = dec!(0.2316419);
    let b1 = dec!(0.319381530);
    let b2 = dec!(-0.356563782);
    let b3 = dec!(1.781477937);
    let b4 = dec!(-1.821255978);
    let b5 = dec!(1.330274429);

    let t = Decimal::ONE / (Decimal::ONE + p * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let sqrt_2pi = dec!(2.506628274631);
    let pdf = decimal_exp(-(abs_x * abs_x) / dec!(2)) / sqrt_2pi;

    let cdf = Decimal::ONE - pdf * (b1 * t + b2 * t2 + b3 * t3 + b4 * t4 + b5 * t5);

    if is_neg {
        Decimal::ONE - cdf
    } else {
        cdf
    }
}

/// P(X > x) for chi-squared with df degrees of freedom, via the
/// Wilson-Hilferty cube-root normal approximation.
fn chi_sq_p_value(x: Decimal, df: u32) -> Decimal {
    if x <= Decimal::ZERO {
        return Decimal::ONE;
    }
    if df == 0 {
        return Decimal::ONE;
    }
    let df_d = Decimal::from(df);
    let ratio = x / df_d;

    let cbrt = newton_cbrt(ratio);

    let correction = Decimal::ONE - dec!(2) / (dec!(9) * df_d);
    let variance = dec!(2) / (dec!(9) * df_d);
    let std_dev = newton_sqrt(variance);

    if std_dev.is_zero() {
        return if x > df_d { Decimal::ZERO } else { Decimal::ONE };
    }

    let z = (cbrt - correction) / std_dev;

    Decimal::ONE - norm_cdf_approx(z)
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Observed outcome counts for a single band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandOutcomeCount {
    pub band: RiskBand,
    /// Non-default observations in this band.
    pub good_count: u64,
    /// Default observations in this band.
    pub bad_count: u64,
}

/// Input for the association test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationInput {
    /// Per-band outcome counts. Empty bands are allowed and excluded
    /// from the test.
    pub cells: Vec<BandOutcomeCount>,
}

/// Per-band test detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellResult {
    pub band: RiskBand,
    pub observed_good: u64,
    pub observed_bad: u64,
    pub expected_good: Decimal,
    pub expected_bad: Decimal,
    /// This band's contribution to the chi-squared statistic.
    pub chi_contribution: Decimal,
    /// Weight of Evidence: ln(good_rate / bad_rate).
    pub woe: Decimal,
    /// Information Value contribution: (good_rate - bad_rate) * WoE.
    pub iv: Decimal,
}

/// IV strength classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum IvStrength {
    Useless,
    Weak,
    Medium,
    Strong,
    Suspicious,
}

impl std::fmt::Display for IvStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IvStrength::Useless => write!(f, "Useless"),
            IvStrength::Weak => write!(f, "Weak"),
            IvStrength::Medium => write!(f, "Medium"),
            IvStrength::Strong => write!(f, "Strong"),
            IvStrength::Suspicious => write!(f, "Suspicious"),
        }
    }
}

/// Output of the association test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationOutput {
    /// One entry per occupied band, in presentation order.
    pub cells: Vec<CellResult>,
    pub chi_square: Decimal,
    pub degrees_of_freedom: u32,
    /// Approximate P(X > chi_square).
    pub p_value: Decimal,
    /// Effect size: sqrt(chi2 / n) for a two-outcome table.
    pub cramers_v: Decimal,
    /// Total Information Value across occupied bands.
    pub total_iv: Decimal,
    /// IV strength classification.
    pub iv_strength: String,
    /// True when any expected cell count falls below 5, where the
    /// chi-squared approximation is unreliable.
    pub low_expected_count: bool,
    /// Bands with no observations, excluded from the test.
    pub excluded_bands: Vec<RiskBand>,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Aggregate raw records into per-band outcome counts.
pub fn contingency_from_records(
    records: &[LoanRecord],
    thresholds: &BandThresholds,
) -> RiskBandResult<Vec<BandOutcomeCount>> {
    validate_thresholds(thresholds)?;
    let mut good = [0u64; 4];
    let mut bad = [0u64; 4];
    for record in records {
        if record.defaulted > 1 {
            return Err(RiskBandError::InvalidInput {
                field: "defaulted".into(),
                reason: "Default flag must be 0 or 1.".into(),
            });
        }
        let band = assign_band(record.score, thresholds)?;
        let idx = RiskBand::ALL.iter().position(|b| *b == band).unwrap_or(0);
        if record.defaulted == 1 {
            bad[idx] += 1;
        } else {
            good[idx] += 1;
        }
    }
    Ok(RiskBand::ALL
        .iter()
        .enumerate()
        .map(|(i, band)| BandOutcomeCount {
            band: *band,
            good_count: good[i],
            bad_count: bad[i],
        })
        .collect())
}

/// Run the chi-squared association test and WoE/IV analysis.
pub fn calculate_association(input: &AssociationInput) -> RiskBandResult<AssociationOutput> {
    let occupied: Vec<&BandOutcomeCount> = input
        .cells
        .iter()
        .filter(|c| c.good_count + c.bad_count > 0)
        .collect();
    let excluded_bands: Vec<RiskBand> = input
        .cells
        .iter()
        .filter(|c| c.good_count + c.bad_count == 0)
        .map(|c| c.band)
        .collect();

    validate_association_cells(&occupied)?;

    let total_good: u64 = occupied.iter().map(|c| c.good_count).sum();
    let total_bad: u64 = occupied.iter().map(|c| c.bad_count).sum();
    let n = Decimal::from(total_good + total_bad);
    let total_good_d = Decimal::from(total_good);
    let total_bad_d = Decimal::from(total_bad);

    let mut cells = Vec::with_capacity(occupied.len());
    let mut chi_square = Decimal::ZERO;
    let mut total_iv = Decimal::ZERO;
    let mut low_expected_count = false;

    for cell in &occupied {
        let row_total = Decimal::from(cell.good_count + cell.bad_count);
        let expected_good = row_total * total_good_d / n;
        let expected_bad = row_total * total_bad_d / n;

        if expected_good < dec!(5) || expected_bad < dec!(5) {
            low_expected_count = true;
        }

        let d_good = Decimal::from(cell.good_count) - expected_good;
        let d_bad = Decimal::from(cell.bad_count) - expected_bad;
        let chi_contribution =
            d_good * d_good / expected_good + d_bad * d_bad / expected_bad;
        chi_square += chi_contribution;

        // WoE over column rates, floored at a small epsilon to keep
        // ln() and the ratio finite for one-sided bands.
        let eps = dec!(0.0001);
        let good_rate = Decimal::from(cell.good_count) / total_good_d;
        let bad_rate = Decimal::from(cell.bad_count) / total_bad_d;
        let safe_good = if good_rate < eps { eps } else { good_rate };
        let safe_bad = if bad_rate < eps { eps } else { bad_rate };
        let woe = decimal_ln(safe_good / safe_bad);
        let iv = (safe_good - safe_bad) * woe;
        total_iv += iv;

        cells.push(CellResult {
            band: cell.band,
            observed_good: cell.good_count,
            observed_bad: cell.bad_count,
            expected_good,
            expected_bad,
            chi_contribution,
            woe,
            iv,
        });
    }

    let degrees_of_freedom = (occupied.len() as u32) - 1;
    let p_value = chi_sq_p_value(chi_square, degrees_of_freedom);
    let cramers_v = newton_sqrt(chi_square / n);

    Ok(AssociationOutput {
        cells,
        chi_square,
        degrees_of_freedom,
        p_value,
        cramers_v,
        total_iv,
        iv_strength: classify_iv(total_iv).to_string(),
        low_expected_count,
        excluded_bands,
    })
}

// ---------------------------------------------------------------------------
// IV classification
// ---------------------------------------------------------------------------

fn classify_iv(iv: Decimal) -> IvStrength {
    if iv < dec!(0.02) {
        IvStrength::Useless
    } else if iv < dec!(0.1) {
        IvStrength::Weak
    } else if iv < dec!(0.3) {
        IvStrength::Medium
    } else if iv < dec!(0.5) {
        IvStrength::Strong
    } else {
        IvStrength::Suspicious
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_association_cells(occupied: &[&BandOutcomeCount]) -> RiskBandResult<()> {
    if occupied.len() < 2 {
        return Err(RiskBandError::InsufficientData(
            "The association test needs at least two occupied bands.".into(),
        ));
    }
    let total_good: u64 = occupied.iter().map(|c| c.good_count).sum();
    let total_bad: u64 = occupied.iter().map(|c| c.bad_count).sum();
    if total_good == 0 || total_bad == 0 {
        return Err(RiskBandError::InsufficientData(
            "Both outcomes must be present for the association test.".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
