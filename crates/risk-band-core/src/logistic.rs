//! Logistic regression of default outcome on band membership.
//!
//! Covers:
//! 1. **Grouped-binomial IRLS** -- Newton-Raphson on per-band aggregates,
//!    reference-cell coded against the lowest occupied band.
//! 2. **Wald inference** -- standard errors from (X'WX)^-1, z-values,
//!    two-sided p-values, odds ratios.
//! 3. **Fit statistics** -- log-likelihood, null log-likelihood, McFadden
//!    pseudo-R^2.
//! 4. **Prediction** -- fitted default probability per band.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::association::BandOutcomeCount;
use crate::banding::RiskBand;
use crate::error::RiskBandError;
use crate::types::Probability;
use crate::RiskBandResult;

/// Newton-Raphson iteration cap.
const MAX_ITERATIONS: u32 = 25;

/// Convergence tolerance on the largest coefficient step.
const TOLERANCE: Decimal = dec!(0.000000001);

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

/// Cumulative normal approximation (Abramowitz & Stegun).
fn norm_cdf(x: Decimal) -> Decimal {
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

/// Inverse logit with the linear predictor clamped to keep exp() in range.
fn sigmoid(eta: Decimal) -> Decimal {
    let clamped = if eta > dec!(30) {
        dec!(30)
    } else if eta < dec!(-30) {
        dec!(-30)
    } else {
        eta
    };
    Decimal::ONE / (Decimal::ONE + decimal_exp(-clamped))
}

/// Solve A x = b by Gaussian elimination with partial pivoting.
fn solve_system(a: &[Vec<Decimal>], b: &[Decimal]) -> RiskBandResult<Vec<Decimal>> {
    let k = b.len();
    let mut aug: Vec<Vec<Decimal>> = (0..k)
        .map(|i| {
            let mut row = a[i].clone();
            row.push(b[i]);
            row
        })
        .collect();

    for col in 0..k {
        let mut pivot_row = col;
        for row in (col + 1)..k {
            if aug[row][col].abs() > aug[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        if aug[pivot_row][col].abs() < dec!(0.000000000001) {
            return Err(RiskBandError::DivisionByZero {
                context: "weighted normal equations pivot".into(),
            });
        }
        aug.swap(col, pivot_row);

        for row in (col + 1)..k {
            let factor = aug[row][col] / aug[col][col];
            for c in col..=k {
                let delta = factor * aug[col][c];
                aug[row][c] -= delta;
            }
        }
    }

    let mut x = vec![Decimal::ZERO; k];
    for row in (0..k).rev() {
        let mut sum = aug[row][k];
        for c in (row + 1)..k {
            sum -= aug[row][c] * x[c];
        }
        x[row] = sum / aug[row][row];
    }
    Ok(x)
}

/// Invert a symmetric positive-definite matrix by solving unit columns.
fn invert_matrix(a: &[Vec<Decimal>]) -> RiskBandResult<Vec<Vec<Decimal>>> {
    let k = a.len();
    let mut inv = vec![vec![Decimal::ZERO; k]; k];
    for col in 0..k {
        let mut unit = vec![Decimal::ZERO; k];
        unit[col] = Decimal::ONE;
        let solved = solve_system(a, &unit)?;
        for row in 0..k {
            inv[row][col] = solved[row];
        }
    }
    Ok(inv)
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Input for the band validation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandModelInput {
    /// Per-band outcome counts. Empty bands are allowed and dropped from
    /// the design.
    pub cells: Vec<BandOutcomeCount>,
}

/// One estimated model term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermEstimate {
    /// "intercept" or the band name of the dummy.
    pub term: String,
    pub coefficient: Decimal,
    pub std_error: Decimal,
    pub z_value: Decimal,
    /// Two-sided Wald p-value.
    pub p_value: Decimal,
    pub odds_ratio: Decimal,
}

/// Fitted default probability per band against the observed rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandPrediction {
    pub band: RiskBand,
    pub predicted_pd: Probability,
    pub observed_rate: Probability,
}

/// Output of the band validation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandModelOutput {
    /// Reference band absorbed by the intercept.
    pub reference_band: RiskBand,
    pub terms: Vec<TermEstimate>,
    pub predictions: Vec<BandPrediction>,
    /// Binomial log-likelihood, combinatorial constant omitted.
    pub log_likelihood: Decimal,
    pub null_log_likelihood: Decimal,
    pub mcfadden_r2: Decimal,
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Fit the band validation model by grouped-binomial IRLS.
///
/// The design is saturated: intercept for the lowest occupied band plus one
/// dummy per remaining band, so the fitted probabilities reproduce the
/// observed band default rates when the banding is sound.
pub fn calculate_band_model(input: &BandModelInput) -> RiskBandResult<BandModelOutput> {
    let occupied: Vec<&BandOutcomeCount> = input
        .cells
        .iter()
        .filter(|c| c.good_count + c.bad_count > 0)
        .collect();

    validate_model_cells(&occupied)?;

    let k = occupied.len();
    let n: Vec<Decimal> = occupied
        .iter()
        .map(|c| Decimal::from(c.good_count + c.bad_count))
        .collect();
    let y: Vec<Decimal> = occupied
        .iter()
        .map(|c| Decimal::from(c.bad_count))
        .collect();

    // Row i of the design: intercept plus a dummy for every non-reference band.
    let design: Vec<Vec<Decimal>> = (0..k)
        .map(|i| {
            let mut row = vec![Decimal::ZERO; k];
            row[0] = Decimal::ONE;
            if i > 0 {
                row[i] = Decimal::ONE;
            }
            row
        })
        .collect();

    let mut beta = vec![Decimal::ZERO; k];
    let mut iterations = 0u32;
    let mut last_delta = Decimal::ZERO;
    let mut converged = false;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        let eta: Vec<Decimal> = design
            .iter()
            .map(|row| row.iter().zip(beta.iter()).map(|(x, b)| *x * *b).sum())
            .collect();
        let mu: Vec<Decimal> = eta.iter().map(|e| sigmoid(*e)).collect();
        let w: Vec<Decimal> = (0..k)
            .map(|i| n[i] * mu[i] * (Decimal::ONE - mu[i]))
            .collect();

        // Working response z = eta + (y - n*mu) / w
        let z: Vec<Decimal> = (0..k)
            .map(|i| eta[i] + (y[i] - n[i] * mu[i]) / w[i])
            .collect();

        // X'WX and X'Wz
        let mut xtwx = vec![vec![Decimal::ZERO; k]; k];
        let mut xtwz = vec![Decimal::ZERO; k];
        for i in 0..k {
            for p in 0..k {
                if design[i][p].is_zero() {
                    continue;
                }
                xtwz[p] += w[i] * design[i][p] * z[i];
                for q in 0..k {
                    if design[i][q].is_zero() {
                        continue;
                    }
                    xtwx[p][q] += w[i] * design[i][p] * design[i][q];
                }
            }
        }

        let beta_new = solve_system(&xtwx, &xtwz)?;

        last_delta = beta_new
            .iter()
            .zip(beta.iter())
            .map(|(a, b)| (*a - *b).abs())
            .fold(Decimal::ZERO, |acc, d| if d > acc { d } else { acc });
        beta = beta_new;

        if last_delta < TOLERANCE {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(RiskBandError::ConvergenceFailure {
            function: "band_model_irls".into(),
            iterations,
            last_delta,
        });
    }

    // Covariance at the converged fit for Wald inference.
    let eta: Vec<Decimal> = design
        .iter()
        .map(|row| row.iter().zip(beta.iter()).map(|(x, b)| *x * *b).sum())
        .collect();
    let mu: Vec<Decimal> = eta.iter().map(|e| sigmoid(*e)).collect();
    let w: Vec<Decimal> = (0..k)
        .map(|i| n[i] * mu[i] * (Decimal::ONE - mu[i]))
        .collect();
    let mut xtwx = vec![vec![Decimal::ZERO; k]; k];
    for i in 0..k {
        for p in 0..k {
            if design[i][p].is_zero() {
                continue;
            }
            for q in 0..k {
                if design[i][q].is_zero() {
                    continue;
                }
                xtwx[p][q] += w[i] * design[i][p] * design[i][q];
            }
        }
    }
    let covariance = invert_matrix(&xtwx)?;

    let reference_band = occupied[0].band;
    let mut terms = Vec::with_capacity(k);
    for j in 0..k {
        let term = if j == 0 {
            "intercept".to_string()
        } else {
            occupied[j].band.as_str().to_string()
        };
        let se = newton_sqrt(covariance[j][j]);
        let z_value = if se.is_zero() {
            Decimal::ZERO
        } else {
            beta[j] / se
        };
        let p_value = dec!(2) * (Decimal::ONE - norm_cdf(z_value.abs()));
        terms.push(TermEstimate {
            term,
            coefficient: beta[j],
            std_error: se,
            z_value,
            p_value,
            odds_ratio: decimal_exp(beta[j]),
        });
    }

    // Prediction step: fitted PD per band against the observed rate.
    let predictions: Vec<BandPrediction> = (0..k)
        .map(|i| BandPrediction {
            band: occupied[i].band,
            predicted_pd: mu[i],
            observed_rate: y[i] / n[i],
        })
        .collect();

    // Log-likelihoods (binomial coefficient omitted throughout).
    let mut log_likelihood = Decimal::ZERO;
    for i in 0..k {
        log_likelihood +=
            y[i] * decimal_ln(mu[i]) + (n[i] - y[i]) * decimal_ln(Decimal::ONE - mu[i]);
    }
    let total_n: Decimal = n.iter().copied().sum();
    let total_y: Decimal = y.iter().copied().sum();
    let p_bar = total_y / total_n;
    let null_log_likelihood =
        total_y * decimal_ln(p_bar) + (total_n - total_y) * decimal_ln(Decimal::ONE - p_bar);

    let mcfadden_r2 = if null_log_likelihood.is_zero() {
        Decimal::ZERO
    } else {
        Decimal::ONE - log_likelihood / null_log_likelihood
    };

    Ok(BandModelOutput {
        reference_band,
        terms,
        predictions,
        log_likelihood,
        null_log_likelihood,
        mcfadden_r2,
        iterations,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_model_cells(occupied: &[&BandOutcomeCount]) -> RiskBandResult<()> {
    if occupied.len() < 2 {
        return Err(RiskBandError::InsufficientData(
            "The validation model needs at least two occupied bands.".into(),
        ));
    }
    for cell in occupied {
        if cell.good_count == 0 || cell.bad_count == 0 {
            return Err(RiskBandError::InsufficientData(format!(
                "Band {} has only one outcome; its log-odds are unbounded.",
                cell.band
            )));
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

    fn cell(band: RiskBand, good: u64, bad: u64) -> BandOutcomeCount {
        BandOutcomeCount {
            band,
            good_count: good,
            bad_count: bad,
        }
    }

    fn three_band_input() -> BandModelInput {
        BandModelInput {
            cells: vec![
                cell(RiskBand::Low, 90, 10),
                cell(RiskBand::Medium, 70, 30),
                cell(RiskBand::High, 40, 60),
            ],
        }
    }

    #[test]
    fn test_intercept_is_reference_band_log_odds() {
        // Low rate 0.1: logit(0.1) = ln(1/9) ~ -2.1972
        let out = calculate_band_model(&three_band_input()).unwrap();
        assert_eq!(out.reference_band, RiskBand::Low);
        assert!(approx_eq(
            out.terms[0].coefficient,
            dec!(-2.1972),
            dec!(0.001)
        ));
    }

    #[test]
    fn test_dummy_coefficients_are_log_odds_ratios() {
        // Medium: logit(0.3) - logit(0.1) ~ 1.3499
        // High:   logit(0.6) - logit(0.1) ~ 2.6027
        let out = calculate_band_model(&three_band_input()).unwrap();
        assert_eq!(out.terms[1].term, "Medium");
        assert!(approx_eq(out.terms[1].coefficient, dec!(1.3499), dec!(0.001)));
        assert_eq!(out.terms[2].term, "High");
        assert!(approx_eq(out.terms[2].coefficient, dec!(2.6027), dec!(0.001)));
    }

    #[test]
    fn test_saturated_fit_reproduces_observed_rates() {
        let out = calculate_band_model(&three_band_input()).unwrap();
        for p in &out.predictions {
            assert!(
                approx_eq(p.predicted_pd, p.observed_rate, dec!(0.000001)),
                "band {} fitted {} vs observed {}",
                p.band,
                p.predicted_pd,
                p.observed_rate
            );
        }
    }

    #[test]
    fn test_predictions_increase_across_bands() {
        let out = calculate_band_model(&three_band_input()).unwrap();
        assert!(out.predictions[0].predicted_pd < out.predictions[1].predicted_pd);
        assert!(out.predictions[1].predicted_pd < out.predictions[2].predicted_pd);
    }

    #[test]
    fn test_standard_errors_closed_form() {
        // With reference-cell coding: se(b0) = sqrt(1/w_L) and
        // se(b_j) = sqrt(1/w_L + 1/w_j), w = n * p * (1 - p).
        let out = calculate_band_model(&three_band_input()).unwrap();
        // w_L = 100 * 0.1 * 0.9 = 9
        assert!(approx_eq(out.terms[0].std_error, dec!(0.33333), dec!(0.001)));
        // w_M = 21: sqrt(1/9 + 1/21) ~ 0.3984
        assert!(approx_eq(out.terms[1].std_error, dec!(0.3984), dec!(0.001)));
        // w_H = 24: sqrt(1/9 + 1/24) ~ 0.3909
        assert!(approx_eq(out.terms[2].std_error, dec!(0.3909), dec!(0.001)));
    }

    #[test]
    fn test_high_band_is_significant() {
        let out = calculate_band_model(&three_band_input()).unwrap();
        // z ~ 6.66
        assert!(out.terms[2].z_value > dec!(6));
        assert!(out.terms[2].p_value < dec!(0.001));
    }

    #[test]
    fn test_odds_ratios_match_coefficients() {
        let out = calculate_band_model(&three_band_input()).unwrap();
        // exp(1.3499) ~ 3.857 (odds 3/7 over odds 1/9)
        assert!(approx_eq(out.terms[1].odds_ratio, dec!(3.857), dec!(0.01)));
    }

    #[test]
    fn test_converges_quickly() {
        let out = calculate_band_model(&three_band_input()).unwrap();
        assert!(out.iterations < 15, "took {} iterations", out.iterations);
    }

    #[test]
    fn test_log_likelihood_negative_and_above_null() {
        let out = calculate_band_model(&three_band_input()).unwrap();
        assert!(out.log_likelihood < Decimal::ZERO);
        assert!(out.null_log_likelihood < out.log_likelihood);
    }

    #[test]
    fn test_mcfadden_r2_in_unit_interval() {
        let out = calculate_band_model(&three_band_input()).unwrap();
        assert!(out.mcfadden_r2 > Decimal::ZERO);
        assert!(out.mcfadden_r2 < Decimal::ONE);
    }

    #[test]
    fn test_no_association_gives_near_zero_coefficients() {
        let input = BandModelInput {
            cells: vec![
                cell(RiskBand::Low, 80, 20),
                cell(RiskBand::High, 80, 20),
            ],
        };
        let out = calculate_band_model(&input).unwrap();
        assert!(approx_eq(out.terms[1].coefficient, Decimal::ZERO, dec!(0.0001)));
        assert!(out.terms[1].p_value > dec!(0.9));
        assert!(approx_eq(out.mcfadden_r2, Decimal::ZERO, dec!(0.0001)));
    }

    #[test]
    fn test_missing_band_gets_its_own_term() {
        let input = BandModelInput {
            cells: vec![
                cell(RiskBand::Low, 90, 10),
                cell(RiskBand::High, 40, 60),
                cell(RiskBand::Missing, 25, 25),
            ],
        };
        let out = calculate_band_model(&input).unwrap();
        assert_eq!(out.terms.len(), 3);
        assert_eq!(out.terms[2].term, "Missing");
        // Missing rate 0.5: logit(0.5) - logit(0.1) ~ 2.1972
        assert!(approx_eq(out.terms[2].coefficient, dec!(2.1972), dec!(0.001)));
    }

    #[test]
    fn test_empty_band_dropped_from_design() {
        let input = BandModelInput {
            cells: vec![
                cell(RiskBand::Low, 90, 10),
                cell(RiskBand::Medium, 0, 0),
                cell(RiskBand::High, 40, 60),
            ],
        };
        let out = calculate_band_model(&input).unwrap();
        assert_eq!(out.terms.len(), 2);
        assert_eq!(out.predictions.len(), 2);
    }

    #[test]
    fn test_reject_separated_band() {
        let input = BandModelInput {
            cells: vec![
                cell(RiskBand::Low, 90, 10),
                cell(RiskBand::High, 0, 60),
            ],
        };
        let err = calculate_band_model(&input).unwrap_err();
        match err {
            RiskBandError::InsufficientData(msg) => assert!(msg.contains("High")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_reject_single_band() {
        let input = BandModelInput {
            cells: vec![cell(RiskBand::Low, 90, 10)],
        };
        assert!(calculate_band_model(&input).is_err());
    }

    #[test]
    fn test_sigmoid_midpoint_and_tails() {
        assert!(approx_eq(sigmoid(Decimal::ZERO), dec!(0.5), dec!(0.0000001)));
        assert!(sigmoid(dec!(100)) > dec!(0.999999));
        assert!(sigmoid(dec!(-100)) < dec!(0.000001));
    }

    #[test]
    fn test_solve_system_known_solution() {
        // [2 1; 1 3] x = [5; 10] -> x = [1; 3]
        let a = vec![vec![dec!(2), dec!(1)], vec![dec!(1), dec!(3)]];
        let b = vec![dec!(5), dec!(10)];
        let x = solve_system(&a, &b).unwrap();
        assert!(approx_eq(x[0], dec!(1), dec!(0.0000001)));
        assert!(approx_eq(x[1], dec!(3), dec!(0.0000001)));
    }

    #[test]
    fn test_solve_system_rejects_singular() {
        let a = vec![vec![dec!(1), dec!(2)], vec![dec!(2), dec!(4)]];
        let b = vec![dec!(1), dec!(2)];
        assert!(solve_system(&a, &b).is_err());
    }

    #[test]
    fn test_invert_identity() {
        let a = vec![
            vec![Decimal::ONE, Decimal::ZERO],
            vec![Decimal::ZERO, Decimal::ONE],
        ];
        let inv = invert_matrix(&a).unwrap();
        assert_eq!(inv[0][0], Decimal::ONE);
        assert_eq!(inv[1][1], Decimal::ONE);
        assert_eq!(inv[0][1], Decimal::ZERO);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let out = calculate_band_model(&three_band_input()).unwrap();
        let json = serde_json::to_string(&out).unwrap();
        let _: BandModelOutput = serde_json::from_str(&json).unwrap();
    }
}
