//! Augmented Dickey-Fuller stationarity test
//!
//! Classifies a series as stationary when the unit-root hypothesis is
//! rejected at the 5% level. The tau statistic comes from the standard
//! lagged-difference regression; the p-value is interpolated from the
//! constant-case critical-value table, which preserves the classification
//! behavior around the 0.05 decision threshold.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::regression::solve_ols;

/// Series with sample variance below this are treated as constant
const CONSTANT_VARIANCE_EPS: f64 = 1e-12;

/// Constant-case Dickey-Fuller tau percentiles, (tau, p) ascending in tau
const TAU_TABLE: &[(f64, f64)] = &[
    (-3.43, 0.01),
    (-3.12, 0.025),
    (-2.86, 0.05),
    (-2.57, 0.10),
    (-1.57, 0.50),
    (-0.44, 0.90),
    (-0.07, 0.95),
    (0.60, 0.99),
];

/// Whether the unit-root hypothesis is rejected at the 5% level
pub(crate) fn is_stationary(values: &[f64]) -> bool {
    adf_pvalue(values) < 0.05
}

/// Approximate p-value of the augmented Dickey-Fuller test.
///
/// Degenerate inputs resolve conservatively: a constant series is
/// stationary (p = 0), a series too short to regress is not (p = 1).
pub(crate) fn adf_pvalue(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 1.0;
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    if variance < CONSTANT_VARIANCE_EPS {
        return 0.0;
    }

    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let lags = lag_order(n);

    // Regress dy_t on [1, y_{t-1}, dy_{t-1}, ..., dy_{t-lags}]
    let rows = n - 1 - lags;
    let cols = 2 + lags;
    let x = DMatrix::from_fn(rows, cols, |r, c| {
        let t = r + lags + 1; // index into `values`
        match c {
            0 => 1.0,
            1 => values[t - 1],
            _ => diffs[t - c], // c >= 2 selects dy_{t-1} .. dy_{t-lags}
        }
    });
    let y = DVector::from_iterator(rows, (0..rows).map(|r| diffs[r + lags]));

    let ols = match solve_ols(&x, &y) {
        Ok(fit) if fit.df > 0 => fit,
        _ => return 1.0,
    };

    let se = (ols.sigma2 * ols.xtx_inv[(1, 1)]).sqrt();
    let tau = ols.coeffs[1] / se;
    if !tau.is_finite() {
        return 1.0;
    }

    let p = interpolate_pvalue(tau);
    debug!(tau, p, lags, "stationarity test");
    p
}

/// Schwert-style lag truncation, reduced until the regression keeps at
/// least one degree of freedom
fn lag_order(n: usize) -> usize {
    let mut lags = ((n - 1) as f64).cbrt().floor() as usize;
    // rows (n - 1 - lags) must exceed cols (2 + lags)
    while lags > 0 && n - 1 - lags <= 2 + lags {
        lags -= 1;
    }
    lags
}

fn interpolate_pvalue(tau: f64) -> f64 {
    let (first_tau, first_p) = TAU_TABLE[0];
    if tau <= first_tau {
        return first_p;
    }
    let (last_tau, last_p) = TAU_TABLE[TAU_TABLE.len() - 1];
    if tau >= last_tau {
        return 1.0;
    }
    for pair in TAU_TABLE.windows(2) {
        let (t0, p0) = pair[0];
        let (t1, p1) = pair[1];
        if tau <= t1 {
            let frac = (tau - t0) / (t1 - t0);
            return p0 + frac * (p1 - p0);
        }
    }
    last_p
}
