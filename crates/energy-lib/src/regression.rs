//! Linear least-squares fitting shared by the calibration engine and the
//! time-series forecaster.
//!
//! Two line-fit paths are provided: a design-matrix ordinary least squares
//! solve that also reports R², and a closed-form fallback for deployments
//! where the matrix path is disabled. Both agree within numerical tolerance
//! on well-conditioned data.

use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;

use crate::error::EstimatorError;

/// Relative determinant threshold below which a normal-equation system is
/// treated as singular
const SINGULARITY_TOLERANCE: f64 = 1e-10;

/// Fitted line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Goodness of fit, reported by the OLS path only
    pub r_squared: Option<f64>,
}

/// Which line-fit implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMethod {
    /// Design-matrix ordinary least squares with R² diagnostics
    #[default]
    Ols,
    /// Closed-form covariance/variance computation
    Manual,
}

/// Fit a line through `(x, y)` measurement pairs
pub fn fit_line(points: &[(f64, f64)], method: FitMethod) -> Result<LinearFit, EstimatorError> {
    match method {
        FitMethod::Ols => fit_line_ols(points),
        FitMethod::Manual => fit_line_manual(points),
    }
}

fn fit_line_ols(points: &[(f64, f64)]) -> Result<LinearFit, EstimatorError> {
    let rows = points.len();
    let x = DMatrix::from_fn(rows, 2, |r, c| if c == 0 { 1.0 } else { points[r].0 });
    let y = DVector::from_iterator(rows, points.iter().map(|(_, y)| *y));

    let ols = solve_ols(&x, &y)?;
    let intercept = ols.coeffs[0];
    let slope = ols.coeffs[1];

    let y_mean = y.mean();
    let sst: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let sse: f64 = ols.residuals.iter().map(|r| r.powi(2)).sum();
    let r_squared = if sst > f64::EPSILON { 1.0 - sse / sst } else { 1.0 };

    Ok(LinearFit { slope, intercept, r_squared: Some(r_squared) })
}

fn fit_line_manual(points: &[(f64, f64)]) -> Result<LinearFit, EstimatorError> {
    let xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    let ys: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
    let x_mean = xs.as_slice().mean();
    let y_mean = ys.as_slice().mean();

    let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    if sxx < f64::EPSILON {
        return Err(EstimatorError::ModelFit(
            "zero variance in x measurements".to_string(),
        ));
    }
    let sxy: f64 = points
        .iter()
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    Ok(LinearFit { slope, intercept, r_squared: None })
}

/// Result of a general ordinary least squares solve
#[derive(Debug, Clone)]
pub(crate) struct OlsFit {
    pub coeffs: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Residual variance adjusted for degrees of freedom (0 when df == 0)
    pub sigma2: f64,
    pub xtx_inv: DMatrix<f64>,
    pub df: usize,
}

/// Solve `y = X b` in the least-squares sense via the normal equations.
///
/// Rejects singular and near-singular systems so callers can skip the
/// offending model candidate instead of consuming garbage coefficients.
pub(crate) fn solve_ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, EstimatorError> {
    let rows = x.nrows();
    let cols = x.ncols();
    if rows < cols {
        return Err(EstimatorError::ModelFit(format!(
            "underdetermined system: {rows} rows for {cols} coefficients"
        )));
    }

    let xtx = x.transpose() * x;
    let det = xtx.determinant();
    let scale: f64 = xtx.diagonal().iter().fold(1.0, |acc, d| acc * d.max(f64::MIN_POSITIVE));
    if !det.is_finite() || det.abs() <= SINGULARITY_TOLERANCE * scale {
        return Err(EstimatorError::ModelFit(
            "singular design matrix".to_string(),
        ));
    }

    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| EstimatorError::ModelFit("singular design matrix".to_string()))?;
    let coeffs = &xtx_inv * x.transpose() * y;
    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(EstimatorError::ModelFit(
            "non-finite regression coefficients".to_string(),
        ));
    }

    let residuals = y - x * &coeffs;
    let df = rows - cols;
    let rss: f64 = residuals.iter().map(|r| r.powi(2)).sum();
    let sigma2 = if df > 0 { rss / df as f64 } else { 0.0 };

    Ok(OlsFit { coeffs, residuals, sigma2, xtx_inv, df })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_points(slope: f64, intercept: f64, xs: &[f64]) -> Vec<(f64, f64)> {
        xs.iter().map(|&x| (x, slope * x + intercept)).collect()
    }

    #[test]
    fn test_ols_recovers_exact_line() {
        let points = line_points(2.0, 3.0, &[0.5, 1.0, 1.5, 2.0]);
        let fit = fit_line(&points, FitMethod::Ols).unwrap();
        assert!((fit.slope - 2.0).abs() < 0.01, "slope was {}", fit.slope);
        assert!((fit.intercept - 3.0).abs() < 0.01);
        assert!((fit.r_squared.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_manual_recovers_exact_line() {
        let points = line_points(2.0, 3.0, &[0.5, 1.0, 1.5, 2.0]);
        let fit = fit_line(&points, FitMethod::Manual).unwrap();
        assert!((fit.slope - 2.0).abs() < 0.1);
        assert!((fit.intercept - 3.0).abs() < 0.1);
        assert!(fit.r_squared.is_none());
    }

    #[test]
    fn test_paths_agree_on_noisy_data() {
        let points = vec![
            (0.5, 15.2),
            (1.0, 28.5),
            (1.5, 42.1),
            (2.0, 55.8),
            (2.5, 70.3),
        ];
        let ols = fit_line(&points, FitMethod::Ols).unwrap();
        let manual = fit_line(&points, FitMethod::Manual).unwrap();
        assert!((ols.slope - manual.slope).abs() < 1e-6);
        assert!((ols.intercept - manual.intercept).abs() < 1e-6);
    }

    #[test]
    fn test_constant_x_rejected() {
        let points = vec![(1.0, 2.0), (1.0, 3.0), (1.0, 4.0)];
        assert!(fit_line(&points, FitMethod::Ols).is_err());
        assert!(fit_line(&points, FitMethod::Manual).is_err());
    }

    #[test]
    fn test_r_squared_below_one_for_scatter() {
        let points = vec![(1.0, 1.0), (2.0, 3.0), (3.0, 2.0), (4.0, 3.0), (5.0, 5.0)];
        let fit = fit_line(&points, FitMethod::Ols).unwrap();
        let r2 = fit.r_squared.unwrap();
        assert!(r2 > 0.0 && r2 < 1.0, "r2 was {r2}");
    }

    #[test]
    fn test_solve_ols_underdetermined_rejected() {
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0]);
        assert!(solve_ols(&x, &y).is_err());
    }
}
