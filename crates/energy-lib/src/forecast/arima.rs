//! ARIMA model fitting and forecasting
//!
//! Implements conditional-least-squares ARIMA(p,d,q) estimation via the
//! Hannan-Rissanen two-stage regression: a long autoregression first
//! approximates the innovation sequence, then AR and MA coefficients are
//! estimated jointly by ordinary least squares. Order selection minimizes
//! AIC over a small grid; candidates that fail to fit are skipped.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

use super::stationarity::is_stationary;
use super::{ForecastOutcome, ForecastStrategy};
use crate::error::EstimatorError;
use crate::models::{AccuracyMetrics, ConfidenceInterval, ForecastMethod};
use crate::regression::solve_ols;

/// 97.5% standard-normal quantile for the 95% forecast interval
const Z_95: f64 = 1.959_963_984_540_054;

/// Epsilon added to MAPE denominators
const MAPE_EPS: f64 = 1e-10;

/// Differenced series with sample variance below this cannot support
/// autoregressive or moving-average terms
const CONSTANT_VARIANCE_EPS: f64 = 1e-12;

/// Non-seasonal model order (p, d, q)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// Diagnostics retained from the most recent successful model fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArimaFitSummary {
    pub order: ArimaOrder,
    pub aic: f64,
    /// Residual variance of the fitted model
    pub sigma2: f64,
}

/// A fitted ARIMA model ready to forecast
#[derive(Debug, Clone)]
pub(crate) struct FittedArima {
    order: ArimaOrder,
    constant: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    /// Series after `d` rounds of differencing
    work: Vec<f64>,
    /// One-step residuals on the differenced scale, zero-padded burn-in
    residuals: Vec<f64>,
    sigma2: f64,
    aic: f64,
    /// Last observed value at each differencing level, in application order
    integrate_tail: Vec<f64>,
}

/// Forecast path with the variance of its final step
#[derive(Debug, Clone)]
pub(crate) struct ForecastPath {
    pub path: Vec<f64>,
    pub last_variance: f64,
}

impl FittedArima {
    /// Fit by conditional least squares. Fails on series too short for the
    /// order or on singular regression systems; callers treat a failure as
    /// "skip this candidate".
    pub(crate) fn fit(values: &[f64], order: ArimaOrder) -> Result<Self, EstimatorError> {
        let (work, integrate_tail) = difference(values, order.d);
        let n = work.len();
        let n_params = order.p + order.q + 1;
        if n < n_params + 2 {
            return Err(EstimatorError::ModelFit(format!(
                "series of {n} differenced points too short for order {order}"
            )));
        }

        let work_var = work.as_slice().variance();
        if work_var < CONSTANT_VARIANCE_EPS && (order.p > 0 || order.q > 0) {
            return Err(EstimatorError::ModelFit(format!(
                "constant series cannot identify order {order}"
            )));
        }

        let (constant, ar, ma) = if order.q == 0 {
            fit_pure_ar(&work, order.p)?
        } else {
            fit_hannan_rissanen(&work, order.p, order.q)?
        };

        // Conditional residual recursion over the full differenced series,
        // unavailable lags treated as zero
        let mut residuals = vec![0.0; n];
        for t in 0..n {
            let mut pred = constant;
            for (i, phi) in ar.iter().enumerate() {
                if t > i {
                    pred += phi * work[t - i - 1];
                }
            }
            for (j, theta) in ma.iter().enumerate() {
                if t > j {
                    pred += theta * residuals[t - j - 1];
                }
            }
            residuals[t] = work[t] - pred;
        }

        let burn = order.p.max(order.q);
        let n_eff = n - burn;
        if n_eff == 0 {
            return Err(EstimatorError::ModelFit(format!(
                "no usable residuals for order {order}"
            )));
        }
        let sigma2 =
            residuals[burn..].iter().map(|e| e.powi(2)).sum::<f64>() / n_eff as f64;
        let aic = n_eff as f64 * sigma2.max(f64::MIN_POSITIVE).ln() + 2.0 * n_params as f64;
        if !sigma2.is_finite() || !aic.is_finite() {
            return Err(EstimatorError::ModelFit(format!(
                "non-finite fit statistics for order {order}"
            )));
        }

        Ok(Self {
            order,
            constant,
            ar,
            ma,
            work,
            residuals,
            sigma2,
            aic,
            integrate_tail,
        })
    }

    pub(crate) fn aic(&self) -> f64 {
        self.aic
    }

    pub(crate) fn summary(&self) -> ArimaFitSummary {
        ArimaFitSummary { order: self.order, aic: self.aic, sigma2: self.sigma2 }
    }

    /// Forecast `horizon` steps ahead on the original scale
    pub(crate) fn forecast(&self, horizon: usize) -> ForecastPath {
        let n = self.work.len();
        let p = self.order.p;
        let q = self.order.q;

        // Recursive point forecasts on the differenced scale; future
        // innovations are zero
        let mut preds: Vec<f64> = Vec::with_capacity(horizon);
        for s in 0..horizon {
            let t = n + s;
            let mut v = self.constant;
            for (i, phi) in self.ar.iter().enumerate() {
                let idx = t - i - 1;
                v += phi * if idx < n { self.work[idx] } else { preds[idx - n] };
            }
            for (j, theta) in self.ma.iter().enumerate() {
                let idx = t - j - 1;
                if idx < n {
                    v += theta * self.residuals[idx];
                }
            }
            preds.push(v);
        }

        // Psi weights of the MA(inf) representation, cumulated once per
        // order of differencing to cover the integrated process
        let mut psi = vec![0.0; horizon.max(1)];
        psi[0] = 1.0;
        for j in 1..psi.len() {
            let mut w = if j <= q { self.ma[j - 1] } else { 0.0 };
            for i in 1..=p.min(j) {
                w += self.ar[i - 1] * psi[j - i];
            }
            psi[j] = w;
        }
        for _ in 0..self.order.d {
            for j in 1..psi.len() {
                psi[j] += psi[j - 1];
            }
        }
        let last_variance = self.sigma2 * psi.iter().map(|w| w.powi(2)).sum::<f64>();

        ForecastPath { path: integrate(preds, &self.integrate_tail), last_variance }
    }

    /// In-sample accuracy from the fitted residuals, aligned to the
    /// original-scale observations
    pub(crate) fn accuracy(&self, values: &[f64]) -> AccuracyMetrics {
        let burn = self.order.p.max(self.order.q);
        let d = self.order.d;
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        let mut pct_sum = 0.0;
        let mut count = 0usize;
        for t in burn..self.residuals.len() {
            let e = self.residuals[t];
            abs_sum += e.abs();
            sq_sum += e.powi(2);
            pct_sum += (e / (values[t + d] + MAPE_EPS)).abs();
            count += 1;
        }
        let count = count.max(1) as f64;
        AccuracyMetrics {
            mae: abs_sum / count,
            rmse: (sq_sum / count).sqrt(),
            mape: pct_sum / count * 100.0,
        }
    }
}

/// Grid-search (p, q) over {0,1,2} at the differencing order implied by the
/// stationarity classification, keeping the minimum-AIC candidate
pub(crate) fn select_order(values: &[f64], stationary: bool) -> Option<FittedArima> {
    let d = usize::from(!stationary);
    let mut best: Option<FittedArima> = None;
    for p in 0..=2 {
        for q in 0..=2 {
            let order = ArimaOrder::new(p, d, q);
            match FittedArima::fit(values, order) {
                Ok(fitted) => {
                    if best.as_ref().map_or(true, |b| fitted.aic() < b.aic()) {
                        best = Some(fitted);
                    }
                }
                Err(error) => {
                    debug!(%order, %error, "skipping order candidate");
                }
            }
        }
    }
    if let Some(fitted) = &best {
        info!(order = %fitted.order, aic = fitted.aic, "auto-selected model order");
    }
    best
}

/// Default order when auto-selection is disabled
pub(crate) fn default_order(stationary: bool) -> ArimaOrder {
    if stationary {
        ArimaOrder::new(1, 0, 1)
    } else {
        ArimaOrder::new(1, 1, 1)
    }
}

fn fit_pure_ar(work: &[f64], p: usize) -> Result<(f64, Vec<f64>, Vec<f64>), EstimatorError> {
    let n = work.len();
    if p == 0 {
        return Ok((work.mean(), Vec::new(), Vec::new()));
    }
    let rows = n - p;
    let x = DMatrix::from_fn(rows, p + 1, |r, c| {
        let t = r + p;
        if c == 0 {
            1.0
        } else {
            work[t - c]
        }
    });
    let y = DVector::from_iterator(rows, (p..n).map(|t| work[t]));
    let ols = solve_ols(&x, &y)?;
    let constant = ols.coeffs[0];
    let ar = (1..=p).map(|i| ols.coeffs[i]).collect();
    Ok((constant, ar, Vec::new()))
}

fn fit_hannan_rissanen(
    work: &[f64],
    p: usize,
    q: usize,
) -> Result<(f64, Vec<f64>, Vec<f64>), EstimatorError> {
    let n = work.len();

    // Stage 1: long autoregression approximates the innovations
    let m = p.max(q) + 1;
    if n < 2 * m + 3 {
        return Err(EstimatorError::ModelFit(format!(
            "series of {n} points too short for innovation stage (ar order {m})"
        )));
    }
    let (c0, phi0, _) = fit_pure_ar(work, m)?;
    let mut ehat = vec![0.0; n];
    for t in m..n {
        let mut pred = c0;
        for (i, phi) in phi0.iter().enumerate() {
            pred += phi * work[t - i - 1];
        }
        ehat[t] = work[t] - pred;
    }

    // Stage 2: joint regression on series lags and innovation lags
    let start = p.max(m + q);
    let rows = n - start;
    let cols = 1 + p + q;
    if rows < cols + 1 {
        return Err(EstimatorError::ModelFit(format!(
            "series of {n} points too short for joint stage ({rows} rows, {cols} columns)"
        )));
    }
    let x = DMatrix::from_fn(rows, cols, |r, c| {
        let t = r + start;
        if c == 0 {
            1.0
        } else if c <= p {
            work[t - c]
        } else {
            ehat[t - (c - p)]
        }
    });
    let y = DVector::from_iterator(rows, (start..n).map(|t| work[t]));
    let ols = solve_ols(&x, &y)?;

    let constant = ols.coeffs[0];
    let ar = (1..=p).map(|i| ols.coeffs[i]).collect();
    let ma = (1..=q).map(|j| ols.coeffs[p + j]).collect();
    Ok((constant, ar, ma))
}

/// Difference `values` `d` times, recording the last observation at each
/// level for later re-integration
fn difference(values: &[f64], d: usize) -> (Vec<f64>, Vec<f64>) {
    let mut work = values.to_vec();
    let mut tails = Vec::with_capacity(d);
    for _ in 0..d {
        tails.push(work.last().copied().unwrap_or(0.0));
        work = work.windows(2).map(|w| w[1] - w[0]).collect();
    }
    (work, tails)
}

fn integrate(mut path: Vec<f64>, tails: &[f64]) -> Vec<f64> {
    for tail in tails.iter().rev() {
        let mut acc = *tail;
        for v in path.iter_mut() {
            acc += *v;
            *v = acc;
        }
    }
    path
}

/// Advanced forecasting strategy: stationarity-aware ARIMA with AIC order
/// selection and a naive last-value fallback when fitting fails
#[derive(Debug)]
pub struct ArimaForecast {
    auto_select: bool,
}

impl ArimaForecast {
    pub fn new(auto_select: bool) -> Self {
        Self { auto_select }
    }
}

impl ForecastStrategy for ArimaForecast {
    fn name(&self) -> &'static str {
        "arima"
    }

    fn forecast(&self, values: &[f64], horizon: usize) -> ForecastOutcome {
        let horizon = horizon.max(1);
        let stationary = is_stationary(values);

        let fitted = if self.auto_select {
            select_order(values, stationary)
        } else {
            FittedArima::fit(values, default_order(stationary)).ok()
        };
        // Mirror of the grid-search seed: one more attempt at the
        // fully-general order before declaring the fit failed
        let fitted = fitted.or_else(|| FittedArima::fit(values, ArimaOrder::new(1, 1, 1)).ok());

        let fitted = match fitted {
            Some(f) => f,
            None => {
                warn!("model fitting failed, falling back to naive last-value forecast");
                let last = values.last().copied().unwrap_or(0.0);
                return ForecastOutcome {
                    predicted_cpu_cores: last,
                    confidence_interval: None,
                    accuracy: None,
                    method: ForecastMethod::NaiveLastValue,
                    fit: None,
                };
            }
        };

        let forecast = fitted.forecast(horizon);
        let mean = forecast.path.as_slice().mean();
        let last_step = forecast.path[forecast.path.len() - 1];
        let half_width = Z_95 * forecast.last_variance.max(0.0).sqrt();
        debug!(
            order = %fitted.order,
            mean,
            half_width,
            "forecast path computed"
        );

        ForecastOutcome {
            predicted_cpu_cores: mean,
            confidence_interval: Some(ConfidenceInterval {
                lower: last_step - half_width,
                upper: last_step + half_width,
            }),
            accuracy: Some(fitted.accuracy(values)),
            method: ForecastMethod::Arima,
            fit: Some(fitted.summary()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_series_exact_fit() {
        let values = vec![0.8; 90];
        let fitted = FittedArima::fit(&values, ArimaOrder::new(0, 0, 0)).unwrap();
        let forecast = fitted.forecast(30);
        assert_eq!(forecast.path.len(), 30);
        for v in &forecast.path {
            assert!((v - 0.8).abs() < 1e-9);
        }
        assert!(forecast.last_variance.abs() < 1e-12);
    }

    #[test]
    fn test_ar_candidates_rejected_on_constant_series() {
        let values = vec![0.8; 90];
        assert!(FittedArima::fit(&values, ArimaOrder::new(1, 0, 0)).is_err());
        assert!(FittedArima::fit(&values, ArimaOrder::new(0, 0, 1)).is_err());
    }

    #[test]
    fn test_select_order_prefers_constant_model_for_flat_series() {
        let values = vec![0.8; 90];
        let fitted = select_order(&values, true).unwrap();
        assert_eq!(fitted.summary().order, ArimaOrder::new(0, 0, 0));
    }

    #[test]
    fn test_linear_trend_forecast_continues_upward() {
        // y_t = 0.1 * t: differencing yields a constant drift of 0.1
        let values: Vec<f64> = (0..60).map(|t| 0.1 * t as f64).collect();
        let fitted = FittedArima::fit(&values, ArimaOrder::new(0, 1, 0)).unwrap();
        let forecast = fitted.forecast(10);
        let last_observed = values[values.len() - 1];
        assert!((forecast.path[0] - (last_observed + 0.1)).abs() < 1e-6);
        assert!((forecast.path[9] - (last_observed + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_ar1_coefficient_recovered() {
        // Deterministic AR(1) with phi = 0.6 and bounded pseudo-noise; the
        // decaying transient from the large initial level dominates the fit
        let mut y: f64 = 5.0;
        let mut values = Vec::with_capacity(200);
        for i in 0..200u32 {
            let noise = ((i.wrapping_mul(2_654_435_761) % 997) as f64 / 997.0 - 0.5) * 0.1;
            y = 0.6 * y + noise;
            values.push(y);
        }
        let fitted = FittedArima::fit(&values, ArimaOrder::new(1, 0, 0)).unwrap();
        assert!(
            (fitted.ar[0] - 0.6).abs() < 0.15,
            "ar coefficient was {}",
            fitted.ar[0]
        );
    }

    #[test]
    fn test_too_short_series_rejected() {
        let values = vec![0.5, 0.6];
        assert!(FittedArima::fit(&values, ArimaOrder::new(2, 0, 2)).is_err());
    }

    #[test]
    fn test_aic_penalizes_parameters_on_white_noise() {
        let values: Vec<f64> = (0..120u32)
            .map(|i| 0.5 + ((i.wrapping_mul(2_654_435_761) % 997) as f64 / 997.0 - 0.5) * 0.05)
            .collect();
        let simple = FittedArima::fit(&values, ArimaOrder::new(0, 0, 0)).unwrap();
        let complex = FittedArima::fit(&values, ArimaOrder::new(2, 0, 2)).unwrap();
        // The richer model cannot buy enough likelihood on noise to cover
        // its parameter penalty by a wide margin
        assert!(simple.aic() < complex.aic() + 10.0);
    }

    #[test]
    fn test_strategy_constant_workload() {
        let strategy = ArimaForecast::new(true);
        let outcome = strategy.forecast(&vec![0.8; 90], 30);
        assert!(outcome.predicted_cpu_cores >= 0.7 && outcome.predicted_cpu_cores <= 0.9);
        assert_eq!(outcome.method, ForecastMethod::Arima);
        assert!(outcome.confidence_interval.is_some());
        let accuracy = outcome.accuracy.unwrap();
        assert!(accuracy.mae < 1e-9);
        assert!(accuracy.rmse < 1e-9);
    }

    #[test]
    fn test_strategy_naive_fallback_on_unfittable_series() {
        let strategy = ArimaForecast::new(true);
        let outcome = strategy.forecast(&[1.0, 2.0, 3.0], 30);
        assert_eq!(outcome.method, ForecastMethod::NaiveLastValue);
        assert!((outcome.predicted_cpu_cores - 3.0).abs() < 1e-9);
        assert!(outcome.confidence_interval.is_none());
        assert!(outcome.accuracy.is_none());
        assert!(outcome.fit.is_none());
    }

    #[test]
    fn test_integration_round_trip() {
        let values = vec![1.0, 3.0, 6.0, 10.0, 15.0];
        let (work, tails) = difference(&values, 1);
        assert_eq!(work, vec![2.0, 3.0, 4.0, 5.0]);
        let restored = integrate(vec![6.0, 7.0], &tails);
        assert_eq!(restored, vec![21.0, 28.0]);
    }
}
