//! Calibration of the linear prediction models
//!
//! Fits the two measured relationships the energy predictor relies on:
//! container CPU cores to node utilization increment, and node utilization
//! to node power draw. Idle and max power bounds come from the extremes of
//! the power measurements.

use tracing::info;

use crate::error::EstimatorError;
use crate::models::{CalibrationConfig, CalibrationSample, ValidationMetrics};
use crate::regression::{fit_line, FitMethod, LinearFit};

/// Minimum measurement pairs per fitted relationship
pub const MIN_MEASUREMENTS: usize = 2;

/// Fits calibration parameters from measurement pairs.
///
/// Stateless; the fit method is chosen once at construction, defaulting to
/// the OLS path with R² diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationEngine {
    method: FitMethod,
}

impl CalibrationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the closed-form manual fit instead of the OLS path
    pub fn with_method(method: FitMethod) -> Self {
        Self { method }
    }

    /// Fit container CPU cores -> node utilization increment (%)
    pub fn calibrate_container_to_node(
        &self,
        measurements: &[(f64, f64)],
    ) -> Result<LinearFit, EstimatorError> {
        let fit = self.fit_measurements(measurements)?;
        info!(
            slope = fit.slope,
            intercept = fit.intercept,
            r_squared = ?fit.r_squared,
            "container-to-node calibration"
        );
        Ok(fit)
    }

    /// Fit node utilization (%) -> node power (watts)
    pub fn calibrate_node_util_to_power(
        &self,
        measurements: &[(f64, f64)],
    ) -> Result<LinearFit, EstimatorError> {
        let fit = self.fit_measurements(measurements)?;
        info!(
            slope = fit.slope,
            intercept = fit.intercept,
            r_squared = ?fit.r_squared,
            "node-util-to-power calibration"
        );
        Ok(fit)
    }

    /// Run both fits and package a complete configuration. Idle and max
    /// power are taken from the extremes of the observed power values.
    pub fn calibrate_from_measurements(
        &self,
        container_node_data: &[(f64, f64)],
        node_power_data: &[(f64, f64)],
    ) -> Result<CalibrationConfig, EstimatorError> {
        let c2n = self.calibrate_container_to_node(container_node_data)?;
        let u2p = self.calibrate_node_util_to_power(node_power_data)?;

        let powers = node_power_data.iter().map(|(_, watts)| *watts);
        let idle_power = powers.clone().fold(f64::INFINITY, f64::min);
        let max_power = powers.fold(f64::NEG_INFINITY, f64::max);

        let config = CalibrationConfig {
            container_to_node_slope: c2n.slope,
            container_to_node_intercept: c2n.intercept,
            node_util_to_power_slope: u2p.slope,
            node_util_to_power_intercept: u2p.intercept,
            node_idle_power_watts: idle_power,
            node_max_power_watts: max_power,
        };
        info!(?config, "calibration complete");
        Ok(config)
    }

    /// Evaluate a configuration against held-out measurement triples
    pub fn validate_calibration(
        &self,
        config: &CalibrationConfig,
        test_measurements: &[CalibrationSample],
    ) -> ValidationMetrics {
        let mut util_abs = 0.0;
        let mut util_sq = 0.0;
        let mut power_abs = 0.0;
        let mut power_sq = 0.0;

        for sample in test_measurements {
            let predicted_util = config.container_to_node_slope * sample.container_cpu_cores
                + config.container_to_node_intercept;
            let predicted_power = config.node_util_to_power_slope * sample.actual_node_util
                + config.node_util_to_power_intercept;

            let util_error = (predicted_util - sample.actual_node_util).abs();
            let power_error = (predicted_power - sample.actual_power).abs();
            util_abs += util_error;
            util_sq += util_error.powi(2);
            power_abs += power_error;
            power_sq += power_error.powi(2);
        }

        let count = test_measurements.len().max(1) as f64;
        let metrics = ValidationMetrics {
            utilization_mae: util_abs / count,
            utilization_rmse: (util_sq / count).sqrt(),
            power_mae: power_abs / count,
            power_rmse: (power_sq / count).sqrt(),
        };
        info!(?metrics, "calibration validation");
        metrics
    }

    fn fit_measurements(&self, measurements: &[(f64, f64)]) -> Result<LinearFit, EstimatorError> {
        if measurements.len() < MIN_MEASUREMENTS {
            return Err(EstimatorError::InsufficientMeasurements { got: measurements.len() });
        }
        fit_line(measurements, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_measurements(slope: f64, intercept: f64, xs: &[f64]) -> Vec<(f64, f64)> {
        xs.iter().map(|&x| (x, slope * x + intercept)).collect()
    }

    #[test]
    fn test_calibrate_recovers_known_line() {
        let engine = CalibrationEngine::new();
        let data = line_measurements(2.0, 3.0, &[0.5, 1.0, 1.5, 2.0]);
        let fit = engine.calibrate_container_to_node(&data).unwrap();
        assert!((fit.slope - 2.0).abs() < 0.01);
        assert!((fit.intercept - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_manual_method_recovers_known_line() {
        let engine = CalibrationEngine::with_method(FitMethod::Manual);
        let data = line_measurements(2.0, 3.0, &[0.5, 1.0, 1.5, 2.0]);
        let fit = engine.calibrate_container_to_node(&data).unwrap();
        assert!((fit.slope - 2.0).abs() < 0.1);
        assert!((fit.intercept - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_single_measurement_rejected() {
        let engine = CalibrationEngine::new();
        let error = engine
            .calibrate_node_util_to_power(&[(10.0, 60.0)])
            .unwrap_err();
        assert!(error.to_string().contains("at least 2 measurements"));
    }

    #[test]
    fn test_realistic_container_measurements() {
        let engine = CalibrationEngine::new();
        let data = vec![(0.5, 15.2), (1.0, 28.5), (1.5, 42.1), (2.0, 55.8)];
        let fit = engine.calibrate_container_to_node(&data).unwrap();
        assert!(fit.slope > 0.0);
        assert!(fit.intercept >= 0.0);
    }

    #[test]
    fn test_full_calibration_sets_power_bounds() {
        let engine = CalibrationEngine::new();
        let container_data = vec![(0.5, 15.0), (1.0, 30.0), (1.5, 45.0), (2.0, 60.0)];
        let power_data = vec![(0.0, 54.0), (25.0, 70.0), (50.0, 87.0), (75.0, 105.0), (100.0, 122.0)];
        let config = engine
            .calibrate_from_measurements(&container_data, &power_data)
            .unwrap();
        assert!((config.node_idle_power_watts - 54.0).abs() < 1e-9);
        assert!((config.node_max_power_watts - 122.0).abs() < 1e-9);
        assert!(config.container_to_node_slope > 0.0);
        assert!(config.node_util_to_power_slope > 0.0);
    }

    #[test]
    fn test_validation_zero_error_on_exact_line() {
        let engine = CalibrationEngine::new();
        let config = CalibrationConfig {
            container_to_node_slope: 30.0,
            container_to_node_intercept: 0.0,
            node_util_to_power_slope: 0.7,
            node_util_to_power_intercept: 54.0,
            node_idle_power_watts: 54.0,
            node_max_power_watts: 124.0,
        };
        let samples: Vec<CalibrationSample> = [0.5, 1.0, 1.5]
            .iter()
            .map(|&cores| CalibrationSample {
                container_cpu_cores: cores,
                actual_node_util: 30.0 * cores,
                actual_power: 0.7 * (30.0 * cores) + 54.0,
            })
            .collect();
        let metrics = engine.validate_calibration(&config, &samples);
        assert!(metrics.utilization_mae.abs() < 1e-9);
        assert!(metrics.power_mae.abs() < 1e-9);
    }

    #[test]
    fn test_validation_metrics_non_negative() {
        let engine = CalibrationEngine::new();
        let config = CalibrationConfig::default();
        let samples = vec![
            CalibrationSample { container_cpu_cores: 0.5, actual_node_util: 20.0, actual_power: 70.0 },
            CalibrationSample { container_cpu_cores: 1.5, actual_node_util: 55.0, actual_power: 95.0 },
        ];
        let metrics = engine.validate_calibration(&config, &samples);
        assert!(metrics.utilization_mae >= 0.0);
        assert!(metrics.utilization_rmse >= 0.0);
        assert!(metrics.power_mae >= 0.0);
        assert!(metrics.power_rmse >= 0.0);
        assert!(metrics.utilization_rmse >= metrics.utilization_mae - 1e-12);
    }
}
