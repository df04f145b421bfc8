//! Core data models for the energy prediction pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EstimatorError;

/// Identifier triple for the container whose power draw is being estimated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerId {
    pub container_name: String,
    pub pod_name: String,
    pub namespace: String,
}

impl ContainerId {
    pub fn new(
        container_name: impl Into<String>,
        pod_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            container_name: container_name.into(),
            pod_name: pod_name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Historical workload time series sourced from the monitoring backend.
///
/// Timestamps and values are index-aligned and expected in chronological
/// order. The series is immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHistoricalData")]
pub struct HistoricalData {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    metric_name: String,
}

/// Unvalidated wire form of [`HistoricalData`]
#[derive(Debug, Deserialize)]
struct RawHistoricalData {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    metric_name: String,
}

impl TryFrom<RawHistoricalData> for HistoricalData {
    type Error = EstimatorError;

    fn try_from(raw: RawHistoricalData) -> Result<Self, Self::Error> {
        Self::new(raw.timestamps, raw.values, raw.metric_name)
    }
}

impl HistoricalData {
    /// Build a series, enforcing that timestamps and values are index-aligned
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
        metric_name: impl Into<String>,
    ) -> Result<Self, EstimatorError> {
        if timestamps.len() != values.len() {
            return Err(EstimatorError::SeriesLengthMismatch {
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }
        Ok(Self { timestamps, values, metric_name: metric_name.into() })
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Calibration parameters for the linear prediction models.
///
/// Defaults describe the reference hardware profile the models were first
/// fitted against. Replaced wholesale via `EnergyPredictor::update_calibration`,
/// never field by field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Linear slope for container cores to node utilization increment (%)
    #[serde(default = "default_c2n_slope")]
    pub container_to_node_slope: f64,
    /// Linear intercept for container cores to node utilization increment (%)
    #[serde(default = "default_c2n_intercept")]
    pub container_to_node_intercept: f64,
    /// Linear slope for node utilization (%) to power (watts)
    #[serde(default = "default_u2p_slope")]
    pub node_util_to_power_slope: f64,
    /// Linear intercept for node utilization (%) to power (watts)
    #[serde(default = "default_u2p_intercept")]
    pub node_util_to_power_intercept: f64,
    /// Node power draw at zero CPU load (watts)
    #[serde(default = "default_idle_power")]
    pub node_idle_power_watts: f64,
    /// Node power draw at full CPU load (watts)
    #[serde(default = "default_max_power")]
    pub node_max_power_watts: f64,
}

fn default_c2n_slope() -> f64 {
    23.993
}

fn default_c2n_intercept() -> f64 {
    4.5347
}

fn default_u2p_slope() -> f64 {
    0.7254
}

fn default_u2p_intercept() -> f64 {
    53.88
}

fn default_idle_power() -> f64 {
    53.88
}

fn default_max_power() -> f64 {
    126.34
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            container_to_node_slope: default_c2n_slope(),
            container_to_node_intercept: default_c2n_intercept(),
            node_util_to_power_slope: default_u2p_slope(),
            node_util_to_power_intercept: default_u2p_intercept(),
            node_idle_power_watts: default_idle_power(),
            node_max_power_watts: default_max_power(),
        }
    }
}

/// Which forecasting path produced a workload prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Full time-series model fit
    Arima,
    /// Mean of the last observations (advanced forecasting unavailable)
    SimpleMovingAverage,
    /// Last observed value repeated (model fitting failed)
    NaiveLastValue,
}

/// Lower/upper bound of a 95% forecast interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// In-sample accuracy of a fitted forecast model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean absolute error of the fitted residuals
    pub mae: f64,
    /// Root mean squared error of the fitted residuals
    pub rmse: f64,
    /// Mean absolute percentage error (%)
    pub mape: f64,
}

/// Predicted workload for a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadPrediction {
    pub container_name: String,
    pub pod_name: String,
    pub namespace: String,
    /// Predicted CPU usage in cores, averaged over the horizon
    pub predicted_cpu_cores: f64,
    pub prediction_timestamp: DateTime<Utc>,
    /// Absent when the prediction came from a degraded path
    pub confidence_interval: Option<ConfidenceInterval>,
    /// Absent when the prediction came from a degraded path
    pub accuracy: Option<AccuracyMetrics>,
    pub method: ForecastMethod,
}

/// Predicted energy consumption for a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyPrediction {
    pub container_name: String,
    pub pod_name: String,
    pub namespace: String,
    /// Predicted power consumption in watts
    pub predicted_power_watts: f64,
    pub prediction_timestamp: DateTime<Utc>,
    pub prediction_horizon_minutes: u32,
    /// Propagated from the workload stage
    pub confidence_interval: Option<ConfidenceInterval>,
}

/// Per-container record used by power distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerShare {
    /// Reserved CPU capacity in cores
    pub cpu_request: f64,
    /// Utilization of the reservation as a 0-1 fraction
    pub cpu_util: f64,
}

/// Single validation triple for a fitted calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub container_cpu_cores: f64,
    pub actual_node_util: f64,
    pub actual_power: f64,
}

/// Aggregate error of a calibration against held-out measurements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub utilization_mae: f64,
    pub utilization_rmse: f64,
    pub power_mae: f64,
    pub power_rmse: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_timestamps(count: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        (0..count)
            .map(|i| start + chrono::Duration::minutes(i as i64))
            .collect()
    }

    #[test]
    fn test_historical_data_alignment_enforced() {
        let result = HistoricalData::new(make_timestamps(3), vec![0.5, 0.6], "cpu_cores");
        assert!(matches!(
            result,
            Err(EstimatorError::SeriesLengthMismatch { timestamps: 3, values: 2 })
        ));
    }

    #[test]
    fn test_historical_data_accessors() {
        let data =
            HistoricalData::new(make_timestamps(3), vec![0.5, 0.6, 0.7], "cpu_cores").unwrap();
        assert_eq!(data.len(), 3);
        assert!(!data.is_empty());
        assert_eq!(data.values(), &[0.5, 0.6, 0.7]);
        assert_eq!(data.metric_name(), "cpu_cores");
    }

    #[test]
    fn test_historical_data_deserialization_rejects_mismatch() {
        let json = r#"{
            "timestamps": ["2024-03-01T12:00:00Z", "2024-03-01T12:01:00Z"],
            "values": [0.5],
            "metric_name": "cpu_cores"
        }"#;
        let result: Result<HistoricalData, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_calibration_config_defaults() {
        let config = CalibrationConfig::default();
        assert!(config.node_max_power_watts > config.node_idle_power_watts);
        assert!((config.container_to_node_slope - 23.993).abs() < 1e-9);
        assert!((config.node_util_to_power_intercept - 53.88).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_config_partial_json() {
        let config: CalibrationConfig =
            serde_json::from_str(r#"{"container_to_node_slope": 20.0}"#).unwrap();
        assert!((config.container_to_node_slope - 20.0).abs() < 1e-9);
        assert!((config.node_idle_power_watts - 53.88).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_method_serialization() {
        let json = serde_json::to_string(&ForecastMethod::SimpleMovingAverage).unwrap();
        assert_eq!(json, r#""simple_moving_average""#);
    }
}
