//! Container energy prediction pipeline
//!
//! Four stages: forecast the container workload, map it onto node CPU
//! utilization, map utilization onto node power, then distribute the node
//! power back to the target container. Idle power splits by CPU-request
//! share; active power splits by request-weighted utilization, so an idle
//! container is never charged for an active neighbor's draw.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EstimatorError;
use crate::forecast::WorkloadForecaster;
use crate::models::{
    CalibrationConfig, ContainerId, ContainerShare, EnergyPrediction, HistoricalData,
};

/// Inputs for one container energy prediction, validated at the boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyRequest {
    pub container: ContainerId,
    /// Historical CPU usage in cores
    pub historical_workload: HistoricalData,
    /// Target container CPU request in cores
    pub container_cpu_request: f64,
    /// Current node CPU utilization (0-100%)
    pub node_current_util: f64,
    /// Node idle CPU utilization (0-100%)
    pub node_idle_util: f64,
    /// Other containers on the same node; the target is appended internally
    pub containers_on_node: Vec<ContainerShare>,
    pub prediction_horizon_minutes: u32,
}

/// Predicts per-container power draw from calibrated linear models.
///
/// Owns one calibration configuration, replaceable wholesale while
/// predictions are in flight; in-flight calls keep the snapshot they read.
pub struct EnergyPredictor {
    config: RwLock<CalibrationConfig>,
    forecaster: WorkloadForecaster,
}

impl EnergyPredictor {
    pub fn new(config: CalibrationConfig) -> Self {
        Self::with_forecaster(config, WorkloadForecaster::default())
    }

    pub fn with_forecaster(config: CalibrationConfig, forecaster: WorkloadForecaster) -> Self {
        Self { config: RwLock::new(config), forecaster }
    }

    /// Predict the target container's power draw over the request horizon
    pub fn predict_container_energy(
        &self,
        request: &EnergyRequest,
    ) -> Result<EnergyPrediction, EstimatorError> {
        let config = self.calibration()?;

        // Stage 1: container workload forecast
        let workload = self.forecaster.predict(
            &request.historical_workload,
            request.prediction_horizon_minutes,
            &request.container,
        )?;
        debug!(
            container = %request.container.container_name,
            predicted_cpu_cores = workload.predicted_cpu_cores,
            "stage 1: workload forecast"
        );

        // Stage 2: node utilization mapping
        let node_util = predict_node_utilization(
            &config,
            workload.predicted_cpu_cores,
            request.node_current_util,
            request.node_idle_util,
        );
        debug!(node_util, "stage 2: node utilization");

        // Stage 3: node power mapping
        let node_power = predict_node_power(&config, node_util);
        debug!(node_power, "stage 3: node power");

        // Stage 4: proportional distribution
        let target_util = if request.container_cpu_request > 0.0 {
            workload.predicted_cpu_cores / request.container_cpu_request
        } else {
            0.0
        };
        let container_power = distribute_power(
            &config,
            node_power,
            request.container_cpu_request,
            target_util,
            &request.containers_on_node,
        );
        debug!(container_power, "stage 4: container power");

        Ok(EnergyPrediction {
            container_name: workload.container_name,
            pod_name: workload.pod_name,
            namespace: workload.namespace,
            predicted_power_watts: container_power,
            prediction_timestamp: workload.prediction_timestamp,
            prediction_horizon_minutes: request.prediction_horizon_minutes,
            confidence_interval: workload.confidence_interval,
        })
    }

    /// Replace the calibration for all subsequent predictions
    pub fn update_calibration(&self, config: CalibrationConfig) -> Result<(), EstimatorError> {
        let mut slot = self.config.write().map_err(|_| EstimatorError::LockPoisoned)?;
        *slot = config;
        debug!(
            c2n_slope = config.container_to_node_slope,
            u2p_slope = config.node_util_to_power_slope,
            "calibration updated"
        );
        Ok(())
    }

    /// Snapshot of the current calibration
    pub fn calibration(&self) -> Result<CalibrationConfig, EstimatorError> {
        self.config
            .read()
            .map(|config| *config)
            .map_err(|_| EstimatorError::LockPoisoned)
    }

    /// Diagnostics from the forecaster's most recent fit
    pub fn last_forecast_fit(&self) -> Option<crate::forecast::ArimaFitSummary> {
        self.forecaster.last_fit()
    }
}

impl Default for EnergyPredictor {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

/// Stage 2: map predicted container cores onto node CPU utilization.
///
/// The linear model yields this container's marginal utilization increment;
/// adding `(current - idle)` re-baselines it onto the node's present load.
/// Clamped to [0, 100] against calibration extrapolation.
fn predict_node_utilization(
    config: &CalibrationConfig,
    predicted_cores: f64,
    node_current_util: f64,
    node_idle_util: f64,
) -> f64 {
    let increment =
        config.container_to_node_slope * predicted_cores + config.container_to_node_intercept;
    (increment + (node_current_util - node_idle_util)).clamp(0.0, 100.0)
}

/// Stage 3: map node utilization onto node power, clamped to the
/// calibrated idle/max envelope
fn predict_node_power(config: &CalibrationConfig, node_util: f64) -> f64 {
    (config.node_util_to_power_slope * node_util + config.node_util_to_power_intercept)
        .clamp(config.node_idle_power_watts, config.node_max_power_watts)
}

/// Stage 4: attribute node power to the target container.
///
/// Idle power is split by CPU-request share regardless of usage; active
/// power is split by request-weighted utilization. Degenerate totals fall
/// back to the idle attribution rather than erroring.
fn distribute_power(
    config: &CalibrationConfig,
    node_power: f64,
    target_cpu_request: f64,
    target_cpu_util: f64,
    containers_on_node: &[ContainerShare],
) -> f64 {
    let node_idle_power = config.node_idle_power_watts;
    let target = ContainerShare { cpu_request: target_cpu_request, cpu_util: target_cpu_util };

    let total_cpu_requests: f64 = containers_on_node
        .iter()
        .chain(std::iter::once(&target))
        .map(|c| c.cpu_request)
        .sum();
    if total_cpu_requests == 0.0 {
        warn!("total CPU requests is zero, returning idle power");
        return node_idle_power;
    }

    let container_idle_power = node_idle_power * (target.cpu_request / total_cpu_requests);

    let total_weighted_util: f64 = containers_on_node
        .iter()
        .chain(std::iter::once(&target))
        .map(|c| c.cpu_request * c.cpu_util)
        .sum();
    if total_weighted_util == 0.0 {
        warn!("total weighted utilization is zero, no active power to attribute");
        return container_idle_power;
    }

    let node_active_power = node_power - node_idle_power;
    let container_active_power =
        node_active_power * (target.cpu_request * target.cpu_util / total_weighted_util);

    container_idle_power + container_active_power
}
