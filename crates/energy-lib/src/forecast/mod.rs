//! Workload forecasting
//!
//! Predicts future container CPU usage from a historical series. The
//! forecasting implementation is chosen once at construction: the full
//! time-series model when the advanced capability is enabled, a simple
//! moving average otherwise. Model-fitting failures inside the advanced
//! path degrade to a naive last-value forecast rather than erroring.

mod arima;
mod stationarity;

pub use arima::{ArimaFitSummary, ArimaForecast, ArimaOrder};

use std::sync::RwLock;

use chrono::Utc;
use statrs::statistics::Statistics;
use tracing::{debug, warn};

use crate::error::EstimatorError;
use crate::models::{
    AccuracyMetrics, ConfidenceInterval, ContainerId, ForecastMethod, HistoricalData,
    WorkloadPrediction,
};

/// Minimum history length required for any forecast
pub const MIN_HISTORY_POINTS: usize = 3;

/// Window of the moving-average fallback
pub const MOVING_AVERAGE_WINDOW: usize = 3;

/// Raw result of a forecasting strategy, before identifiers and timestamps
/// are attached
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub predicted_cpu_cores: f64,
    pub confidence_interval: Option<ConfidenceInterval>,
    pub accuracy: Option<AccuracyMetrics>,
    pub method: ForecastMethod,
    /// Fit diagnostics, present only for the advanced path
    pub fit: Option<ArimaFitSummary>,
}

/// Trait for forecasting implementations
pub trait ForecastStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Forecast `horizon` one-minute steps ahead of `values`
    fn forecast(&self, values: &[f64], horizon: usize) -> ForecastOutcome;
}

/// Moving-average fallback used when advanced forecasting is unavailable
#[derive(Debug, Default)]
pub struct MovingAverageForecast;

impl ForecastStrategy for MovingAverageForecast {
    fn name(&self) -> &'static str {
        "simple_moving_average"
    }

    fn forecast(&self, values: &[f64], _horizon: usize) -> ForecastOutcome {
        let window = values.len().min(MOVING_AVERAGE_WINDOW);
        let predicted = values[values.len() - window..].mean();
        debug!(predicted, "moving-average forecast");
        ForecastOutcome {
            predicted_cpu_cores: predicted,
            confidence_interval: None,
            accuracy: None,
            method: ForecastMethod::SimpleMovingAverage,
            fit: None,
        }
    }
}

/// Options governing forecaster construction
#[derive(Debug, Clone, Copy)]
pub struct ForecastOptions {
    /// Grid-search the model order by AIC instead of using the fixed default
    pub auto_select: bool,
    /// Enable the advanced time-series path; when false the forecaster
    /// degrades to the moving-average fallback
    pub use_arima: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self { auto_select: true, use_arima: true }
    }
}

/// Container workload forecaster.
///
/// Stateless per call except for the retained diagnostics of the most
/// recent fit, which concurrent callers may overwrite freely
/// (last-writer-wins, single reference swap).
pub struct WorkloadForecaster {
    strategy: Box<dyn ForecastStrategy>,
    last_fit: RwLock<Option<ArimaFitSummary>>,
}

impl WorkloadForecaster {
    pub fn new(options: ForecastOptions) -> Self {
        let strategy: Box<dyn ForecastStrategy> = if options.use_arima {
            Box::new(ArimaForecast::new(options.auto_select))
        } else {
            warn!("advanced forecasting disabled, degrading to moving-average fallback");
            Box::new(MovingAverageForecast)
        };
        Self { strategy, last_fit: RwLock::new(None) }
    }

    /// Use a caller-provided forecasting strategy
    pub fn with_strategy(strategy: Box<dyn ForecastStrategy>) -> Self {
        Self { strategy, last_fit: RwLock::new(None) }
    }

    /// Predict mean CPU usage in cores over the next `horizon_minutes`.
    ///
    /// Fails only when the history is shorter than [`MIN_HISTORY_POINTS`];
    /// every other problem degrades the prediction instead.
    pub fn predict(
        &self,
        historical: &HistoricalData,
        horizon_minutes: u32,
        id: &ContainerId,
    ) -> Result<WorkloadPrediction, EstimatorError> {
        if historical.len() < MIN_HISTORY_POINTS {
            return Err(EstimatorError::InsufficientData { got: historical.len() });
        }

        let outcome = self
            .strategy
            .forecast(historical.values(), horizon_minutes as usize);
        debug!(
            strategy = self.strategy.name(),
            container = %id.container_name,
            predicted_cpu_cores = outcome.predicted_cpu_cores,
            method = ?outcome.method,
            "workload forecast"
        );

        // Diagnostics only; a poisoned slot is not worth failing the call
        if let Ok(mut slot) = self.last_fit.write() {
            *slot = outcome.fit;
        }

        Ok(WorkloadPrediction {
            container_name: id.container_name.clone(),
            pod_name: id.pod_name.clone(),
            namespace: id.namespace.clone(),
            predicted_cpu_cores: outcome.predicted_cpu_cores,
            prediction_timestamp: Utc::now(),
            confidence_interval: outcome.confidence_interval,
            accuracy: outcome.accuracy,
            method: outcome.method,
        })
    }

    /// Diagnostics of the most recent advanced fit, if any
    pub fn last_fit(&self) -> Option<ArimaFitSummary> {
        self.last_fit.read().ok().and_then(|slot| *slot)
    }
}

impl Default for WorkloadForecaster {
    fn default() -> Self {
        Self::new(ForecastOptions::default())
    }
}
