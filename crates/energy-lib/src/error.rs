//! Error taxonomy for the prediction core

use thiserror::Error;

/// Errors surfaced by the forecasting, calibration, and prediction pipeline.
///
/// Only the insufficient-input variants propagate to callers as hard
/// failures; model-fitting problems are recovered internally by the
/// forecaster and show up as degraded diagnostic fields instead.
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// Historical series was constructed with mismatched vector lengths
    #[error("historical series length mismatch: {timestamps} timestamps vs {values} values")]
    SeriesLengthMismatch { timestamps: usize, values: usize },

    /// Not enough historical points to forecast
    #[error("Insufficient historical data: need at least 3 data points, got {got}")]
    InsufficientData { got: usize },

    /// Not enough measurement pairs to calibrate
    #[error("need at least 2 measurements for calibration, got {got}")]
    InsufficientMeasurements { got: usize },

    /// Internal model fitting failure (singular system, series too short
    /// for the requested order). Recovered by the naive fallback.
    #[error("model fitting failed: {0}")]
    ModelFit(String),

    /// A writer panicked while holding the calibration lock
    #[error("calibration lock poisoned")]
    LockPoisoned,
}
