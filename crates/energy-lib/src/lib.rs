//! Core library for container energy prediction
//!
//! This crate provides the prediction pipeline for estimating a
//! container's future power draw from historical CPU usage:
//! - Time-series workload forecasting with a moving-average fallback
//! - Calibration of the linear container/node/power relationships
//! - The four-stage energy prediction pipeline with proportional
//!   power distribution
//! - Power-to-cost conversion

pub mod calibration;
pub mod cost;
pub mod energy;
pub mod error;
pub mod forecast;
pub mod models;
pub mod regression;

pub use calibration::{CalibrationEngine, MIN_MEASUREMENTS};
pub use cost::{CostEstimate, CostModel};
pub use energy::{EnergyPredictor, EnergyRequest};
pub use error::EstimatorError;
pub use forecast::{
    ArimaFitSummary, ForecastOptions, ForecastStrategy, WorkloadForecaster, MIN_HISTORY_POINTS,
};
pub use models::*;
pub use regression::{FitMethod, LinearFit};
