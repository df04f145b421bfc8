//! Power-to-cost conversion
//!
//! Turns a predicted power draw over a horizon into energy, electricity
//! cost, and carbon figures. The cooling factor accounts for facility
//! overhead on top of IT power and applies to cost only.

use serde::{Deserialize, Serialize};

use crate::models::EnergyPrediction;

/// Rates used to convert predicted energy into cost and carbon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Electricity price in currency units per kWh
    #[serde(default = "default_electricity_rate")]
    pub electricity_rate_per_kwh: f64,
    /// Facility overhead multiplier applied to cost
    #[serde(default = "default_cooling_factor")]
    pub cooling_factor: f64,
    /// Grid carbon intensity in kg CO2e per kWh
    #[serde(default = "default_carbon_rate")]
    pub carbon_rate_kg_per_kwh: f64,
}

fn default_electricity_rate() -> f64 {
    0.12
}

fn default_cooling_factor() -> f64 {
    1.3
}

fn default_carbon_rate() -> f64 {
    0.05
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            electricity_rate_per_kwh: default_electricity_rate(),
            cooling_factor: default_cooling_factor(),
            carbon_rate_kg_per_kwh: default_carbon_rate(),
        }
    }
}

/// Cost and carbon figures for one energy prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Energy consumed over the horizon
    pub energy_kwh: f64,
    /// Electricity cost including the cooling overhead
    pub electricity_cost: f64,
    /// Carbon emissions for the IT energy
    pub carbon_kg: f64,
}

impl CostModel {
    /// Convert a predicted power draw over its horizon into cost figures
    pub fn estimate(&self, prediction: &EnergyPrediction) -> CostEstimate {
        let hours = f64::from(prediction.prediction_horizon_minutes) / 60.0;
        let energy_kwh = prediction.predicted_power_watts * hours / 1000.0;
        CostEstimate {
            energy_kwh,
            electricity_cost: energy_kwh * self.cooling_factor * self.electricity_rate_per_kwh,
            carbon_kg: energy_kwh * self.carbon_rate_kg_per_kwh,
        }
    }
}
