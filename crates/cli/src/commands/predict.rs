//! Energy prediction command

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use energy_lib::{
    ContainerId, ContainerShare, CostEstimate, CostModel, EnergyPrediction, EnergyPredictor,
    EnergyRequest, HistoricalData,
};

use super::read_json;
use crate::config::CliDefaults;
use crate::output::{
    format_cores, format_currency, format_watts, print_record, FieldRow, OutputFormat,
};

/// Maximum accepted prediction horizon in minutes
const MAX_HORIZON_MINUTES: u32 = 240;

/// Prediction request as supplied on disk
#[derive(Debug, Deserialize)]
struct PredictionRequestFile {
    container_name: String,
    pod_name: String,
    namespace: String,
    /// Historical CPU usage in cores, one sample per minute, oldest first
    historical_cpu_cores: Vec<f64>,
    container_cpu_request: f64,
    node_current_util: f64,
    node_idle_util: f64,
    #[serde(default)]
    containers_on_node: Vec<ContainerShare>,
    prediction_horizon_minutes: Option<u32>,
}

/// Combined command output
#[derive(Debug, Serialize)]
struct PredictionOutput {
    prediction: EnergyPrediction,
    #[serde(skip_serializing_if = "Option::is_none")]
    cost: Option<CostEstimate>,
}

pub fn run(
    input: &str,
    calibration: Option<&str>,
    no_cost: bool,
    defaults: &CliDefaults,
    format: OutputFormat,
) -> Result<()> {
    let file: PredictionRequestFile = read_json(input)?;
    let horizon = file
        .prediction_horizon_minutes
        .unwrap_or(defaults.horizon_minutes);
    validate_request(&file, horizon)?;

    let config = match calibration {
        Some(path) => read_json(path)?,
        None => energy_lib::CalibrationConfig::default(),
    };

    let request = EnergyRequest {
        container: ContainerId::new(
            file.container_name.clone(),
            file.pod_name.clone(),
            file.namespace.clone(),
        ),
        historical_workload: synthesize_series(&file.historical_cpu_cores)?,
        container_cpu_request: file.container_cpu_request,
        node_current_util: file.node_current_util,
        node_idle_util: file.node_idle_util,
        containers_on_node: file.containers_on_node,
        prediction_horizon_minutes: horizon,
    };

    let predictor = EnergyPredictor::new(config);
    let prediction = predictor.predict_container_energy(&request)?;
    let cost = (!no_cost).then(|| CostModel::default().estimate(&prediction));

    let mut rows = vec![
        FieldRow::new("Container", prediction.container_name.clone()),
        FieldRow::new("Pod", prediction.pod_name.clone()),
        FieldRow::new("Namespace", prediction.namespace.clone()),
        FieldRow::new("Predicted power", format_watts(prediction.predicted_power_watts)),
        FieldRow::new("Horizon", format!("{} min", prediction.prediction_horizon_minutes)),
    ];
    if let Some(interval) = &prediction.confidence_interval {
        rows.push(FieldRow::new(
            "Confidence interval",
            format!("[{}, {}]", format_cores(interval.lower), format_cores(interval.upper)),
        ));
    }
    if let Some(estimate) = &cost {
        rows.push(FieldRow::new("Energy", format!("{:.4} kWh", estimate.energy_kwh)));
        rows.push(FieldRow::new("Electricity cost", format_currency(estimate.electricity_cost)));
        rows.push(FieldRow::new("Carbon", format!("{:.4} kg CO2e", estimate.carbon_kg)));
    }

    let output = PredictionOutput { prediction, cost };
    print_record(&output, rows, format);
    Ok(())
}

/// Boundary validation the serving layer would normally perform
fn validate_request(file: &PredictionRequestFile, horizon: u32) -> Result<()> {
    if file.historical_cpu_cores.iter().any(|v| *v < 0.0) {
        bail!("CPU cores cannot be negative");
    }
    if file.container_cpu_request <= 0.0 {
        bail!("container_cpu_request must be positive");
    }
    if !(0.0..=100.0).contains(&file.node_current_util)
        || !(0.0..=100.0).contains(&file.node_idle_util)
    {
        bail!("node utilization must be between 0 and 100");
    }
    if file.node_idle_util > file.node_current_util {
        bail!("Idle utilization cannot exceed current utilization");
    }
    if horizon == 0 || horizon > MAX_HORIZON_MINUTES {
        bail!("prediction horizon must be between 1 and {MAX_HORIZON_MINUTES} minutes");
    }
    for share in &file.containers_on_node {
        if share.cpu_request <= 0.0 {
            bail!("cpu_request must be positive for containers on the node");
        }
        if !(0.0..=1.0).contains(&share.cpu_util) {
            bail!("cpu_util must be a fraction between 0 and 1");
        }
    }
    Ok(())
}

/// Build the historical series from bare values, one minute apart and
/// ending now
fn synthesize_series(values: &[f64]) -> Result<HistoricalData> {
    let now = Utc::now();
    let timestamps: Vec<DateTime<Utc>> = (0..values.len())
        .map(|i| now - Duration::minutes((values.len() - 1 - i) as i64))
        .collect();
    Ok(HistoricalData::new(timestamps, values.to_vec(), "cpu_cores")?)
}
