//! Calibration fitting command

use anyhow::{Context, Result};
use serde::Deserialize;

use energy_lib::CalibrationEngine;

use super::read_json;
use crate::output::{print_record, print_success, FieldRow, OutputFormat};

/// One container-cores/node-utilization measurement
#[derive(Debug, Deserialize)]
struct ContainerNodePoint {
    container_cpu_cores: f64,
    node_cpu_util_percent: f64,
}

/// One node-utilization/power measurement
#[derive(Debug, Deserialize)]
struct NodePowerPoint {
    node_cpu_util_percent: f64,
    node_power_watts: f64,
}

pub fn run(
    container_node: &str,
    node_power: &str,
    output: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let container_points: Vec<ContainerNodePoint> = read_json(container_node)?;
    let power_points: Vec<NodePowerPoint> = read_json(node_power)?;

    let container_pairs: Vec<(f64, f64)> = container_points
        .iter()
        .map(|p| (p.container_cpu_cores, p.node_cpu_util_percent))
        .collect();
    let power_pairs: Vec<(f64, f64)> = power_points
        .iter()
        .map(|p| (p.node_cpu_util_percent, p.node_power_watts))
        .collect();

    let engine = CalibrationEngine::new();
    let config = engine.calibrate_from_measurements(&container_pairs, &power_pairs)?;

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
        print_success(&format!("Calibration written to {}", path));
        return Ok(());
    }

    let rows = vec![
        FieldRow::new("Cores -> util slope", format!("{:.4}", config.container_to_node_slope)),
        FieldRow::new(
            "Cores -> util intercept",
            format!("{:.4}", config.container_to_node_intercept),
        ),
        FieldRow::new("Util -> power slope", format!("{:.4}", config.node_util_to_power_slope)),
        FieldRow::new(
            "Util -> power intercept",
            format!("{:.4}", config.node_util_to_power_intercept),
        ),
        FieldRow::new("Idle power", format!("{:.2} W", config.node_idle_power_watts)),
        FieldRow::new("Max power", format!("{:.2} W", config.node_max_power_watts)),
    ];
    print_record(&config, rows, format);
    Ok(())
}
