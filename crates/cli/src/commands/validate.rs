//! Calibration validation command

use anyhow::Result;

use energy_lib::{CalibrationConfig, CalibrationEngine, CalibrationSample};

use super::read_json;
use crate::output::{print_record, print_warning, FieldRow, OutputFormat};

/// Utilization error above which the calibration is called out as drifting
const UTIL_MAE_WARN_THRESHOLD: f64 = 10.0;

pub fn run(calibration: &str, samples: &str, format: OutputFormat) -> Result<()> {
    let config: CalibrationConfig = read_json(calibration)?;
    let samples: Vec<CalibrationSample> = read_json(samples)?;

    let engine = CalibrationEngine::new();
    let metrics = engine.validate_calibration(&config, &samples);

    let rows = vec![
        FieldRow::new("Utilization MAE", format!("{:.4}", metrics.utilization_mae)),
        FieldRow::new("Utilization RMSE", format!("{:.4}", metrics.utilization_rmse)),
        FieldRow::new("Power MAE", format!("{:.4} W", metrics.power_mae)),
        FieldRow::new("Power RMSE", format!("{:.4} W", metrics.power_rmse)),
    ];
    print_record(&metrics, rows, format);

    if metrics.utilization_mae > UTIL_MAE_WARN_THRESHOLD {
        print_warning("utilization error is high; consider recalibrating");
    }
    Ok(())
}
