//! Container Energy Predictor CLI
//!
//! A command-line tool for running container energy predictions,
//! fitting calibrations from measurement files, and validating
//! calibrations against held-out data.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{calibrate, predict, validate};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Container Energy Predictor CLI
#[derive(Parser)]
#[command(name = "cep")]
#[command(author, version, about = "CLI for the Container Energy Predictor", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict a container's power draw from a request file
    Predict {
        /// Path to the prediction request JSON file
        #[arg(long, short)]
        input: String,

        /// Path to a calibration config JSON file (defaults to the
        /// reference hardware profile)
        #[arg(long, short, env = "CEP_CALIBRATION")]
        calibration: Option<String>,

        /// Skip the cost/carbon conversion in the output
        #[arg(long)]
        no_cost: bool,
    },

    /// Fit a calibration config from measurement files
    Calibrate {
        /// Path to container-to-node measurement JSON file
        #[arg(long)]
        container_node: String,

        /// Path to node-utilization-to-power measurement JSON file
        #[arg(long)]
        node_power: String,

        /// Write the fitted config to this path instead of stdout
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Validate a calibration config against held-out samples
    Validate {
        /// Path to the calibration config JSON file
        #[arg(long, short)]
        calibration: String,

        /// Path to the validation samples JSON file
        #[arg(long, short)]
        samples: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(fmt::layer().with_target(false))
        .init();

    let defaults = config::CliDefaults::load()?;

    match cli.command {
        Commands::Predict { input, calibration, no_cost } => {
            predict::run(&input, calibration.as_deref(), no_cost, &defaults, cli.format)
        }
        Commands::Calibrate { container_node, node_power, output } => {
            calibrate::run(&container_node, &node_power, output.as_deref(), cli.format)
        }
        Commands::Validate { calibration, samples } => {
            validate::run(&calibration, &samples, cli.format)
        }
    }
}
