//! CLI configuration defaults

use anyhow::Result;
use serde::Deserialize;

/// Defaults loadable from the environment (`CEP_` prefix)
#[derive(Debug, Clone, Deserialize)]
pub struct CliDefaults {
    /// Default prediction horizon when the request file omits it
    #[serde(default = "default_horizon_minutes")]
    pub horizon_minutes: u32,
}

fn default_horizon_minutes() -> u32 {
    30
}

impl CliDefaults {
    /// Load defaults from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CEP"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| CliDefaults {
            horizon_minutes: default_horizon_minutes(),
        }))
    }
}
