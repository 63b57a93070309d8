pub mod info;
pub mod merge;
pub mod upscale;

use std::path::PathBuf;

use anyhow::{Context, Result};

use lumen_core::pipeline::config::BurstConfig;

/// Load an engine configuration from a TOML file, or the defaults.
pub fn load_config(path: Option<&PathBuf>) -> Result<BurstConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: BurstConfig =
                toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))?;
            Ok(config)
        }
        None => Ok(BurstConfig::default()),
    }
}
