//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use coalesce_core::config::{self, CoalesceConfig};
use coalesce_core::presets;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolve the config file path from the --config flag or the default location
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => config::default_path().context("Could not determine config file path"),
    }
}

/// Load the config file, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> Result<CoalesceConfig> {
    config::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Load the config and install its preset table for this process
pub fn install_presets(path: &Path) -> Result<CoalesceConfig> {
    let config = load_config(path)?;
    presets::install(config.preset_table()).context("Failed to install delay presets")?;
    Ok(config)
}

/// Format a delay ("300ms", "1.5s")
pub fn format_delay(delay: Duration) -> String {
    let ms = delay.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}
