//! Configuration management command
//!
//! Provides CLI interface to view and edit delay configuration.

use crate::util;
use anyhow::{Context, Result};
use coalesce_core::config;
use coalesce_core::presets::MAX_DELAY_MS;
use coalesce_core::DelayPreset;
use owo_colors::OwoColorize;
use std::path::Path;

/// List all configuration values
pub async fn run_list(config_path: &Path) -> Result<()> {
    let config = util::load_config(config_path)?;
    let table = config.preset_table();

    println!("{}", "Delay Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[delays]".yellow());
    for preset in DelayPreset::ALL {
        let ms = table.get(preset).as_millis();
        if config.delays.contains_key(&preset) {
            println!("  {} = {}", preset.name().cyan(), ms);
        } else {
            println!(
                "  {} = {} {}",
                preset.name().cyan(),
                ms,
                "(default)".dimmed()
            );
        }
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  delays.*: 0-{} (milliseconds)", MAX_DELAY_MS);

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(config_path: &Path, key: &str) -> Result<()> {
    let config = util::load_config(config_path)?;

    let value = config.get(key).with_context(|| {
        format!("Unknown config key: {}. Use 'coalesce config --list' to see available keys.", key)
    })?;

    println!("{}", value);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(config_path: &Path, key: &str, value: &str) -> Result<()> {
    let mut config = util::load_config(config_path)?;

    let ms: u64 = value
        .trim()
        .parse()
        .context("Invalid value: must be a non-negative integer (milliseconds)")?;

    config.set(key, ms).with_context(|| {
        format!("Unknown config key: {}. Use 'coalesce config --list' to see available keys.", key)
    })?;

    // Validate before saving
    config.validate().context("Invalid configuration value")?;

    config::save(config_path, &config)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("{} {} = {}", "✓".green(), key.cyan(), ms);
    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(config_path: &Path, create: bool) -> Result<()> {
    if create && config::init_if_missing(config_path)? {
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else {
        println!("{}", config_path.display());
        if !config_path.exists() {
            println!("{}", "File does not exist. Use --create to create it.".yellow());
        }
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}
