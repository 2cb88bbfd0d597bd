//! Delay configuration
//!
//! A small TOML file overrides preset delays (milliseconds):
//!
//! ```toml
//! [delays]
//! search = 250
//! auto_save = 2000
//! ```
//!
//! Presets without an override keep their built-in delay.

use crate::error::ConfigError;
use crate::presets::{DelayPreset, PresetTable, MAX_DELAY_MS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "COALESCE_CONFIG";

/// Root of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoalesceConfig {
    /// Per-preset delay overrides in milliseconds
    pub delays: BTreeMap<DelayPreset, u64>,
}

impl CoalesceConfig {
    /// Check every override is within range
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (&preset, &ms) in &self.delays {
            if ms > MAX_DELAY_MS {
                return Err(ConfigError::OutOfRange {
                    key: key_for(preset),
                    value: ms,
                    max: MAX_DELAY_MS,
                });
            }
        }
        Ok(())
    }

    /// Built-in delays with this config's overrides applied
    pub fn preset_table(&self) -> PresetTable {
        let mut table = PresetTable::defaults();
        for (&preset, &ms) in &self.delays {
            table.set(preset, Duration::from_millis(ms));
        }
        table
    }

    /// Effective delay for a `delays.<preset>` key, in milliseconds
    pub fn get(&self, key: &str) -> Result<u64, ConfigError> {
        let preset = parse_key(key)?;
        Ok(self.preset_table().get(preset).as_millis() as u64)
    }

    /// Override the delay for a `delays.<preset>` key
    ///
    /// The value is not range-checked here; call [`CoalesceConfig::validate`]
    /// before saving.
    pub fn set(&mut self, key: &str, ms: u64) -> Result<(), ConfigError> {
        let preset = parse_key(key)?;
        self.delays.insert(preset, ms);
        Ok(())
    }
}

/// Config key for a preset (`delays.search`)
pub fn key_for(preset: DelayPreset) -> String {
    format!("delays.{}", preset)
}

fn parse_key(key: &str) -> Result<DelayPreset, ConfigError> {
    key.strip_prefix("delays.")
        .ok_or_else(|| ConfigError::UnknownPreset(key.to_string()))?
        .parse()
}

/// Default config file location (`<config dir>/coalesce/config.toml`)
pub fn default_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join("coalesce").join("config.toml"))
}

/// Load and validate the config at `path`
///
/// A missing file yields the default (empty) config.
pub fn load(path: &Path) -> Result<CoalesceConfig, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(CoalesceConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config: CoalesceConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Validate and write `config` to `path`
///
/// Writes a sibling temp file, fsyncs it, then renames it over the target.
pub fn save(path: &Path, config: &CoalesceConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let contents = toml::to_string_pretty(config)?;

    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    {
        let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
        file.write_all(contents.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(&tmp_path, path).map_err(io_err)?;

    tracing::debug!("Saved config to {}", path.display());
    Ok(())
}

/// Write an empty config at `path` unless one exists; returns whether it did
pub fn init_if_missing(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    save(path, &CoalesceConfig::default())?;
    Ok(true)
}

/// Commented example config listing every preset with its default
pub fn example_config() -> String {
    let mut out = String::from(
        "# coalesce delay configuration\n\
         # Values are milliseconds (0-60000). Omitted presets keep their default.\n\
         \n\
         [delays]\n",
    );
    for preset in DelayPreset::ALL {
        out.push_str(&format!(
            "# {} = {}\n",
            preset.name(),
            preset.default_delay().as_millis()
        ));
    }
    out
}
