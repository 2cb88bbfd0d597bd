//! Named delay presets
//!
//! Callers pick a delay by interaction category instead of hard-coding
//! milliseconds. The table is process-wide and read-only: it can be
//! installed once at startup (usually from config), otherwise the built-in
//! defaults apply.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Delay used when a caller does not pick one
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Upper bound accepted for any configured delay (one minute)
pub const MAX_DELAY_MS: u64 = 60_000;

static INSTALLED: OnceLock<PresetTable> = OnceLock::new();

/// Interaction category a delay is tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayPreset {
    /// Search boxes
    Search,
    /// List filtering
    Filter,
    /// Generic text input and live form state
    Input,
    /// Live field validation
    Validation,
    /// Settings toggles
    Settings,
    /// Autosave of edited documents
    AutoSave,
    /// File-upload validation
    FileValidation,
    /// Viewport and layout resize
    Resize,
    /// Throttled network calls
    Network,
}

impl DelayPreset {
    /// Every preset, in table order
    pub const ALL: [DelayPreset; 9] = [
        DelayPreset::Search,
        DelayPreset::Filter,
        DelayPreset::Input,
        DelayPreset::Validation,
        DelayPreset::Settings,
        DelayPreset::AutoSave,
        DelayPreset::FileValidation,
        DelayPreset::Resize,
        DelayPreset::Network,
    ];

    /// Built-in delay for this preset
    pub const fn default_delay(self) -> Duration {
        let ms = match self {
            DelayPreset::Search => 300,
            DelayPreset::Filter => 250,
            DelayPreset::Input => 500,
            DelayPreset::Validation => 400,
            DelayPreset::Settings => 600,
            DelayPreset::AutoSave => 1000,
            DelayPreset::FileValidation => 800,
            DelayPreset::Resize => 150,
            DelayPreset::Network => 500,
        };
        Duration::from_millis(ms)
    }

    /// Delay from the process-wide table
    pub fn delay(self) -> Duration {
        table().get(self)
    }

    /// Snake-case name used in config keys and on the command line
    pub const fn name(self) -> &'static str {
        match self {
            DelayPreset::Search => "search",
            DelayPreset::Filter => "filter",
            DelayPreset::Input => "input",
            DelayPreset::Validation => "validation",
            DelayPreset::Settings => "settings",
            DelayPreset::AutoSave => "auto_save",
            DelayPreset::FileValidation => "file_validation",
            DelayPreset::Resize => "resize",
            DelayPreset::Network => "network",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DelayPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DelayPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        DelayPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

/// Delay for every preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetTable {
    delays: [Duration; DelayPreset::ALL.len()],
}

impl PresetTable {
    /// Table holding the built-in defaults
    pub const fn defaults() -> Self {
        let mut delays = [Duration::ZERO; DelayPreset::ALL.len()];
        let mut i = 0;
        while i < delays.len() {
            delays[i] = DelayPreset::ALL[i].default_delay();
            i += 1;
        }
        Self { delays }
    }

    /// Delay configured for `preset`
    pub fn get(&self, preset: DelayPreset) -> Duration {
        self.delays[preset.index()]
    }

    /// Override the delay for `preset`
    pub fn set(&mut self, preset: DelayPreset, delay: Duration) {
        self.delays[preset.index()] = delay;
    }

    /// Iterate `(preset, delay)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (DelayPreset, Duration)> + '_ {
        DelayPreset::ALL.into_iter().map(|preset| (preset, self.get(preset)))
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Install the process-wide preset table
///
/// May only succeed once; later calls return [`ConfigError::AlreadyInstalled`]
/// and leave the first table in place.
pub fn install(table: PresetTable) -> Result<(), ConfigError> {
    INSTALLED.set(table).map_err(|_| ConfigError::AlreadyInstalled)?;
    tracing::debug!("Installed delay preset table");
    Ok(())
}

/// The installed table, or the defaults if none was installed
pub fn table() -> PresetTable {
    INSTALLED.get().copied().unwrap_or_default()
}
