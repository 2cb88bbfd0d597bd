//! Call-coalescing primitives
//!
//! This crate provides:
//! - A coalescing scheduler (`Debouncer`) with cancel/flush and an observable
//!   `pending` flag
//! - A value binder (`DebouncedValue`) whose reads are immediate and whose
//!   change callback is debounced
//! - A debounced async call wrapper (`DebouncedTask`) tracking `loading` and
//!   `error` across the in-flight call
//! - Named delay presets and their TOML configuration

pub mod config;
pub mod debounce;
pub mod error;
pub mod presets;
pub mod task;
pub mod value;

mod signal;

// Re-exports
pub use config::CoalesceConfig;
pub use debounce::Debouncer;
pub use error::{CallError, ConfigError};
pub use presets::{DelayPreset, PresetTable, DEFAULT_DELAY};
pub use task::{DebouncedTask, GENERIC_ERROR_MESSAGE};
pub use value::DebouncedValue;
