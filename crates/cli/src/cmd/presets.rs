//! Show the effective delay presets

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = util::install_presets(config_path)?;

    println!("{}", "Delay Presets".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for (preset, delay) in coalesce_core::presets::table().iter() {
        let note = if config.delays.contains_key(&preset) {
            format!("(override, default {})", util::format_delay(preset.default_delay()))
                .yellow()
                .to_string()
        } else {
            "(default)".dimmed().to_string()
        };
        println!(
            "  {:<16} {:>8}  {}",
            preset.name().cyan(),
            util::format_delay(delay),
            note
        );
    }

    Ok(())
}
