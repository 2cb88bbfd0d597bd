//! Timed simulation of debounced input
//!
//! Each event is written to a `DebouncedValue` (shown immediately, committed
//! after the quiet period) and handed to a `DebouncedTask` standing in for a
//! search lookup. The timeline shows which writes were coalesced away.

use crate::util;
use anyhow::{Context, Result};
use coalesce_core::{DebouncedTask, DebouncedValue, DelayPreset, DEFAULT_DELAY};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Resolved simulation settings
#[derive(Debug, Clone)]
pub struct Options {
    pub delay: Duration,
    pub latency: Duration,
    pub fail: Option<String>,
    pub flush: bool,
}

impl Options {
    /// Pick the delay from --preset, --delay-ms or the default, in that order
    pub fn resolve(
        config_path: &Path,
        preset: Option<&str>,
        delay_ms: Option<u64>,
        latency_ms: u64,
        fail: Option<String>,
        flush: bool,
    ) -> Result<Self> {
        util::install_presets(config_path)?;

        let delay = match (preset, delay_ms) {
            (Some(name), _) => name
                .parse::<DelayPreset>()
                .with_context(|| format!("Unknown preset '{}'. Use 'coalesce presets' to list them.", name))?
                .delay(),
            (None, Some(ms)) => Duration::from_millis(ms),
            (None, None) => DEFAULT_DELAY,
        };

        Ok(Self {
            delay,
            latency: Duration::from_millis(latency_ms),
            fail,
            flush,
        })
    }
}

/// One simulated write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub value: String,
    pub at: Duration,
}

/// Parse `VALUE@OFFSET_MS` arguments, ordered by offset
pub fn parse_events(raw_events: &[String]) -> Result<Vec<Event>> {
    let mut events = raw_events
        .iter()
        .map(|raw| {
            let (value, offset) = raw
                .rsplit_once('@')
                .with_context(|| format!("Invalid event '{}': expected VALUE@OFFSET_MS", raw))?;
            let ms: u64 = offset
                .parse()
                .with_context(|| format!("Invalid offset in event '{}'", raw))?;
            Ok(Event {
                value: value.to_string(),
                at: Duration::from_millis(ms),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Stable: events at the same offset keep their command-line order
    events.sort_by_key(|event| event.at);
    Ok(events)
}

fn stamp(start: Instant) -> String {
    format!("+{:>5}ms", start.elapsed().as_millis())
}

pub async fn run(options: Options, raw_events: &[String]) -> Result<()> {
    let events = parse_events(raw_events)?;
    let start = Instant::now();

    println!(
        "{} delay {}, latency {}",
        "Simulating".bold(),
        util::format_delay(options.delay),
        util::format_delay(options.latency)
    );

    let last_commit: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let value = {
        let last_commit = last_commit.clone();
        DebouncedValue::new(String::new(), options.delay, move |committed: String| {
            println!("{} {:<8} \"{}\"", stamp(start), "commit".cyan(), committed);
            *last_commit.lock() = Some(committed);
        })
    };

    let executions = Arc::new(AtomicUsize::new(0));
    let lookup: DebouncedTask<String, usize, String> = {
        let executions = executions.clone();
        let fail = options.fail.clone();
        let latency = options.latency;
        DebouncedTask::new(options.delay, move |query: String| {
            executions.fetch_add(1, Ordering::SeqCst);
            let fail = fail.clone();
            async move {
                tokio::time::sleep(latency).await;
                match fail {
                    Some(message) => Err(message),
                    None => {
                        let hits = query.chars().count();
                        println!("{} {:<8} \"{}\" -> {} hit(s)", stamp(start), "result".green(), query, hits);
                        Ok(hits)
                    }
                }
            }
        })
    };

    // Print loading/error transitions as they are observed
    let mut loading_rx = lookup.watch_loading();
    let mut error_rx = lookup.watch_error();
    let watcher = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = loading_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let loading = *loading_rx.borrow_and_update();
                    println!("{} {:<8} {}", stamp(start), "loading".magenta(), loading);
                }
                changed = error_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(message) = error_rx.borrow_and_update().clone() {
                        println!("{} {:<8} {}", stamp(start), "error".red(), message);
                    }
                }
            }
        }
    });

    for event in &events {
        tokio::time::sleep_until(start + event.at).await;
        value.set_value(event.value.clone());
        lookup.call(event.value.clone());
        println!(
            "{} {:<8} \"{}\" (pending: {})",
            stamp(start),
            "input".bold(),
            value.value(),
            lookup.pending()
        );
    }

    if options.flush {
        value.flush();
        if let Some(Err(e)) = lookup.flush().await {
            tracing::debug!("Flushed lookup failed: {}", e);
        }
    } else {
        // Quiet period: wait for both debouncers to fire
        lookup
            .watch_pending()
            .wait_for(|pending| !*pending)
            .await
            .context("Lookup closed while pending")?;
        value
            .watch_pending()
            .wait_for(|pending| !*pending)
            .await
            .context("Value binding closed while pending")?;
    }

    lookup
        .watch_loading()
        .wait_for(|loading| !*loading)
        .await
        .context("Lookup closed while loading")?;

    // Let the watcher print the final transitions
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    watcher.abort();

    let committed = last_commit
        .lock()
        .as_ref()
        .map(|v| format!("\"{}\"", v))
        .unwrap_or_else(|| "none".to_string());

    println!();
    println!("{}", "Summary".bold());
    println!("  events:      {}", events.len());
    println!("  executions:  {}", executions.load(Ordering::SeqCst));
    println!("  last commit: {}", committed);
    println!("  error:       {}", lookup.error().unwrap_or_else(|| "none".to_string()));

    Ok(())
}
