use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the standard `~/.invoice-insight/` directory hierarchy exists.
///
/// Creates the following directories if absent (including any missing
/// parents):
/// - `~/.invoice-insight/`
/// - `~/.invoice-insight/logs/`
/// - `~/.invoice-insight/exports/`
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let insight_dir = home.join(".invoice-insight");
    std::fs::create_dir_all(&insight_dir)?;
    std::fs::create_dir_all(insight_dir.join("logs"))?;
    std::fs::create_dir_all(insight_dir.join("exports"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised.
///
/// The `log_file` parameter is accepted for forward-compatibility but file
/// logging is not yet wired – all output currently goes to stderr.
pub fn setup_logging(log_level: &str, _log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let normalised = match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .init();

    Ok(())
}

// ── Data-path discovery ────────────────────────────────────────────────────────

/// Attempt to locate the exported dataset directory on the local system.
///
/// Checks the following paths in order and returns the first that exists:
/// 1. `./data/`
/// 2. `~/.invoice-insight/exports/`
///
/// Returns `None` when neither path exists.
pub fn discover_data_dir() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("data")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".invoice-insight").join("exports"));
    }
    candidates.into_iter().find(|p| p.is_dir())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
