use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Efficiency analytics over NDIS invoice-management exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "invoice-insight",
    about = "Efficiency analytics over NDIS invoice-management exports",
    version
)]
pub struct Settings {
    /// Directory containing the exported dataset (auto-discovered if not set)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Efficiency-score weighting scheme
    #[arg(long, default_value = "standard", value_parser = ["standard", "legacy"])]
    pub weights: String,

    /// How many ranked invoices to keep
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub top_invoices: u32,

    /// How many entries to keep per error ranking
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub top_errors: u32,

    /// How many correlated fields to keep
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=50))]
    pub top_correlations: u32,

    /// Report output format
    #[arg(long, default_value = "json", value_parser = ["json", "summary"])]
    pub format: String,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.invoice-insight/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_invoices: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_errors: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_correlations: Option<u32>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    /// Uses `~/.invoice-insight/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".invoice-insight").join("last_used.json")
    }

    /// Load persisted params from the default path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load persisted params from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to the default path, creating parent
    /// directories if needed.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&Self::config_path())
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the default config file if it exists.
    pub fn clear() -> Result<(), std::io::Error> {
        Self::clear_at(&Self::config_path())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result for the next run.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] but accepts an explicit
    /// argument list, enabling unit-testing without spawning subprocesses.
    pub fn load_with_last_used_from_args(args: Vec<std::ffi::OsString>) -> Self {
        Self::load_with_last_used_impl(args, &LastUsedParams::config_path())
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());

        // Parse into the typed struct using the same args.
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // Merge last-used values for fields that were NOT explicitly set on
        // the command line (CLI always wins).  'data_dir' is never persisted.
        if !is_arg_explicitly_set(&matches, "weights") {
            if let Some(v) = last.weights {
                settings.weights = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }
        // NOTE: clap stores the arg id using the *field name* (underscores),
        // not the long-flag spelling (hyphens).
        if !is_arg_explicitly_set(&matches, "top_invoices") {
            if let Some(v) = last.top_invoices {
                settings.top_invoices = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "top_errors") {
            if let Some(v) = last.top_errors {
                settings.top_errors = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "top_correlations") {
            if let Some(v) = last.top_correlations {
                settings.top_correlations = v;
            }
        }

        settings = Self::apply_debug(settings);

        // Persist current settings for next run.
        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// `--debug` overrides the configured log level.
    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            weights: Some(s.weights.clone()),
            format: Some(s.format.clone()),
            top_invoices: Some(s.top_invoices),
            top_errors: Some(s.top_errors),
            top_correlations: Some(s.top_correlations),
        }
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
