use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the invoice-insight crates.
///
/// Note that analysis sections never raise errors over dataset shape; those
/// degrade to `Insight::Unavailable`.  This type covers the fallible edges:
/// file I/O, export parsing and configuration.
#[derive(Error, Debug)]
pub enum InsightError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An export file has an extension the loader does not understand.
    #[error("Unsupported export format: {0}")]
    UnsupportedExport(PathBuf),

    /// The expected dataset directory does not exist.
    #[error("Dataset path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No export files were found under the given directory.
    #[error("No JSON exports found in {0}")]
    NoDataFiles(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the insight crates.
pub type Result<T> = std::result::Result<T, InsightError>;
