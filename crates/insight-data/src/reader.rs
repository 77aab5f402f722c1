//! Export file discovery and loading for invoice-insight.
//!
//! Reads the JSON / JSONL table exports produced by the invoice-management
//! database and assembles them into a [`Dataset`] for the analytics engine.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use insight_core::error::{InsightError, Result};
use insight_core::models::Record;
use tracing::{debug, warn};

// ── Dataset ───────────────────────────────────────────────────────────────────

/// The four exported tables the analyses draw from.
///
/// Any table may be empty; the engine degrades per-section instead of
/// requiring all of them.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Invoice rows, one record per invoice.
    pub invoices: Vec<Record>,
    /// Invoice view sessions, one record per viewing session.
    pub sessions: Vec<Record>,
    /// Invoice line items with reconciliation status.
    pub line_items: Vec<Record>,
    /// The error-code catalogue, when exported.
    pub error_catalogue: Vec<Record>,
}

impl Dataset {
    /// Whether every table is empty.
    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
            && self.sessions.is_empty()
            && self.line_items.is_empty()
            && self.error_catalogue.is_empty()
    }
}

// ── Table classification ──────────────────────────────────────────────────────

/// Which table an export file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Invoices,
    Sessions,
    LineItems,
    ErrorCatalogue,
}

/// Classify an export file by keywords in its stem.
///
/// Checked in order of specificity: `session` and `line_item` before
/// `error`, and `error` before `invoice`, because the session and line-item
/// exports carry `invoice` in their names too.
pub fn classify_export(path: &Path) -> Option<TableKind> {
    let stem = path.file_stem()?.to_string_lossy().to_lowercase();
    if stem.contains("session") {
        Some(TableKind::Sessions)
    } else if stem.contains("line_item") || stem.contains("line-item") {
        Some(TableKind::LineItems)
    } else if stem.contains("error") {
        Some(TableKind::ErrorCatalogue)
    } else if stem.contains("invoice") {
        Some(TableKind::Invoices)
    } else {
        None
    }
}

// ── File discovery ────────────────────────────────────────────────────────────

/// Find all `.json` / `.jsonl` files recursively under `data_dir`, sorted
/// by path.
pub fn find_export_files(data_dir: &Path) -> Vec<PathBuf> {
    if !data_dir.exists() {
        warn!("Dataset path does not exist: {}", data_dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "json" || ext == "jsonl")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

// ── Record loading ────────────────────────────────────────────────────────────

/// Load the records of a single export file.
///
/// `.json` files must hold a top-level array (non-object elements are
/// dropped with a warning) or a single object.  `.jsonl` files are parsed
/// line by line; malformed lines are skipped.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json_array(path),
        Some("jsonl") => load_json_lines(path),
        _ => Err(InsightError::UnsupportedExport(path.to_path_buf())),
    }
}

fn load_json_array(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path).map_err(|source| InsightError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    let records = match value {
        serde_json::Value::Array(items) => {
            let total = items.len();
            let records: Vec<Record> = items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            if records.len() < total {
                warn!(
                    "{}: dropped {} non-object rows",
                    path.display(),
                    total - records.len()
                );
            }
            records
        }
        serde_json::Value::Object(map) => vec![map],
        _ => Vec::new(),
    };
    Ok(records)
}

fn load_json_lines(path: &Path) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path).map_err(|source| InsightError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in reader.lines() {
        let Ok(line) = line else { continue };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(trimmed) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("{}: skipped {} malformed lines", path.display(), skipped);
    }
    Ok(records)
}

// ── Dataset loading ───────────────────────────────────────────────────────────

/// Discover, classify and load every export under `data_dir`.
///
/// Multiple files for the same table are concatenated.  Files that cannot
/// be classified are logged and ignored.
pub fn load_dataset(data_dir: &Path) -> Result<Dataset> {
    if !data_dir.exists() {
        return Err(InsightError::DataPathNotFound(data_dir.to_path_buf()));
    }

    let files = find_export_files(data_dir);
    if files.is_empty() {
        return Err(InsightError::NoDataFiles(data_dir.to_path_buf()));
    }

    let mut dataset = Dataset::default();
    for path in &files {
        let Some(kind) = classify_export(path) else {
            warn!("Unrecognised export file ignored: {}", path.display());
            continue;
        };
        let records = load_records(path)?;
        debug!(
            "Loaded {} records from {} ({:?})",
            records.len(),
            path.display(),
            kind
        );
        match kind {
            TableKind::Invoices => dataset.invoices.extend(records),
            TableKind::Sessions => dataset.sessions.extend(records),
            TableKind::LineItems => dataset.line_items.extend(records),
            TableKind::ErrorCatalogue => dataset.error_catalogue.extend(records),
        }
    }

    Ok(dataset)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
