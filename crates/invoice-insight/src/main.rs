mod bootstrap;
mod render;

use anyhow::{bail, Context, Result};
use insight_core::models::ScoreWeights;
use insight_core::settings::Settings;
use insight_data::analysis::{run_analysis, AnalysisOptions};
use insight_data::reader::load_dataset;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Invoice Insight v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Weights: {}, Format: {}, Top invoices: {}",
        settings.weights,
        settings.format,
        settings.top_invoices
    );

    // ── Resolve the dataset directory ─────────────────────────────────────────
    let data_dir = match settings.data_dir.clone() {
        Some(dir) => dir,
        None => match bootstrap::discover_data_dir() {
            Some(dir) => dir,
            None => bail!(
                "no dataset directory found; pass --data-dir or place exports under ./data"
            ),
        },
    };
    tracing::info!("Loading dataset from {}", data_dir.display());

    let dataset = load_dataset(&data_dir)
        .with_context(|| format!("loading dataset from {}", data_dir.display()))?;
    tracing::info!(
        "Loaded {} invoices, {} sessions, {} line items, {} catalogue entries",
        dataset.invoices.len(),
        dataset.sessions.len(),
        dataset.line_items.len(),
        dataset.error_catalogue.len()
    );

    // ── Run the analysis ──────────────────────────────────────────────────────
    let weights = ScoreWeights::preset(&settings.weights)
        .with_context(|| format!("unknown weights preset: {}", settings.weights))?;
    let options = AnalysisOptions {
        weights,
        top_invoices: settings.top_invoices as usize,
        top_errors: settings.top_errors as usize,
        top_correlations: settings.top_correlations as usize,
        columns: None,
    };
    let report = run_analysis(&dataset, &options);

    // ── Render ────────────────────────────────────────────────────────────────
    let rendered = match settings.format.as_str() {
        "summary" => render::render_summary(&report),
        _ => serde_json::to_string_pretty(&report)?,
    };

    match &settings.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("writing report to {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
