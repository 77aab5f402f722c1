//! Top-level analysis pipeline.
//!
//! Composes the scoring, ranking, correlation, distribution and
//! operational analyses over a loaded [`Dataset`] into one serializable
//! [`AnalysisReport`] ready for rendering.

use chrono::Utc;
use insight_core::models::{Insight, ScoreWeights};
use insight_core::schema::{ColumnMap, ColumnRole};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::correlation::{correlate_fields, FieldCorrelation};
use crate::distributions::{
    amount_distribution, category_breakdown, daily_counts, dataset_overview,
    invoices_per_participant, monthly_trend, sessions_per_invoice, status_breakdown,
    time_distribution, BucketCount, CategoryCount, DatasetOverview, DayCount, MonthCount,
};
use crate::error_rankings::{
    error_frequency, error_impact, error_time_cost, priority_errors, ErrorFrequency, ErrorImpact,
    ErrorTimeCost, PriorityError,
};
use crate::operational::{
    efficiency_killers, intake_latency, reconciliation_by_month, review_friction, touchless_rate,
    EfficiencyKillerRow, IntakeLatency, ReconciliationMonth, ReviewFriction, TouchlessRate,
};
use crate::reader::Dataset;
use crate::scoring::{rank_invoices, ScoringResult};

// ── Options ───────────────────────────────────────────────────────────────────

/// Tunables for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Efficiency-score weighting scheme; must be chosen explicitly.
    pub weights: ScoreWeights,
    /// Ranked-invoice truncation length.
    pub top_invoices: usize,
    /// Truncation length of each error ranking.
    pub top_errors: usize,
    /// Truncation length of the correlation list.
    pub top_correlations: usize,
    /// Explicit column mapping; discovered from the data when absent.
    pub columns: Option<ColumnMap>,
}

impl AnalysisOptions {
    /// Reference behavior: standard weights, top 100 invoices, top 15
    /// errors, top 10 correlations, discovered columns.
    pub fn new(weights: ScoreWeights) -> Self {
        Self {
            weights,
            top_invoices: 100,
            top_errors: 15,
            top_correlations: 10,
            columns: None,
        }
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    /// Number of invoice records analysed.
    pub invoices_processed: usize,
    /// Number of session records analysed.
    pub sessions_processed: usize,
    /// Number of line-item records analysed.
    pub line_items_processed: usize,
    /// Number of catalogue entries available for priority enrichment.
    pub catalogue_entries: usize,
    /// Invoice records whose state-management blob failed to parse.
    pub malformed_state_blobs: usize,
    /// Wall-clock seconds spent computing the report.
    pub analysis_time_seconds: f64,
}

/// The complete output of [`run_analysis`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Headline dataset figures.
    pub overview: DatasetOverview,
    /// Column mapping the analyses ran with.
    pub columns: ColumnMap,

    // Trends and distributions.
    pub monthly_trend: Insight<Vec<MonthCount>>,
    pub invoices_per_participant: Insight<Vec<BucketCount>>,
    pub amount_distribution: Insight<Vec<BucketCount>>,
    pub duration_distribution: Vec<BucketCount>,
    pub active_duration_distribution: Vec<BucketCount>,
    pub engaged_duration_distribution: Vec<BucketCount>,
    pub sessions_per_invoice: Insight<Vec<BucketCount>>,
    pub invoice_categories: Vec<CategoryCount>,
    pub invoice_statuses: Vec<CategoryCount>,
    pub invoice_daily_counts: Vec<DayCount>,

    // Efficiency scoring and error analytics.
    pub efficiency: Insight<ScoringResult>,
    pub error_frequency: Insight<Vec<ErrorFrequency>>,
    pub error_impact: Insight<Vec<ErrorImpact>>,
    pub error_time_cost: Insight<Vec<ErrorTimeCost>>,
    pub priority_errors: Vec<PriorityError>,
    pub correlations: Insight<Vec<FieldCorrelation>>,

    // Operational metrics.
    pub intake_latency: Insight<IntakeLatency>,
    pub review_friction: Insight<ReviewFriction>,
    pub touchless_rate: TouchlessRate,
    pub efficiency_killers: Insight<Vec<EfficiencyKillerRow>>,
    pub reconciliation: Vec<ReconciliationMonth>,

    pub metadata: AnalysisMetadata,
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Run every analysis over the dataset and assemble the report.
///
/// The engine is pure over its inputs: every section is recomputed from
/// the record arrays on each call, and no section failure is fatal.
pub fn run_analysis(dataset: &Dataset, options: &AnalysisOptions) -> AnalysisReport {
    let started = std::time::Instant::now();

    let columns = options
        .columns
        .clone()
        .unwrap_or_else(|| ColumnMap::discover(&dataset.invoices, &dataset.sessions));
    debug!("run_analysis: columns = {:?}", columns);

    let invoices = &dataset.invoices;
    let sessions = &dataset.sessions;

    let efficiency = rank_invoices(
        invoices,
        sessions,
        &columns,
        &options.weights,
        options.top_invoices,
    );
    let frequency = error_frequency(invoices, &columns, options.top_errors);
    let impact = error_impact(
        invoices,
        sessions,
        &columns,
        &options.weights,
        options.top_errors,
    );
    let time_cost = error_time_cost(invoices, sessions, &columns, options.top_errors);
    let priority = priority_errors(
        frequency.as_available().map(Vec::as_slice).unwrap_or(&[]),
        impact.as_available().map(Vec::as_slice).unwrap_or(&[]),
        time_cost.as_available().map(Vec::as_slice).unwrap_or(&[]),
        &dataset.error_catalogue,
    );

    let malformed_state_blobs = efficiency
        .as_available()
        .map(|r| r.malformed_blobs)
        .unwrap_or(0);

    let report = AnalysisReport {
        overview: dataset_overview(invoices, &columns),
        monthly_trend: monthly_trend(invoices, &columns),
        invoices_per_participant: invoices_per_participant(invoices, &columns),
        amount_distribution: amount_distribution(invoices, &columns),
        duration_distribution: time_distribution(
            sessions,
            columns.column(ColumnRole::TotalDuration),
        ),
        active_duration_distribution: time_distribution(
            sessions,
            columns.column(ColumnRole::ActiveDuration),
        ),
        engaged_duration_distribution: time_distribution(
            sessions,
            columns.column(ColumnRole::EngagedDuration),
        ),
        sessions_per_invoice: sessions_per_invoice(sessions, &columns),
        invoice_categories: category_breakdown(invoices),
        invoice_statuses: status_breakdown(invoices),
        invoice_daily_counts: daily_counts(invoices),
        efficiency,
        error_frequency: frequency,
        error_impact: impact,
        error_time_cost: time_cost,
        priority_errors: priority,
        correlations: correlate_fields(
            invoices,
            sessions,
            &columns,
            &options.weights,
            options.top_correlations,
        ),
        intake_latency: intake_latency(invoices, sessions, &columns),
        review_friction: review_friction(invoices, sessions, &columns),
        touchless_rate: touchless_rate(invoices, &columns),
        efficiency_killers: efficiency_killers(invoices, sessions, &columns),
        reconciliation: reconciliation_by_month(&dataset.line_items, &columns),
        metadata: AnalysisMetadata {
            generated_at: Utc::now().to_rfc3339(),
            invoices_processed: invoices.len(),
            sessions_processed: sessions.len(),
            line_items_processed: dataset.line_items.len(),
            catalogue_entries: dataset.error_catalogue.len(),
            malformed_state_blobs,
            analysis_time_seconds: started.elapsed().as_secs_f64(),
        },
        columns,
    };

    debug!(
        "run_analysis: {} invoices, {} sessions in {:.3}s",
        report.metadata.invoices_processed,
        report.metadata.sessions_processed,
        report.metadata.analysis_time_seconds
    );
    report
}

// ── Tests ─────────────────────────────────────────────────────────────────────
