//! Invoice efficiency scoring.
//!
//! Aggregates view sessions and state-management error codes into
//! per-invoice metrics, normalizes each feature against its population
//! maximum and combines them into a weighted score.  Higher scores flag a
//! worse processing experience, so the ranking surfaces the invoices that
//! cost operators the most effort.

use std::collections::BTreeMap;

use insight_core::coerce;
use insight_core::models::{
    Insight, InvoiceMetrics, Record, ScoreWeights, ScoredInvoice, SkipReason,
};
use insight_core::schema::{ColumnMap, ColumnRole};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── MetricsTable ──────────────────────────────────────────────────────────────

/// Per-invoice metrics keyed by invoice id, plus bookkeeping about records
/// whose state blob could not be parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    /// Metrics per invoice id.  An entry exists when the invoice has at
    /// least one session or a non-empty error list.
    pub entries: BTreeMap<String, InvoiceMetrics>,
    /// Invoice records whose state-management blob was present but
    /// malformed.  Their error lists contribute nothing.
    pub malformed_blobs: usize,
}

/// Build the per-invoice metrics table from sessions and invoice records.
///
/// Sessions accumulate active seconds and the session count.  Invoice
/// records contribute their state-management error lists; an invoice with
/// errors but no sessions still gets an entry so the error shows up in the
/// ranking.
pub fn build_invoice_metrics(
    invoices: &[Record],
    sessions: &[Record],
    columns: &ColumnMap,
) -> Insight<MetricsTable> {
    if invoices.is_empty() || sessions.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(session_id_col) = columns.column(ColumnRole::SessionInvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::SessionInvoiceId));
    };
    let active_col = columns.column(ColumnRole::ActiveDuration);

    let mut table = MetricsTable::default();
    for session in sessions {
        let Some(invoice_id) = coerce::id_of(session.get(session_id_col)) else {
            continue;
        };
        let entry = table.entries.entry(invoice_id).or_default();
        entry.active_seconds += coerce::number_or_zero(active_col.and_then(|c| session.get(c)));
        entry.session_count += 1;
    }

    attach_error_codes(&mut table, invoices, columns);
    Insight::Available(table)
}

/// Attach state-management error lists to the metrics entries.
fn attach_error_codes(table: &mut MetricsTable, invoices: &[Record], columns: &ColumnMap) {
    let Some(id_col) = columns.column(ColumnRole::InvoiceId) else {
        return;
    };
    let Some(state_col) = columns.column(ColumnRole::StateManagement) else {
        return;
    };

    for invoice in invoices {
        let Some(invoice_id) = coerce::id_of(invoice.get(id_col)) else {
            continue;
        };
        let Some(blob) = invoice.get(state_col) else {
            continue;
        };
        if blob.is_null() {
            continue;
        }
        match coerce::parse_state_blob(blob) {
            Some(state) if state.has_codes() => {
                let entry = table.entries.entry(invoice_id).or_default();
                entry.error_codes = state.errors;
                entry.ignored_error_codes = state.ignored_errors;
            }
            Some(_) => {}
            None => table.malformed_blobs += 1,
        }
    }
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Population maximum of each scored feature.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct FeatureMaxima {
    active_seconds: f64,
    session_count: f64,
    error_count: f64,
    ignored_count: f64,
}

impl FeatureMaxima {
    /// Maxima across a set of metrics entries.
    pub(crate) fn of<'a>(entries: impl Iterator<Item = &'a InvoiceMetrics>) -> Self {
        let mut maxima = Self::default();
        for metrics in entries {
            maxima.active_seconds = maxima.active_seconds.max(metrics.active_seconds);
            maxima.session_count = maxima.session_count.max(metrics.session_count as f64);
            maxima.error_count = maxima.error_count.max(metrics.error_codes.len() as f64);
            maxima.ignored_count = maxima
                .ignored_count
                .max(metrics.ignored_error_codes.len() as f64);
        }
        maxima
    }
}

/// `value / max`, or 0 when the population maximum is zero.
fn normalized(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

/// Weighted sum of the normalized features of one metrics entry.
pub(crate) fn weighted_score(
    metrics: &InvoiceMetrics,
    maxima: &FeatureMaxima,
    weights: &ScoreWeights,
) -> f64 {
    normalized(metrics.active_seconds, maxima.active_seconds) * weights.active_time
        + normalized(metrics.session_count as f64, maxima.session_count) * weights.session_count
        + normalized(metrics.error_codes.len() as f64, maxima.error_count) * weights.active_errors
        + normalized(metrics.ignored_error_codes.len() as f64, maxima.ignored_count)
            * weights.ignored_errors
}

/// Score every entry of a metrics table, in table order, without ranking.
pub fn score_entries(table: &MetricsTable, weights: &ScoreWeights) -> Vec<(String, f64)> {
    let maxima = FeatureMaxima::of(table.entries.values());
    table
        .entries
        .iter()
        .map(|(id, metrics)| (id.clone(), weighted_score(metrics, &maxima, weights)))
        .collect()
}

// ── Ranking ───────────────────────────────────────────────────────────────────

/// Output of [`rank_invoices`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Worst invoices first, 1-based ranks, truncated to the requested
    /// length.
    pub ranked: Vec<ScoredInvoice>,
    /// Number of invoices that were scored before truncation.
    pub population: usize,
    /// Invoice records with a malformed state-management blob.
    pub malformed_blobs: usize,
}

/// Rank invoices by efficiency score, worst experience first.
///
/// Returns the top `top_n` entries of the scored population; the result
/// length is `min(top_n, population)`.
pub fn rank_invoices(
    invoices: &[Record],
    sessions: &[Record],
    columns: &ColumnMap,
    weights: &ScoreWeights,
    top_n: usize,
) -> Insight<ScoringResult> {
    build_invoice_metrics(invoices, sessions, columns).map(|table| {
        let mut scores = score_entries(&table, weights);
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let population = scores.len();
        let ranked: Vec<ScoredInvoice> = scores
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(index, (invoice_id, score))| {
                let metrics = table.entries.get(&invoice_id).cloned().unwrap_or_default();
                ScoredInvoice {
                    invoice_id,
                    rank: index as u32 + 1,
                    score,
                    active_seconds: metrics.active_seconds,
                    session_count: metrics.session_count,
                    error_codes: metrics.error_codes,
                    ignored_error_codes: metrics.ignored_error_codes,
                }
            })
            .collect();

        debug!(
            "rank_invoices: scored {} invoices, kept {}",
            population,
            ranked.len()
        );
        ScoringResult {
            ranked,
            population,
            malformed_blobs: table.malformed_blobs,
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
