//! Correlation between invoice-level fields and the efficiency score.
//!
//! Joins numeric and boolean invoice columns onto the session-derived
//! metrics entries, scores the joined population, and computes the Pearson
//! coefficient of every candidate field against the score.  Identifier and
//! date columns, the engine's own metric fields and zero-variance series
//! are excluded.

use std::collections::{BTreeMap, HashSet};

use insight_core::coerce;
use insight_core::models::{Insight, InvoiceMetrics, Record, ScoreWeights, SkipReason};
use insight_core::schema::{ColumnMap, ColumnRole};
use insight_core::stats;
use serde::{Deserialize, Serialize};

use crate::scoring::{weighted_score, FeatureMaxima};

// ── Output types ──────────────────────────────────────────────────────────────

/// One raw (field value, efficiency score) pair, kept for scatter plots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPoint {
    pub value: f64,
    pub score: f64,
}

/// Pearson correlation of one invoice field against the efficiency score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCorrelation {
    pub field: String,
    pub coefficient: f64,
    pub points: Vec<CorrelationPoint>,
}

// ── Join ──────────────────────────────────────────────────────────────────────

/// A metrics entry with its joined invoice-level numeric fields.
#[derive(Debug, Clone, Default)]
struct JoinedInvoice {
    metrics: InvoiceMetrics,
    fields: BTreeMap<String, f64>,
}

/// Whether an invoice column may enter the correlation at all.
///
/// Columns whose lower-cased name contains `"id"` or `"date"` never
/// correlate; this also keeps aggregates like idle counts out.
fn is_candidate_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    !lower.contains("id") && !lower.contains("date")
}

// ── Analysis ──────────────────────────────────────────────────────────────────

/// Correlate every numeric invoice field against the efficiency score.
///
/// Only invoices with at least one session participate.  Returns the
/// `top_n` fields by absolute coefficient, each with its raw pairs.
pub fn correlate_fields(
    invoices: &[Record],
    sessions: &[Record],
    columns: &ColumnMap,
    weights: &ScoreWeights,
    top_n: usize,
) -> Insight<Vec<FieldCorrelation>> {
    if invoices.is_empty() || sessions.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(session_id_col) = columns.column(ColumnRole::SessionInvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::SessionInvoiceId));
    };
    let active_col = columns.column(ColumnRole::ActiveDuration);

    // Session aggregation: only invoices seen here participate.
    let mut joined: BTreeMap<String, JoinedInvoice> = BTreeMap::new();
    for session in sessions {
        let Some(invoice_id) = coerce::id_of(session.get(session_id_col)) else {
            continue;
        };
        let entry = joined.entry(invoice_id).or_default();
        entry.metrics.active_seconds +=
            coerce::number_or_zero(active_col.and_then(|c| session.get(c)));
        entry.metrics.session_count += 1;
    }
    if joined.is_empty() {
        return Insight::Available(Vec::new());
    }

    // Join invoice columns and error lists onto existing entries.
    if let Some(id_col) = columns.column(ColumnRole::InvoiceId) {
        let state_col = columns.column(ColumnRole::StateManagement);
        for invoice in invoices {
            let Some(invoice_id) = coerce::id_of(invoice.get(id_col)) else {
                continue;
            };
            let Some(entry) = joined.get_mut(&invoice_id) else {
                continue;
            };

            for (name, value) in invoice {
                if name == id_col || !is_candidate_column(name) {
                    continue;
                }
                if let Some(number) = coerce::as_number(value) {
                    entry.fields.insert(name.clone(), number);
                }
            }

            if let Some(state) = state_col
                .and_then(|c| invoice.get(c))
                .and_then(coerce::parse_state_blob)
            {
                entry.metrics.error_codes = state.errors;
                entry.metrics.ignored_error_codes = state.ignored_errors;
            }
        }
    }

    // Score the joined population.
    let maxima = FeatureMaxima::of(joined.values().map(|j| &j.metrics));
    let scores: Vec<f64> = joined
        .values()
        .map(|j| weighted_score(&j.metrics, &maxima, weights))
        .collect();

    // Candidate fields come from the first joined entry, matching the
    // dashboard's sampling of the first row.
    let candidates: Vec<String> = joined
        .values()
        .next()
        .map(|j| j.fields.keys().cloned().collect())
        .unwrap_or_default();

    let mut correlations: Vec<FieldCorrelation> = Vec::new();
    for field in candidates {
        let values: Vec<f64> = joined
            .values()
            .map(|j| j.fields.get(&field).copied().unwrap_or(0.0))
            .collect();

        // Constant series carry no signal.
        let distinct: HashSet<u64> = values.iter().map(|v| v.to_bits()).collect();
        if distinct.len() < 2 {
            continue;
        }
        let Some(coefficient) = stats::pearson(&values, &scores) else {
            continue;
        };

        let points = values
            .iter()
            .zip(&scores)
            .map(|(&value, &score)| CorrelationPoint { value, score })
            .collect();
        correlations.push(FieldCorrelation {
            field,
            coefficient,
            points,
        });
    }

    correlations.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.field.cmp(&b.field))
    });
    correlations.truncate(top_n);
    Insight::Available(correlations)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
