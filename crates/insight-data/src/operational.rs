//! Operational metrics: intake latency, review friction, touchless rate,
//! efficiency-killer scatter rows and reconciliation status over time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use insight_core::coerce::{self, TimestampParser};
use insight_core::models::{Insight, Record, SkipReason};
use insight_core::schema::{ColumnMap, ColumnRole};
use insight_core::stats;
use serde::{Deserialize, Serialize};

use crate::distributions::BucketCount;

// ── Output types ──────────────────────────────────────────────────────────────

/// Time from invoice creation to the first viewing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeLatency {
    /// Fixed latency buckets, every bucket always present.
    pub buckets: Vec<BucketCount>,
    /// Midpoint median latency in minutes.
    pub median_minutes: f64,
}

/// Mean engaged time of invoices with and without active errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewFriction {
    pub with_errors_minutes: f64,
    pub without_errors_minutes: f64,
    pub with_errors_count: usize,
    pub without_errors_count: usize,
}

/// Share of invoices that needed no human touch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchlessRate {
    pub touchless: u64,
    pub manual: u64,
    pub percentage: f64,
}

/// One invoice of the effort-vs-errors scatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyKillerRow {
    pub invoice_id: String,
    pub total_duration_seconds: f64,
    pub session_count: u32,
    pub idle_count: f64,
    pub has_errors: bool,
}

/// Line-item reconciliation counts for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationMonth {
    /// `YYYY-MM`.
    pub month: String,
    pub reconciled: u64,
    pub pending: u64,
    pub failed: u64,
    /// Any further status values seen in that month.
    pub other: BTreeMap<String, u64>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Group sessions by invoice id.  Sessions without a usable id are dropped.
fn sessions_by_invoice<'a>(
    sessions: &'a [Record],
    id_col: &str,
) -> BTreeMap<String, Vec<&'a Record>> {
    let mut grouped: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for session in sessions {
        let Some(invoice_id) = coerce::id_of(session.get(id_col)) else {
            continue;
        };
        grouped.entry(invoice_id).or_default().push(session);
    }
    grouped
}

/// Whether an invoice's state blob carries at least one *active* error.
fn has_active_errors(invoice: &Record, columns: &ColumnMap) -> bool {
    columns
        .column(ColumnRole::StateManagement)
        .and_then(|col| invoice.get(col))
        .and_then(coerce::parse_state_blob)
        .map(|state| !state.errors.is_empty())
        .unwrap_or(false)
}

// ── Intake latency ────────────────────────────────────────────────────────────

const LATENCY_BUCKETS: &[&str] = &["0-5m", "5-15m", "15-30m", "30-60m", "1-2h", "2-6h", "6h+"];

fn latency_bucket(minutes: f64) -> &'static str {
    if minutes < 5.0 {
        "0-5m"
    } else if minutes < 15.0 {
        "5-15m"
    } else if minutes < 30.0 {
        "15-30m"
    } else if minutes < 60.0 {
        "30-60m"
    } else if minutes < 120.0 {
        "1-2h"
    } else if minutes < 360.0 {
        "2-6h"
    } else {
        "6h+"
    }
}

/// Minutes from invoice creation to the earliest session start.
///
/// Invoices without a parseable creation time or without sessions are
/// skipped; negative latencies (sessions recorded before creation) are
/// dropped.
pub fn intake_latency(
    invoices: &[Record],
    sessions: &[Record],
    columns: &ColumnMap,
) -> Insight<IntakeLatency> {
    if invoices.is_empty() || sessions.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(session_id_col) = columns.column(ColumnRole::SessionInvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::SessionInvoiceId));
    };
    let Some(invoice_id_col) = columns.column(ColumnRole::InvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::InvoiceId));
    };
    let Some(created_col) = columns.column(ColumnRole::CreatedAt) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::CreatedAt));
    };
    let Some(started_col) = columns.column(ColumnRole::SessionStarted) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::SessionStarted));
    };

    let grouped = sessions_by_invoice(sessions, session_id_col);

    let mut latencies: Vec<f64> = Vec::new();
    for invoice in invoices {
        let Some(invoice_id) = coerce::id_of(invoice.get(invoice_id_col)) else {
            continue;
        };
        let Some(created_at) = invoice
            .get(created_col)
            .and_then(|v| TimestampParser::parse(v))
        else {
            continue;
        };
        let Some(invoice_sessions) = grouped.get(&invoice_id) else {
            continue;
        };
        let first_start: Option<DateTime<Utc>> = invoice_sessions
            .iter()
            .filter_map(|s| s.get(started_col).and_then(|v| TimestampParser::parse(v)))
            .min();
        let Some(first_start) = first_start else {
            continue;
        };

        let minutes = (first_start - created_at).num_seconds() as f64 / 60.0;
        if minutes >= 0.0 {
            latencies.push(minutes);
        }
    }

    let mut counts: BTreeMap<&str, u64> = LATENCY_BUCKETS.iter().map(|b| (*b, 0)).collect();
    for &minutes in &latencies {
        *counts.get_mut(latency_bucket(minutes)).expect("known bucket") += 1;
    }
    let buckets = LATENCY_BUCKETS
        .iter()
        .map(|bucket| BucketCount {
            bucket: bucket.to_string(),
            count: counts[bucket],
        })
        .collect();

    let median_minutes = stats::midpoint_median(&mut latencies);
    Insight::Available(IntakeLatency {
        buckets,
        median_minutes,
    })
}

// ── Review friction ───────────────────────────────────────────────────────────

/// Mean engaged minutes of invoices with vs. without active errors.
///
/// Only invoices with a positive total engaged time participate.
pub fn review_friction(
    invoices: &[Record],
    sessions: &[Record],
    columns: &ColumnMap,
) -> Insight<ReviewFriction> {
    if invoices.is_empty() || sessions.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(session_id_col) = columns.column(ColumnRole::SessionInvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::SessionInvoiceId));
    };
    let Some(invoice_id_col) = columns.column(ColumnRole::InvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::InvoiceId));
    };
    let Some(engaged_col) = columns.column(ColumnRole::EngagedDuration) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::EngagedDuration));
    };

    let grouped = sessions_by_invoice(sessions, session_id_col);

    let mut with_errors: Vec<f64> = Vec::new();
    let mut without_errors: Vec<f64> = Vec::new();
    for invoice in invoices {
        let Some(invoice_id) = coerce::id_of(invoice.get(invoice_id_col)) else {
            continue;
        };
        let total_engaged: f64 = grouped
            .get(&invoice_id)
            .map(|list| {
                list.iter()
                    .map(|s| coerce::number_or_zero(s.get(engaged_col)))
                    .sum()
            })
            .unwrap_or(0.0);
        if total_engaged <= 0.0 {
            continue;
        }
        if has_active_errors(invoice, columns) {
            with_errors.push(total_engaged);
        } else {
            without_errors.push(total_engaged);
        }
    }

    Insight::Available(ReviewFriction {
        with_errors_minutes: stats::mean(&with_errors) / 60.0,
        without_errors_minutes: stats::mean(&without_errors) / 60.0,
        with_errors_count: with_errors.len(),
        without_errors_count: without_errors.len(),
    })
}

// ── Touchless rate ────────────────────────────────────────────────────────────

/// Count invoices whose auto-approved flag is set against the rest.
///
/// With no auto-approved column mapped, every invoice counts as manual.
pub fn touchless_rate(invoices: &[Record], columns: &ColumnMap) -> TouchlessRate {
    let auto_col = columns.column(ColumnRole::AutoApproved);

    let mut touchless = 0u64;
    let mut manual = 0u64;
    for invoice in invoices {
        if coerce::is_truthy_flag(auto_col.and_then(|c| invoice.get(c))) {
            touchless += 1;
        } else {
            manual += 1;
        }
    }

    let total = touchless + manual;
    let percentage = if total > 0 {
        touchless as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    TouchlessRate {
        touchless,
        manual,
        percentage,
    }
}

// ── Efficiency killers ────────────────────────────────────────────────────────

/// Scatter rows relating total handling time, session count and idle
/// events to error presence.  Invoices without sessions, or with zero
/// total duration, are dropped.
pub fn efficiency_killers(
    invoices: &[Record],
    sessions: &[Record],
    columns: &ColumnMap,
) -> Insight<Vec<EfficiencyKillerRow>> {
    if invoices.is_empty() || sessions.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(session_id_col) = columns.column(ColumnRole::SessionInvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::SessionInvoiceId));
    };
    let Some(invoice_id_col) = columns.column(ColumnRole::InvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::InvoiceId));
    };
    let duration_col = columns.column(ColumnRole::TotalDuration);
    let idle_col = columns.column(ColumnRole::IdleCount);

    let grouped = sessions_by_invoice(sessions, session_id_col);

    let mut rows: Vec<EfficiencyKillerRow> = Vec::new();
    for invoice in invoices {
        let Some(invoice_id) = coerce::id_of(invoice.get(invoice_id_col)) else {
            continue;
        };
        let Some(invoice_sessions) = grouped.get(&invoice_id) else {
            continue;
        };

        let total_duration: f64 = invoice_sessions
            .iter()
            .map(|s| coerce::number_or_zero(duration_col.and_then(|c| s.get(c))))
            .sum();
        if total_duration <= 0.0 {
            continue;
        }
        let idle_count: f64 = invoice_sessions
            .iter()
            .map(|s| coerce::number_or_zero(idle_col.and_then(|c| s.get(c))))
            .sum();

        rows.push(EfficiencyKillerRow {
            invoice_id,
            total_duration_seconds: total_duration,
            session_count: invoice_sessions.len() as u32,
            idle_count,
            has_errors: has_active_errors(invoice, columns),
        });
    }

    Insight::Available(rows)
}

// ── Reconciliation over time ──────────────────────────────────────────────────

/// Line items per month and reconciliation status, months ascending.
///
/// Items without a parseable creation time are skipped; a missing status
/// counts as `"Unknown"`.
pub fn reconciliation_by_month(
    line_items: &[Record],
    columns: &ColumnMap,
) -> Vec<ReconciliationMonth> {
    let Some(created_col) = columns.column(ColumnRole::CreatedAt) else {
        return Vec::new();
    };
    let Some(status_col) = columns.column(ColumnRole::ReconciliationStatus) else {
        return Vec::new();
    };

    let mut monthly: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for item in line_items {
        let Some(ts) = item.get(created_col).and_then(|v| TimestampParser::parse(v)) else {
            continue;
        };
        let month = ts.format("%Y-%m").to_string();
        let status = item
            .get(status_col)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown")
            .to_string();
        *monthly.entry(month).or_default().entry(status).or_default() += 1;
    }

    monthly
        .into_iter()
        .map(|(month, mut statuses)| {
            let reconciled = statuses.remove("Reconciled").unwrap_or(0);
            let pending = statuses.remove("Pending").unwrap_or(0);
            let failed = statuses.remove("Failed").unwrap_or(0);
            ReconciliationMonth {
                month,
                reconciled,
                pending,
                failed,
                other: statuses,
            }
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().expect("object").clone()
    }

    fn columns(invoices: &[Record], sessions: &[Record]) -> ColumnMap {
        ColumnMap::discover(invoices, sessions)
    }

    // ── intake_latency ────────────────────────────────────────────────────────

    #[test]
    fn test_intake_latency_uses_earliest_session() {
        let invoices = vec![record(json!({
            "id": "1",
            "created_at": "2024-01-01T10:00:00Z",
        }))];
        let sessions = vec![
            record(json!({
                "invoice_id": "1",
                "session_started": "2024-01-01T12:00:00Z",
            })),
            record(json!({
                "invoice_id": "1",
                "session_started": "2024-01-01T10:10:00Z",
            })),
        ];
        let cols = columns(&invoices, &sessions);

        let latency = intake_latency(&invoices, &sessions, &cols)
            .into_available()
            .unwrap();
        // Earliest session is 10 minutes after creation → "5-15m" bucket.
        assert_eq!(latency.median_minutes, 10.0);
        let bucket = latency.buckets.iter().find(|b| b.bucket == "5-15m").unwrap();
        assert_eq!(bucket.count, 1);
    }

    #[test]
    fn test_intake_latency_drops_negative_latencies() {
        let invoices = vec![record(json!({
            "id": "1",
            "created_at": "2024-01-01T10:00:00Z",
        }))];
        let sessions = vec![record(json!({
            "invoice_id": "1",
            "session_started": "2024-01-01T09:00:00Z",
        }))];
        let cols = columns(&invoices, &sessions);

        let latency = intake_latency(&invoices, &sessions, &cols)
            .into_available()
            .unwrap();
        assert!(latency.buckets.iter().all(|b| b.count == 0));
        assert_eq!(latency.median_minutes, 0.0);
    }

    #[test]
    fn test_intake_latency_all_buckets_present() {
        let invoices = vec![record(json!({
            "id": "1",
            "created_at": "2024-01-01T00:00:00Z",
        }))];
        let sessions = vec![record(json!({
            "invoice_id": "1",
            "session_started": "2024-01-02T00:00:00Z",
        }))];
        let cols = columns(&invoices, &sessions);

        let latency = intake_latency(&invoices, &sessions, &cols)
            .into_available()
            .unwrap();
        let labels: Vec<&str> = latency.buckets.iter().map(|b| b.bucket.as_str()).collect();
        assert_eq!(labels, LATENCY_BUCKETS);
        // 24 hours → "6h+".
        assert_eq!(latency.buckets.last().unwrap().count, 1);
    }

    #[test]
    fn test_intake_latency_empty_unavailable() {
        let result = intake_latency(&[], &[], &ColumnMap::default());
        assert_eq!(result, Insight::Unavailable(SkipReason::EmptyInput));
    }

    // ── review_friction ───────────────────────────────────────────────────────

    #[test]
    fn test_review_friction_splits_by_error_presence() {
        let with_err = json!({"errors": ["E1"], "ignored_errors": []}).to_string();
        let clean = json!({"errors": [], "ignored_errors": []}).to_string();
        let invoices = vec![
            record(json!({"id": "1", "state_management": with_err})),
            record(json!({"id": "2", "state_management": clean})),
        ];
        let sessions = vec![
            record(json!({"invoice_id": "1", "engaged_duration_seconds": 600.0})),
            record(json!({"invoice_id": "2", "engaged_duration_seconds": 120.0})),
            record(json!({"invoice_id": "2", "engaged_duration_seconds": 60.0})),
        ];
        let cols = columns(&invoices, &sessions);

        let friction = review_friction(&invoices, &sessions, &cols)
            .into_available()
            .unwrap();
        assert_eq!(friction.with_errors_count, 1);
        assert_eq!(friction.without_errors_count, 1);
        assert!((friction.with_errors_minutes - 10.0).abs() < 1e-9);
        assert!((friction.without_errors_minutes - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_review_friction_skips_zero_engagement() {
        let invoices = vec![record(json!({"id": "1"}))];
        let sessions = vec![record(json!({
            "invoice_id": "1",
            "engaged_duration_seconds": 0.0,
        }))];
        let cols = columns(&invoices, &sessions);

        let friction = review_friction(&invoices, &sessions, &cols)
            .into_available()
            .unwrap();
        assert_eq!(friction.with_errors_count, 0);
        assert_eq!(friction.without_errors_count, 0);
        assert_eq!(friction.without_errors_minutes, 0.0);
    }

    #[test]
    fn test_review_friction_ignored_errors_count_as_clean() {
        let ignored_only = json!({"errors": [], "ignored_errors": ["E1"]}).to_string();
        let invoices = vec![record(json!({"id": "1", "state_management": ignored_only}))];
        let sessions = vec![record(json!({
            "invoice_id": "1",
            "engaged_duration_seconds": 60.0,
        }))];
        let cols = columns(&invoices, &sessions);

        let friction = review_friction(&invoices, &sessions, &cols)
            .into_available()
            .unwrap();
        assert_eq!(friction.with_errors_count, 0);
        assert_eq!(friction.without_errors_count, 1);
    }

    // ── touchless_rate ────────────────────────────────────────────────────────

    #[test]
    fn test_touchless_rate_counts_flags() {
        let invoices = vec![
            record(json!({"id": 1, "auto_approved": true})),
            record(json!({"id": 2, "auto_approved": false})),
            record(json!({"id": 3, "auto_approved": 1})),
            record(json!({"id": 4})),
        ];
        let cols = columns(&invoices, &[]);
        let rate = touchless_rate(&invoices, &cols);

        assert_eq!(rate.touchless, 2);
        assert_eq!(rate.manual, 2);
        assert!((rate.percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_touchless_rate_empty_is_zero() {
        let rate = touchless_rate(&[], &ColumnMap::default());
        assert_eq!(rate.touchless, 0);
        assert_eq!(rate.manual, 0);
        assert_eq!(rate.percentage, 0.0);
    }

    // ── efficiency_killers ────────────────────────────────────────────────────

    #[test]
    fn test_efficiency_killers_aggregates_sessions() {
        let with_err = json!({"errors": ["E1"], "ignored_errors": []}).to_string();
        let invoices = vec![
            record(json!({"id": "1", "state_management": with_err})),
            record(json!({"id": "2"})),
        ];
        let sessions = vec![
            record(json!({"invoice_id": "1", "duration_seconds": 100.0, "idle_count": 2})),
            record(json!({"invoice_id": "1", "duration_seconds": 50.0, "idle_count": 1})),
            record(json!({"invoice_id": "2", "duration_seconds": 30.0, "idle_count": 0})),
        ];
        let cols = columns(&invoices, &sessions);

        let rows = efficiency_killers(&invoices, &sessions, &cols)
            .into_available()
            .unwrap();
        assert_eq!(rows.len(), 2);
        let first = rows.iter().find(|r| r.invoice_id == "1").unwrap();
        assert_eq!(first.total_duration_seconds, 150.0);
        assert_eq!(first.session_count, 2);
        assert_eq!(first.idle_count, 3.0);
        assert!(first.has_errors);
        let second = rows.iter().find(|r| r.invoice_id == "2").unwrap();
        assert!(!second.has_errors);
    }

    #[test]
    fn test_efficiency_killers_drops_zero_duration() {
        let invoices = vec![record(json!({"id": "1"}))];
        let sessions = vec![record(json!({"invoice_id": "1", "duration_seconds": 0.0}))];
        let cols = columns(&invoices, &sessions);

        let rows = efficiency_killers(&invoices, &sessions, &cols)
            .into_available()
            .unwrap();
        assert!(rows.is_empty());
    }

    // ── reconciliation_by_month ───────────────────────────────────────────────

    #[test]
    fn test_reconciliation_groups_by_month_and_status() {
        let line_items = vec![
            record(json!({"created_at": "2024-01-10", "reconciliation_status": "Reconciled"})),
            record(json!({"created_at": "2024-01-20", "reconciliation_status": "Pending"})),
            record(json!({"created_at": "2024-02-01", "reconciliation_status": "Failed"})),
            record(json!({"created_at": "2024-02-02", "reconciliation_status": "Reconciled"})),
            record(json!({"created_at": "2024-02-03", "reconciliation_status": "Disputed"})),
        ];
        let months = reconciliation_by_month(&line_items, &ColumnMap::default());

        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2024-01");
        assert_eq!(months[0].reconciled, 1);
        assert_eq!(months[0].pending, 1);
        assert_eq!(months[0].failed, 0);
        assert_eq!(months[1].month, "2024-02");
        assert_eq!(months[1].failed, 1);
        assert_eq!(months[1].other.get("Disputed"), Some(&1));
    }

    #[test]
    fn test_reconciliation_missing_status_is_unknown() {
        let line_items = vec![record(json!({"created_at": "2024-01-10"}))];
        let months = reconciliation_by_month(&line_items, &ColumnMap::default());
        assert_eq!(months[0].other.get("Unknown"), Some(&1));
    }

    #[test]
    fn test_reconciliation_unparseable_dates_skipped() {
        let line_items = vec![
            record(json!({"created_at": "nope", "reconciliation_status": "Pending"})),
        ];
        assert!(reconciliation_by_month(&line_items, &ColumnMap::default()).is_empty());
    }

    #[test]
    fn test_reconciliation_empty_is_empty() {
        assert!(reconciliation_by_month(&[], &ColumnMap::default()).is_empty());
    }
}
