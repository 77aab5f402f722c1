//! Histogram-style distributions and generic table summaries.
//!
//! Everything here buckets already-loaded rows: session durations into
//! fixed time buckets, per-entity counts into count buckets, invoice
//! amounts into dollar bands, plus the schema-agnostic category / status /
//! daily summaries the table browser renders for any table.

use std::collections::BTreeMap;

use insight_core::coerce::{self, TimestampParser};
use insight_core::models::{Insight, Record, SkipReason};
use insight_core::schema::{ColumnMap, ColumnRole};
use serde::{Deserialize, Serialize};

// ── Output types ──────────────────────────────────────────────────────────────

/// One histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub bucket: String,
    pub count: u64,
}

/// One month of the invoice trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthCount {
    /// `YYYY-MM`.
    pub month: String,
    pub count: u64,
}

/// One category of a categorical breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: u64,
}

/// One day of the record-count trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCount {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub count: u64,
}

/// Headline figures for the whole dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetOverview {
    pub total_invoices: usize,
    /// Sum of the amount column, 0 when no amount column is mapped.
    pub total_amount: f64,
    /// Distinct participant ids, 0 when no participant column is mapped.
    pub distinct_participants: usize,
}

// ── Time buckets ──────────────────────────────────────────────────────────────

const TIME_BUCKETS: &[&str] = &["0-30s", "30-60s", "1-5m", "5-10m", "10-30m", "30m+"];

fn time_bucket(seconds: f64) -> &'static str {
    if seconds < 30.0 {
        "0-30s"
    } else if seconds < 60.0 {
        "30-60s"
    } else if seconds < 300.0 {
        "1-5m"
    } else if seconds < 600.0 {
        "5-10m"
    } else if seconds < 1800.0 {
        "10-30m"
    } else {
        "30m+"
    }
}

/// Bucket a duration column of the session records.
///
/// Every bucket is always present, zero counts included, so the three
/// duration charts stay visually aligned.  Missing or non-numeric values
/// count as 0 seconds.
pub fn time_distribution(sessions: &[Record], column: Option<&str>) -> Vec<BucketCount> {
    let mut counts: BTreeMap<&str, u64> = TIME_BUCKETS.iter().map(|b| (*b, 0)).collect();
    if let Some(column) = column {
        for session in sessions {
            let seconds = coerce::number_or_zero(session.get(column));
            *counts.get_mut(time_bucket(seconds)).expect("known bucket") += 1;
        }
    }
    TIME_BUCKETS
        .iter()
        .map(|bucket| BucketCount {
            bucket: bucket.to_string(),
            count: counts[bucket],
        })
        .collect()
}

// ── Count buckets ─────────────────────────────────────────────────────────────

const COUNT_BUCKETS: &[&str] = &["1", "2", "3-5", "6-10", "11+"];

fn count_bucket(count: u64) -> &'static str {
    match count {
        1 => "1",
        2 => "2",
        3..=5 => "3-5",
        6..=10 => "6-10",
        _ => "11+",
    }
}

/// Bucket the per-id occurrence counts of `id_column`, dropping empty
/// buckets but keeping the fixed bucket order.
fn count_distribution(records: &[Record], id_column: &str) -> Vec<BucketCount> {
    let mut per_id: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let Some(id) = coerce::id_of(record.get(id_column)) else {
            continue;
        };
        *per_id.entry(id).or_default() += 1;
    }

    let mut buckets: BTreeMap<&str, u64> = BTreeMap::new();
    for count in per_id.values() {
        *buckets.entry(count_bucket(*count)).or_default() += 1;
    }

    COUNT_BUCKETS
        .iter()
        .filter_map(|bucket| {
            buckets.get(bucket).map(|&count| BucketCount {
                bucket: bucket.to_string(),
                count,
            })
        })
        .collect()
}

/// How many view sessions each invoice accumulates.
pub fn sessions_per_invoice(
    sessions: &[Record],
    columns: &ColumnMap,
) -> Insight<Vec<BucketCount>> {
    if sessions.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(id_col) = columns.column(ColumnRole::SessionInvoiceId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::SessionInvoiceId));
    };
    Insight::Available(count_distribution(sessions, id_col))
}

/// How many invoices each participant accumulates.
pub fn invoices_per_participant(
    invoices: &[Record],
    columns: &ColumnMap,
) -> Insight<Vec<BucketCount>> {
    if invoices.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(participant_col) = columns.column(ColumnRole::ParticipantId) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::ParticipantId));
    };
    Insight::Available(count_distribution(invoices, participant_col))
}

// ── Amount buckets ────────────────────────────────────────────────────────────

const AMOUNT_BUCKETS: &[&str] = &[
    "$0-$300",
    "$300-$1k",
    "$1k-$5k",
    "$5k-$10k",
    "$10k-$20k",
    "$20k+",
];

fn amount_bucket(amount: f64) -> &'static str {
    if amount < 300.0 {
        "$0-$300"
    } else if amount < 1000.0 {
        "$300-$1k"
    } else if amount < 5000.0 {
        "$1k-$5k"
    } else if amount < 10_000.0 {
        "$5k-$10k"
    } else if amount < 20_000.0 {
        "$10k-$20k"
    } else {
        "$20k+"
    }
}

/// Dollar-band histogram of the invoice amount column; empty bands are
/// dropped.
pub fn amount_distribution(
    invoices: &[Record],
    columns: &ColumnMap,
) -> Insight<Vec<BucketCount>> {
    if invoices.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(amount_col) = columns.column(ColumnRole::Amount) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::Amount));
    };

    let mut buckets: BTreeMap<&str, u64> = BTreeMap::new();
    for invoice in invoices {
        let amount = coerce::number_or_zero(invoice.get(amount_col));
        *buckets.entry(amount_bucket(amount)).or_default() += 1;
    }

    Insight::Available(
        AMOUNT_BUCKETS
            .iter()
            .filter_map(|bucket| {
                buckets.get(bucket).map(|&count| BucketCount {
                    bucket: bucket.to_string(),
                    count,
                })
            })
            .collect(),
    )
}

// ── Trends and overview ───────────────────────────────────────────────────────

/// Invoices per calendar month of the invoice-date column, ascending.
pub fn monthly_trend(invoices: &[Record], columns: &ColumnMap) -> Insight<Vec<MonthCount>> {
    if invoices.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(date_col) = columns.column(ColumnRole::InvoiceDate) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::InvoiceDate));
    };

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for invoice in invoices {
        let Some(ts) = invoice.get(date_col).and_then(|v| TimestampParser::parse(v)) else {
            continue;
        };
        *counts.entry(ts.format("%Y-%m").to_string()).or_default() += 1;
    }

    Insight::Available(
        counts
            .into_iter()
            .map(|(month, count)| MonthCount { month, count })
            .collect(),
    )
}

/// Headline figures: invoice count, summed amount, distinct participants.
pub fn dataset_overview(invoices: &[Record], columns: &ColumnMap) -> DatasetOverview {
    let total_amount = columns
        .column(ColumnRole::Amount)
        .map(|col| {
            invoices
                .iter()
                .map(|invoice| coerce::number_or_zero(invoice.get(col)))
                .sum()
        })
        .unwrap_or(0.0);

    let distinct_participants = columns
        .column(ColumnRole::ParticipantId)
        .map(|col| {
            invoices
                .iter()
                .filter_map(|invoice| coerce::id_of(invoice.get(col)))
                .collect::<std::collections::BTreeSet<String>>()
                .len()
        })
        .unwrap_or(0);

    DatasetOverview {
        total_invoices: invoices.len(),
        total_amount,
        distinct_participants,
    }
}

// ── Generic table summaries ───────────────────────────────────────────────────

/// Value rendered for a missing or null categorical cell.
const UNKNOWN: &str = "Unknown";

fn categorical_value(record: &Record, column: &str) -> String {
    match record.get(column) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Null) | None => UNKNOWN.to_string(),
        Some(other) => other.to_string().trim_matches('"').to_string(),
    }
}

/// Count the values of the first string column that is neither an id nor a
/// description; top 10 by count descending.
pub fn category_breakdown(records: &[Record]) -> Vec<CategoryCount> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    let Some(column) = first
        .iter()
        .find(|(name, value)| {
            let lower = name.to_lowercase();
            value.is_string() && !lower.contains("id") && !lower.contains("description")
        })
        .map(|(name, _)| name.clone())
    else {
        return Vec::new();
    };

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        *counts.entry(categorical_value(record, &column)).or_default() += 1;
    }

    let mut breakdown: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(name, count)| CategoryCount { name, count })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count).then(a.name.cmp(&b.name)));
    breakdown.truncate(10);
    breakdown
}

/// Count the values of the first status-like column (`status`, `state` or
/// `type` in the name); first six distinct values in encounter order.
pub fn status_breakdown(records: &[Record]) -> Vec<CategoryCount> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    let Some(column) = first
        .keys()
        .find(|name| {
            let lower = name.to_lowercase();
            lower.contains("status") || lower.contains("state") || lower.contains("type")
        })
        .cloned()
    else {
        return Vec::new();
    };

    let mut order: Vec<String> = Vec::new();
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let value = categorical_value(record, &column);
        if !counts.contains_key(&value) {
            order.push(value.clone());
        }
        *counts.entry(value).or_default() += 1;
    }

    order
        .into_iter()
        .take(6)
        .map(|name| {
            let count = counts[&name];
            CategoryCount { name, count }
        })
        .collect()
}

/// Record counts per day of the first date-like column (`date`, `created`
/// or `time` in the name); the most recent 30 days with records.
pub fn daily_counts(records: &[Record]) -> Vec<DayCount> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    let Some(column) = first
        .keys()
        .find(|name| {
            let lower = name.to_lowercase();
            lower.contains("date") || lower.contains("created") || lower.contains("time")
        })
        .cloned()
    else {
        return Vec::new();
    };

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let Some(ts) = record.get(&column).and_then(|v| TimestampParser::parse(v)) else {
            continue;
        };
        *counts.entry(ts.format("%Y-%m-%d").to_string()).or_default() += 1;
    }

    let days: Vec<DayCount> = counts
        .into_iter()
        .map(|(date, count)| DayCount { date, count })
        .collect();
    let skip = days.len().saturating_sub(30);
    days.into_iter().skip(skip).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().expect("object").clone()
    }

    fn session_with_duration(seconds: f64) -> Record {
        record(json!({"invoice_id": "x", "duration_seconds": seconds}))
    }

    // ── time_distribution ─────────────────────────────────────────────────────

    #[test]
    fn test_time_distribution_bucket_edges() {
        let sessions = vec![
            session_with_duration(0.0),     // 0-30s
            session_with_duration(29.9),    // 0-30s
            session_with_duration(30.0),    // 30-60s
            session_with_duration(59.9),    // 30-60s
            session_with_duration(60.0),    // 1-5m
            session_with_duration(299.0),   // 1-5m
            session_with_duration(300.0),   // 5-10m
            session_with_duration(599.0),   // 5-10m
            session_with_duration(600.0),   // 10-30m
            session_with_duration(1799.0),  // 10-30m
            session_with_duration(1800.0),  // 30m+
            session_with_duration(90000.0), // 30m+
        ];
        let dist = time_distribution(&sessions, Some("duration_seconds"));

        let labels: Vec<&str> = dist.iter().map(|b| b.bucket.as_str()).collect();
        assert_eq!(labels, TIME_BUCKETS);
        assert!(dist.iter().all(|b| b.count == 2));
    }

    #[test]
    fn test_time_distribution_empty_keeps_all_buckets() {
        let dist = time_distribution(&[], Some("duration_seconds"));
        assert_eq!(dist.len(), TIME_BUCKETS.len());
        assert!(dist.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_time_distribution_missing_value_counts_as_zero_seconds() {
        let sessions = vec![record(json!({"invoice_id": "x"}))];
        let dist = time_distribution(&sessions, Some("duration_seconds"));
        assert_eq!(dist[0].bucket, "0-30s");
        assert_eq!(dist[0].count, 1);
    }

    #[test]
    fn test_time_distribution_no_column_is_all_zero() {
        let sessions = vec![session_with_duration(100.0)];
        let dist = time_distribution(&sessions, None);
        assert!(dist.iter().all(|b| b.count == 0));
    }

    // ── sessions_per_invoice ──────────────────────────────────────────────────

    #[test]
    fn test_sessions_per_invoice_buckets() {
        let mut sessions = Vec::new();
        // inv-a: 1 session, inv-b: 2, inv-c: 4, inv-d: 12.
        for (id, n) in [("a", 1), ("b", 2), ("c", 4), ("d", 12)] {
            for _ in 0..n {
                sessions.push(record(json!({"invoice_id": id})));
            }
        }
        let columns = ColumnMap::discover(&[], &sessions);
        let dist = sessions_per_invoice(&sessions, &columns)
            .into_available()
            .unwrap();

        let get = |bucket: &str| dist.iter().find(|b| b.bucket == bucket).map(|b| b.count);
        assert_eq!(get("1"), Some(1));
        assert_eq!(get("2"), Some(1));
        assert_eq!(get("3-5"), Some(1));
        assert_eq!(get("6-10"), None); // empty buckets are dropped
        assert_eq!(get("11+"), Some(1));
    }

    #[test]
    fn test_sessions_per_invoice_empty_unavailable() {
        let result = sessions_per_invoice(&[], &ColumnMap::default());
        assert_eq!(result, Insight::Unavailable(SkipReason::EmptyInput));
    }

    // ── invoices_per_participant ──────────────────────────────────────────────

    #[test]
    fn test_invoices_per_participant_counts() {
        let invoices = vec![
            record(json!({"id": 1, "participant_id": "p1"})),
            record(json!({"id": 2, "participant_id": "p1"})),
            record(json!({"id": 3, "participant_id": "p2"})),
        ];
        let columns = ColumnMap::discover(&invoices, &[]);
        let dist = invoices_per_participant(&invoices, &columns)
            .into_available()
            .unwrap();

        // p1 has 2 invoices, p2 has 1.
        assert_eq!(
            dist,
            vec![
                BucketCount {
                    bucket: "1".into(),
                    count: 1
                },
                BucketCount {
                    bucket: "2".into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_invoices_per_participant_missing_column_unavailable() {
        let invoices = vec![record(json!({"id": 1}))];
        let columns = ColumnMap::discover(&invoices, &[]);
        let result = invoices_per_participant(&invoices, &columns);
        assert_eq!(
            result,
            Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::ParticipantId))
        );
    }

    // ── amount_distribution ───────────────────────────────────────────────────

    #[test]
    fn test_amount_distribution_bands() {
        let invoices = vec![
            record(json!({"id": 1, "amount": 100.0})),
            record(json!({"id": 2, "amount": 500.0})),
            record(json!({"id": 3, "amount": 2500.0})),
            record(json!({"id": 4, "amount": 25000.0})),
        ];
        let columns = ColumnMap::discover(&invoices, &[]);
        let dist = amount_distribution(&invoices, &columns)
            .into_available()
            .unwrap();

        let labels: Vec<&str> = dist.iter().map(|b| b.bucket.as_str()).collect();
        assert_eq!(labels, vec!["$0-$300", "$300-$1k", "$1k-$5k", "$20k+"]);
        assert!(dist.iter().all(|b| b.count == 1));
    }

    // ── monthly_trend ─────────────────────────────────────────────────────────

    #[test]
    fn test_monthly_trend_sorted_ascending() {
        let invoices = vec![
            record(json!({"id": 1, "invoice_date": "2024-03-10"})),
            record(json!({"id": 2, "invoice_date": "2024-01-05"})),
            record(json!({"id": 3, "invoice_date": "2024-03-22"})),
        ];
        let columns = ColumnMap::discover(&invoices, &[]);
        let trend = monthly_trend(&invoices, &columns).into_available().unwrap();

        assert_eq!(
            trend,
            vec![
                MonthCount {
                    month: "2024-01".into(),
                    count: 1
                },
                MonthCount {
                    month: "2024-03".into(),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn test_monthly_trend_skips_unparseable_dates() {
        let invoices = vec![
            record(json!({"id": 1, "invoice_date": "2024-03-10"})),
            record(json!({"id": 2, "invoice_date": "soon"})),
        ];
        let columns = ColumnMap::discover(&invoices, &[]);
        let trend = monthly_trend(&invoices, &columns).into_available().unwrap();
        assert_eq!(trend.len(), 1);
    }

    // ── dataset_overview ──────────────────────────────────────────────────────

    #[test]
    fn test_dataset_overview() {
        let invoices = vec![
            record(json!({"id": 1, "participant_id": "p1", "amount": 100.0})),
            record(json!({"id": 2, "participant_id": "p1", "amount": 250.5})),
            record(json!({"id": 3, "participant_id": "p2", "amount": 50.0})),
        ];
        let columns = ColumnMap::discover(&invoices, &[]);
        let overview = dataset_overview(&invoices, &columns);

        assert_eq!(overview.total_invoices, 3);
        assert!((overview.total_amount - 400.5).abs() < 1e-9);
        assert_eq!(overview.distinct_participants, 2);
    }

    #[test]
    fn test_dataset_overview_without_mapped_columns() {
        let invoices = vec![record(json!({"id": 1}))];
        let columns = ColumnMap::discover(&invoices, &[]);
        let overview = dataset_overview(&invoices, &columns);
        assert_eq!(overview.total_invoices, 1);
        assert_eq!(overview.total_amount, 0.0);
        assert_eq!(overview.distinct_participants, 0);
    }

    // ── category_breakdown ────────────────────────────────────────────────────

    #[test]
    fn test_category_breakdown_picks_first_plain_string_column() {
        let records = vec![
            record(json!({"id": 1, "description": "x", "provider_name": "Acme"})),
            record(json!({"id": 2, "description": "y", "provider_name": "Acme"})),
            record(json!({"id": 3, "description": "z", "provider_name": "Besta"})),
        ];
        let breakdown = category_breakdown(&records);
        assert_eq!(breakdown[0].name, "Acme");
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[1].name, "Besta");
    }

    #[test]
    fn test_category_breakdown_null_becomes_unknown() {
        let records = vec![
            record(json!({"name": "A"})),
            record(json!({"name": null})),
        ];
        let breakdown = category_breakdown(&records);
        assert!(breakdown.iter().any(|c| c.name == "Unknown"));
    }

    #[test]
    fn test_category_breakdown_no_candidate_column() {
        let records = vec![record(json!({"id": 1, "amount": 2.0}))];
        assert!(category_breakdown(&records).is_empty());
    }

    // ── status_breakdown ──────────────────────────────────────────────────────

    #[test]
    fn test_status_breakdown_keeps_encounter_order() {
        let records = vec![
            record(json!({"status": "Pending"})),
            record(json!({"status": "Approved"})),
            record(json!({"status": "Pending"})),
            record(json!({"status": "Rejected"})),
        ];
        let breakdown = status_breakdown(&records);
        let names: Vec<&str> = breakdown.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Pending", "Approved", "Rejected"]);
        assert_eq!(breakdown[0].count, 2);
    }

    #[test]
    fn test_status_breakdown_caps_at_six() {
        let records: Vec<Record> = (0..10)
            .map(|i| record(json!({"status": format!("S{i}")})))
            .collect();
        assert_eq!(status_breakdown(&records).len(), 6);
    }

    // ── daily_counts ──────────────────────────────────────────────────────────

    #[test]
    fn test_daily_counts_groups_and_sorts() {
        let records = vec![
            record(json!({"created_at": "2024-01-02T10:00:00Z"})),
            record(json!({"created_at": "2024-01-01T09:00:00Z"})),
            record(json!({"created_at": "2024-01-02T18:00:00Z"})),
        ];
        let days = daily_counts(&records);
        assert_eq!(
            days,
            vec![
                DayCount {
                    date: "2024-01-01".into(),
                    count: 1
                },
                DayCount {
                    date: "2024-01-02".into(),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn test_daily_counts_keeps_last_thirty() {
        let spread: Vec<Record> = (1..=40)
            .map(|day| record(json!({"created_at": format!("2024-01-{day:02}T00:00:00Z")})))
            .collect();
        // January only has 31 days; days 32+ fail to parse and are skipped,
        // so 31 dates remain and the oldest one is trimmed to keep 30.
        let days = daily_counts(&spread);
        assert_eq!(days.len(), 30);
        assert_eq!(days[0].date, "2024-01-02");
    }
}
