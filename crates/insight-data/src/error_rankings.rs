//! Error-code rankings: frequency, average score impact and cumulative
//! time cost, plus the combined priority set.
//!
//! The three rankings are independent aggregations over the same invoice
//! population; the priority set unions their top-3 codes and optionally
//! enriches each code from the exported error catalogue.

use std::collections::BTreeMap;

use insight_core::coerce;
use insight_core::models::{Insight, Record, ScoreWeights, SkipReason};
use insight_core::schema::{ColumnMap, ColumnRole};
use serde::{Deserialize, Serialize};

use crate::scoring::{build_invoice_metrics, score_entries};

// ── Output types ──────────────────────────────────────────────────────────────

/// How often an error code occurs across active and ignored lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrequency {
    pub error_code: String,
    pub count: u64,
}

/// Mean efficiency score of the invoices carrying an error code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorImpact {
    pub error_code: String,
    pub avg_score: f64,
    /// Number of invoices the mean was taken over.
    pub count: u64,
}

/// Total active time sunk into invoices carrying an error code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorTimeCost {
    pub error_code: String,
    pub total_minutes: f64,
    pub total_seconds: f64,
}

/// One code of the priority set: a top-3 entry of at least one ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityError {
    pub error_code: String,
    pub is_frequent: bool,
    pub is_high_impact: bool,
    pub is_high_time_cost: bool,
    /// Matching catalogue row, when the catalogue carries the code.
    pub details: Option<Record>,
}

// ── Frequency ─────────────────────────────────────────────────────────────────

/// Count every occurrence of each error code (active and ignored combined)
/// and keep the `top_n` most frequent.
pub fn error_frequency(
    invoices: &[Record],
    columns: &ColumnMap,
    top_n: usize,
) -> Insight<Vec<ErrorFrequency>> {
    if invoices.is_empty() {
        return Insight::Unavailable(SkipReason::EmptyInput);
    }
    let Some(state_col) = columns.column(ColumnRole::StateManagement) else {
        return Insight::Unavailable(SkipReason::MissingColumn(ColumnRole::StateManagement));
    };

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for invoice in invoices {
        let Some(state) = invoice.get(state_col).and_then(coerce::parse_state_blob) else {
            continue;
        };
        for code in state.combined() {
            *counts.entry(code).or_default() += 1;
        }
    }

    let mut ranking: Vec<ErrorFrequency> = counts
        .into_iter()
        .map(|(error_code, count)| ErrorFrequency { error_code, count })
        .collect();
    ranking.sort_by(|a, b| b.count.cmp(&a.count).then(a.error_code.cmp(&b.error_code)));
    ranking.truncate(top_n);
    Insight::Available(ranking)
}

// ── Average impact ────────────────────────────────────────────────────────────

/// Mean efficiency score per error code over the *full* scored population
/// (not just the ranked top slice); keep the `top_n` worst codes.
pub fn error_impact(
    invoices: &[Record],
    sessions: &[Record],
    columns: &ColumnMap,
    weights: &ScoreWeights,
    top_n: usize,
) -> Insight<Vec<ErrorImpact>> {
    build_invoice_metrics(invoices, sessions, columns).map(|table| {
        let scores = score_entries(&table, weights);

        let mut sums: BTreeMap<String, (f64, u64)> = BTreeMap::new();
        for (invoice_id, score) in &scores {
            let Some(metrics) = table.entries.get(invoice_id) else {
                continue;
            };
            for code in metrics.all_error_codes() {
                let slot = sums.entry(code).or_insert((0.0, 0));
                slot.0 += score;
                slot.1 += 1;
            }
        }

        let mut ranking: Vec<ErrorImpact> = sums
            .into_iter()
            .map(|(error_code, (total, count))| ErrorImpact {
                error_code,
                avg_score: total / count as f64,
                count,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.avg_score
                .partial_cmp(&a.avg_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.error_code.cmp(&b.error_code))
        });
        ranking.truncate(top_n);
        ranking
    })
}

// ── Cumulative time cost ──────────────────────────────────────────────────────

/// Total active seconds accumulated by invoices carrying each error code;
/// keep the `top_n` most expensive, reported in minutes.
pub fn error_time_cost(
    invoices: &[Record],
    sessions: &[Record],
    columns: &ColumnMap,
    top_n: usize,
) -> Insight<Vec<ErrorTimeCost>> {
    build_invoice_metrics(invoices, sessions, columns).map(|table| {
        let mut seconds: BTreeMap<String, f64> = BTreeMap::new();
        for metrics in table.entries.values() {
            for code in metrics.all_error_codes() {
                *seconds.entry(code).or_default() += metrics.active_seconds;
            }
        }

        let mut ranking: Vec<ErrorTimeCost> = seconds
            .into_iter()
            .map(|(error_code, total_seconds)| ErrorTimeCost {
                error_code,
                total_minutes: total_seconds / 60.0,
                total_seconds,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.total_seconds
                .partial_cmp(&a.total_seconds)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.error_code.cmp(&b.error_code))
        });
        ranking.truncate(top_n);
        ranking
    })
}

// ── Priority set ──────────────────────────────────────────────────────────────

/// The catalogue column names a code may be stored under, checked in order.
const CATALOGUE_ID_COLUMNS: &[&str] = &["error_code", "code", "id", "error_id"];

/// Union of the top-3 codes from each ranking, annotated with the rankings
/// each code appeared in and enriched from the catalogue when possible.
///
/// The catalogue is optional: with an empty catalogue the set is still
/// produced, just without details.
pub fn priority_errors(
    frequency: &[ErrorFrequency],
    impact: &[ErrorImpact],
    time_cost: &[ErrorTimeCost],
    catalogue: &[Record],
) -> Vec<PriorityError> {
    let top_frequent: Vec<&str> = frequency.iter().take(3).map(|e| e.error_code.as_str()).collect();
    let top_impact: Vec<&str> = impact.iter().take(3).map(|e| e.error_code.as_str()).collect();
    let top_time: Vec<&str> = time_cost.iter().take(3).map(|e| e.error_code.as_str()).collect();

    // Union, preserving first-seen order across the three lists.
    let mut codes: Vec<&str> = Vec::new();
    for code in top_frequent.iter().chain(&top_impact).chain(&top_time) {
        if !codes.contains(code) {
            codes.push(*code);
        }
    }

    codes
        .into_iter()
        .map(|code| PriorityError {
            error_code: code.to_string(),
            is_frequent: top_frequent.contains(&code),
            is_high_impact: top_impact.contains(&code),
            is_high_time_cost: top_time.contains(&code),
            details: find_catalogue_entry(catalogue, code).cloned(),
        })
        .collect()
}

/// First catalogue row whose id column matches `code` exactly.
fn find_catalogue_entry<'a>(catalogue: &'a [Record], code: &str) -> Option<&'a Record> {
    catalogue.iter().find(|entry| {
        CATALOGUE_ID_COLUMNS
            .iter()
            .any(|col| coerce::id_of(entry.get(*col)).as_deref() == Some(code))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().expect("object").clone()
    }

    fn invoice(id: &str, errors: &[&str], ignored: &[&str]) -> Record {
        let state = serde_json::json!({
            "errors": errors,
            "ignored_errors": ignored,
        })
        .to_string();
        record(json!({"id": id, "amount": 1.0, "state_management": state}))
    }

    fn session(invoice_id: &str, active_seconds: f64) -> Record {
        record(json!({
            "invoice_id": invoice_id,
            "active_duration_seconds": active_seconds,
        }))
    }

    fn columns(invoices: &[Record], sessions: &[Record]) -> ColumnMap {
        ColumnMap::discover(invoices, sessions)
    }

    // ── error_frequency ───────────────────────────────────────────────────────

    #[test]
    fn test_frequency_counts_active_and_ignored() {
        let invoices = vec![
            invoice("1", &["E1", "E2"], &["E1"]),
            invoice("2", &["E1"], &[]),
        ];
        let cols = columns(&invoices, &[]);
        let ranking = error_frequency(&invoices, &cols, 15)
            .into_available()
            .unwrap();

        assert_eq!(ranking[0].error_code, "E1");
        assert_eq!(ranking[0].count, 3);
        assert_eq!(ranking[1].error_code, "E2");
        assert_eq!(ranking[1].count, 1);
    }

    #[test]
    fn test_frequency_truncates_to_top_n() {
        let invoices: Vec<Record> = (0..20)
            .map(|i| {
                let code = format!("E{i:02}");
                invoice(&i.to_string(), &[code.as_str()], &[])
            })
            .collect();
        let cols = columns(&invoices, &[]);
        let ranking = error_frequency(&invoices, &cols, 15)
            .into_available()
            .unwrap();
        assert_eq!(ranking.len(), 15);
    }

    #[test]
    fn test_frequency_skips_malformed_blobs() {
        let invoices = vec![
            record(json!({"id": "1", "state_management": "{bad"})),
            invoice("2", &["E1"], &[]),
        ];
        let cols = columns(&invoices, &[]);
        let ranking = error_frequency(&invoices, &cols, 15)
            .into_available()
            .unwrap();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].count, 1);
    }

    #[test]
    fn test_frequency_empty_invoices_unavailable() {
        let result = error_frequency(&[], &ColumnMap::default(), 15);
        assert_eq!(result, Insight::Unavailable(SkipReason::EmptyInput));
    }

    // ── error_impact ──────────────────────────────────────────────────────────

    #[test]
    fn test_impact_uses_full_population_mean() {
        // inv-1 carries E1 and has the highest score; inv-2 also carries E1
        // with a lower score.  E1's impact is the mean of both.
        let invoices = vec![
            invoice("1", &["E1"], &[]),
            invoice("2", &["E1"], &[]),
            invoice("3", &[], &[]),
        ];
        let sessions = vec![
            session("1", 200.0),
            session("2", 100.0),
            session("3", 50.0),
        ];
        let cols = columns(&invoices, &sessions);

        let ranking = error_impact(&invoices, &sessions, &cols, &ScoreWeights::standard(), 15)
            .into_available()
            .unwrap();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].error_code, "E1");
        assert_eq!(ranking[0].count, 2);

        // Scores: inv-1 = 1.0*0.5 + 1.0*0.2 + 1.0*0.2 = 0.9
        //         inv-2 = 0.5*0.5 + 1.0*0.2 + 1.0*0.2 = 0.65
        let expected = (0.9 + 0.65) / 2.0;
        assert!(
            (ranking[0].avg_score - expected).abs() < 1e-9,
            "avg = {}",
            ranking[0].avg_score
        );
    }

    #[test]
    fn test_impact_sorted_by_avg_score_descending() {
        // E_BAD only on the worst invoice, E_MILD only on the mildest.
        let invoices = vec![invoice("1", &["E_BAD"], &[]), invoice("2", &["E_MILD"], &[])];
        let sessions = vec![session("1", 300.0), session("2", 30.0)];
        let cols = columns(&invoices, &sessions);

        let ranking = error_impact(&invoices, &sessions, &cols, &ScoreWeights::standard(), 15)
            .into_available()
            .unwrap();
        assert_eq!(ranking[0].error_code, "E_BAD");
        assert_eq!(ranking[1].error_code, "E_MILD");
        assert!(ranking[0].avg_score >= ranking[1].avg_score);
    }

    #[test]
    fn test_impact_empty_sessions_unavailable() {
        let invoices = vec![invoice("1", &["E1"], &[])];
        let result = error_impact(
            &invoices,
            &[],
            &ColumnMap::default(),
            &ScoreWeights::standard(),
            15,
        );
        assert_eq!(result, Insight::Unavailable(SkipReason::EmptyInput));
    }

    // ── error_time_cost ───────────────────────────────────────────────────────

    #[test]
    fn test_time_cost_sums_active_time_in_minutes() {
        let invoices = vec![invoice("1", &["E1"], &[]), invoice("2", &["E1", "E2"], &[])];
        let sessions = vec![
            session("1", 120.0),
            session("1", 60.0),
            session("2", 300.0),
        ];
        let cols = columns(&invoices, &sessions);

        let ranking = error_time_cost(&invoices, &sessions, &cols, 15)
            .into_available()
            .unwrap();

        // E1: (120 + 60) + 300 = 480s = 8 minutes; E2: 300s = 5 minutes.
        assert_eq!(ranking[0].error_code, "E1");
        assert!((ranking[0].total_minutes - 8.0).abs() < 1e-9);
        assert!((ranking[0].total_seconds - 480.0).abs() < 1e-9);
        assert_eq!(ranking[1].error_code, "E2");
        assert!((ranking[1].total_minutes - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_cost_error_without_sessions_counts_zero_time() {
        let invoices = vec![invoice("9", &["E9"], &[])];
        let sessions = vec![session("1", 60.0)];
        let cols = columns(&invoices, &sessions);

        let ranking = error_time_cost(&invoices, &sessions, &cols, 15)
            .into_available()
            .unwrap();
        let e9 = ranking.iter().find(|e| e.error_code == "E9").unwrap();
        assert_eq!(e9.total_seconds, 0.0);
    }

    // ── priority_errors ───────────────────────────────────────────────────────

    fn freq(code: &str, count: u64) -> ErrorFrequency {
        ErrorFrequency {
            error_code: code.to_string(),
            count,
        }
    }

    fn impact(code: &str, avg: f64) -> ErrorImpact {
        ErrorImpact {
            error_code: code.to_string(),
            avg_score: avg,
            count: 1,
        }
    }

    fn time(code: &str, minutes: f64) -> ErrorTimeCost {
        ErrorTimeCost {
            error_code: code.to_string(),
            total_minutes: minutes,
            total_seconds: minutes * 60.0,
        }
    }

    #[test]
    fn test_priority_unions_top_three_of_each() {
        let frequency = vec![freq("A", 9), freq("B", 8), freq("C", 7), freq("D", 6)];
        let impacts = vec![impact("C", 0.9), impact("E", 0.8)];
        let times = vec![time("F", 100.0)];

        let priority = priority_errors(&frequency, &impacts, &times, &[]);
        let codes: Vec<&str> = priority.iter().map(|p| p.error_code.as_str()).collect();

        // D is rank 4 by frequency and in no other top-3, so it is absent.
        assert_eq!(codes, vec!["A", "B", "C", "E", "F"]);
    }

    #[test]
    fn test_priority_annotates_source_rankings() {
        let frequency = vec![freq("A", 9)];
        let impacts = vec![impact("A", 0.9)];
        let times = vec![time("B", 10.0)];

        let priority = priority_errors(&frequency, &impacts, &times, &[]);
        let a = priority.iter().find(|p| p.error_code == "A").unwrap();
        assert!(a.is_frequent && a.is_high_impact && !a.is_high_time_cost);
        let b = priority.iter().find(|p| p.error_code == "B").unwrap();
        assert!(!b.is_frequent && !b.is_high_impact && b.is_high_time_cost);
    }

    #[test]
    fn test_priority_matches_catalogue_by_alternate_columns() {
        let catalogue = vec![
            record(json!({"code": "A", "description": "invalid ABN"})),
            record(json!({"error_id": "B", "description": "missing dates"})),
        ];
        let frequency = vec![freq("A", 5), freq("B", 4)];

        let priority = priority_errors(&frequency, &[], &[], &catalogue);
        let a = priority.iter().find(|p| p.error_code == "A").unwrap();
        assert_eq!(
            a.details.as_ref().unwrap()["description"],
            json!("invalid ABN")
        );
        let b = priority.iter().find(|p| p.error_code == "B").unwrap();
        assert_eq!(
            b.details.as_ref().unwrap()["description"],
            json!("missing dates")
        );
    }

    #[test]
    fn test_priority_without_catalogue_has_no_details() {
        let frequency = vec![freq("A", 5)];
        let priority = priority_errors(&frequency, &[], &[], &[]);
        assert_eq!(priority.len(), 1);
        assert!(priority[0].details.is_none());
    }

    #[test]
    fn test_priority_empty_rankings_is_empty() {
        assert!(priority_errors(&[], &[], &[], &[]).is_empty());
    }
}
