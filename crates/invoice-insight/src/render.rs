//! Plain-text summary rendering of an [`AnalysisReport`].

use insight_core::formatting::{
    format_count, format_currency, format_duration_seconds, format_percent, format_score,
};
use insight_core::models::Insight;
use insight_data::analysis::AnalysisReport;

/// How many rows of each ranked section the summary prints.
const SUMMARY_ROWS: usize = 10;

/// Render the report as a compact text summary.
pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();

    // ── Overview ──────────────────────────────────────────────────────────────
    out.push_str("Invoice Insight\n");
    out.push_str("===============\n\n");
    out.push_str(&format!(
        "Invoices: {}   Participants: {}   Total value: {}\n",
        format_count(report.overview.total_invoices as u64),
        format_count(report.overview.distinct_participants as u64),
        format_currency(report.overview.total_amount),
    ));
    out.push_str(&format!(
        "Sessions: {}   Line items: {}\n",
        format_count(report.metadata.sessions_processed as u64),
        format_count(report.metadata.line_items_processed as u64),
    ));
    if report.metadata.malformed_state_blobs > 0 {
        out.push_str(&format!(
            "Warning: {} invoices with unreadable state blobs\n",
            report.metadata.malformed_state_blobs
        ));
    }
    out.push('\n');

    // ── Worst invoices ────────────────────────────────────────────────────────
    out.push_str("Worst invoices by efficiency score\n");
    match &report.efficiency {
        Insight::Available(result) => {
            for scored in result.ranked.iter().take(SUMMARY_ROWS) {
                out.push_str(&format!(
                    "  {:>3}. {:<20} score {}  active {}  sessions {}  errors {}\n",
                    scored.rank,
                    scored.invoice_id,
                    format_score(scored.score),
                    format_duration_seconds(scored.active_seconds),
                    scored.session_count,
                    scored.error_codes.len(),
                ));
            }
            if result.population > result.ranked.len() {
                out.push_str(&format!(
                    "  ... {} invoices scored in total\n",
                    format_count(result.population as u64)
                ));
            }
        }
        Insight::Unavailable(reason) => {
            out.push_str(&format!("  unavailable: {reason}\n"));
        }
    }
    out.push('\n');

    // ── Error rankings ────────────────────────────────────────────────────────
    out.push_str("Most frequent errors\n");
    match &report.error_frequency {
        Insight::Available(ranking) => {
            for entry in ranking.iter().take(SUMMARY_ROWS) {
                out.push_str(&format!(
                    "  {:<24} x{}\n",
                    entry.error_code,
                    format_count(entry.count)
                ));
            }
        }
        Insight::Unavailable(reason) => {
            out.push_str(&format!("  unavailable: {reason}\n"));
        }
    }
    out.push('\n');

    out.push_str("Priority errors\n");
    if report.priority_errors.is_empty() {
        out.push_str("  none\n");
    }
    for priority in &report.priority_errors {
        let mut tags: Vec<&str> = Vec::new();
        if priority.is_frequent {
            tags.push("frequent");
        }
        if priority.is_high_impact {
            tags.push("high-impact");
        }
        if priority.is_high_time_cost {
            tags.push("time-cost");
        }
        out.push_str(&format!(
            "  {:<24} [{}]\n",
            priority.error_code,
            tags.join(", ")
        ));
    }
    out.push('\n');

    // ── Correlations ──────────────────────────────────────────────────────────
    out.push_str("Fields correlated with the efficiency score\n");
    match &report.correlations {
        Insight::Available(correlations) if correlations.is_empty() => {
            out.push_str("  none with measurable variance\n");
        }
        Insight::Available(correlations) => {
            for c in correlations {
                out.push_str(&format!("  {:<24} r = {:+.3}\n", c.field, c.coefficient));
            }
        }
        Insight::Unavailable(reason) => {
            out.push_str(&format!("  unavailable: {reason}\n"));
        }
    }
    out.push('\n');

    // ── Operational ───────────────────────────────────────────────────────────
    out.push_str(&format!(
        "Touchless rate: {} ({} touchless / {} manual)\n",
        format_percent(report.touchless_rate.percentage),
        format_count(report.touchless_rate.touchless),
        format_count(report.touchless_rate.manual),
    ));
    if let Insight::Available(latency) = &report.intake_latency {
        out.push_str(&format!(
            "Median intake latency: {}\n",
            format_duration_seconds(latency.median_minutes * 60.0)
        ));
    }
    if let Insight::Available(friction) = &report.review_friction {
        out.push_str(&format!(
            "Review friction: {} engaged with errors vs {} without\n",
            format_duration_seconds(friction.with_errors_minutes * 60.0),
            format_duration_seconds(friction.without_errors_minutes * 60.0),
        ));
    }

    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
