//! Display formatting for the text summary report.

/// Group an unsigned integer with thousands separators.
///
/// # Examples
///
/// ```
/// use insight_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234), "1,234");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Format a monetary amount as a dollar string with two decimal places.
///
/// # Examples
///
/// ```
/// use insight_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(0.0), "$0.00");
/// ```
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = format_count(cents / 100);
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${whole}.{:02}", cents % 100)
}

/// Render a second count as a compact human-readable duration.
///
/// # Examples
///
/// ```
/// use insight_core::formatting::format_duration_seconds;
///
/// assert_eq!(format_duration_seconds(42.0), "42s");
/// assert_eq!(format_duration_seconds(150.0), "2m 30s");
/// assert_eq!(format_duration_seconds(3720.0), "1h 2m");
/// ```
pub fn format_duration_seconds(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    if total < 60 {
        return format!("{total}s");
    }
    if total < 3600 {
        return format!("{}m {}s", total / 60, total % 60);
    }
    format!("{}h {}m", total / 3600, (total % 3600) / 60)
}

/// Format a fraction of 100 with one decimal place and a percent sign.
///
/// # Examples
///
/// ```
/// use insight_core::formatting::format_percent;
///
/// assert_eq!(format_percent(99.95), "100.0%");
/// assert_eq!(format_percent(12.34), "12.3%");
/// ```
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Format a score with three decimal places.
pub fn format_score(value: f64) -> String {
    format!("{:.3}", value)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
