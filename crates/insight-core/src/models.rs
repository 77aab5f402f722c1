use serde::{Deserialize, Serialize};

use crate::schema::ColumnRole;

/// A single database row as exported: an ordered map from column name to a
/// loosely-typed JSON value.  Ordering is preserved so that "first column"
/// discovery heuristics behave the same as in the source system.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The JSON blob stored in an invoice's state-management column.
///
/// Both lists hold opaque error-code strings.  `errors` are still active on
/// the invoice; `ignored_errors` were reviewed and dismissed by an operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateManagement {
    /// Error codes currently requiring attention.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Error codes an operator chose to dismiss.
    #[serde(default)]
    pub ignored_errors: Vec<String>,
}

impl StateManagement {
    /// Whether either list carries at least one code.
    pub fn has_codes(&self) -> bool {
        !self.errors.is_empty() || !self.ignored_errors.is_empty()
    }

    /// Active and ignored codes combined, active first.
    pub fn combined(&self) -> Vec<String> {
        let mut all = self.errors.clone();
        all.extend(self.ignored_errors.iter().cloned());
        all
    }
}

/// Weighting applied to the normalized features of the efficiency score.
///
/// Two schemes exist in the wild, so the caller must pick one explicitly;
/// there is deliberately no `Default` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of normalized accumulated active time.
    pub active_time: f64,
    /// Weight of normalized session count.
    pub session_count: f64,
    /// Weight of normalized active-error count.
    pub active_errors: f64,
    /// Weight of normalized ignored-error count.
    pub ignored_errors: f64,
}

impl ScoreWeights {
    /// The current production weighting: 0.5 / 0.2 / 0.2 / 0.1.
    pub fn standard() -> Self {
        Self {
            active_time: 0.5,
            session_count: 0.2,
            active_errors: 0.2,
            ignored_errors: 0.1,
        }
    }

    /// The older weighting that disregards ignored errors: 0.6 / 0.2 / 0.2.
    pub fn legacy() -> Self {
        Self {
            active_time: 0.6,
            session_count: 0.2,
            active_errors: 0.2,
            ignored_errors: 0.0,
        }
    }

    /// Look up a preset by its CLI name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::standard()),
            "legacy" => Some(Self::legacy()),
            _ => None,
        }
    }

    /// Sum of all four weights — the upper bound of any score.
    pub fn total(&self) -> f64 {
        self.active_time + self.session_count + self.active_errors + self.ignored_errors
    }
}

/// Per-invoice figures accumulated from view sessions and the invoice's
/// state-management blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceMetrics {
    /// Total active viewing time across all sessions, in seconds.
    pub active_seconds: f64,
    /// Number of view sessions recorded against the invoice.
    pub session_count: u32,
    /// Active error codes from the state-management blob.
    pub error_codes: Vec<String>,
    /// Ignored error codes from the state-management blob.
    pub ignored_error_codes: Vec<String>,
}

impl InvoiceMetrics {
    /// Active and ignored codes combined, active first.
    pub fn all_error_codes(&self) -> Vec<String> {
        let mut all = self.error_codes.clone();
        all.extend(self.ignored_error_codes.iter().cloned());
        all
    }
}

/// One ranked entry of the efficiency-score output.
///
/// Higher scores mean a *worse* processing experience; rank 1 is the worst
/// invoice in the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredInvoice {
    /// Invoice identifier as found in the source records.
    pub invoice_id: String,
    /// 1-based position after sorting by score descending.
    pub rank: u32,
    /// Weighted normalized score in `[0, weights.total()]`.
    pub score: f64,
    /// Total active viewing time in seconds.
    pub active_seconds: f64,
    /// Number of view sessions.
    pub session_count: u32,
    /// Active error codes.
    pub error_codes: Vec<String>,
    /// Ignored error codes.
    pub ignored_error_codes: Vec<String>,
}

// ── Insight ───────────────────────────────────────────────────────────────────

/// Why an analysis section could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum SkipReason {
    /// A column the analysis depends on is not mapped for this dataset.
    MissingColumn(ColumnRole),
    /// One of the input record sets is empty.
    EmptyInput,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingColumn(role) => write!(f, "no column mapped for {role}"),
            SkipReason::EmptyInput => write!(f, "input records are empty"),
        }
    }
}

/// Outcome of a single analysis section.
///
/// The engine never fails an analysis over dataset shape: a section that
/// cannot be computed is reported as [`Insight::Unavailable`] with the
/// reason, so callers can tell "no data" apart from "no signal".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Insight<T> {
    /// The section was computed (possibly with an empty result).
    Available(T),
    /// The section could not be computed for this dataset.
    Unavailable(SkipReason),
}

impl<T> Insight<T> {
    /// `true` when the section was computed.
    pub fn is_available(&self) -> bool {
        matches!(self, Insight::Available(_))
    }

    /// Borrow the payload when available.
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Insight::Available(value) => Some(value),
            Insight::Unavailable(_) => None,
        }
    }

    /// Consume, yielding the payload when available.
    pub fn into_available(self) -> Option<T> {
        match self {
            Insight::Available(value) => Some(value),
            Insight::Unavailable(_) => None,
        }
    }

    /// Map the payload, carrying any skip reason through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Insight<U> {
        match self {
            Insight::Available(value) => Insight::Available(f(value)),
            Insight::Unavailable(reason) => Insight::Unavailable(reason),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
