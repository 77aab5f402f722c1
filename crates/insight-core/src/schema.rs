//! Semantic column mapping for loosely-typed dataset records.
//!
//! The exported tables carry no schema, so every analysis needs to know
//! which concrete column plays which semantic role.  Callers either supply
//! a [`ColumnMap`] explicitly or let [`ColumnMap::discover`] reproduce the
//! original dashboard's substring heuristics against the first record of
//! each table.

use serde::{Deserialize, Serialize};

use crate::models::Record;

// ── ColumnRole ────────────────────────────────────────────────────────────────

/// The semantic roles an analysis may need a concrete column for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Invoice identifier on a session record.
    SessionInvoiceId,
    /// Active viewing time of one session, in seconds.
    ActiveDuration,
    /// Total wall-clock duration of one session, in seconds.
    TotalDuration,
    /// Engaged (interacting) time of one session, in seconds.
    EngagedDuration,
    /// Number of idle events within one session.
    IdleCount,
    /// Timestamp at which a session started.
    SessionStarted,
    /// Invoice identifier on an invoice record.
    InvoiceId,
    /// Participant identifier on an invoice record.
    ParticipantId,
    /// Monetary amount of an invoice.
    Amount,
    /// Invoice date used for trend grouping.
    InvoiceDate,
    /// Creation timestamp of an invoice or line item.
    CreatedAt,
    /// JSON state-management blob on an invoice record.
    StateManagement,
    /// Auto-approval flag on an invoice record.
    AutoApproved,
    /// Reconciliation status on a line-item record.
    ReconciliationStatus,
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnRole::SessionInvoiceId => "session invoice id",
            ColumnRole::ActiveDuration => "active duration",
            ColumnRole::TotalDuration => "total duration",
            ColumnRole::EngagedDuration => "engaged duration",
            ColumnRole::IdleCount => "idle count",
            ColumnRole::SessionStarted => "session started",
            ColumnRole::InvoiceId => "invoice id",
            ColumnRole::ParticipantId => "participant id",
            ColumnRole::Amount => "amount",
            ColumnRole::InvoiceDate => "invoice date",
            ColumnRole::CreatedAt => "created at",
            ColumnRole::StateManagement => "state management",
            ColumnRole::AutoApproved => "auto approved",
            ColumnRole::ReconciliationStatus => "reconciliation status",
        };
        f.write_str(name)
    }
}

// ── ColumnMap ─────────────────────────────────────────────────────────────────

/// Maps each [`ColumnRole`] to a concrete column name, where known.
///
/// Roles left `None` make the analyses depending on them degrade to
/// `Insight::Unavailable` instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub session_invoice_id: Option<String>,
    pub active_duration: Option<String>,
    pub total_duration: Option<String>,
    pub engaged_duration: Option<String>,
    pub idle_count: Option<String>,
    pub session_started: Option<String>,
    pub invoice_id: Option<String>,
    pub participant_id: Option<String>,
    pub amount: Option<String>,
    pub invoice_date: Option<String>,
    pub created_at: Option<String>,
    pub state_management: Option<String>,
    pub auto_approved: Option<String>,
    pub reconciliation_status: Option<String>,
}

impl Default for ColumnMap {
    /// The column names the invoice-management export has always used.
    ///
    /// Identifier, participant, amount and date columns vary per dataset
    /// shape and stay unmapped until discovered or supplied.
    fn default() -> Self {
        Self {
            session_invoice_id: None,
            active_duration: Some("active_duration_seconds".to_string()),
            total_duration: Some("duration_seconds".to_string()),
            engaged_duration: Some("engaged_duration_seconds".to_string()),
            idle_count: Some("idle_count".to_string()),
            session_started: Some("session_started".to_string()),
            invoice_id: None,
            participant_id: None,
            amount: None,
            invoice_date: None,
            created_at: Some("created_at".to_string()),
            state_management: Some("state_management".to_string()),
            auto_approved: Some("auto_approved".to_string()),
            reconciliation_status: Some("reconciliation_status".to_string()),
        }
    }
}

impl ColumnMap {
    /// Discover the dataset-dependent roles from the first record of each
    /// table, keeping the well-known defaults for the rest.
    ///
    /// The heuristics mirror the original dashboard:
    /// * session invoice id — first session column containing both
    ///   `"invoice"` and `"id"` (case-insensitive),
    /// * invoice id — first invoice column containing `"id"`,
    /// * participant id — first invoice column containing `"participant"`
    ///   and `"id"`,
    /// * amount — first numeric invoice column not containing `"id"`,
    /// * invoice date — first invoice column containing `"invoice_date"`.
    pub fn discover(invoices: &[Record], sessions: &[Record]) -> Self {
        let mut map = Self::default();

        if let Some(first) = sessions.first() {
            map.session_invoice_id =
                find_column(first, |name| name.contains("invoice") && name.contains("id"));
        }

        if let Some(first) = invoices.first() {
            map.invoice_id = find_column(first, |name| name.contains("id"));
            map.participant_id =
                find_column(first, |name| name.contains("participant") && name.contains("id"));
            map.invoice_date = find_column(first, |name| name.contains("invoice_date"));
            map.amount = first
                .iter()
                .find(|(name, value)| {
                    value.is_number() && !name.to_lowercase().contains("id")
                })
                .map(|(name, _)| name.clone());
        }

        map
    }

    /// The mapped column for `role`, when known.
    pub fn column(&self, role: ColumnRole) -> Option<&str> {
        let column = match role {
            ColumnRole::SessionInvoiceId => &self.session_invoice_id,
            ColumnRole::ActiveDuration => &self.active_duration,
            ColumnRole::TotalDuration => &self.total_duration,
            ColumnRole::EngagedDuration => &self.engaged_duration,
            ColumnRole::IdleCount => &self.idle_count,
            ColumnRole::SessionStarted => &self.session_started,
            ColumnRole::InvoiceId => &self.invoice_id,
            ColumnRole::ParticipantId => &self.participant_id,
            ColumnRole::Amount => &self.amount,
            ColumnRole::InvoiceDate => &self.invoice_date,
            ColumnRole::CreatedAt => &self.created_at,
            ColumnRole::StateManagement => &self.state_management,
            ColumnRole::AutoApproved => &self.auto_approved,
            ColumnRole::ReconciliationStatus => &self.reconciliation_status,
        };
        column.as_deref()
    }
}

/// First column of `record` whose lower-cased name satisfies `pred`.
fn find_column(record: &Record, pred: impl Fn(&str) -> bool) -> Option<String> {
    record
        .keys()
        .find(|name| pred(&name.to_lowercase()))
        .cloned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
