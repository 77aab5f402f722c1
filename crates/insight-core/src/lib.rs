//! Core domain types for the invoice-insight analytics engine.
//!
//! Holds the shared record and metrics models, the semantic column mapping,
//! value-coercion helpers for loosely-typed records, numeric statistics,
//! the crate-wide error type, CLI settings and display formatting.

pub mod coerce;
pub mod error;
pub mod formatting;
pub mod models;
pub mod schema;
pub mod settings;
pub mod stats;
