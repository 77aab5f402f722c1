//! Data ingestion and analytics engine for invoice-insight.
//!
//! Responsible for discovering and loading exported dataset files, scoring
//! invoice processing efficiency, ranking error codes, correlating invoice
//! fields against the efficiency score and running the top-level analysis
//! pipeline.

pub mod analysis;
pub mod correlation;
pub mod distributions;
pub mod error_rankings;
pub mod operational;
pub mod reader;
pub mod scoring;

pub use insight_core as core;
