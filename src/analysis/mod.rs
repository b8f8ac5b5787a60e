//! Analysis modules for documents and temperature data.
//!
//! This module provides yearly aggregation of documents and the
//! temperature / economic score correlation.

pub mod aggregator;
pub mod correlator;

pub use aggregator::*;
pub use correlator::*;

use thiserror::Error;

/// Conditions raised by the analysis pipeline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisError {
    /// Nothing left after joining and filtering. Informational.
    #[error("No matching data points found for analysis")]
    NoMatchingData,

    /// One of the correlated series is constant.
    #[error("Correlation undefined: a series has zero deviation")]
    DivisionByZero,
}
