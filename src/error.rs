//! Error types for the reconciliation pipeline.
//!
//! Only structural failures surface as errors: unreadable input, an
//! exhausted encoding probe, or a failed report write. Data-level problems
//! (bad lines, unbalanced vouchers) are logged and skipped instead.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors that can abort a reconciliation run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Failed to open or read an input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write a CSV report
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Every encoding in the probe order failed to decode the input
    #[error("could not decode {path} with any supported encoding (first undecodable byte at offset {offset})")]
    Encoding { path: String, offset: usize },

    /// Bad command line
    #[error("{0}\nUsage: sie-reconcile --year <YYYY> <file.se>... [--opening <amount>] [--report <out.csv>] [--exceptions <out.csv>] [--summary <out.csv>]")]
    Usage(String),
}
