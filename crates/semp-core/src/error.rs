//! Unified error types for the SEMP ecosystem
//!
//! This module provides a common error type [`SempError`] that can represent
//! failures from every stage of a planning run: table loading, scenario-tree
//! validation, model assembly and the solve call. Domain-specific errors are
//! converted to `SempError` at API boundaries.
//!
//! Data and topology errors are fatal at assembly time; no partially built
//! model is ever handed to the solver. Solve-stage errors carry the solver's
//! own diagnosis so callers can distinguish a bad model from a bad call.

use thiserror::Error;

/// Unified error type for all SEMP operations.
#[derive(Error, Debug)]
pub enum SempError {
    /// I/O errors (file access, table directories, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or malformed input tables, out-of-domain indices
    #[error("Data error: {0}")]
    Data(String),

    /// Malformed scenario tree (missing parent, stage inconsistency, ...)
    #[error("Topology error: {0}")]
    Topology(String),

    /// An index outside a declared relation reached a constraint rule that
    /// assumed membership. Always a generator bug, never a data problem.
    #[error("Constraint domain error: {0}")]
    ConstraintDomain(String),

    /// The solver proved the assembled model infeasible
    #[error("Solve failed: model is infeasible: {0}")]
    Infeasible(String),

    /// The solver proved the assembled model unbounded
    #[error("Solve failed: model is unbounded: {0}")]
    Unbounded(String),

    /// The solver hit the caller-supplied time limit
    #[error("Solve aborted: time limit reached: {0}")]
    Timeout(String),

    /// Solver-internal failure reported by the adapter
    #[error("Solver error: {0}")]
    Solver(String),
}

/// Convenience type alias for Results using SempError.
pub type SempResult<T> = Result<T, SempError>;

impl From<String> for SempError {
    fn from(s: String) -> Self {
        SempError::Data(s)
    }
}

impl From<&str> for SempError {
    fn from(s: &str) -> Self {
        SempError::Data(s.to_string())
    }
}
