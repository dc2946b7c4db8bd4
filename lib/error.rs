//! Error types shared across the crate.
//!
//! Forbidden density-matrix addresses are *not* errors: address lookups return
//! `None` and the kernel builders skip them.

use thiserror::Error;

/// Result alias for fallible operations in this crate.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures reported by a rate-function oracle.
#[derive(Debug, Error)]
pub enum RateError {
    /// An integral did not reach the requested tolerance within the allowed
    /// number of refinement levels.
    #[error("rate integral failed to converge after {levels} levels (last change {delta:e})")]
    NonConvergent { levels: usize, delta: f64 },

    /// The oracle was handed a combination of arguments it cannot evaluate.
    #[error("invalid rate-function input: {0}")]
    InvalidInput(String),
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Inconsistent array lengths between the sector table and the supplied
    /// energies, tunneling amplitudes, or lead parameters.
    #[error("dimension mismatch in {what}: expected {expected}, got {got}")]
    Dimension { what: &'static str, expected: usize, got: usize },

    /// The normalization row selector lies outside the rows of the requested
    /// kernel.
    #[error("normalization row {row} out of range (must be < {bound})")]
    NormRow { row: usize, bound: usize },

    /// A packed real vector has the wrong length.
    #[error("packed density-matrix vector has length {got}, expected {expected}")]
    PackedLength { expected: usize, got: usize },

    /// A state was listed in more than one sector or lies outside the
    /// eigenbasis.
    #[error("state {state} cannot be placed in charge sector {charge}")]
    Sector { state: usize, charge: usize },

    /// Rate tables built for one approach were handed to another.
    #[error("rate tables do not belong to the {approach} approach")]
    TablesMismatch { approach: &'static str },

    /// Failure propagated unmodified from the rate-function oracle.
    #[error(transparent)]
    Oracle(#[from] RateError),

    #[error("malformed configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The linear solver could not produce a stationary state.
    #[error("stationary solve failed: {0}")]
    Solver(String),
}
