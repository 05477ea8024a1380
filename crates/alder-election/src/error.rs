//! Error types surfaced on the election event surface.

use alder_ensemble::EnsembleError;
use snafu::Snafu;

/// Faults delivered to the owner through [`ElectionEvent::Error`].
///
/// [`ElectionEvent::Error`]: crate::ElectionEvent::Error
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum ElectionError {
    /// A fault reported by the ensemble, surfaced verbatim.
    #[snafu(display("ensemble fault: {source}"))]
    Ensemble {
        /// The underlying ensemble error.
        source: EnsembleError,
    },

    /// The ensemble returned a sequence node whose name carries no
    /// parseable sequence suffix. The candidate cannot be ranked.
    #[snafu(display("candidate node '{path}' has no parseable sequence suffix"))]
    UnparseableCandidate {
        /// The path the ensemble returned.
        path: String,
    },

    /// The requested operation needs a live session and none is held.
    #[snafu(display("no live session for {operation}"))]
    NotConnected {
        /// Description of the refused operation.
        operation: String,
    },
}

impl From<EnsembleError> for ElectionError {
    fn from(source: EnsembleError) -> Self {
        ElectionError::Ensemble { source }
    }
}

/// Rejections from path and prefix validation at construction time.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum PathError {
    /// The election root is not `/` plus a single `[A-Za-z0-9_-]+` segment.
    #[snafu(display("invalid election root '{value}'"))]
    InvalidElectionRoot {
        /// The rejected value.
        value: String,
    },

    /// The candidate prefix is not `[A-Za-z0-9_-]+`.
    #[snafu(display("invalid candidate prefix '{value}'"))]
    InvalidCandidatePrefix {
        /// The rejected value.
        value: String,
    },
}
