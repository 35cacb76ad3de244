use thiserror::Error;
use wm::span::MarkerId;

/// Failures reported by a marker provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("no marker named '{0}'")]
    UnknownMarker(String),

    #[error("no marker with id {0}")]
    UnknownId(MarkerId),

    #[error("range {start}..{end} lies outside the document (length {length})")]
    OutOfBounds {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("host document error: {0}")]
    Host(String),
}

/// Why an interpretation pass did not complete cleanly.
#[derive(Debug, Error)]
pub enum InterpretError {
    /// Structural rescans kept finding new commands. Fatal for the pass.
    #[error(
        "endless loop while interpreting '{document}': document commands still changing after {iterations} rescans"
    )]
    EndlessLoop { document: String, iterations: usize },

    /// The pass completed, but this many commands failed. Their error state is persisted.
    #[error("{0} document command(s) failed")]
    CommandsFailed(usize),

    #[error("marker provider failed: {0}")]
    Provider(#[from] ProviderError),
}

/// A per-command failure reported by a visitor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct VisitError {
    pub message: String,
}

impl VisitError {
    pub fn new(message: impl Into<String>) -> Self {
        VisitError {
            message: message.into(),
        }
    }
}
