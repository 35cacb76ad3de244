use std::ops::Range;

use wm::Marker;
use wm::span::{MarkerId, Span};

use crate::error::ProviderError;

/// The host document, as far as the interpreter is concerned: a set of
/// named markers over content.
///
/// Implementations own identity: a marker keeps its [`MarkerId`] across
/// renames, so spans stay live when the interpreter rewrites a name.
pub trait MarkerProvider {
    /// Human-readable document name for diagnostics.
    fn display_name(&self) -> String;

    /// All markers with their current spans.
    fn list_markers(&self) -> Vec<Marker>;

    fn create_marker(&mut self, name: &str, range: Range<usize>) -> Result<MarkerId, ProviderError>;

    /// Rename a marker. The host may disambiguate the name; the returned
    /// name is the one actually in use.
    fn rename_marker(&mut self, old_name: &str, new_name: &str) -> Result<String, ProviderError>;

    fn delete_marker(&mut self, id: MarkerId) -> Result<(), ProviderError>;

    /// False once the anchoring marker is gone.
    fn span_is_live(&self, span: &Span) -> bool;

    /// Leave a visible error note at `span`.
    fn annotate_error(&mut self, _span: &Span, _message: &str) {}
}
