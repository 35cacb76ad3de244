pub mod command;
pub mod config;
pub mod parser;
pub mod span;

use crate::span::{MarkerId, Span};

/// A named anchor over host content, as enumerated by the host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Host-assigned identity, stable across renames.
    pub id: MarkerId,
    /// The full marker name, including any disambiguating suffix.
    pub name: String,
    /// The content range the marker currently covers.
    pub span: Span,
}

impl Marker {
    pub fn new(id: MarkerId, name: impl Into<String>, start: usize, end: usize) -> Self {
        Marker {
            id,
            name: name.into(),
            span: Span::new(id, start, end),
        }
    }
}
