use std::ops::Range;

use wm::Marker;
use wm::span::{MarkerId, Span};

use crate::error::ProviderError;
use crate::provider::MarkerProvider;

#[derive(Debug, Clone)]
struct Entry {
    id: MarkerId,
    name: String,
    start: usize,
    end: usize,
}

/// An error note left on the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub range: Range<usize>,
    pub message: String,
}

/// A marker provider over plain offsets, standing in for a real host.
///
/// Content is modelled only by its length. Markers are listed in creation
/// order; renaming keeps a marker's position in that order and its id.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    name: String,
    length: usize,
    next_id: u64,
    markers: Vec<Entry>,
    annotations: Vec<Annotation>,
    renames: usize,
}

impl MemoryDocument {
    pub fn new(name: impl Into<String>, length: usize) -> Self {
        MemoryDocument {
            name: name.into(),
            length,
            next_id: 1,
            markers: Vec::new(),
            annotations: Vec::new(),
            renames: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current marker names in creation order.
    pub fn names(&self) -> Vec<String> {
        self.markers.iter().map(|m| m.name.clone()).collect()
    }

    pub fn marker(&self, name: &str) -> Option<Marker> {
        self.markers
            .iter()
            .find(|m| m.name == name)
            .map(|m| Marker::new(m.id, m.name.clone(), m.start, m.end))
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Number of renames performed so far.
    pub fn renames(&self) -> usize {
        self.renames
    }

    /// Insert `len` units of content at `at`. Markers that start after `at`
    /// move; markers whose range includes `at` grow.
    pub fn insert_text(&mut self, at: usize, len: usize) -> Result<(), ProviderError> {
        if at > self.length {
            return Err(ProviderError::OutOfBounds {
                start: at,
                end: at,
                length: self.length,
            });
        }
        for m in &mut self.markers {
            if m.start > at {
                m.start += len;
            }
            if m.end >= at {
                m.end += len;
            }
        }
        self.length += len;
        Ok(())
    }

    /// Delete content. Markers lying entirely inside the range are deleted
    /// with it; the rest shrink or move.
    pub fn delete_range(&mut self, range: Range<usize>) -> Result<(), ProviderError> {
        self.check_range(&range)?;
        if range.is_empty() {
            return Ok(());
        }
        let removed = range.end - range.start;
        self.markers
            .retain(|m| !(m.start >= range.start && m.end <= range.end));
        let shift = |pos: usize| {
            if pos >= range.end {
                pos - removed
            } else if pos > range.start {
                range.start
            } else {
                pos
            }
        };
        for m in &mut self.markers {
            m.start = shift(m.start);
            m.end = shift(m.end);
        }
        self.length -= removed;
        Ok(())
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), ProviderError> {
        if range.start > range.end || range.end > self.length {
            return Err(ProviderError::OutOfBounds {
                start: range.start,
                end: range.end,
                length: self.length,
            });
        }
        Ok(())
    }

    fn unique_name(&self, wanted: &str, skip: Option<MarkerId>) -> String {
        let taken = |name: &str| {
            self.markers
                .iter()
                .any(|m| m.name == name && Some(m.id) != skip)
        };
        if !taken(wanted) {
            return wanted.to_string();
        }
        (1..)
            .map(|n| format!("{} {}", wanted, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| wanted.to_string())
    }
}

impl MarkerProvider for MemoryDocument {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn list_markers(&self) -> Vec<Marker> {
        self.markers
            .iter()
            .map(|m| Marker::new(m.id, m.name.clone(), m.start, m.end))
            .collect()
    }

    fn create_marker(&mut self, name: &str, range: Range<usize>) -> Result<MarkerId, ProviderError> {
        self.check_range(&range)?;
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        let name = self.unique_name(name, None);
        self.markers.push(Entry {
            id,
            name,
            start: range.start,
            end: range.end,
        });
        Ok(id)
    }

    fn rename_marker(&mut self, old_name: &str, new_name: &str) -> Result<String, ProviderError> {
        let index = self
            .markers
            .iter()
            .position(|m| m.name == old_name)
            .ok_or_else(|| ProviderError::UnknownMarker(old_name.to_string()))?;
        let actual = self.unique_name(new_name, Some(self.markers[index].id));
        self.markers[index].name = actual.clone();
        self.renames += 1;
        Ok(actual)
    }

    fn delete_marker(&mut self, id: MarkerId) -> Result<(), ProviderError> {
        let index = self
            .markers
            .iter()
            .position(|m| m.id == id)
            .ok_or(ProviderError::UnknownId(id))?;
        self.markers.remove(index);
        Ok(())
    }

    fn span_is_live(&self, span: &Span) -> bool {
        self.markers.iter().any(|m| m.id == span.anchor)
    }

    fn annotate_error(&mut self, span: &Span, message: &str) {
        self.annotations.push(Annotation {
            range: span.range(),
            message: message.to_string(),
        });
    }
}
