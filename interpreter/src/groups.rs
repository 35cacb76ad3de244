use std::collections::BTreeSet;

use wm::Marker;
use wm::parser::{MarkerName, Parser};
use wm::span::{MarkerId, Relation, Span, relate};

use crate::tree::NodeId;

/// What produced a group element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementSource {
    Command(NodeId),
    /// A `<label> GROUPS( ... )` marker and the name its groups were read from.
    Region { marker: MarkerId, name: String },
}

/// A span tagged with visibility groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupElement {
    pub source: ElementSource,
    pub span: Span,
    pub groups: BTreeSet<String>,
}

/// Flat, position-sorted list of group-bearing elements.
///
/// Nesting here is about visibility only and is independent of the command
/// tree: an element inside another inherits the outer element's groups,
/// and elements on identical spans share their groups.
#[derive(Debug, Default)]
pub struct GroupIndex {
    elements: Vec<GroupElement>,
}

impl GroupIndex {
    pub fn new() -> Self {
        GroupIndex::default()
    }

    pub fn elements(&self) -> &[GroupElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Effective groups of a command, including inherited ones.
    pub fn groups_of(&self, node: NodeId) -> Option<&BTreeSet<String>> {
        self.elements
            .iter()
            .find(|e| e.source == ElementSource::Command(node))
            .map(|e| &e.groups)
    }

    /// Add an element, exchanging groups with every known element it shares
    /// a span relation with. Returns the number of comparisons made.
    pub fn insert(&mut self, mut element: GroupElement) -> usize {
        let comparisons = self.elements.len();
        // Inherit first so that what the new element passes on below
        // already includes its own ancestors' groups.
        for existing in &self.elements {
            match relate(&existing.span, &element.span) {
                Relation::AContainsB | Relation::Equal => {
                    element.groups.extend(existing.groups.iter().cloned());
                }
                _ => {}
            }
        }
        for existing in &mut self.elements {
            match relate(&existing.span, &element.span) {
                Relation::BContainsA | Relation::Equal => {
                    existing.groups.extend(element.groups.iter().cloned());
                }
                _ => {}
            }
        }

        let key = element.span.order_key();
        let position = self.elements.partition_point(|e| e.span.order_key() <= key);
        self.elements.insert(position, element);
        comparisons
    }

    pub fn remove_command(&mut self, node: NodeId) {
        self.elements
            .retain(|e| e.source != ElementSource::Command(node));
    }

    /// Move command elements to their commands' current spans.
    pub fn refresh_command_spans(&mut self, span_of: impl Fn(NodeId) -> Option<Span>) {
        let mut moved = false;
        for element in &mut self.elements {
            let ElementSource::Command(node) = element.source else {
                continue;
            };
            if let Some(span) = span_of(node).filter(|span| *span != element.span) {
                element.span = span;
                moved = true;
            }
        }
        if moved {
            self.resort();
        }
    }

    /// Sync region elements with the host's markers. Returns whether any
    /// region was added or removed.
    pub fn rescan_regions(&mut self, snapshot: &[Marker], is_live: impl Fn(&Span) -> bool) -> bool {
        let before = self.elements.len();
        self.elements
            .retain(|e| !matches!(e.source, ElementSource::Region { .. }) || is_live(&e.span));
        let mut changed = self.elements.len() != before;

        for marker in snapshot {
            let known = self.elements.iter().position(|e| {
                matches!(&e.source, ElementSource::Region { marker: id, .. } if *id == marker.id)
            });
            if let Some(index) = known {
                let element = &mut self.elements[index];
                if matches!(&element.source, ElementSource::Region { name, .. } if *name == marker.name) {
                    element.span = marker.span;
                    continue;
                }
                tracing::debug!(marker = %marker.name, "visibility region was renamed");
                self.elements.remove(index);
                changed = true;
            }
            let source = ElementSource::Region {
                marker: marker.id,
                name: marker.name.clone(),
            };
            match Parser::new(&marker.name, 0).parse() {
                MarkerName::Region(Ok(groups)) => {
                    tracing::debug!(marker = %marker.name, ?groups, "visibility region");
                    self.insert(GroupElement {
                        source,
                        span: marker.span,
                        groups,
                    });
                    changed = true;
                }
                MarkerName::Region(Err(error)) => {
                    tracing::warn!(marker = %marker.name, error = %error.message, "ignoring malformed region");
                }
                MarkerName::Command(_) | MarkerName::Plain => {}
            }
        }

        self.resort();
        changed
    }

    fn resort(&mut self) {
        self.elements.sort_by_key(|e| e.span.order_key());
    }
}
