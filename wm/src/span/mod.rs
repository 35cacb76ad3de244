use std::fmt;
use std::ops::Range;

/// Host-assigned marker identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A content range anchored by a marker.
///
/// Spans are compared, never edited. Whether a span is still live is a
/// question for the host (see `MarkerProvider::span_is_live`), which answers
/// it by `anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub anchor: MarkerId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(anchor: MarkerId, start: usize, end: usize) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Span { anchor, start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Sort key for document order: earlier start first, wider span first on ties.
    pub fn order_key(&self) -> (usize, std::cmp::Reverse<usize>) {
        (self.start, std::cmp::Reverse(self.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Geometric relation of span B with respect to span A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// B ends at or before A starts.
    BBeforeA,
    /// B starts at or after A ends.
    BAfterA,
    /// B covers A and is strictly larger.
    BContainsA,
    /// A covers B and is strictly larger.
    AContainsB,
    /// Identical ranges.
    Equal,
    /// The ranges intersect without either containing the other.
    OverlapInvalid,
}

impl Relation {
    pub fn is_containment(self) -> bool {
        matches!(
            self,
            Relation::AContainsB | Relation::BContainsA | Relation::Equal
        )
    }

    /// The same relation seen from B's side.
    pub fn inverse(self) -> Relation {
        match self {
            Relation::BBeforeA => Relation::BAfterA,
            Relation::BAfterA => Relation::BBeforeA,
            Relation::BContainsA => Relation::AContainsB,
            Relation::AContainsB => Relation::BContainsA,
            Relation::Equal => Relation::Equal,
            Relation::OverlapInvalid => Relation::OverlapInvalid,
        }
    }
}

/// Classify how `b` lies relative to `a`.
///
/// Containment is checked before adjacency, so a zero-width span sitting on
/// the boundary of a wider span counts as contained by it. Two non-empty
/// spans that merely touch are before/after each other.
pub fn relate(a: &Span, b: &Span) -> Relation {
    if a.start == b.start && a.end == b.end {
        return Relation::Equal;
    }
    if b.start <= a.start && a.end <= b.end {
        return Relation::BContainsA;
    }
    if a.start <= b.start && b.end <= a.end {
        return Relation::AContainsB;
    }
    if b.end <= a.start {
        return Relation::BBeforeA;
    }
    if a.end <= b.start {
        return Relation::BAfterA;
    }
    Relation::OverlapInvalid
}
