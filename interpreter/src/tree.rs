use std::collections::{HashMap, HashSet};
use std::fmt;

use wm::Marker;
use wm::command::Command;
use wm::span::{MarkerId, Relation, Span, relate};

/// Index of a node in the tree's arena. Never reused, so it identifies a
/// command across renames of its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    /// `None` only for the synthetic root.
    command: Option<Command>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Structural changes since the last [`CommandTree::take_changes`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeChanges {
    pub inserted: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl TreeChanges {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

/// Where a new command goes relative to one existing sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Before,
    After,
    /// The sibling becomes an ancestor; continue among its children.
    Descend,
    /// The new command takes the sibling as its child.
    Adopt,
    Conflict,
}

/// Containment tree of document commands, derived from marker spans.
///
/// A synthetic root contains everything. Children of every node are kept in
/// document order, and no two siblings overlap.
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<Option<Node>>,
    /// Every live command, by the marker it was parsed from.
    by_marker: HashMap<MarkerId, NodeId>,
    /// Markers seen before that are not commands, with the name they had.
    ignored: HashMap<MarkerId, String>,
    changes: TreeChanges,
    comparisons: usize,
}

impl Default for CommandTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTree {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new() -> Self {
        CommandTree {
            nodes: vec![Some(Node {
                command: None,
                parent: None,
                children: Vec::new(),
            })],
            by_marker: HashMap::new(),
            ignored: HashMap::new(),
            changes: TreeChanges::default(),
            comparisons: 0,
        }
    }

    /// Number of commands, not counting the root.
    pub fn len(&self) -> usize {
        self.by_marker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_marker.is_empty()
    }

    pub fn command(&self, id: NodeId) -> Option<&Command> {
        self.node(id)?.command.as_ref()
    }

    pub fn command_mut(&mut self, id: NodeId) -> Option<&mut Command> {
        self.nodes.get_mut(id.0)?.as_mut()?.command.as_mut()
    }

    /// Parent of a command; [`CommandTree::ROOT`] for top-level commands.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// The command parsed from `marker`, if it is still in the tree.
    pub fn find_marker(&self, marker: MarkerId) -> Option<NodeId> {
        self.by_marker.get(&marker).copied()
    }

    /// Look a command up by its current marker name.
    pub fn find(&self, marker_name: &str) -> Option<NodeId> {
        self.by_marker
            .values()
            .copied()
            .find(|&id| self.command(id).is_some_and(|c| c.marker_name() == marker_name))
    }

    /// Total span comparisons performed by insertions so far.
    pub fn comparisons(&self) -> usize {
        self.comparisons
    }

    pub fn take_changes(&mut self) -> TreeChanges {
        std::mem::take(&mut self.changes)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)?.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)?.as_mut()
    }

    fn children_mut(&mut self, id: NodeId) -> &mut Vec<NodeId> {
        match self.nodes.get_mut(id.0).and_then(Option::as_mut) {
            Some(node) => &mut node.children,
            None => panic!("node {:?} is not in the tree", id),
        }
    }

    fn live_command(&self, id: NodeId) -> &Command {
        match self.command(id) {
            Some(command) => command,
            None => panic!("node {:?} has no command", id),
        }
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Place a command in the tree. Returns the number of span comparisons
    /// it took.
    ///
    /// The walk only descends into a sibling that contains the new command;
    /// siblings the new command contains are moved under it.
    pub fn insert(&mut self, command: Command) -> usize {
        let name = command.marker_name().to_string();
        let marker = command.span().anchor;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            command: Some(command),
            parent: None,
            children: Vec::new(),
        }));

        let mut comparisons = 0;
        let mut parent = Self::ROOT;

        let (position, adopted) = 'descend: loop {
            let mut adopted: Vec<usize> = Vec::new();
            let mut position = None;

            let siblings = self.children(parent).to_vec();
            for (index, &sibling) in siblings.iter().enumerate() {
                comparisons += 1;
                match self.placement(sibling, id) {
                    Placement::After => {}
                    Placement::Before => {
                        position.get_or_insert(index);
                        break;
                    }
                    Placement::Descend if adopted.is_empty() => {
                        parent = sibling;
                        continue 'descend;
                    }
                    Placement::Adopt => {
                        position.get_or_insert(index);
                        adopted.push(index);
                    }
                    Placement::Descend | Placement::Conflict => {
                        self.mark_structural_conflict(id, sibling);
                        break 'descend (self.ordinal_position(parent, id), Vec::new());
                    }
                }
            }

            break (position.unwrap_or(siblings.len()), adopted);
        };

        let moved: Vec<NodeId> = {
            let siblings = self.children_mut(parent);
            let moved = adopted.iter().map(|&i| siblings[i]).collect();
            for &index in adopted.iter().rev() {
                siblings.remove(index);
            }
            siblings.insert(position, id);
            moved
        };
        for &child in &moved {
            if let Some(node) = self.node_mut(child) {
                node.parent = Some(id);
            }
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = Some(parent);
            node.children = moved;
        }

        tracing::debug!(marker = %name, comparisons, "inserted document command");
        self.by_marker.insert(marker, id);
        self.changes.inserted.push(id);
        self.comparisons += comparisons;
        comparisons
    }

    fn placement(&self, existing: NodeId, new: NodeId) -> Placement {
        let a = self.live_command(existing);
        let b = self.live_command(new);
        let placement = match relate(a.span(), b.span()) {
            Relation::BAfterA => Placement::After,
            Relation::BBeforeA => Placement::Before,
            Relation::AContainsB if a.may_have_children() => Placement::Descend,
            Relation::BContainsA if b.may_have_children() => Placement::Adopt,
            // Identical spans: a container wins; between two containers the
            // one seen first stays the ancestor.
            Relation::Equal => match (a.may_have_children(), b.may_have_children()) {
                (true, _) => Placement::Descend,
                (false, true) => Placement::Adopt,
                (false, false) => Placement::Conflict,
            },
            Relation::AContainsB | Relation::BContainsA | Relation::OverlapInvalid => {
                Placement::Conflict
            }
        };

        // Invalid leaves only need a stable slot for their annotation.
        if placement == Placement::Conflict && (a.is_invalid() || b.is_invalid()) {
            return by_start(a.span(), b.span());
        }
        placement
    }

    /// Index among `parent`'s children where `id` goes by start position alone.
    fn ordinal_position(&self, parent: NodeId, id: NodeId) -> usize {
        let start = self.live_command(id).span().start;
        self.children(parent)
            .iter()
            .position(|&c| self.live_command(c).span().start > start)
            .unwrap_or(self.children(parent).len())
    }

    /// Reject the command `id` because it cannot coexist with `other`.
    fn mark_structural_conflict(&mut self, id: NodeId, other: NodeId) {
        let other_name = self.live_command(other).marker_name().to_string();
        let relation = relate(self.live_command(other).span(), self.live_command(id).span());
        let message = match relation {
            Relation::OverlapInvalid => format!("overlaps marker '{}'", other_name),
            Relation::Equal => format!("occupies the same position as marker '{}'", other_name),
            _ => format!("cannot nest with marker '{}'", other_name),
        };
        if let Some(command) = self.command_mut(id) {
            tracing::warn!(
                marker = %command.marker_name(),
                conflict = %other_name,
                "structural conflict between document commands"
            );
            command.reject(message, &other_name);
        }
    }

    // ------------------------------------------------------------------
    // Removal and rescan
    // ------------------------------------------------------------------

    /// Remove a command. Its children take its place under its parent.
    pub fn remove(&mut self, id: NodeId) -> Option<Command> {
        if id == Self::ROOT {
            return None;
        }
        let node = self.nodes.get_mut(id.0)?.take()?;
        let parent = node.parent.unwrap_or(Self::ROOT);

        let siblings = self.children_mut(parent);
        match siblings.iter().position(|&c| c == id) {
            Some(index) => {
                siblings.splice(index..=index, node.children.iter().copied());
            }
            None => siblings.extend(node.children.iter().copied()),
        }
        for &child in &node.children {
            if let Some(child) = self.node_mut(child) {
                child.parent = Some(parent);
            }
        }

        let command = node.command?;
        self.by_marker.remove(&command.span().anchor);
        self.changes.removed.push(id);
        Some(command)
    }

    /// Bring the tree in line with the host's current markers.
    ///
    /// Commands whose span is no longer live are removed; known commands
    /// follow their markers' current positions; markers not seen before
    /// are parsed and inserted. A known marker whose name differs from the
    /// one last recorded for it was edited by the user: its command is
    /// dropped and the new name parsed from scratch. Returns whether the
    /// structure changed.
    pub fn rescan(&mut self, snapshot: &[Marker], is_live: impl Fn(&Span) -> bool) -> bool {
        let mut changed = false;

        let dead: Vec<NodeId> = self
            .by_marker
            .values()
            .copied()
            .filter(|&id| !is_live(self.live_command(id).span()))
            .collect();
        for id in dead {
            if let Some(command) = self.remove(id) {
                tracing::debug!(marker = %command.marker_name(), "document command is gone");
                changed = true;
            }
        }

        let mut fresh: Vec<&Marker> = Vec::new();
        for marker in snapshot {
            let Some(id) = self.find_marker(marker.id) else {
                fresh.push(marker);
                continue;
            };
            let renamed = match self.command_mut(id) {
                Some(command) if command.marker_name() == marker.name => {
                    command.set_span(marker.span);
                    false
                }
                _ => true,
            };
            if renamed {
                if let Some(command) = self.remove(id) {
                    tracing::debug!(from = %command.marker_name(), to = %marker.name, "document command was renamed");
                    changed = true;
                }
                fresh.push(marker);
            }
        }

        let current: HashSet<MarkerId> = snapshot.iter().map(|m| m.id).collect();
        self.ignored.retain(|id, _| current.contains(id));

        for marker in fresh {
            if self.ignored.get(&marker.id) == Some(&marker.name) {
                continue;
            }
            self.ignored.remove(&marker.id);
            match Command::from_marker(marker) {
                Some(command) => {
                    self.insert(command);
                    changed = true;
                }
                None => {
                    self.ignored.insert(marker.id, marker.name.clone());
                }
            }
        }

        changed
    }

    /// Record that the command's marker now has `actual_name`.
    pub fn persisted(&mut self, id: NodeId, actual_name: &str) {
        if let Some(command) = self.command_mut(id) {
            command.mark_persisted(actual_name);
        }
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Pre-order walk over all commands (root excluded). With `reverse`,
    /// each node's children are visited last to first.
    pub fn depth_first(&self, reverse: bool) -> DepthFirst {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeId> = Vec::new();
        push_children(&mut stack, self.children(Self::ROOT), reverse);
        while let Some(id) = stack.pop() {
            order.push(id);
            push_children(&mut stack, self.children(id), reverse);
        }
        DepthFirst {
            order: order.into_iter(),
        }
    }

    /// Depth of a command below the root (top level is 0).
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if parent == Self::ROOT {
                break;
            }
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }
}

fn by_start(a: &Span, b: &Span) -> Placement {
    if b.start < a.start {
        Placement::Before
    } else {
        Placement::After
    }
}

fn push_children(stack: &mut Vec<NodeId>, children: &[NodeId], reverse: bool) {
    if reverse {
        stack.extend(children.iter().copied());
    } else {
        stack.extend(children.iter().rev().copied());
    }
}

/// A materialized traversal order. Finite and not restartable.
#[derive(Debug)]
pub struct DepthFirst {
    order: std::vec::IntoIter<NodeId>,
}

impl Iterator for DepthFirst {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        self.order.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl ExactSizeIterator for DepthFirst {}

impl fmt::Display for CommandTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.depth_first(false) {
            let command = self.live_command(id);
            write!(
                f,
                "{}{} {} {}",
                "  ".repeat(self.depth(id)),
                command.kind().keyword(),
                command.span(),
                command.marker_name()
            )?;
            if command.is_done() {
                write!(f, " [done]")?;
            }
            if command.has_error() {
                write!(f, " [error]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
