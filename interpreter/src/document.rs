use wm::span::Span;

use crate::groups::{ElementSource, GroupElement, GroupIndex};
use crate::provider::MarkerProvider;
use crate::tree::CommandTree;

/// The interpreter's view of one document: its command tree and the
/// visibility groups laid over it. Both are rebuilt incrementally from the
/// provider's markers.
#[derive(Debug, Default)]
pub struct DocumentCommands {
    pub tree: CommandTree,
    pub groups: GroupIndex,
    group_comparisons: usize,
}

impl DocumentCommands {
    pub fn new() -> Self {
        DocumentCommands::default()
    }

    /// Span comparisons performed so far by the tree and the group index.
    pub fn comparisons(&self) -> usize {
        self.tree.comparisons() + self.group_comparisons
    }

    /// Rescan the provider's markers. Returns whether the command tree
    /// changed; region-only changes are applied but not reported.
    pub fn update<P: MarkerProvider + ?Sized>(&mut self, provider: &P) -> bool {
        let snapshot = provider.list_markers();
        let is_live = |span: &Span| provider.span_is_live(span);

        let changed = self.tree.rescan(&snapshot, is_live);
        let changes = self.tree.take_changes();

        for &id in &changes.removed {
            self.groups.remove_command(id);
        }
        let tree = &self.tree;
        self.groups
            .refresh_command_spans(|id| tree.command(id).map(|c| *c.span()));

        for &id in &changes.inserted {
            let Some(command) = self.tree.command(id) else {
                continue;
            };
            if command.is_invalid() {
                continue;
            }
            self.group_comparisons += self.groups.insert(GroupElement {
                source: ElementSource::Command(id),
                span: *command.span(),
                groups: command.kind().declared_groups(),
            });
        }

        if self.groups.rescan_regions(&snapshot, is_live) {
            tracing::debug!(regions = self.region_count(), "visibility regions changed");
        }

        if changed {
            tracing::debug!(
                commands = self.tree.len(),
                inserted = changes.inserted.len(),
                removed = changes.removed.len(),
                "document commands changed"
            );
        }
        changed
    }

    fn region_count(&self) -> usize {
        self.groups
            .elements()
            .iter()
            .filter(|e| matches!(e.source, ElementSource::Region { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;

    #[test]
    fn commands_and_regions_share_the_group_index() {
        let mut doc = MemoryDocument::new("letter", 100);
        doc.create_marker("Closing GROUPS('Sig')", 50..90).unwrap();
        doc.create_marker("WM(CMD'setGroups' GROUPS('A'))", 0..100).unwrap();
        doc.create_marker("WM(CMD'insertValue' DB_SPALTE'Name')", 60..60).unwrap();
        doc.create_marker("WM(CMD'insertValue' DB_SPALTE'Ort')", 10..10).unwrap();

        let mut commands = DocumentCommands::new();
        assert!(commands.update(&doc));
        assert_eq!(commands.tree.len(), 3);
        assert_eq!(commands.groups.len(), 4);

        let name = commands.tree.find("WM(CMD'insertValue' DB_SPALTE'Name')").unwrap();
        let ort = commands.tree.find("WM(CMD'insertValue' DB_SPALTE'Ort')").unwrap();
        let groups = |id| {
            commands
                .groups
                .groups_of(id)
                .unwrap()
                .iter()
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(groups(name), vec!["A", "Sig"]);
        assert_eq!(groups(ort), vec!["A"]);
        assert!(commands.comparisons() > 0);

        assert!(!commands.update(&doc));
    }

    #[test]
    fn removed_commands_leave_the_group_index() {
        let mut doc = MemoryDocument::new("letter", 20);
        let id = doc.create_marker("WM(CMD'setGroups' GROUPS('A'))", 0..20).unwrap();
        doc.create_marker("WM(CMD'setJumpMark')", 5..5).unwrap();

        let mut commands = DocumentCommands::new();
        commands.update(&doc);
        assert_eq!(commands.groups.len(), 2);

        doc.delete_marker(id).unwrap();
        assert!(commands.update(&doc));
        assert_eq!(commands.tree.len(), 1);
        assert_eq!(commands.groups.len(), 1);
    }

    #[test]
    fn invalid_commands_carry_no_groups() {
        let mut doc = MemoryDocument::new("letter", 20);
        doc.create_marker("WM(CMD'setGroups')", 0..20).unwrap();
        let mut commands = DocumentCommands::new();
        commands.update(&doc);
        assert_eq!(commands.tree.len(), 1);
        assert!(commands.groups.is_empty());
    }
}
