use wm::command::Command;

use crate::config::InterpreterConfig;
use crate::document::DocumentCommands;
use crate::error::{InterpretError, VisitError};
use crate::groups::GroupIndex;
use crate::provider::MarkerProvider;
use crate::tree::{CommandTree, NodeId};

/// The per-kind actions of a document command. Implemented by whoever
/// drives the interpreter; the engine calls it once per pending command and
/// records the outcome in the command's marker.
pub trait CommandVisitor<P: MarkerProvider + ?Sized> {
    fn visit(&mut self, command: &Command, provider: &mut P) -> Result<(), VisitError>;
}

impl<P, F> CommandVisitor<P> for F
where
    P: MarkerProvider + ?Sized,
    F: FnMut(&Command, &mut P) -> Result<(), VisitError>,
{
    fn visit(&mut self, command: &Command, provider: &mut P) -> Result<(), VisitError> {
        self(command, provider)
    }
}

/// Summary of a completed interpretation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Expansion passes run, including the last one that found no change.
    pub iterations: usize,
    /// Visitor invocations.
    pub executed: usize,
    /// Span comparisons spent on tree and group index insertions.
    pub comparisons: usize,
    /// Marker renames performed to persist command state.
    pub renames: usize,
}

/// Interprets the document commands of one document.
///
/// The interpreter keeps its tree between passes, so a second
/// [`Interpreter::execute`] only parses markers it has not seen.
#[derive(Debug, Default)]
pub struct Interpreter {
    document: DocumentCommands,
    config: InterpreterConfig,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Interpreter {
            document: DocumentCommands::new(),
            config,
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn tree(&self) -> &CommandTree {
        &self.document.tree
    }

    pub fn groups(&self) -> &GroupIndex {
        &self.document.groups
    }

    /// Bring the tree and group index up to date without executing anything.
    pub fn scan<P: MarkerProvider + ?Sized>(&mut self, provider: &P) -> bool {
        self.document.update(provider)
    }

    /// Run a full interpretation pass.
    ///
    /// Commands that may contain others are executed first, rescanning after
    /// every pass until the tree stops changing; then every remaining pending
    /// command is executed once in document order. Visitor failures do not
    /// stop the pass; they are counted and reported as
    /// [`InterpretError::CommandsFailed`] at the end.
    pub fn execute<P, V>(&mut self, provider: &mut P, visitor: &mut V) -> Result<PassReport, InterpretError>
    where
        P: MarkerProvider + ?Sized,
        V: CommandVisitor<P> + ?Sized,
    {
        let mut report = PassReport::default();
        let mut failed = 0;
        let comparisons_before = self.document.comparisons();

        self.document.update(&*provider);
        loop {
            if report.iterations >= self.config.max_iterations {
                let document = provider.display_name();
                tracing::error!(document = %document, iterations = report.iterations, "document commands never settled");
                return Err(InterpretError::EndlessLoop {
                    document,
                    iterations: report.iterations,
                });
            }
            report.iterations += 1;

            let order: Vec<NodeId> = self.document.tree.depth_first(false).collect();
            for id in order {
                let expands = self
                    .document
                    .tree
                    .command(id)
                    .is_some_and(|c| c.may_have_children() && is_pending(c));
                if expands {
                    failed += self.run(id, provider, visitor, &mut report)?;
                }
            }

            if !self.document.update(&*provider) {
                break;
            }
            tracing::debug!(iteration = report.iterations, "document commands changed, rescanning");
        }

        let order: Vec<NodeId> = self.document.tree.depth_first(false).collect();
        for id in order {
            if self.document.tree.command(id).is_some_and(is_pending) {
                failed += self.run(id, provider, visitor, &mut report)?;
            }
        }

        report.comparisons = self.document.comparisons() - comparisons_before;
        tracing::info!(
            document = %provider.display_name(),
            iterations = report.iterations,
            executed = report.executed,
            renames = report.renames,
            failed,
            "interpretation finished"
        );

        if failed > 0 {
            return Err(InterpretError::CommandsFailed(failed));
        }
        Ok(report)
    }

    /// Visit one command and persist its outcome. Returns 1 if it failed.
    fn run<P, V>(
        &mut self,
        id: NodeId,
        provider: &mut P,
        visitor: &mut V,
        report: &mut PassReport,
    ) -> Result<usize, InterpretError>
    where
        P: MarkerProvider + ?Sized,
        V: CommandVisitor<P> + ?Sized,
    {
        let Some(command) = self.document.tree.command(id) else {
            return Ok(0);
        };
        let span = *command.span();
        if !provider.span_is_live(&span) {
            tracing::debug!(marker = %command.marker_name(), "skipping removed document command");
            return Ok(0);
        }

        let outcome = visitor.visit(command, provider);
        report.executed += 1;

        if !provider.span_is_live(&span) {
            tracing::debug!(marker = %command.marker_name(), "document command removed itself");
            return Ok(0);
        }

        let Some(command) = self.document.tree.command_mut(id) else {
            return Ok(0);
        };
        let failed = match outcome {
            Ok(()) => {
                command.set_done(true);
                0
            }
            Err(error) => {
                tracing::warn!(marker = %command.marker_name(), error = %error, "document command failed");
                command.set_error(true);
                if self.config.annotate_errors {
                    provider.annotate_error(&span, &error.message);
                }
                1
            }
        };

        if let Some(new_name) = command.encoded_name() {
            let old_name = command.marker_name().to_string();
            let actual = provider.rename_marker(&old_name, &new_name)?;
            tracing::debug!(from = %old_name, to = %actual, "persisted command state");
            self.document.tree.persisted(id, &actual);
            report.renames += 1;
        }
        Ok(failed)
    }
}

fn is_pending(command: &Command) -> bool {
    !command.is_done() && !command.has_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;

    #[test]
    fn containers_run_before_leaves() {
        let mut doc = MemoryDocument::new("letter", 30);
        doc.create_marker("WM(CMD'insertValue' DB_SPALTE'Name')", 2..2).unwrap();
        doc.create_marker("WM(CMD'form')", 10..20).unwrap();

        let mut seen = Vec::new();
        let mut interpreter = Interpreter::default();
        let report = interpreter
            .execute(&mut doc, &mut |command: &Command, _: &mut MemoryDocument| -> Result<(), VisitError> {
                seen.push(command.kind().keyword());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec!["form", "insertValue"]);
        assert_eq!(report.executed, 2);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.renames, 2);
    }

    #[test]
    fn failures_are_annotated_and_counted() {
        let mut doc = MemoryDocument::new("letter", 30);
        doc.create_marker("WM(CMD'insertValue' DB_SPALTE'Name')", 2..2).unwrap();
        doc.create_marker("WM(CMD'insertValue' DB_SPALTE'Ort')", 5..5).unwrap();

        let mut interpreter = Interpreter::default();
        let result = interpreter.execute(
            &mut doc,
            &mut |command: &Command, _: &mut MemoryDocument| -> Result<(), VisitError> {
                match command.kind() {
                    wm::command::CommandKind::InsertValue { column, .. } if column == "Ort" => {
                        Err(VisitError::new("no such column: Ort"))
                    }
                    _ => Ok(()),
                }
            },
        );

        assert!(matches!(result, Err(InterpretError::CommandsFailed(1))));
        assert_eq!(doc.annotations().len(), 1);
        assert_eq!(doc.annotations()[0].range, 5..5);
        assert_eq!(
            doc.names(),
            vec![
                "WM(CMD'insertValue' DB_SPALTE'Name' STATE(DONE 'true'))",
                "WM(CMD'insertValue' DB_SPALTE'Ort' STATE(ERROR 'true'))",
            ]
        );
    }

    #[test]
    fn annotations_can_be_switched_off() {
        let mut doc = MemoryDocument::new("letter", 30);
        doc.create_marker("WM(CMD'setJumpMark')", 2..2).unwrap();
        let config = InterpreterConfig {
            annotate_errors: false,
            ..InterpreterConfig::default()
        };
        let mut interpreter = Interpreter::new(config);
        let result = interpreter.execute(
            &mut doc,
            &mut |_: &Command, _: &mut MemoryDocument| -> Result<(), VisitError> { Err(VisitError::new("boom")) },
        );
        assert!(matches!(result, Err(InterpretError::CommandsFailed(1))));
        assert!(doc.annotations().is_empty());
    }
}
