pub mod kind;
pub mod state;

pub use kind::{AutoSep, CommandKind, DocumentType, FragMode};
pub use state::{CommandState, Flag};

use crate::Marker;
use crate::config::Body;
use crate::parser::{MarkerName, ParseError, Parser, semantic_range};
use crate::span::Span;

/// A document command parsed from a marker name.
///
/// The marker name is the command's only persistent storage: `done`/`error`
/// live in its `STATE( ... )` group and are written back by renaming.
#[derive(Debug, Clone)]
pub struct Command {
    marker_name: String,
    span: Span,
    kind: CommandKind,
    /// Current flags.
    state: CommandState,
    /// Flags the current marker name encodes.
    encoded: CommandState,
    /// Parsed body, if the name could be parsed at all.
    body: Option<Body>,
    /// Why the command is invalid, located in `marker_name`.
    diagnostic: Option<ParseError>,
}

impl Command {
    /// Parse a marker into a command. `None` if the name is not `WM( ... )`.
    pub fn from_marker(marker: &Marker) -> Option<Command> {
        let MarkerName::Command(parsed) = Parser::new(&marker.name, 0).parse() else {
            return None;
        };

        let command = match parsed {
            Ok(body) => {
                let encoded = CommandState::read(&body);
                match CommandKind::from_body(&body) {
                    Ok(kind) => Command {
                        marker_name: marker.name.clone(),
                        span: marker.span,
                        kind,
                        state: encoded,
                        encoded,
                        body: Some(body),
                        diagnostic: None,
                    },
                    Err(message) => {
                        let whole = semantic_range(&marker.name);
                        Command {
                            marker_name: marker.name.clone(),
                            span: marker.span,
                            kind: CommandKind::Invalid {
                                message: message.clone(),
                            },
                            state: encoded,
                            encoded,
                            body: Some(body),
                            diagnostic: Some(ParseError::error(message, whole, 0)),
                        }
                    }
                }
            }
            Err(error) => Command {
                marker_name: marker.name.clone(),
                span: marker.span,
                kind: CommandKind::Invalid {
                    message: error.message.clone(),
                },
                state: CommandState::default(),
                encoded: CommandState::default(),
                body: None,
                diagnostic: Some(error),
            },
        };

        if let Some(diagnostic) = &command.diagnostic {
            tracing::warn!(
                marker = %command.marker_name,
                error = %diagnostic.message,
                "invalid document command"
            );
        }
        Some(command)
    }

    /// Build a command in memory, without a marker name to read state from.
    pub fn new(kind: CommandKind, span: Span) -> Command {
        let body = Body::new(vec![crate::config::Entry::string("CMD", kind.keyword())]);
        Command {
            marker_name: body.to_marker_name(),
            span,
            kind,
            state: CommandState::default(),
            encoded: CommandState::default(),
            body: Some(body),
            diagnostic: None,
        }
    }

    pub fn marker_name(&self) -> &str {
        &self.marker_name
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn diagnostic(&self) -> Option<&ParseError> {
        self.diagnostic.as_ref()
    }

    pub fn may_have_children(&self) -> bool {
        self.kind.may_have_children()
    }

    pub fn is_invalid(&self) -> bool {
        self.kind.is_invalid()
    }

    pub fn is_done(&self) -> bool {
        self.state.done.value()
    }

    pub fn has_error(&self) -> bool {
        self.state.error.value()
    }

    pub fn set_done(&mut self, done: bool) {
        self.state.done = Flag::Set(done);
    }

    pub fn set_error(&mut self, error: bool) {
        self.state.error = Flag::Set(error);
    }

    /// Follow the host's current position for this command's marker.
    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    /// Turn this command into an invalid leaf because of a structural conflict
    /// with the marker `other`. The body is kept so state can still be written.
    pub fn reject(&mut self, message: impl Into<String>, other: &str) {
        let message = message.into();
        let whole = semantic_range(&self.marker_name);
        self.diagnostic = Some(
            ParseError::error(message.clone(), whole, 0)
                .with_note(format!("conflicting marker: {}", other)),
        );
        self.kind = CommandKind::Invalid { message };
    }

    /// The name this command's marker should carry, or `None` when the
    /// effective state already matches what the current name encodes.
    pub fn encoded_name(&self) -> Option<String> {
        if !self.state.differs_from(&self.encoded) {
            return None;
        }
        let mut body = self.body.clone()?;
        self.state.write_into(&self.encoded, &mut body);
        Some(body.to_marker_name())
    }

    /// Record that the marker was renamed to `actual_name` (which may carry a
    /// host-added suffix) and now encodes the current state.
    pub fn mark_persisted(&mut self, actual_name: impl Into<String>) {
        if let Some(body) = self.body.as_mut() {
            self.encoded = self.state.write_into(&self.encoded, body);
        }
        self.marker_name = actual_name.into();
    }
}
