use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use interpreter::{
    InterpretError, Interpreter, InterpreterConfig, MarkerProvider, MemoryDocument, PassReport,
    ProviderError, VisitError,
};
use wm::command::{Command, CommandKind};

/// A marker placed in the fixture document.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerSpec {
    pub name: String,
    pub start: usize,
    #[serde(default)]
    pub end: Option<usize>,
}

/// A marker inserted by a fragment, together with `length` units of text.
#[derive(Debug, Clone, Deserialize)]
pub struct FragmentMarker {
    pub name: String,
    #[serde(default)]
    pub length: usize,
}

/// Expectations checked by `wm test`.
#[derive(Debug, Default, Deserialize)]
pub struct Expect {
    /// Exact tree rendering (trimmed comparison).
    #[serde(default)]
    pub tree: Option<String>,

    /// Final marker names, in creation order.
    #[serde(default)]
    pub names: Option<Vec<String>>,

    /// Substring of the interpretation error.
    #[serde(default)]
    pub error: Option<String>,

    /// Number of failed commands.
    #[serde(default)]
    pub failed: Option<usize>,
}

/// A document described in TOML, plus the script for its visitor.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub length: usize,

    #[serde(default, rename = "marker")]
    pub markers: Vec<MarkerSpec>,

    /// FRAG_ID to the markers an `insertFrag` brings in.
    #[serde(default)]
    pub fragments: BTreeMap<String, Vec<FragmentMarker>>,

    /// Commands whose marker name contains any of these fail when visited.
    #[serde(default)]
    pub fail: Vec<String>,

    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub expect: Expect,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Fixture, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        Fixture::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Fixture, String> {
        let content = content.trim_start_matches('\u{feff}');
        toml::from_str(content).map_err(|e| format!("TOML parse error: {}", e))
    }

    pub fn document(&self) -> Result<MemoryDocument, ProviderError> {
        let mut doc = MemoryDocument::new(&self.name, self.length);
        for marker in &self.markers {
            let end = marker.end.unwrap_or(marker.start);
            doc.create_marker(&marker.name, marker.start..end)?;
        }
        Ok(doc)
    }

    pub fn visitor(&self) -> ScriptedVisitor {
        ScriptedVisitor {
            fragments: self.fragments.clone(),
            fail: self.fail.clone(),
        }
    }

    /// Build the document and interpret it once.
    pub fn run(&self, config: &InterpreterConfig) -> Result<FixtureRun, String> {
        let mut document = self.document().map_err(|e| e.to_string())?;
        let mut visitor = self.visitor();
        let mut interpreter = Interpreter::new(config.clone());
        let result = interpreter.execute(
            &mut document,
            &mut |command: &Command, doc: &mut MemoryDocument| visitor.visit(command, doc),
        );
        Ok(FixtureRun {
            tree: interpreter.tree().to_string(),
            result,
            document,
        })
    }
}

/// Outcome of [`Fixture::run`].
#[derive(Debug)]
pub struct FixtureRun {
    pub result: Result<PassReport, InterpretError>,
    /// Tree rendering after the pass.
    pub tree: String,
    pub document: MemoryDocument,
}

/// Plays the orchestrator for fixtures: inserts scripted fragments and
/// fails commands on request. Every other command succeeds without effect.
#[derive(Debug, Clone)]
pub struct ScriptedVisitor {
    fragments: BTreeMap<String, Vec<FragmentMarker>>,
    fail: Vec<String>,
}

impl ScriptedVisitor {
    pub fn visit(&mut self, command: &Command, doc: &mut MemoryDocument) -> Result<(), VisitError> {
        if let Some(pattern) = self
            .fail
            .iter()
            .find(|pattern| command.marker_name().contains(pattern.as_str()))
        {
            return Err(VisitError::new(format!("scripted failure ({})", pattern)));
        }

        match command.kind() {
            CommandKind::Invalid { message } => Err(VisitError::new(message.clone())),
            CommandKind::InsertFrag { frag_id, .. } => {
                let markers = self
                    .fragments
                    .get(frag_id)
                    .ok_or_else(|| VisitError::new(format!("fragment '{}' not found", frag_id)))?;
                let mut at = command.span().start;
                for marker in markers {
                    let host = |e: ProviderError| VisitError::new(e.to_string());
                    doc.insert_text(at, marker.length).map_err(host)?;
                    doc.create_marker(&marker.name, at..at + marker.length)
                        .map_err(host)?;
                    at += marker.length;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
