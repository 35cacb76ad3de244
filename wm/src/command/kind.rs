use std::collections::BTreeSet;
use std::fmt;

use crate::config::{Body, Entry};

/// Where `insertValue` puts its separator when the value is non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSep {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    TemplateTemplate,
    NormalTemplate,
    FormDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragMode {
    #[default]
    Automatic,
    Manual,
}

/// A typed document command with its kind-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    InsertFrag {
        frag_id: String,
        args: Vec<String>,
        mode: FragMode,
        styles: Vec<String>,
    },
    InsertValue {
        column: String,
        autosep: Option<AutoSep>,
        separator: String,
        trafo: Option<String>,
    },
    InsertContent,
    Form,
    UpdateFields,
    SetType {
        doc_type: DocumentType,
    },
    InsertFormValue {
        id: String,
        trafo: Option<String>,
    },
    InsertFunctionValue {
        function: Vec<Entry>,
        trafo: Option<String>,
    },
    SetGroups {
        groups: BTreeSet<String>,
    },
    SetPrintFunction {
        function: String,
        arg: Option<String>,
    },
    DraftOnly {
        highlight_color: Option<u32>,
    },
    NotInOriginal {
        highlight_color: Option<u32>,
    },
    AllVersions {
        highlight_color: Option<u32>,
    },
    SetJumpMark,
    /// A marker that looked like a command but could not be used as one.
    Invalid {
        message: String,
    },
}

impl CommandKind {
    /// The `CMD` keyword this kind is written with.
    pub fn keyword(&self) -> &'static str {
        match self {
            CommandKind::InsertFrag { .. } => "insertFrag",
            CommandKind::InsertValue { .. } => "insertValue",
            CommandKind::InsertContent => "insertContent",
            CommandKind::Form => "form",
            CommandKind::UpdateFields => "updateFields",
            CommandKind::SetType { .. } => "setType",
            CommandKind::InsertFormValue { .. } => "insertFormValue",
            CommandKind::InsertFunctionValue { .. } => "insertFunctionValue",
            CommandKind::SetGroups { .. } => "setGroups",
            CommandKind::SetPrintFunction { .. } => "setPrintFunction",
            CommandKind::DraftOnly { .. } => "draftOnly",
            CommandKind::NotInOriginal { .. } => "notInOriginal",
            CommandKind::AllVersions { .. } => "allVersions",
            CommandKind::SetJumpMark => "setJumpMark",
            CommandKind::Invalid { .. } => "invalid",
        }
    }

    /// Static per-kind capability: may other commands nest inside this one?
    pub fn may_have_children(&self) -> bool {
        matches!(
            self,
            CommandKind::InsertFrag { .. }
                | CommandKind::InsertContent
                | CommandKind::Form
                | CommandKind::UpdateFields
                | CommandKind::SetGroups { .. }
                | CommandKind::DraftOnly { .. }
                | CommandKind::NotInOriginal { .. }
                | CommandKind::AllVersions { .. }
        )
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, CommandKind::Invalid { .. })
    }

    /// Groups declared by the command itself (only `setGroups` declares any).
    pub fn declared_groups(&self) -> BTreeSet<String> {
        match self {
            CommandKind::SetGroups { groups } => groups.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Build the typed command from a parsed body. The error is a message
    /// suitable for an `Invalid` command.
    pub fn from_body(body: &Body) -> Result<CommandKind, String> {
        let Some(cmd) = body.str("CMD") else {
            return Err("missing CMD".to_string());
        };

        let kind = match cmd.to_ascii_lowercase().as_str() {
            "insertfrag" => CommandKind::InsertFrag {
                frag_id: required(body, "FRAG_ID", cmd)?,
                args: body.strings("ARGS").unwrap_or_default(),
                mode: match body.str("MODE") {
                    None => FragMode::Automatic,
                    Some(m) if m.eq_ignore_ascii_case("manual") => FragMode::Manual,
                    Some(other) => return Err(format!("unknown MODE '{}' for insertFrag", other)),
                },
                styles: body.strings("STYLES").unwrap_or_default(),
            },
            "insertvalue" => CommandKind::InsertValue {
                column: required(body, "DB_SPALTE", cmd)?,
                autosep: match body.str("AUTOSEP") {
                    None => None,
                    Some(s) => Some(parse_autosep(s)?),
                },
                separator: body.str("SEPARATOR").unwrap_or(" ").to_string(),
                trafo: optional(body, "TRAFO"),
            },
            "insertcontent" => CommandKind::InsertContent,
            "form" => CommandKind::Form,
            "updatefields" => CommandKind::UpdateFields,
            "settype" => CommandKind::SetType {
                doc_type: parse_doc_type(&required(body, "TYPE", cmd)?)?,
            },
            "insertformvalue" => CommandKind::InsertFormValue {
                id: required(body, "ID", cmd)?,
                trafo: optional(body, "TRAFO"),
            },
            "insertfunctionvalue" => CommandKind::InsertFunctionValue {
                function: match body.group("FUNCTION") {
                    Some(entries) if !entries.is_empty() => entries.to_vec(),
                    _ => return Err(missing("FUNCTION", cmd)),
                },
                trafo: optional(body, "TRAFO"),
            },
            "setgroups" => {
                let groups: BTreeSet<String> = body
                    .strings("GROUPS")
                    .unwrap_or_default()
                    .into_iter()
                    .collect();
                if groups.is_empty() {
                    return Err(missing("GROUPS", cmd));
                }
                CommandKind::SetGroups { groups }
            }
            "setprintfunction" => CommandKind::SetPrintFunction {
                function: required(body, "FUNCTION", cmd)?,
                arg: optional(body, "ARG"),
            },
            "draftonly" => CommandKind::DraftOnly {
                highlight_color: highlight_color(body)?,
            },
            "notinoriginal" => CommandKind::NotInOriginal {
                highlight_color: highlight_color(body)?,
            },
            "allversions" => CommandKind::AllVersions {
                highlight_color: highlight_color(body)?,
            },
            "setjumpmark" => CommandKind::SetJumpMark,
            _ => return Err(format!("unknown command '{}'", cmd)),
        };

        Ok(kind)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

fn missing(key: &str, cmd: &str) -> String {
    format!("{} requires {}", cmd, key)
}

fn required(body: &Body, key: &str, cmd: &str) -> Result<String, String> {
    match body.str(key) {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(missing(key, cmd)),
    }
}

fn optional(body: &Body, key: &str) -> Option<String> {
    body.str(key)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

fn parse_autosep(value: &str) -> Result<AutoSep, String> {
    match value.to_ascii_lowercase().as_str() {
        "left" => Ok(AutoSep::Left),
        "right" => Ok(AutoSep::Right),
        "both" => Ok(AutoSep::Both),
        _ => Err(format!("unknown AUTOSEP '{}' (expected left, right or both)", value)),
    }
}

fn parse_doc_type(value: &str) -> Result<DocumentType, String> {
    match value.to_ascii_lowercase().as_str() {
        "templatetemplate" => Ok(DocumentType::TemplateTemplate),
        "normaltemplate" => Ok(DocumentType::NormalTemplate),
        "formdocument" => Ok(DocumentType::FormDocument),
        _ => Err(format!("unknown TYPE '{}'", value)),
    }
}

fn highlight_color(body: &Body) -> Result<Option<u32>, String> {
    let Some(value) = optional(body, "HIGHLIGHT_COLOR") else {
        return Ok(None);
    };
    let hex = value.trim();
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("HIGHLIGHT_COLOR '{}' must be six hex digits", value));
    }
    u32::from_str_radix(hex, 16)
        .map(Some)
        .map_err(|_| format!("HIGHLIGHT_COLOR '{}' must be six hex digits", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_body;

    fn kind(text: &str) -> Result<CommandKind, String> {
        CommandKind::from_body(&parse_body(text, 0, 0).unwrap())
    }

    #[test]
    fn keyword_is_case_insensitive() {
        let k = kind("CMD 'INSERTFRAG' FRAG_ID 'Greeting' ARGS('a' 'b')").unwrap();
        assert_eq!(
            k,
            CommandKind::InsertFrag {
                frag_id: "Greeting".into(),
                args: vec!["a".into(), "b".into()],
                mode: FragMode::Automatic,
                styles: vec![],
            }
        );
        assert!(k.may_have_children());
    }

    #[test]
    fn insert_value_defaults() {
        let k = kind("CMD 'insertValue' DB_SPALTE 'Vorname'").unwrap();
        assert_eq!(
            k,
            CommandKind::InsertValue {
                column: "Vorname".into(),
                autosep: None,
                separator: " ".into(),
                trafo: None,
            }
        );
        assert!(!k.may_have_children());
    }

    #[test]
    fn missing_mandatory_fields() {
        assert_eq!(kind("CMD 'insertFrag'"), Err("insertFrag requires FRAG_ID".into()));
        assert_eq!(kind("CMD 'setGroups' GROUPS()"), Err("setGroups requires GROUPS".into()));
        assert_eq!(kind("FRAG_ID 'x'"), Err("missing CMD".into()));
    }

    #[test]
    fn unknown_values() {
        assert_eq!(kind("CMD 'frobnicate'"), Err("unknown command 'frobnicate'".into()));
        assert!(kind("CMD 'insertValue' DB_SPALTE 'x' AUTOSEP 'middle'").is_err());
        assert!(kind("CMD 'setType' TYPE 'letter'").is_err());
        assert!(kind("CMD 'draftOnly' HIGHLIGHT_COLOR 'red'").is_err());
        assert!(kind("CMD 'draftOnly' HIGHLIGHT_COLOR '+fffff'").is_err());
    }

    #[test]
    fn optional_fields() {
        assert_eq!(
            kind("CMD 'draftOnly' HIGHLIGHT_COLOR 'ffff00'").unwrap(),
            CommandKind::DraftOnly {
                highlight_color: Some(0xffff00)
            }
        );
        assert_eq!(
            kind("CMD 'setType' TYPE 'formDocument'").unwrap(),
            CommandKind::SetType {
                doc_type: DocumentType::FormDocument
            }
        );
        let groups = kind("CMD 'setGroups' GROUPS('A' 'B' 'A')").unwrap().declared_groups();
        assert_eq!(groups.len(), 2);
    }
}
