use std::collections::BTreeSet;
use std::ops::Range;

use crate::config::Body;
use crate::parser::body::parse_body;
use crate::parser::error::ParseError;

/// What a marker name turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerName {
    /// `WM( ... )`: a document command. The body may have failed to parse.
    Command(Result<Body, ParseError>),
    /// `<label> GROUPS( ... )`: a visibility region without a command.
    Region(Result<BTreeSet<String>, ParseError>),
    /// Anything else; not ours.
    Plain,
}

const REGION_KEY: &str = "GROUPS";

/// Byte range of `name` left after trimming surrounding whitespace and an
/// optional trailing integer that the host appends to keep names unique.
pub fn semantic_range(name: &str) -> Range<usize> {
    let start = name.len() - name.trim_start().len();
    let trimmed = name.trim_end();
    let without_digits = trimmed.trim_end_matches(|c: char| c.is_ascii_digit());
    let end = without_digits.trim_end().len().max(start);
    start..end
}

/// The name without the host's disambiguation suffix.
pub fn strip_suffix(name: &str) -> &str {
    &name[semantic_range(name)]
}

pub(crate) fn classify(name: &str, file_id: usize) -> MarkerName {
    let range = semantic_range(name);
    let core = &name[range.clone()];

    if let Some(body) = command_body(core) {
        let base = range.start + body.start;
        let text = &core[body];
        return MarkerName::Command(parse_body(text, base, file_id));
    }

    if let Some(at) = find_region_key(core) {
        let base = range.start + at;
        return MarkerName::Region(parse_region(&core[at..], base, file_id));
    }

    MarkerName::Plain
}

/// Range of the text between `WM(` and the final `)`, relative to `core`.
fn command_body(core: &str) -> Option<Range<usize>> {
    let rest = core.strip_prefix("WM")?;
    let open = core.len() - rest.trim_start().len();
    if !core[open..].starts_with('(') || !core.ends_with(')') || core.len() < open + 2 {
        return None;
    }
    Some(open + 1..core.len() - 1)
}

/// Position of a standalone `GROUPS` keyword followed by `(`.
fn find_region_key(core: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = core[from..].find(REGION_KEY) {
        let at = from + found;
        let before_ok = core[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'));
        let after = core[at + REGION_KEY.len()..].trim_start();
        if before_ok && after.starts_with('(') {
            return Some(at);
        }
        from = at + REGION_KEY.len();
    }
    None
}

fn parse_region(text: &str, base: usize, file_id: usize) -> Result<BTreeSet<String>, ParseError> {
    let body = parse_body(text, base, file_id)?;
    let groups: BTreeSet<String> = body
        .strings(REGION_KEY)
        .unwrap_or_default()
        .into_iter()
        .collect();
    if body.entries.len() != 1 || groups.is_empty() {
        return Err(ParseError::error(
            "a region name must end in a single non-empty GROUPS(...) list",
            base..base + text.len(),
            file_id,
        ));
    }
    Ok(groups)
}
