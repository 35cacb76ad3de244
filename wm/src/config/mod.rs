use std::fmt;

/// The key/value tree inside `WM( ... )`.
///
/// A body is an ordered list of entries. Entries keep their source order so a
/// rewritten marker name differs from the original only where state changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Body {
    pub entries: Vec<Entry>,
}

/// One `KEY'value'`, `KEY( ... )`, `'value'` or `( ... )` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Option<String>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Group(Vec<Entry>),
}

impl Entry {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Entry {
            key: Some(key.into()),
            value: Value::Str(value.into()),
        }
    }

    pub fn group(key: impl Into<String>, entries: Vec<Entry>) -> Self {
        Entry {
            key: Some(key.into()),
            value: Value::Group(entries),
        }
    }

    pub fn unkeyed(value: impl Into<String>) -> Self {
        Entry {
            key: None,
            value: Value::Str(value.into()),
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.key.as_deref() == Some(key)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Str(s) => Some(s),
            Value::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&[Entry]> {
        match &self.value {
            Value::Group(entries) => Some(entries),
            Value::Str(_) => None,
        }
    }
}

impl Body {
    pub fn new(entries: Vec<Entry>) -> Self {
        Body { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        find(&self.entries, key)
    }

    /// String value of `key`, if present and not a group.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Entry::as_str)
    }

    pub fn group(&self, key: &str) -> Option<&[Entry]> {
        self.get(key).and_then(Entry::as_group)
    }

    /// All string leaves inside the group `key`, flattened in order.
    /// `GROUPS('A' 'B')` yields `["A", "B"]`.
    pub fn strings(&self, key: &str) -> Option<Vec<String>> {
        let group = self.group(key)?;
        let mut out = Vec::new();
        collect_strings(group, &mut out);
        Some(out)
    }

    /// Set `key` to a string value, replacing the first existing entry or appending.
    pub fn set_str(&mut self, key: &str, value: impl Into<String>) {
        set_str(&mut self.entries, key, value.into());
    }

    /// Mutable access to the group `key`, creating an empty group at the end if missing.
    pub fn group_mut(&mut self, key: &str) -> &mut Vec<Entry> {
        let index = match self.entries.iter().position(|e| e.has_key(key)) {
            Some(index) => index,
            None => {
                self.entries.push(Entry::group(key, Vec::new()));
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[index];
        if !matches!(entry.value, Value::Group(_)) {
            entry.value = Value::Group(Vec::new());
        }
        match &mut entry.value {
            Value::Group(entries) => entries,
            Value::Str(_) => unreachable!("entry was just made a group"),
        }
    }

    /// Render as a complete marker name: `WM(...)`.
    pub fn to_marker_name(&self) -> String {
        format!("WM({})", self)
    }
}

pub(crate) fn find<'a>(entries: &'a [Entry], key: &str) -> Option<&'a Entry> {
    entries.iter().find(|e| e.has_key(key))
}

pub(crate) fn set_str(entries: &mut Vec<Entry>, key: &str, value: String) {
    match entries.iter_mut().find(|e| e.has_key(key)) {
        Some(entry) => entry.value = Value::Str(value),
        None => entries.push(Entry::string(key, value)),
    }
}

fn collect_strings(entries: &[Entry], out: &mut Vec<String>) {
    for entry in entries {
        match &entry.value {
            Value::Str(s) => out.push(s.clone()),
            Value::Group(inner) => collect_strings(inner, out),
        }
    }
}

/// Top-level entries render as `KEY'value'`; entries nested in a group put
/// a space between key and value (`STATE(DONE 'true')`).
fn write_entries(f: &mut fmt::Formatter<'_>, entries: &[Entry], nested: bool) -> fmt::Result {
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write_entry(f, entry, nested)?;
    }
    Ok(())
}

fn write_entry(f: &mut fmt::Formatter<'_>, entry: &Entry, nested: bool) -> fmt::Result {
    if let Some(key) = &entry.key {
        write!(f, "{}", key)?;
        if nested && matches!(entry.value, Value::Str(_)) {
            write!(f, " ")?;
        }
    }
    write!(f, "{}", entry.value)
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_entries(f, &self.entries, false)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_entry(f, self, false)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Group(entries) => {
                write!(f, "(")?;
                write_entries(f, entries, true)?;
                write!(f, ")")
            }
        }
    }
}
