use crate::config::{self, Body};

pub const STATE_KEY: &str = "STATE";
pub const DONE_KEY: &str = "DONE";
pub const ERROR_KEY: &str = "ERROR";

/// A persisted boolean whose textual encoding may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flag {
    /// Never read from a marker name (command built in memory).
    #[default]
    Unset,
    /// The name carries no value, so the default `false` applies.
    Default,
    /// An explicit value, read from the name or assigned during execution.
    Set(bool),
}

impl Flag {
    /// The effective value with the default applied.
    pub fn value(self) -> bool {
        matches!(self, Flag::Set(true))
    }

    pub fn is_explicit(self) -> bool {
        matches!(self, Flag::Set(_))
    }

    fn read(state: Option<&[config::Entry]>, key: &str) -> Flag {
        match state.and_then(|entries| config::find(entries, key)) {
            Some(entry) => Flag::Set(
                entry
                    .as_str()
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            ),
            None => Flag::Default,
        }
    }
}

/// Done/error flags of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandState {
    pub done: Flag,
    pub error: Flag,
}

impl CommandState {
    /// Read the `STATE( ... )` group of a command body.
    pub fn read(body: &Body) -> Self {
        let state = body.group(STATE_KEY);
        CommandState {
            done: Flag::read(state, DONE_KEY),
            error: Flag::read(state, ERROR_KEY),
        }
    }

    /// Whether the effective values differ from `other`'s.
    pub fn differs_from(&self, other: &CommandState) -> bool {
        self.done.value() != other.done.value() || self.error.value() != other.error.value()
    }

    /// Write these flags into `body`, where `encoded` is what the body already says.
    ///
    /// A key is emitted when its value is not the default, or when the name
    /// already carried it. Returns the state the rewritten body encodes.
    pub fn write_into(&self, encoded: &CommandState, body: &mut Body) -> CommandState {
        let fields = [
            (DONE_KEY, self.done, encoded.done),
            (ERROR_KEY, self.error, encoded.error),
        ];
        let mut written = CommandState {
            done: Flag::Default,
            error: Flag::Default,
        };

        if fields
            .iter()
            .all(|(_, now, before)| !now.value() && !before.is_explicit())
        {
            return written;
        }

        let state = body.group_mut(STATE_KEY);
        for (key, now, before) in fields {
            if now.value() || before.is_explicit() {
                config::set_str(state, key, now.value().to_string());
                let flag = Flag::Set(now.value());
                if key == DONE_KEY {
                    written.done = flag;
                } else {
                    written.error = flag;
                }
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_body;

    fn body(text: &str) -> Body {
        parse_body(text, 0, 0).unwrap()
    }

    #[test]
    fn reads_explicit_and_default_flags() {
        let state = CommandState::read(&body("CMD'form' STATE(DONE 'TRUE')"));
        assert_eq!(state.done, Flag::Set(true));
        assert_eq!(state.error, Flag::Default);
        assert!(state.done.value());
        assert!(!state.error.value());
    }

    #[test]
    fn unset_and_default_are_false() {
        assert!(!Flag::Unset.value());
        assert!(!Flag::Default.value());
        assert!(!Flag::Set(false).value());
    }

    #[test]
    fn omits_default_values() {
        let mut b = body("CMD'form'");
        let encoded = CommandState::read(&b);
        let now = CommandState {
            done: Flag::Set(false),
            error: Flag::Set(false),
        };
        assert!(!now.differs_from(&encoded));
        now.write_into(&encoded, &mut b);
        assert_eq!(b.to_string(), "CMD'form'");
    }

    #[test]
    fn emits_only_changed_non_default_keys() {
        let mut b = body("CMD'form'");
        let encoded = CommandState::read(&b);
        let now = CommandState {
            done: Flag::Set(true),
            error: Flag::Set(false),
        };
        let written = now.write_into(&encoded, &mut b);
        assert_eq!(b.to_string(), "CMD'form' STATE(DONE 'true')");
        assert_eq!(written.done, Flag::Set(true));
        assert_eq!(written.error, Flag::Default);
    }

    #[test]
    fn keeps_keys_that_were_already_present() {
        let mut b = body("CMD'form' STATE(ERROR 'true')");
        let encoded = CommandState::read(&b);
        let now = CommandState {
            done: Flag::Set(true),
            error: Flag::Set(false),
        };
        now.write_into(&encoded, &mut b);
        assert_eq!(b.to_string(), "CMD'form' STATE(ERROR 'false' DONE 'true')");
    }
}
