mod body;
pub mod error;
mod name;

pub use body::parse_body;
pub use error::ParseError;
pub use name::{MarkerName, semantic_range, strip_suffix};

/// Parser entry point for a single marker name.
pub struct Parser<'a> {
    name: &'a str,
    file_id: usize,
}

impl<'a> Parser<'a> {
    pub fn new(name: &'a str, file_id: usize) -> Self {
        Parser { name, file_id }
    }

    /// Decide whether the name is a command, a region or neither, and parse
    /// the body accordingly. Never fails: grammar errors are carried in the result.
    pub fn parse(&self) -> MarkerName {
        name::classify(self.name, self.file_id)
    }
}
