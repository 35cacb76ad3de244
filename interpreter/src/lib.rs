pub mod config;
pub mod document;
pub mod error;
pub mod executor;
pub mod groups;
pub mod memory;
pub mod provider;
pub mod tree;

pub use config::InterpreterConfig;
pub use document::DocumentCommands;
pub use error::{InterpretError, ProviderError, VisitError};
pub use executor::{CommandVisitor, Interpreter, PassReport};
pub use groups::{ElementSource, GroupElement, GroupIndex};
pub use memory::{Annotation, MemoryDocument};
pub use provider::MarkerProvider;
pub use tree::{CommandTree, NodeId};
