use serde::{Deserialize, Serialize};

/// Tunables for an interpretation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Maximum number of structural rescans before the pass is declared an endless loop.
    pub max_iterations: usize,
    /// Anchor an error annotation at a command's span when its visitor fails.
    pub annotate_errors: bool,
}

pub const DEFAULT_MAX_ITERATIONS: usize = 100;

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            annotate_errors: true,
        }
    }
}
