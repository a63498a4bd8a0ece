//! Warning sink for the middle-end. Internal invariant violations are not
//! diagnostics: they panic with an `internal error:` message and escape to
//! the top-level boundary.

use colored::Colorize;

/// Collects non-fatal warnings (undefined behavior found by the unreachable
/// remover) and echoes them to stderr as they arrive.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        eprintln!("{}", format!("Warning: {message}").yellow());
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
