/*!
Error taxonomy for the automata core.

One enum covers every failure the core can produce:
- FileOpen: an input or output path was unreadable/unwritable.
- ElementNotFound: a referenced identifier has no element in the graph.
- ElementNotSupported: a node kind outside the known variants, or an
  exporter asked to render an element its format cannot express.
- MalformedAutomaton: edge/id/bracket/port inconsistencies caught by the
  validator, the builder, or the symbol-set compiler.
- HardwareConstraint: exporter-specific bounds (e.g. the BLIF enable limit).

The graph additionally carries a latest-error slot set by failing lookups;
callers that prefer polling over `Result` chains read it after each step.
*/

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AutomatonError {
    #[error("failed to open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("element {0} not found")]
    ElementNotFound(String),

    #[error("element not supported: {0}")]
    ElementNotSupported(String),

    #[error("malformed automaton: {0}")]
    MalformedAutomaton(String),

    #[error("hardware constraint violated: {0}")]
    HardwareConstraint(String),
}

impl AutomatonError {
    /// Stable short name for the error category, independent of the payload.
    pub fn category(&self) -> &'static str {
        match self {
            AutomatonError::FileOpen { .. } => "file-open-failed",
            AutomatonError::ElementNotFound(_) => "element-not-found",
            AutomatonError::ElementNotSupported(_) => "element-not-supported",
            AutomatonError::MalformedAutomaton(_) => "malformed-automaton",
            AutomatonError::HardwareConstraint(_) => "hardware-constraint-violated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_stable() {
        assert_eq!(
            AutomatonError::ElementNotFound("x".into()).category(),
            "element-not-found"
        );
        assert_eq!(
            AutomatonError::MalformedAutomaton("unbalanced brackets".into()).category(),
            "malformed-automaton"
        );
        assert_eq!(
            AutomatonError::HardwareConstraint("fan-in".into()).category(),
            "hardware-constraint-violated"
        );
    }
}
