#![doc = r#"
Homogeneous-automata simulation, optimization, and code generation.

A homogeneous automaton is a directed graph of state-transition elements
(STEs), each carrying its own 256-bit match column, wired to Boolean
gates and counters that compose match signals into higher-order events:
the execution model of the Micron Automata Processor. This crate owns the
hard core of that model; front-ends (CLI, ANML/MNRL file parsers) live
outside and drive it through `AutomatonBuilder`.

Modules:
- bitset: the 256-bit match column type
- charset: symbol-set compiler (regex-class dialect -> column) and its
  canonical inverse, plus the Quine-McCluskey complexity analytic
- element: STE / gate / counter element model with typed, ported edges
- automaton: graph container, per-symbol simulation engine, structural
  transforms, subset construction, profiling accumulators
- builder: staged graph construction contract for front-ends
- export: ANML / MNRL / flat-NFA / DOT / Verilog / BLIF / .graph emitters
- errors: the crate-wide error taxonomy

In tests, shared graph fixtures are available under `crate::test_utils`.
"#]

pub mod automaton;
pub mod bitset;
pub mod builder;
pub mod charset;
pub mod element;
pub mod errors;
pub mod export;

// Re-export commonly used types at the crate root for convenience.
pub use automaton::transform::StridedAutomaton;
pub use automaton::{Automaton, EodPolicy, Report};
pub use bitset::Bitset256;
pub use builder::AutomatonBuilder;
pub use element::{CounterMode, Element, ElementId, GateKind, Port, Start};
pub use errors::AutomatonError;
pub use export::Emitter;

// Shared test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;
