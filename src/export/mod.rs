/*!
Export back-ends: pure readers over a finalized automaton.

Each format lives in its own submodule behind the [`Emitter`] trait; none
of them mutates the graph. Formats that cannot express part of the element
model reject the graph with `element-not-supported` (flat NFA, `.graph`,
determinized-only consumers) or `hardware-constraint-violated` (BLIF
enable limit) instead of emitting something silently wrong.

- anml: ANML XML, round-trips the element model, symbol sets verbatim.
- mnrl: MNRL JSON node/connection lists via serde.
- nfa: flat NFA text for external NFA/DFA engines.
- dot: GraphViz, with optional activation heat-map coloring.
- hdl: Verilog, one match register per STE.
- blif: BLIF netlist of `ste` subcircuits for routing tools.
- graph: adjacency text with 256-bit reachability columns.
*/

pub mod anml;
pub mod blif;
pub mod dot;
pub mod graph;
pub mod hdl;
pub mod mnrl;
pub mod nfa;

pub use anml::AnmlEmitter;
pub use blif::BlifEmitter;
pub use dot::{DotEmitter, HeatScale};
pub use graph::GraphEmitter;
pub use hdl::HdlEmitter;
pub use mnrl::MnrlEmitter;
pub use nfa::FlatNfaEmitter;

use crate::automaton::Automaton;
use crate::element::{Element, ElementId};
use crate::errors::AutomatonError;

/// A renderer from a finalized automaton to one textual format.
pub trait Emitter {
    fn render(&self, automaton: &Automaton) -> Result<String, AutomatonError>;
}

/// Render and write to a file in one step.
pub fn write_to_file(
    emitter: &dyn Emitter,
    automaton: &Automaton,
    path: impl AsRef<std::path::Path>,
) -> Result<(), AutomatonError> {
    let rendered = emitter.render(automaton)?;
    std::fs::write(path.as_ref(), rendered).map_err(|source| AutomatonError::FileOpen {
        path: path.as_ref().to_path_buf(),
        source,
    })
}

/// Live elements sorted by string id, for formats with deterministic
/// element order.
pub(crate) fn sorted_by_id(automaton: &Automaton) -> Vec<(ElementId, &Element)> {
    let mut elements: Vec<(ElementId, &Element)> = automaton.elements().collect();
    elements.sort_by(|a, b| a.1.id().cmp(b.1.id()));
    elements
}
