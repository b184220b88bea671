/*!
Programmatic graph builder: the contract every front-end populates.

Parsers for the on-disk formats (XML ANML, JSON MNRL) live outside the
core; they stage elements here using the same vocabulary those formats
use: symbol-set and start strings for STEs, gate kinds, counter targets
with an `at-target` mode, report/EOD flags, and raw output strings that
may carry a `:cnt`/`:rst` port suffix. `build` resolves every staged
output into a bidirectional edge, finalizes the graph (special-element
ordering), and validates it, so a successfully built automaton is ready
to simulate.

Staging is fluent: attribute setters apply to the most recently staged
element, mirroring how the formats nest report/activate children inside
an element declaration.

```
# use apsim::{AutomatonBuilder, AutomatonError};
# fn main() -> Result<(), AutomatonError> {
let mut b = AutomatonBuilder::new("net");
b.ste("s0", "[J]", "all-input")?.output("s1");
b.ste("s1", "[k]", "none")?.report();
let automaton = b.build()?;
# assert_eq!(automaton.element_count(), 2);
# Ok(())
# }
```
*/

use std::collections::HashMap;

use crate::automaton::Automaton;
use crate::element::{CounterMode, Element, GateKind, Start};
use crate::errors::AutomatonError;

#[derive(Debug)]
struct Staged {
    element: Element,
    outputs: Vec<String>,
}

/// Staged construction of an [`Automaton`].
#[derive(Debug)]
pub struct AutomatonBuilder {
    id: String,
    staged: Vec<Staged>,
    index: HashMap<String, usize>,
    connections: Vec<(String, String)>,
}

impl AutomatonBuilder {
    pub fn new(network_id: impl Into<String>) -> Self {
        AutomatonBuilder {
            id: network_id.into(),
            staged: Vec::new(),
            index: HashMap::new(),
            connections: Vec::new(),
        }
    }

    fn stage(&mut self, element: Element) -> Result<&mut Self, AutomatonError> {
        if self.index.contains_key(element.id()) {
            return Err(AutomatonError::MalformedAutomaton(format!(
                "duplicate element id {:?}",
                element.id()
            )));
        }
        self.index.insert(element.id().to_string(), self.staged.len());
        self.staged.push(Staged {
            element,
            outputs: Vec::new(),
        });
        Ok(self)
    }

    /// Stage an STE. The symbol set is compiled immediately so malformed
    /// classes surface at the declaration site; unrecognized start strings
    /// mean "none".
    pub fn ste(
        &mut self,
        id: &str,
        symbol_set: &str,
        start: &str,
    ) -> Result<&mut Self, AutomatonError> {
        let element = Element::ste(id, symbol_set, Start::parse(start))?;
        self.stage(element)
    }

    /// Stage a Boolean gate.
    pub fn gate(&mut self, id: &str, kind: GateKind) -> Result<&mut Self, AutomatonError> {
        self.stage(Element::gate(id, kind))
    }

    /// Stage a counter; unrecognized `at_target` strings mean pulse.
    pub fn counter(
        &mut self,
        id: &str,
        target: u32,
        at_target: &str,
    ) -> Result<&mut Self, AutomatonError> {
        self.stage(Element::counter(id, target, CounterMode::parse(at_target)))
    }

    fn last(&mut self) -> Option<&mut Staged> {
        self.staged.last_mut()
    }

    /// Mark the last staged element as reporting.
    pub fn report(&mut self) -> &mut Self {
        if let Some(s) = self.last() {
            s.element.set_reporting(true);
        }
        self
    }

    /// Set the report code of the last staged element (implies reporting).
    pub fn report_code(&mut self, code: &str) -> &mut Self {
        if let Some(s) = self.last() {
            s.element.set_reporting(true);
            s.element.set_report_code(code);
        }
        self
    }

    /// Gate the last staged element's reports on the end-of-data signal.
    pub fn end_of_data(&mut self) -> &mut Self {
        if let Some(s) = self.last() {
            s.element.set_eod(true);
        }
        self
    }

    /// Add an output wire key (`id` or `id:port`) to the last staged
    /// element.
    pub fn output(&mut self, to: &str) -> &mut Self {
        if let Some(s) = self.last() {
            s.outputs.push(to.to_string());
        }
        self
    }

    /// Add an output wire between two elements by name. Both endpoint keys
    /// may carry a port suffix; unknown names are caught at `build` time.
    pub fn connect(&mut self, from: &str, to: &str) -> &mut Self {
        self.connections.push((from.to_string(), to.to_string()));
        self
    }

    /// Resolve all staged connections and produce a finalized, validated
    /// automaton.
    pub fn build(self) -> Result<Automaton, AutomatonError> {
        let mut automaton = Automaton::new(self.id);

        let mut edges: Vec<(String, String)> = self.connections;
        for staged in self.staged {
            let from = staged.element.id().to_string();
            for to in staged.outputs {
                edges.push((from.clone(), to));
            }
            automaton.add_element(staged.element)?;
        }

        for (from, to) in edges {
            automaton.add_edge(&from, &to)?;
        }

        automaton.finalize()?;
        automaton.validate()?;
        automaton.take_error();
        Ok(automaton)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_wired_graph() {
        let mut b = AutomatonBuilder::new("net");
        b.ste("s0", "[a]", "all-input").unwrap().output("s1");
        b.ste("s1", "[b]", "none").unwrap().report_code("r1");
        let mut a = b.build().unwrap();

        assert_eq!(a.element_count(), 2);
        assert_eq!(a.starts().len(), 1);
        assert_eq!(a.reports().len(), 1);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn counter_ports_resolve() {
        let mut b = AutomatonBuilder::new("net");
        b.ste("src", "[c]", "all-input").unwrap().output("c:cnt");
        b.ste("r", "[r]", "all-input").unwrap().output("c:rst");
        b.counter("c", 2, "pulse").unwrap().output("rep");
        b.ste("rep", "*", "none").unwrap().report();
        let mut a = b.build().unwrap();

        assert!(a.validate().is_ok());
        let c = a.lookup("c").unwrap();
        let ports: Vec<_> = a.element(c).inputs().iter().map(|s| s.port).collect();
        assert_eq!(ports.len(), 2);
        assert!(ports.contains(&crate::element::Port::Count));
        assert!(ports.contains(&crate::element::Port::Reset));
    }

    #[test]
    fn dangling_output_is_element_not_found() {
        let mut b = AutomatonBuilder::new("net");
        b.ste("s0", "[a]", "all-input").unwrap().output("ghost");
        let err = b.build().unwrap_err();
        assert_eq!(err.category(), "element-not-found");
    }

    #[test]
    fn duplicate_id_is_malformed() {
        let mut b = AutomatonBuilder::new("net");
        b.ste("s0", "[a]", "none").unwrap();
        let err = b.ste("s0", "[b]", "none").unwrap_err();
        assert_eq!(err.category(), "malformed-automaton");
    }

    #[test]
    fn bad_symbol_set_surfaces_at_staging() {
        let mut b = AutomatonBuilder::new("net");
        assert!(b.ste("s0", "[abc", "none").is_err());
    }
}
