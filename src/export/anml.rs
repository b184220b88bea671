/*!
ANML XML emitter.

Round-trips the element model: symbol sets are emitted verbatim (ANML
consumers expect the raw class string, not an escaped form), ports ride on
the `element` attribute of activation children, and the end-of-data flag
becomes `high-only-on-eod`.
*/

use std::fmt::Write;

use super::{Emitter, sorted_by_id};
use crate::automaton::Automaton;
use crate::element::{Element, ElementKind, GateKind};
use crate::errors::AutomatonError;

pub struct AnmlEmitter;

impl Emitter for AnmlEmitter {
    fn render(&self, automaton: &Automaton) -> Result<String, AutomatonError> {
        let mut out = String::new();
        out.push_str(
            "<anml version=\"1.0\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n",
        );
        let _ = writeln!(out, "<automata-network id=\"{}\">", automaton.id());

        for (_, el) in sorted_by_id(automaton) {
            render_element(&mut out, automaton, el);
        }

        out.push_str("</automata-network>\n");
        out.push_str("</anml>\n");
        Ok(out)
    }
}

fn output_key(automaton: &Automaton, edge: &crate::element::Edge) -> String {
    format!(
        "{}{}",
        automaton.element(edge.target).id(),
        edge.port.as_suffix()
    )
}

fn eod_attr(el: &Element) -> &'static str {
    if el.is_eod() { " high-only-on-eod=\"true\"" } else { "" }
}

fn render_element(out: &mut String, automaton: &Automaton, el: &Element) {
    match el.kind() {
        ElementKind::Ste(ste) => {
            let _ = writeln!(
                out,
                "<state-transition-element id=\"{}\"  symbol-set=\"{}\"  start=\"{}\"{}>",
                el.id(),
                ste.symbol_set(),
                ste.start().as_str(),
                eod_attr(el),
            );
            if el.is_reporting() {
                if el.report_code().is_empty() {
                    out.push_str("\t<report-on-match/>\n");
                } else {
                    let _ = writeln!(
                        out,
                        "\t<report-on-match reportcode=\"{}\"/>",
                        el.report_code()
                    );
                }
            }
            for edge in el.outputs() {
                let _ = writeln!(
                    out,
                    "\t<activate-on-match element=\"{}\"/>",
                    output_key(automaton, edge)
                );
            }
            out.push_str("</state-transition-element>\n");
        }
        ElementKind::Gate(kind) => {
            let tag = match kind {
                GateKind::And => "and",
                GateKind::Or => "or",
                GateKind::Nor => "nor",
                GateKind::Inverter => "inverter",
            };
            let _ = writeln!(out, "<{} id=\"{}\"{}>", tag, el.id(), eod_attr(el));
            for edge in el.outputs() {
                let _ = writeln!(
                    out,
                    "\t<activate-on-high element=\"{}\"/>",
                    output_key(automaton, edge)
                );
            }
            if el.is_reporting() {
                if el.report_code().is_empty() {
                    out.push_str("\t<report-on-high/>\n");
                } else {
                    let _ = writeln!(
                        out,
                        "\t<report-on-high reportcode=\"{}\"/>",
                        el.report_code()
                    );
                }
            }
            let _ = writeln!(out, "</{tag}>");
        }
        ElementKind::Counter(counter) => {
            let _ = writeln!(
                out,
                "<counter id=\"{}\" target=\"{}\" at-target=\"{}\"{}>",
                el.id(),
                counter.target(),
                counter.mode().as_str(),
                eod_attr(el),
            );
            for edge in el.outputs() {
                let _ = writeln!(
                    out,
                    "\t<activate-on-target element=\"{}\"/>",
                    output_key(automaton, edge)
                );
            }
            if el.is_reporting() {
                out.push_str("\t<report-on-target/>\n");
            }
            out.push_str("</counter>\n");
        }
    }
}
