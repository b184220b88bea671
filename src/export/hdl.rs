/*!
Verilog HDL emitter.

Each STE becomes one match register driven by a 256-entry one-hot case
over the `Symbol` byte, enabled by an OR-tree of its predecessors'
registers (all-input starts tie the enable high; start-of-data starts OR
in the start_of_data register). Counters are restricted to latch mode and
become a 12-bit register with count and reset enable OR-trees. Inverters
are combinational. Plain AND/OR/NOR gates have no register mapping here
and are rejected.

Reporting registers are exposed as module outputs under
`<module>$<element>` names.
*/

use std::fmt::Write;

use super::Emitter;
use crate::automaton::Automaton;
use crate::element::{CounterMode, Element, ElementKind, GateKind, Port, Start};
use crate::errors::AutomatonError;

pub struct HdlEmitter {
    module_name: String,
}

impl HdlEmitter {
    pub fn new(module_name: impl Into<String>) -> Self {
        HdlEmitter {
            module_name: module_name.into(),
        }
    }
}

impl Emitter for HdlEmitter {
    fn render(&self, automaton: &Automaton) -> Result<String, AutomatonError> {
        for (_, el) in automaton.elements() {
            match el.kind() {
                ElementKind::Gate(GateKind::Inverter) | ElementKind::Ste(_) => {}
                ElementKind::Counter(c) if c.mode() == CounterMode::Latch => {}
                ElementKind::Counter(_) => {
                    return Err(AutomatonError::ElementNotSupported(format!(
                        "counter {:?} is not latch-mode; only latch counters map to HDL",
                        el.id()
                    )));
                }
                ElementKind::Gate(_) => {
                    return Err(AutomatonError::ElementNotSupported(format!(
                        "gate {:?} has no HDL mapping",
                        el.id()
                    )));
                }
            }
        }

        let module = &self.module_name;
        let mut out = String::new();

        out.push_str("////////////////////////////////////////\n");
        out.push_str("//  Automata match engine\n");
        out.push_str("////////////////////////////////////////\n");
        out.push_str("`timescale 1ns/100ps\n");

        // Module header: clock, reset, symbol stream, one output per
        // reporting element.
        let _ = writeln!(out, "module {module}(");
        out.push_str("\tClk,\n\tRst_n,\n\tSymbol");
        for &r in automaton.reports() {
            let _ = write!(out, ",\n\t{}", reg_name(automaton, module, r));
        }
        out.push_str("\n\t);\n\n");

        out.push_str("\t// Port definitions\n");
        out.push_str("\tinput\tClk;\n");
        out.push_str("\tinput\tRst_n;\n");
        out.push_str("\tinput [0:7]\tSymbol;\n");
        for &r in automaton.reports() {
            let _ = writeln!(out, "\toutput\t{};", reg_name(automaton, module, r));
        }
        out.push('\n');

        out.push_str("\t// Output signal definitions\n");
        for &r in automaton.reports() {
            let _ = writeln!(out, "\treg\t{};", reg_name(automaton, module, r));
        }

        out.push_str("\n\t// Internal variable reg definitions\n");
        for (id, el) in automaton.elements() {
            if el.is_reporting() {
                continue;
            }
            if el.is_stateful() {
                let _ = writeln!(out, "\treg\t{};", reg_name(automaton, module, id));
            } else {
                let _ = writeln!(out, "\twire\t{};", reg_name(automaton, module, id));
            }
        }

        out.push_str("\n\t// cycle counter\n");
        out.push_str("\treg\t[0:31] Cycle;\n");
        out.push_str("\n\t// start of data signal\n");
        out.push_str("\treg\tstart_of_data;\n\n");

        out.push_str("\t// Cycle counter logic\n");
        out.push_str("\t(*dont_touch = \"true\"*) always @(posedge Clk) // should not be optimized\n");
        out.push_str("\tbegin\n");
        out.push_str("\t\tif (Rst_n == 1'b1)\n");
        out.push_str("\t\tbegin\n");
        out.push_str("\t\t\t Cycle <= 32'b00000000000000000000000000000000;\n");
        out.push_str("\t\t\t start_of_data <= 1'b1;\n");
        out.push_str("\t\tend\n");
        out.push_str("\t\telse\n");
        out.push_str("\t\tbegin\n");
        out.push_str("\t\t\t Cycle <= Cycle + 1;\n");
        out.push_str("\t\t\t start_of_data <= 1'b0;\n");
        out.push_str("\t\tend\n");
        out.push_str("\tend\n\n");

        for (id, el) in automaton.elements() {
            match el.kind() {
                ElementKind::Ste(_) => emit_ste(&mut out, automaton, module, id, el),
                ElementKind::Counter(_) => emit_counter(&mut out, automaton, module, id, el),
                ElementKind::Gate(GateKind::Inverter) => {
                    emit_inverter(&mut out, automaton, module, id, el)
                }
                ElementKind::Gate(_) => unreachable!("rejected above"),
            }
        }

        out.push_str("endmodule\n");
        Ok(out)
    }
}

/// Register name of an element: reporting elements carry the module
/// prefix so they can double as output ports.
fn reg_name(automaton: &Automaton, module: &str, id: crate::element::ElementId) -> String {
    let el = automaton.element(id);
    if el.is_reporting() {
        format!("{}${}", module, el.id())
    } else {
        el.id().to_string()
    }
}

/// OR-tree of predecessor registers feeding an enable wire.
fn enable_or_tree(
    automaton: &Automaton,
    module: &str,
    el: &Element,
    port: Option<Port>,
) -> String {
    let mut terms = String::new();
    let mut first = true;
    for sig in el.inputs() {
        if let Some(p) = port {
            if sig.port != p {
                continue;
            }
        }
        let term = reg_name(automaton, module, sig.source);
        if first {
            terms.push_str(&term);
            first = false;
        } else {
            let _ = write!(terms, " | {term}");
        }
    }
    terms
}

fn emit_ste(
    out: &mut String,
    automaton: &Automaton,
    module: &str,
    id: crate::element::ElementId,
    el: &Element,
) {
    let ste = el.as_ste().expect("STE block");
    let reg = reg_name(automaton, module, id);

    out.push_str("\t////////////////\n");
    let _ = writeln!(out, "\t// STE: {}", el.id());
    out.push_str("\t////////////////\n");
    out.push_str("\t// Input enable OR gate\n");
    let enable = format!("{}_EN", el.id());
    let _ = writeln!(out, "\twire\t{enable};");
    if ste.start() == Start::AllInput {
        let _ = writeln!(out, "\tassign {enable} = 1'b1;");
    } else {
        let mut tree = enable_or_tree(automaton, module, el, None);
        if ste.start() == Start::StartOfData {
            if tree.is_empty() {
                tree = "start_of_data".to_string();
            } else {
                let _ = write!(tree, " | start_of_data");
            }
        }
        if tree.is_empty() {
            tree = "1'b0".to_string();
        }
        let _ = writeln!(out, "\tassign {enable} = {tree};");
    }

    out.push_str("\n\t// Match logic and activation register\n");
    out.push_str("\t(*dont_touch = \"true\"*) always @(posedge Clk) // should not be optimized\n");
    out.push_str("\tbegin\n");
    out.push_str("\t\tif (Rst_n == 1'b0)\n");
    let _ = writeln!(out, "\t\t\t{reg} <= 1'b0;");
    let _ = writeln!(out, "\t\telse if ({enable} == 1'b1)");
    out.push_str("\t\t\tcase (Symbol)\n");
    for byte in ste.column().ones() {
        let _ = writeln!(out, "\t\t\t\t8'd{byte}: {reg} <= 1'b1;");
    }
    let _ = writeln!(out, "\t\t\t\tdefault: {reg} <= 1'b0;");
    out.push_str("\t\t\tendcase\n");
    let _ = writeln!(out, "\t\telse {reg} <= 1'b0;");
    out.push_str("\tend\n\n");
}

fn emit_counter(
    out: &mut String,
    automaton: &Automaton,
    module: &str,
    id: crate::element::ElementId,
    el: &Element,
) {
    let counter = el.as_counter().expect("counter block");
    let reg = reg_name(automaton, module, id);

    out.push_str("\t////////////////\n");
    let _ = writeln!(out, "\t// COUNTER: {}", el.id());
    out.push_str("\t////////////////\n");

    out.push_str("\t// Input enable OR gate\n");
    let cnt = format!("{}_CNT", el.id());
    let _ = writeln!(out, "\twire\t{cnt};");
    let cnt_tree = enable_or_tree(automaton, module, el, Some(Port::Count));
    if cnt_tree.is_empty() {
        let _ = writeln!(out, "\tassign {cnt} = 1'b0;");
    } else {
        let _ = writeln!(out, "\tassign {cnt} = {cnt_tree};");
    }

    out.push_str("\t// Input reset OR gate\n");
    let rst = format!("{}_RST", el.id());
    let _ = writeln!(out, "\twire\t{rst};");
    let rst_tree = enable_or_tree(automaton, module, el, Some(Port::Reset));
    if rst_tree.is_empty() {
        let _ = writeln!(out, "\tassign {rst} = 1'b0;");
    } else {
        let _ = writeln!(out, "\tassign {rst} = {rst_tree};");
    }

    // Latch-mode register: counts while below target, then holds the
    // output high until a reset.
    let value = format!("{}_VAL", el.id());
    out.push_str("\t// Counter state\n");
    let _ = writeln!(out, "\treg\t[0:11] {value};");
    out.push_str("\t(*dont_touch = \"true\"*) always @(posedge Clk) // should not be optimized\n");
    out.push_str("\tbegin\n");
    let _ = writeln!(out, "\t\tif (Rst_n == 1'b1 || {rst} == 1'b1)");
    out.push_str("\t\tbegin\n");
    let _ = writeln!(out, "\t\t\t{value} <= 12'd0;");
    let _ = writeln!(out, "\t\t\t{reg} <= 1'b0;");
    out.push_str("\t\tend\n");
    let _ = writeln!(out, "\t\telse if ({reg} == 1'b1)");
    let _ = writeln!(out, "\t\t\t{reg} <= 1'b1;");
    let _ = writeln!(out, "\t\telse if ({cnt} == 1'b1)");
    out.push_str("\t\tbegin\n");
    let _ = writeln!(out, "\t\t\tif ({value} == 12'd{})", counter.target().saturating_sub(1));
    let _ = writeln!(out, "\t\t\t\t{reg} <= 1'b1;");
    out.push_str("\t\t\telse\n");
    let _ = writeln!(out, "\t\t\t\t{value} <= {value} + 1;");
    out.push_str("\t\tend\n");
    out.push_str("\tend\n\n");
}

fn emit_inverter(
    out: &mut String,
    automaton: &Automaton,
    module: &str,
    id: crate::element::ElementId,
    el: &Element,
) {
    let wire = reg_name(automaton, module, id);

    out.push_str("\t////////////////\n");
    let _ = writeln!(out, "\t// INVERTER: {}", el.id());
    out.push_str("\t////////////////\n");
    out.push_str("\t// Input enable OR gate\n");
    let enable = format!("{}_IN", el.id());
    let _ = writeln!(out, "\twire\t{enable};");
    let tree = enable_or_tree(automaton, module, el, None);
    if tree.is_empty() {
        let _ = writeln!(out, "\tassign {enable} = 1'b0;");
    } else {
        let _ = writeln!(out, "\tassign {enable} = {tree};");
    }
    out.push_str("\t// Inverter logic\n");
    let _ = writeln!(out, "\t\tassign {wire} = ~{enable};");
    out.push('\n');
}
