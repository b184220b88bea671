/*!
BLIF netlist emitter for automata-to-routing tools.

Every STE becomes a `.subckt ste` instance with 16 enable input pins;
unused pins are tied to the `unconn` dummy net. The 16-pin bound is the
hardware enable limit of the D480 target; exceeding it is a fatal
hardware-constraint error (run fan-in enforcement first). Special
elements have no routing-model counterpart and are skipped. Reporting
STEs drive the implicit output pin instead of an `active` net.
*/

use std::fmt::Write;

use super::Emitter;
use crate::automaton::Automaton;
use crate::errors::AutomatonError;

const STE_ENABLE_LIMIT: usize = 16;

pub struct BlifEmitter;

impl Emitter for BlifEmitter {
    fn render(&self, automaton: &Automaton) -> Result<String, AutomatonError> {
        let mut out = String::new();

        out.push_str(".model blif_by_apsim\n");
        out.push_str(".inputs top.clock \n");
        out.push_str(".outputs outpin\n");
        // This design has no real physical output pins.
        out.push('\n');
        out.push_str(".names unconn\n\n");

        for (id, el) in automaton.elements() {
            if el.is_special() {
                continue;
            }

            out.push_str(".subckt ste ");

            let mut pin = 0usize;
            for sig in el.inputs() {
                if sig.source == id {
                    continue;
                }
                if pin >= STE_ENABLE_LIMIT {
                    return Err(AutomatonError::HardwareConstraint(format!(
                        "automaton fan-in exceeds hardware limit: STE {:?} has more than {} inputs",
                        el.id(),
                        STE_ENABLE_LIMIT
                    )));
                }
                let _ = write!(
                    out,
                    "enable[{pin}]={} ",
                    automaton.element(sig.source).id()
                );
                pin += 1;
            }
            for unused in pin..STE_ENABLE_LIMIT {
                let _ = write!(out, "enable[{unused}]=unconn ");
            }

            if !el.is_reporting() {
                let _ = write!(out, "active={} ", el.id());
            }
            out.push_str("clock=top.clock \n\n");
        }

        out.push_str("\n\n.end\n\n\n");

        // Black-box model for the STE cell.
        out.push_str(".model ste\n.inputs ");
        for pin in 0..STE_ENABLE_LIMIT {
            let _ = write!(out, "enable[{pin}] ");
        }
        out.push_str("clock\n.outputs active\n.blackbox\n.end\n\n");

        Ok(out)
    }
}
