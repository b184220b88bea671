/*!
`.graph` adjacency emitter (graphgrep-style).

First line is the state count; then one line per STE carrying its id, the
256-bit reachability column written msb-first, and the start / startDs /
accept flags; then one adjacency line per STE listing its successors.
Special elements cannot be expressed and are rejected.
*/

use std::fmt::Write;

use super::Emitter;
use crate::automaton::Automaton;
use crate::errors::AutomatonError;

pub struct GraphEmitter;

impl Emitter for GraphEmitter {
    fn render(&self, automaton: &Automaton) -> Result<String, AutomatonError> {
        for (_, el) in automaton.elements() {
            if el.is_special() {
                return Err(AutomatonError::ElementNotSupported(
                    ".graph cannot express special elements".to_string(),
                ));
            }
        }

        let mut out = String::new();
        let _ = writeln!(out, "{}", automaton.element_count());

        for (_, el) in automaton.elements() {
            let ste = el.as_ste().expect("specials rejected above");
            let _ = write!(out, "{} ", el.id());
            for bit in (0u16..256).rev() {
                out.push(if ste.column().test(bit as u8) { '1' } else { '0' });
            }
            let start_flag = if el.is_start() { "1" } else { "0" };
            let accept_flag = if el.is_reporting() { "1" } else { "0" };
            let _ = writeln!(out, " {start_flag} {start_flag} {accept_flag} ");
        }

        for (_, el) in automaton.elements() {
            let _ = write!(out, "{} ", el.id());
            for edge in el.outputs() {
                let _ = write!(out, "{} ", automaton.element(edge.target).id());
            }
            out.push('\n');
        }

        Ok(out)
    }
}
