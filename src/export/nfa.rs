/*!
Flat NFA text emitter.

The format consumed by Becchi-style NFA/DFA engines: first line is the
state count, then `#NFA`, one `id : initial` / `id : accepting k` line
per flagged state, and one `from -> to : b0 b1 ...` line per edge. Every
automaton state becomes an NFA *edge* predicate, so a synthetic initial
state 0 with a full `0|255` self-loop fans out to the start states.

Only plain STE graphs can be rendered; special elements are rejected.
*/

use std::collections::{HashMap, VecDeque};
use std::fmt::Write;

use super::Emitter;
use crate::automaton::Automaton;
use crate::element::ElementId;
use crate::errors::AutomatonError;

pub struct FlatNfaEmitter;

impl Emitter for FlatNfaEmitter {
    fn render(&self, automaton: &Automaton) -> Result<String, AutomatonError> {
        for (_, el) in automaton.elements() {
            if el.is_special() {
                return Err(AutomatonError::ElementNotSupported(
                    "flat NFA cannot express special elements".to_string(),
                ));
            }
        }

        let mut body = String::new();
        body.push_str("#NFA\n");

        let mut id_map: HashMap<ElementId, usize> = HashMap::new();
        let mut done: HashMap<ElementId, bool> = HashMap::new();
        let mut state_counter = 0usize;
        let mut accept_counter = 1usize;

        // Synthetic initial state with a full self-loop.
        let initial = state_counter;
        state_counter += 1;
        let _ = writeln!(body, "{initial}: initial");
        let _ = writeln!(body, "0 -> 0 : 0|255");

        // Transitions from the initial state into each start state.
        for &start in automaton.starts() {
            let n = *id_map.entry(start).or_insert_with(|| {
                let n = state_counter;
                state_counter += 1;
                n
            });
            for byte in symbols(automaton, start) {
                let _ = writeln!(body, "0 -> {n} : {byte}");
            }
        }

        let mut to_process: VecDeque<ElementId> = VecDeque::new();
        for &start in automaton.starts() {
            emit_state(
                automaton,
                start,
                &mut body,
                &mut id_map,
                &mut state_counter,
                &mut accept_counter,
                &mut done,
                &mut to_process,
            );
        }

        while let Some(id) = to_process.pop_front() {
            if done.get(&id).copied().unwrap_or(false) {
                continue;
            }
            emit_state(
                automaton,
                id,
                &mut body,
                &mut id_map,
                &mut state_counter,
                &mut accept_counter,
                &mut done,
                &mut to_process,
            );
        }

        Ok(format!("{state_counter}\n{body}"))
    }
}

fn symbols(automaton: &Automaton, id: ElementId) -> Vec<u8> {
    automaton
        .element(id)
        .as_ste()
        .map(|ste| ste.column().ones().collect())
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn emit_state(
    automaton: &Automaton,
    id: ElementId,
    body: &mut String,
    id_map: &mut HashMap<ElementId, usize>,
    state_counter: &mut usize,
    accept_counter: &mut usize,
    done: &mut HashMap<ElementId, bool>,
    to_process: &mut VecDeque<ElementId>,
) {
    done.insert(id, true);
    let state = *id_map.entry(id).or_insert_with(|| {
        let n = *state_counter;
        *state_counter += 1;
        n
    });

    if automaton.element(id).is_reporting() {
        let _ = writeln!(body, "{state} : accepting {accept_counter}");
        *accept_counter += 1;
    }

    for edge in automaton.element(id).outputs() {
        let to = *id_map.entry(edge.target).or_insert_with(|| {
            let n = *state_counter;
            *state_counter += 1;
            n
        });
        let mut first = true;
        for byte in symbols(automaton, edge.target) {
            if first {
                let _ = write!(body, "{state} -> {to} : {byte}");
                first = false;
            } else {
                let _ = write!(body, " {byte}");
            }
        }
        if !first {
            body.push('\n');
        }

        if !done.get(&edge.target).copied().unwrap_or(false) {
            to_process.push_back(edge.target);
        }
    }
}
