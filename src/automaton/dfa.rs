/*!
NFA-to-DFA subset construction over homogeneous automata.

Each DFA state stands for a set of NFA STEs. For a given state, the 256
input bytes are grouped by the follow-set they lead to; each distinct
follow-set becomes one DFA STE whose column is the union of the bytes in
its group. Two DFA states are the same only when both the NFA-state set
and the column agree, which is what keeps the construction homogeneous.

Follow-sets always include the start STEs that match the byte, so
all-input starts keep re-arming inside the DFA exactly as they do in the
source NFA. Anchored-only graphs should run `convert_all_input_starts`
first.

The procedure is worst-case exponential in both time and space; progress
is logged so a caller can watch the state count diverge and give up.
*/

use std::collections::{BTreeSet, HashMap, VecDeque};

use super::Automaton;
use crate::bitset::Bitset256;
use crate::element::{Element, ElementId, Port, Start};
use crate::errors::AutomatonError;

impl Automaton {
    /// The set of STEs reachable from `state` on `symbol`: matching
    /// successors of every member, plus every matching start STE.
    pub(crate) fn follow(&self, symbol: u8, state: &BTreeSet<ElementId>) -> BTreeSet<ElementId> {
        let mut follow_set = BTreeSet::new();
        for &start in &self.starts {
            if let Some(ste) = self.element(start).as_ste() {
                if ste.matches(symbol) {
                    follow_set.insert(start);
                }
            }
        }
        for &member in state {
            for edge in self.element(member).outputs() {
                if let Some(ste) = self.element(edge.target).as_ste() {
                    if ste.matches(symbol) {
                        follow_set.insert(edge.target);
                    }
                }
            }
        }
        follow_set
    }

    /// Construct an equivalent homogeneous DFA. The initial DFA state is
    /// the empty set; a DFA STE reports when any member of its NFA set
    /// reports. Special elements are not supported.
    pub fn generate_dfa(&self) -> Result<Automaton, AutomatonError> {
        for (_, el) in self.elements() {
            if el.is_special() {
                return Err(AutomatonError::ElementNotSupported(
                    "cannot determinize an automaton with special elements".to_string(),
                ));
            }
        }
        tracing::info!("generating DFA");

        let mut dfa = Automaton::new(self.id.clone());
        dfa.copy_flags_from(self);

        // DFA-state identity: (NFA-state set, match column).
        let mut known: HashMap<(Vec<u32>, Bitset256), ElementId> = HashMap::new();
        let mut workq: VecDeque<(BTreeSet<ElementId>, Option<ElementId>)> = VecDeque::new();
        workq.push_back((BTreeSet::new(), None));

        let mut state_ids: u32 = 0;
        let mut processed: u64 = 0;

        while let Some((state, dfa_ste)) = workq.pop_front() {
            processed += 1;
            if processed % 64 == 0 {
                tracing::debug!(
                    states = state_ids,
                    queue = workq.len(),
                    "subset construction progress"
                );
            }

            // Group the 256 bytes by the follow-set they produce,
            // accumulating each group's bytes into one column.
            let mut group_index: HashMap<Vec<u32>, usize> = HashMap::new();
            let mut groups: Vec<(BTreeSet<ElementId>, Bitset256)> = Vec::new();
            for symbol in 0u16..256 {
                let follow_set = self.follow(symbol as u8, &state);
                let key: Vec<u32> = follow_set.iter().map(|id| id.0).collect();
                match group_index.get(&key).copied() {
                    Some(i) => groups[i].1.set(symbol as u8),
                    None => {
                        group_index.insert(key, groups.len());
                        let mut column = Bitset256::new();
                        column.set(symbol as u8);
                        groups.push((follow_set, column));
                    }
                }
            }

            for (follow_set, column) in groups {
                let key = (
                    follow_set.iter().map(|id| id.0).collect::<Vec<u32>>(),
                    column,
                );
                let target = match known.get(&key).copied() {
                    Some(existing) => existing,
                    None => {
                        let reporting = follow_set
                            .iter()
                            .any(|&id| self.element(id).is_reporting());
                        // Successors of the implicit initial state are the
                        // DFA's start states.
                        let start = if dfa_ste.is_none() {
                            Start::StartOfData
                        } else {
                            Start::None
                        };
                        let mut el =
                            Element::ste_from_column(state_ids.to_string(), column, start);
                        el.set_reporting(reporting);
                        let new_id = dfa.add_element(el)?;
                        state_ids += 1;
                        known.insert(key, new_id);
                        workq.push_back((follow_set, Some(new_id)));
                        new_id
                    }
                };
                if let Some(source) = dfa_ste {
                    dfa.add_edge_ids(source, target, Port::None);
                }
            }
        }

        tracing::info!(states = state_ids, "DFA construction complete");
        dfa.finalize()?;
        Ok(dfa)
    }
}
