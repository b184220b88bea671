/*!
Structural transforms.

Everything here rewrites the graph in place except `two_stride`, which
builds a new graph. The merges run level-by-level BFS with candidate sets
and are driven to a fixed point by `optimize`; equivalence always ignores
self-loops when comparing neighborhoods but requires both sides to carry
them symmetrically (the input counts include self-loops, so a looping and
a non-looping state never merge).

Language preservation notes:
- OR gates are pure fan-in/fan-out distributors; removal rewires
  predecessors to successors and pushes report status onto predecessors.
- Counter replacement is restricted to the reset-free pulse/roll shape;
  a latch or a reset edge cannot be reproduced by a matcher chain. The
  expansion follows the hardware tool convention of `target` chained
  clones, which trades one cycle of report latency for the counter.
- Dead-state elimination seeds reachability from start states and from
  always-high specials (NOR/Inverter), which act as pseudo-starts.
*/

use std::collections::{HashMap, VecDeque};

use super::Automaton;
use crate::bitset::Bitset256;
use crate::element::{Edge, Element, ElementId, GateKind, Port, Start};
use crate::errors::AutomatonError;

/// Result of 2-striding: the new graph plus the packing width and whether
/// any odd-length path forced a single-symbol dangling state.
pub struct StridedAutomaton {
    pub automaton: Automaton,
    pub bits_per_symbol: u32,
    pub had_odd_tail: bool,
}

impl Automaton {
    // -------------- OR elimination --------------

    /// Remove every OR gate, wiring each predecessor to every successor.
    /// Reporting OR gates push their report status onto all predecessors.
    /// Returns the number of gates removed.
    pub fn remove_or_gates(&mut self) -> u32 {
        let gates: Vec<ElementId> = self
            .specials
            .iter()
            .copied()
            .filter(|&id| matches!(self.element(id).as_gate(), Some(GateKind::Or)))
            .collect();

        let mut removed = 0;
        for g in gates {
            let (reporting, code) = {
                let el = self.element(g);
                (el.is_reporting(), el.report_code().to_string())
            };
            let parents: Vec<ElementId> = self
                .element(g)
                .inputs()
                .iter()
                .map(|s| s.source)
                .filter(|&p| p != g)
                .collect();
            let children: Vec<Edge> = self.element(g).outputs().to_vec();

            if reporting {
                for &p in &parents {
                    let el = self.element_mut(p);
                    el.set_reporting(true);
                    el.set_report_code(code.clone());
                    self.refresh_views(p);
                }
            }
            for &p in &parents {
                for e in &children {
                    if e.target != g {
                        self.add_edge_ids(p, e.target, e.port);
                    }
                }
            }
            self.remove_element(g);
            removed += 1;
        }
        removed
    }

    // -------------- Counter replacement --------------

    /// Replace counters of the safe shape (exactly one `:cnt` STE
    /// predecessor, no `:rst` predecessor, pulse or roll mode, target >= 1)
    /// with a chain of `target` clones of the predecessor. Successors and
    /// report status move to the end of the chain. Returns the number of
    /// counters replaced.
    pub fn replace_counters(&mut self) -> u32 {
        let counters: Vec<ElementId> = self
            .specials
            .iter()
            .copied()
            .filter(|&id| self.element(id).as_counter().is_some())
            .collect();

        let mut replaced = 0;
        for c in counters {
            let (target, mode) = {
                let counter = self.element(c).as_counter().expect("counter id");
                (counter.target(), counter.mode())
            };
            let cnt_sources: Vec<ElementId> = self
                .element(c)
                .inputs()
                .iter()
                .filter(|s| s.port == Port::Count)
                .map(|s| s.source)
                .collect();
            let rst_count = self
                .element(c)
                .inputs()
                .iter()
                .filter(|s| s.port == Port::Reset)
                .count();

            if cnt_sources.len() != 1 || rst_count != 0 {
                continue;
            }
            if matches!(mode, crate::element::CounterMode::Latch) || target == 0 {
                continue;
            }
            let src = cnt_sources[0];
            let Some(src_ste) = self.element(src).as_ste() else {
                continue;
            };
            let (symbol_set, column) = (src_ste.symbol_set().to_string(), *src_ste.column());
            let src_name = self.element(src).id().to_string();
            tracing::debug!(counter = %self.element(c).id(), "expanding counter into matcher chain");

            self.remove_edge_ids(src, c, Port::Count);

            let mut prev = src;
            for i in 0..target {
                let name = self.fresh_id(&format!("{src_name}_cnt{i}"));
                let clone =
                    Element::ste_with(name, symbol_set.clone(), column, Start::None);
                let nid = self.insert_unchecked(clone);
                self.add_edge_ids(prev, nid, Port::None);
                prev = nid;
            }

            let (reporting, code) = {
                let el = self.element(c);
                (el.is_reporting(), el.report_code().to_string())
            };
            for e in self.element(c).outputs().to_vec() {
                if e.target != c {
                    self.add_edge_ids(prev, e.target, e.port);
                }
            }
            if reporting {
                let el = self.element_mut(prev);
                el.set_reporting(true);
                el.set_report_code(code);
                self.refresh_views(prev);
            }
            self.remove_element(c);
            replaced += 1;
        }
        replaced
    }

    // -------------- Prefix / suffix / path merging --------------

    /// Merge left-equivalent STEs level by level, starting from the start
    /// states. Returns the number of elements merged away.
    pub fn merge_common_prefixes(&mut self) -> u32 {
        self.unmark_all();
        let mut first = Vec::new();
        for id in self.starts.clone() {
            self.mark(id);
            first.push(id);
        }
        self.merge_levels(first, true)
    }

    /// Merge right-equivalent STEs level by level, walking incoming edges
    /// from the reporting states. Returns the number of elements merged.
    pub fn merge_common_suffixes(&mut self) -> u32 {
        self.unmark_all();
        let mut first = Vec::new();
        for id in self.reports.clone() {
            if !self.element(id).is_special() {
                self.mark(id);
                first.push(id);
            }
        }
        self.merge_levels(first, false)
    }

    /// Shared candidate-set walker for prefix (forward) and suffix
    /// (backward) merging.
    fn merge_levels(&mut self, first: Vec<ElementId>, forward: bool) -> u32 {
        let mut merged = 0;
        let mut workq: VecDeque<Vec<ElementId>> = VecDeque::new();
        workq.push_back(first);

        while let Some(set) = workq.pop_front() {
            let mut candidates: VecDeque<ElementId> = set.into();
            while let Some(leader) = candidates.pop_front() {
                if !self.contains(leader) {
                    continue;
                }
                let mut kept = VecDeque::new();
                while let Some(other) = candidates.pop_front() {
                    if !self.contains(other) {
                        continue;
                    }
                    let equivalent = if forward {
                        self.left_equivalent(leader, other)
                    } else {
                        self.right_equivalent(leader, other)
                    };
                    if equivalent {
                        if forward {
                            self.left_merge(leader, other);
                        } else {
                            self.right_merge(leader, other);
                        }
                        merged += 1;
                    } else {
                        kept.push_back(other);
                    }
                }

                // The next level: unvisited STE neighbors of the leader.
                let neighbors: Vec<ElementId> = if forward {
                    self.element(leader)
                        .outputs()
                        .iter()
                        .map(|e| e.target)
                        .collect()
                } else {
                    self.element(leader)
                        .inputs()
                        .iter()
                        .map(|s| s.source)
                        .collect()
                };
                let mut next = Vec::new();
                for n in neighbors {
                    if self.element(n).is_special() {
                        continue;
                    }
                    if !self.is_marked(n) {
                        self.mark(n);
                        next.push(n);
                    }
                }
                if !next.is_empty() {
                    workq.push_back(next);
                }
                candidates = kept;
            }
        }
        merged
    }

    /// Left equivalence: same column, start type, end-of-data flag, and
    /// non-self incoming neighborhood; reporting states never merge.
    fn left_equivalent(&self, a: ElementId, b: ElementId) -> bool {
        let (ea, eb) = (self.element(a), self.element(b));
        let (Some(sa), Some(sb)) = (ea.as_ste(), eb.as_ste()) else {
            return false;
        };
        if sa.column() != sb.column() || sa.start() != sb.start() {
            return false;
        }
        if ea.is_reporting() || eb.is_reporting() {
            return false;
        }
        if ea.is_eod() != eb.is_eod() {
            return false;
        }
        // Sizes include self-loops so a looping and a non-looping state
        // never pass; the key comparison then ignores the loops.
        if ea.inputs().len() != eb.inputs().len() {
            return false;
        }
        self.input_keys(a) == self.input_keys(b)
    }

    /// Right equivalence: same column, start type, report status and code,
    /// and non-self outgoing neighborhood.
    fn right_equivalent(&self, a: ElementId, b: ElementId) -> bool {
        let (ea, eb) = (self.element(a), self.element(b));
        let (Some(sa), Some(sb)) = (ea.as_ste(), eb.as_ste()) else {
            return false;
        };
        if sa.column() != sb.column() || sa.start() != sb.start() {
            return false;
        }
        if ea.is_reporting() != eb.is_reporting() || ea.report_code() != eb.report_code() {
            return false;
        }
        if ea.is_eod() != eb.is_eod() {
            return false;
        }
        if ea.outputs().len() != eb.outputs().len() {
            return false;
        }
        self.output_keys(a) == self.output_keys(b)
    }

    fn input_keys(&self, id: ElementId) -> Vec<(String, Port)> {
        let mut keys: Vec<(String, Port)> = self
            .element(id)
            .inputs()
            .iter()
            .filter(|s| s.source != id)
            .map(|s| (self.element(s.source).id().to_string(), s.port))
            .collect();
        keys.sort();
        keys
    }

    fn output_keys(&self, id: ElementId) -> Vec<(String, Port)> {
        let mut keys: Vec<(String, Port)> = self
            .element(id)
            .outputs()
            .iter()
            .filter(|e| e.target != id)
            .map(|e| (self.element(e.target).id().to_string(), e.port))
            .collect();
        keys.sort();
        keys
    }

    /// Transfer all outgoing edges of `gone` onto `keep`, then delete
    /// `gone`. Self-loops vanish with the deleted element; `keep` retains
    /// its own.
    pub fn left_merge(&mut self, keep: ElementId, gone: ElementId) {
        for edge in self.element(gone).outputs().to_vec() {
            if edge.target != gone {
                self.add_edge_ids(keep, edge.target, edge.port);
            }
        }
        self.remove_element(gone);
    }

    /// Transfer all incoming edges of `gone` onto `keep`, then delete
    /// `gone`.
    pub fn right_merge(&mut self, keep: ElementId, gone: ElementId) {
        for sig in self.element(gone).inputs().to_vec() {
            if sig.source != gone {
                self.add_edge_ids(sig.source, keep, sig.port);
            }
        }
        self.remove_element(gone);
    }

    /// Merge sibling STEs that share identical input and output
    /// neighborhoods into one STE carrying the union of their columns.
    /// Reporting and special elements are skipped. Returns the number of
    /// elements merged away.
    pub fn merge_common_paths(&mut self) -> u32 {
        let mut merged = 0;
        self.unmark_all();
        let mut to_remove: Vec<ElementId> = Vec::new();

        for el_id in self.element_ids() {
            if self.is_marked(el_id) {
                continue;
            }
            self.mark(el_id);
            {
                let el = self.element(el_id);
                if el.is_special() || el.is_reporting() {
                    continue;
                }
            }

            // Candidates are the other parents of this element's children.
            let children: Vec<ElementId> =
                self.element(el_id).outputs().iter().map(|e| e.target).collect();
            for child in children {
                if self.element(child).is_special() {
                    continue;
                }
                let siblings: Vec<ElementId> = self
                    .element(child)
                    .inputs()
                    .iter()
                    .map(|s| s.source)
                    .collect();
                for sib in siblings {
                    if sib == el_id || self.is_marked(sib) {
                        continue;
                    }
                    let sib_el = self.element(sib);
                    if sib_el.is_special() || sib_el.is_reporting() {
                        continue;
                    }
                    if self.identical_inputs(el_id, sib) && self.identical_outputs(el_id, sib)
                    {
                        let Some(column) = self.element(sib).as_ste().map(|s| *s.column())
                        else {
                            continue;
                        };
                        if let Some(ste) = self.element_mut(el_id).as_ste_mut() {
                            ste.union_column(&column);
                        }
                        self.mark(sib);
                        to_remove.push(sib);
                        merged += 1;
                    }
                }
            }
        }

        for id in to_remove {
            self.remove_element(id);
        }
        merged
    }

    fn identical_inputs(&self, a: ElementId, b: ElementId) -> bool {
        let mut ka: Vec<(ElementId, Port)> = self
            .element(a)
            .inputs()
            .iter()
            .map(|s| (s.source, s.port))
            .collect();
        let mut kb: Vec<(ElementId, Port)> = self
            .element(b)
            .inputs()
            .iter()
            .map(|s| (s.source, s.port))
            .collect();
        ka.sort();
        kb.sort();
        ka == kb
    }

    fn identical_outputs(&self, a: ElementId, b: ElementId) -> bool {
        let mut ka: Vec<(ElementId, Port)> = self
            .element(a)
            .outputs()
            .iter()
            .map(|e| (e.target, e.port))
            .collect();
        let mut kb: Vec<(ElementId, Port)> = self
            .element(b)
            .outputs()
            .iter()
            .map(|e| (e.target, e.port))
            .collect();
        ka.sort();
        kb.sort();
        ka == kb
    }

    // -------------- Fan-in / fan-out enforcement --------------

    /// Split every STE whose non-self fan-in exceeds `fanin_max` into
    /// clones that each take a slice of the inputs and replicate all
    /// outputs. Self-loops are preserved per clone.
    pub fn enforce_fan_in(&mut self, fanin_max: usize) {
        if fanin_max == 0 {
            return;
        }
        self.unmark_all();
        let mut workq: VecDeque<ElementId> = VecDeque::new();
        for id in self.element_ids() {
            if self.element(id).is_start() {
                self.mark(id);
                workq.push_back(id);
            }
        }

        while let Some(s) = workq.pop_front() {
            if !self.contains(s) {
                continue;
            }

            // Walk forward regardless of whether this node splits.
            for edge in self.element(s).outputs().to_vec() {
                let child = edge.target;
                if !self.element(child).is_special() && !self.is_marked(child) {
                    self.mark(child);
                    workq.push_back(child);
                }
            }

            let inputs: Vec<(ElementId, Port)> = self
                .element(s)
                .inputs()
                .iter()
                .filter(|sig| sig.source != s)
                .map(|sig| (sig.source, sig.port))
                .collect();
            if inputs.len() <= fanin_max {
                continue;
            }
            let self_loop = self.element(s).is_self_ref();
            let outputs: Vec<Edge> = self
                .element(s)
                .outputs()
                .iter()
                .copied()
                .filter(|e| e.target != s)
                .collect();
            let snapshot = self.ste_snapshot(s);

            let clones = inputs.len().div_ceil(fanin_max);
            let mut remaining: VecDeque<(ElementId, Port)> = inputs.into();
            for i in 0..clones {
                let nid = self.spawn_clone(&snapshot, i);
                self.mark(nid);
                for e in &outputs {
                    self.add_edge_ids(nid, e.target, e.port);
                    // The extra input may push the child over the limit
                    // later; reconsider it even if already visited.
                    if !self.element(e.target).is_special() {
                        workq.push_back(e.target);
                    }
                }
                for _ in 0..fanin_max {
                    match remaining.pop_front() {
                        Some((src, port)) => self.add_edge_ids(src, nid, port),
                        None => break,
                    }
                }
                if self_loop {
                    self.add_edge_ids(nid, nid, Port::None);
                }
            }
            self.remove_element(s);
        }
    }

    /// Split every STE whose non-self fan-out exceeds `fanout_max` into
    /// clones that each take a slice of the outputs and replicate all
    /// inputs. Walks backward from the reporting states.
    pub fn enforce_fan_out(&mut self, fanout_max: usize) {
        if fanout_max == 0 {
            return;
        }
        self.unmark_all();
        let mut workq: VecDeque<ElementId> = VecDeque::new();
        for id in self.element_ids() {
            let el = self.element(id);
            if !el.is_special() && el.is_reporting() {
                self.mark(id);
                workq.push_back(id);
            }
        }

        while let Some(s) = workq.pop_front() {
            if !self.contains(s) {
                continue;
            }

            for sig in self.element(s).inputs().to_vec() {
                let parent = sig.source;
                if !self.element(parent).is_special() && !self.is_marked(parent) {
                    self.mark(parent);
                    workq.push_back(parent);
                }
            }

            let outputs: Vec<Edge> = self
                .element(s)
                .outputs()
                .iter()
                .copied()
                .filter(|e| e.target != s)
                .collect();
            if outputs.len() <= fanout_max {
                continue;
            }
            let self_loop = self.element(s).is_self_ref();
            let inputs: Vec<(ElementId, Port)> = self
                .element(s)
                .inputs()
                .iter()
                .filter(|sig| sig.source != s)
                .map(|sig| (sig.source, sig.port))
                .collect();
            let snapshot = self.ste_snapshot(s);

            let clones = outputs.len().div_ceil(fanout_max);
            let mut remaining: VecDeque<Edge> = outputs.into();
            for i in 0..clones {
                let nid = self.spawn_clone(&snapshot, i);
                self.mark(nid);
                for &(src, port) in &inputs {
                    self.add_edge_ids(src, nid, port);
                    // Feeding another clone may violate the parent's own
                    // fan-out; reconsider it.
                    if !self.element(src).is_special() {
                        workq.push_back(src);
                    }
                }
                for _ in 0..fanout_max {
                    match remaining.pop_front() {
                        Some(e) => self.add_edge_ids(nid, e.target, e.port),
                        None => break,
                    }
                }
                if self_loop {
                    self.add_edge_ids(nid, nid, Port::None);
                }
            }
            self.remove_element(s);
        }
    }

    /// Snapshot the clonable attributes of an STE.
    fn ste_snapshot(&self, id: ElementId) -> CloneSeed {
        let el = self.element(id);
        let ste = el.as_ste().expect("fan enforcement visits STEs only");
        CloneSeed {
            base: el.id().to_string(),
            symbol_set: ste.symbol_set().to_string(),
            column: *ste.column(),
            start: ste.start(),
            reporting: el.is_reporting(),
            report_code: el.report_code().to_string(),
            eod: el.is_eod(),
        }
    }

    fn spawn_clone(&mut self, seed: &CloneSeed, index: usize) -> ElementId {
        let name = self.fresh_id(&format!("{}_{}", seed.base, index));
        let mut el =
            Element::ste_with(name, seed.symbol_set.clone(), seed.column, seed.start);
        el.set_reporting(seed.reporting);
        el.set_report_code(seed.report_code.clone());
        el.set_eod(seed.eod);
        self.insert_unchecked(el)
    }

    /// First free id derived from `base` by appending a counter.
    pub(crate) fn fresh_id(&self, base: &str) -> String {
        if !self.id_map.contains_key(base) {
            return base.to_string();
        }
        let mut n = 0usize;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.id_map.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // -------------- Widening --------------

    /// Insert a `[\x00]` pad after every STE: successors and report status
    /// move to the pad. Required by byte-padded malware rule sets.
    pub fn widen(&mut self) -> Result<(), AutomatonError> {
        let stes: Vec<ElementId> = self
            .element_ids()
            .into_iter()
            .filter(|&id| !self.element(id).is_special())
            .collect();

        for s in stes {
            let name = {
                let base = format!("{}_widened", self.element(s).id());
                self.fresh_id(&base)
            };
            let mut pad_column = Bitset256::new();
            pad_column.set(0);
            let pad = Element::ste_with(name, "[\\x00]".to_string(), pad_column, Start::None);
            let pid = self.insert_unchecked(pad);

            let outputs: Vec<Edge> = self.element(s).outputs().to_vec();
            for e in &outputs {
                self.add_edge_ids(pid, e.target, e.port);
            }
            for e in &outputs {
                self.remove_edge_ids(s, e.target, e.port);
            }
            self.add_edge_ids(s, pid, Port::None);

            let (reporting, code) = {
                let el = self.element(s);
                (el.is_reporting(), el.report_code().to_string())
            };
            if reporting {
                self.element_mut(s).set_reporting(false);
                let pad_el = self.element_mut(pid);
                pad_el.set_reporting(true);
                pad_el.set_report_code(code);
                self.refresh_views(s);
                self.refresh_views(pid);
            }
        }

        self.finalize()
    }

    // -------------- 2-striding --------------

    /// Build an automaton consuming two symbols per cycle. Valid only when
    /// every STE matches within `[0, 127]` and the packed pair fits one
    /// byte. Start types propagate from the first element of a pair,
    /// reporting from either; odd-length paths leave a single-symbol state
    /// with a shifted column and set `had_odd_tail`.
    pub fn two_stride(&self) -> Result<StridedAutomaton, AutomatonError> {
        for (_, el) in self.elements() {
            if el.is_special() {
                return Err(AutomatonError::ElementNotSupported(
                    "cannot stride an automaton with special elements".to_string(),
                ));
            }
        }

        let mut largest: u32 = 0;
        for (_, el) in self.elements() {
            if let Some(ste) = el.as_ste() {
                if let Some(max) = ste.column().ones().last() {
                    largest = largest.max(u32::from(max));
                }
            }
        }
        if largest > 127 {
            return Err(AutomatonError::ElementNotSupported(format!(
                "symbol {largest} too large to stride"
            )));
        }
        let mut k: u32 = 1;
        while (1u32 << k) <= largest {
            k += 1;
        }
        if 2 * k > 8 {
            return Err(AutomatonError::ElementNotSupported(format!(
                "{k}-bit symbols do not pack into one byte"
            )));
        }
        let num_symbols = 1u32 << k;
        tracing::debug!(bits_per_symbol = k, "striding automaton");

        let mut out = Automaton::new(self.id.clone());
        out.copy_flags_from(self);

        let mut head_to_pairs: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        let mut pair_to_tails: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        let mut visited = vec![false; self.slots.len()];
        let mut workq: VecDeque<ElementId> = VecDeque::new();
        let mut id_counter = 0u32;
        let mut had_odd_tail = false;

        for &s in &self.starts {
            visited[s.index()] = true;
            workq.push_back(s);
        }

        while let Some(s1) = workq.pop_front() {
            let s1_el = self.element(s1);
            let s1_ste = s1_el.as_ste().expect("specials rejected above");
            let children: Vec<ElementId> =
                s1_el.outputs().iter().map(|e| e.target).collect();

            if children.is_empty() {
                // Dangling head of an odd-length path: shift its column
                // into the high half and emit it alone.
                had_odd_tail = true;
                let mut column = Bitset256::new();
                for c1 in 0..num_symbols {
                    if s1_ste.matches(c1 as u8) {
                        column.set((c1 << k) as u8);
                    }
                }
                let mut node =
                    Element::ste_from_column(format!("__{id_counter}__"), column, s1_ste.start());
                id_counter += 1;
                node.set_reporting(s1_el.is_reporting());
                node.set_report_code(s1_el.report_code());
                let nid = out.insert_unchecked(node);
                head_to_pairs.entry(s1).or_default().push(nid);
            }

            for s2 in children {
                let s2_el = self.element(s2);
                let s2_ste = s2_el.as_ste().expect("specials rejected above");

                let mut column = Bitset256::new();
                for c1 in 0..num_symbols {
                    if !s1_ste.matches(c1 as u8) {
                        continue;
                    }
                    for c2 in 0..num_symbols {
                        if s2_ste.matches(c2 as u8) {
                            column.set(((c2 << k) | c1) as u8);
                        }
                    }
                }

                let start = if s1_el.is_start() { s1_ste.start() } else { Start::None };
                let mut pair =
                    Element::ste_from_column(format!("__{id_counter}__"), column, start);
                id_counter += 1;
                if s1_el.is_reporting() || s2_el.is_reporting() {
                    pair.set_reporting(true);
                    if !s1_el.report_code().is_empty() {
                        pair.set_report_code(s1_el.report_code());
                    }
                    if !s2_el.report_code().is_empty() {
                        pair.set_report_code(s2_el.report_code());
                    }
                }
                let nid = out.insert_unchecked(pair);
                head_to_pairs.entry(s1).or_default().push(nid);
                pair_to_tails.entry(nid).or_default().push(s2);

                for e in s2_el.outputs() {
                    if !visited[e.target.index()] {
                        visited[e.target.index()] = true;
                        workq.push_back(e.target);
                    }
                }
            }
        }

        if had_odd_tail {
            tracing::warn!("potential odd-length input; pad the stream");
        }

        // Second pass: connect (s1,s2) -> (s2,s3) for every successor s3.
        for new_id in out.element_ids() {
            let Some(tails) = pair_to_tails.get(&new_id) else {
                continue;
            };
            for &tail in tails {
                for e in self.element(tail).outputs() {
                    if let Some(strided_children) = head_to_pairs.get(&e.target) {
                        for &child in strided_children {
                            out.add_edge_ids(new_id, child, Port::None);
                        }
                    }
                }
            }
        }

        Ok(StridedAutomaton {
            automaton: out,
            bits_per_symbol: k,
            had_odd_tail,
        })
    }

    // -------------- Dead states and redundant edges --------------

    /// Remove elements from which no reporting element is reachable, then
    /// elements unreachable from any start state or always-high special.
    pub fn eliminate_dead_states(&mut self) {
        // Phase 1: can this element ever contribute to a report?
        let mut to_remove: Vec<ElementId> = Vec::new();
        for el_id in self.element_ids() {
            let mut reachable = self.element(el_id).is_reporting();
            if !reachable {
                let mut visited = vec![false; self.slots.len()];
                let mut workq: VecDeque<ElementId> = VecDeque::new();
                visited[el_id.index()] = true;
                workq.push_back(el_id);
                while let Some(current) = workq.pop_front() {
                    if reachable {
                        break;
                    }
                    for e in self.element(current).outputs() {
                        if self.element(e.target).is_reporting() {
                            reachable = true;
                            break;
                        }
                        if !visited[e.target.index()] {
                            visited[e.target.index()] = true;
                            workq.push_back(e.target);
                        }
                    }
                }
            }
            if !reachable {
                to_remove.push(el_id);
            }
        }
        let removed_unproductive = to_remove.len();
        for id in to_remove {
            self.remove_element(id);
        }

        // Phase 2: is this element reachable from anything that can fire
        // on its own? NOR and Inverter behave as pseudo-starts here.
        let mut visited = vec![false; self.slots.len()];
        let mut workq: VecDeque<ElementId> = VecDeque::new();
        let seeds: Vec<ElementId> = self
            .starts
            .iter()
            .chain(self.activate_no_input_specials.iter())
            .copied()
            .filter(|&id| self.contains(id))
            .collect();
        for seed in seeds {
            if !visited[seed.index()] {
                visited[seed.index()] = true;
                workq.push_back(seed);
            }
        }
        while let Some(current) = workq.pop_front() {
            for e in self.element(current).outputs() {
                if !visited[e.target.index()] {
                    visited[e.target.index()] = true;
                    workq.push_back(e.target);
                }
            }
        }
        let dead: Vec<ElementId> = self
            .element_ids()
            .into_iter()
            .filter(|id| !visited[id.index()])
            .collect();
        tracing::debug!(
            unproductive = removed_unproductive,
            unreachable = dead.len(),
            "eliminated dead states"
        );
        for id in dead {
            self.remove_element(id);
        }
    }

    /// Remove inbound edges to `all-input` start states; such starts are
    /// enabled every cycle, making the edges redundant.
    pub fn remove_redundant_edges(&mut self) {
        for s in self.starts.clone() {
            let all_input = self
                .element(s)
                .as_ste()
                .is_some_and(|ste| ste.start() == Start::AllInput);
            if !all_input {
                continue;
            }
            for sig in self.element(s).inputs().to_vec() {
                self.remove_edge_ids(sig.source, s, sig.port);
            }
        }
    }

    /// Convert every start state to `start-of-data`, installing a
    /// self-looping `*` state that re-enables them each cycle. Needed by
    /// forms (like the DFA path) that cannot express all-input starts.
    pub fn convert_all_input_starts(&mut self) -> Result<(), AutomatonError> {
        let existing = self.starts.clone();
        let name = self.fresh_id("STAR_START");
        let star = Element::ste(&name, "*", Start::StartOfData)?;
        let star_id = self.add_element(star)?;
        self.add_edge_ids(star_id, star_id, Port::None);

        for s in existing {
            if let Some(ste) = self.element_mut(s).as_ste_mut() {
                if ste.start() != Start::StartOfData {
                    ste.set_start(Start::StartOfData);
                }
            }
            self.add_edge_ids(star_id, s, Port::None);
        }
        Ok(())
    }

    // -------------- Optimization driver --------------

    /// Run the selected reduction passes to a global fixed point.
    pub fn optimize(&mut self, remove_ors: bool, prefix: bool, suffix: bool, path: bool) {
        if remove_ors {
            let removed = self.remove_or_gates();
            tracing::info!(removed, "removed OR gates");
        }

        let mut total = usize::MAX;
        while total != self.element_count() {
            total = self.element_count();

            if prefix {
                let mut pass_size = usize::MAX;
                let mut merged = 0;
                while pass_size != self.element_count() {
                    pass_size = self.element_count();
                    merged += self.merge_common_prefixes();
                }
                tracing::info!(merged, "merged common prefixes");
            }
            if suffix {
                let mut pass_size = usize::MAX;
                let mut merged = 0;
                while pass_size != self.element_count() {
                    pass_size = self.element_count();
                    merged += self.merge_common_suffixes();
                }
                tracing::info!(merged, "merged common suffixes");
            }
            if path {
                let mut pass_size = usize::MAX;
                let mut merged = 0;
                while pass_size != self.element_count() {
                    pass_size = self.element_count();
                    merged += self.merge_common_paths();
                }
                tracing::info!(merged, "merged common paths");
            }
        }
    }
}

/// Attributes carried onto fan-in/fan-out clones.
struct CloneSeed {
    base: String,
    symbol_set: String,
    column: Bitset256,
    start: Start,
    reporting: bool,
    report_code: String,
    eod: bool,
}
