/*!
Automaton graph container and its submodules.

Overview
- This directory holds the graph façade and the focused subsystems that
  operate on it. The `Automaton` struct owns every element in an arena and
  maintains the derived views (starts, reports, special elements) that the
  simulator and the transforms rely on.

Modules and responsibilities
- Automaton: element arena, string-id side map, edge mutation with port
  reconciliation, finalization (special-element ordering), validation,
  cloning/merging/splitting, graph statistics. Implemented here.
- simulate: the per-symbol cycle engine (enable/match/propagate/settle),
  batch driving with the end-of-data policy, the report log, reset.
- profile: per-element and per-cycle activity accumulators, activation
  histogram, enable-capture distribution.
- transform: structural rewrites (OR elimination, counter replacement,
  prefix/suffix/path merges, fan-in/out enforcement, widening, striding,
  dead-state elimination, redundant edges, all-input conversion).
- dfa: NFA-to-DFA subset construction.

Invariants
- Edges are bidirectional: `A.outputs` holds `(B, port)` iff `B.inputs`
  holds `(A, port)`. `validate` enforces this.
- `ElementId`s are arena slots; deleting an element tombstones its slot, so
  a stored id is only valid while its element lives.
- Traversals use a per-element epoch stamp against the graph epoch instead
  of a mark bit, making `unmark_all` O(1). Concurrent traversals on one
  graph are not supported.
*/

pub mod dfa;
pub mod profile;
pub mod simulate;
pub mod transform;

pub use simulate::{EodPolicy, Report};

use std::collections::{HashMap, VecDeque};

use crate::charset::qm_complexity;
use crate::element::{Edge, Element, ElementId, Port};
use crate::errors::AutomatonError;
use profile::Profiler;

/// A homogeneous automaton: element arena plus derived views and the
/// runtime state of its simulator.
#[derive(Debug)]
pub struct Automaton {
    pub(crate) id: String,

    // Arena and string-id side map.
    pub(crate) slots: Vec<Option<Element>>,
    pub(crate) id_map: HashMap<String, ElementId>,

    // Derived views; membership mirrors element flags.
    pub(crate) starts: Vec<ElementId>,
    pub(crate) reports: Vec<ElementId>,
    pub(crate) specials: Vec<ElementId>,
    pub(crate) activate_no_input_specials: Vec<ElementId>,
    pub(crate) ordered_specials: Vec<ElementId>,

    // Simulation options.
    pub(crate) profile_enabled: bool,
    pub(crate) eod_policy: EodPolicy,
    pub(crate) dump_state_cycle: Option<u64>,

    // Simulation state.
    pub(crate) end_of_data: bool,
    pub(crate) cycle: u64,
    pub(crate) enabled_stes: Vec<ElementId>,
    pub(crate) activated_stes: Vec<ElementId>,
    pub(crate) report_log: Vec<Report>,
    pub(crate) profiler: Profiler,

    // Traversal epoch; an element is "marked" when its stamp equals this.
    pub(crate) epoch: u64,

    // Latest error for callers that poll instead of chaining Results.
    pub(crate) last_error: Option<AutomatonError>,
}

impl Automaton {
    pub fn new(id: impl Into<String>) -> Self {
        Automaton {
            id: id.into(),
            slots: Vec::new(),
            id_map: HashMap::new(),
            starts: Vec::new(),
            reports: Vec::new(),
            specials: Vec::new(),
            activate_no_input_specials: Vec::new(),
            ordered_specials: Vec::new(),
            profile_enabled: false,
            eod_policy: EodPolicy::default(),
            dump_state_cycle: None,
            end_of_data: false,
            cycle: 0,
            enabled_stes: Vec::new(),
            activated_stes: Vec::new(),
            report_log: Vec::new(),
            profiler: Profiler::default(),
            epoch: 1,
            last_error: None,
        }
    }

    // -------------- Identity and options --------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn set_profile(&mut self, enabled: bool) {
        self.profile_enabled = enabled;
    }

    pub fn set_eod_policy(&mut self, policy: EodPolicy) {
        self.eod_policy = policy;
    }

    /// Log the enabled/activated element sets when the given cycle's match
    /// phase completes; `None` disables dumping.
    pub fn set_dump_state_cycle(&mut self, cycle: Option<u64>) {
        self.dump_state_cycle = cycle;
    }

    pub fn copy_flags_from(&mut self, other: &Automaton) {
        self.profile_enabled = other.profile_enabled;
        self.eod_policy = other.eod_policy;
        self.dump_state_cycle = other.dump_state_cycle;
    }

    // -------------- Element access --------------

    /// Borrow an element. Panics on a stale id; stored ids are only valid
    /// while their element is in the graph.
    pub fn element(&self, id: ElementId) -> &Element {
        self.slots[id.index()].as_ref().expect("stale element id")
    }

    pub fn element_mut(&mut self, id: ElementId) -> &mut Element {
        self.slots[id.index()].as_mut().expect("stale element id")
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.slots.get(id.index()).is_some_and(|s| s.is_some())
    }

    /// Resolve a wire key (`id` or `id:port`) to an element. A miss records
    /// an `ElementNotFound` in the latest-error slot.
    pub fn lookup(&mut self, key: &str) -> Option<ElementId> {
        let base = key.split_once(':').map_or(key, |(b, _)| b);
        match self.id_map.get(base) {
            Some(&id) => Some(id),
            None => {
                tracing::warn!(element = base, "element was not found");
                self.last_error = Some(AutomatonError::ElementNotFound(base.to_string()));
                None
            }
        }
    }

    fn lookup_or_err(&mut self, key: &str) -> Result<ElementId, AutomatonError> {
        let base = key.split_once(':').map_or(key, |(b, _)| b);
        self.lookup(base)
            .ok_or_else(|| AutomatonError::ElementNotFound(base.to_string()))
    }

    /// Iterate live elements in arena order.
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|el| (ElementId::new(i), el)))
    }

    /// Snapshot of live element ids, safe to hold across mutation.
    pub fn element_ids(&self) -> Vec<ElementId> {
        self.elements().map(|(id, _)| id).collect()
    }

    pub fn element_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn starts(&self) -> &[ElementId] {
        &self.starts
    }

    pub fn reports(&self) -> &[ElementId] {
        &self.reports
    }

    pub fn special_elements(&self) -> &[ElementId] {
        &self.specials
    }

    pub fn ordered_special_elements(&self) -> &[ElementId] {
        &self.ordered_specials
    }

    /// Special elements whose output can be high with no enabled
    /// predecessor (NOR, Inverter).
    pub fn activate_no_input_special_elements(&self) -> &[ElementId] {
        &self.activate_no_input_specials
    }

    // -------------- Element mutation --------------

    /// Add an element; its string id must be unused.
    pub fn add_element(&mut self, el: Element) -> Result<ElementId, AutomatonError> {
        if self.id_map.contains_key(el.id()) {
            return Err(AutomatonError::MalformedAutomaton(format!(
                "duplicate element id {:?}",
                el.id()
            )));
        }
        Ok(self.insert_unchecked(el))
    }

    /// Add an element without a collision check. Used by unsafe merges,
    /// where the caller guarantees disjoint identifier spaces.
    pub(crate) fn insert_unchecked(&mut self, mut el: Element) -> ElementId {
        let id = ElementId::new(self.slots.len());
        el.int_id = id.0;
        el.epoch = 0;
        self.id_map.insert(el.id.clone(), id);

        if el.is_start() {
            self.starts.push(id);
        }
        if el.is_reporting() {
            self.reports.push(id);
        }
        if el.is_special() {
            self.specials.push(id);
            if el.can_activate_without_enable() {
                self.activate_no_input_specials.push(id);
            }
        }

        self.slots.push(Some(el));
        id
    }

    /// Add an STE and connect it to each wire key in `outputs`.
    pub fn add_ste_with_outputs(
        &mut self,
        el: Element,
        outputs: &[&str],
    ) -> Result<ElementId, AutomatonError> {
        let id = self.add_element(el)?;
        let from = self.element(id).id().to_string();
        for out in outputs {
            self.add_edge(&from, out)?;
        }
        Ok(id)
    }

    /// Remove an element, detaching it from every neighbor and view.
    pub fn remove_element(&mut self, id: ElementId) {
        let outputs: Vec<Edge> = self.element(id).outputs.clone();
        let inputs: Vec<(ElementId, Port)> = self
            .element(id)
            .inputs
            .iter()
            .map(|s| (s.source, s.port))
            .collect();

        for e in outputs {
            if e.target != id {
                self.element_mut(e.target).remove_input(id, e.port);
            }
        }
        for (source, port) in inputs {
            if source != id {
                self.element_mut(source).remove_output(id, port);
            }
        }

        self.starts.retain(|&s| s != id);
        self.reports.retain(|&r| r != id);
        self.specials.retain(|&s| s != id);
        self.activate_no_input_specials.retain(|&s| s != id);
        self.ordered_specials.retain(|&s| s != id);

        let el = self.slots[id.index()].take().expect("stale element id");
        self.id_map.remove(&el.id);
    }

    /// Rename an element, atomically swapping it in the string index.
    pub fn update_element_id(
        &mut self,
        id: ElementId,
        new_id: &str,
    ) -> Result<(), AutomatonError> {
        if self.id_map.contains_key(new_id) {
            return Err(AutomatonError::MalformedAutomaton(format!(
                "cannot rename to existing id {new_id:?}"
            )));
        }
        let old = self.element(id).id().to_string();
        self.id_map.remove(&old);
        self.id_map.insert(new_id.to_string(), id);
        self.element_mut(id).id = new_id.to_string();
        Ok(())
    }

    /// Re-derive start/report view membership from an element's flags.
    pub(crate) fn refresh_views(&mut self, id: ElementId) {
        let (is_start, is_reporting) = {
            let el = self.element(id);
            (el.is_start(), el.is_reporting())
        };
        let in_starts = self.starts.contains(&id);
        if is_start && !in_starts {
            self.starts.push(id);
        } else if !is_start && in_starts {
            self.starts.retain(|&s| s != id);
        }
        let in_reports = self.reports.contains(&id);
        if is_reporting && !in_reports {
            self.reports.push(id);
        } else if !is_reporting && in_reports {
            self.reports.retain(|&r| r != id);
        }
    }

    // -------------- Edges --------------

    /// Borrow two distinct elements mutably; `second` is `None` for a
    /// self-loop.
    fn two_mut(&mut self, a: ElementId, b: ElementId) -> (&mut Element, Option<&mut Element>) {
        if a == b {
            return (self.element_mut(a), None);
        }
        let (ai, bi) = (a.index(), b.index());
        if ai < bi {
            let (lo, hi) = self.slots.split_at_mut(bi);
            (
                lo[ai].as_mut().expect("stale element id"),
                Some(hi[0].as_mut().expect("stale element id")),
            )
        } else {
            let (lo, hi) = self.slots.split_at_mut(ai);
            let a_el = hi[0].as_mut().expect("stale element id");
            (a_el, Some(lo[bi].as_mut().expect("stale element id")))
        }
    }

    /// Add a directed edge by element ids.
    pub fn add_edge_ids(&mut self, from: ElementId, to: ElementId, port: Port) {
        let edge = Edge { target: to, port };
        let (f, t) = self.two_mut(from, to);
        f.add_output(edge);
        match t {
            Some(t) => t.add_input(from, port),
            None => f.add_input(from, port),
        }
    }

    /// Remove a directed edge by element ids.
    pub fn remove_edge_ids(&mut self, from: ElementId, to: ElementId, port: Port) {
        let (f, t) = self.two_mut(from, to);
        f.remove_output(to, port);
        match t {
            Some(t) => t.remove_input(from, port),
            None => f.remove_input(from, port),
        };
    }

    /// Add a directed edge between two wire keys. A `:port` suffix may sit
    /// on either endpoint; both endpoints record the reconciled port.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), AutomatonError> {
        let (from_base, from_port) = Port::split_key(from)?;
        let (to_base, to_port) = Port::split_key(to)?;
        let port = if to_port == Port::None { from_port } else { to_port };
        let from = self.lookup_or_err(from_base)?;
        let to = self.lookup_or_err(to_base)?;
        self.add_edge_ids(from, to, port);
        Ok(())
    }

    /// Remove a directed edge between two wire keys.
    pub fn remove_edge(&mut self, from: &str, to: &str) -> Result<(), AutomatonError> {
        let (from_base, from_port) = Port::split_key(from)?;
        let (to_base, to_port) = Port::split_key(to)?;
        let port = if to_port == Port::None { from_port } else { to_port };
        let from = self.lookup_or_err(from_base)?;
        let to = self.lookup_or_err(to_base)?;
        self.remove_edge_ids(from, to, port);
        Ok(())
    }

    // -------------- Finalization and validation --------------

    /// Recompute derived structures after graph construction or mutation:
    /// start/report views and the topological order of special elements.
    /// Must run before simulation when the graph has special elements.
    pub fn finalize(&mut self) -> Result<(), AutomatonError> {
        for id in self.element_ids() {
            self.refresh_views(id);
        }

        // Collect special elements in BFS order such that each appears
        // after all of its special-element predecessors. Re-enqueue until
        // ready; no progress across a full queue scan means a cycle.
        self.unmark_all();
        let mut workq: VecDeque<ElementId> = self.specials.clone().into();
        let mut ordered = Vec::with_capacity(workq.len());
        let mut stalled = 0usize;
        while let Some(id) = workq.pop_front() {
            let ready = self
                .element(id)
                .inputs
                .iter()
                .filter(|s| self.element(s.source).is_special())
                .all(|s| self.is_marked(s.source));
            if ready {
                self.mark(id);
                ordered.push(id);
                stalled = 0;
            } else {
                workq.push_back(id);
                stalled += 1;
                if stalled > workq.len() {
                    let err = AutomatonError::MalformedAutomaton(
                        "cycle among special elements".to_string(),
                    );
                    self.last_error = Some(AutomatonError::MalformedAutomaton(
                        "cycle among special elements".to_string(),
                    ));
                    return Err(err);
                }
            }
        }
        self.ordered_specials = ordered;
        Ok(())
    }

    /// Check the structural invariants, returning the first violation.
    pub fn validate(&mut self) -> Result<(), AutomatonError> {
        let mut failure: Option<String> = None;

        'scan: for (id, el) in self.elements() {
            for sig in el.inputs() {
                match self.slots.get(sig.source.index()).and_then(|s| s.as_ref()) {
                    None => {
                        failure = Some(format!(
                            "input of {:?} references a removed element",
                            el.id()
                        ));
                        break 'scan;
                    }
                    Some(parent) => {
                        let has_ref = parent
                            .outputs()
                            .iter()
                            .any(|e| e.target == id && e.port == sig.port);
                        if !has_ref {
                            failure = Some(format!(
                                "{:?} missing from outputs of {:?}",
                                el.id(),
                                parent.id()
                            ));
                            break 'scan;
                        }
                    }
                }
            }
            for edge in el.outputs() {
                match self.slots.get(edge.target.index()).and_then(|s| s.as_ref()) {
                    None => {
                        failure = Some(format!(
                            "output of {:?} references a removed element",
                            el.id()
                        ));
                        break 'scan;
                    }
                    Some(child) => {
                        let has_ref = child
                            .inputs()
                            .iter()
                            .any(|s| s.source == id && s.port == edge.port);
                        if !has_ref {
                            failure = Some(format!(
                                "{:?} missing from inputs of its child {:?}",
                                el.id(),
                                child.id()
                            ));
                            break 'scan;
                        }
                    }
                }
            }
            // View membership must match the element's own flags.
            if el.is_start() != self.starts.contains(&id) {
                failure = Some(format!("start view out of sync for {:?}", el.id()));
                break 'scan;
            }
            if el.is_reporting() != self.reports.contains(&id) {
                failure = Some(format!("report view out of sync for {:?}", el.id()));
                break 'scan;
            }
            if el.is_special() != self.specials.contains(&id) {
                failure = Some(format!("special view out of sync for {:?}", el.id()));
                break 'scan;
            }
        }

        match failure {
            None => Ok(()),
            Some(msg) => {
                tracing::warn!(%msg, "automaton failed validation");
                self.last_error = Some(AutomatonError::MalformedAutomaton(msg.clone()));
                Err(AutomatonError::MalformedAutomaton(msg))
            }
        }
    }

    // -------------- Traversal marks --------------

    /// Clear every mark by bumping the graph epoch.
    pub fn unmark_all(&mut self) {
        self.epoch += 1;
    }

    pub(crate) fn mark(&mut self, id: ElementId) {
        let epoch = self.epoch;
        self.element_mut(id).epoch = epoch;
    }

    pub(crate) fn is_marked(&self, id: ElementId) -> bool {
        self.element(id).epoch == self.epoch
    }

    // -------------- Error slot --------------

    pub fn last_error(&self) -> Option<&AutomatonError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<AutomatonError> {
        self.last_error.take()
    }

    pub fn set_error(&mut self, err: AutomatonError) {
        self.last_error = Some(err);
    }

    // -------------- Cloning, merging, splitting --------------

    /// Merge all of `other`'s elements into this graph. "Unsafe" because
    /// identifier collisions are not checked; the caller must guarantee
    /// disjoint id spaces (a collision silently shadows the older element
    /// in the string index).
    pub fn unsafe_merge(&mut self, other: &Automaton) {
        let mut remap: HashMap<ElementId, ElementId> = HashMap::new();
        for (old_id, el) in other.elements() {
            let mut copy = el.clone();
            copy.outputs.clear();
            copy.inputs.clear();
            copy.enabled = false;
            copy.activated = false;
            remap.insert(old_id, self.insert_unchecked(copy));
        }
        for (old_id, el) in other.elements() {
            for edge in el.outputs() {
                self.add_edge_ids(remap[&old_id], remap[&edge.target], edge.port);
            }
        }
    }

    /// Deep-copy a subset of elements into a fresh graph, dropping any
    /// edge that crosses the subset boundary.
    fn extract(&self, members: &[ElementId]) -> Automaton {
        let mut out = Automaton::new(self.id.clone());
        out.copy_flags_from(self);
        let mut remap: HashMap<ElementId, ElementId> = HashMap::new();
        for &m in members {
            let mut copy = self.element(m).clone();
            copy.outputs.clear();
            copy.inputs.clear();
            copy.enabled = false;
            copy.activated = false;
            remap.insert(m, out.insert_unchecked(copy));
        }
        for &m in members {
            for edge in self.element(m).outputs() {
                if let Some(&nt) = remap.get(&edge.target) {
                    out.add_edge_ids(remap[&m], nt, edge.port);
                }
            }
        }
        out
    }

    /// Split into connected components over the union of outgoing and
    /// incoming edges. Start states seed the search so component order is
    /// stable; elements reachable from no start still form components.
    pub fn split_connected_components(&self) -> Result<Vec<Automaton>, AutomatonError> {
        let mut visited = vec![false; self.slots.len()];
        let mut components: Vec<Automaton> = Vec::new();

        let seeds: Vec<ElementId> = self
            .starts
            .iter()
            .copied()
            .chain(self.elements().map(|(id, _)| id))
            .collect();

        for seed in seeds {
            if visited[seed.index()] {
                continue;
            }
            let mut members: Vec<ElementId> = Vec::new();
            let mut workq: VecDeque<ElementId> = VecDeque::new();
            visited[seed.index()] = true;
            workq.push_back(seed);
            while let Some(current) = workq.pop_front() {
                members.push(current);
                let el = self.element(current);
                let neighbors = el
                    .outputs()
                    .iter()
                    .map(|e| e.target)
                    .chain(el.inputs().iter().map(|s| s.source));
                for n in neighbors {
                    if !visited[n.index()] {
                        visited[n.index()] = true;
                        workq.push_back(n);
                    }
                }
            }
            members.sort();
            let mut component = self.extract(&members);
            component.finalize()?;
            components.push(component);
        }

        tracing::info!(count = components.len(), "found distinct subgraphs");
        Ok(components)
    }

    // -------------- Statistics --------------

    /// Log element and degree statistics for the current graph.
    pub fn log_graph_stats(&self) {
        let total = self.element_count();
        let special = self.specials.len();
        let mut max_in = 0usize;
        let mut max_out = 0usize;
        let mut sum_out = 0usize;
        for (_, el) in self.elements() {
            let self_ref = usize::from(el.is_self_ref());
            let outs = el.outputs().len() - self_ref;
            let ins = el.inputs().len() - self_ref;
            max_out = max_out.max(outs);
            max_in = max_in.max(ins);
            sum_out += outs;
        }
        tracing::info!(
            elements = total,
            stes = total - special,
            special_elements = special,
            max_fan_in = max_in,
            max_fan_out = max_out,
            avg_degree = sum_out as f64 / total.max(1) as f64,
            "automaton statistics"
        );
    }

    /// Average Quine-McCluskey complexity of the STE symbol sets.
    /// Informational only; scores are cached per distinct symbol set.
    pub fn average_ste_complexity(&self) -> f64 {
        let mut cache: HashMap<&str, u32> = HashMap::new();
        let mut sum: u64 = 0;
        let mut count: u64 = 0;
        for (_, el) in self.elements() {
            if let Some(ste) = el.as_ste() {
                let score = *cache
                    .entry(ste.symbol_set())
                    .or_insert_with(|| qm_complexity(ste.column()));
                sum += u64::from(score);
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        }
    }
}

impl Clone for Automaton {
    /// Deep copy of the graph and its simulation options. The latest-error
    /// slot does not carry over.
    fn clone(&self) -> Self {
        Automaton {
            id: self.id.clone(),
            slots: self.slots.clone(),
            id_map: self.id_map.clone(),
            starts: self.starts.clone(),
            reports: self.reports.clone(),
            specials: self.specials.clone(),
            activate_no_input_specials: self.activate_no_input_specials.clone(),
            ordered_specials: self.ordered_specials.clone(),
            profile_enabled: self.profile_enabled,
            eod_policy: self.eod_policy,
            dump_state_cycle: self.dump_state_cycle,
            end_of_data: self.end_of_data,
            cycle: self.cycle,
            enabled_stes: self.enabled_stes.clone(),
            activated_stes: self.activated_stes.clone(),
            report_log: self.report_log.clone(),
            profiler: self.profiler.clone(),
            epoch: self.epoch,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests;
