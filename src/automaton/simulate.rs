/*!
Per-symbol cycle simulation.

One byte is consumed per symbol cycle. Inside a cycle the phases run in a
fixed order, mirroring the hardware pipeline:

1. Match: every STE enabled on the previous cycle is tested against the
   current symbol; matches activate (and report, subject to the
   end-of-data gate), then the STE is disabled.
2. Propagate: every STE activated this cycle enables its STE successors
   and drives the matching input signal of its special-element successors.
   Elements that refuse deactivation (latched counters) stay activated.
3. Enable starts: `all-input` starts are enabled every cycle;
   `start-of-data` starts are enabled when the end-of-data signal is high,
   so anchors re-arm after record delimiters.
4. Special-element settle: walk `ordered_specials`; each element computes
   its output from its current inputs, activates/reports when high,
   propagates enables, and clears its inputs for the next cycle. The
   topological order guarantees an element observes all of its
   special-element predecessors' current-cycle outputs, and evaluating
   every ordered special each cycle keeps NOR/Inverter outputs correct
   with no predecessor activity.
5. Advance the cycle counter.

`initialize` performs phase 3 with start-of-data asserted and primes the
fan-out of always-high special elements (NOR/Inverter), so their
downstream STEs can match on cycle 0. It must precede the first step.

The batch driver asserts end-of-data on the final byte and, under the
default policy, on every `\n` (newline-delimited records). The predicate
is injectable for single-record consumers.
*/

use super::Automaton;
use crate::element::{ElementId, ElementKind};

/// When the global end-of-data signal is asserted during batch simulation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EodPolicy {
    /// EOD on the final byte and on every `\n` (record-delimited input).
    #[default]
    NewlineDelimited,
    /// EOD on the final byte only.
    FinalByteOnly,
}

/// One entry of the report log.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Report {
    pub cycle: u64,
    pub element: String,
}

impl Automaton {
    /// Enable start states and prime always-high special elements. Must be
    /// called before the first `simulate` step.
    pub fn initialize(&mut self) {
        self.enable_start_states(true);

        // NOR and Inverter outputs are high before any input arrives;
        // enabling their fan-out here lets downstream STEs match on the
        // very first symbol. No reports are recorded during priming.
        for id in self.activate_no_input_specials.clone() {
            if !self.contains(id) {
                continue;
            }
            if self.element_mut(id).calculate() {
                self.propagate_from(id);
            }
        }

        if self.profile_enabled {
            self.profile_enables();
        }
    }

    /// Simulate a single input symbol through one full cycle.
    pub fn simulate(&mut self, symbol: u8) {
        self.compute_ste_matches(symbol);

        if self.profile_enabled {
            self.profile_activations();
        }

        if self.dump_state_cycle == Some(self.cycle) {
            tracing::info!(cycle = self.cycle, state = %self.state_dump_string(), "state dump");
        }

        self.enable_ste_matching_children();
        self.enable_start_states(self.end_of_data);

        if !self.ordered_specials.is_empty() {
            self.settle_special_elements();
        }

        if self.profile_enabled {
            self.profile_enables();
        }

        self.cycle += 1;
    }

    /// Simulate one symbol after first propagating the outputs of the
    /// named elements, as if they had activated on the previous cycle.
    pub fn simulate_with_injects(&mut self, symbol: u8, injects: &[&str]) {
        for key in injects {
            if let Some(id) = self.lookup(key) {
                self.propagate_from(id);
            }
        }
        self.simulate(symbol);
    }

    /// Batch driver: simulate `length` bytes of `input` beginning at
    /// `start_index`. `total_length` is the length of the whole stream so
    /// that partitioned runs agree on where the final byte lies; the
    /// end-of-data signal follows the configured policy.
    pub fn simulate_range(
        &mut self,
        input: &[u8],
        start_index: usize,
        length: usize,
        total_length: usize,
    ) {
        self.cycle = start_index as u64;
        self.initialize();

        let end = (start_index + length).min(input.len());
        for i in start_index..end {
            let byte = input[i];
            self.end_of_data = match self.eod_policy {
                EodPolicy::NewlineDelimited => i + 1 == total_length || byte == b'\n',
                EodPolicy::FinalByteOnly => i + 1 == total_length,
            };

            if i % 10_000 == 0 {
                tracing::debug!(progress = i, length, "simulation progress");
            }
            self.simulate(byte);
        }
        self.end_of_data = false;
    }

    /// Assert or clear the end-of-data signal for single-step driving.
    pub fn set_end_of_data(&mut self, eod: bool) {
        self.end_of_data = eod;
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Return the simulator to its pristine pre-`initialize` state:
    /// all elements disabled and deactivated, counters cleared, work
    /// stacks, report log, profiling data, and cycle counter reset.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            if let Some(el) = slot {
                el.enabled = false;
                el.activated = false;
                for sig in &mut el.inputs {
                    sig.high = false;
                }
                if let ElementKind::Counter(c) = &mut el.kind {
                    c.reset_state();
                }
            }
        }
        self.unmark_all();
        self.enabled_stes.clear();
        self.activated_stes.clear();
        self.report_log.clear();
        self.profiler = Default::default();
        self.end_of_data = false;
        self.cycle = 0;
    }

    /// The currently activated elements, one id per line: STEs that
    /// matched this cycle plus latched elements holding their activation.
    /// Counters append `value/target`.
    pub fn state_dump_string(&self) -> String {
        let mut out = String::new();
        for (_, el) in self.elements() {
            if !el.is_activated() {
                continue;
            }
            match el.as_counter() {
                Some(c) => {
                    out.push_str(&format!("{} {}/{}\n", el.id(), c.value(), c.target()))
                }
                None => {
                    out.push_str(el.id());
                    out.push('\n');
                }
            }
        }
        out
    }

    // -------------- Report log --------------

    pub fn report_log(&self) -> &[Report] {
        &self.report_log
    }

    /// Render the report log in the batch-simulator style: one line per
    /// report, element prefixed with the automaton id, cycle one-based.
    pub fn batch_report_string(&self) -> String {
        let mut out = String::new();
        for r in &self.report_log {
            if self.id.is_empty() {
                out.push_str(&format!(
                    "Element id: {} reporting at index {}\n",
                    r.element,
                    r.cycle + 1
                ));
            } else {
                out.push_str(&format!(
                    "Element id: {}.{} reporting at index {}\n",
                    self.id,
                    r.element,
                    r.cycle + 1
                ));
            }
        }
        out
    }

    /// Write the report log to a file as `cycle : id : report_code` lines.
    pub fn write_reports_to_file(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), crate::errors::AutomatonError> {
        let mut out = String::new();
        for r in &self.report_log {
            let code = self
                .id_map
                .get(&r.element)
                .map(|&id| self.element(id).report_code())
                .unwrap_or("");
            out.push_str(&format!("{} : {} : {}\n", r.cycle, r.element, code));
        }
        std::fs::write(path.as_ref(), out).map_err(|source| {
            crate::errors::AutomatonError::FileOpen {
                path: path.as_ref().to_path_buf(),
                source,
            }
        })
    }

    // -------------- Cycle phases --------------

    /// Phase 1: match every enabled STE against the current symbol.
    fn compute_ste_matches(&mut self, symbol: u8) {
        while let Some(id) = self.enabled_stes.pop() {
            let eod = self.end_of_data;
            let cycle = self.cycle;
            let profiling = self.profile_enabled;

            let el = self.slots[id.index()].as_mut().expect("stale element id");
            let matched = match &el.kind {
                ElementKind::Ste(ste) => ste.matches(symbol),
                _ => false,
            };
            if matched {
                if !el.activated {
                    el.activated = true;
                    self.activated_stes.push(id);
                }
                if el.reporting && (!el.eod || eod) {
                    self.report_log.push(Report {
                        cycle,
                        element: el.id.clone(),
                    });
                }
                if profiling {
                    let element = el.id.clone();
                    self.profiler.record_activation(cycle, element);
                }
            }
            let el = self.slots[id.index()].as_mut().expect("stale element id");
            el.enabled = false;
        }
    }

    /// Phase 2: propagate this cycle's activations to successors.
    fn enable_ste_matching_children(&mut self) {
        let mut activated = std::mem::take(&mut self.activated_stes);
        let mut retained = Vec::new();
        while let Some(id) = activated.pop() {
            self.propagate_from(id);
            // Latched elements refuse deactivation and stay in the
            // activated set for the next cycle.
            if !self.element_mut(id).deactivate() {
                retained.push(id);
            }
        }
        self.activated_stes = retained;
    }

    /// Enable each successor of `id`, keyed by the edge's port.
    fn propagate_from(&mut self, id: ElementId) {
        let outputs = self.element(id).outputs.clone();
        for edge in outputs {
            let newly_enabled_ste = {
                let child = self.slots[edge.target.index()]
                    .as_mut()
                    .expect("stale element id");
                let newly = !child.enabled && !child.is_special();
                child.enable_from(id, edge.port);
                newly
            };
            if newly_enabled_ste {
                self.enabled_stes.push(edge.target);
            }
        }
    }

    /// Phase 3: enable start states.
    fn enable_start_states(&mut self, enable_start_of_data: bool) {
        use crate::element::Start;
        for id in self.starts.clone() {
            let el = self.slots[id.index()].as_mut().expect("stale element id");
            let start = match &el.kind {
                ElementKind::Ste(ste) => ste.start(),
                _ => Start::None,
            };
            let fire = match start {
                Start::AllInput => true,
                Start::StartOfData => enable_start_of_data,
                Start::None => false,
            };
            if fire && !el.enabled {
                el.enabled = true;
                self.enabled_stes.push(id);
            }
        }
    }

    /// Phase 4: settle special elements in topological order.
    fn settle_special_elements(&mut self) {
        for id in self.ordered_specials.clone() {
            let eod = self.end_of_data;
            let cycle = self.cycle;

            let el = self.slots[id.index()].as_mut().expect("stale element id");
            let high = el.calculate();
            if high {
                el.activated = true;
                if el.reporting && (!el.eod || eod) {
                    self.report_log.push(Report {
                        cycle,
                        element: el.id.clone(),
                    });
                }
            }
            el.disable();

            if high {
                self.propagate_from(id);
            }
        }
    }
}
