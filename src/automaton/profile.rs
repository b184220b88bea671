/*!
Profiling accumulators.

When profiling is enabled the simulator records, per cycle, which elements
were enabled and which activated. From the raw counters this module builds
an activation histogram (per-element totals plus the maximum, used by the
DOT heat map) and the enable-capture distribution: how few elements account
for 90 / 99 / 99.9 / ... percent of all enable events, which is the usual
way to judge whether an automaton has a hot core worth offloading.
*/

use std::collections::{BTreeMap, HashMap};

use super::Automaton;

/// Raw and derived profiling data for one simulator.
#[derive(Clone, Debug, Default)]
pub struct Profiler {
    /// Total number of times each element was enabled.
    pub enabled_count: HashMap<String, u32>,
    /// Total number of times each element was activated.
    pub activated_count: HashMap<String, u32>,
    /// Enabled-set population per cycle.
    pub enabled_per_cycle: Vec<u32>,
    /// Activated-set population per cycle.
    pub activated_per_cycle: Vec<u32>,
    /// Activation log: cycle -> element ids that activated.
    pub activation_log: BTreeMap<u64, Vec<String>>,
    /// Histogram built from the activation log.
    pub activation_hist: HashMap<String, u32>,
    /// Largest value in `activation_hist`.
    pub max_activations: u32,
    /// Elements enabled on the most recent cycle.
    pub enabled_last_cycle: Vec<String>,
    /// Elements activated on the most recent cycle.
    pub activated_last_cycle: Vec<String>,
    /// Reporting elements activated on the most recent cycle.
    pub reported_last_cycle: Vec<String>,
}

impl Profiler {
    pub(crate) fn record_activation(&mut self, cycle: u64, element: String) {
        self.activation_log.entry(cycle).or_default().push(element);
    }
}

impl Automaton {
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Snapshot the enabled set at the end of a cycle.
    pub(crate) fn profile_enables(&mut self) {
        self.profiler.enabled_last_cycle.clear();
        self.profiler
            .enabled_per_cycle
            .push(self.enabled_stes.len() as u32);
        for &id in &self.enabled_stes {
            let name = self.slots[id.index()]
                .as_ref()
                .expect("stale element id")
                .id
                .clone();
            *self.profiler.enabled_count.entry(name.clone()).or_insert(0) += 1;
            self.profiler.enabled_last_cycle.push(name);
        }
    }

    /// Snapshot the activated set after the match phase.
    pub(crate) fn profile_activations(&mut self) {
        self.profiler.activated_last_cycle.clear();
        self.profiler.reported_last_cycle.clear();
        self.profiler
            .activated_per_cycle
            .push(self.activated_stes.len() as u32);
        for &id in &self.activated_stes {
            let el = self.slots[id.index()].as_ref().expect("stale element id");
            let name = el.id.clone();
            let reporting = el.reporting;
            *self
                .profiler
                .activated_count
                .entry(name.clone())
                .or_insert(0) += 1;
            if reporting {
                self.profiler.reported_last_cycle.push(name.clone());
            }
            self.profiler.activated_last_cycle.push(name);
        }
    }

    /// Build the per-element activation histogram from the activation log.
    pub fn build_activation_histogram(&mut self) {
        self.profiler.activation_hist.clear();
        self.profiler.max_activations = 0;
        let mut hist: HashMap<String, u32> = HashMap::new();
        for ids in self.profiler.activation_log.values() {
            for id in ids {
                let n = hist.entry(id.clone()).or_insert(0);
                *n += 1;
            }
        }
        self.profiler.max_activations = hist.values().copied().max().unwrap_or(0);
        self.profiler.activation_hist = hist;
    }

    /// Render the activation histogram as `id<TAB>count` lines.
    pub fn activation_histogram_string(&self) -> String {
        let mut entries: Vec<(&String, &u32)> = self.profiler.activation_hist.iter().collect();
        entries.sort();
        let mut out = String::new();
        for (id, count) in entries {
            out.push_str(&format!("{id}\t{count}\n"));
        }
        out
    }

    /// How many elements capture each fraction of total enable activity.
    /// Returns `(fraction, element_count)` pairs for 90%, 99%, 99.9%, ...
    /// down to eight nines, and logs them.
    pub fn enable_distribution(&self) -> Vec<(f64, usize)> {
        let mut enables: Vec<u32> = self.profiler.enabled_count.values().copied().collect();
        let sum: u64 = enables.iter().map(|&e| u64::from(e)).sum();
        if sum == 0 {
            return Vec::new();
        }
        enables.sort_unstable_by(|a, b| b.cmp(a));

        let thresholds = [
            0.90, 0.99, 0.999, 0.9999, 0.99999, 0.999999, 0.9999999, 0.99999999,
        ];
        let mut result = Vec::with_capacity(thresholds.len());
        let mut next = 0usize;
        let mut running: u64 = 0;
        for (index, &e) in enables.iter().enumerate() {
            running += u64::from(e);
            let frac = running as f64 / sum as f64;
            while next < thresholds.len() && frac > thresholds[next] {
                result.push((thresholds[next], index + 1));
                next += 1;
            }
        }

        for (frac, count) in &result {
            tracing::info!(
                fraction = frac,
                elements = count,
                total = self.element_count(),
                "enable capture"
            );
        }
        result
    }
}
