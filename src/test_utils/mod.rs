//! Shared test fixtures for building small automata.
//!
//! These helpers de-duplicate graph construction across the simulator,
//! transform, and exporter tests. They intentionally support just what
//! the test suite needs: exact-match chains, counter rigs, and a runner
//! that reports `(cycle, id)` pairs.

#![allow(dead_code)]

use crate::automaton::Automaton;
use crate::builder::AutomatonBuilder;

/// Build a chain matching `pattern` exactly: `s0..sN`, the first STE with
/// the given start type, the last one reporting.
pub fn exact_matcher(pattern: &str, start: &str) -> Automaton {
    let mut b = AutomatonBuilder::new("");
    let n = pattern.len();
    for (i, c) in pattern.chars().enumerate() {
        let id = format!("s{i}");
        let start_type = if i == 0 { start } else { "none" };
        b.ste(&id, &format!("[{}]", escape(c)), start_type).unwrap();
        if i + 1 < n {
            b.output(&format!("s{}", i + 1));
        } else {
            b.report();
        }
    }
    b.build().unwrap()
}

fn escape(c: char) -> String {
    match c {
        '[' | ']' | '\\' | '-' | '^' => format!("\\{c}"),
        _ => c.to_string(),
    }
}

/// Counter rig from the hardware test bench: an all-input `[c]` matcher
/// feeding `counter:cnt`, an all-input `[r]` matcher feeding
/// `counter:rst`, and a `*` reporter on the counter output.
pub fn counter_rig(target: u32, mode: &str) -> Automaton {
    let mut b = AutomatonBuilder::new("");
    b.ste("count", "[c]", "all-input").unwrap().output("counter:cnt");
    b.ste("reset", "[r]", "all-input").unwrap().output("counter:rst");
    b.counter("counter", target, mode).unwrap().output("report");
    b.ste("report", "*", "none").unwrap().report();
    b.build().unwrap()
}

/// Reset, run the whole input, and collect `(cycle, id)` report pairs.
pub fn run(automaton: &mut Automaton, input: &[u8]) -> Vec<(u64, String)> {
    automaton.reset();
    automaton.simulate_range(input, 0, input.len(), input.len());
    reports(automaton)
}

/// Run a clone, leaving the original untouched. Used by the
/// language-preservation tests to compare a graph before and after a
/// transform.
pub fn run_clone(automaton: &Automaton, input: &[u8]) -> Vec<(u64, String)> {
    let mut clone = automaton.clone();
    run(&mut clone, input)
}

pub fn reports(automaton: &Automaton) -> Vec<(u64, String)> {
    automaton
        .report_log()
        .iter()
        .map(|r| (r.cycle, r.element.clone()))
        .collect()
}

/// Reporting cycles only, for comparisons across transforms that rename
/// elements.
pub fn report_cycles(pairs: &[(u64, String)]) -> Vec<u64> {
    let mut cycles: Vec<u64> = pairs.iter().map(|(c, _)| *c).collect();
    cycles.sort_unstable();
    cycles
}
