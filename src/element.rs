/*!
Element model: the uniform unit of a homogeneous automaton graph.

Every element shares one header (string id, dense integer id, ordered
outgoing edges, incoming signal list, report/end-of-data flags, and the
transient enabled/activated bits used by the simulator) and a kind-specific
payload:

- STE: a 256-bit match column compiled from a symbol-set string plus a
  start type. Stateful across cycles.
- Boolean gates (AND, OR, NOR, Inverter): stateless, output is a pure
  function of the current incoming signals. NOR and Inverter can drive
  their outputs high with no enabled predecessor.
- Counter: threshold counter with latch/roll/pulse modes, a dormancy flag,
  and a latch. Inputs are classified by port (`:cnt` / `:rst`).

Edges are stored as arena indices plus a port enum; the `sourceId[:port]`
wire encoding only exists at the graph boundary (builder input, exporters).
*/

use crate::bitset::Bitset256;
use crate::charset::parse_symbol_set;
use crate::errors::AutomatonError;

/// Dense arena index of an element inside its graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        ElementId(index as u32)
    }
}

/// Destination port of an edge. Only counters have named ports.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub enum Port {
    #[default]
    None,
    Count,
    Reset,
}

impl Port {
    /// Wire-encoding suffix, including the leading colon.
    pub fn as_suffix(self) -> &'static str {
        match self {
            Port::None => "",
            Port::Count => ":cnt",
            Port::Reset => ":rst",
        }
    }

    /// Split a wire key of the form `id[:port]` into the bare id and port.
    pub fn split_key(key: &str) -> Result<(&str, Port), AutomatonError> {
        match key.split_once(':') {
            None => Ok((key, Port::None)),
            Some((base, "cnt")) => Ok((base, Port::Count)),
            Some((base, "rst")) => Ok((base, Port::Reset)),
            Some((_, other)) => Err(AutomatonError::MalformedAutomaton(format!(
                "unknown port :{other} in {key:?}"
            ))),
        }
    }
}

/// One outgoing edge: destination element and destination port.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Edge {
    pub target: ElementId,
    pub port: Port,
}

/// One incoming edge with its current cycle signal level.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InputSignal {
    pub source: ElementId,
    pub port: Port,
    pub high: bool,
}

/// STE start type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Start {
    #[default]
    None,
    StartOfData,
    AllInput,
}

impl Start {
    /// Parse the ANML start attribute. Unrecognized values mean "none",
    /// matching the permissive behavior of existing front-ends.
    pub fn parse(s: &str) -> Start {
        match s {
            "start-of-data" => Start::StartOfData,
            "all-input" => Start::AllInput,
            _ => Start::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Start::None => "none",
            Start::StartOfData => "start-of-data",
            Start::AllInput => "all-input",
        }
    }
}

/// Boolean gate flavor.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GateKind {
    And,
    Or,
    Nor,
    Inverter,
}

impl GateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GateKind::And => "and",
            GateKind::Or => "or",
            GateKind::Nor => "nor",
            GateKind::Inverter => "inverter",
        }
    }
}

/// Counter behavior when the target is reached.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CounterMode {
    Latch,
    Roll,
    Pulse,
}

impl CounterMode {
    /// Parse the `at-target` attribute. Unrecognized values mean pulse,
    /// matching the permissive behavior of existing front-ends.
    pub fn parse(s: &str) -> CounterMode {
        match s {
            "latch" => CounterMode::Latch,
            "roll" => CounterMode::Roll,
            _ => CounterMode::Pulse,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CounterMode::Latch => "latch",
            CounterMode::Roll => "roll",
            CounterMode::Pulse => "pulse",
        }
    }
}

/// STE payload: symbol set, compiled column, start type.
#[derive(Clone, Debug)]
pub struct Ste {
    symbol_set: String,
    column: Bitset256,
    start: Start,
}

impl Ste {
    #[inline]
    pub fn matches(&self, symbol: u8) -> bool {
        self.column.test(symbol)
    }

    pub fn symbol_set(&self) -> &str {
        &self.symbol_set
    }

    pub fn column(&self) -> &Bitset256 {
        &self.column
    }

    pub fn start(&self) -> Start {
        self.start
    }

    pub fn set_start(&mut self, start: Start) {
        self.start = start;
    }

    /// Recompile the symbol set from a new string.
    pub fn set_symbol_set(&mut self, symbol_set: &str) -> Result<(), AutomatonError> {
        self.column = parse_symbol_set(symbol_set)?;
        self.symbol_set = symbol_set.to_string();
        Ok(())
    }

    /// Add one byte to the match column, keeping the symbol-set string in
    /// sync by appending its hex escape inside the existing brackets.
    pub fn add_symbol(&mut self, symbol: u8) {
        if self.column.test(symbol) {
            return;
        }
        self.column.set(symbol);

        let had_brackets =
            self.symbol_set.starts_with('[') && self.symbol_set.ends_with(']');
        if had_brackets {
            self.symbol_set.pop();
        }
        self.symbol_set.push_str(&format!("\\x{:02x}", symbol));
        if had_brackets {
            self.symbol_set.push(']');
        }
    }

    /// Union another column into this STE.
    pub fn union_column(&mut self, other: &Bitset256) {
        for b in other.ones() {
            self.add_symbol(b);
        }
    }
}

/// Counter payload: threshold, running value, mode, and dormancy/latch.
#[derive(Clone, Debug)]
pub struct Counter {
    target: u32,
    value: u32,
    mode: CounterMode,
    dormant: bool,
    latched: bool,
}

impl Counter {
    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn mode(&self) -> CounterMode {
        self.mode
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub(crate) fn reset_state(&mut self) {
        self.value = 0;
        self.dormant = false;
        self.latched = false;
    }

    /// Advance the counter for one cycle given the gathered port levels.
    /// Returns true when the output fires this cycle.
    fn step(&mut self, count: bool, reset: bool) -> bool {
        // Reset takes priority over everything else.
        if reset {
            self.dormant = false;
            self.latched = false;
            self.value = 0;
            return false;
        }

        if !((count && !self.dormant) || self.latched) {
            return false;
        }

        match self.mode {
            CounterMode::Latch => {
                if self.latched {
                    true
                } else {
                    self.value += 1;
                    if self.value == self.target {
                        self.latched = true;
                        true
                    } else {
                        false
                    }
                }
            }
            CounterMode::Roll => {
                self.value += 1;
                if self.value == self.target {
                    self.value = 0;
                    true
                } else {
                    false
                }
            }
            CounterMode::Pulse => {
                self.value += 1;
                if self.value == self.target {
                    self.dormant = true;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Kind-specific payload of an element.
#[derive(Clone, Debug)]
pub enum ElementKind {
    Ste(Ste),
    Gate(GateKind),
    Counter(Counter),
}

/// One graph element: shared header plus kind payload.
#[derive(Clone, Debug)]
pub struct Element {
    pub(crate) id: String,
    pub(crate) int_id: u32,
    pub(crate) outputs: Vec<Edge>,
    pub(crate) inputs: Vec<InputSignal>,
    pub(crate) reporting: bool,
    pub(crate) report_code: String,
    pub(crate) eod: bool,
    pub(crate) enabled: bool,
    pub(crate) activated: bool,
    pub(crate) epoch: u64,
    pub(crate) kind: ElementKind,
}

impl Element {
    fn with_kind(id: impl Into<String>, kind: ElementKind) -> Self {
        Element {
            id: id.into(),
            int_id: 0,
            outputs: Vec::new(),
            inputs: Vec::new(),
            reporting: false,
            report_code: String::new(),
            eod: false,
            enabled: false,
            activated: false,
            epoch: 0,
            kind,
        }
    }

    /// Build an STE, compiling its symbol set.
    pub fn ste(
        id: impl Into<String>,
        symbol_set: &str,
        start: Start,
    ) -> Result<Self, AutomatonError> {
        let column = parse_symbol_set(symbol_set)?;
        Ok(Element::with_kind(
            id,
            ElementKind::Ste(Ste {
                symbol_set: symbol_set.to_string(),
                column,
                start,
            }),
        ))
    }

    /// Build an STE directly from a compiled column.
    pub fn ste_from_column(id: impl Into<String>, column: Bitset256, start: Start) -> Self {
        Element::with_kind(
            id,
            ElementKind::Ste(Ste {
                symbol_set: crate::charset::column_to_charset(&column),
                column,
                start,
            }),
        )
    }

    /// Build an STE from an already-compiled (string, column) pair; used
    /// when cloning, where recompiling the symbol set would be wasted work.
    pub(crate) fn ste_with(
        id: impl Into<String>,
        symbol_set: String,
        column: Bitset256,
        start: Start,
    ) -> Self {
        Element::with_kind(
            id,
            ElementKind::Ste(Ste {
                symbol_set,
                column,
                start,
            }),
        )
    }

    pub fn gate(id: impl Into<String>, kind: GateKind) -> Self {
        Element::with_kind(id, ElementKind::Gate(kind))
    }

    pub fn counter(id: impl Into<String>, target: u32, mode: CounterMode) -> Self {
        Element::with_kind(
            id,
            ElementKind::Counter(Counter {
                target,
                value: 0,
                mode,
                dormant: false,
                latched: false,
            }),
        )
    }

    // -------------- Header accessors --------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn int_id(&self) -> u32 {
        self.int_id
    }

    pub fn is_reporting(&self) -> bool {
        self.reporting
    }

    pub fn set_reporting(&mut self, reporting: bool) {
        self.reporting = reporting;
    }

    pub fn report_code(&self) -> &str {
        &self.report_code
    }

    pub fn set_report_code(&mut self, code: impl Into<String>) {
        self.report_code = code.into();
    }

    pub fn is_eod(&self) -> bool {
        self.eod
    }

    pub fn set_eod(&mut self, eod: bool) {
        self.eod = eod;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn outputs(&self) -> &[Edge] {
        &self.outputs
    }

    pub fn inputs(&self) -> &[InputSignal] {
        &self.inputs
    }

    // -------------- Kind probes --------------

    pub fn as_ste(&self) -> Option<&Ste> {
        match &self.kind {
            ElementKind::Ste(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ste_mut(&mut self) -> Option<&mut Ste> {
        match &mut self.kind {
            ElementKind::Ste(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_counter(&self) -> Option<&Counter> {
        match &self.kind {
            ElementKind::Counter(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_gate(&self) -> Option<GateKind> {
        match &self.kind {
            ElementKind::Gate(g) => Some(*g),
            _ => None,
        }
    }

    /// Special elements are everything that is not an STE.
    pub fn is_special(&self) -> bool {
        !matches!(self.kind, ElementKind::Ste(_))
    }

    /// Stateful elements hold activation across cycles: STEs and counters.
    pub fn is_stateful(&self) -> bool {
        matches!(self.kind, ElementKind::Ste(_) | ElementKind::Counter(_))
    }

    /// True for elements whose output can be high without any enabled
    /// predecessor: NOR, Inverter, and start STEs.
    pub fn can_activate_without_enable(&self) -> bool {
        match &self.kind {
            ElementKind::Gate(GateKind::Nor) | ElementKind::Gate(GateKind::Inverter) => true,
            ElementKind::Ste(s) => s.start != Start::None,
            _ => false,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(&self.kind, ElementKind::Ste(s) if s.start != Start::None)
    }

    pub fn is_self_ref(&self) -> bool {
        let own = self.int_id;
        self.outputs.iter().any(|e| e.target.0 == own)
    }

    // -------------- Runtime signal state --------------

    pub fn activate(&mut self) {
        self.activated = true;
    }

    /// Drop the activation bit. Latched counters refuse and stay activated;
    /// the return value tells the caller whether deactivation happened.
    pub fn deactivate(&mut self) -> bool {
        if let ElementKind::Counter(c) = &self.kind {
            if c.latched {
                return false;
            }
        }
        self.activated = false;
        true
    }

    /// Raise the enable line. For special elements the matching incoming
    /// signal `(source, port)` is driven high for the current cycle.
    pub fn enable_from(&mut self, source: ElementId, port: Port) {
        self.enabled = true;
        if self.is_special() {
            for sig in &mut self.inputs {
                if sig.source == source && sig.port == port {
                    sig.high = true;
                }
            }
        }
    }

    /// Drop the enable line; special elements also clear every incoming
    /// signal for the next cycle.
    pub fn disable(&mut self) {
        self.enabled = false;
        if self.is_special() {
            for sig in &mut self.inputs {
                sig.high = false;
            }
        }
    }

    /// Compute a special element's output from its current inputs.
    /// Counters advance their internal state; gates are pure.
    pub fn calculate(&mut self) -> bool {
        match &mut self.kind {
            ElementKind::Ste(_) => false,
            ElementKind::Gate(GateKind::And) => {
                !self.inputs.is_empty() && self.inputs.iter().all(|i| i.high)
            }
            ElementKind::Gate(GateKind::Or) => self.inputs.iter().any(|i| i.high),
            ElementKind::Gate(GateKind::Nor) => !self.inputs.iter().any(|i| i.high),
            // Any low input drives an inverter high. With zero inputs the
            // output stays low, unlike NOR; wired corpora rely on this.
            ElementKind::Gate(GateKind::Inverter) => self.inputs.iter().any(|i| !i.high),
            ElementKind::Counter(counter) => {
                let mut count = false;
                let mut reset = false;
                for sig in &self.inputs {
                    match sig.port {
                        Port::Count if sig.high => count = true,
                        Port::Reset if sig.high => reset = true,
                        _ => {}
                    }
                }
                counter.step(count, reset)
            }
        }
    }

    // -------------- Edge bookkeeping (graph-internal) --------------

    pub(crate) fn add_output(&mut self, edge: Edge) {
        if !self.outputs.contains(&edge) {
            self.outputs.push(edge);
        }
    }

    pub(crate) fn remove_output(&mut self, target: ElementId, port: Port) -> bool {
        let before = self.outputs.len();
        self.outputs
            .retain(|e| !(e.target == target && e.port == port));
        self.outputs.len() != before
    }

    pub(crate) fn add_input(&mut self, source: ElementId, port: Port) {
        if !self
            .inputs
            .iter()
            .any(|s| s.source == source && s.port == port)
        {
            self.inputs.push(InputSignal {
                source,
                port,
                high: false,
            });
        }
    }

    pub(crate) fn remove_input(&mut self, source: ElementId, port: Port) -> bool {
        let before = self.inputs.len();
        self.inputs
            .retain(|s| !(s.source == source && s.port == port));
        self.inputs.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(source: u32, port: Port, high: bool) -> InputSignal {
        InputSignal {
            source: ElementId(source),
            port,
            high,
        }
    }

    #[test]
    fn port_key_splitting() {
        assert_eq!(Port::split_key("a").unwrap(), ("a", Port::None));
        assert_eq!(Port::split_key("a:cnt").unwrap(), ("a", Port::Count));
        assert_eq!(Port::split_key("a:rst").unwrap(), ("a", Port::Reset));
        assert!(Port::split_key("a:bogus").is_err());
    }

    #[test]
    fn gate_truth_tables() {
        let mut and = Element::gate("g", GateKind::And);
        assert!(!and.calculate(), "empty AND is low");
        and.inputs = vec![sig(0, Port::None, true), sig(1, Port::None, true)];
        assert!(and.calculate());
        and.inputs[1].high = false;
        assert!(!and.calculate());

        let mut or = Element::gate("g", GateKind::Or);
        assert!(!or.calculate());
        or.inputs = vec![sig(0, Port::None, false), sig(1, Port::None, true)];
        assert!(or.calculate());

        let mut nor = Element::gate("g", GateKind::Nor);
        assert!(nor.calculate(), "empty NOR is high");
        nor.inputs = vec![sig(0, Port::None, true)];
        assert!(!nor.calculate());

        let mut inv = Element::gate("g", GateKind::Inverter);
        assert!(!inv.calculate(), "empty inverter is low");
        inv.inputs = vec![sig(0, Port::None, false)];
        assert!(inv.calculate());
        inv.inputs[0].high = true;
        assert!(!inv.calculate());
    }

    #[test]
    fn counter_pulse_goes_dormant() {
        let mut c = Element::counter("c", 2, CounterMode::Pulse);
        c.inputs = vec![sig(0, Port::Count, true)];
        assert!(!c.calculate());
        assert!(c.calculate(), "fires when value reaches target");
        assert!(!c.calculate(), "dormant until reset");
        // Reset wakes it back up.
        c.inputs.push(sig(1, Port::Reset, true));
        assert!(!c.calculate());
        c.inputs.truncate(1);
        assert!(!c.calculate());
        assert!(c.calculate());
    }

    #[test]
    fn counter_roll_restarts() {
        let mut c = Element::counter("c", 2, CounterMode::Roll);
        c.inputs = vec![sig(0, Port::Count, true)];
        assert!(!c.calculate());
        assert!(c.calculate());
        assert!(!c.calculate());
        assert!(c.calculate());
    }

    #[test]
    fn counter_latch_holds_until_reset() {
        let mut c = Element::counter("c", 2, CounterMode::Latch);
        c.inputs = vec![sig(0, Port::Count, true)];
        assert!(!c.calculate());
        assert!(c.calculate());
        // Input stops; the latch keeps driving the output.
        c.inputs[0].high = false;
        assert!(c.calculate());
        assert!(c.calculate());
        assert!(!c.deactivate(), "latched counter refuses deactivation");
        c.inputs.push(sig(1, Port::Reset, true));
        assert!(!c.calculate());
        assert!(c.deactivate());
    }

    #[test]
    fn counter_reset_mid_count() {
        let mut c = Element::counter("c", 3, CounterMode::Pulse);
        c.inputs = vec![sig(0, Port::Count, true), sig(1, Port::Reset, false)];
        assert!(!c.calculate());
        assert!(!c.calculate());
        c.inputs[1].high = true;
        assert!(!c.calculate(), "reset wins over count");
        c.inputs[1].high = false;
        assert!(!c.calculate());
        assert!(!c.calculate());
        assert!(c.calculate(), "three fresh counts fire after reset");
    }

    #[test]
    fn ste_add_symbol_keeps_string_in_sync() {
        let mut el = Element::ste("s", "[a]", Start::None).unwrap();
        let ste = el.as_ste_mut().unwrap();
        ste.add_symbol(b'b');
        assert!(ste.matches(b'a') && ste.matches(b'b'));
        let reparsed = parse_symbol_set(ste.symbol_set()).unwrap();
        assert_eq!(&reparsed, ste.column());
    }

    #[test]
    fn activation_capabilities() {
        let start = Element::ste("s", "*", Start::AllInput).unwrap();
        assert!(start.can_activate_without_enable());
        let plain = Element::ste("s", "*", Start::None).unwrap();
        assert!(!plain.can_activate_without_enable());
        assert!(Element::gate("g", GateKind::Nor).can_activate_without_enable());
        assert!(Element::gate("g", GateKind::Inverter).can_activate_without_enable());
        assert!(!Element::gate("g", GateKind::And).can_activate_without_enable());
        assert!(!Element::counter("c", 1, CounterMode::Pulse).can_activate_without_enable());
    }
}
