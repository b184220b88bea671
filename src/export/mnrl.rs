/*!
MNRL JSON emitter.

One node per element plus an explicit connection list. Output connections
leave through the `o` port on every node kind; the destination port
depends on the target: `i` for hStates, `b0` for booleans, `cnt`/`rst`
for upCounters according to the edge's port. Input connections mirror the
outputs so the file is navigable in both directions.
*/

use serde::Serialize;

use super::{Emitter, sorted_by_id};
use crate::automaton::Automaton;
use crate::element::{CounterMode, Element, ElementKind, GateKind, Port, Start};
use crate::errors::AutomatonError;

const NODE_OUTPUT: &str = "o";
const H_STATE_INPUT: &str = "i";
const BOOLEAN_INPUT: &str = "b0";
const COUNTER_COUNT: &str = "cnt";
const COUNTER_RESET: &str = "rst";

#[derive(Serialize)]
struct Network {
    id: String,
    nodes: Vec<Node>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    enable: &'static str,
    report: bool,
    attributes: Attributes,
    output_connections: Vec<OutputPort>,
    input_connections: Vec<InputPort>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Attributes {
    #[serde(rename_all = "camelCase")]
    HState {
        symbol_set: String,
        latched: bool,
        #[serde(skip_serializing_if = "String::is_empty")]
        report_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Boolean { gate_type: &'static str },
    #[serde(rename_all = "camelCase")]
    UpCounter {
        target: u32,
        mode: &'static str,
        #[serde(skip_serializing_if = "String::is_empty")]
        report_id: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputPort {
    port_id: &'static str,
    width: u32,
    activate_nodes: Vec<Endpoint>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputPort {
    port_id: &'static str,
    width: u32,
    source_nodes: Vec<Endpoint>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Endpoint {
    id: String,
    port_id: &'static str,
}

pub struct MnrlEmitter;

impl Emitter for MnrlEmitter {
    fn render(&self, automaton: &Automaton) -> Result<String, AutomatonError> {
        let nodes = sorted_by_id(automaton)
            .into_iter()
            .map(|(_, el)| node_for(automaton, el))
            .collect();
        let network = Network {
            id: automaton.id().to_string(),
            nodes,
        };
        serde_json::to_string_pretty(&network).map_err(|e| {
            AutomatonError::MalformedAutomaton(format!("MNRL serialization failed: {e}"))
        })
    }
}

fn enable_for(el: &Element) -> &'static str {
    match el.kind() {
        ElementKind::Ste(ste) => {
            // MNRL expresses tail anchoring as an enable type, displacing
            // the start attribute.
            if el.is_eod() {
                return "onLast";
            }
            match ste.start() {
                Start::None => "onActivateIn",
                Start::StartOfData => "onStartAndActivateIn",
                Start::AllInput => "always",
            }
        }
        _ => "onActivateIn",
    }
}

fn input_port_for(el: &Element, port: Port) -> &'static str {
    match el.kind() {
        ElementKind::Ste(_) => H_STATE_INPUT,
        ElementKind::Gate(_) => BOOLEAN_INPUT,
        ElementKind::Counter(_) => match port {
            Port::Reset => COUNTER_RESET,
            _ => COUNTER_COUNT,
        },
    }
}

fn node_for(automaton: &Automaton, el: &Element) -> Node {
    let (kind, attributes) = match el.kind() {
        ElementKind::Ste(ste) => (
            "hState",
            Attributes::HState {
                symbol_set: ste.symbol_set().to_string(),
                latched: false,
                report_id: el.report_code().to_string(),
            },
        ),
        ElementKind::Gate(g) => (
            "boolean",
            Attributes::Boolean {
                gate_type: match g {
                    GateKind::And => "and",
                    GateKind::Or => "or",
                    GateKind::Nor => "nor",
                    GateKind::Inverter => "not",
                },
            },
        ),
        ElementKind::Counter(c) => (
            "upCounter",
            Attributes::UpCounter {
                target: c.target(),
                mode: match c.mode() {
                    CounterMode::Pulse => "trigger",
                    CounterMode::Latch => "high",
                    CounterMode::Roll => "rollover",
                },
                report_id: el.report_code().to_string(),
            },
        ),
    };

    let activate_nodes: Vec<Endpoint> = el
        .outputs()
        .iter()
        .map(|edge| {
            let target = automaton.element(edge.target);
            Endpoint {
                id: target.id().to_string(),
                port_id: input_port_for(target, edge.port),
            }
        })
        .collect();

    // Group incoming edges under the ports this node kind exposes.
    let mut input_connections: Vec<InputPort> = match el.kind() {
        ElementKind::Ste(_) => vec![InputPort {
            port_id: H_STATE_INPUT,
            width: 1,
            source_nodes: Vec::new(),
        }],
        ElementKind::Gate(_) => vec![InputPort {
            port_id: BOOLEAN_INPUT,
            width: 1,
            source_nodes: Vec::new(),
        }],
        ElementKind::Counter(_) => vec![
            InputPort {
                port_id: COUNTER_COUNT,
                width: 1,
                source_nodes: Vec::new(),
            },
            InputPort {
                port_id: COUNTER_RESET,
                width: 1,
                source_nodes: Vec::new(),
            },
        ],
    };
    for sig in el.inputs() {
        let source = automaton.element(sig.source).id().to_string();
        let port_id = input_port_for(el, sig.port);
        if let Some(ip) = input_connections.iter_mut().find(|ip| ip.port_id == port_id) {
            ip.source_nodes.push(Endpoint {
                id: source,
                port_id: NODE_OUTPUT,
            });
        }
    }

    Node {
        id: el.id().to_string(),
        kind,
        enable: enable_for(el),
        report: el.is_reporting(),
        attributes,
        output_connections: vec![OutputPort {
            port_id: NODE_OUTPUT,
            width: 1,
            activate_nodes,
        }],
        input_connections,
    }
}
