/*!
GraphViz DOT emitter.

One node per element. STEs are circles (double when a start state),
reporting elements octagons (double when also a start), special elements
rectangles. The fill color defaults to a flat blue; with a heat scale
selected it is derived from the activation histogram, so hot states glow
and idle ones stay white. Build the histogram before rendering a heat
map.
*/

use std::fmt::Write;

use super::Emitter;
use crate::automaton::Automaton;
use crate::errors::AutomatonError;

/// How activation counts map onto fill colors.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum HeatScale {
    /// Flat default color, no profiling data used.
    #[default]
    None,
    /// Green-to-red ramp proportional to activations.
    Linear,
    /// Grey ramp with magenta/red/green/blue buckets for the cold tail.
    Log,
}

#[derive(Default)]
pub struct DotEmitter {
    pub heat: HeatScale,
}

impl Emitter for DotEmitter {
    fn render(&self, automaton: &Automaton) -> Result<String, AutomatonError> {
        let mut out = String::from("digraph G {\n");

        let mut dot_ids: Vec<(crate::element::ElementId, usize)> = Vec::new();
        for (n, (id, el)) in automaton.elements().enumerate() {
            dot_ids.push((id, n));

            let label = match el.as_ste() {
                Some(ste) => format!("{}:{}", el.id(), ste.symbol_set()),
                None => el.id().to_string(),
            };
            let fill = match self.heat {
                HeatScale::None => "\"#add8e6\"".to_string(),
                HeatScale::Linear => linear_color(automaton, el.id()),
                HeatScale::Log => log_color(automaton, el.id()),
            };
            let shape = if el.is_special() {
                "rectangle"
            } else if el.is_start() {
                if el.is_reporting() { "doubleoctagon" } else { "doublecircle" }
            } else if el.is_reporting() {
                "octagon"
            } else {
                "circle"
            };
            let _ = writeln!(
                out,
                "{n}[label=\"{label}\" style=filled fillcolor={fill} shape={shape} ];"
            );
        }

        let lookup: std::collections::HashMap<_, _> = dot_ids.iter().copied().collect();
        for (id, n) in &dot_ids {
            for edge in automaton.element(*id).outputs() {
                let _ = writeln!(out, "{} -> {};", n, lookup[&edge.target]);
            }
        }

        out.push_str("}\n");
        Ok(out)
    }
}

/// Green-to-red ramp over activation share; cold elements turn blue,
/// untouched ones white.
fn linear_color(automaton: &Automaton, id: &str) -> String {
    let profiler = automaton.profiler();
    let hits = profiler.activation_hist.get(id).copied().unwrap_or(0);
    let max = profiler.max_activations;
    if hits == 0 || max == 0 {
        return "\"#ffffff\"".to_string();
    }

    let ratio = f64::from(hits) / f64::from(max);
    let scale = (ratio * 511.0) as i32;
    let (mut red, mut green, mut blue) = if scale > 255 {
        (255, 511 - scale, 0)
    } else {
        (scale, 255, 0)
    };
    if ratio < 0.01 {
        (red, green, blue) = (0, 0, 255);
    }
    format!("\"#{red:02x}{green:02x}{blue:02x}\"")
}

/// Grey ramp by activation share with colored buckets for the cold tail:
/// magenta below 1%, red below 0.1%, green below 0.01%, blue below 0.001%.
fn log_color(automaton: &Automaton, id: &str) -> String {
    let profiler = automaton.profiler();
    let hits = profiler.activation_hist.get(id).copied().unwrap_or(0);
    let max = profiler.max_activations;
    if hits == 0 || max == 0 {
        return "\"#ffffff\"".to_string();
    }

    let ratio = f64::from(hits) / f64::from(max);
    let grey = (255.0 * (1.0 - ratio)) as u8;
    let (red, green, blue) = if ratio < 0.00001 {
        (0, 0, 255)
    } else if ratio < 0.0001 {
        (0, 255, 0)
    } else if ratio < 0.001 {
        (255, 0, 0)
    } else if ratio < 0.01 {
        (255, 0, 255)
    } else {
        (grey, grey, grey)
    };
    format!("\"#{red:02x}{green:02x}{blue:02x}\"")
}
