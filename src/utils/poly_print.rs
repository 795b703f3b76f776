//! Schedule printing and point enumeration for debugging.
//!
//! Schedules print in an isl-like notation, one statement per line, with
//! the band decomposition appended:
//!
//! ```text
//! [N] -> {
//!   S0[i0, i1] -> [i0, i1] : B10[0, 1) B11[1, 2)
//!   S1[i0] -> [i0, 0] : B10[0, 2)
//! }
//! ```

use crate::polyhedral::map::AffineMap;
use crate::polyhedral::set::IntegerSet;
use crate::schedule::{Schedule, ScheduleNode};
use std::fmt::{self, Write};

/// Pretty printer for schedules.
pub struct SchedulePrinter {
    /// Indentation level
    indent: usize,
    /// Output buffer
    buffer: String,
    /// Parameter names used in expressions
    param_names: Vec<String>,
}

impl SchedulePrinter {
    pub fn new(param_names: Vec<String>) -> Self {
        Self {
            indent: 0,
            buffer: String::new(),
            param_names,
        }
    }

    /// Take the output.
    pub fn take_output(self) -> String {
        self.buffer
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buffer.push_str("  ");
        }
    }

    /// Print a schedule map as `name[inputs] -> [outputs]`.
    pub fn print_map(&mut self, name: &str, map: &AffineMap) {
        let in_names = map.domain.space.all_dim_names("i");
        let outputs: Vec<String> = map.outputs.iter()
            .map(|e| e.to_string_with_names(&in_names, &self.param_names))
            .collect();
        let _ = write!(self.buffer, "{}[{}] -> [{}]", name, in_names.join(", "), outputs.join(", "));
    }

    /// Print one statement's map and bands.
    pub fn print_node(&mut self, index: usize, node: &ScheduleNode) {
        self.write_indent();
        self.print_map(&format!("S{}", index), node.schedule_map());
        self.buffer.push_str(" :");
        for (i, band) in node.bands().iter().enumerate() {
            let start = if i == 0 { 0 } else { node.bands()[i - 1].end };
            let _ = write!(self.buffer, " {}[{}, {})", band.id, start, band.end);
        }
        self.buffer.push('\n');
    }

    /// Print all statements of a schedule.
    pub fn print_nodes(&mut self, nodes: &[ScheduleNode]) {
        if !self.param_names.is_empty() {
            let _ = write!(self.buffer, "[{}] -> ", self.param_names.join(", "));
        }
        self.buffer.push_str("{\n");
        self.indent += 1;
        for (i, node) in nodes.iter().enumerate() {
            self.print_node(i, node);
        }
        self.indent -= 1;
        self.buffer.push('}');
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Ok(nodes), Ok(params)) = (self.nodes(), self.parameter_space()) else {
            return f.write_str("<released schedule>");
        };
        let mut printer = SchedulePrinter::new(params.names().to_vec());
        printer.print_nodes(nodes);
        f.write_str(&printer.take_output())
    }
}

/// Enumerate the points of a domain inside the box `[-bound, bound]^n`,
/// stopping after `max_points`. Meant for small test domains.
pub fn enumerate_points(set: &IntegerSet, params: &[i64], bound: i64, max_points: usize) -> Vec<Vec<i64>> {
    let mut points = Vec::new();
    let mut current = vec![-bound; set.dim()];
    enumerate_recursive(set, params, bound, &mut current, 0, &mut points, max_points);
    points
}

fn enumerate_recursive(
    set: &IntegerSet,
    params: &[i64],
    bound: i64,
    current: &mut Vec<i64>,
    dim: usize,
    points: &mut Vec<Vec<i64>>,
    max_points: usize,
) {
    if points.len() >= max_points {
        return;
    }
    if dim == current.len() {
        if set.contains(current, params) {
            points.push(current.clone());
        }
        return;
    }
    for val in -bound..=bound {
        current[dim] = val;
        enumerate_recursive(set, params, bound, current, dim + 1, points, max_points);
        if points.len() >= max_points {
            return;
        }
    }
}
