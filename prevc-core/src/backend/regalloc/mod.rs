//! Graph-colouring register allocation.
//!
//! Each round builds the interference graph from fresh liveness, simplifies
//! it (removing vertices of degree below `k`, otherwise the highest-degree
//! vertex as a potential spill), and pops vertices back assigning the lowest
//! colour none of their coloured neighbours has. Vertices left without a
//! colour are actual spills: the code is rewritten and the round repeats.

mod graph;
mod spill;

pub use graph::{Graph, Vertex};

use super::abi::{FP, GLOBAL_REGS, MIN_REGISTERS};
use super::instruction::Code;
use super::liveness::Liveness;
use crate::ir::{Names, Temp};
use crate::CompileError;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

/// Largest spill area a single function may use.
pub const MAX_SPILL_AREA: i64 = 1 << 20;

/// A function after allocation.
#[derive(Debug, Clone)]
pub struct Allocation {
    /// The final (possibly spill-repaired) code.
    pub code: Code,
    /// Register of every temp still in the code; FP maps to `$253`.
    pub regs: BTreeMap<Temp, usize>,
    pub liveness: Liveness,
    pub rounds: usize,
}

impl Allocation {
    pub fn reg(&self, t: Temp) -> Option<usize> {
        self.regs.get(&t).copied()
    }
}

/// Check that `k` registers are enough to colour with.
pub fn check_registers(k: usize) -> Result<(), CompileError> {
    if k < MIN_REGISTERS {
        return Err(CompileError::Config(format!(
            "at least {MIN_REGISTERS} registers are needed, got {k}"
        )));
    }
    if k >= GLOBAL_REGS {
        return Err(CompileError::Config(format!(
            "at most {} registers are available, got {k}",
            GLOBAL_REGS - 1
        )));
    }
    Ok(())
}

/// Allocate registers `$0..$k-1` to the temps of `code`.
pub fn allocate(code: Code, names: &mut Names, k: usize) -> Result<Allocation, CompileError> {
    check_registers(k)?;

    let limit = code.temps().len().max(1);
    let mut code = code;
    let mut repair = BTreeSet::new();
    let mut rounds = 0;
    loop {
        rounds += 1;
        if rounds > limit {
            return Err(CompileError::ResourceExhausted {
                location: code.location,
                function: code.name.clone(),
                message: format!("register allocation did not settle within {limit} rounds"),
            });
        }

        let liveness = Liveness::analyze(&code);
        let mut graph = Graph::build(&code, &liveness);
        let stack = simplify(&graph, k, &repair);
        let spills = select(&mut graph, stack, k);
        debug!(
            "regall: {} round {}: {} temps, {} spills",
            code.name,
            rounds,
            graph.len(),
            spills.len()
        );

        if spills.is_empty() {
            let mut regs: BTreeMap<Temp, usize> = graph
                .vertices
                .values()
                .filter_map(|v| v.color.map(|c| (v.temp, c)))
                .collect();
            regs.insert(code.frame.fp, FP);
            return Ok(Allocation {
                code,
                regs,
                liveness,
                rounds,
            });
        }

        for t in spills {
            code = spill::rewrite(code, t, names, &mut repair);
            info!(
                "regall: {} spills {} to FP{}",
                code.name, t, code.spill_slots[&t]
            );
        }
        if code.temp_size > MAX_SPILL_AREA {
            return Err(CompileError::ResourceExhausted {
                location: code.location,
                function: code.name.clone(),
                message: format!("spill area of {} bytes", code.temp_size),
            });
        }
    }
}

/// Order vertices for colouring; marks potential spills in the returned
/// stack (top is last).
fn simplify(graph: &Graph, k: usize, repair: &BTreeSet<Temp>) -> Vec<(Temp, bool)> {
    let mut degree: BTreeMap<Temp, usize> = graph
        .vertices
        .values()
        .map(|v| (v.temp, v.neighbours.len()))
        .collect();
    let mut stack = Vec::with_capacity(degree.len());

    let remove = |t: Temp, degree: &mut BTreeMap<Temp, usize>| {
        degree.remove(&t);
        for n in &graph.vertices[&t].neighbours {
            if let Some(d) = degree.get_mut(n) {
                *d -= 1;
            }
        }
    };

    while !degree.is_empty() {
        let low = degree.iter().find(|(_, d)| **d < k).map(|(&t, _)| t);
        match low {
            Some(t) => {
                remove(t, &mut degree);
                stack.push((t, false));
            }
            None => {
                // Highest degree first; temps made by spill repair only as a
                // last resort.
                let victim = degree
                    .iter()
                    .max_by_key(|(t, d)| (!repair.contains(*t), **d))
                    .map(|(&t, _)| t);
                if let Some(t) = victim {
                    remove(t, &mut degree);
                    stack.push((t, true));
                }
            }
        }
    }
    stack
}

/// Pop the stack assigning colours; returns the temps that got none.
fn select(graph: &mut Graph, mut stack: Vec<(Temp, bool)>, k: usize) -> Vec<Temp> {
    let mut spills = Vec::new();
    while let Some((t, potential)) = stack.pop() {
        let taken: BTreeSet<usize> = graph.vertices[&t]
            .neighbours
            .iter()
            .filter_map(|n| graph.vertices.get(n).and_then(|v| v.color))
            .collect();
        let color = (0..k).find(|c| !taken.contains(c));
        if let Some(v) = graph.vertices.get_mut(&t) {
            v.potential_spill = potential;
            v.color = color;
            v.spill = color.is_none();
        }
        if color.is_none() {
            spills.push(t);
        }
    }
    spills
}
