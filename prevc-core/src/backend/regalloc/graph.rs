//! Interference graph.

use crate::backend::instruction::Code;
use crate::backend::liveness::Liveness;
use crate::ir::Temp;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    pub temp: Temp,
    pub color: Option<usize>,
    /// Pushed while no vertex of low degree was left.
    pub potential_spill: bool,
    /// Could not be coloured.
    pub spill: bool,
    pub neighbours: BTreeSet<Temp>,
}

impl Vertex {
    fn new(temp: Temp) -> Self {
        Self {
            temp,
            color: None,
            potential_spill: false,
            spill: false,
            neighbours: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub vertices: BTreeMap<Temp, Vertex>,
}

impl Graph {
    /// One vertex per temp except the frame pointer; an edge between every
    /// defined temp and each temp live after the definition.
    pub fn build(code: &Code, live: &Liveness) -> Graph {
        let fp = code.frame.fp;
        let mut g = Graph::default();
        for instr in &code.instrs {
            for &t in instr.uses().iter().chain(instr.defs()) {
                if t != fp {
                    g.add_vertex(t);
                }
            }
        }
        if !code.spill_slots.contains_key(&code.frame.rv) {
            g.add_vertex(code.frame.rv);
        }

        for (i, instr) in code.instrs.iter().enumerate() {
            for &d in instr.defs() {
                if d == fp {
                    continue;
                }
                for &o in &live.live_out[i] {
                    if o != fp {
                        g.add_edge(d, o);
                    }
                }
            }
        }
        g
    }

    pub fn add_vertex(&mut self, t: Temp) {
        self.vertices.entry(t).or_insert_with(|| Vertex::new(t));
    }

    /// Undirected edge; self loops and unknown temps are ignored.
    pub fn add_edge(&mut self, a: Temp, b: Temp) {
        if a == b || !self.vertices.contains_key(&a) || !self.vertices.contains_key(&b) {
            return;
        }
        if let Some(v) = self.vertices.get_mut(&a) {
            v.neighbours.insert(b);
        }
        if let Some(v) = self.vertices.get_mut(&b) {
            v.neighbours.insert(a);
        }
    }

    pub fn interferes(&self, a: Temp, b: Temp) -> bool {
        self.vertices
            .get(&a)
            .is_some_and(|v| v.neighbours.contains(&b))
    }

    pub fn degree(&self, t: Temp) -> usize {
        self.vertices.get(&t).map_or(0, |v| v.neighbours.len())
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
