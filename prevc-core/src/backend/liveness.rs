//! Liveness analysis over abstract instructions.
//!
//! Classic backward dataflow iterated to a fixed point:
//! `out[i] = ∪ in[succ]`, `in[i] = use[i] ∪ (out[i] − def[i])`.
//! Jumps to the function's exit label see the return-value temp live, since
//! the epilogue stores it.

use super::instruction::{AsmInstr, Code};
use crate::ir::{Label, Temp};
use log::debug;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Liveness {
    pub live_in: Vec<BTreeSet<Temp>>,
    pub live_out: Vec<BTreeSet<Temp>>,
    /// Passes until nothing changed (the last pass included).
    pub passes: usize,
}

/// Where control can go after an instruction.
enum Succ {
    Index(usize),
    Exit,
}

impl Liveness {
    /// Compute live-in/live-out sets for every instruction of `code`.
    pub fn analyze(code: &Code) -> Liveness {
        let n = code.instrs.len();
        let mut live = Liveness {
            live_in: vec![BTreeSet::new(); n],
            live_out: vec![BTreeSet::new(); n],
            passes: 0,
        };
        while live.refine(code) {}
        debug!("livean: {} settled after {} passes", code.name, live.passes);
        live
    }

    /// Run one backward pass; returns whether any set changed.
    pub fn refine(&mut self, code: &Code) -> bool {
        let succs = successors(code);
        let exit_live = exit_live_in(code);
        self.live_in.resize(code.instrs.len(), BTreeSet::new());
        self.live_out.resize(code.instrs.len(), BTreeSet::new());
        self.passes += 1;

        let mut changed = false;
        for i in (0..code.instrs.len()).rev() {
            let instr = &code.instrs[i];
            let mut out = BTreeSet::new();
            for s in &succs[i] {
                match s {
                    Succ::Index(j) => out.extend(self.live_in[*j].iter().copied()),
                    Succ::Exit => out.extend(exit_live.iter().copied()),
                }
            }

            let mut inn: BTreeSet<Temp> = instr.uses().iter().copied().collect();
            inn.extend(out.iter().filter(|t| !instr.defs().contains(t)).copied());

            if out != self.live_out[i] {
                self.live_out[i] = out;
                changed = true;
            }
            if inn != self.live_in[i] {
                self.live_in[i] = inn;
                changed = true;
            }
        }
        changed
    }
}

/// Temps the epilogue reads.
fn exit_live_in(code: &Code) -> BTreeSet<Temp> {
    if code.spill_slots.contains_key(&code.frame.rv) {
        BTreeSet::new()
    } else {
        BTreeSet::from([code.frame.rv])
    }
}

fn successors(code: &Code) -> Vec<Vec<Succ>> {
    let labels: HashMap<Label, usize> = code
        .instrs
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| match instr {
            AsmInstr::Label(l) => Some((*l, i)),
            _ => None,
        })
        .collect();

    code.instrs
        .iter()
        .enumerate()
        .map(|(i, instr)| {
            let next = || {
                if i + 1 < code.instrs.len() {
                    vec![Succ::Index(i + 1)]
                } else {
                    vec![]
                }
            };
            if instr.jumps().is_empty() || instr.is_call() {
                return next();
            }
            instr
                .jumps()
                .iter()
                .filter_map(|l| {
                    if *l == code.exit {
                        Some(Succ::Exit)
                    } else {
                        labels.get(l).map(|&j| Succ::Index(j))
                    }
                })
                .collect()
        })
        .collect()
}
