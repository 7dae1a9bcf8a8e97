//! Structured per-function diagnostics for the back end phases.

use super::instruction::{AsmInstr, Code};
use super::liveness::Liveness;
use super::regalloc::Allocation;
use crate::ir::{Names, Temp};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionTrace {
    pub name: String,
    pub entry_label: String,
    pub exit_label: String,
    pub frame_size: i64,
    pub temp_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<usize>,
    pub instructions: Vec<InstrTrace>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstrTrace {
    pub code: String,
    #[serde(rename = "use")]
    pub uses: Vec<String>,
    #[serde(rename = "def")]
    pub defs: Vec<String>,
    #[serde(rename = "in", skip_serializing_if = "Vec::is_empty")]
    pub live_in: Vec<String>,
    #[serde(rename = "out", skip_serializing_if = "Vec::is_empty")]
    pub live_out: Vec<String>,
}

fn temps<'a>(ts: impl IntoIterator<Item = &'a Temp>) -> Vec<String> {
    ts.into_iter().map(|t| t.to_string()).collect()
}

impl FunctionTrace {
    /// Trace of abstract code, with liveness if it has been computed.
    pub fn from_code(code: &Code, liveness: Option<&Liveness>, names: &Names) -> Self {
        let fp = code.frame.fp;
        let show = |t: Temp| if t == fp { "FP".to_string() } else { t.to_string() };
        Self::build(code, liveness, None, names, &show)
    }

    /// Trace of allocated code: instructions show real registers.
    pub fn from_allocation(alloc: &Allocation, names: &Names) -> Self {
        let show = |t: Temp| match alloc.reg(t) {
            Some(r) => format!("${r}"),
            None => t.to_string(),
        };
        Self::build(
            &alloc.code,
            Some(&alloc.liveness),
            Some(alloc.rounds),
            names,
            &show,
        )
    }

    fn build(
        code: &Code,
        liveness: Option<&Liveness>,
        rounds: Option<usize>,
        names: &Names,
        show: &dyn Fn(Temp) -> String,
    ) -> Self {
        let empty = BTreeSet::new();
        let instructions = code
            .instrs
            .iter()
            .enumerate()
            .map(|(i, instr)| {
                let (live_in, live_out) = match liveness {
                    Some(l) => (&l.live_in[i], &l.live_out[i]),
                    None => (&empty, &empty),
                };
                let text = instr.render(names, show);
                InstrTrace {
                    code: match instr {
                        AsmInstr::Label(_) => format!("{text}:"),
                        _ => text,
                    },
                    uses: temps(instr.uses()),
                    defs: temps(instr.defs()),
                    live_in: temps(live_in),
                    live_out: temps(live_out),
                }
            })
            .collect();
        FunctionTrace {
            name: code.name.clone(),
            entry_label: names.label_name(code.entry),
            exit_label: names.label_name(code.exit),
            frame_size: code.frame.size,
            temp_size: code.temp_size,
            rounds,
            instructions,
        }
    }
}
