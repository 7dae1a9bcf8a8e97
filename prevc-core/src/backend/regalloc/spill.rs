//! Spill repair: route every access of a spilled temp through its frame slot.

use crate::ast::WORD_SIZE;
use crate::backend::asmgen::load_constant;
use crate::backend::instruction::{AsmInstr, Code};
use crate::ir::{Names, Temp};
use std::collections::BTreeSet;

/// Give `spilled` a slot below the saved return address and return new code
/// in which each use loads it into a fresh temp and each def stores a fresh
/// temp back. Temps created here are added to `repair`.
pub fn rewrite(mut code: Code, spilled: Temp, names: &mut Names, repair: &mut BTreeSet<Temp>) -> Code {
    code.temp_size += WORD_SIZE;
    let offset = -code.frame.locs_size - code.temp_size - 2 * WORD_SIZE;
    code.spill_slots.insert(spilled, offset);
    let fp = code.frame.fp;

    let old = std::mem::take(&mut code.instrs);
    let mut instrs = Vec::with_capacity(old.len() + 8);
    for instr in old {
        let used = instr.uses().contains(&spilled);
        let defined = instr.defs().contains(&spilled);
        if !used && !defined {
            instrs.push(instr);
            continue;
        }

        let load = used.then(|| {
            let off = names.new_temp();
            let val = names.new_temp();
            repair.extend([off, val]);
            instrs.extend(load_constant(off, offset));
            instrs.push(AsmInstr::oper("LDO `d0,`s0,`s1", vec![fp, off], vec![val]));
            val
        });
        let store = defined.then(|| {
            let val = names.new_temp();
            repair.insert(val);
            val
        });

        instrs.push(replace(&instr, spilled, load, store));

        if let Some(val) = store {
            let off = names.new_temp();
            repair.insert(off);
            instrs.extend(load_constant(off, offset));
            instrs.push(AsmInstr::oper("STO `s0,`s1,`s2", vec![val, fp, off], vec![]));
        }
    }
    code.instrs = instrs;
    code
}

fn replace(instr: &AsmInstr, spilled: Temp, load: Option<Temp>, store: Option<Temp>) -> AsmInstr {
    let sub = |t: Temp, with: Option<Temp>| match with {
        Some(w) if t == spilled => w,
        _ => t,
    };
    match instr {
        AsmInstr::Oper {
            template,
            uses,
            defs,
            jumps,
        } => AsmInstr::Oper {
            template: template.clone(),
            uses: uses.iter().map(|&t| sub(t, load)).collect(),
            defs: defs.iter().map(|&t| sub(t, store)).collect(),
            jumps: jumps.clone(),
        },
        AsmInstr::Move { template, dst, src } => AsmInstr::Move {
            template: template.clone(),
            dst: sub(*dst, store),
            src: sub(*src, load),
        },
        AsmInstr::Label(l) => AsmInstr::Label(*l),
    }
}
