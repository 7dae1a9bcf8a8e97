//! Instruction selection: canonical IR to abstract MMIX instructions.
//!
//! Every IR node has exactly one rewrite rule. Expression rules return the
//! temp holding the node's value; statement rules only emit.

mod expr;
mod stmt;

use super::instruction::{AsmInstr, Code};
use crate::ir::{CodeChunk, Names, Temp};
use crate::{CompileError, SourceLocation};
use log::debug;
use std::collections::BTreeMap;

pub struct Selector<'a> {
    names: &'a mut Names,
    instrs: Vec<AsmInstr>,
    /// Registers `$0..$k-1` hold temps and must survive calls.
    registers: usize,
    location: SourceLocation,
}

impl<'a> Selector<'a> {
    pub fn new(names: &'a mut Names, registers: usize, location: SourceLocation) -> Self {
        Self {
            names,
            instrs: Vec::new(),
            registers,
            location,
        }
    }

    fn new_temp(&mut self) -> Temp {
        self.names.new_temp()
    }

    fn emit(&mut self, instr: AsmInstr) {
        self.instrs.push(instr);
    }

    fn fail(&self, message: impl Into<String>) -> CompileError {
        CompileError::internal(self.location, message)
    }

    pub fn finish(self) -> Vec<AsmInstr> {
        self.instrs
    }
}

/// Materialize a constant into `t`, 16 bits at a time over its magnitude.
pub fn load_constant(t: Temp, v: i64) -> Vec<AsmInstr> {
    let magnitude = v.unsigned_abs();
    let mut out = vec![AsmInstr::oper(
        format!("SETL `d0,{}", magnitude & 0xffff),
        vec![],
        vec![t],
    )];
    for (shift, op) in [(16, "INCML"), (32, "INCMH"), (48, "INCH")] {
        let part = (magnitude >> shift) & 0xffff;
        if part != 0 {
            out.push(AsmInstr::oper(format!("{op} `d0,{part}"), vec![t], vec![t]));
        }
    }
    if v < 0 {
        out.push(AsmInstr::oper("NEG `d0,0,`s0", vec![t], vec![t]));
    }
    out
}

/// Select instructions for one code chunk.
pub fn generate(chunk: &CodeChunk, names: &mut Names, registers: usize) -> Result<Code, CompileError> {
    let mut sel = Selector::new(names, registers, chunk.location);
    for s in &chunk.stmts {
        sel.stmt(s)?;
    }
    let instrs = sel.finish();
    debug!("asmgen: {} -> {} instructions", chunk.name, instrs.len());
    Ok(Code {
        name: chunk.name.clone(),
        frame: chunk.frame.clone(),
        entry: chunk.entry,
        exit: chunk.exit,
        instrs,
        temp_size: 0,
        spill_slots: BTreeMap::new(),
        location: chunk.location,
    })
}
