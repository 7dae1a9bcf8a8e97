//! MMIX back end: linearized IR to assembly text.
//!
//! Module layout:
//! - `abi`:         register conventions
//! - `instruction`: abstract instructions, per-function code, output items
//! - `asmgen`:      instruction selection
//! - `liveness`:    dataflow liveness analysis
//! - `regalloc`:    graph-colouring allocation with spill repair
//! - `emitter`:     prologue/epilogue, bootstrap, runtime, text
//! - `trace`:       structured per-function diagnostics

pub mod abi;
pub mod asmgen;
pub mod emitter;
pub mod instruction;
pub mod liveness;
pub mod regalloc;
pub mod trace;

pub use emitter::MmixAsm;
pub use instruction::{AsmInstr, Code};
pub use liveness::Liveness;
pub use regalloc::Allocation;

use crate::ir::ProgramIR;
use crate::{CompileError, CompileOptions};

/// Select instructions for every code chunk.
pub fn select_instructions(
    ir: &mut ProgramIR,
    options: &CompileOptions,
) -> Result<Vec<Code>, CompileError> {
    regalloc::check_registers(options.registers)?;
    let ProgramIR { names, chunks, .. } = ir;
    chunks
        .code
        .iter()
        .map(|chunk| asmgen::generate(chunk, names, options.registers))
        .collect()
}

pub fn analyze_liveness(codes: &[Code]) -> Vec<Liveness> {
    codes.iter().map(Liveness::analyze).collect()
}

pub fn allocate_registers(
    ir: &mut ProgramIR,
    codes: Vec<Code>,
    options: &CompileOptions,
) -> Result<Vec<Allocation>, CompileError> {
    codes
        .into_iter()
        .map(|code| regalloc::allocate(code, &mut ir.names, options.registers))
        .collect()
}

pub fn emit_program(
    ir: &ProgramIR,
    allocations: &[Allocation],
    options: &CompileOptions,
) -> Result<MmixAsm, CompileError> {
    emitter::emit(&ir.names, &ir.chunks.data, allocations, options.registers)
}

/// Run the whole back end.
pub fn compile_ir_to_mmix(
    ir: &mut ProgramIR,
    options: &CompileOptions,
) -> Result<MmixAsm, CompileError> {
    let codes = select_instructions(ir, options)?;
    let allocations = allocate_registers(ir, codes, options)?;
    emit_program(ir, &allocations, options)
}
