pub mod ast;
pub mod backend;
pub mod ir;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Internal error at {location}: {message}")]
    Internal {
        location: SourceLocation,
        message: String,
    },

    #[error("Resource exhausted in {function} ({location}): {message}")]
    ResourceExhausted {
        location: SourceLocation,
        function: String,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing entry point: {0}")]
    MissingEntry(String),
}

impl CompileError {
    pub(crate) fn internal(location: SourceLocation, message: impl Into<String>) -> Self {
        CompileError::Internal {
            location,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Number of general registers handed to the allocator when none is given.
pub const DEFAULT_REGISTERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Registers available for colouring temporaries (`$0 .. $k-1`).
    pub registers: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            registers: DEFAULT_REGISTERS,
        }
    }
}

/// Lay out memory, translate to IR, canonicalize and split into chunks.
pub fn compile_to_ir(program: &ast::Program) -> Result<ir::ProgramIR, CompileError> {
    let mut names = ir::Names::new();
    let layout = ir::memory::evaluate(program, &mut names);
    let imc = ir::ir_generator::lower(program, &layout, &mut names)?;
    let chunks = ir::chunk::generate(program, &layout, &imc, &mut names)?;
    Ok(ir::ProgramIR {
        names,
        layout,
        imc,
        chunks,
    })
}

/// Compile a typed program all the way to MMIX assembly.
pub fn compile_to_mmix(
    program: &ast::Program,
    options: &CompileOptions,
) -> Result<backend::MmixAsm, CompileError> {
    let mut ir = compile_to_ir(program)?;
    backend::compile_ir_to_mmix(&mut ir, options)
}
