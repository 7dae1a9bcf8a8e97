//! Intermediate code.
//!
//! - `tree`:         IR expressions/statements, temps, labels and the name arena
//! - `frame`:        frames and memory accesses
//! - `memory`:       default memory layout
//! - `ir_generator`: typed tree to IR
//! - `canon`:        canonicalization
//! - `chunk`:        linear code chunks and data chunks
//! - `interp`:       interpreter for linearized chunks

pub mod canon;
pub mod chunk;
pub mod frame;
pub mod interp;
pub mod ir_generator;
pub mod memory;
pub mod tree;

pub use chunk::{Chunks, CodeChunk, DataChunk};
pub use frame::{Frame, Layout, MemoryAccess};
pub use ir_generator::ImcTable;
pub use tree::*;

/// A program after intermediate code generation and linearization.
#[derive(Debug, Clone)]
pub struct ProgramIR {
    pub names: Names,
    pub layout: Layout,
    pub imc: ImcTable,
    pub chunks: Chunks,
}

impl ProgramIR {
    pub fn to_lines(&self) -> Vec<String> {
        self.chunks.to_lines(&self.names)
    }

    pub fn code_chunk(&self, name: &str) -> Option<&CodeChunk> {
        self.chunks.code.iter().find(|c| c.name == name)
    }
}
