//! Stack frames and memory accesses produced by memory layout.

use super::tree::{Label, Temp};
use crate::ast::{DeclId, NodeId, WORD_SIZE};
use std::collections::HashMap;

/// Layout of one function's activation record.
///
/// ```text
///   FP + 8·n ...  parameters (caller's outgoing area)
///   FP + 0        static link
///   FP - locs     locals
///   FP - locs - 8   saved FP
///   FP - locs - 16  saved return address
///   ...           spill slots
///   SP + args     outgoing arguments
///   SP + 0        static link / return value of callees
/// ```
#[derive(Debug, Clone)]
pub struct Frame {
    pub label: Label,
    /// Number of enclosing function scopes; 0 at top level.
    pub depth: usize,
    pub locs_size: i64,
    pub args_size: i64,
    pub size: i64,
    pub fp: Temp,
    pub rv: Temp,
}

impl Frame {
    pub fn new(label: Label, depth: usize, locs_size: i64, args_size: i64, fp: Temp, rv: Temp) -> Self {
        Self {
            label,
            depth,
            locs_size,
            args_size,
            size: locs_size + args_size + 2 * WORD_SIZE,
            fp,
            rv,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemoryAccess {
    /// Statically allocated; `init` holds a string literal's text.
    Absolute {
        label: Label,
        size: i64,
        init: Option<String>,
    },
    /// At `offset` from the frame pointer of the function at `depth`
    /// (or from the record base for components).
    Relative { offset: i64, depth: usize },
}

/// Everything memory layout knows about a program.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub frames: HashMap<DeclId, Frame>,
    pub accesses: HashMap<DeclId, MemoryAccess>,
    /// String literals, keyed by the literal's node.
    pub strings: HashMap<NodeId, MemoryAccess>,
}
