//! Typed tree to intermediate code.
//!
//! Every expression and statement is translated once and recorded against
//! its node id in an [`ImcTable`]; the chunk generator later picks function
//! bodies out of that table.

pub mod context;
pub mod expr;
pub mod stmt;

use crate::ast::Program;
use crate::ir::{Layout, Names};
use crate::CompileError;

pub use context::{Gen, ImcTable};

/// Placeholder value of `void` expressions and of blocks that end in a
/// statement.
pub const PLACEHOLDER: i64 = 42;

/// Translate every function body of `program`.
pub fn lower(program: &Program, layout: &Layout, names: &mut Names) -> Result<ImcTable, CompileError> {
    let mut g = Gen::new(layout, names);
    g.lower_program(program)?;
    Ok(g.finish())
}
