//! Splitting a program into linear code chunks (one per function body) and
//! data chunks (globals and string literals).

use super::canon::canonize;
use super::frame::{Frame, Layout, MemoryAccess};
use super::ir_generator::ImcTable;
use super::tree::{Expr, Label, Names, Stmt};
use crate::ast::{Atom, Decl, ExprKind, FunDecl, Program};
use crate::{CompileError, SourceLocation};
use log::debug;

#[derive(Debug, Clone)]
pub struct CodeChunk {
    pub name: String,
    pub frame: Frame,
    pub stmts: Vec<Stmt>,
    pub entry: Label,
    pub exit: Label,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct DataChunk {
    pub label: Label,
    pub size: i64,
    pub init: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Chunks {
    pub code: Vec<CodeChunk>,
    pub data: Vec<DataChunk>,
}

impl Chunks {
    pub fn to_lines(&self, names: &Names) -> Vec<String> {
        let mut out = Vec::new();
        for d in &self.data {
            let init = match &d.init {
                Some(s) => format!(" \"{}\"", s.escape_default()),
                None => String::new(),
            };
            out.push(format!("DATA {} [{}]{}", names.label_name(d.label), d.size, init));
        }
        for c in &self.code {
            out.push(format!(
                "CODE {} ({}) entry={} exit={} frame={} fp={} rv={}",
                c.name,
                names.label_name(c.frame.label),
                names.label_name(c.entry),
                names.label_name(c.exit),
                c.frame.size,
                c.frame.fp,
                c.frame.rv
            ));
            for s in &c.stmts {
                for line in s.render(names) {
                    out.push(format!("  {line}"));
                }
            }
        }
        out
    }
}

/// Canonicalize and linearize every function body; collect data chunks.
pub fn generate(
    program: &Program,
    layout: &Layout,
    imc: &ImcTable,
    names: &mut Names,
) -> Result<Chunks, CompileError> {
    let mut g = ChunkGen {
        layout,
        imc,
        names,
        chunks: Chunks::default(),
    };
    for d in &program.decls {
        match d {
            Decl::Var(v) => g.data(layout.accesses.get(&v.id)),
            Decl::Fun(f) => g.function(f)?,
        }
    }
    Ok(g.chunks)
}

struct ChunkGen<'a> {
    layout: &'a Layout,
    imc: &'a ImcTable,
    names: &'a mut Names,
    chunks: Chunks,
}

impl ChunkGen<'_> {
    fn data(&mut self, access: Option<&MemoryAccess>) {
        if let Some(MemoryAccess::Absolute { label, size, init }) = access {
            self.chunks.data.push(DataChunk {
                label: *label,
                size: *size,
                init: init.clone(),
            });
        }
    }

    fn function(&mut self, f: &FunDecl) -> Result<(), CompileError> {
        let Some(body) = &f.body else {
            return Ok(());
        };

        // Literals and nested functions come before this function's chunk.
        let mut nested = Vec::new();
        let mut strings = Vec::new();
        body.walk(false, &mut |e| match &e.kind {
            ExprKind::Atom(Atom::Str(_)) => strings.push(e.id),
            ExprKind::Where { decls, .. } => {
                nested.extend(decls.iter().filter_map(|d| match d {
                    Decl::Fun(f) => Some(f),
                    Decl::Var(_) => None,
                }))
            }
            _ => {}
        });
        for id in strings {
            let layout = self.layout;
            self.data(layout.strings.get(&id));
        }
        for n in nested {
            self.function(n)?;
        }

        let frame = self
            .layout
            .frames
            .get(&f.id)
            .cloned()
            .ok_or_else(|| CompileError::internal(f.loc, format!("no frame for {}", f.name)))?;
        let value = self.imc.exprs.get(&body.id).cloned().ok_or_else(|| {
            CompileError::internal(f.loc, format!("body of {} was never translated", f.name))
        })?;

        let entry = self.names.new_label();
        let exit = self.names.new_label();
        let mut stmts = vec![Stmt::Label(entry)];
        stmts.extend(canonize(
            Stmt::move_(Expr::Temp(frame.rv), value),
            self.names,
            f.loc,
        )?);
        stmts.push(Stmt::Jump(exit));
        let stmts = linearize(stmts, self.names);
        debug!("imclin: {} has {} statements", f.name, stmts.len());

        self.chunks.code.push(CodeChunk {
            name: f.name.clone(),
            frame,
            stmts,
            entry,
            exit,
            location: f.loc,
        });
        Ok(())
    }
}

/// Give every conditional jump a fresh fall-through label followed by an
/// unconditional jump to its negative target.
fn linearize(stmts: Vec<Stmt>, names: &mut Names) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for s in stmts {
        match s {
            Stmt::CJump { cond, pos, neg } => {
                let fall = names.new_label();
                out.push(Stmt::CJump {
                    cond,
                    pos,
                    neg: fall,
                });
                out.push(Stmt::Label(fall));
                out.push(Stmt::Jump(neg));
            }
            other => out.push(other),
        }
    }
    out
}
