use crate::ast::{DeclId, NodeId};
use crate::ir::{Expr, Frame, Label, Layout, MemoryAccess, Names, Stmt, Temp};
use crate::{CompileError, SourceLocation};
use std::collections::HashMap;

/// Intermediate code recorded per syntax node.
#[derive(Debug, Clone, Default)]
pub struct ImcTable {
    pub exprs: HashMap<NodeId, Expr>,
    pub stmts: HashMap<NodeId, Stmt>,
}

pub struct Gen<'a> {
    pub names: &'a mut Names,
    pub layout: &'a Layout,
    pub imc: ImcTable,
    /// Frames of the functions being translated, innermost last.
    pub frames: Vec<Frame>,
}

impl<'a> Gen<'a> {
    pub fn new(layout: &'a Layout, names: &'a mut Names) -> Self {
        Self {
            names,
            layout,
            imc: ImcTable::default(),
            frames: Vec::new(),
        }
    }

    pub fn finish(self) -> ImcTable {
        self.imc
    }

    pub fn new_label(&mut self) -> Label {
        self.names.new_label()
    }

    pub fn runtime_label(&mut self, name: &str) -> Label {
        self.names.named_label(name)
    }

    pub fn frame(&self, loc: SourceLocation) -> Result<&Frame, CompileError> {
        self.frames
            .last()
            .ok_or_else(|| CompileError::internal(loc, "code outside of any function"))
    }

    pub fn fp(&self, loc: SourceLocation) -> Result<Temp, CompileError> {
        Ok(self.frame(loc)?.fp)
    }

    pub fn frame_of(&self, fun: DeclId, loc: SourceLocation) -> Result<&'a Frame, CompileError> {
        self.layout
            .frames
            .get(&fun)
            .ok_or_else(|| CompileError::internal(loc, format!("no frame for function #{}", fun.0)))
    }

    pub fn access_of(
        &self,
        decl: DeclId,
        loc: SourceLocation,
    ) -> Result<&'a MemoryAccess, CompileError> {
        self.layout.accesses.get(&decl).ok_or_else(|| {
            CompileError::internal(loc, format!("no memory access for declaration #{}", decl.0))
        })
    }

    /// The frame pointer of the function `hops` levels out, reached by
    /// following static links.
    pub fn static_chain(&self, hops: usize, loc: SourceLocation) -> Result<Expr, CompileError> {
        let mut chain = Expr::Temp(self.fp(loc)?);
        for _ in 0..hops {
            chain = Expr::mem(chain);
        }
        Ok(chain)
    }

    pub fn record_expr(&mut self, id: NodeId, e: &Expr) {
        self.imc.exprs.insert(id, e.clone());
    }

    pub fn record_stmt(&mut self, id: NodeId, s: &Stmt) {
        self.imc.stmts.insert(id, s.clone());
    }
}
