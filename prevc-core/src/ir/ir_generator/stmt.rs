use super::context::Gen;
use crate::ast::{self, Decl, FunDecl, Program, StmtKind};
use crate::ir::Stmt;
use crate::CompileError;
use log::debug;

impl Gen<'_> {
    pub fn lower_program(&mut self, p: &Program) -> Result<(), CompileError> {
        for d in &p.decls {
            if let Decl::Fun(f) = d {
                self.lower_fun(f)?;
            }
        }
        Ok(())
    }

    /// Translate a function body inside its own frame. Nested functions are
    /// reached through the `where` expressions of the body.
    pub fn lower_fun(&mut self, f: &FunDecl) -> Result<(), CompileError> {
        let Some(body) = &f.body else {
            return Ok(());
        };
        let frame = self.frame_of(f.id, f.loc)?.clone();
        debug!("imcgen: {} (depth {})", f.name, frame.depth);
        self.frames.push(frame);
        let result = self.lower_expr(body);
        self.frames.pop();
        result.map(|_| ())
    }

    pub fn lower_stmt(&mut self, s: &ast::Stmt) -> Result<Stmt, CompileError> {
        let imc = match &s.kind {
            StmtKind::Assign { dst, src } => {
                let dst = self.lower_expr(dst)?;
                let src = self.lower_expr(src)?;
                Stmt::move_(dst, src)
            }

            StmtKind::Expr(e) => Stmt::Expr(self.lower_expr(e)?),

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let then_label = self.new_label();
                let else_label = self.new_label();
                let end_label = self.new_label();
                let mut seq = vec![Stmt::CJump {
                    cond: self.lower_expr(cond)?,
                    pos: then_label,
                    neg: else_label,
                }];
                seq.push(Stmt::Label(then_label));
                for s in then_branch {
                    seq.push(self.lower_stmt(s)?);
                }
                seq.push(Stmt::Jump(end_label));
                seq.push(Stmt::Label(else_label));
                for s in else_branch {
                    seq.push(self.lower_stmt(s)?);
                }
                seq.push(Stmt::Label(end_label));
                Stmt::Seq(seq)
            }

            StmtKind::While { cond, body } => {
                let cond_label = self.new_label();
                let body_label = self.new_label();
                let end_label = self.new_label();
                let mut seq = vec![
                    Stmt::Label(cond_label),
                    Stmt::CJump {
                        cond: self.lower_expr(cond)?,
                        pos: body_label,
                        neg: end_label,
                    },
                    Stmt::Label(body_label),
                ];
                for s in body {
                    seq.push(self.lower_stmt(s)?);
                }
                seq.push(Stmt::Jump(cond_label));
                seq.push(Stmt::Label(end_label));
                Stmt::Seq(seq)
            }
        };
        self.record_stmt(s.id, &imc);
        Ok(imc)
    }
}
