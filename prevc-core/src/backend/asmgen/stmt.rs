use super::Selector;
use crate::backend::instruction::AsmInstr;
use crate::ir::{Expr, Stmt};
use crate::CompileError;

impl Selector<'_> {
    pub fn stmt(&mut self, s: &Stmt) -> Result<(), CompileError> {
        match s {
            Stmt::Move { dst, src } => self.move_(dst, src),

            Stmt::Expr(e) => self.expr(e).map(|_| ()),

            // The linearized negative target is the next label, so only the
            // positive case needs a branch.
            Stmt::CJump { cond, pos, neg } => {
                let c = self.expr(cond)?;
                let name = self.names.label_name(*pos);
                self.emit(AsmInstr::branch(
                    format!("BNZ `s0,{name}"),
                    vec![c],
                    vec![*pos, *neg],
                ));
                Ok(())
            }

            Stmt::Jump(l) => {
                let name = self.names.label_name(*l);
                self.emit(AsmInstr::branch(format!("JMP {name}"), vec![], vec![*l]));
                Ok(())
            }

            Stmt::Label(l) => {
                self.emit(AsmInstr::Label(*l));
                Ok(())
            }

            Stmt::Seq(stmts) => {
                for s in stmts {
                    self.stmt(s)?;
                }
                Ok(())
            }
        }
    }

    fn move_(&mut self, dst: &Expr, src: &Expr) -> Result<(), CompileError> {
        match (dst, src) {
            (Expr::Mem(dst_addr), Expr::Mem(src_addr)) => {
                let from = self.expr(src_addr)?;
                let to = self.expr(dst_addr)?;
                let value = self.new_temp();
                self.emit(AsmInstr::mov("LDO `d0,`s0,0", value, from));
                self.emit(AsmInstr::oper("STO `s0,`s1,0", vec![value, to], vec![]));
            }
            (Expr::Mem(dst_addr), src) => {
                let value = self.expr(src)?;
                let to = self.expr(dst_addr)?;
                self.emit(AsmInstr::oper("STO `s0,`s1,0", vec![value, to], vec![]));
            }
            (Expr::Temp(d), Expr::Mem(src_addr)) => {
                let from = self.expr(src_addr)?;
                self.emit(AsmInstr::mov("LDO `d0,`s0,0", *d, from));
            }
            (Expr::Temp(d), src) => {
                let value = self.expr(src)?;
                self.emit(AsmInstr::mov("SET `d0,`s0", *d, value));
            }
            _ => return Err(self.fail("move into something other than a temp or memory")),
        }
        Ok(())
    }
}
