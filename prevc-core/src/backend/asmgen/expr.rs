use super::{load_constant, Selector};
use crate::backend::abi::{MAX_IMMEDIATE, SP};
use crate::backend::instruction::AsmInstr;
use crate::ir::{BinOp, Expr, Temp, UnOp};
use crate::CompileError;

impl Selector<'_> {
    /// Emit code for `e` and return the temp that holds its value.
    pub fn expr(&mut self, e: &Expr) -> Result<Temp, CompileError> {
        match e {
            Expr::Const(v) => Ok(self.constant(*v)),

            Expr::Name(l) => {
                let t = self.new_temp();
                let name = self.names.label_name(*l);
                self.emit(AsmInstr::oper(format!("LDA `d0,{name}"), vec![], vec![t]));
                Ok(t)
            }

            Expr::Temp(t) => Ok(*t),

            Expr::Mem(addr) => {
                let a = self.expr(addr)?;
                let t = self.new_temp();
                self.emit(AsmInstr::mov("LDO `d0,`s0,0", t, a));
                Ok(t)
            }

            Expr::Binary { op, lhs, rhs } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                let t = self.new_temp();
                match op {
                    op if op.is_relational() => {
                        let set = match op {
                            BinOp::Eq => "ZSZ",
                            BinOp::Ne => "ZSNZ",
                            BinOp::Lt => "ZSN",
                            BinOp::Gt => "ZSP",
                            BinOp::Le => "ZSNP",
                            _ => "ZSNN",
                        };
                        self.emit(AsmInstr::oper("CMP `d0,`s0,`s1", vec![l, r], vec![t]));
                        self.emit(AsmInstr::oper(format!("{set} `d0,`s0,1"), vec![t], vec![t]));
                    }
                    BinOp::Mod => {
                        self.emit(AsmInstr::oper("DIV `d0,`s0,`s1", vec![l, r], vec![t]));
                        self.emit(AsmInstr::oper("GET `d0,rR", vec![], vec![t]));
                    }
                    _ => {
                        let mnemonic = match op {
                            BinOp::Or => "OR",
                            BinOp::And => "AND",
                            BinOp::Add => "ADD",
                            BinOp::Sub => "SUB",
                            BinOp::Mul => "MUL",
                            _ => "DIV",
                        };
                        self.emit(AsmInstr::oper(
                            format!("{mnemonic} `d0,`s0,`s1"),
                            vec![l, r],
                            vec![t],
                        ));
                    }
                }
                Ok(t)
            }

            Expr::Unary { op, expr } => {
                let v = self.expr(expr)?;
                let t = self.new_temp();
                let template = match op {
                    UnOp::Neg => "NEG `d0,0,`s0",
                    UnOp::Not => "XOR `d0,`s0,1",
                };
                self.emit(AsmInstr::oper(template, vec![v], vec![t]));
                Ok(t)
            }

            Expr::Call {
                label,
                offsets,
                args,
            } => {
                for (off, arg) in offsets.iter().zip(args) {
                    let v = self.expr(arg)?;
                    if *off <= MAX_IMMEDIATE {
                        self.emit(AsmInstr::oper(format!("STO `s0,${SP},{off}"), vec![v], vec![]));
                    } else {
                        let o = self.constant(*off);
                        self.emit(AsmInstr::oper(format!("STO `s0,${SP},`s1"), vec![v, o], vec![]));
                    }
                }
                let name = self.names.label_name(*label);
                self.emit(AsmInstr::branch(
                    format!("PUSHJ ${},{name}", self.registers),
                    vec![],
                    vec![*label],
                ));
                let t = self.new_temp();
                self.emit(AsmInstr::oper(format!("LDO `d0,${SP},0"), vec![], vec![t]));
                Ok(t)
            }

            Expr::SExpr(..) => Err(self.fail("statement expression left after canonicalization")),
        }
    }

    pub(super) fn constant(&mut self, v: i64) -> Temp {
        let t = self.new_temp();
        self.instrs.extend(load_constant(t, v));
        t
    }
}
