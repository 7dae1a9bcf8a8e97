use super::context::Gen;
use super::PLACEHOLDER;
use crate::ast::{self, Atom, Decl, ExprKind, PrefixOp, StmtKind, Type, WORD_SIZE};
use crate::ir::{BinOp, Expr, MemoryAccess, Stmt, UnOp};
use crate::CompileError;

impl Gen<'_> {
    /// Translate an expression and record the result against its node.
    pub fn lower_expr(&mut self, e: &ast::Expr) -> Result<Expr, CompileError> {
        let imc = self.translate_expr(e)?;
        self.record_expr(e.id, &imc);
        Ok(imc)
    }

    fn translate_expr(&mut self, e: &ast::Expr) -> Result<Expr, CompileError> {
        match &e.kind {
            ExprKind::Atom(atom) => self.lower_atom(e, atom),

            ExprKind::Name(decl) => match self.access_of(*decl, e.loc)? {
                MemoryAccess::Absolute { label, .. } => Ok(Expr::mem(Expr::Name(*label))),
                MemoryAccess::Relative { offset, depth } => {
                    let here = self.frame(e.loc)?.depth;
                    let hops = here.checked_sub(*depth).ok_or_else(|| {
                        CompileError::internal(e.loc, "variable used outside its scope")
                    })?;
                    let chain = self.static_chain(hops, e.loc)?;
                    Ok(Expr::mem(Expr::binary(BinOp::Add, chain, Expr::Const(*offset))))
                }
            },

            ExprKind::Index { arr, idx } => {
                let base = self.address_of(arr)?;
                let index = self.lower_expr(idx)?;
                let offset = Expr::binary(BinOp::Mul, index, Expr::Const(e.ty.size()));
                Ok(Expr::mem(Expr::binary(BinOp::Add, base, offset)))
            }

            ExprKind::Field { rec, comp } => {
                let base = self.address_of(rec)?;
                match self.access_of(*comp, e.loc)? {
                    MemoryAccess::Relative { offset, .. } => Ok(Expr::mem(Expr::binary(
                        BinOp::Add,
                        base,
                        Expr::Const(*offset),
                    ))),
                    MemoryAccess::Absolute { .. } => Err(CompileError::internal(
                        e.loc,
                        "record component with an absolute access",
                    )),
                }
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.lower_expr(lhs)?;
                let r = self.lower_expr(rhs)?;
                Ok(Expr::binary(*op, l, r))
            }

            ExprKind::Prefix { op, expr } => match op {
                PrefixOp::Plus => self.lower_expr(expr),
                PrefixOp::Minus => Ok(Expr::unary(UnOp::Neg, self.lower_expr(expr)?)),
                PrefixOp::Not => Ok(Expr::unary(UnOp::Not, self.lower_expr(expr)?)),
                PrefixOp::AddrOf => self.address_of(expr),
                PrefixOp::New => self.runtime_call("_new", expr, e),
                PrefixOp::Del => self.runtime_call("_del", expr, e),
            },

            ExprKind::Deref(expr) => Ok(Expr::mem(self.lower_expr(expr)?)),

            ExprKind::Call { fun, args } => {
                let callee = self.frame_of(*fun, e.loc)?;
                let caller_depth = self.frame(e.loc)?.depth;
                let hops = if callee.depth == 0 {
                    0
                } else {
                    (caller_depth + 1).checked_sub(callee.depth).ok_or_else(|| {
                        CompileError::internal(e.loc, "call to a function that is not in scope")
                    })?
                };
                let label = callee.label;

                let mut offsets = vec![0];
                let mut imc_args = vec![self.static_chain(hops, e.loc)?];
                let mut offset = WORD_SIZE;
                for arg in args {
                    offsets.push(offset);
                    imc_args.push(self.lower_expr(arg)?);
                    offset += arg.ty.size();
                }
                Ok(Expr::Call {
                    label,
                    offsets,
                    args: imc_args,
                })
            }

            ExprKind::Cast { ty, expr } => {
                let inner = self.lower_expr(expr)?;
                if *ty == Type::Char {
                    Ok(Expr::binary(BinOp::Mod, inner, Expr::Const(256)))
                } else {
                    Ok(inner)
                }
            }

            ExprKind::Block(stmts) => {
                let (init, value) = match stmts.split_last() {
                    Some((last, init)) => match &last.kind {
                        StmtKind::Expr(value) => (init, Some((last, value))),
                        _ => (stmts.as_slice(), None),
                    },
                    None => (stmts.as_slice(), None),
                };
                let mut seq = Vec::with_capacity(stmts.len());
                for s in init {
                    seq.push(self.lower_stmt(s)?);
                }
                let value = match value {
                    Some((stmt, expr)) => {
                        let v = self.lower_expr(expr)?;
                        self.record_stmt(stmt.id, &Stmt::Expr(v.clone()));
                        v
                    }
                    None => Expr::Const(PLACEHOLDER),
                };
                Ok(Expr::sexpr(Stmt::Seq(seq), value))
            }

            ExprKind::Where { expr, decls } => {
                for d in decls {
                    if let Decl::Fun(f) = d {
                        self.lower_fun(f)?;
                    }
                }
                self.lower_expr(expr)
            }
        }
    }

    fn lower_atom(&mut self, e: &ast::Expr, atom: &Atom) -> Result<Expr, CompileError> {
        Ok(match atom {
            Atom::Void => Expr::Const(PLACEHOLDER),
            Atom::Nil => Expr::Const(0),
            Atom::Bool(b) => Expr::Const(*b as i64),
            Atom::Char(c) => Expr::Const(*c as i64),
            Atom::Int(v) => Expr::Const(*v),
            Atom::Str(_) => match self.layout.strings.get(&e.id) {
                Some(MemoryAccess::Absolute { label, .. }) => Expr::Name(*label),
                _ => {
                    return Err(CompileError::internal(
                        e.loc,
                        "string literal without a static location",
                    ))
                }
            },
        })
    }

    /// Address of an lvalue: its translation with the outer `MEM` removed.
    fn address_of(&mut self, e: &ast::Expr) -> Result<Expr, CompileError> {
        match self.lower_expr(e)? {
            Expr::Mem(addr) => Ok(*addr),
            _ => Err(CompileError::internal(
                e.loc,
                "expected an expression that denotes memory",
            )),
        }
    }

    /// `new`/`del` are calls into the runtime with one user argument.
    fn runtime_call(
        &mut self,
        name: &str,
        arg: &ast::Expr,
        at: &ast::Expr,
    ) -> Result<Expr, CompileError> {
        let label = self.runtime_label(name);
        let sl = Expr::Temp(self.fp(at.loc)?);
        let value = self.lower_expr(arg)?;
        Ok(Expr::Call {
            label,
            offsets: vec![0, WORD_SIZE],
            args: vec![sl, value],
        })
    }
}
