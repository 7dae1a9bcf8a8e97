//! Canonicalization: flatten statements and pull every side effect out of
//! expressions, in evaluation order.
//!
//! After this pass no `Seq` or `SExpr` remains, every binary operand and
//! every call argument is a temp, and memory is only touched by
//! `MOVE(TEMP, MEM(addr))` loads and `MOVE(MEM(TEMP), TEMP)` stores.

use super::tree::{Expr, Names, Stmt};
use crate::{CompileError, SourceLocation};
use log::trace;

/// Canonicalize a statement into a flat list. `location` is the function
/// the statement belongs to and is reported by malformed shapes.
pub fn canonize(
    stmt: Stmt,
    names: &mut Names,
    location: SourceLocation,
) -> Result<Vec<Stmt>, CompileError> {
    let mut out = Vec::new();
    canon_stmt(stmt, names, location, &mut out)?;
    Ok(out)
}

fn canon_stmt(
    stmt: Stmt,
    names: &mut Names,
    loc: SourceLocation,
    out: &mut Vec<Stmt>,
) -> Result<(), CompileError> {
    match stmt {
        Stmt::Seq(stmts) => {
            for s in stmts {
                canon_stmt(s, names, loc, out)?;
            }
        }
        Stmt::Label(_) | Stmt::Jump(_) => out.push(stmt),
        Stmt::CJump { cond, pos, neg } => {
            let cond = canon_expr(cond, names, loc, out)?;
            out.push(Stmt::CJump { cond, pos, neg });
        }
        Stmt::Expr(e) => {
            let e = canon_expr(e, names, loc, out)?;
            out.push(Stmt::Expr(e));
        }
        Stmt::Move { dst, src } => match dst {
            Expr::Mem(addr) => {
                let addr_temp = names.new_temp();
                let addr = canon_expr(*addr, names, loc, out)?;
                out.push(Stmt::move_(Expr::Temp(addr_temp), addr));
                let src_temp = names.new_temp();
                let src = canon_expr(src, names, loc, out)?;
                out.push(Stmt::move_(Expr::Temp(src_temp), src));
                trace!("canon store: addr={} value={}", addr_temp, src_temp);
                out.push(Stmt::move_(
                    Expr::mem(Expr::Temp(addr_temp)),
                    Expr::Temp(src_temp),
                ));
            }
            Expr::Temp(dst) => {
                let src_temp = names.new_temp();
                let src = canon_expr(src, names, loc, out)?;
                out.push(Stmt::move_(Expr::Temp(src_temp), src));
                out.push(Stmt::move_(Expr::Temp(dst), Expr::Temp(src_temp)));
            }
            other => {
                return Err(CompileError::internal(
                    loc,
                    format!("move into {:?}", other),
                ))
            }
        },
    }
    Ok(())
}

fn canon_expr(
    expr: Expr,
    names: &mut Names,
    loc: SourceLocation,
    out: &mut Vec<Stmt>,
) -> Result<Expr, CompileError> {
    match expr {
        Expr::Const(_) | Expr::Name(_) | Expr::Temp(_) => Ok(expr),

        Expr::Binary { op, lhs, rhs } => {
            let l = names.new_temp();
            let lhs = canon_expr(*lhs, names, loc, out)?;
            out.push(Stmt::move_(Expr::Temp(l), lhs));
            let r = names.new_temp();
            let rhs = canon_expr(*rhs, names, loc, out)?;
            out.push(Stmt::move_(Expr::Temp(r), rhs));
            trace!("canon binop: lhs={} rhs={}", l, r);
            Ok(Expr::binary(op, Expr::Temp(l), Expr::Temp(r)))
        }

        Expr::Unary { op, expr } => Ok(Expr::unary(op, canon_expr(*expr, names, loc, out)?)),

        Expr::Call {
            label,
            offsets,
            args,
        } => {
            let mut temps = Vec::with_capacity(args.len());
            for arg in args {
                let t = names.new_temp();
                let arg = canon_expr(arg, names, loc, out)?;
                out.push(Stmt::move_(Expr::Temp(t), arg));
                temps.push(Expr::Temp(t));
            }
            Ok(Expr::Call {
                label,
                offsets,
                args: temps,
            })
        }

        Expr::Mem(addr) => {
            let t = names.new_temp();
            let addr = canon_expr(*addr, names, loc, out)?;
            trace!("canon load: {}", t);
            out.push(Stmt::move_(Expr::Temp(t), Expr::mem(addr)));
            Ok(Expr::Temp(t))
        }

        Expr::SExpr(stmt, expr) => {
            canon_stmt(*stmt, names, loc, out)?;
            canon_expr(*expr, names, loc, out)
        }
    }
}

/// Whether a statement list is in canonical form.
pub fn is_canonical(stmts: &[Stmt]) -> bool {
    fn operand(e: &Expr) -> bool {
        matches!(e, Expr::Temp(_))
    }
    fn value(e: &Expr) -> bool {
        match e {
            Expr::Const(_) | Expr::Name(_) | Expr::Temp(_) => true,
            Expr::Binary { lhs, rhs, .. } => operand(lhs) && operand(rhs),
            Expr::Unary { expr, .. } => value(expr),
            Expr::Call { args, .. } => args.iter().all(operand),
            Expr::Mem(_) | Expr::SExpr(..) => false,
        }
    }
    stmts.iter().all(|s| match s {
        Stmt::Label(_) | Stmt::Jump(_) => true,
        Stmt::CJump { cond, .. } => value(cond),
        Stmt::Expr(e) => value(e),
        Stmt::Move { dst, src } => match (dst, src) {
            (Expr::Mem(addr), src) => operand(addr) && operand(src),
            (Expr::Temp(_), Expr::Mem(addr)) => value(addr),
            (Expr::Temp(_), src) => value(src),
            _ => false,
        },
        Stmt::Seq(_) => false,
    })
}
