//! Programmatic construction of typed trees.
//!
//! Hands out fresh node and declaration ids, fills in result types the way
//! the type resolver would, and flags lvalues the way address resolution
//! would. Used by front ends that do not serialize their trees and by tests.

use super::*;

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_node: u32,
    next_decl: u32,
    loc: SourceLocation,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source location attached to every node built from now on.
    pub fn at(&mut self, line: usize, column: usize) -> &mut Self {
        self.loc = SourceLocation { line, column };
        self
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    fn decl_id(&mut self) -> DeclId {
        let id = DeclId(self.next_decl);
        self.next_decl += 1;
        id
    }

    fn expr(&mut self, ty: Type, lvalue: bool, kind: ExprKind) -> Expr {
        Expr {
            id: self.node_id(),
            ty,
            lvalue,
            loc: self.loc,
            kind,
        }
    }

    fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.node_id(),
            loc: self.loc,
            kind,
        }
    }

    // ── Declarations ────────────────────────────────────────────────────

    pub fn var(&mut self, name: &str, ty: Type) -> VarDecl {
        VarDecl {
            id: self.decl_id(),
            name: name.to_string(),
            ty,
            loc: self.loc,
        }
    }

    pub fn param(&mut self, name: &str, ty: Type) -> ParDecl {
        ParDecl {
            id: self.decl_id(),
            name: name.to_string(),
            ty,
        }
    }

    pub fn component(&mut self, name: &str, ty: Type) -> Component {
        Component {
            id: self.decl_id(),
            name: name.to_string(),
            ty,
        }
    }

    /// Declare a function without a body. Give it one with [`FunDecl::define`];
    /// declaring first lets the body call the function recursively.
    pub fn fun(&mut self, name: &str, params: Vec<ParDecl>, ret: Type) -> FunDecl {
        FunDecl {
            id: self.decl_id(),
            name: name.to_string(),
            params,
            ret,
            body: None,
            loc: self.loc,
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    pub fn int(&mut self, v: i64) -> Expr {
        self.expr(Type::Int, false, ExprKind::Atom(Atom::Int(v)))
    }

    pub fn boolean(&mut self, b: bool) -> Expr {
        self.expr(Type::Bool, false, ExprKind::Atom(Atom::Bool(b)))
    }

    pub fn chr(&mut self, c: u8) -> Expr {
        self.expr(Type::Char, false, ExprKind::Atom(Atom::Char(c)))
    }

    pub fn string(&mut self, s: &str) -> Expr {
        self.expr(
            Type::ptr(Type::Char),
            false,
            ExprKind::Atom(Atom::Str(s.to_string())),
        )
    }

    pub fn void(&mut self) -> Expr {
        self.expr(Type::Void, false, ExprKind::Atom(Atom::Void))
    }

    pub fn nil(&mut self) -> Expr {
        self.expr(Type::ptr(Type::Void), false, ExprKind::Atom(Atom::Nil))
    }

    pub fn var_ref(&mut self, v: &VarDecl) -> Expr {
        self.expr(v.ty.clone(), true, ExprKind::Name(v.id))
    }

    pub fn param_ref(&mut self, p: &ParDecl) -> Expr {
        self.expr(p.ty.clone(), true, ExprKind::Name(p.id))
    }

    pub fn index(&mut self, arr: Expr, idx: Expr) -> Expr {
        let ty = match &arr.ty {
            Type::Array { elem, .. } => (**elem).clone(),
            other => other.clone(),
        };
        let lvalue = arr.lvalue;
        self.expr(
            ty,
            lvalue,
            ExprKind::Index {
                arr: Box::new(arr),
                idx: Box::new(idx),
            },
        )
    }

    pub fn field(&mut self, rec: Expr, comp: &Component) -> Expr {
        let lvalue = rec.lvalue;
        self.expr(
            comp.ty.clone(),
            lvalue,
            ExprKind::Field {
                rec: Box::new(rec),
                comp: comp.id,
            },
        )
    }

    pub fn binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let ty = match op {
            BinOp::Or | BinOp::And => Type::Bool,
            op if op.is_relational() => Type::Bool,
            _ => Type::Int,
        };
        self.expr(
            ty,
            false,
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }

    pub fn prefix(&mut self, op: PrefixOp, expr: Expr) -> Expr {
        let ty = match op {
            PrefixOp::Not => Type::Bool,
            PrefixOp::Plus | PrefixOp::Minus => Type::Int,
            PrefixOp::AddrOf => Type::ptr(expr.ty.clone()),
            PrefixOp::New => Type::ptr(Type::Void),
            PrefixOp::Del => Type::Void,
        };
        self.expr(
            ty,
            false,
            ExprKind::Prefix {
                op,
                expr: Box::new(expr),
            },
        )
    }

    pub fn deref(&mut self, expr: Expr) -> Expr {
        let ty = match &expr.ty {
            Type::Ptr(to) => (**to).clone(),
            other => other.clone(),
        };
        self.expr(ty, true, ExprKind::Deref(Box::new(expr)))
    }

    pub fn call(&mut self, fun: &FunDecl, args: Vec<Expr>) -> Expr {
        self.expr(
            fun.ret.clone(),
            false,
            ExprKind::Call { fun: fun.id, args },
        )
    }

    pub fn cast(&mut self, ty: Type, expr: Expr) -> Expr {
        self.expr(
            ty.clone(),
            false,
            ExprKind::Cast {
                ty,
                expr: Box::new(expr),
            },
        )
    }

    pub fn block(&mut self, stmts: Vec<Stmt>) -> Expr {
        let ty = match stmts.last().map(|s| &s.kind) {
            Some(StmtKind::Expr(e)) => e.ty.clone(),
            _ => Type::Void,
        };
        self.expr(ty, false, ExprKind::Block(stmts))
    }

    pub fn where_(&mut self, expr: Expr, decls: Vec<Decl>) -> Expr {
        let ty = expr.ty.clone();
        self.expr(
            ty,
            false,
            ExprKind::Where {
                expr: Box::new(expr),
                decls,
            },
        )
    }

    // ── Statements ──────────────────────────────────────────────────────

    pub fn assign(&mut self, dst: Expr, src: Expr) -> Stmt {
        self.stmt(StmtKind::Assign { dst, src })
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn if_(&mut self, cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn while_(&mut self, cond: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::While { cond, body })
    }
}

impl FunDecl {
    /// Attach a body to a declared function.
    pub fn define(mut self, body: Expr) -> FunDecl {
        self.body = Some(body);
        self
    }
}
