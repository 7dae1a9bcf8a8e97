//! Typed syntax tree consumed by the back end.
//!
//! Upstream phases (parsing, name/type/address resolution) hand over a tree
//! in which every name-using node already points at its declaration
//! ([`DeclId`]), every expression carries its resolved [`Type`] and an
//! lvalue flag, and every node carries a [`SourceLocation`] for diagnostics.

pub mod builder;

pub use builder::AstBuilder;

use crate::SourceLocation;
use serde::{Deserialize, Serialize};

/// Identity of an expression or statement node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identity of a declaration (variable, parameter, function, record component).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

// ============================================================================
// Semantic types
// ============================================================================

/// Size in bytes of every scalar value (int, char, bool, pointer).
pub const WORD_SIZE: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Void,
    Char,
    Int,
    Bool,
    Ptr(Box<Type>),
    Array { elem: Box<Type>, len: i64 },
    Record(Vec<Component>),
}

/// A record component; its offset is resolved by the memory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
}

impl Type {
    pub fn size(&self) -> i64 {
        match self {
            Type::Void | Type::Char | Type::Int | Type::Bool | Type::Ptr(_) => WORD_SIZE,
            Type::Array { elem, len } => elem.size() * len,
            Type::Record(comps) => comps.iter().map(|c| c.ty.size()).sum(),
        }
    }

    pub fn ptr(to: Type) -> Type {
        Type::Ptr(Box::new(to))
    }

    pub fn array(elem: Type, len: i64) -> Type {
        Type::Array {
            elem: Box::new(elem),
            len,
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Var(VarDecl),
    Fun(FunDecl),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
}

/// A function declaration. Functions without a body are provided by the
/// runtime (`putc`, `getc`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunDecl {
    pub id: DeclId,
    pub name: String,
    pub params: Vec<ParDecl>,
    pub ret: Type,
    pub body: Option<Expr>,
    #[serde(default)]
    pub loc: SourceLocation,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub ty: Type,
    /// Set by address resolution when the expression denotes a memory cell.
    #[serde(default)]
    pub lvalue: bool,
    #[serde(default)]
    pub loc: SourceLocation,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOp {
    Not,
    Plus,
    Minus,
    /// `^e`: address of an lvalue.
    AddrOf,
    New,
    Del,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Atom {
    Void,
    Nil,
    Bool(bool),
    Char(u8),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Atom(Atom),
    Name(DeclId),
    Index { arr: Box<Expr>, idx: Box<Expr> },
    Field { rec: Box<Expr>, comp: DeclId },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Prefix { op: PrefixOp, expr: Box<Expr> },
    /// `e^`: dereference.
    Deref(Box<Expr>),
    Call { fun: DeclId, args: Vec<Expr> },
    Cast { ty: Type, expr: Box<Expr> },
    /// `{ s1; s2; ...; sn }`: a block whose value is its last statement's.
    Block(Vec<Stmt>),
    Where { expr: Box<Expr>, decls: Vec<Decl> },
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    #[serde(default)]
    pub loc: SourceLocation,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Assign { dst: Expr, src: Expr },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
}

// ============================================================================
// Traversal helpers
// ============================================================================

impl Expr {
    /// Visit every expression in this subtree in pre-order, stopping at
    /// nested function declarations unless `into_functions` is set.
    pub fn walk<'a>(&'a self, into_functions: bool, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Atom(_) | ExprKind::Name(_) => {}
            ExprKind::Index { arr, idx } => {
                arr.walk(into_functions, f);
                idx.walk(into_functions, f);
            }
            ExprKind::Field { rec, .. } => rec.walk(into_functions, f),
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.walk(into_functions, f);
                rhs.walk(into_functions, f);
            }
            ExprKind::Prefix { expr, .. } | ExprKind::Deref(expr) | ExprKind::Cast { expr, .. } => {
                expr.walk(into_functions, f)
            }
            ExprKind::Call { args, .. } => {
                for a in args {
                    a.walk(into_functions, f);
                }
            }
            ExprKind::Block(stmts) => {
                for s in stmts {
                    s.walk(into_functions, f);
                }
            }
            ExprKind::Where { expr, decls } => {
                expr.walk(into_functions, f);
                if into_functions {
                    for d in decls {
                        if let Decl::Fun(fun) = d {
                            if let Some(body) = &fun.body {
                                body.walk(into_functions, f);
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Stmt {
    pub fn walk<'a>(&'a self, into_functions: bool, f: &mut dyn FnMut(&'a Expr)) {
        match &self.kind {
            StmtKind::Assign { dst, src } => {
                dst.walk(into_functions, f);
                src.walk(into_functions, f);
            }
            StmtKind::Expr(e) => e.walk(into_functions, f),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.walk(into_functions, f);
                for s in then_branch.iter().chain(else_branch) {
                    s.walk(into_functions, f);
                }
            }
            StmtKind::While { cond, body } => {
                cond.walk(into_functions, f);
                for s in body {
                    s.walk(into_functions, f);
                }
            }
        }
    }
}
