//! Tree-shaped intermediate code.
//!
//! Expressions and statements mirror the usual "IMC" tree: memory accesses,
//! calls with explicit argument offsets, and a single statement-in-expression
//! form (`SExpr`) that canonicalization removes.

use std::collections::HashMap;
use std::fmt::Write as _;

pub use crate::ast::BinOp;

/// A virtual register. Two temps are equal only if they are the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp(pub u32);

/// A symbolic code or data address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

// ============================================================================
// Name arena
// ============================================================================

/// Allocates temps and labels and remembers the names of named labels.
#[derive(Debug, Clone, Default)]
pub struct Names {
    temps: u32,
    labels: Vec<Option<String>>,
    by_name: HashMap<String, Label>,
}

impl Names {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_temp(&mut self) -> Temp {
        let t = Temp(self.temps);
        self.temps += 1;
        t
    }

    pub fn new_label(&mut self) -> Label {
        let l = Label(self.labels.len() as u32);
        self.labels.push(None);
        l
    }

    /// The label called `name`, created on first request.
    pub fn named_label(&mut self, name: &str) -> Label {
        if let Some(&l) = self.by_name.get(name) {
            return l;
        }
        let l = Label(self.labels.len() as u32);
        self.labels.push(Some(name.to_string()));
        self.by_name.insert(name.to_string(), l);
        l
    }

    pub fn lookup(&self, name: &str) -> Option<Label> {
        self.by_name.get(name).copied()
    }

    pub fn label_name(&self, label: Label) -> String {
        match self.labels.get(label.0 as usize) {
            Some(Some(name)) => name.clone(),
            _ => format!("L{}", label.0),
        }
    }

    /// Number of temps handed out so far.
    pub fn temp_count(&self) -> u32 {
        self.temps
    }
}

impl std::fmt::Display for Temp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ============================================================================
// Expressions and statements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(i64),
    Name(Label),
    Temp(Temp),
    Mem(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    /// Call with the byte offset of each argument in the outgoing area.
    /// The first argument is the static link.
    Call {
        label: Label,
        offsets: Vec<i64>,
        args: Vec<Expr>,
    },
    SExpr(Box<Stmt>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Move { dst: Expr, src: Expr },
    Expr(Expr),
    CJump { cond: Expr, pos: Label, neg: Label },
    Jump(Label),
    Label(Label),
    Seq(Vec<Stmt>),
}

impl Expr {
    pub fn mem(addr: Expr) -> Expr {
        Expr::Mem(Box::new(addr))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnOp, expr: Expr) -> Expr {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn sexpr(stmt: Stmt, expr: Expr) -> Expr {
        Expr::SExpr(Box::new(stmt), Box::new(expr))
    }

    pub fn render(&self, names: &Names) -> String {
        match self {
            Expr::Const(v) => format!("CONST({v})"),
            Expr::Name(l) => format!("NAME({})", names.label_name(*l)),
            Expr::Temp(t) => format!("TEMP({t})"),
            Expr::Mem(a) => format!("MEM({})", a.render(names)),
            Expr::Binary { op, lhs, rhs } => format!(
                "BINOP({},{},{})",
                op_name(*op),
                lhs.render(names),
                rhs.render(names)
            ),
            Expr::Unary { op, expr } => {
                let name = match op {
                    UnOp::Neg => "NEG",
                    UnOp::Not => "NOT",
                };
                format!("UNOP({name},{})", expr.render(names))
            }
            Expr::Call {
                label,
                offsets,
                args,
            } => {
                let mut s = format!("CALL[{}](", names.label_name(*label));
                for (i, (off, arg)) in offsets.iter().zip(args).enumerate() {
                    if i > 0 {
                        s.push(',');
                    }
                    let _ = write!(s, "{off}:{}", arg.render(names));
                }
                s.push(')');
                s
            }
            Expr::SExpr(stmt, expr) => {
                let mut lines = Vec::new();
                stmt.render_into(names, 0, &mut lines);
                format!("SEXPR({{{}}},{})", lines.join("; "), expr.render(names))
            }
        }
    }
}

impl Stmt {
    pub fn move_(dst: Expr, src: Expr) -> Stmt {
        Stmt::Move { dst, src }
    }

    pub fn render(&self, names: &Names) -> Vec<String> {
        let mut out = Vec::new();
        self.render_into(names, 0, &mut out);
        out
    }

    fn render_into(&self, names: &Names, depth: usize, out: &mut Vec<String>) {
        let pad = "  ".repeat(depth);
        match self {
            Stmt::Move { dst, src } => {
                out.push(format!("{pad}MOVE({},{})", dst.render(names), src.render(names)))
            }
            Stmt::Expr(e) => out.push(format!("{pad}ESTMT({})", e.render(names))),
            Stmt::CJump { cond, pos, neg } => out.push(format!(
                "{pad}CJUMP({},{},{})",
                cond.render(names),
                names.label_name(*pos),
                names.label_name(*neg)
            )),
            Stmt::Jump(l) => out.push(format!("{pad}JUMP({})", names.label_name(*l))),
            Stmt::Label(l) => out.push(format!("{pad}LABEL({})", names.label_name(*l))),
            Stmt::Seq(stmts) => {
                out.push(format!("{pad}SEQ"));
                for s in stmts {
                    s.render_into(names, depth + 1, out);
                }
            }
        }
    }
}

pub fn op_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Or => "OR",
        BinOp::And => "AND",
        BinOp::Eq => "EQU",
        BinOp::Ne => "NEQ",
        BinOp::Lt => "LTH",
        BinOp::Gt => "GTH",
        BinOp::Le => "LEQ",
        BinOp::Ge => "GEQ",
        BinOp::Add => "ADD",
        BinOp::Sub => "SUB",
        BinOp::Mul => "MUL",
        BinOp::Div => "DIV",
        BinOp::Mod => "MOD",
    }
}
