//! Abstract MMIX instructions and assembly output items.
//!
//! Instruction selection produces [`AsmInstr`]s over temps. Operands are
//! written into a textual template as `` `sN `` (N-th use) and `` `dN ``
//! (N-th def) and only become registers once allocation is done. The
//! emitter turns finished functions into [`AsmItem`]s and flattens them
//! to text.

use crate::ir::{Frame, Label, Names, Temp};
use crate::SourceLocation;
use std::collections::BTreeMap;

// ============================================================================
// Abstract instructions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmInstr {
    /// Any instruction; `jumps` lists the possible successors of a branch.
    Oper {
        template: String,
        uses: Vec<Temp>,
        defs: Vec<Temp>,
        jumps: Vec<Label>,
    },
    /// A register move or a load: exactly one use and one def.
    Move {
        template: String,
        dst: Temp,
        src: Temp,
    },
    Label(Label),
}

impl AsmInstr {
    pub fn oper(template: impl Into<String>, uses: Vec<Temp>, defs: Vec<Temp>) -> Self {
        AsmInstr::Oper {
            template: template.into(),
            uses,
            defs,
            jumps: Vec::new(),
        }
    }

    pub fn branch(template: impl Into<String>, uses: Vec<Temp>, jumps: Vec<Label>) -> Self {
        AsmInstr::Oper {
            template: template.into(),
            uses,
            defs: Vec::new(),
            jumps,
        }
    }

    pub fn mov(template: impl Into<String>, dst: Temp, src: Temp) -> Self {
        AsmInstr::Move {
            template: template.into(),
            dst,
            src,
        }
    }

    pub fn uses(&self) -> &[Temp] {
        match self {
            AsmInstr::Oper { uses, .. } => uses,
            AsmInstr::Move { src, .. } => std::slice::from_ref(src),
            AsmInstr::Label(_) => &[],
        }
    }

    pub fn defs(&self) -> &[Temp] {
        match self {
            AsmInstr::Oper { defs, .. } => defs,
            AsmInstr::Move { dst, .. } => std::slice::from_ref(dst),
            AsmInstr::Label(_) => &[],
        }
    }

    pub fn jumps(&self) -> &[Label] {
        match self {
            AsmInstr::Oper { jumps, .. } => jumps,
            _ => &[],
        }
    }

    /// `PUSHJ` lists its callee as a jump target but control comes back to
    /// the next instruction.
    pub fn is_call(&self) -> bool {
        matches!(self, AsmInstr::Oper { template, .. } if template.starts_with("PUSHJ"))
    }

    pub fn template(&self) -> Option<&str> {
        match self {
            AsmInstr::Oper { template, .. } | AsmInstr::Move { template, .. } => Some(template),
            AsmInstr::Label(_) => None,
        }
    }

    /// Fill in the template. `Label`s render as their name.
    pub fn render(&self, names: &Names, reg: &dyn Fn(Temp) -> String) -> String {
        match self {
            AsmInstr::Label(l) => names.label_name(*l),
            AsmInstr::Oper { template, .. } | AsmInstr::Move { template, .. } => {
                substitute(template, self.uses(), self.defs(), reg)
            }
        }
    }
}

fn substitute(template: &str, uses: &[Temp], defs: &[Temp], reg: &dyn Fn(Temp) -> String) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '`' {
            out.push(c);
            continue;
        }
        let kind = chars.next();
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        let operand = digits
            .parse::<usize>()
            .ok()
            .and_then(|i| match kind {
                Some('s') => uses.get(i),
                Some('d') => defs.get(i),
                _ => None,
            });
        match operand {
            Some(t) => out.push_str(&reg(*t)),
            None => {
                out.push('`');
                out.extend(kind);
                out.push_str(&digits);
            }
        }
    }
    out
}

// ============================================================================
// Per-function abstract code
// ============================================================================

/// A function's instructions before (and during) register allocation.
#[derive(Debug, Clone)]
pub struct Code {
    pub name: String,
    pub frame: Frame,
    pub entry: Label,
    pub exit: Label,
    pub instrs: Vec<AsmInstr>,
    /// Bytes of spill area below the saved return address.
    pub temp_size: i64,
    /// Frame offset of every spilled temp.
    pub spill_slots: BTreeMap<Temp, i64>,
    pub location: SourceLocation,
}

impl Code {
    /// All temps mentioned by the instructions, plus FP and RV.
    pub fn temps(&self) -> Vec<Temp> {
        let mut all: Vec<Temp> = self
            .instrs
            .iter()
            .flat_map(|i| i.uses().iter().chain(i.defs()).copied())
            .chain([self.frame.fp, self.frame.rv])
            .collect();
        all.sort();
        all.dedup();
        all
    }

    pub fn to_lines(&self, names: &Names) -> Vec<String> {
        let show = |t: Temp| {
            if t == self.frame.fp {
                "FP".to_string()
            } else {
                t.to_string()
            }
        };
        self.instrs
            .iter()
            .map(|i| match i {
                AsmInstr::Label(_) => format!("{}:", i.render(names, &show)),
                _ => format!("        {}", i.render(names, &show)),
            })
            .collect()
    }
}

// ============================================================================
// AsmItem: emitter output element
// ============================================================================

/// A structured assembly output element, flattened to text at the end.
#[derive(Debug, Clone)]
pub enum AsmItem {
    /// `label  OP  args`; `label` is empty for unlabelled lines.
    Line {
        label: Option<String>,
        op: String,
        args: String,
    },
    /// A function: its prologue, body and epilogue in order.
    Function {
        name: String,
        prologue: Vec<AsmItem>,
        body: Vec<AsmItem>,
        epilogue: Vec<AsmItem>,
    },
    Comment(String),
    Blank,
}

impl AsmItem {
    pub fn line(op: &str, args: impl Into<String>) -> Self {
        AsmItem::Line {
            label: None,
            op: op.to_string(),
            args: args.into(),
        }
    }

    pub fn labelled(label: impl Into<String>, op: &str, args: impl Into<String>) -> Self {
        AsmItem::Line {
            label: Some(label.into()),
            op: op.to_string(),
            args: args.into(),
        }
    }
}
