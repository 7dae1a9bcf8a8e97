//! Default memory layout: frames for functions, accesses for variables,
//! parameters, record components and string literals.

use super::frame::{Frame, Layout, MemoryAccess};
use super::tree::Names;
use crate::ast::*;
use log::debug;

/// Compute frames and memory accesses for a whole program.
pub fn evaluate(program: &Program, names: &mut Names) -> Layout {
    let mut ev = Evaluator {
        names,
        layout: Layout::default(),
    };
    for decl in &program.decls {
        match decl {
            Decl::Var(v) => {
                ev.record(&v.ty);
                let label = ev.names.named_label(&format!("_{}", v.name));
                ev.layout.accesses.insert(
                    v.id,
                    MemoryAccess::Absolute {
                        label,
                        size: v.ty.size(),
                        init: None,
                    },
                );
            }
            Decl::Fun(f) => ev.function(f, 0),
        }
    }
    ev.layout
}

struct Evaluator<'n> {
    names: &'n mut Names,
    layout: Layout,
}

impl Evaluator<'_> {
    fn function(&mut self, fun: &FunDecl, depth: usize) {
        let label = if depth == 0 {
            self.names.named_label(&format!("_{}", fun.name))
        } else {
            self.names.new_label()
        };

        let mut offset = WORD_SIZE;
        for p in &fun.params {
            self.record(&p.ty);
            self.layout
                .accesses
                .insert(p.id, MemoryAccess::Relative { offset, depth });
            offset += p.ty.size();
        }
        self.record(&fun.ret);

        let mut locs_size = 0;
        let mut args_size = 0;
        let mut nested = Vec::new();
        if let Some(body) = &fun.body {
            let mut exprs = Vec::new();
            body.walk(false, &mut |e| exprs.push(e));
            for e in exprs {
                self.record(&e.ty);
                match &e.kind {
                    ExprKind::Atom(Atom::Str(s)) => {
                        let access = MemoryAccess::Absolute {
                            label: self.names.new_label(),
                            size: (s.len() as i64 + 1) * WORD_SIZE,
                            init: Some(s.clone()),
                        };
                        self.layout.strings.insert(e.id, access);
                    }
                    ExprKind::Call { args, .. } => {
                        let size = WORD_SIZE + args.iter().map(|a| a.ty.size()).sum::<i64>();
                        args_size = args_size.max(size);
                    }
                    ExprKind::Prefix {
                        op: PrefixOp::New | PrefixOp::Del,
                        ..
                    } => args_size = args_size.max(2 * WORD_SIZE),
                    ExprKind::Cast { ty, .. } => self.record(ty),
                    ExprKind::Where { decls, .. } => {
                        for d in decls {
                            match d {
                                Decl::Var(v) => {
                                    self.record(&v.ty);
                                    locs_size += v.ty.size();
                                    self.layout.accesses.insert(
                                        v.id,
                                        MemoryAccess::Relative {
                                            offset: -locs_size,
                                            depth,
                                        },
                                    );
                                }
                                Decl::Fun(f) => nested.push(f),
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let frame = Frame::new(
            label,
            depth,
            locs_size,
            args_size,
            self.names.new_temp(),
            self.names.new_temp(),
        );
        debug!(
            "frame {}: depth={} locs={} args={} size={}",
            self.names.label_name(label),
            depth,
            frame.locs_size,
            frame.args_size,
            frame.size
        );
        self.layout.frames.insert(fun.id, frame);

        for f in nested {
            self.function(f, depth + 1);
        }
    }

    /// Assign offsets to the components of every record reachable from `ty`.
    fn record(&mut self, ty: &Type) {
        match ty {
            Type::Ptr(to) => self.record(to),
            Type::Array { elem, .. } => self.record(elem),
            Type::Record(comps) => {
                if comps
                    .first()
                    .is_some_and(|c| self.layout.accesses.contains_key(&c.id))
                {
                    return;
                }
                let mut offset = 0;
                for c in comps {
                    self.layout
                        .accesses
                        .insert(c.id, MemoryAccess::Relative { offset, depth: 0 });
                    self.record(&c.ty);
                    offset += c.ty.size();
                }
            }
            Type::Void | Type::Char | Type::Int | Type::Bool => {}
        }
    }
}
