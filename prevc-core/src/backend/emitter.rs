//! Final assembly: bootstrap, data segment, functions with prologue and
//! epilogue, and the runtime library.

use super::abi::{reg, FP, GLOBAL_REGS, HP, SCRATCH, SP};
use super::instruction::{AsmInstr, AsmItem};
use super::regalloc::Allocation;
use crate::ast::WORD_SIZE;
use crate::ir::{DataChunk, Names};
use crate::CompileError;
use log::debug;

// ============================================================================
// Output type
// ============================================================================

/// Finished MMIX assembly, one source line per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmixAsm {
    pub lines: Vec<String>,
}

impl MmixAsm {
    pub fn join(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

// ============================================================================
// Emitter
// ============================================================================

pub struct Emitter<'a> {
    names: &'a Names,
    registers: usize,
    out: Vec<AsmItem>,
}

/// Emit a whole program. `functions` must contain `_main`.
pub fn emit(
    names: &Names,
    data: &[DataChunk],
    functions: &[Allocation],
    registers: usize,
) -> Result<MmixAsm, CompileError> {
    let main = names.lookup("_main");
    if !functions
        .iter()
        .any(|f| Some(f.code.frame.label) == main)
    {
        return Err(CompileError::MissingEntry(
            "program has no _main function".to_string(),
        ));
    }

    let mut e = Emitter {
        names,
        registers,
        out: Vec::new(),
    };
    e.bootstrap(data);
    for f in functions {
        let item = e.function(f)?;
        e.out.push(item);
    }
    e.runtime();
    let lines = flatten(&e.out);
    debug!(
        "emit: {} functions, {} data chunks, {} lines",
        functions.len(),
        data.len(),
        lines.len()
    );
    Ok(MmixAsm { lines })
}

impl Emitter<'_> {
    fn push(&mut self, item: AsmItem) {
        self.out.push(item);
    }

    fn bootstrap(&mut self, data: &[DataChunk]) {
        self.push(AsmItem::Comment("Global registers".into()));
        self.push(AsmItem::labelled("SP", "GREG", "#6000000000000000"));
        self.push(AsmItem::labelled("FP", "GREG", "#0"));
        self.push(AsmItem::labelled("HP", "GREG", "#3000000000000000"));
        self.push(AsmItem::Blank);
        self.push(AsmItem::line("LOC", "Data_Segment"));
        self.push(AsmItem::line("GREG", "@"));
        self.push(AsmItem::Blank);

        self.push(AsmItem::Comment("I/O buffers".into()));
        self.push(AsmItem::labelled("OutBuf", "BYTE", "0"));
        self.push(AsmItem::line("BYTE", "0"));
        self.push(AsmItem::labelled("InSize", "IS", "100"));
        self.push(AsmItem::labelled("InBuf", "OCTA", "0"));
        self.push(AsmItem::line("LOC", "InBuf+InSize"));
        self.push(AsmItem::labelled("InArgs", "OCTA", "InBuf,InSize"));
        self.push(AsmItem::Blank);

        self.push(AsmItem::Comment("Global variables and string literals".into()));
        for d in data {
            let label = self.names.label_name(d.label);
            match &d.init {
                Some(text) => {
                    let mut octas: Vec<String> = text.bytes().map(|b| b.to_string()).collect();
                    octas.push("0".into());
                    self.push(AsmItem::labelled(label, "OCTA", octas.join(",")));
                }
                None => {
                    self.push(AsmItem::labelled(label, "OCTA", "0"));
                    if d.size > WORD_SIZE {
                        self.push(AsmItem::line("LOC", format!("@+{}", d.size - WORD_SIZE)));
                    }
                }
            }
        }
        self.push(AsmItem::Blank);

        self.push(AsmItem::line("LOC", "#100"));
        self.push(AsmItem::Comment("Bootstrap".into()));
        self.push(AsmItem::labelled("Main", "PUT", format!("rG,{GLOBAL_REGS}")));
        self.push(AsmItem::line("PUSHJ", format!("${},_main", self.registers)));
        self.push(AsmItem::line("LDO", format!("{},{},0", reg(SCRATCH), reg(SP))));
        self.push(AsmItem::line("TRAP", "0,Halt,0"));
    }

    /// Put `value` into `$0`, optionally labelling the first instruction.
    fn load_value(items: &mut Vec<AsmItem>, label: Option<String>, value: i64) {
        let magnitude = value.unsigned_abs();
        let first = format!("$0,{}", magnitude & 0xffff);
        items.push(match label {
            Some(l) => AsmItem::labelled(l, "SETL", first),
            None => AsmItem::line("SETL", first),
        });
        for (shift, op) in [(16, "INCML"), (32, "INCMH"), (48, "INCH")] {
            let part = (magnitude >> shift) & 0xffff;
            if part != 0 {
                items.push(AsmItem::line(op, format!("$0,{part}")));
            }
        }
        if value < 0 {
            items.push(AsmItem::line("NEG", "$0,0,$0"));
        }
    }

    fn function(&self, f: &Allocation) -> Result<AsmItem, CompileError> {
        let code = &f.code;
        let frame = &code.frame;
        let fp = reg(FP);
        let sp = reg(SP);

        let mut prologue = Vec::new();
        Self::load_value(
            &mut prologue,
            Some(self.names.label_name(frame.label)),
            -frame.locs_size - WORD_SIZE,
        );
        prologue.push(AsmItem::line("ADD", format!("$0,{sp},$0")));
        prologue.push(AsmItem::line("STO", format!("{fp},$0,0")));
        prologue.push(AsmItem::line("SUB", "$0,$0,8"));
        prologue.push(AsmItem::line("GET", "$1,rJ"));
        prologue.push(AsmItem::line("STO", "$1,$0,0"));
        prologue.push(AsmItem::line("SET", format!("{fp},{sp}")));
        Self::load_value(&mut prologue, None, frame.size + code.temp_size);
        prologue.push(AsmItem::line("SUB", format!("{sp},{sp},$0")));
        prologue.push(AsmItem::line("JMP", self.names.label_name(code.entry)));

        let mut body = Vec::new();
        let mut pending: Option<String> = None;
        for instr in &code.instrs {
            if let AsmInstr::Label(l) = instr {
                if let Some(prev) = pending.take() {
                    body.push(AsmItem::labelled(prev, "SET", "$0,$0"));
                }
                pending = Some(self.names.label_name(*l));
                continue;
            }
            let text = self.render(f, instr)?;
            let (op, args) = text.split_once(' ').unwrap_or((text.as_str(), ""));
            body.push(AsmItem::Line {
                label: pending.take(),
                op: op.to_string(),
                args: args.to_string(),
            });
        }
        if let Some(prev) = pending {
            body.push(AsmItem::labelled(prev, "SET", "$0,$0"));
        }

        let mut epilogue = Vec::new();
        let exit = self.names.label_name(code.exit);
        match (f.reg(frame.rv), code.spill_slots.get(&frame.rv)) {
            (Some(rv), _) => {
                epilogue.push(AsmItem::labelled(exit, "STO", format!("{},{fp},0", reg(rv))));
            }
            (None, Some(&slot)) => {
                Self::load_value(&mut epilogue, Some(exit), slot);
                epilogue.push(AsmItem::line("LDO", format!("$0,{fp},$0")));
                epilogue.push(AsmItem::line("STO", format!("$0,{fp},0")));
            }
            (None, None) => {
                return Err(CompileError::internal(
                    code.location,
                    format!("return value of {} has neither register nor slot", code.name),
                ))
            }
        }
        Self::load_value(&mut epilogue, None, -frame.locs_size - 2 * WORD_SIZE);
        epilogue.push(AsmItem::line("LDO", format!("$0,{fp},$0")));
        epilogue.push(AsmItem::line("PUT", "rJ,$0"));
        epilogue.push(AsmItem::line("SET", format!("{sp},{fp}")));
        Self::load_value(&mut epilogue, None, -frame.locs_size - WORD_SIZE);
        epilogue.push(AsmItem::line("LDO", format!("{fp},{fp},$0")));
        epilogue.push(AsmItem::line("POP", "0,0"));

        Ok(AsmItem::Function {
            name: code.name.clone(),
            prologue,
            body,
            epilogue,
        })
    }

    fn render(&self, f: &Allocation, instr: &AsmInstr) -> Result<String, CompileError> {
        if let Some(t) = instr
            .uses()
            .iter()
            .chain(instr.defs())
            .find(|t| !f.regs.contains_key(t))
        {
            return Err(CompileError::internal(
                f.code.location,
                format!("{} has no register in {}", t, f.code.name),
            ));
        }
        Ok(instr.render(self.names, &|t| reg(f.regs[&t])))
    }

    fn runtime(&mut self) {
        let sp = reg(SP);
        let hp = reg(HP);
        let scratch = reg(SCRATCH);
        self.push(AsmItem::Blank);
        self.push(AsmItem::Comment("Runtime".into()));
        self.push(AsmItem::labelled("_new", "LDO", format!("$0,{sp},8")));
        self.push(AsmItem::line("STO", format!("{hp},{sp},0")));
        self.push(AsmItem::line("ADD", format!("{hp},{hp},$0")));
        self.push(AsmItem::line("POP", "0,0"));

        self.push(AsmItem::labelled("_del", "POP", "0,0"));

        self.push(AsmItem::labelled("_putc", "LDA", format!("{scratch},OutBuf")));
        self.push(AsmItem::line("LDO", format!("$0,{sp},8")));
        self.push(AsmItem::line("STB", format!("$0,{scratch},0")));
        self.push(AsmItem::line("TRAP", "0,Fputs,StdOut"));
        self.push(AsmItem::line("POP", "0,0"));

        self.push(AsmItem::labelled("_getc", "LDA", "$0,InBuf"));
        self.push(AsmItem::line("SET", "$1,0"));
        self.push(AsmItem::line("STO", "$1,$0,0"));
        self.push(AsmItem::line("LDA", format!("{scratch},InArgs")));
        self.push(AsmItem::line("TRAP", "0,Fgets,StdIn"));
        self.push(AsmItem::line("LDB", "$1,$0,0"));
        self.push(AsmItem::line("STO", format!("$1,{sp},0")));
        self.push(AsmItem::line("POP", "0,0"));
    }
}

fn flatten(items: &[AsmItem]) -> Vec<String> {
    let mut lines = Vec::new();
    flatten_items(items, &mut lines);
    lines
}

fn flatten_items(items: &[AsmItem], lines: &mut Vec<String>) {
    for item in items {
        match item {
            AsmItem::Line { label, op, args } => {
                let label = label.as_deref().unwrap_or("");
                let line = format!("{label:<11} {op:<6} {args}");
                lines.push(line.trim_end().to_string());
            }
            AsmItem::Function {
                name,
                prologue,
                body,
                epilogue,
            } => {
                lines.push(String::new());
                lines.push(format!("% function {name}"));
                flatten_items(prologue, lines);
                flatten_items(body, lines);
                flatten_items(epilogue, lines);
            }
            AsmItem::Comment(text) => lines.push(format!("% {text}")),
            AsmItem::Blank => lines.push(String::new()),
        }
    }
}
