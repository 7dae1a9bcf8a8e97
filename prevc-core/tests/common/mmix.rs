//! Just enough of an MMIX assembler and simulator to run what the emitter
//! produces: the bootstrap, compiled functions, and the runtime library.

use std::collections::{HashMap, VecDeque};

const DATA_SEGMENT: u64 = 0x2000_0000_0000_0000;
const STEP_LIMIT: u64 = 5_000_000;
const LOCAL_REGS: usize = 251;

#[derive(Debug, Clone, Copy)]
enum Sym {
    Reg(usize),
    Value(u64),
    Code(usize),
}

#[derive(Debug, Clone)]
struct Instr {
    op: String,
    args: Vec<String>,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmixRun {
    pub exit: i64,
    pub output: String,
    pub steps: u64,
}

pub struct Mmix {
    code: Vec<Instr>,
    symbols: HashMap<String, Sym>,
    memory: HashMap<u64, u8>,
    regs: Vec<u64>,
    rj: u64,
    rr: u64,
    /// Caller registers hidden by `PUSHJ`.
    stack: Vec<(usize, Vec<u64>)>,
    input: VecDeque<u8>,
    output: Vec<u8>,
}

/// Assemble `text` and run it from `Main`.
pub fn run(text: &str, input: &[u8]) -> Result<MmixRun, String> {
    Mmix::assemble(text)?.with_input(input).run()
}

impl Mmix {
    pub fn assemble(text: &str) -> Result<Mmix, String> {
        let mut m = Mmix {
            code: Vec::new(),
            symbols: HashMap::new(),
            memory: HashMap::new(),
            regs: vec![0; 256],
            rj: 0,
            rr: 0,
            stack: Vec::new(),
            input: VecDeque::new(),
            output: Vec::new(),
        };
        let mut loc = 0u64;
        let mut in_code = false;
        let mut next_greg = 254usize;

        for raw in text.lines() {
            let line = raw.trim_end();
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                continue;
            }
            let (label, rest) = if line.starts_with(char::is_whitespace) {
                (None, trimmed)
            } else {
                match line.split_once(char::is_whitespace) {
                    Some((l, r)) => (Some(l.to_string()), r.trim()),
                    None => (Some(line.to_string()), ""),
                }
            };
            let mut parts = rest.split_whitespace();
            let op = parts.next().unwrap_or("").to_string();
            let args: Vec<String> = match parts.next() {
                Some(a) => a.split(',').map(str::to_string).collect(),
                None => Vec::new(),
            };

            match op.as_str() {
                "GREG" => {
                    let value = m.eval(&args[0], loc)?;
                    m.regs[next_greg] = value;
                    if let Some(l) = label {
                        m.symbols.insert(l, Sym::Reg(next_greg));
                    }
                    next_greg -= 1;
                }
                "LOC" => {
                    if args[0] == "#100" {
                        in_code = true;
                    } else {
                        loc = m.eval(&args[0], loc)?;
                    }
                }
                "IS" => {
                    let value = m.eval(&args[0], loc)?;
                    if let Some(l) = label {
                        m.symbols.insert(l, Sym::Value(value));
                    }
                }
                "BYTE" => {
                    if let Some(l) = label {
                        m.symbols.insert(l, Sym::Value(loc));
                    }
                    for a in &args {
                        let v = m.eval(a, loc)?;
                        m.memory.insert(loc, v as u8);
                        loc += 1;
                    }
                }
                "OCTA" => {
                    loc = (loc + 7) & !7;
                    if let Some(l) = label {
                        m.symbols.insert(l, Sym::Value(loc));
                    }
                    for a in &args {
                        let v = m.eval(a, loc)?;
                        m.store_octa(loc, v);
                        loc += 8;
                    }
                }
                _ => {
                    if !in_code {
                        return Err(format!("instruction before LOC #100: {line}"));
                    }
                    if let Some(l) = label {
                        m.symbols.insert(l, Sym::Code(m.code.len()));
                    }
                    m.code.push(Instr {
                        op,
                        args,
                        text: trimmed.to_string(),
                    });
                }
            }
        }
        Ok(m)
    }

    pub fn with_input(mut self, input: &[u8]) -> Self {
        self.input = input.iter().copied().collect();
        self
    }

    pub fn run(mut self) -> Result<MmixRun, String> {
        let mut pc = self.code_label("Main")?;
        let mut steps = 0u64;
        loop {
            steps += 1;
            if steps > STEP_LIMIT {
                return Err(format!("step limit exceeded at {pc}"));
            }
            let instr = self
                .code
                .get(pc)
                .cloned()
                .ok_or_else(|| format!("fell off the code at {pc}"))?;
            let next = pc + 1;
            pc = match self.step(&instr, next) {
                Ok(Some(target)) => target,
                Ok(None) => {
                    return Ok(MmixRun {
                        exit: self.regs[255] as i64,
                        output: String::from_utf8_lossy(&self.output).into_owned(),
                        steps,
                    })
                }
                Err(e) => return Err(format!("{e} in `{}`", instr.text)),
            };
        }
    }

    /// Execute one instruction; `None` means the machine halted.
    fn step(&mut self, instr: &Instr, next: usize) -> Result<Option<usize>, String> {
        let a = &instr.args;
        let arg = |i: usize| -> Result<&str, String> {
            a.get(i).map(String::as_str).ok_or_else(|| "missing operand".to_string())
        };
        match instr.op.as_str() {
            "SETL" => {
                let v = self.value(arg(1)?)? & 0xffff;
                self.set(arg(0)?, v)?;
            }
            "INCML" | "INCMH" | "INCH" => {
                let shift = match instr.op.as_str() {
                    "INCML" => 16,
                    "INCMH" => 32,
                    _ => 48,
                };
                let x = self.value(arg(0)?)?;
                let v = (self.value(arg(1)?)? & 0xffff) << shift;
                self.set(arg(0)?, x.wrapping_add(v))?;
            }
            "NEG" => {
                let (y, z) = if a.len() == 3 {
                    (self.value(arg(1)?)?, self.value(arg(2)?)?)
                } else {
                    (0, self.value(arg(1)?)?)
                };
                self.set(arg(0)?, y.wrapping_sub(z))?;
            }
            "ADD" | "SUB" | "MUL" | "AND" | "OR" | "XOR" | "DIV" | "CMP" => {
                let y = self.value(arg(1)?)? as i64;
                let z = self.value(arg(2)?)? as i64;
                let v = match instr.op.as_str() {
                    "ADD" => y.wrapping_add(z),
                    "SUB" => y.wrapping_sub(z),
                    "MUL" => y.wrapping_mul(z),
                    "AND" => y & z,
                    "OR" => y | z,
                    "XOR" => y ^ z,
                    "CMP" => (y > z) as i64 - (y < z) as i64,
                    _ => {
                        let (q, r) = floor_div(y, z);
                        self.rr = r as u64;
                        q
                    }
                };
                self.set(arg(0)?, v as u64)?;
            }
            "ZSZ" | "ZSNZ" | "ZSN" | "ZSP" | "ZSNP" | "ZSNN" => {
                let y = self.value(arg(1)?)? as i64;
                let z = self.value(arg(2)?)?;
                let hit = match instr.op.as_str() {
                    "ZSZ" => y == 0,
                    "ZSNZ" => y != 0,
                    "ZSN" => y < 0,
                    "ZSP" => y > 0,
                    "ZSNP" => y <= 0,
                    _ => y >= 0,
                };
                self.set(arg(0)?, if hit { z } else { 0 })?;
            }
            "SET" => {
                let v = self.value(arg(1)?)?;
                self.set(arg(0)?, v)?;
            }
            "LDA" => {
                let v = if a.len() == 2 {
                    self.value(arg(1)?)?
                } else {
                    self.value(arg(1)?)?.wrapping_add(self.value(arg(2)?)?)
                };
                self.set(arg(0)?, v)?;
            }
            "LDO" | "LDB" => {
                let addr = self.value(arg(1)?)?.wrapping_add(self.value(arg(2)?)?);
                let v = if instr.op == "LDO" {
                    self.load_octa(addr)
                } else {
                    self.load_byte(addr) as i8 as i64 as u64
                };
                self.set(arg(0)?, v)?;
            }
            "STO" | "STB" => {
                let v = self.value(arg(0)?)?;
                let addr = self.value(arg(1)?)?.wrapping_add(self.value(arg(2)?)?);
                if instr.op == "STO" {
                    self.store_octa(addr, v);
                } else {
                    self.memory.insert(addr, v as u8);
                }
            }
            "GET" => {
                let v = match arg(1)? {
                    "rJ" => self.rj,
                    "rR" => self.rr,
                    other => return Err(format!("GET from {other}")),
                };
                self.set(arg(0)?, v)?;
            }
            "PUT" => match arg(0)? {
                "rJ" => self.rj = self.value(arg(1)?)?,
                "rG" => {}
                other => return Err(format!("PUT into {other}")),
            },
            "BZ" | "BNZ" => {
                let x = self.value(arg(0)?)?;
                if (x == 0) == (instr.op == "BZ") {
                    return Ok(Some(self.code_label(arg(1)?)?));
                }
            }
            "JMP" => return Ok(Some(self.code_label(arg(0)?)?)),
            "PUSHJ" => {
                let x = self.reg(arg(0)?)?;
                let target = self.code_label(arg(1)?)?;
                self.stack.push((x, self.regs[..x].to_vec()));
                self.regs[..LOCAL_REGS].fill(0);
                self.rj = next as u64;
                return Ok(Some(target));
            }
            "POP" => {
                let (x, saved) = self.stack.pop().ok_or("POP without PUSHJ")?;
                self.regs[..LOCAL_REGS].fill(0);
                self.regs[..x].copy_from_slice(&saved);
                return Ok(Some(self.rj as usize));
            }
            "TRAP" => match arg(1)? {
                "Halt" => return Ok(None),
                "Fputs" => {
                    let mut addr = self.regs[255];
                    loop {
                        let b = self.load_byte(addr);
                        if b == 0 {
                            break;
                        }
                        self.output.push(b);
                        addr += 1;
                    }
                    self.regs[255] = 0;
                }
                "Fgets" => {
                    let args = self.regs[255];
                    let buf = self.load_octa(args);
                    let size = self.load_octa(args + 8);
                    let mut n = 0;
                    while n + 1 < size {
                        let Some(b) = self.input.pop_front() else {
                            break;
                        };
                        self.memory.insert(buf + n, b);
                        n += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                    if n == 0 {
                        self.regs[255] = u64::MAX;
                    } else {
                        self.memory.insert(buf + n, 0);
                        self.regs[255] = n;
                    }
                }
                other => return Err(format!("unknown trap {other}")),
            },
            other => return Err(format!("unknown instruction {other}")),
        }
        Ok(Some(next))
    }

    fn code_label(&self, name: &str) -> Result<usize, String> {
        match self.symbols.get(name) {
            Some(Sym::Code(i)) => Ok(*i),
            _ => Err(format!("no code label {name}")),
        }
    }

    fn reg(&self, operand: &str) -> Result<usize, String> {
        if let Some(n) = operand.strip_prefix('$') {
            return n.parse().map_err(|_| format!("bad register {operand}"));
        }
        match self.symbols.get(operand) {
            Some(Sym::Reg(r)) => Ok(*r),
            _ => Err(format!("{operand} is not a register")),
        }
    }

    fn set(&mut self, operand: &str, v: u64) -> Result<(), String> {
        let r = self.reg(operand)?;
        self.regs[r] = v;
        Ok(())
    }

    /// A register's contents or an immediate.
    fn value(&self, operand: &str) -> Result<u64, String> {
        if let Ok(r) = self.reg(operand) {
            return Ok(self.regs[r]);
        }
        self.eval(operand, 0)
    }

    fn eval(&self, expr: &str, loc: u64) -> Result<u64, String> {
        let mut total = 0u64;
        for term in expr.split('+') {
            let v = if term == "@" {
                loc
            } else if term == "Data_Segment" {
                DATA_SEGMENT
            } else if let Some(hex) = term.strip_prefix('#') {
                u64::from_str_radix(hex, 16).map_err(|_| format!("bad number {term}"))?
            } else if let Ok(n) = term.parse::<i64>() {
                n as u64
            } else {
                match self.symbols.get(term) {
                    Some(Sym::Value(v)) => *v,
                    Some(Sym::Code(i)) => *i as u64,
                    _ => return Err(format!("unknown symbol {term}")),
                }
            };
            total = total.wrapping_add(v);
        }
        Ok(total)
    }

    fn load_byte(&self, addr: u64) -> u8 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }

    fn load_octa(&self, addr: u64) -> u64 {
        let base = addr & !7;
        (0..8).fold(0, |acc, i| (acc << 8) | self.load_byte(base + i) as u64)
    }

    fn store_octa(&mut self, addr: u64, v: u64) {
        let base = addr & !7;
        for (i, b) in v.to_be_bytes().into_iter().enumerate() {
            self.memory.insert(base + i as u64, b);
        }
    }
}

fn floor_div(y: i64, z: i64) -> (i64, i64) {
    if z == 0 {
        return (0, y);
    }
    let (q, r) = (y.wrapping_div(z), y.wrapping_rem(z));
    if r != 0 && ((r < 0) != (z < 0)) {
        (q - 1, r + z)
    } else {
        (q, r)
    }
}
