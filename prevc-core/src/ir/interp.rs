//! Interpreter for linearized intermediate code.
//!
//! Runs code chunks directly against an octa-addressed memory so that the
//! front half of the pipeline can be checked without a target machine.

use super::chunk::CodeChunk;
use super::tree::{BinOp, Expr, Label, Stmt, Temp, UnOp};
use super::ProgramIR;
use crate::ast::WORD_SIZE;
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::rc::Rc;
use thiserror::Error;

pub const DATA_START: i64 = 0x2000_0000_0000_0000;
pub const HEAP_START: i64 = 0x3000_0000_0000_0000;
pub const STACK_START: i64 = 0x6000_0000_0000_0000;

/// Statements executed before a run is abandoned.
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Activations that may be live at once.
pub const DEFAULT_CALL_DEPTH: usize = 100_000;

#[derive(Error, Debug)]
pub enum InterpError {
    #[error("no code chunk for entry function {0}")]
    MissingEntry(String),

    #[error("call to unknown function {0}")]
    UnknownFunction(String),

    #[error("jump to unknown label {label} in {function}")]
    UnknownLabel { label: String, function: String },

    #[error("read of undefined temp {temp} in {function}")]
    UndefinedTemp { temp: Temp, function: String },

    #[error("address of unknown label {0}")]
    UnknownData(String),

    #[error("non-linear code in {function}: {message}")]
    Malformed { function: String, message: String },

    #[error("step limit of {0} exceeded")]
    StepLimit(u64),

    #[error("call depth of {0} exceeded")]
    CallDepth(usize),

    #[error("reading program input: {0}")]
    Input(#[from] std::io::Error),
}

/// Outcome of running a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub exit: i64,
    pub output: Vec<u8>,
}

impl RunResult {
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Run `_main` of a linearized program with the given standard input.
pub fn run(ir: &ProgramIR, input: &[u8]) -> Result<RunResult, InterpError> {
    Interpreter::new(ir, input).run("_main")
}

/// Like [`run`], reading the whole standard input from `reader` first.
pub fn run_with_reader(ir: &ProgramIR, mut reader: impl Read) -> Result<RunResult, InterpError> {
    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;
    run(ir, &input)
}

pub struct Interpreter<'a> {
    ir: &'a ProgramIR,
    chunks: HashMap<Label, (&'a CodeChunk, Rc<HashMap<Label, usize>>)>,
    data: HashMap<Label, i64>,
    memory: HashMap<i64, i64>,
    sp: i64,
    hp: i64,
    input: VecDeque<u8>,
    output: Vec<u8>,
    steps: u64,
    step_limit: u64,
    call_depth: usize,
}

/// One running function. Activations live on an explicit stack so that
/// recursion in the interpreted program never recurses in the host.
struct Activation<'a> {
    chunk: &'a CodeChunk,
    labels: Rc<HashMap<Label, usize>>,
    temps: HashMap<Temp, i64>,
    pc: usize,
    /// SP of the caller, restored on return.
    saved_sp: i64,
    /// Result of the call made by the statement at `pc`, once it returned.
    returned: Option<i64>,
}

/// What the statement at `pc` asks the driver loop to do next.
enum Step {
    Next,
    Goto(Label),
    Call(Label),
}

impl<'a> Interpreter<'a> {
    pub fn new(ir: &'a ProgramIR, input: &[u8]) -> Self {
        let mut chunks = HashMap::new();
        for chunk in &ir.chunks.code {
            let labels: HashMap<Label, usize> = chunk
                .stmts
                .iter()
                .enumerate()
                .filter_map(|(i, s)| match s {
                    Stmt::Label(l) => Some((*l, i)),
                    _ => None,
                })
                .collect();
            chunks.insert(chunk.frame.label, (chunk, Rc::new(labels)));
        }

        let mut interp = Self {
            ir,
            chunks,
            data: HashMap::new(),
            memory: HashMap::new(),
            sp: STACK_START,
            hp: HEAP_START,
            input: input.iter().copied().collect(),
            output: Vec::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            call_depth: DEFAULT_CALL_DEPTH,
        };
        interp.place_data();
        interp
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn with_call_depth(mut self, depth: usize) -> Self {
        self.call_depth = depth;
        self
    }

    fn place_data(&mut self) {
        let mut addr = DATA_START;
        for d in &self.ir.chunks.data {
            self.data.insert(d.label, addr);
            if let Some(text) = &d.init {
                for (i, b) in text.bytes().enumerate() {
                    self.memory.insert(addr + i as i64 * WORD_SIZE, b as i64);
                }
            }
            addr += d.size;
        }
    }

    pub fn run(mut self, entry: &str) -> Result<RunResult, InterpError> {
        let label = self
            .ir
            .names
            .lookup(entry)
            .filter(|l| self.chunks.contains_key(l))
            .ok_or_else(|| InterpError::MissingEntry(entry.to_string()))?;
        self.store(self.sp, 0);
        let exit = self.execute(label)?;
        debug!("interp: {} returned {} after {} steps", entry, exit, self.steps);
        Ok(RunResult {
            exit,
            output: self.output,
        })
    }

    fn load(&self, addr: i64) -> i64 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }

    fn store(&mut self, addr: i64, value: i64) {
        self.memory.insert(addr, value);
    }

    /// Enter a code chunk whose arguments are already stored at `SP + offset`.
    fn enter(&mut self, label: Label) -> Option<Activation<'a>> {
        let (chunk, labels) = self.chunks.get(&label).map(|(c, l)| (*c, Rc::clone(l)))?;
        let fp = self.sp;
        let saved_sp = self.sp;
        self.sp = fp - chunk.frame.size;
        trace!("interp: enter {} fp={:#x}", chunk.name, fp);
        Some(Activation {
            chunk,
            labels,
            temps: HashMap::from([(chunk.frame.fp, fp)]),
            pc: 0,
            saved_sp,
            returned: None,
        })
    }

    /// Run `entry` to completion, driving every nested call from one loop.
    fn execute(&mut self, entry: Label) -> Result<i64, InterpError> {
        let Some(first) = self.enter(entry) else {
            return self.builtin(entry);
        };
        let mut stack = vec![first];

        loop {
            let Some(act) = stack.last_mut() else {
                return Err(InterpError::MissingEntry(self.ir.names.label_name(entry)));
            };
            let chunk = act.chunk;
            let Some(stmt) = chunk.stmts.get(act.pc) else {
                return Err(self.malformed(chunk, "fell off the end of the chunk"));
            };
            if act.returned.is_none() {
                self.steps += 1;
                if self.steps > self.step_limit {
                    return Err(InterpError::StepLimit(self.step_limit));
                }
            }

            let target = match self.step(stmt, act)? {
                Step::Next => None,
                Step::Goto(l) => Some(l),
                Step::Call(label) => {
                    match self.enter(label) {
                        Some(callee) => {
                            if stack.len() >= self.call_depth {
                                return Err(InterpError::CallDepth(self.call_depth));
                            }
                            stack.push(callee);
                        }
                        None => {
                            let result = self.builtin(label)?;
                            self.store(self.sp, result);
                            act.returned = Some(result);
                        }
                    }
                    continue;
                }
            };

            match target {
                Some(l) if l == chunk.exit => {
                    let result = self.temp(chunk.frame.rv, act)?;
                    self.sp = act.saved_sp;
                    stack.pop();
                    match stack.last_mut() {
                        Some(caller) => {
                            self.store(self.sp, result);
                            caller.returned = Some(result);
                        }
                        None => return Ok(result),
                    }
                }
                Some(l) => match act.labels.get(&l) {
                    Some(&i) => act.pc = i,
                    None => {
                        return Err(InterpError::UnknownLabel {
                            label: self.ir.names.label_name(l),
                            function: chunk.name.clone(),
                        })
                    }
                },
                None => act.pc += 1,
            }
        }
    }

    /// Execute one statement. A statement holding a call first stores the
    /// arguments and hands the call to the driver; once the callee returned
    /// it runs again with the result in place of the call.
    fn step(&mut self, stmt: &Stmt, act: &mut Activation<'a>) -> Result<Step, InterpError> {
        if act.returned.is_none() {
            if let Some((label, offsets, args)) = pending_call(stmt) {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a, act)?);
                }
                for (off, v) in offsets.iter().zip(values) {
                    self.store(self.sp + off, v);
                }
                return Ok(Step::Call(label));
            }
        }

        let step = match stmt {
            Stmt::Label(_) => Step::Next,
            Stmt::Jump(l) => Step::Goto(*l),
            Stmt::CJump { cond, pos, neg } => {
                if self.eval(cond, act)? != 0 {
                    Step::Goto(*pos)
                } else {
                    Step::Goto(*neg)
                }
            }
            Stmt::Expr(e) => {
                self.eval(e, act)?;
                Step::Next
            }
            Stmt::Move { dst, src } => {
                self.exec_move(dst, src, act)?;
                Step::Next
            }
            Stmt::Seq(_) => return Err(self.malformed(act.chunk, "nested statement sequence")),
        };
        if act.returned.take().is_some() {
            trace!("interp: resumed {} at {}", act.chunk.name, act.pc);
        }
        Ok(step)
    }

    fn builtin(&mut self, label: Label) -> Result<i64, InterpError> {
        let name = self.ir.names.label_name(label);
        let arg = self.load(self.sp + WORD_SIZE);
        match name.as_str() {
            "_new" => {
                let block = self.hp;
                self.hp += arg;
                Ok(block)
            }
            "_del" => Ok(0),
            "_putc" => {
                self.output.push(arg as u8);
                Ok(0)
            }
            "_getc" => Ok(self.input.pop_front().map_or(0, |b| b as i64)),
            _ => Err(InterpError::UnknownFunction(name)),
        }
    }

    fn exec_move(
        &mut self,
        dst: &Expr,
        src: &Expr,
        act: &mut Activation<'a>,
    ) -> Result<(), InterpError> {
        let value = self.eval(src, act)?;
        match dst {
            Expr::Temp(t) => {
                act.temps.insert(*t, value);
                Ok(())
            }
            Expr::Mem(addr) => {
                let addr = self.eval(addr, act)?;
                self.store(addr, value);
                Ok(())
            }
            _ => Err(self.malformed(act.chunk, "move into a non-location")),
        }
    }

    fn temp(&self, t: Temp, act: &Activation<'a>) -> Result<i64, InterpError> {
        act.temps
            .get(&t)
            .copied()
            .ok_or_else(|| InterpError::UndefinedTemp {
                temp: t,
                function: act.chunk.name.clone(),
            })
    }

    fn eval(&mut self, e: &Expr, act: &mut Activation<'a>) -> Result<i64, InterpError> {
        Ok(match e {
            Expr::Const(v) => *v,
            Expr::Name(l) => *self
                .data
                .get(l)
                .ok_or_else(|| InterpError::UnknownData(self.ir.names.label_name(*l)))?,
            Expr::Temp(t) => self.temp(*t, act)?,
            Expr::Mem(addr) => {
                let addr = self.eval(addr, act)?;
                self.load(addr)
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs, act)?;
                let r = self.eval(rhs, act)?;
                binop(*op, l, r)
            }
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, act)?;
                match op {
                    UnOp::Neg => v.wrapping_neg(),
                    UnOp::Not => v ^ 1,
                }
            }
            // Only reached after the driver ran the callee.
            Expr::Call { .. } => match act.returned {
                Some(v) => v,
                None => return Err(self.malformed(act.chunk, "more than one call in a statement")),
            },
            Expr::SExpr(..) => return Err(self.malformed(act.chunk, "statement inside an expression")),
        })
    }

    fn malformed(&self, chunk: &CodeChunk, message: &str) -> InterpError {
        InterpError::Malformed {
            function: chunk.name.clone(),
            message: message.to_string(),
        }
    }
}

/// The call a linear statement makes, if any. Canonical statements hold at
/// most one, since call arguments and binary operands are temps.
fn pending_call(stmt: &Stmt) -> Option<(Label, &[i64], &[Expr])> {
    fn find(e: &Expr) -> Option<(Label, &[i64], &[Expr])> {
        match e {
            Expr::Call {
                label,
                offsets,
                args,
            } => Some((*label, offsets.as_slice(), args.as_slice())),
            Expr::Mem(inner) | Expr::Unary { expr: inner, .. } => find(inner),
            Expr::Binary { lhs, rhs, .. } => find(lhs).or_else(|| find(rhs)),
            Expr::Const(_) | Expr::Name(_) | Expr::Temp(_) | Expr::SExpr(..) => None,
        }
    }
    match stmt {
        Stmt::CJump { cond, .. } => find(cond),
        Stmt::Expr(e) => find(e),
        Stmt::Move { dst, src } => find(src).or_else(|| find(dst)),
        Stmt::Label(_) | Stmt::Jump(_) | Stmt::Seq(_) => None,
    }
}

/// MMIX integer semantics: wrapping arithmetic, floored division, and
/// division by zero giving quotient 0 with the dividend as remainder.
pub fn binop(op: BinOp, l: i64, r: i64) -> i64 {
    match op {
        BinOp::Or => l | r,
        BinOp::And => l & r,
        BinOp::Eq => (l == r) as i64,
        BinOp::Ne => (l != r) as i64,
        BinOp::Lt => (l < r) as i64,
        BinOp::Gt => (l > r) as i64,
        BinOp::Le => (l <= r) as i64,
        BinOp::Ge => (l >= r) as i64,
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div => floor_div(l, r).0,
        BinOp::Mod => floor_div(l, r).1,
    }
}

pub fn floor_div(y: i64, z: i64) -> (i64, i64) {
    if z == 0 {
        return (0, y);
    }
    let q = y.wrapping_div(z);
    let r = y.wrapping_rem(z);
    if r != 0 && ((r < 0) != (z < 0)) {
        (q - 1, r + z)
    } else {
        (q, r)
    }
}
