use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use prevc_core::ast::{Decl, ExprKind, FunDecl, Program};
use prevc_core::backend::{self, trace::FunctionTrace};
use prevc_core::ir::{interp, ProgramIR};
use prevc_core::{compile_to_ir, CompileOptions, DEFAULT_REGISTERS};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "prevc")]
#[command(about = "Back end of the PREV compiler: typed syntax trees to MMIX assembly")]
struct Args {
    /// Typed program as JSON
    input: PathBuf,

    /// Assembly output (defaults to the input path with an .mms extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of registers available to the allocator
    #[arg(long, default_value_t = DEFAULT_REGISTERS)]
    nregs: usize,

    /// Last phase to run
    #[arg(long, value_enum, default_value_t = Phase::All)]
    target_phase: Phase,

    /// Write a JSON trace of the back end phases to this file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Interpret the linearized intermediate code, feeding it standard input,
    /// and print its exit value
    #[arg(long)]
    run: bool,

    /// Log stage progress
    #[arg(long)]
    debug: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Phase {
    Imcgen,
    Imclin,
    Asmgen,
    Livean,
    Regall,
    All,
}

fn main() {
    let args = Args::parse();

    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let src = fs::read_to_string(&args.input)
        .with_context(|| format!("reading '{}'", args.input.display()))?;
    let program: Program = serde_json::from_str(&src)
        .with_context(|| format!("parsing typed program '{}'", args.input.display()))?;
    let options = CompileOptions {
        registers: args.nregs,
    };

    let mut ir = compile_to_ir(&program)?;

    if args.target_phase == Phase::Imcgen {
        for line in imcgen_lines(&program, &ir) {
            println!("{line}");
        }
        return Ok(());
    }

    if args.run {
        let result = interp::run_with_reader(&ir, io::stdin().lock())
            .context("interpreting intermediate code")?;
        print!("{}", result.output_string());
        println!("exit: {}", result.exit);
    }

    if args.target_phase == Phase::Imclin {
        for line in ir.to_lines() {
            println!("{line}");
        }
        return Ok(());
    }

    let codes = backend::select_instructions(&mut ir, &options)?;
    match args.target_phase {
        Phase::Asmgen | Phase::Livean => {
            let lives = if args.target_phase == Phase::Livean {
                backend::analyze_liveness(&codes)
            } else {
                Vec::new()
            };
            let traces: Vec<FunctionTrace> = codes
                .iter()
                .enumerate()
                .map(|(i, code)| FunctionTrace::from_code(code, lives.get(i), &ir.names))
                .collect();
            for code in &codes {
                println!("{}:", code.name);
                for line in code.to_lines(&ir.names) {
                    println!("{line}");
                }
            }
            return write_trace(args.trace.as_deref(), &traces);
        }
        _ => {}
    }

    let allocations = backend::allocate_registers(&mut ir, codes, &options)?;
    let traces: Vec<FunctionTrace> = allocations
        .iter()
        .map(|a| FunctionTrace::from_allocation(a, &ir.names))
        .collect();
    write_trace(args.trace.as_deref(), &traces)?;
    if args.target_phase == Phase::Regall {
        for t in &traces {
            println!("{}:", t.name);
            for i in &t.instructions {
                println!("        {}", i.code);
            }
        }
        return Ok(());
    }

    let asm = backend::emit_program(&ir, &allocations, &options)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("mms"));
    fs::write(&output, asm.join())
        .with_context(|| format!("writing '{}'", output.display()))?;
    info!("wrote {}", output.display());
    Ok(())
}

fn write_trace(path: Option<&Path>, traces: &[FunctionTrace]) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(traces)?;
    fs::write(path, json).with_context(|| format!("writing trace '{}'", path.display()))
}

/// Function bodies as translated, before canonicalization.
fn imcgen_lines(program: &Program, ir: &ProgramIR) -> Vec<String> {
    let mut funs: Vec<&FunDecl> = Vec::new();
    for d in &program.decls {
        if let Decl::Fun(f) = d {
            funs.push(f);
            if let Some(body) = &f.body {
                body.walk(true, &mut |e| {
                    if let ExprKind::Where { decls, .. } = &e.kind {
                        funs.extend(decls.iter().filter_map(|d| match d {
                            Decl::Fun(f) => Some(f),
                            Decl::Var(_) => None,
                        }));
                    }
                });
            }
        }
    }

    let mut lines = Vec::new();
    for f in funs {
        let Some(body) = &f.body else { continue };
        lines.push(format!("{}:", f.name));
        match ir.imc.exprs.get(&body.id) {
            Some(e) => lines.push(format!("  {}", e.render(&ir.names))),
            None => lines.push("  <not translated>".to_string()),
        }
    }
    lines
}

