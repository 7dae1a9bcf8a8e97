//! MMIX register conventions used by generated code.

/// Stack pointer (global register).
pub const SP: usize = 254;
/// Frame pointer (global register).
pub const FP: usize = 253;
/// Heap pointer (global register).
pub const HP: usize = 252;
/// Value of `rG`: registers `$251..$255` are global; `$251` holds the
/// data segment base.
pub const GLOBAL_REGS: usize = 251;
/// Assembler-reserved register, also used for the final exit value.
pub const SCRATCH: usize = 255;

/// Fewest registers the colourer can work with: spill repair needs an
/// address, an offset and a value register live at once.
pub const MIN_REGISTERS: usize = 3;

/// Largest immediate offset `STO`/`LDO` can encode.
pub const MAX_IMMEDIATE: i64 = 255;

pub fn reg(n: usize) -> String {
    format!("${n}")
}
