//! The 32-bit x86 (AT&T syntax) backend.
//!
//! The hard part of this compiler lives here: a symbolic-stack code
//! generator that fuses register allocation into code generation (there is
//! no separate register allocator, just a stack-following scheme — see
//! [`crate::back::codegen::Environment`]).  This module only defines the
//! things the generator emits: operand locations, instructions, and the
//! printer that turns them into AT&T-syntax text.  The generator itself —
//! the environment and the per-opcode emitter — lives in `codegen.rs`.
//!
//! # Design decisions
//!
//! We target the small ABI the runtime this program links against expects,
//! restricted to what a program built only from
//! `READ`/`WRITE`/`BINOP`/`LD`/`ST`/`CONST` actually needs:
//!
//! - Every value is one machine word (32 bits); there are no other sizes.
//! - There are no function definitions or calls in the source language, so
//!   there is exactly one function (`main`) and no calling convention to
//!   speak of beyond calling the two runtime helpers below.
//! - There is no control flow in the source language, so there are no
//!   labels, branches, or basic blocks — a program is a flat instruction
//!   list.
//!
//! # Stack frame
//!
//! x86 stacks grow down (high addresses to low addresses). `main`'s frame
//! looks like this once the prologue has run:
//!
//! ```txt
//!   High memory addresses
//!
//!   +-------------------------+
//!   | Caller's frame          |
//!   +-------------------------+
//!   | Saved %ebp              | <- %ebp points here
//!   +-------------------------+
//!   | Spill slot 0            | <- -4(%ebp)
//!   | Spill slot 1            | <- -8(%ebp)
//!   |       ...               |
//!   +-------------------------+ <- %esp
//!
//!   Low memory addresses
//! ```
//!
//! Spill slots are allocated from a symbolic stack that mirrors the source
//! program's expression-evaluation stack; see `codegen.rs` for the
//! allocation scheme.
//!
//! # Runtime
//!
//! Two external symbols are referenced but never declared: `Lread` (reads
//! one word from stdin into `%eax`) and `Lwrite` (prints the word passed on
//! the native stack, cdecl-style). Providing these symbols — the C runtime,
//! the linker invocation — is outside this crate.
//!
//! # Registers
//!
//! Eight registers participate in code generation, in a fixed order that
//! doubles as the register file's allocation order:
//!
//! | index | name   | role                                      |
//! |-------|--------|-------------------------------------------|
//! | 0     | `%ebx` | general-purpose, freely allocated          |
//! | 1     | `%ecx` | general-purpose, freely allocated          |
//! | 2     | `%esi` | general-purpose, freely allocated          |
//! | 3     | `%edi` | unused by this generator (reserved)        |
//! | 4     | `%eax` | scratch: binop destination, `idiv` dividend/quotient |
//! | 5     | `%edx` | scratch: `idiv` sign extension/remainder   |
//! | 6     | `%ebp` | frame pointer, never allocated             |
//! | 7     | `%esp` | stack pointer, never allocated             |
//!
//! Only indices `0..nRegs` (`%ebx`, `%ecx`, `%esi`) are ever pushed onto the
//! symbolic stack; `%eax`/`%edx` are scratch registers the per-opcode
//! emitter reaches for directly, and `%ebp`/`%esp` never appear as operands
//! at all — they're addressed implicitly through [`Operand::Slot`].
#![allow(dead_code)]

use derive_more::Display;

use crate::common::Id;

/// Number of general-purpose registers available to the symbolic stack.
pub const N_REGS: u8 = 3;

/// Word size in bytes, used to compute spill-slot offsets.
pub const WORD_SIZE: i32 = 4;

/// A hardware register, indexed in a fixed order the code generator relies
/// on for its allocation scheme.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Register {
    #[display("%ebx")]
    Bx,
    #[display("%ecx")]
    Cx,
    #[display("%esi")]
    Si,
    #[display("%edi")]
    Di,
    #[display("%eax")]
    Ax,
    #[display("%edx")]
    Dx,
    #[display("%ebp")]
    Bp,
    #[display("%esp")]
    Sp,
}

impl Register {
    /// The register at a given allocation index, `0..N_REGS` for the
    /// symbolic stack plus the fixed scratch/frame registers. `None` for
    /// anything outside `0..8`.
    pub fn from_index(i: u8) -> Option<Register> {
        use Register::*;
        Some(match i {
            0 => Bx,
            1 => Cx,
            2 => Si,
            3 => Di,
            4 => Ax,
            5 => Dx,
            6 => Bp,
            7 => Sp,
            _ => return None,
        })
    }
}

/// A location an x86 instruction can read from or write to.
///
/// Only `Reg`/`Slot` ever occur on the symbolic stack; `Mem`/`Imm` only ever
/// appear as one-off operands the per-opcode emitter constructs directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// A hard register, `i` in `0..8`.
    Reg(u8),
    /// The `n`-th spill slot on the hardware stack, `n >= 0`.
    Slot(u32),
    /// A named memory cell (a global variable).
    Mem(Id),
    /// An immediate integer literal.
    Imm(i64),
}

impl Operand {
    /// Is this operand anything other than a register (and therefore one
    /// x86 `movl` can't use as both source and destination at once)?
    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Slot(_) | Operand::Mem(_))
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(i) => write!(
                f,
                "{}",
                Register::from_index(*i).expect("register index should be in 0..8")
            ),
            // Spill slots grow downward from %ebp: slot 0 is -4(%ebp), slot
            // 1 is -8(%ebp), and so on.
            Operand::Slot(n) => write!(f, "-{}(%ebp)", WORD_SIZE * (*n as i32 + 1)),
            Operand::Mem(name) => write!(f, "{name}"),
            Operand::Imm(k) => write!(f, "${k}"),
        }
    }
}

/// The binary operations `Binop` supports: the five arithmetic/bitwise ops
/// `compileOp` dispatches plus `cmp`, which `compileCompare` uses to set
/// flags without producing a result operand of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum AsmBinOp {
    #[display("addl")]
    Add,
    #[display("subl")]
    Sub,
    #[display("imull")]
    Mul,
    #[display("andl")]
    And,
    #[display("orl")]
    Or,
    #[display("xorl")]
    Xor,
    #[display("cmpl")]
    Cmp,
}

/// The flag-register suffix `set` uses, one per comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SetSuffix {
    #[display("l")]
    Lt,
    #[display("le")]
    Le,
    #[display("e")]
    Eq,
    #[display("ne")]
    Ne,
    #[display("ge")]
    Ge,
    #[display("g")]
    Gt,
}

/// A single x86 instruction, or a raw textual line (`Meta`) for section
/// directives, labels, comments, and `.int` data declarations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Mov(Operand, Operand),
    Binop(AsmBinOp, Operand, Operand),
    IDiv(Operand),
    Cltd,
    Set(SetSuffix, Register),
    Push(Operand),
    Pop(Operand),
    Call(String),
    Ret,
    /// Raw assembly text, injected verbatim.
    Meta(String),
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Instruction::*;
        match self {
            Mov(src, dst) => write!(f, "\tmovl\t{src},\t{dst}\n"),
            Binop(op, src, dst) => write!(f, "\t{op}\t{src},\t{dst}\n"),
            IDiv(src) => write!(f, "\tidivl\t{src}\n"),
            Cltd => write!(f, "\tcltd\n"),
            Set(suffix, reg) => write!(f, "\tset{suffix}\t{}\n", set_operand(*reg)),
            Push(src) => write!(f, "\tpushl\t{src}\n"),
            Pop(dst) => write!(f, "\tpopl\t{dst}\n"),
            Call(name) => write!(f, "\tcall\t{name}\n"),
            Ret => write!(f, "\tret\n"),
            Meta(text) => write!(f, "{text}"),
        }
    }
}

/// `set` only ever targets `%al`, the low byte of the register it's handed
///.
fn set_operand(reg: Register) -> &'static str {
    match reg {
        Register::Ax => "%al",
        other => panic!("set only targets %al, got {other}"),
    }
}

/// A complete translation unit: the assembled `.global`/`.data`/`.text`
/// sections plus `main`'s body.
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Render every instruction to its AT&T-syntax text and concatenate
    /// the result into a single assembly file.
    pub fn asm_code(&self) -> String {
        self.instructions.iter().map(Instruction::to_string).collect()
    }
}
