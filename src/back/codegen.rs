//! The symbolic-stack environment, the per-opcode emitter, and the program
//! emitter — the actual code generator.

use derive_more::Display;

use crate::common::{Id, Set};
use crate::front::ast::BOp;
use crate::middle::sm::{Insn, Program as SmProgram};

use super::asm::{AsmBinOp, Instruction, Operand, Program as AsmProgram, Register, SetSuffix, N_REGS};
use Operand::*;

#[derive(Display, Debug)]
pub enum CodegenError {
    #[display("stack underflow while compiling")]
    StackUnderflow,
    #[display("internal error: invalid register index {_0}")]
    InvalidRegister(u8),
}

impl std::error::Error for CodegenError {}

/// The compile-time symbolic stack plus the bookkeeping needed to render a
/// translation unit's frame size and data section.
///
/// Persistent by convention: every mutator consumes `self` and returns a
/// fresh `Environment`, so the fold in [`code_gen`] can shadow its way
/// through a program without any interior mutability. Cloning a
/// `BTreeSet`/`Vec` is cheap enough for programs of the size this compiler
/// targets; a real implementation under profiling pressure could switch to
/// a persistent vector without changing this type's public shape.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    stack: Vec<Operand>,
    slots_high: u32,
    globals: Set<Id>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    /// Choose the location for a new value pushed on top of the symbolic
    /// stack. The head of `stack` is the top, kept at the
    /// end of the backing `Vec` so push/pop are O(1).
    pub fn allocate(mut self) -> Result<(Operand, Self), CodegenError> {
        let (loc, candidate_high) = match self.stack.last() {
            None => (Reg(0), None),
            Some(Slot(n)) => (Slot(n + 1), Some(n + 2)),
            Some(Reg(i)) if *i + 1 < N_REGS => (Reg(i + 1), None),
            Some(Reg(_)) => (Slot(0), Some(1)),
            // Defensive: Mem/Imm never appear on the symbolic stack itself.
            Some(_) => (Slot(0), Some(1)),
        };
        if let Reg(i) = loc {
            if Register::from_index(i).is_none() || i >= N_REGS {
                return Err(CodegenError::InvalidRegister(i));
            }
        }
        let grew = candidate_high.is_some_and(|h| h > self.slots_high);
        if let Some(high) = candidate_high {
            self.slots_high = self.slots_high.max(high);
        }
        log::trace!(
            "allocate -> {loc}{}",
            if grew {
                format!(", high-water mark now {} slot(s)", self.slots_high)
            } else {
                String::new()
            }
        );
        self.stack.push(loc);
        Ok((loc, self))
    }

    /// Push a location back onto the symbolic stack without allocating —
    /// used to return a binop's result to the stack.
    pub fn push(mut self, x: Operand) -> Self {
        self.stack.push(x);
        self
    }

    pub fn pop(mut self) -> Result<(Operand, Self), CodegenError> {
        match self.stack.pop() {
            Some(x) => Ok((x, self)),
            None => Err(CodegenError::StackUnderflow),
        }
    }

    pub fn pop2(self) -> Result<(Operand, Operand, Self), CodegenError> {
        let (x, env) = self.pop()?;
        let (y, env) = env.pop()?;
        Ok((x, y, env))
    }

    /// Record that `name` has been referenced by an `LD`/`ST`; idempotent.
    pub fn add_global(mut self, name: Id) -> Self {
        self.globals.insert(global_symbol(name));
        self
    }

    /// The memory operand a global variable lives at.
    pub fn loc(&self, name: Id) -> Operand {
        Mem(global_symbol(name))
    }

    /// All referenced globals, in a stable (sorted) order.
    pub fn get_globals(&self) -> Vec<Id> {
        self.globals.iter().copied().collect()
    }

    /// The number of spill slots to reserve in the prologue.
    pub fn get_stack_size(&self) -> u32 {
        self.slots_high
    }
}

fn global_symbol(name: Id) -> Id {
    internment::Intern::new(format!("global_{name}"))
}

/// Generate the x86 sequence for one stack-machine opcode, threading the
/// environment and appending to the instruction buffer.
fn emit_insn(env: Environment, code: &mut Vec<Instruction>, insn: &Insn) -> Result<Environment, CodegenError> {
    code.push(Instruction::Meta(format!("# {insn}\n")));
    log::trace!("emitting {insn}");
    match insn {
        Insn::Read => {
            let (s, env) = env.allocate()?;
            code.push(Instruction::Call("Lread".to_string()));
            code.push(Instruction::Mov(Reg(idx(Register::Ax)), s));
            Ok(env)
        }
        Insn::Write => {
            let (s, env) = env.pop()?;
            code.push(Instruction::Push(s));
            code.push(Instruction::Call("Lwrite".to_string()));
            code.push(Instruction::Pop(Reg(idx(Register::Ax))));
            Ok(env)
        }
        Insn::Const(c) => {
            let (s, env) = env.allocate()?;
            mov(code, Imm(*c), s);
            Ok(env)
        }
        Insn::Ld(x) => {
            let env = env.add_global(*x);
            let src = env.loc(*x);
            let (s, env) = env.allocate()?;
            mov(code, src, s);
            Ok(env)
        }
        Insn::St(x) => {
            let env = env.add_global(*x);
            let dst = env.loc(*x);
            let (s, env) = env.pop()?;
            mov(code, s, dst);
            Ok(env)
        }
        Insn::Binop(op) => {
            let (a, b, env) = env.pop2()?;
            op_code(code, *op, a, b);
            Ok(env.push(b))
        }
    }
}

/// `opCode`: dispatch a source binary operator to the x86
/// sequence that computes it, result left in `b`'s storage.
fn op_code(code: &mut Vec<Instruction>, op: BOp, a: Operand, b: Operand) {
    use BOp::*;
    match op {
        Add => compile_op(code, AsmBinOp::Add, a, b),
        Sub => compile_op(code, AsmBinOp::Sub, a, b),
        Mul => compile_op(code, AsmBinOp::Mul, a, b),
        And => compile_op(code, AsmBinOp::And, a, b),
        Or => compile_op(code, AsmBinOp::Or, a, b),
        Xor => compile_op(code, AsmBinOp::Xor, a, b),
        Div => compile_div_op(code, Register::Ax, a, b),
        Mod => compile_div_op(code, Register::Dx, a, b),
        Lt => compile_compare(code, SetSuffix::Lt, a, b),
        Le => compile_compare(code, SetSuffix::Le, a, b),
        Eq => compile_compare(code, SetSuffix::Eq, a, b),
        Ne => compile_compare(code, SetSuffix::Ne, a, b),
        Ge => compile_compare(code, SetSuffix::Ge, a, b),
        Gt => compile_compare(code, SetSuffix::Gt, a, b),
    }
}

/// `move`: x86 forbids a memory-to-memory `movl`, so when
/// both ends are memory this routes the value through `%eax`.
fn mov(code: &mut Vec<Instruction>, from: Operand, to: Operand) {
    if from.is_memory() && to.is_memory() {
        let ax = Reg(idx(Register::Ax));
        code.push(Instruction::Mov(from, ax));
        code.push(Instruction::Mov(ax, to));
    } else {
        code.push(Instruction::Mov(from, to));
    }
}

/// `compileOp`: x86's two-operand arithmetic/bitwise ops
/// need a register destination.
fn compile_op(code: &mut Vec<Instruction>, op: AsmBinOp, a: Operand, b: Operand) {
    if let Reg(_) = b {
        code.push(Instruction::Binop(op, a, b));
    } else {
        let ax = Reg(idx(Register::Ax));
        mov(code, b, ax);
        code.push(Instruction::Binop(op, a, ax));
        mov(code, ax, b);
    }
}

/// `compileDivOp`: `idiv` always produces quotient in `%eax`
/// and remainder in `%edx`; the caller picks which one to keep.
///
/// `idiv`'s operand (`a`, the divisor) can never be an immediate here: every
/// value that reaches the symbolic stack came from [`Environment::allocate`],
/// which only ever produces `Reg`/`Slot` locations.
fn compile_div_op(code: &mut Vec<Instruction>, result_reg: Register, a: Operand, b: Operand) {
    let ax = Reg(idx(Register::Ax));
    mov(code, b, ax);
    code.push(Instruction::Cltd);
    code.push(Instruction::IDiv(a));
    mov(code, Reg(idx(result_reg)), b);
}

/// `compileCompare`: the comparison's 0/1 result ends up in
/// `%al`, then the *whole* `%eax` is copied into `b` — the upper 24 bits
/// are whatever was already in `%eax`. This is preserved faithfully rather
/// than corrected with a `movzbl`.
fn compile_compare(code: &mut Vec<Instruction>, suffix: SetSuffix, a: Operand, b: Operand) {
    compile_op(code, AsmBinOp::Cmp, a, b);
    code.push(Instruction::Set(suffix, Register::Ax));
    let ax = Reg(idx(Register::Ax));
    mov(code, ax, b);
}

fn idx(reg: Register) -> u8 {
    match reg {
        Register::Bx => 0,
        Register::Cx => 1,
        Register::Si => 2,
        Register::Di => 3,
        Register::Ax => 4,
        Register::Dx => 5,
        Register::Bp => 6,
        Register::Sp => 7,
    }
}

/// Fold the per-opcode emitter over a whole stack-machine program and wrap
/// the result in a complete translation unit.
pub fn code_gen(prog: SmProgram) -> Result<AsmProgram, CodegenError> {
    let mut env = Environment::new();
    let mut body = Vec::new();
    for insn in &prog {
        env = emit_insn(env, &mut body, insn)?;
    }
    log::debug!(
        "compiled {} opcodes, frame size {} words, {} globals",
        prog.len(),
        env.get_stack_size(),
        env.get_globals().len()
    );

    let mut out = Vec::new();
    out.push(Instruction::Meta("\t.global\tmain\n".to_string()));
    out.push(Instruction::Meta("\t.data\n".to_string()));
    for g in env.get_globals() {
        out.push(Instruction::Meta(format!("{g}:\t.int\t0\n")));
    }
    out.push(Instruction::Meta("\t.text\n".to_string()));
    out.push(Instruction::Meta("main:\n".to_string()));
    out.push(Instruction::Push(Reg(idx(Register::Bp))));
    out.push(Instruction::Mov(Reg(idx(Register::Sp)), Reg(idx(Register::Bp))));
    out.push(Instruction::Binop(
        AsmBinOp::Sub,
        Imm(4 * env.get_stack_size() as i64),
        Reg(idx(Register::Sp)),
    ));
    out.extend(body);
    out.push(Instruction::Mov(Reg(idx(Register::Bp)), Reg(idx(Register::Sp))));
    out.push(Instruction::Pop(Reg(idx(Register::Bp))));
    out.push(Instruction::Binop(
        AsmBinOp::Xor,
        Reg(idx(Register::Ax)),
        Reg(idx(Register::Ax)),
    ));
    out.push(Instruction::Ret);

    Ok(AsmProgram { instructions: out })
}
