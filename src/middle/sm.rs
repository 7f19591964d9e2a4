//! The stack machine (SM): the flat intermediate representation the code
//! generator in [`crate::back`] consumes.
//!
//! Unlike a basic-block-and-terminator IR, this one has no control flow at
//! all: the opcode alphabet is closed to exactly six variants, none of
//! which is a jump or a label, so a program here is just `Vec<Insn>`.

use derive_more::Display;

use crate::common::io::Io;
use crate::common::{Id, Map};
use crate::front::ast::BOp;

/// A single stack-machine opcode.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum Insn {
    #[display("READ")]
    Read,
    #[display("WRITE")]
    Write,
    #[display("BINOP {_0}")]
    Binop(BOp),
    #[display("LD {_0}")]
    Ld(Id),
    #[display("ST {_0}")]
    St(Id),
    #[display("CONST {_0}")]
    Const(i64),
}

/// A finite ordered sequence of opcodes — the stack machine's whole notion
/// of a program.
pub type Program = Vec<Insn>;

#[derive(Display, Debug)]
pub enum EvalError {
    #[display("stack underflow")]
    StackUnderflow,
    #[display("undefined variable '{_0}'")]
    UndefinedVariable(Id),
    #[display("division by zero")]
    DivisionByZero,
}

impl std::error::Error for EvalError {}

/// A reference interpreter for stack-machine programs, used to cross-check
/// the code generator's output against an independent semantics.
pub fn eval(prog: &Program, io: &mut dyn Io) -> Result<(), EvalError> {
    let mut stack: Vec<i64> = Vec::new();
    let mut vars: Map<Id, i64> = Map::new();

    for insn in prog {
        match insn {
            Insn::Const(n) => stack.push(*n),
            Insn::Read => stack.push(io.read()),
            Insn::Write => {
                let v = pop(&mut stack)?;
                io.write(v);
            }
            Insn::Ld(x) => {
                let v = vars
                    .get(x)
                    .copied()
                    .ok_or(EvalError::UndefinedVariable(*x))?;
                stack.push(v);
            }
            Insn::St(x) => {
                let v = pop(&mut stack)?;
                vars.insert(*x, v);
            }
            Insn::Binop(op) => {
                let r = pop(&mut stack)?;
                let l = pop(&mut stack)?;
                stack.push(apply(*op, l, r)?);
            }
        }
    }
    Ok(())
}

fn pop(stack: &mut Vec<i64>) -> Result<i64, EvalError> {
    stack.pop().ok_or(EvalError::StackUnderflow)
}

fn apply(op: BOp, l: i64, r: i64) -> Result<i64, EvalError> {
    use BOp::*;
    let b = |cond: bool| if cond { 1 } else { 0 };
    Ok(match op {
        Add => l + r,
        Sub => l - r,
        Mul => l * r,
        Div => l.checked_div(r).ok_or(EvalError::DivisionByZero)?,
        Mod => l.checked_rem(r).ok_or(EvalError::DivisionByZero)?,
        And => b(l != 0 && r != 0),
        Or => b(l != 0 || r != 0),
        Xor => l ^ r,
        Lt => b(l < r),
        Le => b(l <= r),
        Eq => b(l == r),
        Ne => b(l != r),
        Ge => b(l >= r),
        Gt => b(l > r),
    })
}
