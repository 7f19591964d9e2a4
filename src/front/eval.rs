//! The AST evaluator: a reference interpreter that walks `ast::Program`
//! directly, without going through the stack machine.

use derive_more::Display;

use crate::common::io::Io;
use crate::common::{Id, Map};

use super::ast::{BOp, Expr, Program, Stmt};

#[derive(Display, Debug)]
pub enum EvalError {
    #[display("undefined variable '{_0}'")]
    UndefinedVariable(Id),
    #[display("division by zero")]
    DivisionByZero,
}

impl std::error::Error for EvalError {}

pub fn eval(prog: &Program, io: &mut dyn Io) -> Result<(), EvalError> {
    let mut vars: Map<Id, i64> = Map::new();
    for stmt in &prog.stmts {
        exec(stmt, &mut vars, io)?;
    }
    Ok(())
}

fn exec(stmt: &Stmt, vars: &mut Map<Id, i64>, io: &mut dyn Io) -> Result<(), EvalError> {
    match stmt {
        Stmt::Assign(x, e) => {
            let v = eval_expr(e, vars, io)?;
            vars.insert(*x, v);
            Ok(())
        }
        Stmt::Read(x) => {
            let v = io.read();
            vars.insert(*x, v);
            Ok(())
        }
        Stmt::Write(e) => {
            let v = eval_expr(e, vars, io)?;
            io.write(v);
            Ok(())
        }
    }
}

fn eval_expr(expr: &Expr, vars: &Map<Id, i64>, io: &mut dyn Io) -> Result<i64, EvalError> {
    match expr {
        Expr::Const(n) => Ok(*n),
        Expr::Var(x) => vars
            .get(x)
            .copied()
            .ok_or(EvalError::UndefinedVariable(*x)),
        Expr::BOp { op, lhs, rhs } => {
            let l = eval_expr(lhs, vars, io)?;
            let r = eval_expr(rhs, vars, io)?;
            apply(*op, l, r)
        }
    }
}

fn apply(op: BOp, l: i64, r: i64) -> Result<i64, EvalError> {
    use BOp::*;
    Ok(match op {
        Add => l + r,
        Sub => l - r,
        Mul => l * r,
        Div => l.checked_div(r).ok_or(EvalError::DivisionByZero)?,
        Mod => l.checked_rem(r).ok_or(EvalError::DivisionByZero)?,
        And => bool_to_i64(l != 0 && r != 0),
        Or => bool_to_i64(l != 0 || r != 0),
        Xor => l ^ r,
        Lt => bool_to_i64(l < r),
        Le => bool_to_i64(l <= r),
        Eq => bool_to_i64(l == r),
        Ne => bool_to_i64(l != r),
        Ge => bool_to_i64(l >= r),
        Gt => bool_to_i64(l > r),
    })
}

fn bool_to_i64(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}
