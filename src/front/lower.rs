//! AST → stack-machine lowering: a simple recursive tree walk.
//!
//! Because the source AST has no control flow (see `ast.rs`'s module
//! doc), every lowered program uses only the six stack-machine opcodes —
//! there's no way for this pass to emit anything else.

use crate::middle::sm::Insn;

use super::ast::{Expr, Program, Stmt};

pub fn lower(prog: Program) -> Vec<Insn> {
    let mut out = Vec::new();
    log::debug!("lowering {} statement(s)", prog.stmts.len());
    for stmt in prog.stmts {
        lower_stmt(stmt, &mut out);
    }
    out
}

fn lower_stmt(stmt: Stmt, out: &mut Vec<Insn>) {
    match stmt {
        Stmt::Assign(x, e) => {
            log::trace!("lowering assign to '{x}'");
            lower_expr(e, out);
            out.push(Insn::St(x));
        }
        Stmt::Read(x) => {
            log::trace!("lowering read into '{x}'");
            out.push(Insn::Read);
            out.push(Insn::St(x));
        }
        Stmt::Write(e) => {
            log::trace!("lowering write");
            lower_expr(e, out);
            out.push(Insn::Write);
        }
    }
}

fn lower_expr(expr: Expr, out: &mut Vec<Insn>) {
    match expr {
        Expr::Const(n) => {
            log::trace!("lowering const {n}");
            out.push(Insn::Const(n));
        }
        Expr::Var(x) => {
            log::trace!("lowering var '{x}'");
            out.push(Insn::Ld(x));
        }
        Expr::BOp { op, lhs, rhs } => {
            log::trace!("lowering binop {op}");
            lower_expr(*lhs, out);
            lower_expr(*rhs, out);
            out.push(Insn::Binop(op));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse;

    #[test]
    fn lowers_read_assign_write() {
        let prog = parse("read (x); y := x + 1; write (y);").unwrap();
        let sm = lower(prog);
        let x = internment::Intern::new("x".to_string());
        let y = internment::Intern::new("y".to_string());
        assert_eq!(
            sm,
            vec![
                Insn::Read,
                Insn::St(x),
                Insn::Ld(x),
                Insn::Const(1),
                Insn::Binop(crate::front::ast::BOp::Add),
                Insn::St(y),
                Insn::Ld(y),
                Insn::Write,
            ]
        );
    }

    #[test]
    fn never_emits_anything_but_the_six_opcodes() {
        let prog = parse("a := 1 + 2 * 3 - 4 / 2 % 2 ^ 1; write (a < 2 && a >= 0 !! a != 9);")
            .unwrap();
        let sm = lower(prog);
        for insn in &sm {
            assert!(matches!(
                insn,
                Insn::Read | Insn::Write | Insn::Binop(_) | Insn::Ld(_) | Insn::St(_) | Insn::Const(_)
            ));
        }
    }
}
