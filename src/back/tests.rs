//! End-to-end scenarios and the seven testable properties.

use crate::common::io::BufferedIo;
use crate::front::ast::BOp;
use crate::middle::sm::{eval, Insn};

use super::codegen::code_gen;

fn id(name: &str) -> internment::Intern<String> {
    internment::Intern::new(name.to_string())
}

fn body_only(asm: &str) -> &str {
    // Everything from `main:` onward, which is what these scenarios assert
    // against.
    let idx = asm.find("main:\n").expect("asm should contain a main label");
    &asm[idx + "main:\n".len()..]
}

#[test]
fn s1_const_write() {
    let prog = vec![Insn::Const(42), Insn::Write];
    let asm = code_gen(prog).unwrap().asm_code();
    assert!(asm.contains("\t.data\n\t.text\n"), "empty data section");
    let body = body_only(&asm);
    assert!(body.starts_with(
        "\tpushl\t%ebp\n\
         \tmovl\t%esp,\t%ebp\n\
         \tsubl\t$0,\t%esp\n\
         # CONST 42\n\
         \tmovl\t$42,\t%ebx\n\
         # WRITE\n\
         \tpushl\t%ebx\n\
         \tcall\tLwrite\n\
         \tpopl\t%eax\n"
    ));
}

#[test]
fn s2_read_store_load_write() {
    let x = id("x");
    let prog = vec![Insn::Read, Insn::St(x), Insn::Ld(x), Insn::Write];
    let asm = code_gen(prog).unwrap().asm_code();
    assert!(asm.contains("global_x:\t.int\t0\n"));
    let body = body_only(&asm);
    assert!(body.contains(
        "# READ\n\
         \tcall\tLread\n\
         \tmovl\t%eax,\t%ebx\n\
         # ST x\n\
         \tmovl\t%ebx,\tglobal_x\n\
         # LD x\n\
         \tmovl\tglobal_x,\t%ebx\n"
    ));
}

#[test]
fn s3_add_uses_registers_directly() {
    let prog = vec![
        Insn::Const(2),
        Insn::Const(3),
        Insn::Binop(BOp::Add),
        Insn::Write,
    ];
    let asm = code_gen(prog).unwrap().asm_code();
    assert!(asm.contains("\taddl\t%ecx,\t%ebx\n"));
}

#[test]
fn s4_div_routes_through_eax_edx() {
    let prog = vec![
        Insn::Const(10),
        Insn::Const(3),
        Insn::Binop(BOp::Div),
        Insn::Write,
    ];
    let asm = code_gen(prog).unwrap().asm_code();
    assert!(asm.contains(
        "\tmovl\t%ebx,\t%eax\n\
         \tcltd\n\
         \tidivl\t%ecx\n\
         \tmovl\t%eax,\t%ebx\n"
    ));
}

#[test]
fn s5_compare_writes_full_eax() {
    let prog = vec![
        Insn::Const(1),
        Insn::Const(2),
        Insn::Binop(BOp::Lt),
        Insn::Write,
    ];
    let asm = code_gen(prog).unwrap().asm_code();
    assert!(asm.contains(
        "\tcmpl\t%ecx,\t%ebx\n\
         \tsetl\t%al\n\
         \tmovl\t%eax,\t%ebx\n"
    ));
}

#[test]
fn s6_four_deep_chain_spills_once() {
    let prog = vec![
        Insn::Const(1),
        Insn::Const(2),
        Insn::Const(3),
        Insn::Const(4),
        Insn::Binop(BOp::Add),
        Insn::Binop(BOp::Add),
        Insn::Binop(BOp::Add),
        Insn::Write,
    ];
    let asm = code_gen(prog).unwrap().asm_code();
    assert!(asm.contains("\tsubl\t$4,\t%esp\n"));
    assert!(asm.contains("\tmovl\t$4,\t-4(%ebp)\n"));
    assert!(asm.contains("\taddl\t-4(%ebp),\t%esi\n"));
}

// --- Testable properties -------------------------------------

#[test]
fn property_idempotent_globals() {
    let x = id("x");
    let base = vec![Insn::Read, Insn::St(x), Insn::Ld(x), Insn::Write];
    let mut extended = base.clone();
    extended.push(Insn::Ld(x));
    extended.push(Insn::St(x));

    fn globals(asm: &str) -> Vec<&str> {
        asm.lines().filter(|l| l.contains(":\t.int\t0")).collect()
    }
    let a = code_gen(base).unwrap().asm_code();
    let b = code_gen(extended).unwrap().asm_code();
    assert_eq!(globals(&a), globals(&b));
}

#[test]
fn property_frame_size_is_zero_without_spilling() {
    let prog = vec![Insn::Const(1), Insn::Const(2), Insn::Binop(BOp::Add), Insn::Write];
    let asm = code_gen(prog).unwrap().asm_code();
    assert!(asm.contains("\tsubl\t$0,\t%esp\n"));
}

#[test]
fn property_determinism() {
    let prog = vec![Insn::Const(7), Insn::Write];
    let a = code_gen(prog.clone()).unwrap().asm_code();
    let b = code_gen(prog).unwrap().asm_code();
    assert_eq!(a, b);
}

#[test]
fn property_comment_coverage() {
    let prog = vec![
        Insn::Const(1),
        Insn::Const(2),
        Insn::Binop(BOp::Add),
        Insn::Write,
    ];
    let n = prog.len();
    let asm = code_gen(prog).unwrap().asm_code();
    let comments = asm.lines().filter(|l| l.starts_with("# ")).count();
    assert_eq!(comments, n);
}

#[test]
fn property_section_ordering() {
    let prog = vec![Insn::Const(1), Insn::Write];
    let asm = code_gen(prog).unwrap().asm_code();
    let global_pos = asm.find(".global\tmain").unwrap();
    let data_pos = asm.find(".data").unwrap();
    let text_pos = asm.find(".text").unwrap();
    let main_pos = asm.find("main:\n").unwrap();
    assert!(global_pos < data_pos);
    assert!(data_pos < text_pos);
    assert!(text_pos < main_pos);
}

#[test]
fn property_no_memory_to_memory_move() {
    // Forces a spill (four-deep chain) so at least one operand pair would
    // be memory-to-memory if `move` didn't bounce through %eax.
    let x = id("x");
    let prog = vec![
        Insn::Const(1),
        Insn::Const(2),
        Insn::Const(3),
        Insn::Const(4),
        Insn::St(x),
        Insn::Write,
        Insn::Write,
        Insn::Write,
        Insn::Ld(x),
        Insn::Write,
    ];
    let asm = code_gen(prog).unwrap().asm_code();
    for line in asm.lines().filter(|l| l.trim_start().starts_with("movl")) {
        let operands = line.trim_start().trim_start_matches("movl").trim();
        let mut parts = operands.splitn(2, ",\t");
        let src = parts.next().unwrap();
        let dst = parts.next().unwrap();
        let is_mem = |s: &str| s.ends_with("(%ebp)") || (!s.starts_with('%') && !s.starts_with('$'));
        assert!(
            !(is_mem(src) && is_mem(dst)),
            "memory-to-memory move: {line}"
        );
    }
}

#[test]
fn property_division_invariant() {
    let prog = vec![
        Insn::Const(10),
        Insn::Const(3),
        Insn::Binop(BOp::Div),
        Insn::Write,
    ];
    let asm = code_gen(prog).unwrap().asm_code();
    let lines: Vec<&str> = asm
        .lines()
        .filter(|l| !l.starts_with('#'))
        .collect();
    let idiv_pos = lines.iter().position(|l| l.contains("idivl")).unwrap();
    assert!(lines[idiv_pos - 1].contains("cltd"));
    assert!(lines[idiv_pos - 2].contains("movl") && lines[idiv_pos - 2].ends_with("%eax"));
}

#[test]
fn empty_program_still_produces_a_valid_unit() {
    let asm = code_gen(vec![]).unwrap().asm_code();
    assert!(asm.contains("\t.global\tmain\n"));
    assert!(asm.contains("\tsubl\t$0,\t%esp\n"));
    assert!(asm.contains("\tret\n"));
}

#[test]
fn malformed_program_is_a_reported_error_not_a_panic() {
    assert!(code_gen(vec![Insn::Write]).is_err());
}

#[test]
fn codegen_agrees_with_the_reference_sm_interpreter() {
    let x = id("x");
    let prog = vec![
        Insn::Const(10),
        Insn::St(x),
        Insn::Ld(x),
        Insn::Const(3),
        Insn::Binop(BOp::Mul),
        Insn::Write,
    ];
    let mut io = BufferedIo::new([]);
    eval(&prog, &mut io).unwrap();
    assert_eq!(io.output, vec![30]);

    // The x86 side doesn't execute here (no assembler available in tests);
    // this just checks the generator accepts the same well-formed program
    // the reference interpreter does, and emits one comment per opcode.
    let n = prog.len();
    let asm = code_gen(prog).unwrap().asm_code();
    assert_eq!(asm.lines().filter(|l| l.starts_with("# ")).count(), n);
}
