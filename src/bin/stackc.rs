//! the compiler driver. takes a source file and an output format, and
//! prints the requested stage of the pipeline to stdout.
//!
//! run with `--help` for more info.

use stackc::{back::*, front::*, middle, middle::*};

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file
    file: String,
    /// the output format
    #[arg(value_enum, short, long, default_value_t = Output::Asm)]
    out: Output,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
enum Output {
    /// the list of tokens
    Tokens,
    /// the ast data structure
    Ast,
    /// the stack-machine program
    Sm,
    /// the resulting assembly code
    Asm,
}

fn main() {
    env_logger::init();
    use Output::*;
    let args = Args::parse();

    let input = String::from_utf8(std::fs::read(&args.file).expect("file should be readable"))
        .expect("input characters should be utf8");

    match args.out {
        Tokens => {
            let mut lexer = lex::Lexer::new(&input);
            loop {
                match lexer.next() {
                    Ok(Some(token)) => println!("{token}"),
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("{e}");
                        std::process::exit(1);
                    }
                }
            }
        }
        Ast => match parse(&input) {
            Ok(prog) => println!("{prog:?}"),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        Sm => {
            let sm = compile_sm(&input);
            for insn in &sm {
                println!("{insn}");
            }
        }
        Asm => {
            let sm = compile_sm(&input);
            match code_gen(sm) {
                Ok(prog) => print!("{}", prog.asm_code()),
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn compile_sm(input: &str) -> Vec<middle::sm::Insn> {
    let ast = parse(input).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    lower(ast)
}
