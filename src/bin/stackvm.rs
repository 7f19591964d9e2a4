//! The stack-machine interpreter driver. Parses and lowers a source file,
//! then runs it against real stdin/stdout.

use stackc::common::io::StdIo;
use stackc::front::parse;
use stackc::front::lower;
use stackc::middle::sm;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file
    file: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let input = String::from_utf8(std::fs::read(&args.file).expect("file should be readable"))
        .expect("input characters should be utf8");

    let ast = parse(&input).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    let prog = lower(ast);

    let mut io = StdIo;
    if let Err(e) = sm::eval(&prog, &mut io) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
