//! The world/state abstraction the two reference interpreters read and
//! write through. Neither interpreter talks to stdin/stdout directly so
//! that tests can run against a fixed, replayable input without touching
//! the process's real standard streams.

use std::collections::VecDeque;
use std::io::Write as _;

/// A single word-sized input/output channel, standing in for the runtime's
/// `Lread`/`Lwrite` at the interpreter level (the generated assembly calls
/// those as external symbols instead; this trait only matters for the AST
/// and stack-machine evaluators).
pub trait Io {
    fn read(&mut self) -> i64;
    fn write(&mut self, value: i64);
}

/// Reads from real stdin, one whitespace-separated integer per call;
/// writes to real stdout, one integer per line.
#[derive(Default)]
pub struct StdIo;

impl Io for StdIo {
    fn read(&mut self) -> i64 {
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .expect("stdin should be readable");
        line.trim()
            .parse()
            .expect("input should be a decimal integer")
    }

    fn write(&mut self, value: i64) {
        println!("{value}");
        std::io::stdout().flush().expect("stdout should be writable");
    }
}

/// A fixed queue of inputs and a recording of outputs, for tests and for
/// the `--out` debugging modes of the CLI drivers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferedIo {
    input: VecDeque<i64>,
    pub output: Vec<i64>,
}

impl BufferedIo {
    pub fn new(input: impl IntoIterator<Item = i64>) -> Self {
        BufferedIo {
            input: input.into_iter().collect(),
            output: Vec::new(),
        }
    }
}

impl Io for BufferedIo {
    fn read(&mut self) -> i64 {
        self.input
            .pop_front()
            .expect("program should not read past the end of its input")
    }

    fn write(&mut self, value: i64) {
        self.output.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_io_replays_input_in_order() {
        let mut io = BufferedIo::new([1, 2, 3]);
        assert_eq!(io.read(), 1);
        assert_eq!(io.read(), 2);
        let doubled = io.read() * 10;
        io.write(doubled);
        assert_eq!(io.output, vec![30]);
    }

    #[test]
    #[should_panic]
    fn buffered_io_panics_past_end_of_input() {
        let mut io = BufferedIo::new([]);
        io.read();
    }
}
