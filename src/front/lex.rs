//! The lexer.

use derive_more::Display;
use regex::Regex;

/// Tokens in the program
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("kind: '{kind}', part of input: '{text}'")]
pub struct Token<'src> {
    /// What token class this token belongs to.
    pub kind: TokenKind,
    /// What part of the input this token carries.
    pub text: &'src str,
}

/// Token classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
pub enum TokenKind {
    #[display("id")]
    Id,
    #[display("num")]
    Num,
    #[display(":=")]
    Assign,
    #[display("read")]
    Read,
    #[display("write")]
    Write,
    #[display(";")]
    Semi,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("%")]
    Mod,
    #[display("&&")]
    And,
    #[display("!!")]
    Or,
    #[display("^")]
    Xor,
    #[display("<=")]
    Le,
    #[display("<")]
    Lt,
    #[display(">=")]
    Ge,
    #[display(">")]
    Gt,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
}

pub struct LexError(usize, char);

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Lexer error: unexpected character {:?} at {}",
            self.1, self.0
        )
    }
}

impl std::fmt::Debug for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    matchers: Vec<(Regex, TokenKind)>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        // Order matters: keywords and multi-character operators are listed
        // before the classes they'd otherwise be swallowed by (`read`/
        // `write` before `Id`, `<=`/`>=`/`==`/`!=` before `<`/`>`).
        let matchers = vec![
            (Regex::new(r"\Aread\b").unwrap(), TokenKind::Read),
            (Regex::new(r"\Awrite\b").unwrap(), TokenKind::Write),
            (Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(), TokenKind::Id),
            (Regex::new(r"\A[0-9]+").unwrap(), TokenKind::Num),
            (Regex::new(r"\A:=").unwrap(), TokenKind::Assign),
            (Regex::new(r"\A;").unwrap(), TokenKind::Semi),
            (Regex::new(r"\A\(").unwrap(), TokenKind::LParen),
            (Regex::new(r"\A\)").unwrap(), TokenKind::RParen),
            (Regex::new(r"\A\+").unwrap(), TokenKind::Plus),
            (Regex::new(r"\A-").unwrap(), TokenKind::Minus),
            (Regex::new(r"\A\*").unwrap(), TokenKind::Mul),
            (Regex::new(r"\A/").unwrap(), TokenKind::Div),
            (Regex::new(r"\A%").unwrap(), TokenKind::Mod),
            (Regex::new(r"\A&&").unwrap(), TokenKind::And),
            (Regex::new(r"\A!!").unwrap(), TokenKind::Or),
            (Regex::new(r"\A\^").unwrap(), TokenKind::Xor),
            (Regex::new(r"\A<=").unwrap(), TokenKind::Le),
            (Regex::new(r"\A>=").unwrap(), TokenKind::Ge),
            (Regex::new(r"\A==").unwrap(), TokenKind::Eq),
            (Regex::new(r"\A!=").unwrap(), TokenKind::Ne),
            (Regex::new(r"\A<").unwrap(), TokenKind::Lt),
            (Regex::new(r"\A>").unwrap(), TokenKind::Gt),
        ];
        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\f\r\n\v]|(?://.*))*").unwrap(),
            matchers,
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    // Skip comments and whitespace
    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            self.pos += m.end()
        }
    }

    /// Get the next token if possible.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let rest = &self.input[self.pos..];
        for (re, kind) in &self.matchers {
            if let Some(m) = re.find(rest) {
                let text = m.as_str();
                let start = self.pos;
                self.pos += text.len();
                return Ok(Some(Token {
                    kind: *kind,
                    text: &self.input[start..self.pos],
                }));
            }
        }
        let bad = rest.chars().next().unwrap();
        Err(LexError(self.pos, bad))
    }
}
