//! The parser.
//!
//! Recursive descent over the full token vector, loosest to tightest:
//! `!!`, then `&&`, then the six comparisons, then `+ -`, then `* / %`,
//! then `^`.

use std::fmt::Debug;

use derive_more::derive::Display;

use super::ast::*;
use super::lex::{LexError, Lexer, Token, TokenKind};

#[derive(Display)]
#[display("Parse error: {}", self.0)]
pub struct ParseError(String);

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError(e.to_string())
    }
}

pub fn parse(input: &str) -> Result<Program, ParseError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next()? {
        tokens.push(tok);
    }
    Parser { tokens, pos: 0 }.parse_program()
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn peek_text(&self) -> Option<&'src str> {
        self.tokens.get(self.pos).map(|t| t.text)
    }

    fn advance(&mut self) -> Option<Token<'src>> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        match self.advance() {
            Some(tok) if tok.kind == kind => Ok(tok),
            Some(tok) => Err(ParseError(format!("expected {kind}, found {}", tok.kind))),
            None => Err(ParseError(format!("expected {kind}, found end of input"))),
        }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(TokenKind::Read) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let name = self.expect(TokenKind::Id)?.text;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Read(internment::Intern::new(name.to_string())))
            }
            Some(TokenKind::Write) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Write(e))
            }
            Some(TokenKind::Id) => {
                let name = self.expect(TokenKind::Id)?.text;
                self.expect(TokenKind::Assign)?;
                let e = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Assign(internment::Intern::new(name.to_string()), e))
            }
            Some(other) => Err(ParseError(format!("unexpected token {other} at start of statement"))),
            None => Err(ParseError("unexpected end of input in statement".to_string())),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = bop(BOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_cmp()?;
        while self.peek() == Some(TokenKind::And) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = bop(BOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_add()?;
        while let Some(op) = self.peek().and_then(cmp_op) {
            self.advance();
            let rhs = self.parse_add()?;
            lhs = bop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BOp::Add,
                Some(TokenKind::Minus) => BOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = bop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_xor()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Mul) => BOp::Mul,
                Some(TokenKind::Div) => BOp::Div,
                Some(TokenKind::Mod) => BOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_xor()?;
            lhs = bop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_xor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_primary()?;
        while self.peek() == Some(TokenKind::Xor) {
            self.advance();
            let rhs = self.parse_primary()?;
            lhs = bop(BOp::Xor, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(TokenKind::Num) => {
                let text = self.advance().unwrap().text;
                let n: i64 = text
                    .parse()
                    .map_err(|_| ParseError(format!("invalid integer literal {text:?}")))?;
                Ok(Expr::Const(n))
            }
            Some(TokenKind::Id) => {
                let text = self.advance().unwrap().text;
                Ok(Expr::Var(internment::Intern::new(text.to_string())))
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            Some(other) => Err(ParseError(format!("unexpected token {other} in expression"))),
            None => Err(ParseError("unexpected end of input in expression".to_string())),
        }
    }
}

fn bop(op: BOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::BOp {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn cmp_op(kind: TokenKind) -> Option<BOp> {
    match kind {
        TokenKind::Lt => Some(BOp::Lt),
        TokenKind::Le => Some(BOp::Le),
        TokenKind::Eq => Some(BOp::Eq),
        TokenKind::Ne => Some(BOp::Ne),
        TokenKind::Ge => Some(BOp::Ge),
        TokenKind::Gt => Some(BOp::Gt),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(what: &str) -> String {
        what.to_string()
    }

    #[test]
    fn parses_read_assign_write() {
        let prog = parse("read (x); y := x + 1; write (y);").unwrap();
        assert_eq!(prog.stmts.len(), 3);
        assert!(matches!(&prog.stmts[0], Stmt::Read(id) if id.to_string() == text("x")));
        assert!(matches!(&prog.stmts[1], Stmt::Assign(id, _) if id.to_string() == text("y")));
        assert!(matches!(&prog.stmts[2], Stmt::Write(_)));
    }

    #[test]
    fn mul_binds_tighter_than_add() {
        let prog = parse("write (1 + 2 * 3);").unwrap();
        match &prog.stmts[0] {
            Stmt::Write(Expr::BOp { op: BOp::Add, rhs, .. }) => {
                assert!(matches!(**rhs, Expr::BOp { op: BOp::Mul, .. }));
            }
            _ => panic!("expected a top-level Add"),
        }
    }

    #[test]
    fn parenthesized_expression_overrides_precedence() {
        let prog = parse("write ((1 + 2) * 3);").unwrap();
        match &prog.stmts[0] {
            Stmt::Write(Expr::BOp { op: BOp::Mul, lhs, .. }) => {
                assert!(matches!(**lhs, Expr::BOp { op: BOp::Add, .. }));
            }
            _ => panic!("expected a top-level Mul"),
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("x := ;").is_err());
        assert!(parse("read (1);").is_err());
    }
}
