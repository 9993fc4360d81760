//! Recursive-descent parser: token stream (`faxc-lex`) to AST (`ast`).
//! Grammar per spec's source-language summary: `var`/`const` declarations,
//! `function`/`method` expressions, `new` with optional object-literal
//! body, object/array literals, the full operator set, conditional
//! prop/call/index, and C-style/`for-in` loops with labels.

pub mod ast;
mod expr;
mod stmt;

use faxc_lex::{LexError, Lexer, SpannedToken, Token};
use faxc_util::Span;

pub use ast::*;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected token {found:?} at line {line}, column {column}: expected {expected}")]
    Unexpected { found: Token, expected: String, line: u32, column: u32 },
    #[error("invalid assignment target at line {line}, column {column}")]
    BadAssignTarget { line: u32, column: u32 },
}

pub type Result<T> = std::result::Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

/// Parses a whole module to a [`Program`].
pub fn parse(src: &str) -> Result<Program> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn cur(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn cur_span(&self) -> Span {
        self.cur().span
    }

    fn at_eof(&self) -> bool {
        matches!(self.cur().token, Token::Eof)
    }

    fn check(&self, tok: &Token) -> bool {
        &self.cur().token == tok
    }

    fn bump(&mut self) -> SpannedToken {
        let tok = self.cur().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token, expected: &str) -> Result<SpannedToken> {
        if self.check(&tok) {
            Ok(self.bump())
        } else {
            let span = self.cur_span();
            Err(ParseError::Unexpected {
                found: self.cur().token.clone(),
                expected: expected.to_string(),
                line: span.line,
                column: span.column,
            })
        }
    }

    fn err_unexpected(&self, expected: &str) -> ParseError {
        let span = self.cur_span();
        ParseError::Unexpected {
            found: self.cur().token.clone(),
            expected: expected.to_string(),
            line: span.line,
            column: span.column,
        }
    }

    pub fn parse_program(&mut self) -> Result<Program> {
        let mut stmts = Vec::new();
        while !self.at_eof() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }
}

#[cfg(test)]
mod edge_cases {
    use super::*;

    #[test]
    fn empty_program_parses() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn empty_object_literal() {
        let prog = parse("var x = {};").unwrap();
        assert_eq!(prog.len(), 1);
    }

    #[test]
    fn empty_array_literal() {
        let prog = parse("var x = [];").unwrap();
        assert_eq!(prog.len(), 1);
    }

    #[test]
    fn self_recursive_closure_capture() {
        let prog = parse("var f = function() { f(); };").unwrap();
        assert_eq!(prog.len(), 1);
    }

    #[test]
    fn empty_for_in_body() {
        let prog = parse("for (var k, v in obj) {}").unwrap();
        assert_eq!(prog.len(), 1);
    }

    #[test]
    fn optional_chain_short_circuit_parses() {
        let prog = parse("var x = a?.b?.c;").unwrap();
        assert_eq!(prog.len(), 1);
    }

    #[test]
    fn labeled_loop_with_break() {
        let prog = parse("outer: while (true) { break outer; }").unwrap();
        assert_eq!(prog.len(), 1);
    }
}
