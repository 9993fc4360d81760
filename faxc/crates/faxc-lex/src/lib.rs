//! Lexical analysis: turns source bytes into a flat token stream for
//! `faxc-par`'s recursive-descent productions.
//!
//! Scope is deliberately narrow: this crate owns tokenization only. The
//! grammar itself — what sequences of tokens are well-formed — lives in
//! `faxc-par`; this crate just needs to agree with it on token shapes.

use faxc_util::{Span, Symbol};

/// A lexed token paired with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Float(f64),
    Str(Symbol),
    Ident(Symbol),

    // Keywords
    Var,
    Const,
    Function,
    Method,
    New,
    If,
    Else,
    While,
    For,
    In,
    Is,
    Instanceof,
    Break,
    Continue,
    Return,
    True,
    False,
    Null,
    This,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    QuestionDot,
    QuestionLParen,
    QuestionLBracket,
    Question,

    // Operators
    Eq,       // =
    EqEq,     // ==
    NotEq,    // !=
    Lt,
    Gt,
    LtEq,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    AndAnd,   // &&
    OrOr,     // ||
    Bang,     // !
    Amp,      // &
    Pipe,     // |
    Caret,    // ^
    Tilde,    // ~
    Shl,      // <<
    Shr,      // >>

    Eof,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{0}' at byte {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),
    #[error("invalid escape sequence '\\{0}' at byte {1}")]
    InvalidEscape(char, usize),
    #[error("invalid number literal at byte {0}")]
    InvalidNumber(usize),
}

pub type Result<T> = std::result::Result<T, LexError>;

/// A single-pass tokenizer over a source string. Byte-oriented, but
/// identifier continuation bytes are decoded as UTF-8 so non-ASCII
/// alphanumeric identifiers are accepted.
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word {
        "var" => Token::Var,
        "const" => Token::Const,
        "function" => Token::Function,
        "method" => Token::Method,
        "new" => Token::New,
        "if" => Token::If,
        "else" => Token::Else,
        "while" => Token::While,
        "for" => Token::For,
        "in" => Token::In,
        "is" => Token::Is,
        "instanceof" => Token::Instanceof,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "return" => Token::Return,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        "this" => Token::This,
        _ => return None,
    })
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0, line: 1, column: 1 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn make_span(&self, start: usize, start_line: u32, start_col: u32) -> Span {
        Span::new(start, self.pos, start_line, start_col)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    while self.peek().is_some() {
                        if self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Non-ASCII identifier continuation: decode one UTF-8 scalar and test
    /// `char::is_alphanumeric`, matching spec's "identifiers may include
    /// non-ASCII alphanumerics".
    fn ident_continues(&self) -> Option<usize> {
        let rest = &self.src[self.pos..];
        let ch = rest.chars().next()?;
        if ch == '_' || ch.is_alphanumeric() {
            Some(ch.len_utf8())
        } else {
            None
        }
    }

    fn ident_starts(&self) -> Option<usize> {
        let rest = &self.src[self.pos..];
        let ch = rest.chars().next()?;
        if ch == '_' || (ch.is_alphanumeric() && !ch.is_ascii_digit()) {
            Some(ch.len_utf8())
        } else {
            None
        }
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.pos;
        while let Some(len) = self.ident_continues() {
            for _ in 0..len {
                self.bump();
            }
        }
        let word = &self.src[start..self.pos];
        keyword(word).unwrap_or_else(|| Token::Ident(Symbol::intern(word)))
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.bump();
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.bump();
            }
            if matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                is_float = true;
                while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                    self.bump();
                }
            } else {
                self.pos = save;
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse::<f64>().map(Token::Float).map_err(|_| LexError::InvalidNumber(start))
        } else {
            text.parse::<i64>().map(Token::Int).map_err(|_| LexError::InvalidNumber(start))
        }
    }

    fn lex_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString(start)),
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    let esc_pos = self.pos;
                    self.bump();
                    match self.peek() {
                        Some(b'n') => {
                            out.push('\n');
                            self.bump();
                        }
                        Some(b'r') => {
                            out.push('\r');
                            self.bump();
                        }
                        Some(b't') => {
                            out.push('\t');
                            self.bump();
                        }
                        Some(b'\\') => {
                            out.push('\\');
                            self.bump();
                        }
                        Some(b'"') => {
                            out.push('"');
                            self.bump();
                        }
                        Some(c) => return Err(LexError::InvalidEscape(c as char, esc_pos)),
                        None => return Err(LexError::UnterminatedString(start)),
                    }
                }
                Some(_) => {
                    let rest = &self.src[self.pos..];
                    let ch = rest.chars().next().unwrap();
                    out.push(ch);
                    for _ in 0..ch.len_utf8() {
                        self.bump();
                    }
                }
            }
        }
        Ok(Token::Str(Symbol::intern(&out)))
    }

    /// Lexes the next token, returning `Token::Eof` once at end of input
    /// (subsequent calls keep returning `Eof` rather than erroring).
    pub fn next_token(&mut self) -> Result<SpannedToken> {
        self.skip_trivia();
        let start = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let Some(b) = self.peek() else {
            return Ok(SpannedToken { token: Token::Eof, span: self.make_span(start, start_line, start_col) });
        };

        if b.is_ascii_digit() {
            let tok = self.lex_number()?;
            return Ok(SpannedToken { token: tok, span: self.make_span(start, start_line, start_col) });
        }
        if b == b'"' {
            let tok = self.lex_string()?;
            return Ok(SpannedToken { token: tok, span: self.make_span(start, start_line, start_col) });
        }
        if self.ident_starts().is_some() {
            let tok = self.lex_ident();
            return Ok(SpannedToken { token: tok, span: self.make_span(start, start_line, start_col) });
        }

        let tok = match b {
            b'(' => { self.bump(); Token::LParen }
            b')' => { self.bump(); Token::RParen }
            b'{' => { self.bump(); Token::LBrace }
            b'}' => { self.bump(); Token::RBrace }
            b'[' => { self.bump(); Token::LBracket }
            b']' => { self.bump(); Token::RBracket }
            b',' => { self.bump(); Token::Comma }
            b';' => { self.bump(); Token::Semicolon }
            b':' => { self.bump(); Token::Colon }
            b'~' => { self.bump(); Token::Tilde }
            b'^' => { self.bump(); Token::Caret }
            b'%' => { self.bump(); Token::Percent }
            b'+' => { self.bump(); Token::Plus }
            b'-' => { self.bump(); Token::Minus }
            b'*' => { self.bump(); Token::Star }
            b'/' => { self.bump(); Token::Slash }
            b'.' => { self.bump(); Token::Dot }
            b'?' => {
                self.bump();
                match self.peek() {
                    Some(b'.') => { self.bump(); Token::QuestionDot }
                    Some(b'(') => { self.bump(); Token::QuestionLParen }
                    Some(b'[') => { self.bump(); Token::QuestionLBracket }
                    _ => Token::Question,
                }
            }
            b'=' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::EqEq
                } else {
                    Token::Eq
                }
            }
            b'!' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            b'<' => {
                self.bump();
                match self.peek() {
                    Some(b'=') => { self.bump(); Token::LtEq }
                    Some(b'<') => { self.bump(); Token::Shl }
                    _ => Token::Lt,
                }
            }
            b'>' => {
                self.bump();
                match self.peek() {
                    Some(b'=') => { self.bump(); Token::GtEq }
                    Some(b'>') => { self.bump(); Token::Shr }
                    _ => Token::Gt,
                }
            }
            b'&' => {
                self.bump();
                if self.peek() == Some(b'&') {
                    self.bump();
                    Token::AndAnd
                } else {
                    Token::Amp
                }
            }
            b'|' => {
                self.bump();
                if self.peek() == Some(b'|') {
                    self.bump();
                    Token::OrOr
                } else {
                    Token::Pipe
                }
            }
            other => return Err(LexError::UnexpectedChar(other as char, start)),
        };
        Ok(SpannedToken { token: tok, span: self.make_span(start, start_line, start_col) })
    }

    /// Tokenizes the whole input, stopping at (and including) `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.token == Token::Eof;
            out.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod edge_cases {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(kinds(""), vec![Token::Eof]);
    }

    #[test]
    fn string_escapes() {
        let toks = kinds(r#""a\nb\tc\\d\"e""#);
        assert_eq!(toks[0], Token::Str(Symbol::intern("a\nb\tc\\d\"e")));
    }

    #[test]
    fn non_ascii_identifier() {
        let toks = kinds("var café = 1;");
        assert_eq!(toks[1], Token::Ident(Symbol::intern("café")));
    }

    #[test]
    fn conditional_chain_tokens() {
        assert_eq!(kinds("a?.b?(c)?[d]"), vec![
            Token::Ident(Symbol::intern("a")),
            Token::QuestionDot,
            Token::Ident(Symbol::intern("b")),
            Token::QuestionLParen,
            Token::Ident(Symbol::intern("c")),
            Token::RParen,
            Token::QuestionLBracket,
            Token::Ident(Symbol::intern("d")),
            Token::RBracket,
            Token::Eof,
        ]);
    }

    #[test]
    fn float_and_int_literals() {
        assert_eq!(kinds("1 2.5 3e2"), vec![
            Token::Int(1),
            Token::Float(2.5),
            Token::Float(300.0),
            Token::Eof,
        ]);
    }

    #[test]
    fn unterminated_string_errors() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString(0)));
    }

    #[test]
    fn line_comment_is_skipped() {
        assert_eq!(kinds("1 // comment\n2"), vec![Token::Int(1), Token::Int(2), Token::Eof]);
    }

    #[test]
    fn block_comment_is_skipped() {
        assert_eq!(kinds("1 /* multi\nline */ 2"), vec![Token::Int(1), Token::Int(2), Token::Eof]);
    }

    #[test]
    fn keywords_are_recognized() {
        assert_eq!(
            kinds("var const function method new if else while for in is instanceof break continue return true false null this"),
            vec![
                Token::Var, Token::Const, Token::Function, Token::Method, Token::New,
                Token::If, Token::Else, Token::While, Token::For, Token::In, Token::Is,
                Token::Instanceof, Token::Break, Token::Continue, Token::Return,
                Token::True, Token::False, Token::Null, Token::This, Token::Eof,
            ]
        );
    }
}
