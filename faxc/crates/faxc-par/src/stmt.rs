//! Statement parsing: `var`/`const` declarations, `if`/`else`, `while`,
//! C-style `for`, `for-in`, labeled loops, `break`/`continue`, `return`.

use faxc_lex::Token;
use faxc_util::Symbol;

use crate::ast::*;
use crate::{Parser, Result};

impl Parser {
    pub fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(Token::LBrace, "{")?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(Token::RBrace, "}")?;
        Ok(stmts)
    }

    pub fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.cur().token.clone() {
            Token::Var => self.parse_var_decl(DeclKind::Var),
            Token::Const => self.parse_var_decl(DeclKind::Const),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(None),
            Token::For => self.parse_for(None),
            Token::Break => {
                let span = self.cur_span();
                self.bump();
                let label = self.parse_optional_label();
                self.eat(&Token::Semicolon);
                Ok(Stmt::Break { label, span })
            }
            Token::Continue => {
                let span = self.cur_span();
                self.bump();
                let label = self.parse_optional_label();
                self.eat(&Token::Semicolon);
                Ok(Stmt::Continue { label, span })
            }
            Token::Return => {
                let span = self.cur_span();
                self.bump();
                let value = if self.check(&Token::Semicolon) || self.check(&Token::RBrace) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.eat(&Token::Semicolon);
                Ok(Stmt::Return { value, span })
            }
            Token::Ident(name) => {
                // Lookahead for a `label:` prefix on a loop.
                if self.peek_is_colon() {
                    self.bump(); // ident
                    self.bump(); // ':'
                    return match self.cur().token {
                        Token::While => self.parse_while(Some(name)),
                        Token::For => self.parse_for(Some(name)),
                        _ => Err(self.err_unexpected("while or for after label")),
                    };
                }
                let expr = self.parse_expr()?;
                self.eat(&Token::Semicolon);
                Ok(Stmt::Expr(expr))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.eat(&Token::Semicolon);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn peek_is_colon(&self) -> bool {
        self.tokens.get(self.pos + 1).map(|t| t.token == Token::Colon).unwrap_or(false)
    }

    fn parse_optional_label(&mut self) -> Option<Symbol> {
        if let Token::Ident(s) = self.cur().token.clone() {
            self.bump();
            Some(s)
        } else {
            None
        }
    }

    fn parse_var_decl(&mut self, kind: DeclKind) -> Result<Stmt> {
        let span = self.cur_span();
        self.bump(); // var/const
        let name = self.parse_ident_name()?;
        let init = if self.eat(&Token::Eq) { Some(self.parse_expr()?) } else { None };
        self.eat(&Token::Semicolon);
        Ok(Stmt::VarDecl { kind, name, init, span })
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.bump(); // if
        self.expect(Token::LParen, "(")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, ")")?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn parse_while(&mut self, label: Option<Symbol>) -> Result<Stmt> {
        self.bump(); // while
        self.expect(Token::LParen, "(")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, ")")?;
        let body = self.parse_block()?;
        Ok(Stmt::While { label, cond, body })
    }

    /// Disambiguates C-style `for (init; cond; step)` from `for (var k, v in obj)`
    /// by scanning for `in` before the first `;`.
    fn parse_for(&mut self, label: Option<Symbol>) -> Result<Stmt> {
        self.bump(); // for
        self.expect(Token::LParen, "(")?;

        if self.check(&Token::Var) || self.check(&Token::Const) {
            let save = self.pos;
            self.bump();
            let first = self.parse_ident_name();
            if let Ok(first) = first {
                if self.eat(&Token::Comma) {
                    let value = self.parse_ident_name()?;
                    self.expect(Token::In, "in")?;
                    let iter = self.parse_expr()?;
                    self.expect(Token::RParen, ")")?;
                    let body = self.parse_block()?;
                    return Ok(Stmt::ForIn { label, key: Some(first), value, iter, body });
                }
                if self.eat(&Token::In) {
                    let iter = self.parse_expr()?;
                    self.expect(Token::RParen, ")")?;
                    let body = self.parse_block()?;
                    return Ok(Stmt::ForIn { label, key: None, value: first, iter, body });
                }
            }
            self.pos = save;
        }

        let init = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_stmt_no_semi()?))
        };
        self.expect(Token::Semicolon, ";")?;
        let cond = if self.check(&Token::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(Token::Semicolon, ";")?;
        let step = if self.check(&Token::RParen) { None } else { Some(self.parse_expr()?) };
        self.expect(Token::RParen, ")")?;
        let body = self.parse_block()?;
        Ok(Stmt::For { label, init, cond, step, body })
    }

    /// Like [`Self::parse_stmt`] but for the `for(...)` init clause, which
    /// has no trailing semicolon of its own (the `for` loop's own `;`
    /// terminates it).
    fn parse_stmt_no_semi(&mut self) -> Result<Stmt> {
        match self.cur().token.clone() {
            Token::Var | Token::Const => {
                let kind = if matches!(self.cur().token, Token::Var) { DeclKind::Var } else { DeclKind::Const };
                let span = self.cur_span();
                self.bump();
                let name = self.parse_ident_name()?;
                let init = if self.eat(&Token::Eq) { Some(self.parse_expr()?) } else { None };
                Ok(Stmt::VarDecl { kind, name, init, span })
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }
}
