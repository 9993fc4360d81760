//! Expression parsing: precedence-climbing over `faxc-lex` tokens,
//! assignment as the lowest-precedence (right-associative) level, then
//! logical or/and, equality, relational (`in`/`is`/`instanceof` share a
//! level with comparisons), bitwise or/xor/and, shift, additive,
//! multiplicative, unary, and postfix (call/index/field, each with an
//! optional-chaining `?`-prefixed variant).

use faxc_lex::Token;
use faxc_util::Symbol;

use crate::ast::*;
use crate::{ParseError, Parser, Result};

impl Parser {
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let target = self.parse_logical_or()?;
        if self.check(&Token::Eq) {
            let span = self.cur_span();
            self.bump();
            let value = self.parse_assignment()?;
            if !is_lvalue(&target) {
                return Err(ParseError::BadAssignTarget { line: span.line, column: span.column });
            }
            return Ok(Expr::Assign { target: Box::new(target), value: Box::new(value), span });
        }
        Ok(target)
    }

    fn parse_logical_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.check(&Token::OrOr) {
            let span = self.cur_span();
            self.bump();
            let right = self.parse_logical_and()?;
            left = Expr::Logical { op: LogicalOp::Or, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.check(&Token::AndAnd) {
            let span = self.cur_span();
            self.bump();
            let right = self.parse_equality()?;
            left = Expr::Logical { op: LogicalOp::And, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.cur().token {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::Ne,
                _ => break,
            };
            let span = self.cur_span();
            self.bump();
            let right = self.parse_relational()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitor()?;
        loop {
            let span = self.cur_span();
            match self.cur().token {
                Token::Lt => {
                    self.bump();
                    let right = self.parse_bitor()?;
                    left = Expr::Binary { op: BinOp::Lt, left: Box::new(left), right: Box::new(right), span };
                }
                Token::Gt => {
                    self.bump();
                    let right = self.parse_bitor()?;
                    left = Expr::Binary { op: BinOp::Gt, left: Box::new(left), right: Box::new(right), span };
                }
                Token::LtEq => {
                    self.bump();
                    let right = self.parse_bitor()?;
                    left = Expr::Binary { op: BinOp::Le, left: Box::new(left), right: Box::new(right), span };
                }
                Token::GtEq => {
                    self.bump();
                    let right = self.parse_bitor()?;
                    left = Expr::Binary { op: BinOp::Ge, left: Box::new(left), right: Box::new(right), span };
                }
                Token::In => {
                    self.bump();
                    let obj = self.parse_bitor()?;
                    left = Expr::In { key: Box::new(left), obj: Box::new(obj), span };
                }
                Token::Is | Token::Instanceof => {
                    self.bump();
                    let proto = self.parse_bitor()?;
                    left = Expr::InstanceOf { value: Box::new(left), proto: Box::new(proto), span };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_bitor(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitxor()?;
        while self.check(&Token::Pipe) {
            let span = self.cur_span();
            self.bump();
            let right = self.parse_bitxor()?;
            left = Expr::Binary { op: BinOp::BitOr, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitand()?;
        while self.check(&Token::Caret) {
            let span = self.cur_span();
            self.bump();
            let right = self.parse_bitand()?;
            left = Expr::Binary { op: BinOp::BitXor, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> Result<Expr> {
        let mut left = self.parse_shift()?;
        while self.check(&Token::Amp) {
            let span = self.cur_span();
            self.bump();
            let right = self.parse_shift()?;
            left = Expr::Binary { op: BinOp::BitAnd, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let span = self.cur_span();
            let op = match self.cur().token {
                Token::Shl => BinOp::Shl,
                Token::Shr => BinOp::Shr,
                _ => break,
            };
            self.bump();
            let right = self.parse_additive()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let span = self.cur_span();
            let op = match self.cur().token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let span = self.cur_span();
            let op = match self.cur().token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let right = self.parse_unary()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let span = self.cur_span();
        let op = match self.cur().token {
            Token::Minus => Some(UnOp::Neg),
            Token::Bang => Some(UnOp::Not),
            Token::Tilde => Some(UnOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary { op, expr: Box::new(expr), span });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let span = self.cur_span();
            match self.cur().token {
                Token::Dot => {
                    self.bump();
                    let name = self.parse_ident_name()?;
                    expr = Expr::Field { obj: Box::new(expr), name, optional: false, span };
                }
                Token::QuestionDot => {
                    self.bump();
                    let name = self.parse_ident_name()?;
                    expr = Expr::Field { obj: Box::new(expr), name, optional: true, span };
                }
                Token::LParen => {
                    let args = self.parse_call_args()?;
                    expr = Expr::Call { callee: Box::new(expr), args, optional: false, span };
                }
                Token::QuestionLParen => {
                    let args = self.parse_call_args()?;
                    expr = Expr::Call { callee: Box::new(expr), args, optional: true, span };
                }
                Token::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket, "]")?;
                    expr = Expr::Index { obj: Box::new(expr), index: Box::new(index), optional: false, span };
                }
                Token::QuestionLBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket, "]")?;
                    expr = Expr::Index { obj: Box::new(expr), index: Box::new(index), optional: true, span };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Parses the `(args)` of a call; the opening paren may be plain or
    /// the optional-call variant, already consumed by the caller's match
    /// arm lookahead — both tokens land here un-consumed, so consume
    /// whichever is current.
    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        self.bump(); // '(' or '?('
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, ")")?;
        Ok(args)
    }

    fn parse_ident_name(&mut self) -> Result<Symbol> {
        match self.cur().token.clone() {
            Token::Ident(s) => {
                self.bump();
                Ok(s)
            }
            _ => Err(self.err_unexpected("identifier")),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.cur_span();
        match self.cur().token.clone() {
            Token::Int(n) => {
                self.bump();
                Ok(Expr::Int(n, span))
            }
            Token::Float(f) => {
                self.bump();
                Ok(Expr::Float(f, span))
            }
            Token::Str(s) => {
                self.bump();
                Ok(Expr::Str(s, span))
            }
            Token::True => {
                self.bump();
                Ok(Expr::Bool(true, span))
            }
            Token::False => {
                self.bump();
                Ok(Expr::Bool(false, span))
            }
            Token::Null => {
                self.bump();
                Ok(Expr::Null(span))
            }
            Token::This => {
                self.bump();
                Ok(Expr::This(span))
            }
            Token::Ident(s) => {
                self.bump();
                Ok(Expr::Ident(s, span))
            }
            Token::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, ")")?;
                Ok(inner)
            }
            Token::LBracket => {
                self.bump();
                let mut elems = Vec::new();
                if !self.check(&Token::RBracket) {
                    loop {
                        elems.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket, "]")?;
                Ok(Expr::Array(elems, span))
            }
            Token::LBrace => {
                let fields = self.parse_object_body()?;
                Ok(Expr::Object(fields, span))
            }
            Token::New => {
                self.bump();
                let proto = self.parse_postfix_no_call()?;
                let body = if self.check(&Token::LBrace) {
                    self.parse_object_body()?
                } else {
                    Vec::new()
                };
                Ok(Expr::New { proto: Box::new(proto), body, span })
            }
            Token::Function => {
                self.bump();
                let lit = self.parse_function_tail(false)?;
                Ok(Expr::Function(Box::new(lit)))
            }
            Token::Method => {
                self.bump();
                let lit = self.parse_function_tail(true)?;
                Ok(Expr::Function(Box::new(lit)))
            }
            _ => Err(self.err_unexpected("expression")),
        }
    }

    /// `new`'s prototype operand: an identifier or a field-access chain,
    /// but not itself a call — `new Foo.Bar { .. }`'s body must not be
    /// mistaken for call arguments.
    fn parse_postfix_no_call(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let span = self.cur_span();
            match self.cur().token {
                Token::Dot => {
                    self.bump();
                    let name = self.parse_ident_name()?;
                    expr = Expr::Field { obj: Box::new(expr), name, optional: false, span };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `{ name: type = value; ... }` / `{ name = value; ... }` body shared
    /// by object literals and `new`'s optional body.
    pub(crate) fn parse_object_body(&mut self) -> Result<Vec<ObjectField>> {
        self.expect(Token::LBrace, "{")?;
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) {
            let span = self.cur_span();
            let name = self.parse_ident_name()?;
            let constraint = if self.eat(&Token::Colon) { Some(self.parse_expr()?) } else { None };
            self.expect(Token::Eq, "=")?;
            let value = self.parse_expr()?;
            self.eat(&Token::Semicolon);
            fields.push(ObjectField { name, constraint, value, span });
        }
        self.expect(Token::RBrace, "}")?;
        Ok(fields)
    }

    pub(crate) fn parse_function_tail(&mut self, is_method: bool) -> Result<FunctionLit> {
        let span = self.cur_span();
        let name = if let Token::Ident(s) = self.cur().token.clone() {
            self.bump();
            Some(s)
        } else {
            None
        };
        self.expect(Token::LParen, "(")?;
        let mut params = Vec::new();
        let mut variadic_tail = false;
        if !self.check(&Token::RParen) {
            loop {
                let p = self.parse_ident_name()?;
                params.push(p);
                if self.eat(&Token::Dot) && self.eat(&Token::Dot) {
                    // `...` variadic tail marker: the final parameter
                    // binds the excess actuals as an array.
                    self.eat(&Token::Dot);
                    variadic_tail = true;
                    break;
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, ")")?;
        let body = self.parse_block()?;
        Ok(FunctionLit { name, params, variadic_tail, body, is_method, span })
    }
}

fn is_lvalue(expr: &Expr) -> bool {
    matches!(expr, Expr::Ident(..) | Expr::Field { .. } | Expr::Index { .. })
}
