//! Recursive-descent parser producing a [`crate::ast::Root`] from `.vs`
//! source text. See §4.1 of the specification for the grammar sketch and
//! the variadic-collapsing / precedence rules this implements.

use std::path::{Path, PathBuf};

use crate::ast::*;
use crate::config::{comparison_operator_function, logical_operator_function, math_operator_function};
use crate::error::{CompileError, ErrorKind};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::preparse::pre_parse_checks;
use crate::span::Span;

pub fn parse(source: &str, file_path: &Path) -> Result<Root, CompileError> {
    pre_parse_checks(source, file_path)?;
    let tokens = Lexer::new(source, file_path).tokenize()?;
    Parser::new(tokens, file_path.to_path_buf()).parse_root()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: PathBuf,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: PathBuf) -> Self {
        Self { tokens, pos: 0, file }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span.clone()
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, CompileError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::at(
            ErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: token_desc(self.peek()),
            },
            self.peek_span(),
        )
    }

    fn ident(&mut self) -> Result<(String, Span), CompileError> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    pub fn parse_root(&mut self) -> Result<Root, CompileError> {
        let mut imports = Vec::new();
        let mut directives = Vec::new();
        let mut execution_steps = Vec::new();
        let mut function_definitions = Vec::new();

        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::At => {
                    let start = self.peek_span();
                    self.advance();
                    let (name, _) = self.ident()?;
                    if name == "import" {
                        let path_span = self.peek_span();
                        let path = match self.peek().clone() {
                            TokenKind::String(s) => {
                                self.advance();
                                s
                            }
                            _ => return Err(self.unexpected("a string literal path")),
                        };
                        imports.push(Import { path, span: join(&start, &path_span) });
                    } else if self.check(&TokenKind::Equals) {
                        self.advance();
                        let value = self.parse_expr()?;
                        let span = join(&start, value.span());
                        directives.push(Directive { name, value: Some(value), span });
                    } else {
                        directives.push(Directive { name, value: None, span: start });
                    }
                }
                TokenKind::Func => {
                    function_definitions.push(self.parse_function_def()?);
                }
                TokenKind::Let => {
                    execution_steps.push(self.parse_let_statement()?);
                }
                _ => return Err(self.unexpected("'@', 'func', or 'let'")),
            }
        }

        Ok(Root { file_path: self.file.clone(), imports, directives, execution_steps, function_definitions })
    }

    fn parse_function_def(&mut self) -> Result<FunctionDef, CompileError> {
        let start = self.peek_span();
        self.advance(); // 'func'
        let (name, _) = self.ident()?;
        self.eat(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (pname, pspan) = self.ident()?;
                self.eat(&TokenKind::Colon, "':'")?;
                let (ptype, tspan) = self.ident()?;
                params.push(Parameter { name: pname, type_name: ptype, span: join(&pspan, &tspan) });
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat(&TokenKind::RParen, "')'")?;
        self.eat(&TokenKind::Arrow, "'->'")?;
        let return_types = self.parse_return_type_list()?;
        self.eat(&TokenKind::LBrace, "'{'")?;

        let mut docstring = None;
        if let TokenKind::DocString(text) = self.peek().clone() {
            docstring = Some(text);
            self.advance();
        }

        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Return) {
                body.push(self.parse_return_statement()?);
            } else {
                body.push(self.parse_let_statement()?);
            }
        }
        let end = self.peek_span();
        self.eat(&TokenKind::RBrace, "'}'")?;

        Ok(FunctionDef { name, params, return_types, docstring, body, span: join(&start, &end) })
    }

    fn parse_return_type_list(&mut self) -> Result<Vec<String>, CompileError> {
        if self.check(&TokenKind::LParen) {
            self.advance();
            let mut types = Vec::new();
            loop {
                let (t, _) = self.ident()?;
                types.push(t);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.eat(&TokenKind::RParen, "')'")?;
            Ok(types)
        } else {
            let (t, _) = self.ident()?;
            Ok(vec![t])
        }
    }

    fn parse_return_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.peek_span();
        self.advance(); // 'return'
        let mut values = vec![self.parse_expr()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            values.push(self.parse_expr()?);
        }
        let span = join(&start, values.last().unwrap().span());
        Ok(Statement::Return { values, span })
    }

    fn parse_let_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.peek_span();
        self.advance(); // 'let'
        let mut targets = vec![self.ident()?.0];
        while self.check(&TokenKind::Comma) {
            self.advance();
            targets.push(self.ident()?.0);
        }
        self.eat(&TokenKind::Equals, "'='")?;
        let expr = self.parse_expr()?;
        let span = join(&start, expr.span());

        Ok(match expr {
            Expr::Literal(value, _) if targets.len() == 1 => {
                Statement::LiteralAssignment { targets, value, span }
            }
            Expr::Conditional { condition, then_expr, else_expr, .. } if targets.len() == 1 => {
                Statement::ConditionalAssignment {
                    target: targets.into_iter().next().unwrap(),
                    condition: *condition,
                    then_expr: *then_expr,
                    else_expr: *else_expr,
                    span,
                }
            }
            expr if targets.len() > 1 => Statement::MultiAssignment { targets, expr, span },
            expr => Statement::ExecutionAssignment { targets, expr, span },
        })
    }

    // Precedence (low -> high): or < and < not < comparisons < + - < * / < ^ (right) < unary < atom
    pub fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expr, CompileError> {
        if self.check(&TokenKind::If) {
            let start = self.peek_span();
            self.advance();
            let condition = self.parse_or()?;
            self.eat(&TokenKind::Then, "'then'")?;
            let then_expr = self.parse_conditional()?;
            self.eat(&TokenKind::Else, "'else'")?;
            let else_expr = self.parse_conditional()?;
            let span = join(&start, else_expr.span());
            Ok(Expr::Conditional {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
                span,
            })
        } else {
            self.parse_or()
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        self.parse_variadic_chain(&TokenKind::Or, "or", Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        self.parse_variadic_chain(&TokenKind::And, "and", Self::parse_not)
    }

    fn parse_variadic_chain(
        &mut self,
        op_token: &TokenKind,
        func: &str,
        mut next: impl FnMut(&mut Self) -> Result<Expr, CompileError>,
    ) -> Result<Expr, CompileError> {
        let first = next(self)?;
        if !self.check(op_token) {
            return Ok(first);
        }
        let mut args = vec![first];
        while self.check(op_token) {
            self.advance();
            args.push(next(self)?);
        }
        let span = join(args.first().unwrap().span(), args.last().unwrap().span());
        Ok(Expr::Call {
            function: logical_operator_function(func).unwrap().to_string(),
            args,
            span,
        })
    }

    fn parse_not(&mut self) -> Result<Expr, CompileError> {
        if self.check(&TokenKind::Not) {
            let start = self.peek_span();
            self.advance();
            let operand = self.parse_not()?;
            let span = join(&start, operand.span());
            Ok(Expr::Call { function: "__not__".to_string(), args: vec![operand], span })
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            TokenKind::EqEq => Some("=="),
            TokenKind::NotEq => Some("!="),
            TokenKind::Gt => Some(">"),
            TokenKind::Lt => Some("<"),
            TokenKind::Gte => Some(">="),
            TokenKind::Lte => Some("<="),
            _ => None,
        };
        let Some(op) = op else { return Ok(lhs) };
        self.advance();
        let rhs = self.parse_additive()?;
        let span = join(lhs.span(), rhs.span());
        Ok(Expr::Call {
            function: comparison_operator_function(op).unwrap().to_string(),
            args: vec![lhs, rhs],
            span,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        self.parse_math_chain(&[TokenKind::Plus, TokenKind::Minus], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        self.parse_math_chain(&[TokenKind::Star, TokenKind::Slash], Self::parse_power)
    }

    /// `+`/`-` and `*`/`/` share this: same-operator runs collapse into one
    /// N-ary `add`/`multiply` call; a differing operator (or a `-`/`/`) ends
    /// the run and folds normally as a binary op against the accumulator.
    fn parse_math_chain(
        &mut self,
        tokens: &[TokenKind; 2],
        mut next: impl FnMut(&mut Self) -> Result<Expr, CompileError>,
    ) -> Result<Expr, CompileError> {
        let mut acc = next(self)?;
        loop {
            let op_str = if self.check(&tokens[0]) {
                token_symbol(&tokens[0])
            } else if self.check(&tokens[1]) {
                token_symbol(&tokens[1])
            } else {
                break;
            };
            // Collect a run of the *same* operator for variadic collapsing.
            let mut run = vec![acc.clone()];
            let mut run_op = op_str;
            loop {
                if !self.check_symbol(run_op) {
                    break;
                }
                self.advance();
                run.push(next(self)?);
                if !self.check_symbol(run_op) {
                    break;
                }
            }
            let func = math_operator_function(run_op).unwrap();
            let span = join(run.first().unwrap().span(), run.last().unwrap().span());
            if run.len() > 2 && matches!(func, "add" | "multiply") {
                acc = Expr::Call { function: func.to_string(), args: run, span };
            } else {
                // Left-fold binary chain for subtract/divide or a 2-element run.
                let mut iter = run.into_iter();
                let mut lhs = iter.next().unwrap();
                for rhs in iter {
                    let s = join(lhs.span(), rhs.span());
                    lhs = Expr::Call { function: func.to_string(), args: vec![lhs, rhs], span: s };
                }
                acc = lhs;
            }
        }
        Ok(acc)
    }

    fn check_symbol(&self, sym: &str) -> bool {
        match sym {
            "+" => self.check(&TokenKind::Plus),
            "-" => self.check(&TokenKind::Minus),
            "*" => self.check(&TokenKind::Star),
            "/" => self.check(&TokenKind::Slash),
            _ => false,
        }
    }

    fn parse_power(&mut self) -> Result<Expr, CompileError> {
        let base = self.parse_unary()?;
        if self.check(&TokenKind::Caret) {
            self.advance();
            let exponent = self.parse_power()?; // right-associative
            let span = join(base.span(), exponent.span());
            Ok(Expr::Call { function: "power".to_string(), args: vec![base, exponent], span })
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.check(&TokenKind::Minus) {
            let start = self.peek_span();
            self.advance();
            let operand = self.parse_unary()?;
            let span = join(&start, operand.span());
            Ok(Expr::Call {
                function: "subtract".to_string(),
                args: vec![Expr::Literal(Literal::Number(0.0), start.clone()), operand],
                span,
            })
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.check(&TokenKind::LBracket) {
                let bracket_start = self.peek_span();
                self.advance();
                if self.check(&TokenKind::Colon) {
                    self.advance();
                    let index = self.parse_expr()?;
                    let end = self.peek_span();
                    self.eat(&TokenKind::RBracket, "']'")?;
                    let span = join(expr.span(), &join(&bracket_start, &end));
                    expr = Expr::DeleteElement { target: Box::new(expr), index: Box::new(index), span };
                } else {
                    let index = self.parse_expr()?;
                    let end = self.peek_span();
                    self.eat(&TokenKind::RBracket, "']'")?;
                    let span = join(expr.span(), &end);
                    expr = Expr::ElementAccess { target: Box::new(expr), index: Box::new(index), span };
                }
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, CompileError> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n), span))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false), span))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                let end = self.peek_span();
                self.eat(&TokenKind::RBracket, "']'")?;
                Ok(Expr::Vector(items, join(&span, &end)))
            }
            TokenKind::LParen => {
                self.advance();
                let first = self.parse_expr()?;
                if self.check(&TokenKind::Comma) {
                    let mut items = vec![first];
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        items.push(self.parse_expr()?);
                    }
                    let end = self.peek_span();
                    self.eat(&TokenKind::RParen, "')'")?;
                    Ok(Expr::Tuple(items, join(&span, &end)))
                } else {
                    self.eat(&TokenKind::RParen, "')'")?;
                    Ok(first)
                }
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(&TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    let end = self.peek_span();
                    self.eat(&TokenKind::RParen, "')'")?;
                    Ok(Expr::Call { function: name, args, span: join(&span, &end) })
                } else {
                    Ok(Expr::Identifier(name, span))
                }
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

fn join(a: &Span, b: &Span) -> Span {
    Span::new(a.file.clone(), a.start_line, a.start_col, b.end_line, b.end_col)
}

fn token_symbol(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        _ => unreachable!(),
    }
}

fn token_desc(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("{n}"),
        TokenKind::String(s) => format!("\"{s}\""),
        TokenKind::DocString(_) => "a docstring".to_string(),
        TokenKind::Identifier(s) => s.clone(),
        TokenKind::Eof => "end of file".to_string(),
        other => format!("{other:?}"),
    }
}
