use super::{ParseResult, Parser};
use crate::ast::{
    ArrayItem, BinaryOp, CallArg, CompClause, Expr, ExprKind, IfBranch, LogicalOp, MatchArm,
    ObjectEntry, Param, PipeTarget, StrPart, UnaryOp,
};
use crate::token::{Loc, TokenKind};

impl<'a, 'int> Parser<'a, 'int> {
    pub(super) fn parse_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        if self.check(TokenKind::Yield) {
            let loc = self.loc();
            self.advance();
            let delegate = self.eat(TokenKind::Star);
            let value = if self.expr_starts_here() {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(self.ctx.expr(ExprKind::Yield { value, delegate }, loc));
        }
        self.parse_pipe()
    }

    fn expr_starts_here(&self) -> bool {
        use TokenKind::*;
        let kind = self.peek().kind;
        kind.is_ident_like()
            || matches!(
                kind,
                Int | Float | Str | StrStart | RawStr | Regex | True | False | Nil | LParen
                    | LBracket | LBrace | Minus | Bang | Not | Fn | Async | Match | If | Await | Lt
            )
    }

    // -- precedence ladder --------------------------------------------------

    fn parse_pipe(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_coalesce()?;
        while self.check(TokenKind::PipeOp) {
            let loc = self.loc();
            self.advance();
            let target = if self.check(TokenKind::Dot) {
                self.advance();
                let name = self.expect_ident("method name after '|> .'")?;
                let args = if self.check(TokenKind::LParen) {
                    self.advance();
                    self.parse_call_args()?
                } else {
                    Vec::new()
                };
                PipeTarget::Method { name, args }
            } else {
                let rhs = self.parse_coalesce()?;
                match rhs.kind {
                    ExprKind::Call { .. } => PipeTarget::Call(rhs),
                    _ => PipeTarget::Bare(rhs),
                }
            };
            left = self.ctx.expr(ExprKind::Pipe { value: left, target }, loc);
        }
        Ok(left)
    }

    fn parse_coalesce(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_or()?;
        while self.check(TokenKind::QuestionQuestion) {
            let loc = self.loc();
            self.advance();
            let right = self.parse_or()?;
            left = self.ctx.expr(ExprKind::Logical { op: LogicalOp::Coalesce, left, right }, loc);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) || self.check(TokenKind::BarBar) {
            let loc = self.loc();
            self.advance();
            let right = self.parse_and()?;
            left = self.ctx.expr(ExprKind::Logical { op: LogicalOp::Or, left, right }, loc);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_not()?;
        while self.check(TokenKind::And) || self.check(TokenKind::AmpAmp) {
            let loc = self.loc();
            self.advance();
            let right = self.parse_not()?;
            left = self.ctx.expr(ExprKind::Logical { op: LogicalOp::And, left, right }, loc);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<&'a Expr<'a>> {
        if self.check(TokenKind::Not) {
            let loc = self.loc();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(self.ctx.expr(ExprKind::Unary { op: UnaryOp::Not, operand }, loc));
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        match self.peek().kind {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        }
    }

    /// Equality and ordering share one level so `a < b < c` folds into a
    /// single chain evaluated left-to-right.
    fn parse_comparison(&mut self) -> ParseResult<&'a Expr<'a>> {
        let first = self.parse_range()?;
        let mut rest: Vec<(BinaryOp, &'a Expr<'a>)> = Vec::new();
        let loc = self.loc();
        while let Some(op) = self.comparison_op() {
            self.advance();
            let operand = self.parse_range()?;
            rest.push((op, operand));
        }
        Ok(match rest.len() {
            0 => first,
            1 => {
                let (op, right) = rest.into_iter().next().expect("one comparison");
                self.ctx.expr(ExprKind::Binary { op, left: first, right }, loc)
            }
            _ => self.ctx.expr(ExprKind::ChainedCmp { first, rest }, loc),
        })
    }

    fn parse_range(&mut self) -> ParseResult<&'a Expr<'a>> {
        let start = self.parse_additive()?;
        if self.check(TokenKind::DotDot) || self.check(TokenKind::DotDotEq) {
            let loc = self.loc();
            let inclusive = self.check(TokenKind::DotDotEq);
            self.advance();
            let end = self.parse_additive()?;
            return Ok(self.ctx.expr(ExprKind::Range { start, end, inclusive }, loc));
        }
        Ok(start)
    }

    fn parse_additive(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                TokenKind::PlusPlus => BinaryOp::Concat,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.ctx.expr(ExprKind::Binary { op, left, right }, loc);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let right = self.parse_unary()?;
            left = self.ctx.expr(ExprKind::Binary { op, left, right }, loc);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<&'a Expr<'a>> {
        let loc = self.loc();
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.ctx.expr(ExprKind::Unary { op: UnaryOp::Neg, operand }, loc))
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.ctx.expr(ExprKind::Unary { op: UnaryOp::Not, operand }, loc))
            }
            TokenKind::Await => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.ctx.expr(ExprKind::Await(operand), loc))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> ParseResult<&'a Expr<'a>> {
        let base = self.parse_postfix()?;
        if self.check(TokenKind::StarStar) {
            let loc = self.loc();
            self.advance();
            // Right-associative: descend through unary so `2 ** -x ** 3`
            // groups as `2 ** (-(x ** 3))`.
            let right = self.parse_unary()?;
            return Ok(self.ctx.expr(ExprKind::Binary { op: BinaryOp::Pow, left: base, right }, loc));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    let loc = self.loc();
                    self.advance();
                    let args = self.parse_call_args()?;
                    let args = self.apply_implicit_it(args);
                    expr = self.ctx.expr(ExprKind::Call { callee: expr, args }, loc);
                }
                TokenKind::Dot => {
                    let loc = self.loc();
                    self.advance();
                    let property = self.expect_ident("property name after '.'")?;
                    expr = self.ctx.expr(
                        ExprKind::Member { object: expr, property, optional: false },
                        loc,
                    );
                }
                TokenKind::QuestionDot => {
                    let loc = self.loc();
                    self.advance();
                    let property = self.expect_ident("property name after '?.'")?;
                    expr = self.ctx.expr(
                        ExprKind::Member { object: expr, property, optional: true },
                        loc,
                    );
                }
                TokenKind::LBracket => {
                    let loc = self.loc();
                    self.advance();
                    expr = self.parse_index_or_slice(expr, loc)?;
                }
                TokenKind::Question => {
                    let loc = self.loc();
                    self.advance();
                    expr = self.ctx.expr(ExprKind::Propagate(expr), loc);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_index_or_slice(&mut self, object: &'a Expr<'a>, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        let start = if self.check(TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        if self.eat(TokenKind::RBracket) {
            let index = start.ok_or_else(|| self.error_here("expected index expression".into()))?;
            return Ok(self.ctx.expr(ExprKind::Index { object, index }, loc));
        }
        self.expect(TokenKind::Colon, "':' in slice")?;
        let end = if self.check(TokenKind::Colon) || self.check(TokenKind::RBracket) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let step = if self.eat(TokenKind::Colon) {
            if self.check(TokenKind::RBracket) {
                None
            } else {
                Some(self.parse_expr()?)
            }
        } else {
            None
        };
        self.expect(TokenKind::RBracket, "']' to close slice")?;
        Ok(self.ctx.expr(ExprKind::Slice { object, start, end, step }, loc))
    }

    pub(super) fn parse_call_args(&mut self) -> ParseResult<Vec<CallArg<'a>>> {
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
            if self.check(TokenKind::Spread) {
                self.advance();
                args.push(CallArg::Spread(self.parse_expr()?));
            } else if self.check_ident() && self.peek_at(1).kind == TokenKind::Colon {
                let name = self.advance().lexeme;
                self.advance();
                args.push(CallArg::Named { name, value: self.parse_expr()? });
            } else {
                args.push(CallArg::Positional(self.parse_expr()?));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' to close argument list")?;
        Ok(args)
    }

    // -- implicit `it` ------------------------------------------------------

    /// Wraps call arguments that mention a free `it` in a unary lambda.
    /// Bare `it` and arguments that already are lambdas stay untouched, so
    /// the transformation is idempotent.
    fn apply_implicit_it(&mut self, args: Vec<CallArg<'a>>) -> Vec<CallArg<'a>> {
        let it = self.interner.intern("it");
        args.into_iter()
            .map(|arg| {
                let expr = arg.expr();
                let is_bare_it = matches!(expr.kind, ExprKind::Ident(sym) if sym == it);
                let is_lambda = matches!(expr.kind, ExprKind::Lambda { .. });
                if is_bare_it || is_lambda || !references_free_it(expr, it) {
                    return arg;
                }
                let loc = expr.loc;
                let wrap = |parser: &Parser<'a, 'int>, body: &'a Expr<'a>| {
                    parser.ctx.expr(
                        ExprKind::Lambda {
                            params: vec![Param { name: it, ty: None, default: None, rest: false, loc }],
                            body,
                            is_async: false,
                        },
                        loc,
                    )
                };
                match arg {
                    CallArg::Positional(e) => CallArg::Positional(wrap(self, e)),
                    CallArg::Spread(e) => CallArg::Spread(e),
                    CallArg::Named { name, value } => CallArg::Named { name, value: wrap(self, value) },
                }
            })
            .collect()
    }

    // -- primaries ----------------------------------------------------------

    fn parse_primary(&mut self) -> ParseResult<&'a Expr<'a>> {
        let loc = self.loc();
        match self.peek().kind {
            TokenKind::Int => {
                let tok = self.advance();
                let text = self.interner.resolve(tok.lexeme);
                let value = parse_int_text(text);
                Ok(self.ctx.expr(ExprKind::Int(value), loc))
            }
            TokenKind::Float => {
                let tok = self.advance();
                let value: f64 = self.interner.resolve(tok.lexeme).parse().unwrap_or(0.0);
                Ok(self.ctx.expr(ExprKind::Float(value), loc))
            }
            TokenKind::Str => {
                let tok = self.advance();
                Ok(self.ctx.expr(ExprKind::Str(vec![StrPart::Text(tok.lexeme)]), loc))
            }
            TokenKind::StrStart => self.parse_template(loc),
            TokenKind::RawStr => {
                let tok = self.advance();
                Ok(self.ctx.expr(ExprKind::RawStr(tok.lexeme), loc))
            }
            TokenKind::Regex => {
                let tok = self.advance();
                let raw = self.interner.resolve(tok.lexeme).to_string();
                let (pattern, flags) = split_regex(&raw);
                let pattern = self.interner.intern(&pattern);
                let flags = self.interner.intern(&flags);
                Ok(self.ctx.expr(ExprKind::Regex { pattern, flags }, loc))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::Bool(true), loc))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::Bool(false), loc))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::Nil, loc))
            }
            TokenKind::Fn => self.parse_fn_lambda(false, loc),
            TokenKind::Async => {
                self.advance();
                if !self.check(TokenKind::Fn) {
                    return Err(self.error_here("expected 'fn' after 'async' in lambda".into()));
                }
                self.parse_fn_lambda(true, loc)
            }
            TokenKind::Match => self.parse_match(loc),
            TokenKind::If => self.parse_if_expr(loc),
            TokenKind::LParen => self.parse_paren(loc),
            TokenKind::LBracket => self.parse_array(loc),
            TokenKind::LBrace => self.parse_object(loc),
            TokenKind::Lt if self.looks_like_jsx() => self.parse_jsx_element(),
            kind if kind.is_ident_like() => {
                let tok = self.advance();
                Ok(self.ctx.expr(ExprKind::Ident(tok.lexeme), loc))
            }
            _ => Err(self.error_here(format!("expected expression, found '{}'", self.describe_current()))),
        }
    }

    fn parse_template(&mut self, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        let parts = self.parse_template_parts()?;
        Ok(self.ctx.expr(ExprKind::Str(parts), loc))
    }

    /// Consumes a `StrStart … StrEnd` sequence into text and expression
    /// parts. Shared with JSX attribute values.
    pub(super) fn parse_template_parts(&mut self) -> ParseResult<Vec<StrPart<'a>>> {
        let mut parts = Vec::new();
        let start = self.advance();
        parts.push(StrPart::Text(start.lexeme));
        loop {
            parts.push(StrPart::Expr(self.parse_expr()?));
            match self.peek().kind {
                TokenKind::StrMid => {
                    let tok = self.advance();
                    parts.push(StrPart::Text(tok.lexeme));
                }
                TokenKind::StrEnd => {
                    let tok = self.advance();
                    parts.push(StrPart::Text(tok.lexeme));
                    break;
                }
                _ => {
                    return Err(self.error_here("unterminated string interpolation".into()));
                }
            }
        }
        Ok(parts)
    }

    /// `fn(a, b) expr` / `fn(a, b) { … }` lambda form.
    fn parse_fn_lambda(&mut self, is_async: bool, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        self.expect(TokenKind::Fn, "'fn'")?;
        self.expect(TokenKind::LParen, "'(' after 'fn'")?;
        let params = self.parse_params()?;
        let body = if self.check(TokenKind::LBrace) {
            self.parse_block_expr()?
        } else {
            self.parse_lambda_stmt_expr()?
        };
        Ok(self.ctx.expr(ExprKind::Lambda { params, body, is_async }, loc))
    }

    /// Lambda bodies admit assignment statements (`() => count += 1`); the
    /// statement wraps into a one-element block.
    fn parse_lambda_stmt_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        let loc = self.loc();
        let checkpoint = self.current;
        let first = self.parse_expr()?;
        let continues_as_assignment = matches!(
            self.peek().kind,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
        );
        if continues_as_assignment {
            self.current = checkpoint;
            let stmt = self.parse_statement()?;
            return Ok(self.ctx.expr(ExprKind::Block(vec![stmt]), loc));
        }
        Ok(first)
    }

    pub(super) fn parse_params(&mut self) -> ParseResult<Vec<Param<'a>>> {
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
            let loc = self.loc();
            let rest = self.eat(TokenKind::Spread);
            let name = self.expect_ident("parameter name")?;
            let ty = if self.eat(TokenKind::Colon) {
                Some(self.parse_type_text()?)
            } else {
                None
            };
            let default = if self.eat(TokenKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(Param { name, ty, default, rest, loc });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' to close parameter list")?;
        Ok(params)
    }

    pub(super) fn parse_match(&mut self, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        self.expect(TokenKind::Match, "'match'")?;
        let subject = self.parse_expr()?;
        self.expect(TokenKind::LBrace, "'{' to open match arms")?;
        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let arm_loc = self.loc();
            let pattern = self.parse_pattern()?;
            let guard = if self.eat(TokenKind::If) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(TokenKind::FatArrow, "'=>' after match pattern")?;
            let body = if self.check(TokenKind::LBrace) {
                self.parse_block_expr()?
            } else {
                self.parse_expr()?
            };
            arms.push(MatchArm { pattern, guard, body, loc: arm_loc });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close match")?;
        Ok(self.ctx.expr(ExprKind::Match { subject, arms }, loc))
    }

    fn parse_if_expr(&mut self, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        self.expect(TokenKind::If, "'if'")?;
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block_expr()?;
        branches.push(IfBranch { cond, body });
        let mut else_body = None;
        loop {
            if self.eat(TokenKind::Elif) {
                let cond = self.parse_expr()?;
                let body = self.parse_block_expr()?;
                branches.push(IfBranch { cond, body });
            } else if self.eat(TokenKind::Else) {
                if self.eat(TokenKind::If) {
                    let cond = self.parse_expr()?;
                    let body = self.parse_block_expr()?;
                    branches.push(IfBranch { cond, body });
                    continue;
                }
                else_body = Some(self.parse_block_expr()?);
                break;
            } else {
                break;
            }
        }
        Ok(self.ctx.expr(ExprKind::If { branches, else_body }, loc))
    }

    /// `{ stmt* }` in expression position: the trailing expression statement
    /// is the block's value.
    pub(super) fn parse_block_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        let loc = self.loc();
        let body = self.parse_block()?;
        Ok(self.ctx.expr(ExprKind::Block(body), loc))
    }

    fn parse_paren(&mut self, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        if self.is_arrow_lambda_ahead() {
            return self.parse_arrow_lambda(loc);
        }
        self.expect(TokenKind::LParen, "'('")?;
        let first = self.parse_expr()?;
        if self.eat(TokenKind::Comma) {
            let mut items = vec![first];
            while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
                items.push(self.parse_expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')' to close tuple")?;
            return Ok(self.ctx.expr(ExprKind::Tuple(items), loc));
        }
        self.expect(TokenKind::RParen, "')' to close expression")?;
        Ok(first)
    }

    /// Lookahead: `(` … `)` `=>` with balanced parens means an arrow lambda.
    fn is_arrow_lambda_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.current;
        loop {
            let kind = self.tokens[i.min(self.tokens.len() - 1)].kind;
            match kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        let next = self.tokens.get(i + 1).map(|t| t.kind);
                        return next == Some(TokenKind::FatArrow);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
    }

    fn parse_arrow_lambda(&mut self, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        self.expect(TokenKind::LParen, "'('")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::FatArrow, "'=>' after lambda parameters")?;
        let body = if self.check(TokenKind::LBrace) {
            self.parse_block_expr()?
        } else {
            self.parse_lambda_stmt_expr()?
        };
        Ok(self.ctx.expr(ExprKind::Lambda { params, body, is_async: false }, loc))
    }

    fn parse_array(&mut self, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        self.expect(TokenKind::LBracket, "'['")?;
        if self.eat(TokenKind::RBracket) {
            return Ok(self.ctx.expr(ExprKind::Array(Vec::new()), loc));
        }
        if self.check(TokenKind::Spread) {
            return self.finish_array(loc, None);
        }
        let first = self.parse_expr()?;
        if self.check(TokenKind::For) {
            let clauses = self.parse_comp_clauses()?;
            self.expect(TokenKind::RBracket, "']' to close comprehension")?;
            return Ok(self.ctx.expr(ExprKind::ListComp { element: first, clauses }, loc));
        }
        self.finish_array(loc, Some(first))
    }

    fn finish_array(&mut self, loc: Loc, first: Option<&'a Expr<'a>>) -> ParseResult<&'a Expr<'a>> {
        let mut items = Vec::new();
        if let Some(e) = first {
            items.push(ArrayItem::Item(e));
            if !self.eat(TokenKind::Comma) {
                self.expect(TokenKind::RBracket, "']' to close array")?;
                return Ok(self.ctx.expr(ExprKind::Array(items), loc));
            }
        }
        while !self.check(TokenKind::RBracket) && !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Spread) {
                items.push(ArrayItem::Spread(self.parse_expr()?));
            } else {
                items.push(ArrayItem::Item(self.parse_expr()?));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBracket, "']' to close array")?;
        Ok(self.ctx.expr(ExprKind::Array(items), loc))
    }

    fn parse_comp_clauses(&mut self) -> ParseResult<Vec<CompClause<'a>>> {
        let mut clauses = Vec::new();
        loop {
            if self.eat(TokenKind::For) {
                let pattern = self.parse_pattern()?;
                self.expect(TokenKind::In, "'in' in comprehension")?;
                let iterable = self.parse_or()?;
                clauses.push(CompClause::For { pattern, iterable });
            } else if self.eat(TokenKind::If) {
                clauses.push(CompClause::If(self.parse_or()?));
            } else {
                break;
            }
        }
        Ok(clauses)
    }

    fn parse_object(&mut self, loc: Loc) -> ParseResult<&'a Expr<'a>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        if self.eat(TokenKind::RBrace) {
            return Ok(self.ctx.expr(ExprKind::Object(Vec::new()), loc));
        }

        // Dict comprehension: `{k: v for x in xs}`.
        let checkpoint = self.current;
        if !self.check(TokenKind::Spread) && !self.check(TokenKind::LBracket) {
            if let Ok(key) = self.parse_expr() {
                if self.eat(TokenKind::Colon) {
                    if let Ok(value) = self.parse_expr() {
                        if self.check(TokenKind::For) {
                            let clauses = self.parse_comp_clauses()?;
                            self.expect(TokenKind::RBrace, "'}' to close comprehension")?;
                            return Ok(self.ctx.expr(ExprKind::DictComp { key, value, clauses }, loc));
                        }
                    }
                }
            }
            self.current = checkpoint;
        }

        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Spread) {
                entries.push(ObjectEntry::Spread(self.parse_expr()?));
            } else if self.check(TokenKind::LBracket) {
                self.advance();
                let key = self.parse_expr()?;
                self.expect(TokenKind::RBracket, "']' after computed key")?;
                self.expect(TokenKind::Colon, "':' after computed key")?;
                let value = self.parse_expr()?;
                entries.push(ObjectEntry::Computed { key, value });
            } else {
                let key = if self.check(TokenKind::Str) {
                    self.advance().lexeme
                } else {
                    self.expect_ident("object key")?
                };
                let value = if self.eat(TokenKind::Colon) {
                    self.parse_expr()?
                } else {
                    let key_loc = self.loc_of(self.previous());
                    self.ctx.expr(ExprKind::Ident(key), key_loc)
                };
                entries.push(ObjectEntry::Field { key, value });
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close object")?;
        Ok(self.ctx.expr(ExprKind::Object(entries), loc))
    }
}

/// Scans for a free reference to `it`, stopping at lambda boundaries.
pub(super) fn references_free_it(expr: &Expr<'_>, it: crate::intern::Symbol) -> bool {
    use ExprKind::*;
    match &expr.kind {
        Ident(sym) => *sym == it,
        Lambda { .. } => false,
        Unary { operand, .. } => references_free_it(operand, it),
        Binary { left, right, .. } | Logical { left, right, .. } => {
            references_free_it(left, it) || references_free_it(right, it)
        }
        ChainedCmp { first, rest } => {
            references_free_it(first, it) || rest.iter().any(|(_, e)| references_free_it(e, it))
        }
        Member { object, .. } => references_free_it(object, it),
        Index { object, index } => references_free_it(object, it) || references_free_it(index, it),
        Slice { object, start, end, step } => {
            references_free_it(object, it)
                || start.map_or(false, |e| references_free_it(e, it))
                || end.map_or(false, |e| references_free_it(e, it))
                || step.map_or(false, |e| references_free_it(e, it))
        }
        Call { callee, args } => {
            references_free_it(callee, it)
                || args.iter().any(|a| references_free_it(a.expr(), it))
        }
        Pipe { value, target } => {
            references_free_it(value, it)
                || match target {
                    PipeTarget::Call(e) | PipeTarget::Bare(e) => references_free_it(e, it),
                    PipeTarget::Method { args, .. } => {
                        args.iter().any(|a| references_free_it(a.expr(), it))
                    }
                }
        }
        Match { subject, arms } => {
            references_free_it(subject, it)
                || arms.iter().any(|arm| {
                    arm.guard.map_or(false, |g| references_free_it(g, it))
                        || references_free_it(arm.body, it)
                })
        }
        If { branches, else_body } => {
            branches
                .iter()
                .any(|b| references_free_it(b.cond, it) || references_free_it(b.body, it))
                || else_body.map_or(false, |e| references_free_it(e, it))
        }
        Yield { value, .. } => value.map_or(false, |e| references_free_it(e, it)),
        Await(e) | Propagate(e) => references_free_it(e, it),
        Array(items) => items.iter().any(|i| match i {
            ArrayItem::Item(e) | ArrayItem::Spread(e) => references_free_it(e, it),
        }),
        Object(entries) => entries.iter().any(|e| match e {
            ObjectEntry::Field { value, .. } => references_free_it(value, it),
            ObjectEntry::Computed { key, value } => {
                references_free_it(key, it) || references_free_it(value, it)
            }
            ObjectEntry::Spread(e) => references_free_it(e, it),
        }),
        Str(parts) => parts.iter().any(|p| match p {
            StrPart::Expr(e) => references_free_it(e, it),
            StrPart::Text(_) => false,
        }),
        Tuple(items) => items.iter().any(|e| references_free_it(e, it)),
        Range { start, end, .. } => {
            references_free_it(start, it) || references_free_it(end, it)
        }
        ListComp { element, clauses } => {
            references_free_it(element, it)
                || clauses.iter().any(|c| match c {
                    CompClause::For { iterable, .. } => references_free_it(iterable, it),
                    CompClause::If(e) => references_free_it(e, it),
                })
        }
        DictComp { key, value, clauses } => {
            references_free_it(key, it)
                || references_free_it(value, it)
                || clauses.iter().any(|c| match c {
                    CompClause::For { iterable, .. } => references_free_it(iterable, it),
                    CompClause::If(e) => references_free_it(e, it),
                })
        }
        Block(_) | Jsx { .. } | JsxFragment { .. } => false,
        Int(_) | Float(_) | RawStr(_) | Regex { .. } | Bool(_) | Nil => false,
    }
}

fn parse_int_text(text: &str) -> i64 {
    let (digits, radix) = if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        (rest, 2)
    } else if let Some(rest) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        (rest, 8)
    } else {
        (text, 10)
    };
    i64::from_str_radix(digits, radix).unwrap_or(0)
}

fn split_regex(raw: &str) -> (String, String) {
    let inner = raw.strip_prefix('/').unwrap_or(raw);
    match inner.rfind('/') {
        Some(idx) => (inner[..idx].to_string(), inner[idx + 1..].to_string()),
        None => (inner.to_string(), String::new()),
    }
}
