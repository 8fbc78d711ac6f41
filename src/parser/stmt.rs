use super::{BlockCtx, ParseResult, Parser};
use crate::ast::{BinaryOp, Block, Expr, ExprKind, Stmt, StmtKind};
use crate::token::TokenKind;

impl<'a, 'int> Parser<'a, 'int> {
    /// `{ stmt* }` with the current block context preserved.
    pub(super) fn parse_block(&mut self) -> ParseResult<Block<'a>> {
        self.expect(TokenKind::LBrace, "'{' to open block")?;
        let outer = self.block_ctx;
        if outer == BlockCtx::Module {
            self.block_ctx = BlockCtx::Function;
        }
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            self.collect_doc();
            if self.check(TokenKind::RBrace) {
                break;
            }
            let stmt = self.parse_statement()?;
            stmts.push(stmt);
            self.eat(TokenKind::Semicolon);
        }
        self.block_ctx = outer;
        self.expect(TokenKind::RBrace, "'}' to close block")?;
        Ok(stmts)
    }

    pub(super) fn parse_statement(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        match self.peek().kind {
            TokenKind::Var => {
                self.advance();
                let name = self.expect_ident("variable name after 'var'")?;
                let ty = if self.eat(TokenKind::Colon) {
                    Some(self.parse_type_text()?)
                } else {
                    None
                };
                self.expect(TokenKind::Eq, "'=' in var declaration")?;
                let value = self.parse_expr()?;
                Ok(self.ctx.stmt(StmtKind::VarDecl { name, ty, value }, loc))
            }
            TokenKind::Let => {
                self.advance();
                let pattern = self.parse_pattern()?;
                self.expect(TokenKind::Eq, "'=' in let declaration")?;
                let value = self.parse_expr()?;
                Ok(self.ctx.stmt(StmtKind::LetDecl { pattern, value }, loc))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.can_start_expr_here() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(self.ctx.stmt(StmtKind::Return(value), loc))
            }
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(self.ctx.stmt(StmtKind::While { cond, body }, loc))
            }
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::Break => {
                self.advance();
                Ok(self.ctx.stmt(StmtKind::Break, loc))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(self.ctx.stmt(StmtKind::Continue, loc))
            }
            TokenKind::Guard => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(TokenKind::Else, "'else' after guard condition")?;
                let else_body = self.parse_block()?;
                Ok(self.ctx.stmt(StmtKind::Guard { cond, else_body }, loc))
            }
            TokenKind::Defer => {
                self.advance();
                let body = self.parse_block()?;
                Ok(self.ctx.stmt(StmtKind::Defer(body), loc))
            }
            TokenKind::Fn if self.peek_at(1).kind == TokenKind::LParen => self.parse_expr_or_assign(),
            TokenKind::Async
                if self.peek_at(1).kind == TokenKind::Fn
                    && self.peek_at(2).kind == TokenKind::LParen =>
            {
                self.parse_expr_or_assign()
            }
            TokenKind::Fn | TokenKind::Async | TokenKind::Pub => self.parse_func_or_pub(),
            TokenKind::Type => self.parse_type_decl(false),
            TokenKind::Interface => self.parse_interface(),
            TokenKind::Trait => self.parse_trait(),
            TokenKind::Impl => self.parse_impl(),
            TokenKind::Import => self.parse_import(),
            TokenKind::Server | TokenKind::Client | TokenKind::Shared | TokenKind::Security
            | TokenKind::Test
                if self.block_starts_here() =>
            {
                self.parse_target_block()
            }
            _ => {
                if let Some(stmt) = self.try_parse_context_decl()? {
                    return Ok(stmt);
                }
                self.parse_expr_or_assign()
            }
        }
    }

    fn can_start_expr_here(&self) -> bool {
        use TokenKind::*;
        let kind = self.peek().kind;
        kind.is_ident_like()
            || matches!(
                kind,
                Int | Float | Str | StrStart | RawStr | Regex | True | False | Nil | LParen
                    | LBracket | LBrace | Minus | Bang | Not | Fn | Async | Match | If | Await
                    | Yield | Lt
            )
    }

    /// Distinguishes `server { … }` / `server name { … }` blocks from the
    /// same words used as expressions.
    fn block_starts_here(&self) -> bool {
        let next = self.peek_at(1).kind;
        next == TokenKind::LBrace
            || (next.is_ident_like() && self.peek_at(2).kind == TokenKind::LBrace)
            || (next == TokenKind::Str && self.peek_at(2).kind == TokenKind::LBrace)
    }

    fn parse_if_stmt(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::If, "'if'")?;
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        branches.push((cond, body));
        let mut else_body = None;
        loop {
            if self.eat(TokenKind::Elif) {
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                branches.push((cond, body));
            } else if self.eat(TokenKind::Else) {
                if self.eat(TokenKind::If) {
                    let cond = self.parse_expr()?;
                    let body = self.parse_block()?;
                    branches.push((cond, body));
                    continue;
                }
                else_body = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(self.ctx.stmt(StmtKind::If { branches, else_body }, loc))
    }

    fn parse_for_stmt(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::For, "'for'")?;
        let pattern = self.parse_pattern()?;

        let mut names = Vec::new();
        pattern.bound_names(&mut names);
        for (i, (name, _)) in names.iter().enumerate() {
            if names[..i].iter().any(|(other, _)| other == name) {
                return Err(self.error_here(format!(
                    "duplicate binding '{}' in for-loop pattern",
                    self.interner.resolve(*name)
                )));
            }
        }

        self.expect(TokenKind::In, "'in' after for-loop pattern")?;
        let iterable = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(self.ctx.stmt(StmtKind::For { pattern, iterable, body }, loc))
    }

    fn parse_import(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::Import, "'import'")?;
        let mut names = Vec::new();
        loop {
            let name = self.expect_ident("imported name")?;
            let alias = if self.eat(TokenKind::As) {
                Some(self.expect_ident("alias after 'as'")?)
            } else {
                None
            };
            names.push((name, alias));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::From, "'from' in import")?;
        let module = self.expect(TokenKind::Str, "module path string")?.lexeme;
        Ok(self.ctx.stmt(StmtKind::Import { names, module }, loc))
    }

    /// Expression statement, single/tuple assignment, or compound assignment.
    fn parse_expr_or_assign(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        let first = self.parse_expr()?;

        if self.check(TokenKind::Comma) && is_assign_target(first) {
            let checkpoint = self.current;
            let mut targets = vec![first];
            let mut all_targets = true;
            while self.eat(TokenKind::Comma) {
                match self.parse_expr() {
                    Ok(e) if is_assign_target(e) => targets.push(e),
                    _ => {
                        all_targets = false;
                        break;
                    }
                }
            }
            if all_targets && self.eat(TokenKind::Eq) {
                let value = self.parse_tuple_rhs()?;
                return Ok(self.ctx.stmt(StmtKind::Assign { targets, value }, loc));
            }
            self.current = checkpoint;
        }

        if self.check(TokenKind::Eq) && is_assign_target(first) {
            self.advance();
            let value = self.parse_expr()?;
            return Ok(self.ctx.stmt(StmtKind::Assign { targets: vec![first], value }, loc));
        }

        let compound = match self.peek().kind {
            TokenKind::PlusEq => Some(BinaryOp::Add),
            TokenKind::MinusEq => Some(BinaryOp::Sub),
            TokenKind::StarEq => Some(BinaryOp::Mul),
            TokenKind::SlashEq => Some(BinaryOp::Div),
            TokenKind::PercentEq => Some(BinaryOp::Mod),
            _ => None,
        };
        if let Some(op) = compound {
            if !is_assign_target(first) {
                return Err(self.error_here("invalid compound assignment target".into()));
            }
            self.advance();
            let value = self.parse_expr()?;
            return Ok(self.ctx.stmt(StmtKind::CompoundAssign { target: first, op, value }, loc));
        }

        Ok(self.ctx.stmt(StmtKind::Expr(first), loc))
    }

    fn parse_tuple_rhs(&mut self) -> ParseResult<&'a Expr<'a>> {
        let loc = self.loc();
        let first = self.parse_expr()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            items.push(self.parse_expr()?);
        }
        Ok(self.ctx.expr(ExprKind::Tuple(items), loc))
    }
}

fn is_assign_target(expr: &Expr<'_>) -> bool {
    matches!(
        expr.kind,
        ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
    )
}
