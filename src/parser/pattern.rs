use super::{ParseResult, Parser};
use crate::ast::{ExprKind, ObjectPatEntry, Pattern, PatternKind, StrPart};
use crate::token::TokenKind;

impl<'a, 'int> Parser<'a, 'int> {
    pub(super) fn parse_pattern(&mut self) -> ParseResult<&'a Pattern<'a>> {
        let loc = self.loc();
        match self.peek().kind {
            TokenKind::Int | TokenKind::Float | TokenKind::Minus => {
                let start = self.parse_literal_number()?;
                if self.check(TokenKind::DotDot) || self.check(TokenKind::DotDotEq) {
                    let inclusive = self.check(TokenKind::DotDotEq);
                    self.advance();
                    let end = self.parse_literal_number()?;
                    return Ok(self.ctx.pat(PatternKind::Range { start, end, inclusive }, loc));
                }
                Ok(self.ctx.pat(PatternKind::Literal(start), loc))
            }
            TokenKind::Str => {
                let tok = self.advance();
                if self.eat(TokenKind::PlusPlus) {
                    let rest = self.expect_ident("binding after '++'")?;
                    return Ok(self.ctx.pat(PatternKind::StringConcat { prefix: tok.lexeme, rest }, loc));
                }
                let lit = self.ctx.expr(ExprKind::Str(vec![StrPart::Text(tok.lexeme)]), loc);
                Ok(self.ctx.pat(PatternKind::Literal(lit), loc))
            }
            TokenKind::True => {
                self.advance();
                let lit = self.ctx.expr(ExprKind::Bool(true), loc);
                Ok(self.ctx.pat(PatternKind::Literal(lit), loc))
            }
            TokenKind::False => {
                self.advance();
                let lit = self.ctx.expr(ExprKind::Bool(false), loc);
                Ok(self.ctx.pat(PatternKind::Literal(lit), loc))
            }
            TokenKind::Nil => {
                self.advance();
                let lit = self.ctx.expr(ExprKind::Nil, loc);
                Ok(self.ctx.pat(PatternKind::Literal(lit), loc))
            }
            TokenKind::LParen => {
                // Tuple pattern `(k, v)`; destructures like an array.
                self.advance();
                let mut items = Vec::new();
                while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
                    items.push(self.parse_pattern()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')' to close tuple pattern")?;
                Ok(self.ctx.pat(PatternKind::Array { items, rest: None }, loc))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                let mut rest = None;
                while !self.check(TokenKind::RBracket) && !self.check(TokenKind::Eof) {
                    if self.eat(TokenKind::Spread) {
                        rest = Some(self.expect_ident("binding after '...'")?);
                        break;
                    }
                    items.push(self.parse_pattern()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "']' to close array pattern")?;
                Ok(self.ctx.pat(PatternKind::Array { items, rest }, loc))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                let mut rest = None;
                while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
                    if self.eat(TokenKind::Spread) {
                        rest = Some(self.expect_ident("binding after '...'")?);
                        break;
                    }
                    let key = self.expect_ident("field name in object pattern")?;
                    let pattern = if self.eat(TokenKind::Colon) {
                        Some(self.parse_pattern()?)
                    } else {
                        None
                    };
                    let default = if self.eat(TokenKind::Eq) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    entries.push(ObjectPatEntry { key, pattern, default });
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}' to close object pattern")?;
                Ok(self.ctx.pat(PatternKind::Object { entries, rest }, loc))
            }
            kind if kind.is_ident_like() => {
                let tok = self.advance();
                let name = self.interner.resolve(tok.lexeme).to_string();
                if name == "_" {
                    return Ok(self.ctx.pat(PatternKind::Wildcard, loc));
                }
                let is_variant = name.chars().next().map_or(false, |c| c.is_uppercase());
                if is_variant {
                    let mut args = Vec::new();
                    if self.eat(TokenKind::LParen) {
                        while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
                            args.push(self.parse_pattern()?);
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                        self.expect(TokenKind::RParen, "')' to close variant pattern")?;
                    }
                    return Ok(self.ctx.pat(PatternKind::Variant { name: tok.lexeme, args }, loc));
                }
                Ok(self.ctx.pat(PatternKind::Binding(tok.lexeme), loc))
            }
            _ => Err(self.error_here(format!(
                "expected pattern, found '{}'",
                self.describe_current()
            ))),
        }
    }

    fn parse_literal_number(&mut self) -> ParseResult<&'a crate::ast::Expr<'a>> {
        let loc = self.loc();
        let negative = self.eat(TokenKind::Minus);
        match self.peek().kind {
            TokenKind::Int => {
                let tok = self.advance();
                let mut value: i64 = self.interner.resolve(tok.lexeme).parse().unwrap_or(0);
                if negative {
                    value = -value;
                }
                Ok(self.ctx.expr(ExprKind::Int(value), loc))
            }
            TokenKind::Float => {
                let tok = self.advance();
                let mut value: f64 = self.interner.resolve(tok.lexeme).parse().unwrap_or(0.0);
                if negative {
                    value = -value;
                }
                Ok(self.ctx.expr(ExprKind::Float(value), loc))
            }
            _ => Err(self.error_here("expected numeric literal in pattern".into())),
        }
    }
}
