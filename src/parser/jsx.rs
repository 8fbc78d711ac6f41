use super::{ParseResult, Parser};
use crate::ast::{Expr, ExprKind, JsxAttr, JsxAttrValue, JsxChild};
use crate::token::TokenKind;

impl<'a, 'int> Parser<'a, 'int> {
    /// A `<` starts JSX when followed by `>` (fragment), an uppercase tag
    /// anywhere, or a lowercase tag inside a client block.
    pub(super) fn looks_like_jsx(&self) -> bool {
        if !self.check(TokenKind::Lt) {
            return false;
        }
        let next = self.peek_at(1);
        if next.kind == TokenKind::Gt {
            return true;
        }
        if !next.kind.is_ident_like() {
            return false;
        }
        let name = self.interner.resolve(next.lexeme);
        match name.chars().next() {
            Some(c) if c.is_uppercase() => true,
            Some(_) => self.block_ctx.is_client_like(),
            None => false,
        }
    }

    pub(super) fn parse_jsx_element(&mut self) -> ParseResult<&'a Expr<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::Lt, "'<'")?;

        if self.eat(TokenKind::Gt) {
            let children = self.parse_jsx_children()?;
            self.expect(TokenKind::Lt, "'</' to close fragment")?;
            self.expect(TokenKind::Slash, "'</' to close fragment")?;
            self.expect(TokenKind::Gt, "'>' to close fragment")?;
            return Ok(self.ctx.expr(ExprKind::JsxFragment { children }, loc));
        }

        let tag = self.expect_ident("tag name")?;
        let mut attrs = Vec::new();
        while !self.check(TokenKind::Gt) && !self.check(TokenKind::Slash) && !self.check(TokenKind::Eof)
        {
            attrs.push(self.parse_jsx_attr()?);
        }

        if self.eat(TokenKind::Slash) {
            self.expect(TokenKind::Gt, "'>' after '/' in self-closing tag")?;
            return Ok(self.ctx.expr(ExprKind::Jsx { tag, attrs, children: Vec::new() }, loc));
        }

        self.expect(TokenKind::Gt, "'>' to close opening tag")?;
        let children = self.parse_jsx_children()?;

        self.expect(TokenKind::Lt, "closing tag")?;
        self.expect(TokenKind::Slash, "closing tag")?;
        let close = self.expect_ident("closing tag name")?;
        if close != tag {
            return Err(self.error_here(format!(
                "mismatched closing tag: expected '</{}>', found '</{}>'",
                self.interner.resolve(tag),
                self.interner.resolve(close)
            )));
        }
        self.expect(TokenKind::Gt, "'>' to close tag")?;
        Ok(self.ctx.expr(ExprKind::Jsx { tag, attrs, children }, loc))
    }

    /// Attribute name with optional colon segments (`on:click`,
    /// `bind:value`, `class:active`) and one of the four value forms.
    fn parse_jsx_attr(&mut self) -> ParseResult<JsxAttr<'a>> {
        let loc = self.loc();

        if self.check(TokenKind::LBrace) && self.peek_at(1).kind == TokenKind::Spread {
            self.advance();
            self.advance();
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RBrace, "'}' to close spread attribute")?;
            return Ok(JsxAttr::Spread { expr, loc });
        }

        let first = self.expect_ident("attribute name")?;
        let mut name = self.interner.resolve(first).to_string();
        while self.check(TokenKind::Colon) && self.peek_at(1).kind.is_ident_like() {
            self.advance();
            let seg = self.advance().lexeme;
            name.push(':');
            name.push_str(self.interner.resolve(seg));
        }
        let name = self.interner.intern(&name);

        if !self.eat(TokenKind::Eq) {
            return Ok(JsxAttr::Named { name, value: JsxAttrValue::Shorthand, loc });
        }

        let value = match self.peek().kind {
            TokenKind::Str => JsxAttrValue::Str(self.advance().lexeme),
            TokenKind::StrStart => JsxAttrValue::Template(self.parse_template_parts()?),
            TokenKind::LBrace => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RBrace, "'}' to close attribute binding")?;
                JsxAttrValue::Expr(expr)
            }
            _ => {
                return Err(self.error_here(format!(
                    "expected attribute value, found '{}'",
                    self.describe_current()
                )))
            }
        };
        Ok(JsxAttr::Named { name, value, loc })
    }

    fn parse_jsx_children(&mut self) -> ParseResult<Vec<JsxChild<'a>>> {
        let mut children = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Eof => {
                    return Err(self.error_here("unterminated JSX element".into()));
                }
                TokenKind::Lt if self.peek_at(1).kind == TokenKind::Slash => break,
                TokenKind::RBrace => break,
                TokenKind::Lt => {
                    let element = self.parse_jsx_element()?;
                    children.push(JsxChild::Element(element));
                }
                TokenKind::LBrace => {
                    self.advance();
                    let expr = self.parse_expr()?;
                    self.expect(TokenKind::RBrace, "'}' to close expression child")?;
                    children.push(JsxChild::Expr(expr));
                }
                TokenKind::For => {
                    children.push(self.parse_jsx_for()?);
                }
                TokenKind::If => {
                    children.push(self.parse_jsx_if()?);
                }
                TokenKind::Str => {
                    let tok = self.advance();
                    children.push(JsxChild::Text(tok.lexeme));
                }
                _ => {
                    children.push(self.parse_jsx_text()?);
                }
            }
        }
        Ok(children)
    }

    /// Unquoted text: raw token lexemes joined with single spaces, which
    /// realizes the whitespace-collapsing rule.
    fn parse_jsx_text(&mut self) -> ParseResult<JsxChild<'a>> {
        let mut words = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Lt | TokenKind::LBrace | TokenKind::RBrace | TokenKind::For
                | TokenKind::If | TokenKind::Str | TokenKind::Eof => break,
                _ => {
                    let tok = self.advance();
                    words.push(self.interner.resolve(tok.lexeme).to_string());
                }
            }
        }
        if words.is_empty() {
            return Err(self.error_here("expected JSX child".into()));
        }
        let text = self.interner.intern(&words.join(" "));
        Ok(JsxChild::Text(text))
    }

    /// `for item in list [key={expr}] { children }`.
    fn parse_jsx_for(&mut self) -> ParseResult<JsxChild<'a>> {
        self.expect(TokenKind::For, "'for'")?;
        let pattern = self.parse_pattern()?;
        self.expect(TokenKind::In, "'in' in JSX for")?;
        let iterable = self.parse_expr()?;
        let key = if self.peek_is_word("key") {
            self.advance();
            self.expect(TokenKind::Eq, "'=' after 'key'")?;
            self.expect(TokenKind::LBrace, "'{' around key expression")?;
            let key = self.parse_expr()?;
            self.expect(TokenKind::RBrace, "'}' after key expression")?;
            Some(key)
        } else {
            None
        };
        self.expect(TokenKind::LBrace, "'{' to open JSX for body")?;
        let body = self.parse_jsx_children()?;
        self.expect(TokenKind::RBrace, "'}' to close JSX for body")?;
        Ok(JsxChild::For { pattern, iterable, key, body })
    }

    /// `if cond { children } elif cond { children } else { children }`.
    fn parse_jsx_if(&mut self) -> ParseResult<JsxChild<'a>> {
        self.expect(TokenKind::If, "'if'")?;
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        self.expect(TokenKind::LBrace, "'{' to open JSX if body")?;
        let body = self.parse_jsx_children()?;
        self.expect(TokenKind::RBrace, "'}' to close JSX if body")?;
        branches.push((cond, body));
        let mut else_body = None;
        loop {
            if self.eat(TokenKind::Elif) {
                let cond = self.parse_expr()?;
                self.expect(TokenKind::LBrace, "'{' to open JSX elif body")?;
                let body = self.parse_jsx_children()?;
                self.expect(TokenKind::RBrace, "'}' to close JSX elif body")?;
                branches.push((cond, body));
            } else if self.eat(TokenKind::Else) {
                self.expect(TokenKind::LBrace, "'{' to open JSX else body")?;
                let body = self.parse_jsx_children()?;
                self.expect(TokenKind::RBrace, "'}' to close JSX else body")?;
                else_body = Some(body);
                break;
            } else {
                break;
            }
        }
        Ok(JsxChild::If { branches, else_body })
    }
}
