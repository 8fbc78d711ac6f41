use super::{BlockCtx, ParseResult, Parser};
use crate::ast::{
    Block, Config, Expr, ExprKind, FieldDef, FuncDecl, MethodSig, RouteDecl, RouteDecorator,
    SecurityEntry, Stmt, StmtKind, TypeBody, VariantDef,
};
use crate::intern::Symbol;
use crate::token::TokenKind;

/// Builtin nominal types; a payload-less `type X = A | B` over these is a
/// union alias rather than an enum declaration.
const PRIMITIVE_TYPES: &[&str] = &["Int", "Float", "Bool", "String", "Nil", "Any", "Unknown"];

impl<'a, 'int> Parser<'a, 'int> {
    pub(super) fn parse_declaration(&mut self) -> ParseResult<&'a Stmt<'a>> {
        self.parse_statement()
    }

    // -- functions ----------------------------------------------------------

    pub(super) fn parse_func_or_pub(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        let is_pub = self.eat(TokenKind::Pub);
        if self.check(TokenKind::Type) {
            return self.parse_type_decl(is_pub);
        }
        let is_async = self.eat(TokenKind::Async);
        if !self.check(TokenKind::Fn) {
            // `async fn` lambda in expression-statement position falls back
            // through the expression path; a bare `pub` anywhere else is bad.
            if is_pub || is_async {
                return Err(self.error_here("expected 'fn' after modifier".into()));
            }
        }
        let func = self.parse_func_decl(is_async, is_pub)?;
        Ok(self.ctx.stmt(StmtKind::Func(func), loc))
    }

    pub(super) fn parse_func_decl(&mut self, is_async: bool, is_pub: bool) -> ParseResult<FuncDecl<'a>> {
        let loc = self.loc();
        let doc = self.take_doc();
        self.expect(TokenKind::Fn, "'fn'")?;
        let name = self.expect_ident("function name")?;
        let type_params = if self.eat(TokenKind::Lt) {
            let mut params = Vec::new();
            while !self.check(TokenKind::Gt) && !self.check(TokenKind::Eof) {
                params.push(self.expect_ident("type parameter")?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt, "'>' to close type parameters")?;
            params
        } else {
            Vec::new()
        };
        self.expect(TokenKind::LParen, "'(' after function name")?;
        let params = self.parse_params()?;
        let ret_type = if self.eat(TokenKind::Arrow) {
            Some(self.parse_type_text()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let is_generator = block_contains_yield(&body);
        Ok(FuncDecl {
            name,
            type_params,
            params,
            ret_type,
            body,
            is_async,
            is_pub,
            is_generator,
            doc,
            loc,
        })
    }

    // -- type declarations --------------------------------------------------

    pub(super) fn parse_type_decl(&mut self, is_pub: bool) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        let doc = self.take_doc();
        self.expect(TokenKind::Type, "'type'")?;
        let name = self.expect_ident("type name")?;
        let type_params = if self.eat(TokenKind::Lt) {
            let mut params = Vec::new();
            while !self.check(TokenKind::Gt) && !self.check(TokenKind::Eof) {
                params.push(self.expect_ident("type parameter")?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt, "'>' to close type parameters")?;
            params
        } else {
            Vec::new()
        };

        if self.check(TokenKind::LBrace) {
            self.advance();
            let fields = self.parse_field_list(TokenKind::RBrace)?;
            self.expect(TokenKind::RBrace, "'}' to close type body")?;
            let derives = self.parse_derives()?;
            return Ok(self.ctx.stmt(
                StmtKind::TypeDecl {
                    name,
                    type_params,
                    body: TypeBody::Struct(fields),
                    derives,
                    is_pub,
                    doc,
                },
                loc,
            ));
        }

        self.expect(TokenKind::Eq, "'{' or '=' after type name")?;
        let mut variants = Vec::new();
        let mut saw_payload = false;
        loop {
            let v_loc = self.loc();
            let v_name = self.expect_ident("variant or type name")?;
            let mut fields = Vec::new();
            if self.eat(TokenKind::LParen) {
                saw_payload = true;
                let mut index = 0usize;
                while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
                    let f_loc = self.loc();
                    let ty = self.parse_type_text()?;
                    let fname = self.interner.intern(&format!("_{}", index));
                    fields.push(FieldDef { name: fname, ty, default: None, loc: f_loc });
                    index += 1;
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')' to close variant payload")?;
            } else if self.eat(TokenKind::LBrace) {
                saw_payload = true;
                fields = self.parse_field_list(TokenKind::RBrace)?;
                self.expect(TokenKind::RBrace, "'}' to close variant fields")?;
            }
            variants.push(VariantDef { name: v_name, fields, loc: v_loc });
            if !self.eat(TokenKind::Bar) {
                break;
            }
        }
        let derives = self.parse_derives()?;

        // `type Id = Int` and unions over primitives are aliases; anything
        // with a payload or non-primitive constructors is a sum type.
        let all_primitive = variants.iter().all(|v| {
            PRIMITIVE_TYPES.contains(&self.interner.resolve(v.name))
                || !self
                    .interner
                    .resolve(v.name)
                    .chars()
                    .next()
                    .map_or(false, |c| c.is_uppercase())
        });
        if !saw_payload && (variants.len() == 1 || all_primitive) {
            let text = variants
                .iter()
                .map(|v| self.interner.resolve(v.name).to_string())
                .collect::<Vec<_>>()
                .join(" | ");
            let target = self.interner.intern(&text);
            return Ok(self.ctx.stmt(StmtKind::TypeAlias { name, type_params, target, doc }, loc));
        }

        Ok(self.ctx.stmt(
            StmtKind::TypeDecl {
                name,
                type_params,
                body: TypeBody::Enum(variants),
                derives,
                is_pub,
                doc,
            },
            loc,
        ))
    }

    fn parse_field_list(&mut self, close: TokenKind) -> ParseResult<Vec<FieldDef<'a>>> {
        let mut fields = Vec::new();
        while !self.check(close) && !self.check(TokenKind::Eof) {
            let loc = self.loc();
            let name = self.expect_ident("field name")?;
            self.expect(TokenKind::Colon, "':' after field name")?;
            let ty = self.parse_type_text()?;
            let default = if self.eat(TokenKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            fields.push(FieldDef { name, ty, default, loc });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(fields)
    }

    fn parse_derives(&mut self) -> ParseResult<Vec<Symbol>> {
        if !self.eat(TokenKind::Derive) {
            return Ok(Vec::new());
        }
        self.expect(TokenKind::LBracket, "'[' after 'derive'")?;
        let mut names = Vec::new();
        while !self.check(TokenKind::RBracket) && !self.check(TokenKind::Eof) {
            names.push(self.expect_ident("trait name in derive list")?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBracket, "']' to close derive list")?;
        Ok(names)
    }

    // -- interface / trait / impl -------------------------------------------

    pub(super) fn parse_interface(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        let doc = self.take_doc();
        self.expect(TokenKind::Interface, "'interface'")?;
        let name = self.expect_ident("interface name")?;
        self.expect(TokenKind::LBrace, "'{' to open interface body")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            methods.push(self.parse_method_sig(false)?);
        }
        self.expect(TokenKind::RBrace, "'}' to close interface body")?;
        Ok(self.ctx.stmt(StmtKind::Interface { name, methods, doc }, loc))
    }

    pub(super) fn parse_trait(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        let doc = self.take_doc();
        self.expect(TokenKind::Trait, "'trait'")?;
        let name = self.expect_ident("trait name")?;
        self.expect(TokenKind::LBrace, "'{' to open trait body")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            methods.push(self.parse_method_sig(true)?);
        }
        self.expect(TokenKind::RBrace, "'}' to close trait body")?;
        Ok(self.ctx.stmt(StmtKind::Trait { name, methods, doc }, loc))
    }

    fn parse_method_sig(&mut self, allow_body: bool) -> ParseResult<MethodSig<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::Fn, "'fn' to start method signature")?;
        let name = self.expect_ident("method name")?;
        self.expect(TokenKind::LParen, "'(' after method name")?;
        let params = self.parse_params()?;
        let ret_type = if self.eat(TokenKind::Arrow) {
            Some(self.parse_type_text()?)
        } else {
            None
        };
        let default_body = if allow_body && self.check(TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(MethodSig { name, params, ret_type, default_body, loc })
    }

    pub(super) fn parse_impl(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::Impl, "'impl'")?;
        let first = self.expect_ident("type or trait name after 'impl'")?;
        let (trait_name, type_name) = if self.eat(TokenKind::For) {
            (Some(first), self.expect_ident("type name after 'for'")?)
        } else {
            (None, first)
        };
        self.expect(TokenKind::LBrace, "'{' to open impl body")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            self.collect_doc();
            let is_async = self.eat(TokenKind::Async);
            methods.push(self.parse_func_decl(is_async, false)?);
        }
        self.expect(TokenKind::RBrace, "'}' to close impl body")?;
        Ok(self.ctx.stmt(StmtKind::Impl { trait_name, type_name, methods }, loc))
    }

    // -- target blocks ------------------------------------------------------

    pub(super) fn parse_target_block(&mut self) -> ParseResult<&'a Stmt<'a>> {
        let loc = self.loc();
        let kind = self.advance().kind;
        match kind {
            TokenKind::Server => {
                let name = if self.check_ident() && !self.check(TokenKind::LBrace) {
                    Some(self.advance().lexeme)
                } else if self.check(TokenKind::Str) {
                    Some(self.advance().lexeme)
                } else {
                    None
                };
                let decls = self.parse_ctx_block(BlockCtx::Server)?;
                Ok(self.ctx.stmt(StmtKind::ServerBlock { name, decls }, loc))
            }
            TokenKind::Client => {
                let decls = self.parse_ctx_block(BlockCtx::Client)?;
                Ok(self.ctx.stmt(StmtKind::ClientBlock { decls }, loc))
            }
            TokenKind::Shared => {
                let decls = self.parse_ctx_block(BlockCtx::Shared)?;
                Ok(self.ctx.stmt(StmtKind::SharedBlock { decls }, loc))
            }
            TokenKind::Test => {
                let name = if self.check(TokenKind::Str) {
                    Some(self.advance().lexeme)
                } else {
                    None
                };
                let decls = self.parse_ctx_block(BlockCtx::Test)?;
                Ok(self.ctx.stmt(StmtKind::TestBlock { name, decls }, loc))
            }
            TokenKind::Security => {
                let entries = self.parse_security_entries()?;
                Ok(self.ctx.stmt(StmtKind::SecurityBlock { entries }, loc))
            }
            _ => Err(self.error_here("expected block keyword".into())),
        }
    }

    fn parse_ctx_block(&mut self, ctx: BlockCtx) -> ParseResult<Block<'a>> {
        self.expect(TokenKind::LBrace, "'{' to open block")?;
        let outer = self.block_ctx;
        self.block_ctx = ctx;
        let mut decls = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            self.collect_doc();
            if self.check(TokenKind::RBrace) {
                break;
            }
            let stmt = self.parse_statement()?;
            decls.push(stmt);
            self.eat(TokenKind::Semicolon);
        }
        self.block_ctx = outer;
        self.expect(TokenKind::RBrace, "'}' to close block")?;
        Ok(decls)
    }

    // -- security block entries ---------------------------------------------

    fn parse_security_entries(&mut self) -> ParseResult<Vec<SecurityEntry<'a>>> {
        self.expect(TokenKind::LBrace, "'{' to open security block")?;
        let outer = self.block_ctx;
        self.block_ctx = BlockCtx::Security;
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let loc = self.loc();
            let entry = match self.peek().kind {
                TokenKind::Auth => {
                    self.advance();
                    let auth_type = self.expect_ident("auth type ('jwt' or 'api_key')")?;
                    let config = if self.check(TokenKind::LBrace) {
                        self.parse_config()?
                    } else {
                        Vec::new()
                    };
                    SecurityEntry::Auth { auth_type, config, loc }
                }
                TokenKind::Role => {
                    self.advance();
                    let name = if self.check(TokenKind::Str) {
                        self.advance().lexeme
                    } else {
                        self.expect_ident("role name")?
                    };
                    SecurityEntry::Role { name, loc }
                }
                TokenKind::Protect => {
                    self.advance();
                    let pattern = self.expect(TokenKind::Str, "path pattern string")?.lexeme;
                    let config = if self.check(TokenKind::LBrace) {
                        self.parse_config()?
                    } else {
                        Vec::new()
                    };
                    SecurityEntry::Protect { pattern, config, loc }
                }
                TokenKind::Sensitive => {
                    self.advance();
                    let type_name = self.expect_ident("type name")?;
                    self.expect(TokenKind::Dot, "'.' between type and field")?;
                    let field = self.expect_ident("field name")?;
                    let config = if self.check(TokenKind::LBrace) {
                        self.parse_config()?
                    } else {
                        Vec::new()
                    };
                    SecurityEntry::Sensitive { type_name, field, config, loc }
                }
                TokenKind::Cors => {
                    self.advance();
                    SecurityEntry::Cors { config: self.parse_config()?, loc }
                }
                TokenKind::Csp => {
                    self.advance();
                    SecurityEntry::Csp { config: self.parse_config()?, loc }
                }
                TokenKind::RateLimit => {
                    self.advance();
                    SecurityEntry::RateLimit { config: self.parse_config()?, loc }
                }
                TokenKind::Csrf => {
                    self.advance();
                    SecurityEntry::Csrf { config: self.parse_config()?, loc }
                }
                TokenKind::Audit => {
                    self.advance();
                    SecurityEntry::Audit { config: self.parse_config()?, loc }
                }
                TokenKind::Hsts => {
                    self.advance();
                    SecurityEntry::Hsts { config: self.parse_config()?, loc }
                }
                TokenKind::TrustProxy => {
                    self.advance();
                    let enabled = match self.peek().kind {
                        TokenKind::True => {
                            self.advance();
                            true
                        }
                        TokenKind::False => {
                            self.advance();
                            false
                        }
                        _ => true,
                    };
                    SecurityEntry::TrustProxy { enabled, loc }
                }
                _ => {
                    self.block_ctx = outer;
                    return Err(self.error_here(format!(
                        "'{}' is not a security declaration",
                        self.describe_current()
                    )));
                }
            };
            entries.push(entry);
            self.eat(TokenKind::Semicolon);
        }
        self.block_ctx = outer;
        self.expect(TokenKind::RBrace, "'}' to close security block")?;
        Ok(entries)
    }

    /// `{ key: value, ... }` config body used by server and security leaves.
    pub(super) fn parse_config(&mut self) -> ParseResult<Config<'a>> {
        self.expect(TokenKind::LBrace, "'{' to open config")?;
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let key = if self.check(TokenKind::Str) {
                self.advance().lexeme
            } else {
                self.expect_ident("config key")?
            };
            self.expect(TokenKind::Colon, "':' after config key")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close config")?;
        Ok(entries)
    }

    // -- context-gated leaf declarations ------------------------------------

    /// Declaration keywords that only count inside the right block;
    /// elsewhere the caller falls through and they parse as identifiers.
    /// A handful of shapes (`state x =`, `component X(`, `route M "p"`)
    /// are unambiguous enough to parse anywhere so the analyzer can reject
    /// them with E302/E303 instead of a syntax error.
    pub(super) fn try_parse_context_decl(&mut self) -> ParseResult<Option<&'a Stmt<'a>>> {
        match self.block_ctx {
            BlockCtx::Server => {
                if let Some(stmt) = self.try_parse_server_decl()? {
                    return Ok(Some(stmt));
                }
            }
            BlockCtx::Client => {
                if let Some(stmt) = self.try_parse_client_decl()? {
                    return Ok(Some(stmt));
                }
            }
            _ => {}
        }
        self.try_parse_shaped_decl()
    }

    fn try_parse_shaped_decl(&mut self) -> ParseResult<Option<&'a Stmt<'a>>> {
        let loc = self.loc();
        match self.peek().kind {
            TokenKind::State
                if self.block_ctx != BlockCtx::Client
                    && self.peek_at(1).kind.is_ident_like()
                    && self.peek_at(2).kind == TokenKind::Eq =>
            {
                self.advance();
                let name = self.expect_ident("state name")?;
                self.expect(TokenKind::Eq, "'=' in state declaration")?;
                let value = self.parse_expr()?;
                Ok(Some(self.ctx.stmt(StmtKind::StateDecl { name, value }, loc)))
            }
            TokenKind::Computed
                if self.block_ctx != BlockCtx::Client
                    && self.peek_at(1).kind.is_ident_like()
                    && self.peek_at(2).kind == TokenKind::Eq =>
            {
                self.advance();
                let name = self.expect_ident("computed name")?;
                self.expect(TokenKind::Eq, "'=' in computed declaration")?;
                let value = self.parse_expr()?;
                Ok(Some(self.ctx.stmt(StmtKind::ComputedDecl { name, value }, loc)))
            }
            TokenKind::Component
                if self.block_ctx != BlockCtx::Client
                    && self.peek_at(1).kind.is_ident_like()
                    && self.peek_at(2).kind == TokenKind::LParen =>
            {
                self.advance();
                let doc = self.take_doc();
                let name = self.expect_ident("component name")?;
                self.expect(TokenKind::LParen, "'(' after component name")?;
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                let func = FuncDecl {
                    name,
                    type_params: Vec::new(),
                    params,
                    ret_type: None,
                    body,
                    is_async: false,
                    is_pub: false,
                    is_generator: false,
                    doc,
                    loc,
                };
                Ok(Some(self.ctx.stmt(StmtKind::Component(func), loc)))
            }
            TokenKind::Route
                if self.block_ctx != BlockCtx::Server
                    && self.peek_at(1).kind.is_ident_like()
                    && self.peek_at(2).kind == TokenKind::Str =>
            {
                self.advance();
                Ok(Some(self.parse_route(loc)?))
            }
            _ => Ok(None),
        }
    }

    fn try_parse_server_decl(&mut self) -> ParseResult<Option<&'a Stmt<'a>>> {
        let loc = self.loc();
        let stmt = match self.peek().kind {
            TokenKind::Route => {
                self.advance();
                return Ok(Some(self.parse_route(loc)?));
            }
            TokenKind::Middleware => {
                self.advance();
                let handler = self.parse_expr()?;
                self.ctx.stmt(StmtKind::Middleware { handler }, loc)
            }
            TokenKind::OnError => {
                self.advance();
                let handler = self.parse_expr()?;
                self.ctx.stmt(StmtKind::OnError { handler }, loc)
            }
            TokenKind::Ws => {
                self.advance();
                let path = self.expect(TokenKind::Str, "websocket path string")?.lexeme;
                let config = if self.check(TokenKind::LBrace) {
                    self.parse_config()?
                } else {
                    Vec::new()
                };
                self.ctx.stmt(StmtKind::WsDecl { path, config }, loc)
            }
            TokenKind::Sse => {
                self.advance();
                let path = self.expect(TokenKind::Str, "SSE path string")?.lexeme;
                let handler = self.parse_expr()?;
                self.ctx.stmt(StmtKind::SseDecl { path, handler }, loc)
            }
            TokenKind::Health => {
                self.advance();
                let path = self.expect(TokenKind::Str, "health path string")?.lexeme;
                self.ctx.stmt(StmtKind::HealthDecl { path }, loc)
            }
            TokenKind::Static => {
                self.advance();
                let url_prefix = self.expect(TokenKind::Str, "URL prefix string")?.lexeme;
                let dir = self.expect(TokenKind::Str, "directory string")?.lexeme;
                self.ctx.stmt(StmtKind::StaticDecl { url_prefix, dir }, loc)
            }
            TokenKind::Schedule => {
                self.advance();
                let pattern = self.expect(TokenKind::Str, "schedule pattern string")?.lexeme;
                let handler = self.parse_expr()?;
                self.ctx.stmt(StmtKind::ScheduleDecl { pattern, handler }, loc)
            }
            TokenKind::Background => {
                self.advance();
                let is_async = self.eat(TokenKind::Async);
                let func = self.parse_func_decl(is_async, false)?;
                self.ctx.stmt(StmtKind::BackgroundDecl(func), loc)
            }
            TokenKind::Discover => {
                self.advance();
                let peer = self.expect(TokenKind::Str, "peer name string")?.lexeme;
                if !self.peek_is_word("at") {
                    return Err(self.error_here("expected 'at' after peer name".into()));
                }
                self.advance();
                let url = self.expect(TokenKind::Str, "peer URL string")?.lexeme;
                let config = if self.eat(TokenKind::With) {
                    self.parse_config()?
                } else {
                    Vec::new()
                };
                self.ctx.stmt(StmtKind::DiscoverDecl { peer, url, config }, loc)
            }
            TokenKind::Session => {
                self.advance();
                let config = self.parse_config()?;
                self.ctx.stmt(StmtKind::SessionDecl { config }, loc)
            }
            TokenKind::Upload => {
                self.advance();
                let path = self.expect(TokenKind::Str, "upload path string")?.lexeme;
                let config = if self.check(TokenKind::LBrace) {
                    self.parse_config()?
                } else {
                    Vec::new()
                };
                self.ctx.stmt(StmtKind::UploadDecl { path, config }, loc)
            }
            TokenKind::MaxBody => {
                self.advance();
                let tok = self.expect(TokenKind::Int, "byte count after 'max_body'")?;
                let bytes: i64 = self.interner.resolve(tok.lexeme).parse().unwrap_or(0);
                self.ctx.stmt(StmtKind::MaxBodyDecl { bytes }, loc)
            }
            TokenKind::Compression => {
                self.advance();
                let config = if self.check(TokenKind::LBrace) {
                    self.parse_config()?
                } else {
                    Vec::new()
                };
                self.ctx.stmt(StmtKind::CompressionDecl { config }, loc)
            }
            TokenKind::Cache => {
                self.advance();
                let config = self.parse_config()?;
                self.ctx.stmt(StmtKind::CacheDecl { config }, loc)
            }
            TokenKind::Db => {
                self.advance();
                let config = self.parse_config()?;
                self.ctx.stmt(StmtKind::DbDecl { config }, loc)
            }
            TokenKind::Tls => {
                self.advance();
                let config = self.parse_config()?;
                self.ctx.stmt(StmtKind::TlsDecl { config }, loc)
            }
            TokenKind::Env => {
                // `env NAME, OTHER` declares required variables; `env("X")`
                // stays an expression call.
                if self.peek_at(1).kind == TokenKind::LParen {
                    return Ok(None);
                }
                self.advance();
                let mut names = Vec::new();
                loop {
                    names.push(self.expect_ident("environment variable name")?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.ctx.stmt(StmtKind::EnvDecl { names }, loc)
            }
            TokenKind::Model => {
                self.advance();
                let type_name = self.expect_ident("model type name")?;
                let config = if self.check(TokenKind::LBrace) {
                    self.parse_config()?
                } else {
                    Vec::new()
                };
                self.ctx.stmt(StmtKind::ModelDecl { type_name, config }, loc)
            }
            _ => return Ok(None),
        };
        Ok(Some(stmt))
    }

    fn parse_route(&mut self, loc: crate::token::Loc) -> ParseResult<&'a Stmt<'a>> {
        let doc = self.take_doc();
        let method = self.expect_ident("HTTP method")?;
        let path = self.expect(TokenKind::Str, "route path string")?.lexeme;
        let mut decorators = Vec::new();
        if self.eat(TokenKind::With) {
            loop {
                decorators.push(self.parse_route_decorator()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let handler = if self.eat(TokenKind::FatArrow) {
            self.parse_expr()?
        } else if self.check(TokenKind::LBrace) {
            // Block handler sugar: wrap in a request lambda.
            let body = self.parse_block_expr()?;
            let req = self.interner.intern("req");
            self.ctx.expr(
                ExprKind::Lambda {
                    params: vec![crate::ast::Param {
                        name: req,
                        ty: None,
                        default: None,
                        rest: false,
                        loc,
                    }],
                    body,
                    is_async: false,
                },
                loc,
            )
        } else {
            self.parse_expr()?
        };
        Ok(self.ctx.stmt(
            StmtKind::Route(RouteDecl { method, path, decorators, handler, doc, loc }),
            loc,
        ))
    }

    fn parse_route_decorator(&mut self) -> ParseResult<RouteDecorator<'a>> {
        if self.eat(TokenKind::Auth) {
            return Ok(RouteDecorator::Auth);
        }
        if self.eat(TokenKind::Role) {
            self.expect(TokenKind::LParen, "'(' after 'role'")?;
            let name = self.expect(TokenKind::Str, "role name string")?.lexeme;
            self.expect(TokenKind::RParen, "')' after role name")?;
            return Ok(RouteDecorator::Role(name));
        }
        if self.eat(TokenKind::RateLimit) {
            self.expect(TokenKind::LParen, "'(' after 'rate_limit'")?;
            let max = self.parse_int_arg()?;
            self.expect(TokenKind::Comma, "',' between rate_limit arguments")?;
            let window = self.parse_int_arg()?;
            self.expect(TokenKind::RParen, "')' after rate_limit arguments")?;
            return Ok(RouteDecorator::RateLimit { max, window });
        }
        if self.peek_is_word("timeout") {
            self.advance();
            self.expect(TokenKind::LParen, "'(' after 'timeout'")?;
            let ms = self.parse_int_arg()?;
            self.expect(TokenKind::RParen, "')' after timeout argument")?;
            return Ok(RouteDecorator::Timeout(ms));
        }
        let name = self.expect_ident("route decorator")?;
        let mut args = Vec::new();
        if self.eat(TokenKind::LParen) {
            while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
                args.push(self.parse_expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')' to close decorator arguments")?;
        }
        Ok(RouteDecorator::Custom { name, args })
    }

    fn parse_int_arg(&mut self) -> ParseResult<i64> {
        let tok = self.expect(TokenKind::Int, "integer literal")?;
        Ok(self.interner.resolve(tok.lexeme).parse().unwrap_or(0))
    }

    fn try_parse_client_decl(&mut self) -> ParseResult<Option<&'a Stmt<'a>>> {
        let loc = self.loc();
        let stmt = match self.peek().kind {
            TokenKind::Component => {
                self.advance();
                let doc = self.take_doc();
                let name = self.expect_ident("component name")?;
                self.expect(TokenKind::LParen, "'(' after component name")?;
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                let func = FuncDecl {
                    name,
                    type_params: Vec::new(),
                    params,
                    ret_type: None,
                    body,
                    is_async: false,
                    is_pub: false,
                    is_generator: false,
                    doc,
                    loc,
                };
                self.ctx.stmt(StmtKind::Component(func), loc)
            }
            TokenKind::State => {
                if self.peek_at(1).kind == TokenKind::LParen {
                    return Ok(None);
                }
                self.advance();
                let name = self.expect_ident("state name")?;
                self.expect(TokenKind::Eq, "'=' in state declaration")?;
                let value = self.parse_expr()?;
                self.ctx.stmt(StmtKind::StateDecl { name, value }, loc)
            }
            TokenKind::Computed => {
                self.advance();
                let name = self.expect_ident("computed name")?;
                self.expect(TokenKind::Eq, "'=' in computed declaration")?;
                let value = self.parse_expr()?;
                self.ctx.stmt(StmtKind::ComputedDecl { name, value }, loc)
            }
            TokenKind::Effect => {
                self.advance();
                let body = self.parse_block()?;
                self.ctx.stmt(StmtKind::EffectDecl { body }, loc)
            }
            TokenKind::Store => {
                self.advance();
                let name = self.expect_ident("store name")?;
                let config = self.parse_config()?;
                self.ctx.stmt(StmtKind::StoreDecl { name, config }, loc)
            }
            _ => return Ok(None),
        };
        Ok(Some(stmt))
    }

    // -- type annotations ---------------------------------------------------

    /// Parses a type annotation and renders the canonical nominal text the
    /// analyzer compares structurally: `Result<Int, String>`, `[Int]`,
    /// `(Int, String)`, `Int | Nil`.
    pub(super) fn parse_type_text(&mut self) -> ParseResult<Symbol> {
        let text = self.parse_union_type()?;
        Ok(self.interner.intern(&text))
    }

    fn parse_union_type(&mut self) -> ParseResult<String> {
        let mut parts = vec![self.parse_postfix_type()?];
        while self.eat(TokenKind::Bar) {
            parts.push(self.parse_postfix_type()?);
        }
        Ok(parts.join(" | "))
    }

    fn parse_postfix_type(&mut self) -> ParseResult<String> {
        let base = self.parse_primary_type()?;
        if self.eat(TokenKind::Question) {
            return Ok(format!("{} | Nil", base));
        }
        Ok(base)
    }

    fn parse_primary_type(&mut self) -> ParseResult<String> {
        if self.eat(TokenKind::LBracket) {
            let inner = self.parse_union_type()?;
            self.expect(TokenKind::RBracket, "']' to close array type")?;
            return Ok(format!("[{}]", inner));
        }
        if self.eat(TokenKind::LParen) {
            let mut parts = vec![self.parse_union_type()?];
            while self.eat(TokenKind::Comma) {
                parts.push(self.parse_union_type()?);
            }
            self.expect(TokenKind::RParen, "')' to close tuple type")?;
            return Ok(format!("({})", parts.join(", ")));
        }
        if self.eat(TokenKind::Nil) {
            return Ok("Nil".to_string());
        }
        let name = self.expect_ident("type name")?;
        let mut text = self.interner.resolve(name).to_string();
        if self.check(TokenKind::Lt) {
            self.advance();
            let mut args = vec![self.parse_union_type()?];
            while self.eat(TokenKind::Comma) {
                args.push(self.parse_union_type()?);
            }
            self.expect(TokenKind::Gt, "'>' to close type arguments")?;
            text = format!("{}<{}>", text, args.join(", "));
        }
        Ok(text)
    }
}

/// Generator detection: a `yield` anywhere in the body, not counting nested
/// lambdas.
fn block_contains_yield(block: &Block<'_>) -> bool {
    block.iter().any(|stmt| stmt_contains_yield(stmt))
}

fn stmt_contains_yield(stmt: &Stmt<'_>) -> bool {
    match &stmt.kind {
        StmtKind::Expr(e)
        | StmtKind::Return(Some(e))
        | StmtKind::VarDecl { value: e, .. }
        | StmtKind::LetDecl { value: e, .. }
        | StmtKind::CompoundAssign { value: e, .. } => expr_contains_yield(e),
        StmtKind::Assign { value, .. } => expr_contains_yield(value),
        StmtKind::If { branches, else_body } => {
            branches
                .iter()
                .any(|(c, b)| expr_contains_yield(c) || block_contains_yield(b))
                || else_body.as_ref().map_or(false, |b| block_contains_yield(b))
        }
        StmtKind::While { cond, body } => expr_contains_yield(cond) || block_contains_yield(body),
        StmtKind::For { iterable, body, .. } => {
            expr_contains_yield(iterable) || block_contains_yield(body)
        }
        StmtKind::Guard { cond, else_body } => {
            expr_contains_yield(cond) || block_contains_yield(else_body)
        }
        StmtKind::Defer(body) => block_contains_yield(body),
        _ => false,
    }
}

fn expr_contains_yield(expr: &Expr<'_>) -> bool {
    use crate::ast::ExprKind::*;
    match &expr.kind {
        Yield { .. } => true,
        Lambda { .. } => false,
        Unary { operand, .. } => expr_contains_yield(operand),
        Binary { left, right, .. } | Logical { left, right, .. } => {
            expr_contains_yield(left) || expr_contains_yield(right)
        }
        Member { object, .. } => expr_contains_yield(object),
        Index { object, index } => expr_contains_yield(object) || expr_contains_yield(index),
        Call { callee, args } => {
            expr_contains_yield(callee) || args.iter().any(|a| expr_contains_yield(a.expr()))
        }
        Await(e) | Propagate(e) => expr_contains_yield(e),
        Block(stmts) => stmts.iter().any(|s| stmt_contains_yield(s)),
        If { branches, else_body } => {
            branches
                .iter()
                .any(|b| expr_contains_yield(b.cond) || expr_contains_yield(b.body))
                || else_body.map_or(false, expr_contains_yield)
        }
        Match { subject, arms } => {
            expr_contains_yield(subject) || arms.iter().any(|a| expr_contains_yield(a.body))
        }
        _ => false,
    }
}
