mod decl;
mod expr;
mod jsx;
mod pattern;
mod stmt;

#[cfg(test)]
mod tests;

use crate::arena_ctx::AstContext;
use crate::ast::Program;
use crate::error::{ParseError, ParseFailure};
use crate::intern::{Interner, Symbol};
use crate::token::{Loc, Token, TokenKind};

pub(super) type ParseResult<T> = Result<T, ParseError>;

/// Hard cap on recorded syntax errors before the parser gives up.
const MAX_ERRORS: usize = 50;

/// Which block the parser is currently inside. Gates contextual keywords:
/// `db`, `model`, `route` are declarations only inside `server { }`, and so
/// on for the other targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockCtx {
    #[default]
    Module,
    Shared,
    Server,
    Client,
    Security,
    Test,
    Function,
}

impl BlockCtx {
    pub fn is_client_like(self) -> bool {
        matches!(self, BlockCtx::Client)
    }
}

/// Top-down recursive-descent Pratt parser with error recovery. Produces a
/// [`Program`] of ordered top-level declarations; on failure, every
/// successfully parsed declaration survives in the partial AST.
pub struct Parser<'a, 'int> {
    pub(super) tokens: Vec<Token>,
    pub(super) current: usize,
    pub(super) file: Symbol,
    pub(super) interner: &'int mut Interner,
    pub(super) ctx: AstContext<'a>,
    pub(super) errors: Vec<ParseError>,
    pub(super) block_ctx: BlockCtx,
    pub(super) pending_doc: Option<Symbol>,
}

impl<'a, 'int> Parser<'a, 'int> {
    pub fn new(tokens: Vec<Token>, file: Symbol, interner: &'int mut Interner, ctx: AstContext<'a>) -> Self {
        Parser {
            tokens,
            current: 0,
            file,
            interner,
            ctx,
            errors: Vec::new(),
            block_ctx: BlockCtx::Module,
            pending_doc: None,
        }
    }

    pub fn parse(mut self) -> Result<Program<'a>, ParseFailure<'a>> {
        let mut program = Program::new(self.file);

        while !self.check(TokenKind::Eof) {
            self.collect_doc();
            if self.check(TokenKind::Eof) {
                break;
            }
            match self.parse_declaration() {
                Ok(stmt) => program.decls.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    if self.errors.len() >= MAX_ERRORS {
                        break;
                    }
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(program)
        } else {
            log::debug!(
                "parse of {} failed with {} error(s), {} declaration(s) recovered",
                self.interner.resolve(self.file),
                self.errors.len(),
                program.decls.len()
            );
            Err(ParseFailure { errors: self.errors, partial: program })
        }
    }

    // -- token cursor -------------------------------------------------------

    pub(super) fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    pub(super) fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub(super) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// True when the current token can serve as an identifier, counting
    /// contextual keywords that degrade in expression position.
    pub(super) fn check_ident(&self) -> bool {
        self.peek().kind.is_ident_like()
    }

    pub(super) fn advance(&mut self) -> Token {
        let tok = self.tokens[self.current.min(self.tokens.len() - 1)].clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        tok
    }

    pub(super) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "expected {}, found '{}'",
                what,
                self.describe_current()
            )))
        }
    }

    pub(super) fn expect_ident(&mut self, what: &str) -> ParseResult<Symbol> {
        if self.check_ident() {
            Ok(self.advance().lexeme)
        } else {
            Err(self.error_here(format!(
                "expected {}, found '{}'",
                what,
                self.describe_current()
            )))
        }
    }

    pub(super) fn describe_current(&self) -> String {
        let tok = self.peek();
        if tok.kind == TokenKind::Eof {
            "end of file".to_string()
        } else {
            self.interner.resolve(tok.lexeme).to_string()
        }
    }

    pub(super) fn loc(&self) -> Loc {
        self.peek().loc(self.file)
    }

    pub(super) fn loc_of(&self, tok: &Token) -> Loc {
        tok.loc(self.file)
    }

    pub(super) fn error_here(&self, message: String) -> ParseError {
        ParseError::new(message, self.loc())
    }

    /// Lexeme check against a contextual keyword spelled as text.
    pub(super) fn peek_is_word(&self, word: &str) -> bool {
        self.check_ident() && self.interner.resolve(self.peek().lexeme) == word
    }

    // -- docstrings ---------------------------------------------------------

    /// Buffers consecutive `///` lines so they attach to the declaration
    /// that follows.
    pub(super) fn collect_doc(&mut self) {
        let mut parts: Vec<String> = Vec::new();
        while self.check(TokenKind::DocComment) {
            let tok = self.advance();
            parts.push(self.interner.resolve(tok.lexeme).to_string());
        }
        if !parts.is_empty() {
            self.pending_doc = Some(self.interner.intern(&parts.join("\n")));
        }
    }

    pub(super) fn take_doc(&mut self) -> Option<Symbol> {
        self.pending_doc.take()
    }

    // -- recovery -----------------------------------------------------------

    /// Discards tokens until the next synchronization point: a token that
    /// starts a top-level declaration, or a closing brace at depth zero.
    /// At most one good declaration can be lost per recorded error.
    pub(super) fn synchronize(&mut self) {
        let mut depth = 0usize;
        // Step over the offending token so recovery always makes progress.
        if !self.check(TokenKind::Eof) {
            self.advance();
        }
        while !self.check(TokenKind::Eof) {
            let kind = self.peek().kind;
            match kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                _ if depth == 0 && kind.starts_declaration() => return,
                _ => {}
            }
            self.advance();
        }
    }
}
