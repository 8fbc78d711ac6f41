use crate::diagnostics::IgnoreDirective;
use crate::error::{LexError, LexErrorKind};
use crate::intern::{Interner, Symbol};
use crate::token::{keyword_kind, Span, Token, TokenKind};
use unicode_ident::{is_xid_continue, is_xid_start};

/// Per-string scan state; one entry per string currently open across
/// interpolation splices.
struct StringState {
    /// A `StrStart` part has already been emitted for this string.
    started: bool,
    /// Line/column of the opening quote, for unterminated-string errors.
    line: u32,
    column: u32,
}

/// Open interpolation splice: counts `{`/`}` nesting so object literals
/// inside `{expr}` do not terminate the splice early.
struct InterpFrame {
    brace_depth: usize,
}

/// Converts source text into a token stream terminated by a synthetic EOF.
pub struct Lexer<'s, 'int> {
    source: &'s str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: u32,
    column: u32,
    interner: &'int mut Interner,
    tokens: Vec<Token>,
    strings: Vec<StringState>,
    interp: Vec<InterpFrame>,
    directives: Vec<IgnoreDirective>,
}

impl<'s, 'int> Lexer<'s, 'int> {
    pub fn new(source: &'s str, interner: &'int mut Interner) -> Self {
        Lexer {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
            line: 1,
            column: 1,
            interner,
            tokens: Vec::new(),
            strings: Vec::new(),
            interp: Vec::new(),
            directives: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<(Vec<Token>, Vec<IgnoreDirective>), LexError> {
        while !self.at_end() {
            self.skip_trivia()?;
            if self.at_end() {
                break;
            }
            self.scan_token()?;
        }
        if let Some(state) = self.strings.last() {
            return Err(LexError::new(LexErrorKind::UnterminatedString, state.line, state.column));
        }
        let eof = self.interner.intern("");
        let end = self.source.len();
        self.tokens.push(Token::new(TokenKind::Eof, eof, Span::new(end, end), self.line, self.column));
        let directives = std::mem::take(&mut self.directives);
        Ok((self.tokens, directives))
    }

    // -- character helpers --------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|&(_, c)| c)
    }

    fn byte_pos(&self) -> usize {
        self.chars.get(self.pos).map(|&(i, _)| i).unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> Option<char> {
        let &(_, c) = self.chars.get(self.pos)?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn push(&mut self, kind: TokenKind, lexeme: &str, span: Span, line: u32, column: u32) {
        let sym = self.interner.intern(lexeme);
        self.tokens.push(Token::new(kind, sym, span, line, column));
    }

    fn last_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|t| t.kind)
    }

    // -- trivia -------------------------------------------------------------

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    if self.peek_at(2) == Some('/') {
                        self.scan_doc_comment();
                    } else {
                        self.scan_line_comment();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.scan_block_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_line_comment(&mut self) {
        let line = self.line;
        let start = self.byte_pos();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        let text = &self.source[start..self.byte_pos()];
        let body = text.trim_start_matches('/').trim();
        if let Some(rest) = body.strip_prefix("tova-ignore") {
            let codes: Vec<String> = rest
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !codes.is_empty() {
                self.directives.push(IgnoreDirective { line, codes });
            }
        }
    }

    fn scan_doc_comment(&mut self) {
        let line = self.line;
        let column = self.column;
        let start = self.byte_pos();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        let end = self.byte_pos();
        let text = self.source[start..end].trim_start_matches('/').trim().to_string();
        self.push(TokenKind::DocComment, &text, Span::new(start, end), line, column);
    }

    fn scan_block_comment(&mut self) -> Result<(), LexError> {
        let line = self.line;
        let column = self.column;
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                None => return Err(LexError::new(LexErrorKind::UnterminatedComment, line, column)),
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // -- token scanning -----------------------------------------------------

    fn scan_token(&mut self) -> Result<(), LexError> {
        let line = self.line;
        let column = self.column;
        let start = self.byte_pos();
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(()),
        };

        if c.is_ascii_digit() {
            return self.scan_number(start, line, column);
        }
        if c == '"' {
            self.advance();
            self.strings.push(StringState { started: false, line, column });
            return self.scan_string_piece();
        }
        if c == '\'' {
            return self.scan_single_quoted(start, line, column);
        }
        if c == 'r' && self.peek_at(1) == Some('"') {
            return self.scan_raw_string(start, line, column);
        }
        if is_xid_start(c) || c == '_' {
            return self.scan_identifier(start, line, column);
        }
        if c == '/' && self.last_kind().map_or(true, |k| k.allows_regex_after()) {
            return self.scan_regex(start, line, column);
        }

        self.advance();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => {
                if let Some(frame) = self.interp.last_mut() {
                    frame.brace_depth += 1;
                }
                TokenKind::LBrace
            }
            '}' => {
                let closes_splice = match self.interp.last_mut() {
                    Some(frame) if frame.brace_depth == 0 => true,
                    Some(frame) => {
                        frame.brace_depth -= 1;
                        false
                    }
                    None => false,
                };
                if closes_splice {
                    self.interp.pop();
                    return self.scan_string_piece();
                }
                TokenKind::RBrace
            }
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '@' => TokenKind::At,
            '#' => TokenKind::Hash,
            '.' => {
                if self.eat('.') {
                    if self.eat('=') {
                        TokenKind::DotDotEq
                    } else if self.eat('.') {
                        TokenKind::Spread
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    TokenKind::Dot
                }
            }
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('>') {
                    TokenKind::Arrow
                } else if self.eat('=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    TokenKind::StarStar
                } else if self.eat('=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else if self.eat('>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '?' => {
                if self.eat('?') {
                    if self.eat('=') {
                        TokenKind::QuestionQuestionEq
                    } else {
                        TokenKind::QuestionQuestion
                    }
                } else if self.eat('.') {
                    TokenKind::QuestionDot
                } else {
                    TokenKind::Question
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::AmpAmp
                } else {
                    return Err(LexError::new(LexErrorKind::LoneAmpersand, line, column));
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::BarBar
                } else if self.eat('>') {
                    TokenKind::PipeOp
                } else if self.in_type_context() {
                    TokenKind::Bar
                } else {
                    return Err(LexError::new(LexErrorKind::LoneBar, line, column));
                }
            }
            other => return Err(LexError::new(LexErrorKind::InvalidCharacter(other), line, column)),
        };
        let end = self.byte_pos();
        let lexeme = &self.source[start..end];
        self.push(kind, lexeme, Span::new(start, end), line, column);
        Ok(())
    }

    /// A lone `|` is a union separator only when the previous token could
    /// end a type: a capitalized name, `]`, `>`, `)`, or `nil`.
    fn in_type_context(&self) -> bool {
        match self.tokens.last() {
            Some(tok) => match tok.kind {
                TokenKind::RBracket | TokenKind::Gt | TokenKind::RParen | TokenKind::Nil => true,
                TokenKind::Ident => self
                    .interner
                    .resolve(tok.lexeme)
                    .chars()
                    .next()
                    .map_or(false, |c| c.is_uppercase()),
                _ => false,
            },
            None => false,
        }
    }

    fn scan_number(&mut self, start: usize, line: u32, column: u32) -> Result<(), LexError> {
        let mut is_float = false;

        if self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x') | Some('b') | Some('o') | Some('X') | Some('B') | Some('O'))
        {
            self.advance();
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
        } else {
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            // A decimal point only when a digit follows; `1..3` stays a range.
            if self.peek() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                self.advance();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() || c == '_' {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            if matches!(self.peek(), Some('e') | Some('E'))
                && self
                    .peek_at(1)
                    .map_or(false, |c| c.is_ascii_digit() || c == '+' || c == '-')
            {
                is_float = true;
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        let end = self.byte_pos();
        let raw: String = self.source[start..end].chars().filter(|&c| c != '_').collect();
        let kind = if is_float { TokenKind::Float } else { TokenKind::Int };
        self.push(kind, &raw, Span::new(start, end), line, column);
        Ok(())
    }

    fn scan_identifier(&mut self, start: usize, line: u32, column: u32) -> Result<(), LexError> {
        self.advance();
        while let Some(c) = self.peek() {
            if is_xid_continue(c) || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.byte_pos();
        let word = &self.source[start..end];
        let kind = keyword_kind(word).unwrap_or(TokenKind::Ident);
        self.push(kind, word, Span::new(start, end), line, column);
        Ok(())
    }

    /// Scans one piece of a double-quoted string: from the position just
    /// after an opening quote or a closing interpolation brace, up to either
    /// the next `{expr}` splice or the closing quote.
    fn scan_string_piece(&mut self) -> Result<(), LexError> {
        let state_line;
        let state_col;
        {
            let state = match self.strings.last() {
                Some(s) => s,
                None => return Ok(()),
            };
            state_line = state.line;
            state_col = state.column;
        }
        let line = self.line;
        let column = self.column;
        let start = self.byte_pos();
        let mut text = String::new();

        loop {
            match self.peek() {
                None => {
                    return Err(LexError::new(LexErrorKind::UnterminatedString, state_line, state_col))
                }
                Some('"') => {
                    self.advance();
                    let end = self.byte_pos();
                    let state = self.strings.pop().expect("string state present");
                    let kind = if state.started { TokenKind::StrEnd } else { TokenKind::Str };
                    self.push(kind, &text, Span::new(start, end), line, column);
                    return Ok(());
                }
                Some('{') => {
                    self.advance();
                    let end = self.byte_pos();
                    let started = {
                        let state = self.strings.last_mut().expect("string state present");
                        let was = state.started;
                        state.started = true;
                        was
                    };
                    let kind = if started { TokenKind::StrMid } else { TokenKind::StrStart };
                    self.push(kind, &text, Span::new(start, end), line, column);
                    self.interp.push(InterpFrame { brace_depth: 0 });
                    return Ok(());
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some('\\') => text.push('\\'),
                        Some('"') => text.push('"'),
                        Some('{') => text.push('{'),
                        Some(other) => {
                            text.push('\\');
                            text.push(other);
                        }
                        None => {
                            return Err(LexError::new(
                                LexErrorKind::UnterminatedString,
                                state_line,
                                state_col,
                            ))
                        }
                    }
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }
    }

    fn scan_single_quoted(&mut self, start: usize, line: u32, column: u32) -> Result<(), LexError> {
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError::new(LexErrorKind::UnterminatedString, line, column))
                }
                Some('\'') => {
                    self.advance();
                    let end = self.byte_pos();
                    self.push(TokenKind::Str, &text, Span::new(start, end), line, column);
                    return Ok(());
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('\\') => text.push('\\'),
                        Some('\'') => text.push('\''),
                        Some(other) => {
                            text.push('\\');
                            text.push(other);
                        }
                        None => {
                            return Err(LexError::new(LexErrorKind::UnterminatedString, line, column))
                        }
                    }
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }
    }

    fn scan_raw_string(&mut self, start: usize, line: u32, column: u32) -> Result<(), LexError> {
        self.advance();
        self.advance();
        let content_start = self.byte_pos();
        loop {
            match self.peek() {
                None => return Err(LexError::new(LexErrorKind::UnterminatedString, line, column)),
                Some('"') => {
                    let content_end = self.byte_pos();
                    self.advance();
                    let end = self.byte_pos();
                    let text = self.source[content_start..content_end].to_string();
                    self.push(TokenKind::RawStr, &text, Span::new(start, end), line, column);
                    return Ok(());
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn scan_regex(&mut self, start: usize, line: u32, column: u32) -> Result<(), LexError> {
        self.advance();
        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError::new(LexErrorKind::UnterminatedRegex, line, column))
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some('[') => {
                    in_class = true;
                    self.advance();
                }
                Some(']') => {
                    in_class = false;
                    self.advance();
                }
                Some('/') if !in_class => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.byte_pos();
        let lexeme = &self.source[start..end];
        self.push(TokenKind::Regex, lexeme, Span::new(start, end), line, column);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new(source, &mut interner).tokenize().expect("lex ok");
        tokens
    }

    fn lex_kinds(source: &str) -> Vec<TokenKind> {
        lex(source).iter().map(|t| t.kind).collect()
    }

    fn lex_err(source: &str) -> LexError {
        let mut interner = Interner::new();
        Lexer::new(source, &mut interner).tokenize().expect_err("lex should fail")
    }

    #[test]
    fn empty_source_yields_only_eof() {
        assert_eq!(lex_kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn numbers_with_underscores_and_radixes() {
        let tokens = lex("1_000_000 0xFF 0b1010 0o17 3.14 1e9 2.5e-3");
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[1].kind, TokenKind::Int);
        assert_eq!(tokens[2].kind, TokenKind::Int);
        assert_eq!(tokens[3].kind, TokenKind::Int);
        assert_eq!(tokens[4].kind, TokenKind::Float);
        assert_eq!(tokens[5].kind, TokenKind::Float);
        assert_eq!(tokens[6].kind, TokenKind::Float);
    }

    #[test]
    fn underscores_are_stripped_from_number_lexemes() {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new("1_000", &mut interner).tokenize().unwrap();
        assert_eq!(interner.resolve(tokens[0].lexeme), "1000");
    }

    #[test]
    fn range_after_integer_is_not_a_float() {
        assert_eq!(
            lex_kinds("1..5"),
            vec![TokenKind::Int, TokenKind::DotDot, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn plain_string_is_single_token() {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new(r#""hello world""#, &mut interner).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(interner.resolve(tokens[0].lexeme), "hello world");
    }

    #[test]
    fn escapes_are_processed() {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new(r#""a\nb\{c""#, &mut interner).tokenize().unwrap();
        assert_eq!(interner.resolve(tokens[0].lexeme), "a\nb{c");
    }

    #[test]
    fn interpolated_string_produces_parts() {
        let kinds = lex_kinds(r#""total: {count} items""#);
        assert_eq!(
            kinds,
            vec![TokenKind::StrStart, TokenKind::Ident, TokenKind::StrEnd, TokenKind::Eof]
        );
    }

    #[test]
    fn interpolation_with_object_literal_balances_braces() {
        let kinds = lex_kinds(r#""v: {f({x: 1})}""#);
        assert!(kinds.contains(&TokenKind::StrStart));
        assert!(kinds.contains(&TokenKind::LBrace));
        assert!(kinds.contains(&TokenKind::StrEnd));
        assert_eq!(*kinds.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn nested_interpolation_is_permitted() {
        let kinds = lex_kinds(r#""outer {"inner {x}"} done""#);
        let starts = kinds.iter().filter(|&&k| k == TokenKind::StrStart).count();
        let ends = kinds.iter().filter(|&&k| k == TokenKind::StrEnd).count();
        assert_eq!(starts, 2);
        assert_eq!(ends, 2);
    }

    #[test]
    fn raw_string_preserves_backslashes() {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new(r#"r"a\nb""#, &mut interner).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::RawStr);
        assert_eq!(interner.resolve(tokens[0].lexeme), "a\\nb");
    }

    #[test]
    fn unterminated_string_reports_open_quote_position() {
        let err = lex_err("x = \"abc");
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.column, 5);
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let err = lex_err("/* never closed");
        assert_eq!(err.kind, LexErrorKind::UnterminatedComment);
    }

    #[test]
    fn doc_comment_is_captured_as_token() {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new("/// Adds two ints\nfn add() {}", &mut interner)
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::DocComment);
        assert_eq!(interner.resolve(tokens[0].lexeme), "Adds two ints");
    }

    #[test]
    fn tova_ignore_directive_is_recorded() {
        let mut interner = Interner::new();
        let (_, directives) = Lexer::new("// tova-ignore W001, E202\nx = 1", &mut interner)
            .tokenize()
            .unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].line, 1);
        assert_eq!(directives[0].codes, vec!["W001".to_string(), "E202".to_string()]);
    }

    #[test]
    fn regex_allowed_after_operator_but_not_after_value() {
        let kinds = lex_kinds("x = /ab+c/gi");
        assert!(kinds.contains(&TokenKind::Regex));
        let kinds = lex_kinds("a / b");
        assert!(kinds.contains(&TokenKind::Slash));
        assert!(!kinds.contains(&TokenKind::Regex));
    }

    #[test]
    fn regex_after_lparen_and_comma() {
        let kinds = lex_kinds("match(/a/, /b/)");
        assert_eq!(kinds.iter().filter(|&&k| k == TokenKind::Regex).count(), 2);
    }

    #[test]
    fn lone_ampersand_suggests_double() {
        let err = lex_err("a & b");
        assert_eq!(err.kind, LexErrorKind::LoneAmpersand);
        assert!(err.hint().unwrap().contains("&&"));
    }

    #[test]
    fn lone_bar_errors_outside_type_context() {
        let err = lex_err("a | b");
        assert_eq!(err.kind, LexErrorKind::LoneBar);
    }

    #[test]
    fn bar_is_union_after_type_name() {
        let kinds = lex_kinds("Int | Nil");
        assert!(kinds.contains(&TokenKind::Bar));
    }

    #[test]
    fn unicode_identifiers_lex() {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new("naïve = 1", &mut interner).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(interner.resolve(tokens[0].lexeme), "naïve");
    }

    #[test]
    fn keywords_and_contextuals_are_classified() {
        let kinds = lex_kinds("fn server db match");
        assert_eq!(
            kinds,
            vec![TokenKind::Fn, TokenKind::Server, TokenKind::Db, TokenKind::Match, TokenKind::Eof]
        );
    }

    #[test]
    fn multi_char_operators() {
        let kinds = lex_kinds("|> ?? ?. => -> .. ..= ** ++ += !=");
        assert_eq!(
            kinds,
            vec![
                TokenKind::PipeOp,
                TokenKind::QuestionQuestion,
                TokenKind::QuestionDot,
                TokenKind::FatArrow,
                TokenKind::Arrow,
                TokenKind::DotDot,
                TokenKind::DotDotEq,
                TokenKind::StarStar,
                TokenKind::PlusPlus,
                TokenKind::PlusEq,
                TokenKind::NotEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn token_positions_are_one_based() {
        let tokens = lex("a\n  b");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn every_token_line_is_within_source() {
        let source = "fn f() {\n  x = 1\n  y = 2\n}\n";
        let line_count = source.lines().count() as u32;
        for tok in lex(source) {
            assert!(tok.line >= 1 && tok.line <= line_count + 1);
        }
    }
}
