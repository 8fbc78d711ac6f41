use crate::ast::Program;
use crate::style::Style;
use crate::token::Loc;
use thiserror::Error;

/// Lexer failure with a precise position.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedComment,
    UnterminatedRegex,
    InvalidCharacter(char),
    LoneAmpersand,
    LoneBar,
}

impl LexError {
    pub fn new(kind: LexErrorKind, line: u32, column: u32) -> Self {
        LexError { kind, line, column }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            LexErrorKind::UnterminatedString => "unterminated string literal".to_string(),
            LexErrorKind::UnterminatedComment => "unterminated block comment".to_string(),
            LexErrorKind::UnterminatedRegex => "unterminated regex literal".to_string(),
            LexErrorKind::InvalidCharacter(c) => format!("invalid character '{}'", c),
            LexErrorKind::LoneAmpersand => "unexpected '&'".to_string(),
            LexErrorKind::LoneBar => "unexpected '|'".to_string(),
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self.kind {
            LexErrorKind::LoneAmpersand => Some("did you mean '&&'?"),
            LexErrorKind::LoneBar => Some("did you mean '||'?"),
            _ => None,
        }
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}:{}", self.message(), self.line, self.column)?;
        if let Some(hint) = self.hint() {
            write!(f, " ({})", hint)?;
        }
        Ok(())
    }
}

/// One recorded syntax error. The parser keeps going after each of these
/// until it hits the error cap.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub loc: Loc,
}

impl ParseError {
    pub fn new(message: impl Into<String>, loc: Loc) -> Self {
        ParseError { message: message.into(), loc }
    }

    /// Render with two lines of leading context, a caret run, and the
    /// message, in the compiler's standard error shape.
    pub fn display_with_source(&self, source: &str) -> String {
        let line_idx = self.loc.line.saturating_sub(1) as usize;
        let lines: Vec<&str> = source.lines().collect();
        let mut out = format!("{}: {}\n", Style::bold_red("error"), self.message);

        let first = line_idx.saturating_sub(2);
        for i in first..=line_idx.min(lines.len().saturating_sub(1)) {
            out.push_str(&format!(
                "{} {} {}\n",
                Style::blue(&format!("{:4}", i + 1)),
                Style::blue("|"),
                lines.get(i).unwrap_or(&"")
            ));
        }
        let caret_pad = " ".repeat(self.loc.column.saturating_sub(1) as usize);
        out.push_str(&format!(
            "     {} {}{}\n",
            Style::blue("|"),
            caret_pad,
            Style::red("^")
        ));
        out
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.loc.line, self.loc.column)
    }
}

/// Error bundle thrown when parsing fails: everything that went wrong plus
/// every declaration that still parsed.
#[derive(Debug)]
pub struct ParseFailure<'a> {
    pub errors: Vec<ParseError>,
    pub partial: Program<'a>,
}

impl<'a> std::fmt::Display for ParseFailure<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} syntax error(s)", self.errors.len())
    }
}

/// Top-level pipeline error surfaced by [`crate::compile`].
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{0}")]
    Lex(LexError),
    #[error("{} syntax error(s) in {file}", .errors.len())]
    Parse { file: String, errors: Vec<ParseError> },
    #[error("{count} analysis error(s) in {file}")]
    Analysis { file: String, count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_carries_hint_for_lone_ampersand() {
        let err = LexError::new(LexErrorKind::LoneAmpersand, 1, 5);
        assert!(err.hint().unwrap().contains("&&"));
        assert!(format!("{}", err).contains("1:5"));
    }

    #[test]
    fn parse_error_render_shows_caret_under_column() {
        let err = ParseError::new("expected expression", Loc { file: Default::default(), line: 1, column: 5 });
        let rendered = err.display_with_source("x = = 1");
        assert!(rendered.contains("expected expression"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn parse_error_render_includes_context_lines() {
        let source = "a = 1\nb = 2\nc = ?\n";
        let err = ParseError::new("bad token", Loc { file: Default::default(), line: 3, column: 5 });
        let rendered = err.display_with_source(source);
        assert!(rendered.contains("a = 1"));
        assert!(rendered.contains("b = 2"));
        assert!(rendered.contains("c = ?"));
    }
}
