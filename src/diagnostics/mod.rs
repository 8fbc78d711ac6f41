mod codes;
mod render;
pub mod suggest;

pub use codes::{explain, CodeInfo};
pub use render::format_diagnostic;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Machine-applicable remedy attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fix {
    pub description: String,
    pub replacement: String,
}

/// One analyzer finding. Serializable as
/// `{severity, code, message, file, line, column, length?, hint?, fix?}`.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>, file: &str, line: u32, column: u32) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: code.to_string(),
            message: message.into(),
            file: file.to_string(),
            line,
            column,
            length: None,
            hint: None,
            fix: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>, file: &str, line: u32, column: u32) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
            file: file.to_string(),
            line,
            column,
            length: None,
            hint: None,
            fix: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_fix(mut self, description: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.fix = Some(Fix {
            description: description.into(),
            replacement: replacement.into(),
        });
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Warnings promoted to errors under `--strict`.
    pub fn promote(mut self) -> Self {
        self.severity = Severity::Error;
        self
    }
}

/// `// tova-ignore CODE[, CODE]*` directive captured by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct IgnoreDirective {
    pub line: u32,
    pub codes: Vec<String>,
}

/// Drops diagnostics suppressed by an ignore directive on the same or the
/// preceding source line.
pub fn apply_suppressions(diags: Vec<Diagnostic>, directives: &[IgnoreDirective]) -> Vec<Diagnostic> {
    if directives.is_empty() {
        return diags;
    }
    diags
        .into_iter()
        .filter(|d| {
            !directives.iter().any(|dir| {
                (dir.line == d.line || dir.line + 1 == d.line)
                    && dir.codes.iter().any(|c| c == &d.code)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag_at(code: &str, line: u32) -> Diagnostic {
        Diagnostic::warning(code, "unused variable 'x'", "app.tova", line, 1)
    }

    #[test]
    fn serializes_without_empty_optionals() {
        let d = diag_at("W001", 3);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"code\":\"W001\""));
        assert!(!json.contains("hint"));
        assert!(!json.contains("fix"));
    }

    #[test]
    fn fix_round_trips_through_json() {
        let d = diag_at("E202", 1).with_fix("Declare 'x' as mutable with 'var'", "var x = ...");
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("var x = ..."));
    }

    #[test]
    fn suppression_matches_same_line() {
        let dirs = vec![IgnoreDirective { line: 3, codes: vec!["W001".into()] }];
        let kept = apply_suppressions(vec![diag_at("W001", 3)], &dirs);
        assert!(kept.is_empty());
    }

    #[test]
    fn suppression_matches_preceding_line() {
        let dirs = vec![IgnoreDirective { line: 2, codes: vec!["W001".into()] }];
        let kept = apply_suppressions(vec![diag_at("W001", 3)], &dirs);
        assert!(kept.is_empty());
    }

    #[test]
    fn suppression_requires_matching_code() {
        let dirs = vec![IgnoreDirective { line: 3, codes: vec!["W002".into()] }];
        let kept = apply_suppressions(vec![diag_at("W001", 3)], &dirs);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn promote_turns_warning_into_error() {
        assert!(diag_at("W101", 1).promote().is_error());
    }
}
