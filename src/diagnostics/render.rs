use super::{Diagnostic, Severity};
use crate::style::Style;

/// Renders a diagnostic against its source: two context lines above, one
/// below, a caret run at the column, the code in brackets, then `hint:` and
/// `fix:` lines when present.
pub fn format_diagnostic(diag: &Diagnostic, source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let line_idx = diag.line.saturating_sub(1) as usize;

    let label = match diag.severity {
        Severity::Error => Style::bold_red("error"),
        Severity::Warning => Style::bold_yellow("warning"),
    };
    let mut out = format!("{}[{}]: {}\n", label, diag.code, diag.message);
    out.push_str(&format!(
        "  {} {}:{}:{}\n",
        Style::dim("-->"),
        diag.file,
        diag.line,
        diag.column
    ));

    let first = line_idx.saturating_sub(2);
    let last = (line_idx + 1).min(lines.len().saturating_sub(1));
    for i in first..=last {
        let Some(text) = lines.get(i) else { continue };
        out.push_str(&format!(
            "{} {} {}\n",
            Style::blue(&format!("{:4}", i + 1)),
            Style::blue("|"),
            text
        ));
        if i == line_idx {
            let pad = " ".repeat(diag.column.saturating_sub(1) as usize);
            let caret_len = diag.length.unwrap_or(1).max(1) as usize;
            out.push_str(&format!(
                "     {} {}{}\n",
                Style::blue("|"),
                pad,
                Style::red(&"^".repeat(caret_len))
            ));
        }
    }

    if let Some(hint) = &diag.hint {
        out.push_str(&format!("     {} {}: {}\n", Style::blue("|"), Style::cyan("hint"), hint));
    }
    if let Some(fix) = &diag.fix {
        out.push_str(&format!(
            "     {} {}: {} -> {}\n",
            Style::blue("|"),
            Style::green("fix"),
            fix.description,
            fix.replacement
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;

    fn sample_source() -> &'static str {
        "fn test() {\n  x = 10\n  if true {\n    x = 20\n  }\n}\n"
    }

    #[test]
    fn shows_code_in_brackets_and_caret() {
        let d = Diagnostic::error("E202", "cannot reassign immutable binding 'x'", "app.tova", 4, 5);
        let rendered = format_diagnostic(&d, sample_source());
        assert!(rendered.contains("[E202]"));
        assert!(rendered.contains("x = 20"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn includes_two_context_lines_above_and_one_below() {
        let d = Diagnostic::error("E202", "cannot reassign", "app.tova", 4, 5);
        let rendered = format_diagnostic(&d, sample_source());
        assert!(rendered.contains("x = 10"));
        assert!(rendered.contains("if true {"));
        assert!(rendered.contains("  }"));
    }

    #[test]
    fn renders_hint_and_fix_lines() {
        let d = Diagnostic::error("E202", "cannot reassign", "app.tova", 4, 5)
            .with_hint("bindings are immutable by default")
            .with_fix("Declare 'x' as mutable with 'var'", "var x = ...");
        let rendered = format_diagnostic(&d, sample_source());
        assert!(rendered.contains("hint"));
        assert!(rendered.contains("fix"));
        assert!(rendered.contains("var x = ..."));
    }

    #[test]
    fn caret_length_follows_diagnostic_length() {
        let d = Diagnostic::warning("W001", "unused variable 'count'", "app.tova", 2, 3).with_length(5);
        let rendered = format_diagnostic(&d, sample_source());
        assert!(rendered.contains("^^^^^"));
    }
}
