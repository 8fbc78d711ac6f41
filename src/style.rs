use std::sync::atomic::{AtomicBool, Ordering};

static COLOR_ENABLED: AtomicBool = AtomicBool::new(true);

/// ANSI styling for human-readable diagnostics. Disabled globally when the
/// output is not a terminal.
pub struct Style;

impl Style {
    pub fn set_enabled(enabled: bool) {
        COLOR_ENABLED.store(enabled, Ordering::Relaxed);
    }

    pub fn enabled() -> bool {
        COLOR_ENABLED.load(Ordering::Relaxed)
    }

    fn wrap(code: &str, text: &str) -> String {
        if Self::enabled() {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    pub fn bold_red(text: &str) -> String {
        Self::wrap("1;31", text)
    }

    pub fn bold_yellow(text: &str) -> String {
        Self::wrap("1;33", text)
    }

    pub fn red(text: &str) -> String {
        Self::wrap("31", text)
    }

    pub fn green(text: &str) -> String {
        Self::wrap("32", text)
    }

    pub fn blue(text: &str) -> String {
        Self::wrap("34", text)
    }

    pub fn cyan(text: &str) -> String {
        Self::wrap("36", text)
    }

    pub fn dim(text: &str) -> String {
        Self::wrap("2", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colored_output_contains_escape_codes() {
        Style::set_enabled(true);
        assert!(Style::bold_red("error").contains("\x1b[1;31m"));
        assert!(Style::cyan("hint").ends_with("\x1b[0m"));
    }

    #[test]
    fn disabled_style_passes_text_through() {
        Style::set_enabled(false);
        assert_eq!(Style::red("plain"), "plain");
        Style::set_enabled(true);
    }
}
