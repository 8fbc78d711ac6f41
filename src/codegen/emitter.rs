use crate::token::Loc;

/// One `(source_line, source_col, out_line, out_col)` record.
pub type Mapping = (u32, u32, u32, u32);

/// Per-target output buffer. Statement emitters record a source mapping at
/// the start of each emitted line; appending line-by-line keeps output
/// positions monotone, which the source map format relies on.
pub struct Emitter {
    out: String,
    indent: usize,
    out_line: u32,
    mappings: Vec<Mapping>,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            out: String::new(),
            indent: 0,
            out_line: 1,
            mappings: Vec::new(),
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    fn pad(&self) -> String {
        "  ".repeat(self.indent)
    }

    /// Writes one line at the current indent.
    pub fn line(&mut self, text: &str) {
        self.out.push_str(&self.pad());
        self.out.push_str(text);
        self.out.push('\n');
        self.out_line += 1;
    }

    /// Writes a line and records a mapping from `loc` to its start.
    pub fn stmt(&mut self, loc: Loc, text: &str) {
        let col = (self.pad().len() + 1) as u32;
        self.mappings.push((loc.line, loc.column, self.out_line, col));
        self.line(text);
    }

    /// Records a mapping for the next line without writing yet.
    pub fn map_here(&mut self, loc: Loc) {
        let col = (self.pad().len() + 1) as u32;
        self.mappings.push((loc.line, loc.column, self.out_line, col));
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
        self.out_line += 1;
    }

    /// Verbatim multi-line template text, re-indented to the current level.
    pub fn template(&mut self, text: &str) {
        for line in text.trim_matches('\n').lines() {
            if line.trim().is_empty() {
                self.blank();
            } else {
                self.line(line);
            }
        }
    }

    pub fn current_line(&self) -> u32 {
        self.out_line
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn finish(self) -> (String, Vec<Mapping>) {
        (self.out, self.mappings)
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Loc;

    fn loc(line: u32, column: u32) -> Loc {
        Loc { file: Default::default(), line, column }
    }

    #[test]
    fn lines_are_indented_and_counted() {
        let mut e = Emitter::new();
        e.line("function f() {");
        e.indent();
        e.line("return 1;");
        e.dedent();
        e.line("}");
        let (out, _) = e.finish();
        assert_eq!(out, "function f() {\n  return 1;\n}\n");
    }

    #[test]
    fn stmt_records_mapping_at_line_start() {
        let mut e = Emitter::new();
        e.stmt(loc(3, 5), "let x = 1;");
        let (_, mappings) = e.finish();
        assert_eq!(mappings, vec![(3, 5, 1, 1)]);
    }

    #[test]
    fn output_lines_are_monotone_for_same_source_line() {
        let mut e = Emitter::new();
        e.stmt(loc(1, 1), "a;");
        e.stmt(loc(1, 8), "b;");
        e.stmt(loc(2, 1), "c;");
        let (_, mappings) = e.finish();
        let same_line: Vec<_> = mappings.iter().filter(|m| m.0 == 1).collect();
        assert!(same_line.windows(2).all(|w| {
            let ordered_out = w[0].2 <= w[1].2;
            let ordered_col = w[0].1 <= w[1].1;
            ordered_out == ordered_col || w[0].2 == w[1].2
        }));
    }

    #[test]
    fn template_reindents_block_text() {
        let mut e = Emitter::new();
        e.indent();
        e.template("const a = 1;\nconst b = 2;");
        let (out, _) = e.finish();
        assert_eq!(out, "  const a = 1;\n  const b = 2;\n");
    }
}
