//! End-to-end compilation pipeline:
//! source text -> tokens -> AST -> diagnostics -> JavaScript outputs.
//!
//! Per-file state is fully local; a driver may compile many files, each
//! with its own lexer, parser, analyzer, and generator, sharing nothing.

use crate::analysis::{AnalyzeOptions, Analyzer};
use crate::arena::Arena;
use crate::arena_ctx::AstContext;
use crate::codegen::{CodeGenerator, CompileOutput, GenOptions};
use crate::diagnostics::{apply_suppressions, Diagnostic};
use crate::error::CompileError;
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::token::TokenKind;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Promote the designated warning subset to errors and tighten
    /// `Unknown` assignability.
    pub strict: bool,
    /// Collect analyzer errors instead of failing the pipeline (IDE mode).
    pub tolerant: bool,
    /// Force ES-module output.
    pub module: bool,
}

/// A finished compilation: the generated outputs plus every diagnostic
/// that survived suppression.
#[derive(Debug)]
pub struct Compilation {
    pub output: CompileOutput,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn compile(source: &str) -> Result<Compilation, CompileError> {
    compile_with_options(source, "main.tova", CompileOptions::default())
}

pub fn compile_with_options(
    source: &str,
    file_name: &str,
    options: CompileOptions,
) -> Result<Compilation, CompileError> {
    let mut interner = Interner::new();
    let file = interner.intern(file_name);

    let lexer = Lexer::new(source, &mut interner);
    let (tokens, directives) = lexer.tokenize().map_err(CompileError::Lex)?;
    log::debug!("{}: lexed {} token(s)", file_name, tokens.len());

    let exprs = Arena::new();
    let stmts = Arena::new();
    let pats = Arena::new();
    let ctx = AstContext::new(&exprs, &stmts, &pats);
    let parser = Parser::new(tokens, file, &mut interner, ctx);
    let program = match parser.parse() {
        Ok(program) => program,
        Err(failure) => {
            return Err(CompileError::Parse {
                file: file_name.to_string(),
                errors: failure.errors,
            });
        }
    };

    let analyzer = Analyzer::new(file, &mut interner, AnalyzeOptions { strict: options.strict });
    let diagnostics = apply_suppressions(analyzer.analyze(&program), &directives);

    let error_count = diagnostics.iter().filter(|d| d.is_error()).count();
    if error_count > 0 && !options.tolerant {
        return Err(CompileError::Analysis {
            file: file_name.to_string(),
            count: error_count,
        });
    }

    let generator = CodeGenerator::new(&program, &interner, GenOptions { module: options.module });
    let output = generator.generate();

    Ok(Compilation { output, diagnostics })
}

/// Analyzer-only entry point: always tolerant, never generates code.
pub fn check(source: &str, file_name: &str, strict: bool) -> Result<Vec<Diagnostic>, CompileError> {
    let mut interner = Interner::new();
    let file = interner.intern(file_name);

    let lexer = Lexer::new(source, &mut interner);
    let (tokens, directives) = lexer.tokenize().map_err(CompileError::Lex)?;

    let exprs = Arena::new();
    let stmts = Arena::new();
    let pats = Arena::new();
    let ctx = AstContext::new(&exprs, &stmts, &pats);
    let parser = Parser::new(tokens, file, &mut interner, ctx);
    let program = match parser.parse() {
        Ok(program) => program,
        Err(failure) => {
            return Err(CompileError::Parse {
                file: file_name.to_string(),
                errors: failure.errors,
            });
        }
    };

    let analyzer = Analyzer::new(file, &mut interner, AnalyzeOptions { strict });
    Ok(apply_suppressions(analyzer.analyze(&program), &directives))
}

// -- multi-file driver ------------------------------------------------------

/// Per-file result of a multi-module build.
#[derive(Debug)]
pub struct ModuleResult {
    pub file: String,
    pub result: Result<Compilation, CompileError>,
}

/// Compiles a set of files, detecting circular imports with an in-progress
/// set. A file importing something already on the stack gets a
/// `W_CIRCULAR_IMPORT` warning naming both files, and the cycle edge is
/// treated as an empty module; compilation always terminates.
pub fn compile_modules(files: &[(String, String)]) -> Vec<ModuleResult> {
    let sources: HashMap<&str, &str> = files
        .iter()
        .map(|(name, source)| (name.as_str(), source.as_str()))
        .collect();
    let mut in_progress: HashSet<String> = HashSet::new();
    let mut done: HashSet<String> = HashSet::new();
    let mut warnings: HashMap<String, Vec<Diagnostic>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (name, _) in files {
        visit_module(
            name,
            &sources,
            &mut in_progress,
            &mut done,
            &mut warnings,
            &mut order,
        );
    }

    order
        .into_iter()
        .map(|file| {
            let source = sources.get(file.as_str()).copied().unwrap_or("");
            let mut result = compile_with_options(source, &file, CompileOptions::default());
            if let (Ok(compilation), Some(extra)) = (&mut result, warnings.remove(&file)) {
                compilation.diagnostics.extend(extra);
            }
            ModuleResult { file, result }
        })
        .collect()
}

fn visit_module(
    name: &str,
    sources: &HashMap<&str, &str>,
    in_progress: &mut HashSet<String>,
    done: &mut HashSet<String>,
    warnings: &mut HashMap<String, Vec<Diagnostic>>,
    order: &mut Vec<String>,
) {
    if done.contains(name) || !sources.contains_key(name) {
        return;
    }
    in_progress.insert(name.to_string());

    for import in scan_imports(sources[name]) {
        let Some(resolved) = resolve_module(&import, sources) else { continue };
        if in_progress.contains(&resolved) {
            log::warn!("circular import between {} and {}", name, resolved);
            warnings.entry(name.to_string()).or_default().push(
                Diagnostic::warning(
                    "W_CIRCULAR_IMPORT",
                    format!("circular import between '{}' and '{}'", name, resolved),
                    name,
                    1,
                    1,
                )
                .with_hint("the cycle edge is treated as an empty module"),
            );
            continue;
        }
        visit_module(&resolved, sources, in_progress, done, warnings, order);
    }

    in_progress.remove(name);
    done.insert(name.to_string());
    order.push(name.to_string());
}

/// Lexes just far enough to find `import ... from "module"` targets.
fn scan_imports(source: &str) -> Vec<String> {
    let mut interner = Interner::new();
    let Ok((tokens, _)) = Lexer::new(source, &mut interner).tokenize() else {
        return Vec::new();
    };
    let mut imports = Vec::new();
    for window in tokens.windows(2) {
        if window[0].kind == TokenKind::From && window[1].kind == TokenKind::Str {
            imports.push(interner.resolve(window[1].lexeme).to_string());
        }
    }
    imports
}

fn resolve_module(import: &str, sources: &HashMap<&str, &str>) -> Option<String> {
    let candidates = [
        import.to_string(),
        format!("{}.tova", import),
        import.trim_start_matches("./").to_string(),
        format!("{}.tova", import.trim_start_matches("./")),
    ];
    for candidate in candidates {
        if sources.contains_key(candidate.as_str()) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_simple_function() {
        let compilation = compile("fn add(a, b) { return a + b }").expect("compiles");
        assert!(compilation.output.shared.contains("function add(a, b)"));
        assert!(compilation.output.shared.contains("return (a + b);"));
    }

    #[test]
    fn analysis_errors_fail_the_pipeline() {
        let err = compile("fn f() { return missing_name }").expect_err("should fail");
        assert!(matches!(err, CompileError::Analysis { .. }));
    }

    #[test]
    fn tolerant_mode_collects_instead_of_failing() {
        let options = CompileOptions { tolerant: true, ..CompileOptions::default() };
        let compilation =
            compile_with_options("fn f() { return missing_name }", "main.tova", options)
                .expect("tolerant mode compiles");
        assert!(compilation.diagnostics.iter().any(|d| d.code == "E200"));
    }

    #[test]
    fn circular_imports_warn_and_terminate() {
        let files = vec![
            ("a.tova".to_string(), "import b_fn from \"b\"\nfn a_fn() { return 1 }".to_string()),
            ("b.tova".to_string(), "import a_fn from \"a\"\nfn b_fn() { return 2 }".to_string()),
        ];
        let results = compile_modules(&files);
        assert_eq!(results.len(), 2);
        let warned = results.iter().any(|r| match &r.result {
            Ok(c) => c.diagnostics.iter().any(|d| {
                d.code == "W_CIRCULAR_IMPORT"
                    && d.message.contains("a.tova")
                    && d.message.contains("b.tova")
            }),
            Err(_) => false,
        });
        assert!(warned, "one file should carry the circular-import warning");
    }

    #[test]
    fn scan_imports_finds_module_paths() {
        let imports = scan_imports("import a, b from \"shared/util\"\nfn f() { return 1 }");
        assert_eq!(imports, vec!["shared/util".to_string()]);
    }
}
