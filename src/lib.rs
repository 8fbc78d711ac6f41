//! Tova compiler core: lexer, parser, semantic analyzer, and JavaScript
//! code generator for the Tova/Lux full-stack language.
//!
//! One source unit may declare `shared`, `server`, `client`, `security`,
//! and `test` blocks; [`compile`] returns one JavaScript output per target
//! plus structured diagnostics.

pub mod analysis;
pub mod arena;
pub mod arena_ctx;
pub mod ast;
pub mod codegen;
pub mod compile;
pub mod diagnostics;
pub mod error;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod style;
pub mod token;

pub use analysis::{AnalyzeOptions, Analyzer};
pub use arena::Arena;
pub use arena_ctx::AstContext;
pub use codegen::{CodeGenerator, CompileOutput, GenOptions};
pub use compile::{check, compile, compile_modules, compile_with_options, Compilation, CompileOptions};
pub use diagnostics::{explain, format_diagnostic, Diagnostic, Fix, Severity};
pub use error::{CompileError, LexError, LexErrorKind, ParseError, ParseFailure};
pub use intern::{Interner, Symbol, SymbolEq};
pub use lexer::Lexer;
pub use parser::Parser;
pub use style::Style;
pub use token::{Loc, Span, Token, TokenKind};
