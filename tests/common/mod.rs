//! Shared harness for the integration suites: thin wrappers over the
//! pipeline that panic with readable context on unexpected failures.
#![allow(dead_code)]

use tova::compile::{compile_with_options, Compilation, CompileOptions};
use tova::diagnostics::Diagnostic;

pub fn build(source: &str) -> Compilation {
    let options = CompileOptions { tolerant: true, ..CompileOptions::default() };
    compile_with_options(source, "test.tova", options)
        .unwrap_or_else(|err| panic!("compilation failed: {err}\nsource:\n{source}"))
}

pub fn diagnostics(source: &str) -> Vec<Diagnostic> {
    build(source).diagnostics
}

pub fn codes(source: &str) -> Vec<String> {
    diagnostics(source).into_iter().map(|d| d.code).collect()
}

pub fn server_js(source: &str) -> String {
    let compilation = build(source);
    compilation
        .output
        .server_text()
        .unwrap_or_else(|| panic!("no server output\nsource:\n{source}"))
        .to_string()
}

pub fn client_js(source: &str) -> String {
    build(source)
        .output
        .client
        .unwrap_or_else(|| panic!("no client output\nsource:\n{source}"))
}

pub fn shared_js(source: &str) -> String {
    build(source).output.shared
}

/// Asserts `needle` appears in `haystack`, with the full text on failure.
pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        haystack.contains(needle),
        "expected output to contain {needle:?}\n--- output ---\n{haystack}"
    );
}

/// Asserts `first` appears before `second` in the text.
pub fn assert_ordered(haystack: &str, first: &str, second: &str) {
    let a = haystack
        .find(first)
        .unwrap_or_else(|| panic!("missing {first:?} in output:\n{haystack}"));
    let b = haystack
        .find(second)
        .unwrap_or_else(|| panic!("missing {second:?} in output:\n{haystack}"));
    assert!(
        a < b,
        "expected {first:?} before {second:?}\n--- output ---\n{haystack}"
    );
}
