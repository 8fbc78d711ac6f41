//! End-to-end pipeline properties: lowering equivalences, desugaring
//! shapes, derive output, and source-map invariants.

mod common;

use common::{assert_contains, build, shared_js};

// -- pipe lowering ------------------------------------------------------------

#[test]
fn pipe_inserts_value_as_first_argument() {
    let js = shared_js("fn f(a, b) { return a + b }\npub fn go(x) { return x |> f(2) }");
    assert_contains(&js, "f(x, 2)");
}

#[test]
fn pipe_placeholder_replaces_underscore() {
    let js = shared_js("fn f(a, b) { return a + b }\npub fn go(x) { return x |> f(_, 2) }");
    assert_contains(&js, "f(x, 2)");
}

#[test]
fn bare_pipe_becomes_unary_call() {
    let js = shared_js("pub fn go(x) { return x |> print }");
    assert_contains(&js, "print(x)");
}

#[test]
fn method_pipe_calls_on_the_piped_value() {
    let js = shared_js("pub fn go(name) { return name |> .trim() }");
    assert_contains(&js, "name.trim()");
}

// -- desugarings --------------------------------------------------------------

#[test]
fn propagate_desugars_to_null_check_with_early_return() {
    let js = shared_js("fn fetch_user() { return nil }\npub fn go() { return fetch_user()? }");
    assert_contains(&js, "const __tmp0 = fetch_user();");
    assert_contains(&js, "if (__tmp0 == null) return __tmp0;");
}

#[test]
fn chained_comparison_evaluates_each_subject_once() {
    let js = shared_js("pub fn go(a, b, c) { return a < b < c }");
    assert_contains(&js, "__c0 < __c1 && __c1 < __c2");
}

#[test]
fn slice_without_step_uses_slice_method() {
    let js = shared_js("pub fn go(xs) { return xs[1:3] }");
    assert_contains(&js, "xs.slice(1, 3)");
}

#[test]
fn slice_with_step_walks_indices() {
    let js = shared_js("pub fn go(xs) { return xs[0:10:2] }");
    assert_contains(&js, "__i += __step");
}

#[test]
fn match_with_binding_and_guard_emits_lambda_wrapped_arm() {
    let js = shared_js("pub fn classify(val) { return match val { n if n > 0 => n, _ => 0 } }");
    assert_contains(&js, "(n) =>");
    assert_contains(&js, "> 0");
}

#[test]
fn variant_patterns_check_the_tag() {
    let source = r#"
type Shape = Circle(Float) | Empty
pub fn area(s: Shape) {
    return match s {
        Circle(r) => r * r,
        Empty => 0,
    }
}
"#;
    let js = shared_js(source);
    assert_contains(&js, "__tag === \"Circle\"");
    assert_contains(&js, "__m._0");
}

#[test]
fn string_concat_pattern_uses_starts_with_and_slice() {
    let source = r#"
pub fn route_of(path) {
    return match path {
        "api:" ++ rest => rest,
        _ => path,
    }
}
"#;
    let js = shared_js(source);
    assert_contains(&js, ".startsWith(\"api:\")");
    assert_contains(&js, ".slice(4)");
}

#[test]
fn range_patterns_emit_bound_checks() {
    let source = r#"
pub fn bucket(n) {
    return match n {
        0..=9 => "small",
        10..100 => "medium",
        _ => "large",
    }
}
"#;
    let js = shared_js(source);
    assert_contains(&js, ">= 0");
    assert_contains(&js, "<= 9");
    assert_contains(&js, "< 100");
}

#[test]
fn destructuring_let_lowers_to_js_destructuring() {
    let js = shared_js("pub fn go(point) { let {x, y: vertical = 0} = point\n return x + vertical }");
    assert_contains(&js, "const { x, y: vertical = 0 } = point;");
}

#[test]
fn comprehensions_build_collections_with_loops() {
    let js = shared_js("pub fn go(nums) { return [n * 2 for n in nums if n > 0] }");
    assert_contains(&js, "__out.push(");
    assert_contains(&js, "for (const n of nums)");

    let js = shared_js("pub fn go(pairs) { return {k: v for (k, v) in pairs} }");
    assert_contains(&js, "__out[k] = v;");
}

#[test]
fn template_strings_become_js_templates() {
    let js = shared_js(r#"pub fn greet(name) { return "hello {name}!" }"#);
    assert_contains(&js, "`hello ${name}!`");
}

#[test]
fn guard_lowers_to_inverted_if() {
    let js = shared_js("pub fn go(x) { guard x > 0 else { return 0 }\n return x }");
    assert_contains(&js, "if (!((x > 0)))");
}

#[test]
fn defer_wraps_body_in_try_finally() {
    let js = shared_js("pub fn go() { defer { print(\"done\") }\n return 1 }");
    assert_contains(&js, "__defers.push(");
    assert_contains(&js, "} finally {");
    assert_contains(&js, "__defers.reverse()");
}

// -- derives ------------------------------------------------------------------

const POINT: &str = "pub type Point { x: Int, y: Float } derive [Eq, Show, JSON]";

#[test]
fn derive_eq_compares_listed_fields() {
    let js = shared_js(POINT);
    assert_contains(&js, "Point.__eq = (a, b) => a.x === b.x && a.y === b.y;");
}

#[test]
fn derive_show_renders_fields() {
    let js = shared_js(POINT);
    assert_contains(&js, "Point.__show");
    assert_contains(&js, "${v.x}");
}

#[test]
fn derive_json_mirrors_fields_both_directions() {
    let js = shared_js(POINT);
    assert_contains(&js, "Point.toJSON = (v) => ({ x: v.x, y: v.y });");
    assert_contains(&js, "Point.fromJSON = (data) => Point({ x: data.x, y: data.y });");
}

#[test]
fn derive_bridges_user_traits_with_defaults() {
    let source = r#"
trait Greet {
    fn hello(self) { return "hi" }
}
pub type Person { name: String } derive [Greet]
"#;
    let js = shared_js(source);
    assert_contains(&js, "Person.hello = (self, ...args) => Greet.hello(self, ...args);");
}

#[test]
fn enum_constructors_store_tags_and_payloads() {
    let js = shared_js("pub type Shape = Circle(Float) | Empty");
    assert_contains(&js, "const Circle = (_0) => ({ __tag: \"Circle\", _0 });");
    assert_contains(&js, "const Empty = { __tag: \"Empty\" };");
}

// -- source mappings ----------------------------------------------------------

#[test]
fn source_map_lines_stay_within_the_source() {
    let source = "fn a() { return 1 }\nfn b() { return 2 }\npub fn c() { return a() + b() }";
    let compilation = build(source);
    let source_lines = source.lines().count() as u32;
    assert!(!compilation.output.source_map.is_empty());
    for (src_line, _, _, _) in &compilation.output.source_map {
        assert!(*src_line >= 1 && *src_line <= source_lines);
    }
}

#[test]
fn source_map_output_lines_are_monotone_per_source_line() {
    let source = "pub fn f(x) { a = 1\n b = 2\n return a + b + x }";
    let compilation = build(source);
    let map = &compilation.output.source_map;
    for line in map.iter().map(|m| m.0).collect::<std::collections::HashSet<_>>() {
        let mut entries: Vec<_> = map.iter().filter(|m| m.0 == line).collect();
        entries.sort_by_key(|m| m.1);
        assert!(
            entries.windows(2).all(|w| w[0].2 <= w[1].2),
            "mappings from source line {line} must be ordered by column: {entries:?}"
        );
    }
}

// -- module shape -------------------------------------------------------------

#[test]
fn pub_functions_export_in_module_mode() {
    let js = shared_js("pub fn api() { return 1 }");
    assert_contains(&js, "export function api()");
    let compilation = build("pub fn api() { return 1 }");
    assert!(compilation.output.is_module);
}

#[test]
fn plain_scripts_are_not_modules() {
    let compilation = build("fn helper() { return 1 }\nfn main() { return helper() }");
    assert!(!compilation.output.is_module);
    assert!(!compilation.output.multi_block);
}

#[test]
fn async_and_generator_functions_lower_with_modifiers() {
    let js = shared_js("pub async fn load() { return 1 }\npub fn pages() { yield 1\n yield 2 }");
    assert_contains(&js, "export async function load()");
    assert_contains(&js, "export function* pages()");
}

#[test]
fn nil_comparisons_and_coalescing_lower_to_js() {
    let js = shared_js("pub fn pick(a, b) { return a ?? b }");
    assert_contains(&js, "(a ?? b)");
    let js = shared_js("pub fn test_it(x) { return x == nil }");
    assert_contains(&js, "(x === null)");
}
