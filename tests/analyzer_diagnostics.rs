//! Analyzer behavior across scope, usage, typing, exhaustiveness, and the
//! merged security checks.

mod common;

use common::{codes, diagnostics};
use tova::diagnostics::Severity;

#[test]
fn immutable_reassignment_in_nested_block_is_e202_with_fix() {
    let diags = diagnostics("fn test() { x = 10\n if true { x = 20 } }");
    let e202 = diags
        .iter()
        .find(|d| d.code == "E202")
        .expect("E202 expected");
    assert!(e202.message.contains('x'));
    let fix = e202.fix.as_ref().expect("fix attached");
    assert_eq!(fix.description, "Declare 'x' as mutable with 'var'");
    assert_eq!(fix.replacement, "var x = ...");
}

#[test]
fn var_bindings_may_be_reassigned_anywhere() {
    let diags = diagnostics("fn test() { var x = 10\n if true { x = 20 }\n return x }");
    assert!(!diags.iter().any(|d| d.code == "E202"), "{diags:?}");
}

#[test]
fn compound_assignment_to_immutable_is_e202() {
    assert!(codes("fn f() { total = 1\n if true { total += 2 } }").contains(&"E202".to_string()));
}

#[test]
fn undefined_name_is_exactly_one_e200_with_suggestion() {
    let diags = diagnostics("fn f() { prnt(1) }");
    let e200: Vec<_> = diags.iter().filter(|d| d.code == "E200").collect();
    assert_eq!(e200.len(), 1, "exactly one E200: {diags:?}");
    let hint = e200[0].hint.as_ref().expect("suggestion hint");
    assert!(hint.contains("print"), "suggests print: {hint}");
}

#[test]
fn defined_and_builtin_names_never_produce_e200() {
    let diags = diagnostics("fn f(x) { print(len(x))\n return x }");
    assert!(!diags.iter().any(|d| d.code == "E200"), "{diags:?}");
}

#[test]
fn unused_variable_param_and_function_warnings() {
    let source = "fn helper(unused_param) { leftover = 1\n return 2 }\nfn used() { return helper(1) }\npub fn entry() { return used() }";
    let found = codes(source);
    assert!(found.contains(&"W001".to_string()), "unused local: {found:?}");
    assert!(found.contains(&"W003".to_string()), "unused param: {found:?}");
}

#[test]
fn underscore_prefix_suppresses_usage_warnings() {
    let found = codes("fn f(_ignored) { _scratch = 1\n return 2 }");
    assert!(!found.contains(&"W001".to_string()));
    assert!(!found.contains(&"W003".to_string()));
}

#[test]
fn unused_private_function_is_w002_but_pub_is_exempt() {
    let found = codes("fn never_called() { return 1 }\npub fn api() { return 2 }");
    assert!(found.contains(&"W002".to_string()), "{found:?}");
    let diags = diagnostics("fn never_called() { return 1 }\npub fn api() { return 2 }");
    let w002: Vec<_> = diags.iter().filter(|d| d.code == "W002").collect();
    assert_eq!(w002.len(), 1);
    assert!(w002[0].message.contains("never_called"));
}

#[test]
fn shadowing_across_function_boundary_is_w101() {
    let found = codes("count = 1\nfn f() { var count = 2\n return count }\npub fn g() { return f() + count }");
    assert!(found.contains(&"W101".to_string()), "{found:?}");
}

#[test]
fn break_and_continue_outside_loops() {
    let found = codes("fn f() { break }");
    assert!(found.contains(&"E203".to_string()), "{found:?}");
    let found = codes("fn f() { continue }");
    assert!(found.contains(&"E204".to_string()), "{found:?}");
    let found = codes("fn f(xs) { for x in xs { if x > 3 { break } } }");
    assert!(!found.contains(&"E203".to_string()));
}

#[test]
fn await_outside_async_fn_is_e300() {
    assert!(codes("fn f(p) { return await p }").contains(&"E300".to_string()));
    assert!(!codes("async fn f(p) { return await p }").contains(&"E300".to_string()));
}

#[test]
fn return_outside_function_is_e301() {
    assert!(codes("return 1").contains(&"E301".to_string()));
}

#[test]
fn client_declarations_outside_client_block_are_e302() {
    assert!(codes("server { state count = 0 }").contains(&"E302".to_string()));
}

#[test]
fn routes_outside_server_block_are_e303() {
    let found = codes("route GET \"/x\" => fn(req) { return respond(200, nil) }");
    assert!(found.contains(&"E303".to_string()), "{found:?}");
    let inside = codes("server { route GET \"/x\" => fn(req) { return respond(200, nil) } }");
    assert!(!inside.contains(&"E303".to_string()), "{inside:?}");
}

#[test]
fn arity_mismatches_are_e210_e211() {
    let found = codes("fn two(a, b) { return a + b }\npub fn go() { return two(1) }");
    assert!(found.contains(&"E210".to_string()), "{found:?}");
    let found = codes("fn two(a, b) { return a + b }\npub fn go() { return two(1, 2, 3) }");
    assert!(found.contains(&"E211".to_string()), "{found:?}");
}

#[test]
fn defaults_and_spread_relax_arity() {
    let found = codes("fn f(a, b = 2) { return a + b }\npub fn go(xs) { return f(1) + f(...xs) }");
    assert!(!found.contains(&"E210".to_string()), "{found:?}");
    assert!(!found.contains(&"E211".to_string()), "{found:?}");
}

#[test]
fn variant_constructor_arity_is_checked() {
    let source = "type Shape = Circle(Float) | Empty\npub fn go() { return Circle(1.0, 2.0) }";
    assert!(codes(source).contains(&"E210".to_string()));
}

#[test]
fn duplicate_definition_in_same_frame_is_e201() {
    assert!(codes("fn f(a, a) { return a }").contains(&"E201".to_string()));
}

#[test]
fn exhaustive_match_is_silent() {
    let source = r#"
type Status = Active | Paused | Stopped
pub fn label(s: Status) {
    return match s {
        Active => "on",
        Paused => "hold",
        Stopped => "off",
    }
}
"#;
    let found = codes(source);
    assert!(!found.contains(&"W200".to_string()), "{found:?}");
}

#[test]
fn missing_variants_get_one_w200_each() {
    let source = r#"
type Status = Active | Paused | Stopped
pub fn label(s: Status) {
    return match s {
        Active => "on",
    }
}
"#;
    let diags = diagnostics(source);
    let w200: Vec<_> = diags.iter().filter(|d| d.code == "W200").collect();
    assert_eq!(w200.len(), 2, "one per missing variant: {diags:?}");
    assert!(w200.iter().any(|d| d.message.contains("Paused")));
    assert!(w200.iter().any(|d| d.message.contains("Stopped")));
    assert!(w200[0].hint.as_ref().is_some_and(|h| h.contains("_ =>")));
}

#[test]
fn wildcard_arm_silences_exhaustiveness() {
    let source = r#"
type Status = Active | Paused | Stopped
pub fn label(s: Status) {
    return match s {
        Active => "on",
        _ => "other",
    }
}
"#;
    assert!(!codes(source).contains(&"W200".to_string()));
}

#[test]
fn narrowing_after_nil_check() {
    // The nil branch narrows to Nil, the other to the non-nil component;
    // no diagnostics should fire either way.
    let source = "fn f(x: Int | Nil) { if x == nil { return 0 }\n return x }";
    let diags = diagnostics(source);
    assert!(diags.iter().all(|d| d.severity != Severity::Error), "{diags:?}");
}

#[test]
fn float_to_int_narrowing_warns_w102() {
    assert!(codes("var n: Int = 1.5").contains(&"W102".to_string()));
}

#[test]
fn int_widens_to_float_silently() {
    assert!(!codes("var n: Float = 1").contains(&"W103".to_string()));
}

#[test]
fn tova_ignore_suppresses_by_code() {
    let source = "fn f() { // tova-ignore W001\n leftover = 1\n return 2 }";
    assert!(!codes(source).contains(&"W001".to_string()));
    let source = "fn f() { // tova-ignore W002\n leftover = 1\n return 2 }";
    assert!(codes(source).contains(&"W001".to_string()));
}

#[test]
fn unknown_derive_is_w_unknown_trait() {
    assert!(codes("type P { x: Int } derive [Printable]").contains(&"W_UNKNOWN_TRAIT".to_string()));
}

#[test]
fn derive_of_trait_with_default_body_is_accepted() {
    let source = "trait Greet { fn hello(self) { return \"hi\" } }\ntype P { x: Int } derive [Greet]";
    assert!(!codes(source).contains(&"W_UNKNOWN_TRAIT".to_string()));
}

// -- security analysis -------------------------------------------------------

#[test]
fn protect_with_undefined_role_warns() {
    let source = r#"
security {
    auth jwt { secret: env("S") }
    rate_limit { max: 10, window: 60 }
    protect "/admin/**" { require: role("admin") }
}
"#;
    assert!(codes(source).contains(&"W_UNDEFINED_ROLE".to_string()));
}

#[test]
fn duplicate_roles_across_blocks_mention_multiple_blocks() {
    let source = r#"
security { role admin }
security { role admin }
"#;
    let diags = diagnostics(source);
    let dup = diags
        .iter()
        .find(|d| d.code == "W_DUPLICATE_ROLE")
        .expect("duplicate role warning");
    assert!(dup.message.contains("multiple security blocks"), "{}", dup.message);
}

#[test]
fn protect_without_auth_and_without_require() {
    let source = "security { protect \"/x/**\" { } }";
    let found = codes(source);
    assert!(found.contains(&"W_PROTECT_WITHOUT_AUTH".to_string()), "{found:?}");
    assert!(found.contains(&"W_PROTECT_NO_REQUIRE".to_string()), "{found:?}");
}

#[test]
fn unknown_auth_type_warns() {
    assert!(codes("security { auth oauth { } }").contains(&"W_UNKNOWN_AUTH_TYPE".to_string()));
}

#[test]
fn hardcoded_secret_warns_but_env_is_exempt() {
    let hardcoded = "security { auth jwt { secret: \"hunter2\" } }";
    assert!(codes(hardcoded).contains(&"W_HARDCODED_SECRET".to_string()));
    let from_env = "security { auth jwt { secret: env(\"JWT_SECRET\") } }";
    assert!(!codes(from_env).contains(&"W_HARDCODED_SECRET".to_string()));
}

#[test]
fn cors_wildcard_warns() {
    let source = "security { cors { origins: [\"*\"] } }";
    assert!(codes(source).contains(&"W_CORS_WILDCARD".to_string()));
}

#[test]
fn jwt_default_storage_warns_localstorage() {
    let source = "security { auth jwt { secret: env(\"S\") } }";
    assert!(codes(source).contains(&"W_LOCALSTORAGE_TOKEN".to_string()));
    let cookie = "security { auth jwt { secret: env(\"S\"), storage: \"cookie\" } }";
    assert!(!codes(cookie).contains(&"W_LOCALSTORAGE_TOKEN".to_string()));
}

#[test]
fn csrf_disabled_warns() {
    assert!(codes("security { csrf { enabled: false } }").contains(&"W_CSRF_DISABLED".to_string()));
}

#[test]
fn non_positive_rate_limit_warns() {
    let source = "security { rate_limit { max: 0, window: 60 } }";
    assert!(codes(source).contains(&"W_INVALID_RATE_LIMIT".to_string()));
}

#[test]
fn any_rate_limit_carries_inmemory_advisory() {
    let source = "security { rate_limit { max: 10, window: 60 } }";
    assert!(codes(source).contains(&"W_INMEMORY_RATELIMIT".to_string()));
}

#[test]
fn auth_without_rate_limit_warns() {
    let source = "security { auth jwt { secret: env(\"S\"), storage: \"cookie\" } }";
    assert!(codes(source).contains(&"W_NO_AUTH_RATELIMIT".to_string()));
    let with_limit = r#"
security {
    auth jwt { secret: env("S"), storage: "cookie" }
    rate_limit { max: 10, window: 60 }
}
"#;
    assert!(!codes(with_limit).contains(&"W_NO_AUTH_RATELIMIT".to_string()));
}

#[test]
fn sensitive_hash_config_is_advisory() {
    let source = "security { sensitive User.password { hash: \"argon2\" } }";
    assert!(codes(source).contains(&"W_HASH_NOT_ENFORCED".to_string()));
}

#[test]
fn strict_mode_promotes_designated_warnings() {
    let source = "type Status = Active | Paused\npub fn f(s: Status) { return match s { Active => 1 } }";
    let diags = tova::check(source, "strict.tova", true).expect("check runs");
    let w200 = diags.iter().find(|d| d.code == "W200").expect("W200 present");
    assert_eq!(w200.severity, Severity::Error);
}

#[test]
fn diagnostics_serialize_with_expected_shape() {
    let diags = diagnostics("fn test() { x = 10\n if true { x = 20 } }");
    let e202 = diags.iter().find(|d| d.code == "E202").expect("E202");
    let json = serde_json::to_value(e202).expect("serializable");
    assert_eq!(json["severity"], "error");
    assert_eq!(json["code"], "E202");
    assert!(json["line"].is_number());
    assert!(json["fix"]["replacement"].as_str().unwrap().contains("var x"));
}

#[test]
fn code_registry_explains_known_codes() {
    let info = tova::explain("E202").expect("registry entry");
    assert!(info.title.contains("immutable"));
    assert_eq!(tova::explain("E777").map(|i| i.title), None);
}
