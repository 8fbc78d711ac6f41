use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Names the generated JavaScript provides without any declaration in the
/// source unit: host globals, the inline standard library, and the helpers
/// the server and client templates emit. The analyzer never flags these.
pub static BUILTIN_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set = HashSet::new();
    for name in JS_GLOBALS.iter().chain(STDLIB).chain(GENERATED_HELPERS) {
        set.insert(*name);
    }
    set
});

const JS_GLOBALS: &[&str] = &[
    "console", "Math", "JSON", "Object", "Array", "String", "Number", "Boolean",
    "Date", "Promise", "Error", "Map", "Set", "RegExp", "Symbol", "Infinity",
    "NaN", "undefined", "fetch", "setTimeout", "setInterval", "clearTimeout",
    "clearInterval", "queueMicrotask", "structuredClone", "crypto", "URL",
    "URLSearchParams", "TextEncoder", "TextDecoder", "AbortController",
    "parseInt", "parseFloat", "isNaN", "isFinite", "encodeURIComponent",
    "decodeURIComponent", "btoa", "atob", "document", "window", "localStorage",
    "sessionStorage", "navigator", "history", "location", "Request", "Response",
    "Headers", "FormData", "ReadableStream", "WebSocket", "Bun", "process",
];

const STDLIB: &[&str] = &[
    "print", "len", "range", "map", "filter", "find", "reduce", "sum", "min",
    "max", "abs", "floor", "ceil", "round", "sqrt", "pow", "random", "sort",
    "sorted", "reverse", "keys", "values", "entries", "zip", "enumerate",
    "join", "split", "trim", "upper", "lower", "contains", "starts_with",
    "ends_with", "replace", "repeat", "type_of", "str", "int", "float", "bool",
    "json_parse", "json_stringify", "now", "sleep", "env", "uuid", "assert",
    "assert_eq", "panic", "it", "_", "self",
];

const GENERATED_HELPERS: &[&str] = &[
    // server response helpers
    "respond", "html", "text", "redirect", "set_cookie", "stream", "sse",
    "negotiate", "with_headers", "status", "json",
    // auth helpers
    "current_user", "require_auth", "sign_jwt", "hash_password",
    "verify_password", "can",
    // realtime / jobs
    "broadcast", "join", "leave", "broadcast_to", "spawn_job", "send", "close",
    // db
    "db", "query", "transaction", "migrate",
    // client runtime
    "tova_el", "tova_fragment", "navigate", "rpc", "getAuthToken",
    "setAuthToken", "clearAuthToken", "mount", "signal", "effect_of",
    // request context
    "req", "request", "locals",
    // emitted test harness
    "test", "expect",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(name)
}

/// Candidate pool for `did you mean ...?` suggestions.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_NAMES.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdlib_names_are_builtin() {
        for name in ["print", "len", "range", "filter", "type_of", "env"] {
            assert!(is_builtin(name), "{name} should be builtin");
        }
    }

    #[test]
    fn generated_helper_names_are_builtin() {
        for name in ["respond", "broadcast", "spawn_job", "tova_el", "can"] {
            assert!(is_builtin(name), "{name} should be builtin");
        }
    }

    #[test]
    fn user_names_are_not_builtin() {
        assert!(!is_builtin("total_orders"));
        assert!(!is_builtin("UserModel2"));
    }
}
