use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Registry entry behind `--explain CODE`.
#[derive(Debug, Clone, Copy)]
pub struct CodeInfo {
    pub title: &'static str,
    pub category: &'static str,
    pub explanation: &'static str,
}

macro_rules! registry {
    ($($code:literal => $title:literal, $category:literal, $explanation:literal;)*) => {
        Lazy::new(|| {
            let mut m = HashMap::new();
            $(m.insert($code, CodeInfo { title: $title, category: $category, explanation: $explanation });)*
            m
        })
    };
}

static REGISTRY: Lazy<HashMap<&'static str, CodeInfo>> = registry! {
    "E200" => "undefined name", "scope",
        "The name is not bound in any enclosing scope and is not a built-in. \
         Check the spelling; the compiler suggests close matches when one exists.";
    "E201" => "duplicate definition", "scope",
        "A name may only be defined once per scope frame. Use a different name \
         or remove the earlier definition.";
    "E202" => "assignment to immutable binding", "scope",
        "Plain `name = value` creates an immutable binding. Reassigning it, \
         including with compound operators, requires declaring it with `var`.";
    "E203" => "break outside loop", "control-flow",
        "`break` is only meaningful inside `for` or `while`.";
    "E204" => "continue outside loop", "control-flow",
        "`continue` is only meaningful inside `for` or `while`.";
    "E210" => "too few arguments", "types",
        "The call provides fewer arguments than the function's required \
         parameters. Defaulted parameters are optional; spread arguments \
         disable this check.";
    "E211" => "too many arguments", "types",
        "The call provides more arguments than the function accepts.";
    "E300" => "await outside async function", "control-flow",
        "`await` suspends the enclosing function, so that function must be \
         declared `async fn`.";
    "E301" => "return outside function", "control-flow",
        "`return` must appear inside a function body.";
    "E302" => "client declaration outside client block", "blocks",
        "`state`, `computed`, and `component` belong inside `client { }`.";
    "E303" => "server declaration outside server block", "blocks",
        "Routes and server-only declarations belong inside `server { }`.";
    "W001" => "unused variable", "usage",
        "The local binding is never read. Prefix it with `_` to keep it \
         intentionally.";
    "W002" => "unused function", "usage",
        "The private function is never called. Public functions and exports \
         are exempt.";
    "W003" => "unused parameter", "usage",
        "The parameter is never read inside the function body. Prefix it with \
         `_` to keep it intentionally.";
    "W101" => "shadowed binding", "scope",
        "The binding hides one with the same name from an outer function. \
         Rename one of them if the shadowing is accidental.";
    "W102" => "float narrowed to int", "types",
        "Int widens to Float implicitly, but the reverse loses precision and \
         must be explicit.";
    "W103" => "incompatible types", "types",
        "The value's type is not structurally compatible with the annotation. \
         Compatibility covers exact matches, Int-to-Float widening, nilable \
         unions, and Any/Unknown.";
    "W200" => "non-exhaustive match", "match",
        "The match does not cover every variant and has no wildcard arm. Add \
         the missing arms or a final `_ => ...`.";
    "W_UNKNOWN_TRAIT" => "unknown derive target", "types",
        "`derive` accepts Eq, Show, JSON, or a user trait with default method \
         bodies.";
    "W_UNDEFINED_ROLE" => "protect references undefined role", "security",
        "The `require` clause names a role no security block defines.";
    "W_DUPLICATE_ROLE" => "duplicate role", "security",
        "The same role is declared more than once, possibly across multiple \
         security blocks.";
    "W_PROTECT_WITHOUT_AUTH" => "protect without auth", "security",
        "Protect rules gate requests on the authenticated user, so some `auth` \
         declaration must exist.";
    "W_PROTECT_NO_REQUIRE" => "protect without require", "security",
        "A protect rule without a `require` clause matches requests but \
         enforces nothing.";
    "W_UNKNOWN_AUTH_TYPE" => "unknown auth type", "security",
        "Supported auth types are `jwt` and `api_key`.";
    "W_HARDCODED_SECRET" => "hardcoded secret", "security",
        "Secrets belong in the environment. Use `env(\"NAME\")` instead of a \
         string literal.";
    "W_CORS_WILDCARD" => "CORS wildcard origin", "security",
        "`origins: [\"*\"]` allows any site to call the API with credentials \
         disabled. List explicit origins.";
    "W_LOCALSTORAGE_TOKEN" => "JWT stored in localStorage", "security",
        "Default JWT storage is readable by any script. Prefer \
         `storage: \"cookie\"` for HttpOnly cookie transport.";
    "W_CSRF_DISABLED" => "CSRF protection disabled", "security",
        "Disabling CSRF removes the double-submit token check on mutating \
         requests.";
    "W_INVALID_RATE_LIMIT" => "invalid rate limit", "security",
        "`max` and `window` must both be positive.";
    "W_NO_AUTH_RATELIMIT" => "auth endpoints not rate limited", "security",
        "Credential endpoints without rate limiting invite brute-force \
         attempts.";
    "W_INMEMORY_RATELIMIT" => "in-memory rate limiter", "security",
        "The generated limiter keeps counters per process; a multi-instance \
         deployment needs a shared store.";
    "W_HASH_NOT_ENFORCED" => "hash config is advisory", "security",
        "`hash:` on a sensitive field documents intent; the generated code \
         does not hash automatically outside the auth helpers.";
    "W_CIRCULAR_IMPORT" => "circular import", "modules",
        "Two files import each other. The cycle edge is treated as an empty \
         module for the dependent file.";
};

/// Look up registry data for a diagnostic code.
pub fn explain(code: &str) -> Option<CodeInfo> {
    REGISTRY.get(code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_entries() {
        for code in ["E200", "E202", "E300", "W001", "W200", "W_CORS_WILDCARD"] {
            let info = explain(code).unwrap_or_else(|| panic!("missing registry entry for {code}"));
            assert!(!info.title.is_empty());
            assert!(!info.explanation.is_empty());
        }
    }

    #[test]
    fn unknown_code_returns_none() {
        assert!(explain("E999").is_none());
    }

    #[test]
    fn security_codes_share_category() {
        assert_eq!(explain("W_HARDCODED_SECRET").unwrap().category, "security");
        assert_eq!(explain("W_CSRF_DISABLED").unwrap().category, "security");
    }
}
