use crate::ast::{ArrayItem, CallArg, Config, Expr, ExprKind, SecurityEntry, StrPart};
use crate::diagnostics::Diagnostic;
use crate::intern::Interner;
use crate::token::Loc;

/// Cross-block security validation. All `security { }` blocks in the unit
/// merge into one view before any rule fires, so duplicate roles across
/// blocks and auth/protect relationships are visible.
pub struct SecurityCheck<'s, 'a> {
    entries: Vec<(usize, &'s SecurityEntry<'a>)>,
    file: String,
}

impl<'s, 'a> SecurityCheck<'s, 'a> {
    pub fn new(file: String) -> Self {
        SecurityCheck { entries: Vec::new(), file }
    }

    pub fn add_block(&mut self, block_index: usize, entries: &'s [SecurityEntry<'a>]) {
        for entry in entries {
            self.entries.push((block_index, entry));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn run(&self, interner: &Interner, diags: &mut Vec<Diagnostic>) {
        let mut roles: Vec<(String, usize, Loc)> = Vec::new();
        let mut auth_count = 0usize;
        let mut has_rate_limit = false;

        // Route-level rate limits inside protect rules also count.
        for (_, entry) in &self.entries {
            match entry {
                SecurityEntry::RateLimit { .. } => has_rate_limit = true,
                SecurityEntry::Protect { config, .. } => {
                    if config_get(config, interner, "rate_limit").is_some() {
                        has_rate_limit = true;
                    }
                }
                _ => {}
            }
        }

        for (block, entry) in &self.entries {
            match entry {
                SecurityEntry::Role { name, loc } => {
                    let name_str = interner.resolve(*name).to_string();
                    if let Some((_, prev_block, _)) = roles.iter().find(|(n, _, _)| *n == name_str) {
                        let message = if *prev_block == *block {
                            format!("role '{}' is declared more than once", name_str)
                        } else {
                            format!(
                                "role '{}' is declared in multiple security blocks",
                                name_str
                            )
                        };
                        diags.push(self.warn("W_DUPLICATE_ROLE", message, *loc));
                    } else {
                        roles.push((name_str, *block, *loc));
                    }
                }
                SecurityEntry::Auth { auth_type, config, loc } => {
                    auth_count += 1;
                    let ty = interner.resolve(*auth_type);
                    if ty != "jwt" && ty != "api_key" {
                        diags.push(self.warn(
                            "W_UNKNOWN_AUTH_TYPE",
                            format!("unknown auth type '{}'; expected 'jwt' or 'api_key'", ty),
                            *loc,
                        ));
                    }
                    if let Some(secret) = config_get(config, interner, "secret") {
                        if !is_env_call(secret, interner) && literal_str(secret, interner).is_some() {
                            diags.push(
                                self.warn(
                                    "W_HARDCODED_SECRET",
                                    "auth secret is a hardcoded literal".to_string(),
                                    secret.loc,
                                )
                                .with_hint("read it from the environment: secret: env(\"JWT_SECRET\")"),
                            );
                        }
                    }
                    if ty == "jwt" {
                        let storage = config_get(config, interner, "storage")
                            .and_then(|e| literal_str(e, interner));
                        if storage.as_deref() != Some("cookie") {
                            diags.push(
                                self.warn(
                                    "W_LOCALSTORAGE_TOKEN",
                                    "JWT defaults to localStorage; tokens there are readable by any script"
                                        .to_string(),
                                    *loc,
                                )
                                .with_hint("add storage: \"cookie\" for HttpOnly transport"),
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        for (_, entry) in &self.entries {
            match entry {
                SecurityEntry::Protect { pattern, config, loc } => {
                    if auth_count == 0 {
                        diags.push(self.warn(
                            "W_PROTECT_WITHOUT_AUTH",
                            format!(
                                "protect rule '{}' has no effect without an auth declaration",
                                interner.resolve(*pattern)
                            ),
                            *loc,
                        ));
                    }
                    match config_get(config, interner, "require") {
                        None => diags.push(self.warn(
                            "W_PROTECT_NO_REQUIRE",
                            format!(
                                "protect rule '{}' has no require clause",
                                interner.resolve(*pattern)
                            ),
                            *loc,
                        )),
                        Some(require) => {
                            if let Some(role) = required_role(require, interner) {
                                if !roles.iter().any(|(n, _, _)| *n == role) {
                                    diags.push(self.warn(
                                        "W_UNDEFINED_ROLE",
                                        format!("protect rule requires undefined role '{}'", role),
                                        require.loc,
                                    ));
                                }
                            }
                        }
                    }
                }
                SecurityEntry::Cors { config, loc } => {
                    if let Some(origins) = config_get(config, interner, "origins") {
                        if array_contains_str(origins, interner, "*") {
                            diags.push(self.warn(
                                "W_CORS_WILDCARD",
                                "CORS origins contain \"*\"; any site may call this API".to_string(),
                                *loc,
                            ));
                        }
                    }
                }
                SecurityEntry::Csrf { config, loc } => {
                    if let Some(enabled) = config_get(config, interner, "enabled") {
                        if literal_bool(enabled) == Some(false) {
                            diags.push(self.warn(
                                "W_CSRF_DISABLED",
                                "CSRF protection is disabled".to_string(),
                                *loc,
                            ));
                        }
                    }
                }
                SecurityEntry::RateLimit { config, loc } => {
                    let max = config_get(config, interner, "max").and_then(literal_int);
                    let window = config_get(config, interner, "window").and_then(literal_int);
                    if max.map_or(false, |n| n <= 0) || window.map_or(false, |n| n <= 0) {
                        diags.push(self.warn(
                            "W_INVALID_RATE_LIMIT",
                            "rate limit max and window must both be positive".to_string(),
                            *loc,
                        ));
                    }
                    diags.push(self.warn(
                        "W_INMEMORY_RATELIMIT",
                        "rate limiting uses an in-memory store; counters reset per process"
                            .to_string(),
                        *loc,
                    ));
                }
                SecurityEntry::Sensitive { type_name, field, config, loc } => {
                    if config_get(config, interner, "hash").is_some() {
                        diags.push(self.warn(
                            "W_HASH_NOT_ENFORCED",
                            format!(
                                "hash config on {}.{} is advisory; hashing happens only through the auth helpers",
                                interner.resolve(*type_name),
                                interner.resolve(*field)
                            ),
                            *loc,
                        ));
                    }
                }
                _ => {}
            }
        }

        if auth_count > 0 && !has_rate_limit {
            if let Some((_, entry)) = self
                .entries
                .iter()
                .find(|(_, e)| matches!(e, SecurityEntry::Auth { .. }))
            {
                let loc = match entry {
                    SecurityEntry::Auth { loc, .. } => *loc,
                    _ => Loc::default(),
                };
                diags.push(
                    self.warn(
                        "W_NO_AUTH_RATELIMIT",
                        "auth is configured but nothing rate-limits credential endpoints"
                            .to_string(),
                        loc,
                    )
                    .with_hint("add rate_limit { max: ..., window: ... } to a security block"),
                );
            }
        }
    }

    fn warn(&self, code: &str, message: String, loc: Loc) -> Diagnostic {
        Diagnostic::warning(code, message, &self.file, loc.line, loc.column)
    }
}

// -- config expression inspection -------------------------------------------

pub fn config_get<'c, 'a>(
    config: &'c Config<'a>,
    interner: &Interner,
    key: &str,
) -> Option<&'c &'a Expr<'a>> {
    config
        .iter()
        .find(|(k, _)| interner.resolve(*k) == key)
        .map(|(_, v)| v)
}

pub fn literal_str(expr: &Expr<'_>, interner: &Interner) -> Option<String> {
    match &expr.kind {
        ExprKind::Str(parts) => match parts.as_slice() {
            [StrPart::Text(sym)] => Some(interner.resolve(*sym).to_string()),
            _ => None,
        },
        ExprKind::RawStr(sym) => Some(interner.resolve(*sym).to_string()),
        _ => None,
    }
}

pub fn literal_int(expr: &&Expr<'_>) -> Option<i64> {
    match expr.kind {
        ExprKind::Int(n) => Some(n),
        _ => None,
    }
}

pub fn literal_bool(expr: &Expr<'_>) -> Option<bool> {
    match expr.kind {
        ExprKind::Bool(b) => Some(b),
        _ => None,
    }
}

pub fn is_env_call(expr: &Expr<'_>, interner: &Interner) -> bool {
    match &expr.kind {
        ExprKind::Call { callee, .. } => {
            matches!(callee.kind, ExprKind::Ident(sym) if interner.resolve(sym) == "env")
        }
        _ => false,
    }
}

/// Extracts the role name from a `require:` value: `role("admin")` or the
/// string `"admin"`. The marker value `"authenticated"` requires any login.
pub fn required_role(expr: &Expr<'_>, interner: &Interner) -> Option<String> {
    match &expr.kind {
        ExprKind::Call { callee, args } => {
            if matches!(callee.kind, ExprKind::Ident(sym) if interner.resolve(sym) == "role") {
                if let Some(CallArg::Positional(arg)) = args.first() {
                    return literal_str(arg, interner);
                }
            }
            None
        }
        _ => match literal_str(expr, interner) {
            Some(s) if s == "authenticated" => None,
            other => other,
        },
    }
}

fn array_contains_str(expr: &Expr<'_>, interner: &Interner, needle: &str) -> bool {
    match &expr.kind {
        ExprKind::Array(items) => items.iter().any(|item| match item {
            ArrayItem::Item(e) => literal_str(e, interner).as_deref() == Some(needle),
            ArrayItem::Spread(_) => false,
        }),
        _ => literal_str(expr, interner).as_deref() == Some(needle),
    }
}
