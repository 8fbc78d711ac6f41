mod auth;
mod db;
mod http;
mod openapi;
mod protect;
mod realtime;
mod runtime;

use super::emitter::{Emitter, Mapping};
use super::stmt::gen_stmt;
use super::GenCtx;
use crate::analysis::security::{config_get, literal_bool, literal_int, literal_str, required_role};
use crate::ast::*;
use crate::intern::Interner;
use std::collections::HashMap;

/// HTTP method tie-break order inside the route table.
pub const METHOD_ORDER: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// One route prepared for emission: conversion to regex and specificity
/// ranking happen at generation time.
pub struct PreparedRoute<'s, 'a> {
    pub method: String,
    pub path: String,
    pub regex: String,
    pub decl: &'s RouteDecl<'a>,
}

#[derive(Debug, Clone, Default)]
pub struct ProtectRule {
    pub pattern: String,
    pub regex: String,
    pub role: Option<String>,
    pub authenticated: bool,
    pub rate_limit: Option<(i64, i64)>,
}

#[derive(Debug, Clone)]
pub struct SensitiveField {
    pub type_name: String,
    pub field: String,
    pub never_expose: bool,
    pub visible_to: Option<String>,
}

/// Merged feature view of the server block plus every security block. The
/// emitters run in a fixed order so inter-feature dependencies stay
/// explicit: auth enables HSTS and CSRF defaults, protect needs auth,
/// sanitize needs the shared types.
pub struct Features<'s, 'a> {
    pub auth_type: Option<String>,
    pub auth_config: Vec<(String, &'a Expr<'a>)>,
    pub cookie_storage: bool,
    pub roles: Vec<String>,
    pub protects: Vec<ProtectRule>,
    pub sensitive: Vec<SensitiveField>,
    pub cors_origins: Vec<String>,
    pub cors_credentials: bool,
    pub has_cors: bool,
    pub csp: Vec<(String, Vec<String>)>,
    pub hsts_enabled: Option<bool>,
    pub hsts_max_age: i64,
    pub rate_limit: Option<(i64, i64)>,
    pub csrf_enabled: bool,
    pub csrf_exempt: Vec<String>,
    pub has_csrf: bool,
    pub audit_table: Option<String>,
    pub trust_proxy: bool,

    pub routes: Vec<PreparedRoute<'s, 'a>>,
    pub rpc_fns: Vec<String>,
    pub middleware: Vec<&'a Expr<'a>>,
    pub on_error: Option<&'a Expr<'a>>,
    pub ws: Option<(String, &'s Config<'a>)>,
    pub sse: Vec<(String, &'a Expr<'a>)>,
    pub health_path: Option<String>,
    pub statics: Vec<(String, String)>,
    pub schedules: Vec<(String, &'a Expr<'a>)>,
    pub backgrounds: Vec<&'s FuncDecl<'a>>,
    pub discovers: Vec<(String, String, &'s Config<'a>)>,
    pub session: Option<&'s Config<'a>>,
    pub max_body: Option<i64>,
    pub compression: bool,
    pub db_driver: Option<String>,
    pub db_config: Option<&'s Config<'a>>,
    pub models: Vec<(String, &'s Config<'a>)>,
    pub tls: Option<&'s Config<'a>>,
    pub env_names: Vec<String>,
}

impl<'s, 'a> Features<'s, 'a> {
    pub fn has_auth(&self) -> bool {
        self.auth_type.is_some()
    }

    pub fn jwt(&self) -> bool {
        self.auth_type.as_deref() == Some("jwt")
    }

    pub fn api_key(&self) -> bool {
        self.auth_type.as_deref() == Some("api_key")
    }

    /// HSTS emits when requested, or by default once auth is present;
    /// `enabled: false` suppresses it.
    pub fn hsts_active(&self) -> bool {
        match self.hsts_enabled {
            Some(enabled) => enabled,
            None => self.has_auth(),
        }
    }

    pub fn auth_value(&self, key: &str) -> Option<&'a Expr<'a>> {
        self.auth_config
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }
}

/// Emits one server output from the server-block declarations and the
/// merged security configuration.
pub struct ServerGen<'s, 'a, 'int> {
    interner: &'int Interner,
    shared_js: &'s str,
    decls: &'s [&'a Stmt<'a>],
    security: &'s [&'a SecurityEntry<'a>],
    trait_defaults: HashMap<String, Vec<String>>,
    type_fields: HashMap<String, Vec<(String, String)>>,
    export_handler: bool,
}

impl<'s, 'a, 'int> ServerGen<'s, 'a, 'int> {
    pub fn new(
        interner: &'int Interner,
        shared_js: &'s str,
        decls: &'s [&'a Stmt<'a>],
        security: &'s [&'a SecurityEntry<'a>],
        trait_defaults: HashMap<String, Vec<String>>,
        export_handler: bool,
    ) -> Self {
        ServerGen {
            interner,
            shared_js,
            decls,
            security,
            trait_defaults,
            type_fields: HashMap::new(),
            export_handler,
        }
    }

    pub fn with_type_fields(mut self, fields: HashMap<String, Vec<(String, String)>>) -> Self {
        self.type_fields = fields;
        self
    }

    pub fn generate(&self) -> (String, Vec<Mapping>, Option<serde_json::Value>) {
        let features = self.detect_features();
        let mut ctx = GenCtx::new(self.interner);
        ctx.trait_defaults = self.trait_defaults.clone();
        let mut em = Emitter::new();

        runtime::emit_imports(&mut em, &features);
        em.blank();
        if !self.shared_js.is_empty() {
            em.template(self.shared_js);
            em.blank();
        }

        // Plain declarations inside the server block.
        ctx.push_scope(&[]);
        for stmt in self.decls {
            if is_server_leaf(stmt) {
                continue;
            }
            gen_stmt(&mut ctx, &mut em, stmt);
        }

        runtime::emit_logging(&mut em);
        runtime::emit_body_helpers(&mut em, &features);
        runtime::emit_response_helpers(&mut em);
        runtime::emit_route_table(&mut ctx, &mut em, &features);

        // The database layer comes first: session stores and audit sinks
        // reference it at module scope.
        if features.db_driver.is_some() {
            db::emit_db(&mut ctx, &mut em, &features);
            for (model, config) in &features.models {
                db::emit_model(&mut ctx, &mut em, &features, model, config, &self.type_fields);
            }
        }

        // Security emitters, fixed order.
        if features.jwt() {
            auth::emit_jwt(&mut ctx, &mut em, &features);
        }
        if features.api_key() {
            auth::emit_api_key(&mut ctx, &mut em, &features);
        }
        if !features.roles.is_empty() || !features.protects.is_empty() {
            protect::emit_protection(&mut em, &features);
        }
        if !features.sensitive.is_empty() {
            protect::emit_sanitizers(&mut em, &features);
        }
        if features.has_cors {
            http::emit_cors(&mut em, &features);
        }
        if !features.csp.is_empty() {
            http::emit_csp(&mut em, &features);
        }
        if features.hsts_active() {
            http::emit_hsts(&mut em, &features);
        }
        let needs_rate_limit = features.rate_limit.is_some()
            || features.protects.iter().any(|p| p.rate_limit.is_some())
            || features
                .routes
                .iter()
                .any(|r| r.decl.decorators.iter().any(|d| matches!(d, RouteDecorator::RateLimit { .. })));
        if needs_rate_limit || features.has_csrf || features.has_auth() {
            http::emit_client_ip(&mut em, &features);
        }
        if needs_rate_limit {
            http::emit_rate_limit(&mut em, &features);
        }
        if features.has_csrf || features.has_auth() {
            http::emit_csrf(&mut em, &features);
        }
        if features.audit_table.is_some() {
            http::emit_audit(&mut em, &features);
        }
        if features.session.is_some() {
            http::emit_session(&mut ctx, &mut em, &features);
        }

        if features.ws.is_some() {
            realtime::emit_ws(&mut ctx, &mut em, &features);
        }
        if !features.sse.is_empty() {
            realtime::emit_sse(&mut ctx, &mut em, &features);
        }
        if !features.backgrounds.is_empty() {
            realtime::emit_background(&mut ctx, &mut em, &features);
        }
        if !features.schedules.is_empty() {
            realtime::emit_schedule(&mut ctx, &mut em, &features);
        }
        if !features.discovers.is_empty() {
            realtime::emit_discover(&mut ctx, &mut em, &features);
        }

        let openapi = if features.routes.is_empty() {
            None
        } else {
            let spec = openapi::build_spec(&features);
            openapi::emit_openapi(&mut em, &spec);
            Some(spec)
        };

        runtime::emit_dispatcher(&mut ctx, &mut em, &features);
        runtime::emit_serve(&mut em, &features);

        if self.export_handler {
            em.blank();
            em.line("export { __handleRequest };");
        }
        ctx.pop_scope();

        let (out, mappings) = em.finish();
        (out, mappings, openapi)
    }

    // -- feature detection --------------------------------------------------

    fn detect_features(&self) -> Features<'s, 'a> {
        let interner = self.interner;
        let mut f = Features {
            auth_type: None,
            auth_config: Vec::new(),
            cookie_storage: false,
            roles: Vec::new(),
            protects: Vec::new(),
            sensitive: Vec::new(),
            cors_origins: Vec::new(),
            cors_credentials: false,
            has_cors: false,
            csp: Vec::new(),
            hsts_enabled: None,
            hsts_max_age: 31_536_000,
            rate_limit: None,
            csrf_enabled: true,
            csrf_exempt: Vec::new(),
            has_csrf: false,
            audit_table: None,
            trust_proxy: false,
            routes: Vec::new(),
            rpc_fns: Vec::new(),
            middleware: Vec::new(),
            on_error: None,
            ws: None,
            sse: Vec::new(),
            health_path: None,
            statics: Vec::new(),
            schedules: Vec::new(),
            backgrounds: Vec::new(),
            discovers: Vec::new(),
            session: None,
            max_body: None,
            compression: false,
            db_driver: None,
            db_config: None,
            models: Vec::new(),
            tls: None,
            env_names: Vec::new(),
        };

        for entry in self.security {
            match entry {
                SecurityEntry::Auth { auth_type, config, .. } => {
                    f.auth_type = Some(interner.resolve(*auth_type).to_string());
                    f.auth_config = config
                        .iter()
                        .map(|(k, v)| (interner.resolve(*k).to_string(), *v))
                        .collect();
                    f.cookie_storage = config.iter().any(|(k, v)| {
                        interner.resolve(*k) == "storage"
                            && literal_str(v, interner).as_deref() == Some("cookie")
                    });
                }
                SecurityEntry::Role { name, .. } => {
                    f.roles.push(interner.resolve(*name).to_string());
                }
                SecurityEntry::Protect { pattern, config, .. } => {
                    let pattern_str = interner.resolve(*pattern).to_string();
                    let mut rule = ProtectRule {
                        regex: glob_to_regex(&pattern_str),
                        pattern: pattern_str,
                        ..ProtectRule::default()
                    };
                    if let Some(require) = config_get(config, interner, "require") {
                        match required_role(require, interner) {
                            Some(role) => rule.role = Some(role),
                            None => rule.authenticated = true,
                        }
                    }
                    if let Some(rl) = config_get(config, interner, "rate_limit") {
                        if let ExprKind::Array(items) = &rl.kind {
                            let nums: Vec<i64> = items
                                .iter()
                                .filter_map(|item| match item {
                                    ArrayItem::Item(e) => match e.kind {
                                        ExprKind::Int(n) => Some(n),
                                        _ => None,
                                    },
                                    ArrayItem::Spread(_) => None,
                                })
                                .collect();
                            if nums.len() == 2 {
                                rule.rate_limit = Some((nums[0], nums[1]));
                            }
                        }
                    }
                    f.protects.push(rule);
                }
                SecurityEntry::Sensitive { type_name, field, config, .. } => {
                    f.sensitive.push(SensitiveField {
                        type_name: interner.resolve(*type_name).to_string(),
                        field: interner.resolve(*field).to_string(),
                        never_expose: config_get(config, interner, "never_expose")
                            .and_then(|e| literal_bool(e))
                            .unwrap_or(true),
                        visible_to: config_get(config, interner, "visible_to")
                            .and_then(|e| literal_str(e, interner)),
                    });
                }
                SecurityEntry::Cors { config, .. } => {
                    f.has_cors = true;
                    if let Some(origins) = config_get(config, interner, "origins") {
                        if let ExprKind::Array(items) = &origins.kind {
                            for item in items {
                                if let ArrayItem::Item(e) = item {
                                    if let Some(s) = literal_str(e, interner) {
                                        f.cors_origins.push(s);
                                    }
                                }
                            }
                        }
                    }
                    f.cors_credentials = config_get(config, interner, "credentials")
                        .and_then(|e| literal_bool(e))
                        .unwrap_or(false);
                }
                SecurityEntry::Csp { config, .. } => {
                    for (key, value) in config.iter() {
                        let directive = interner.resolve(*key).to_string();
                        let mut sources = Vec::new();
                        if let ExprKind::Array(items) = &value.kind {
                            for item in items {
                                if let ArrayItem::Item(e) = item {
                                    if let Some(s) = literal_str(e, interner) {
                                        sources.push(s);
                                    }
                                }
                            }
                        } else if let Some(s) = literal_str(value, interner) {
                            sources.push(s);
                        }
                        f.csp.push((directive, sources));
                    }
                }
                SecurityEntry::RateLimit { config, .. } => {
                    let max = config_get(config, interner, "max").and_then(literal_int).unwrap_or(100);
                    let window =
                        config_get(config, interner, "window").and_then(literal_int).unwrap_or(60);
                    f.rate_limit = Some((max, window));
                }
                SecurityEntry::Csrf { config, .. } => {
                    f.has_csrf = true;
                    f.csrf_enabled = config_get(config, interner, "enabled")
                        .and_then(|e| literal_bool(e))
                        .unwrap_or(true);
                    if let Some(exempt) = config_get(config, interner, "exempt") {
                        if let ExprKind::Array(items) = &exempt.kind {
                            for item in items {
                                if let ArrayItem::Item(e) = item {
                                    if let Some(s) = literal_str(e, interner) {
                                        f.csrf_exempt.push(s);
                                    }
                                }
                            }
                        }
                    }
                }
                SecurityEntry::Audit { config, .. } => {
                    f.audit_table = Some(
                        config_get(config, interner, "table")
                            .and_then(|e| literal_str(e, interner))
                            .unwrap_or_else(|| "audit_log".to_string()),
                    );
                }
                SecurityEntry::TrustProxy { enabled, .. } => f.trust_proxy = *enabled,
                SecurityEntry::Hsts { config, .. } => {
                    f.hsts_enabled = Some(
                        config_get(config, interner, "enabled")
                            .and_then(|e| literal_bool(e))
                            .unwrap_or(true),
                    );
                    if let Some(age) = config_get(config, interner, "max_age").and_then(literal_int) {
                        f.hsts_max_age = age;
                    }
                }
            }
        }

        for stmt in self.decls {
            match &stmt.kind {
                StmtKind::Route(route) => {
                    let method = interner.resolve(route.method).to_uppercase();
                    let path = interner.resolve(route.path).to_string();
                    f.routes.push(PreparedRoute {
                        regex: glob_to_regex(&path),
                        method,
                        path,
                        decl: route,
                    });
                }
                StmtKind::Func(func) if func.is_pub => {
                    f.rpc_fns.push(interner.resolve(func.name).to_string());
                }
                StmtKind::Middleware { handler } => f.middleware.push(*handler),
                StmtKind::OnError { handler } => f.on_error = Some(*handler),
                StmtKind::WsDecl { path, config } => {
                    f.ws = Some((interner.resolve(*path).to_string(), config));
                }
                StmtKind::SseDecl { path, handler } => {
                    f.sse.push((interner.resolve(*path).to_string(), *handler));
                }
                StmtKind::HealthDecl { path } => {
                    f.health_path = Some(interner.resolve(*path).to_string());
                }
                StmtKind::StaticDecl { url_prefix, dir } => {
                    f.statics.push((
                        interner.resolve(*url_prefix).to_string(),
                        interner.resolve(*dir).to_string(),
                    ));
                }
                StmtKind::ScheduleDecl { pattern, handler } => {
                    f.schedules.push((interner.resolve(*pattern).to_string(), *handler));
                }
                StmtKind::BackgroundDecl(func) => f.backgrounds.push(func),
                StmtKind::DiscoverDecl { peer, url, config } => {
                    f.discovers.push((
                        interner.resolve(*peer).to_string(),
                        interner.resolve(*url).to_string(),
                        config,
                    ));
                }
                StmtKind::SessionDecl { config } => f.session = Some(config),
                StmtKind::MaxBodyDecl { bytes } => f.max_body = Some(*bytes),
                StmtKind::CompressionDecl { .. } => f.compression = true,
                StmtKind::DbDecl { config } => {
                    f.db_config = Some(config);
                    f.db_driver = Some(
                        config_get(config, interner, "driver")
                            .and_then(|e| literal_str(e, interner))
                            .unwrap_or_else(|| "sqlite".to_string()),
                    );
                }
                StmtKind::TlsDecl { config } => f.tls = Some(config),
                StmtKind::EnvDecl { names } => {
                    for name in names {
                        f.env_names.push(interner.resolve(*name).to_string());
                    }
                }
                StmtKind::ModelDecl { type_name, config } => {
                    f.models.push((interner.resolve(*type_name).to_string(), config));
                }
                _ => {}
            }
        }

        sort_routes(&mut f.routes);
        f
    }
}

fn is_server_leaf(stmt: &Stmt<'_>) -> bool {
    stmt.kind.is_server_only()
}

/// Route path to anchored regex source: `**` spans segments, `*` and
/// `:name` match one segment.
pub fn glob_to_regex(path: &str) -> String {
    let mut out = String::from("^");
    for (i, segment) in path.split('/').enumerate() {
        if i > 0 || path.starts_with('/') {
            if segment.is_empty() && i == 0 {
                continue;
            }
            out.push('/');
        }
        if segment == "**" {
            out.push_str(".*");
        } else if segment == "*" {
            out.push_str("[^/]*");
        } else if let Some(name) = segment.strip_prefix(':') {
            out.push_str(&format!("(?<{}>[^/]+)", name));
        } else {
            out.push_str(&regex_escape(segment));
        }
    }
    out.push('$');
    out
}

fn regex_escape(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Specificity sort: per segment static ≺ `:name` ≺ `*` ≺ `**`, compared
/// lexicographically; ties fall back to the HTTP method order.
pub fn sort_routes(routes: &mut [PreparedRoute<'_, '_>]) {
    fn segment_rank(segment: &str) -> u8 {
        if segment == "**" {
            3
        } else if segment == "*" {
            2
        } else if segment.starts_with(':') {
            1
        } else {
            0
        }
    }
    fn method_rank(method: &str) -> usize {
        METHOD_ORDER.iter().position(|m| *m == method).unwrap_or(METHOD_ORDER.len())
    }
    routes.sort_by(|a, b| {
        let a_ranks: Vec<u8> = a.path.split('/').map(segment_rank).collect();
        let b_ranks: Vec<u8> = b.path.split('/').map(segment_rank).collect();
        a_ranks
            .cmp(&b_ranks)
            .then_with(|| method_rank(&a.method).cmp(&method_rank(&b.method)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_conversion_covers_all_segment_kinds() {
        assert_eq!(glob_to_regex("/api/users"), "^/api/users$");
        assert_eq!(glob_to_regex("/api/:id"), "^/api/(?<id>[^/]+)$");
        assert_eq!(glob_to_regex("/api/*"), "^/api/[^/]*$");
        assert_eq!(glob_to_regex("/api/**"), "^/api/.*$");
    }

    #[test]
    fn static_segments_are_escaped() {
        assert_eq!(glob_to_regex("/a.b"), "^/a\\.b$");
    }
}
