//! Generated-server verification by substring: the helper names and
//! orderings here are part of the compiler's output contract.

mod common;

use common::{assert_contains, assert_ordered, build, server_js};

const BASE_SERVER: &str = r#"
server {
    route GET "/api/ping" => fn(req) { return respond(200, { ok: true }) }
}
"#;

#[test]
fn minimal_server_carries_the_base_runtime() {
    let js = server_js(BASE_SERVER);
    for helper in [
        "__maxBodySize",
        "__readBodyBytes",
        "__BODY_TOO_LARGE__",
        "__parseBody",
        "__parseQuery",
        "__parseCookies",
        "__normalizePath",
        "respond",
        "function html(",
        "function text(",
        "function with_headers(",
        "function redirect(",
        "function set_cookie(",
        "function stream(",
        "function sse(",
        "function negotiate(",
        "__addRoute",
        "__matchRoute",
        "__handleRequest",
        "AsyncLocalStorage",
        "LOG_LEVEL",
        "LOG_FILE",
        "X-Request-Id",
        "__activeRequests",
        "SIGINT",
        "SIGTERM",
        "Bun.serve",
    ] {
        assert_contains(&js, helper);
    }
}

#[test]
fn default_body_limit_is_one_mebibyte() {
    assert_contains(&server_js(BASE_SERVER), "const __maxBodySize = 1048576;");
    let bumped = r#"
server {
    max_body 2097152
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    assert_contains(&server_js(bumped), "const __maxBodySize = 2097152;");
}

#[test]
fn body_too_large_maps_to_413() {
    let js = server_js(BASE_SERVER);
    assert_contains(&js, "respond(413");
}

#[test]
fn routes_emit_sorted_by_specificity() {
    let source = r#"
server {
    route GET "/api/*" => wildcard_handler
    route GET "/api/:id" => param_handler
    route GET "/api/users" => users_handler
    fn wildcard_handler(req) { return respond(200, nil) }
    fn param_handler(req) { return respond(200, nil) }
    fn users_handler(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_ordered(&js, "\"/api/users\"", "\"/api/:id\"");
    assert_ordered(&js, "\"/api/:id\"", "\"/api/*\"");
}

#[test]
fn route_globs_convert_to_regexes() {
    let source = r#"
server {
    route GET "/files/**" => fn(req) { return respond(200, nil) }
    route GET "/api/:id" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "(?<id>[^/]+)");
    assert_contains(&js, ".*");
}

// -- jwt --------------------------------------------------------------------

const JWT_SERVER: &str = r#"
security {
    auth jwt { secret: env("JWT_SECRET") }
    rate_limit { max: 100, window: 60 }
}
server {
    route GET "/api/me" => fn(req) { return respond(200, req.user) }
}
"#;

#[test]
fn jwt_auth_enforces_hs256_before_signing() {
    let js = server_js(JWT_SERVER);
    assert_contains(&js, "__header.alg !== \"HS256\"");
    let auth_fn_start = js.find("async function __authenticate").expect("__authenticate emitted");
    let body = &js[auth_fn_start..];
    let alg_check = body.find("__header.alg !== \"HS256\"").expect("alg check in __authenticate");
    let sign_call = body.find("crypto.subtle.sign").expect("signature verification");
    assert!(
        alg_check < sign_call,
        "algorithm check must precede crypto.subtle.sign"
    );
}

#[test]
fn jwt_emits_key_cache_and_password_helpers() {
    let js = server_js(JWT_SERVER);
    for helper in [
        "__jwtKeyCache",
        "async function sign_jwt",
        "async function hash_password",
        "async function verify_password",
        "100000",
        "payload.exp",
        "payload.nbf",
    ] {
        assert_contains(&js, helper);
    }
}

#[test]
fn cookie_storage_switches_transport() {
    let source = r#"
security {
    auth jwt { secret: env("S"), storage: "cookie" }
    rate_limit { max: 10, window: 60 }
}
server {
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "__tova_auth");
    assert_contains(&js, "__setAuthCookie");
    assert_contains(&js, "__clearAuthCookie");
    assert_contains(&js, "/rpc/__logout");
    assert_contains(&js, "HttpOnly; Secure; SameSite=Lax");
}

#[test]
fn api_key_auth_emits_header_and_key_set() {
    let source = r#"
security {
    auth api_key { header: "X-Api-Key", keys: env("API_KEYS") }
    rate_limit { max: 10, window: 60 }
}
server {
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "__apiKeyHeader");
    assert_contains(&js, "__validApiKeys");
}

// -- roles / protect / sanitize ---------------------------------------------

#[test]
fn protect_rules_compile_to_regex_checks() {
    let source = r#"
security {
    auth jwt { secret: env("S"), storage: "cookie" }
    rate_limit { max: 10, window: 60 }
    role admin
    protect "/admin/**" { require: role("admin"), rate_limit: [10, 60] }
}
server {
    route GET "/admin/stats" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    for helper in [
        "__securityRoles",
        "__getUserRoles",
        "__hasPermission",
        "__protectRules",
        "__checkProtection",
        "respond(401",
        "respond(403",
        "user.roles",
        "user.role",
    ] {
        assert_contains(&js, helper);
    }
}

#[test]
fn sensitive_fields_generate_sanitizers() {
    let source = r#"
shared {
    type User { id: Int, name: String, password: String, email: String }
}
security {
    auth jwt { secret: env("S"), storage: "cookie" }
    rate_limit { max: 10, window: 60 }
    sensitive User.password { never_expose: true }
    sensitive User.email { never_expose: false, visible_to: "self" }
}
server {
    route GET "/api/users" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    for helper in [
        "__sanitizeUser",
        "__autoSanitize",
        "__isSameIdentity",
        "__canSee",
        "__visibleTo",
        "delete out.password",
        "\"userId\", \"user_id\", \"uuid\"",
    ] {
        assert_contains(&js, helper);
    }
}

// -- headers / limits / csrf / audit / session -------------------------------

#[test]
fn cors_emits_origin_set_and_vary() {
    let source = r#"
security {
    cors { origins: ["https://app.example.com"], credentials: true }
}
server {
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "__corsOrigins");
    assert_contains(&js, "__getCorsHeaders");
    assert_contains(&js, "Vary");
    assert_contains(&js, "Access-Control-Allow-Credentials");
}

#[test]
fn csp_converts_underscores_and_quotes_keywords() {
    let source = r#"
security {
    csp { default_src: ["self"], script_src: ["self", "unsafe-inline"], img_src: ["data:"] }
}
server {
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "__getCspHeader");
    assert_contains(&js, "default-src");
    assert_contains(&js, "'self'");
    assert_contains(&js, "'unsafe-inline'");
    assert_contains(&js, "data:");
}

#[test]
fn hsts_follows_auth_unless_disabled() {
    let js = server_js(JWT_SERVER);
    assert_contains(&js, "Strict-Transport-Security");

    let disabled = r#"
security {
    auth jwt { secret: env("S"), storage: "cookie" }
    rate_limit { max: 10, window: 60 }
    hsts { enabled: false }
}
server {
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(disabled);
    assert!(!js.contains("Strict-Transport-Security"), "hsts disabled");
}

#[test]
fn rate_limit_store_and_retry_after() {
    let js = server_js(JWT_SERVER);
    assert_contains(&js, "__rateLimitStore");
    assert_contains(&js, "__checkRateLimit");
    assert_contains(&js, "__getClientIp");
    assert_contains(&js, "Retry-After");
    assert_contains(&js, "respond(429");
}

#[test]
fn trust_proxy_reads_forwarded_header() {
    let source = r#"
security {
    rate_limit { max: 10, window: 60 }
    trust_proxy true
}
server {
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    assert_contains(&server_js(source), "x-forwarded-for");
}

#[test]
fn csrf_token_has_four_parts_and_exempt_globs() {
    let source = r#"
security {
    csrf { enabled: true, exempt: ["/webhooks/**"] }
}
server {
    route POST "/api/save" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "__csrfExemptPatterns");
    assert_contains(&js, "${ts}:${nonce}:${binding}");
    assert_contains(&js, "parts.length !== 4");
    assert_contains(&js, "^/webhooks/.*$");
}

#[test]
fn audit_validates_table_name_and_tags_stderr() {
    let source = r#"
security {
    audit { table: "audit_log" }
}
server {
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "__auditLog");
    assert_contains(&js, "^[a-zA-Z_][a-zA-Z0-9_]*$");
    assert_contains(&js, "[tova:audit]");
}

#[test]
fn session_store_signs_ids_and_regenerates() {
    let source = r#"
server {
    session { ttl: 3600 }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "const __sessionTtl = 3600;");
    assert_contains(&js, "__signSessionId");
    assert_contains(&js, "__regenerateSession");
    assert_contains(&js, "__session = __loadSession(req)");
}

#[test]
fn sqlite_backed_sessions_use_prepared_statements() {
    let source = r#"
server {
    db { driver: "sqlite", path: "app.db" }
    session { ttl: 3600 }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    assert_contains(&server_js(source), "__sessionStmts");
}

// -- db / model ---------------------------------------------------------------

#[test]
fn sqlite_db_sets_pragmas_and_migrations() {
    let source = r#"
server {
    db { driver: "sqlite", path: "app.db" }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "bun:sqlite");
    assert_contains(&js, "PRAGMA journal_mode=WAL");
    assert_contains(&js, "PRAGMA foreign_keys=ON");
    assert_contains(&js, "__migrations");
    for helper in ["function query(", "function run(", "function get(", "function exec(", "function transaction(", "function migrate("] {
        assert_contains(&js, helper);
    }
}

#[test]
fn postgres_db_uses_async_and_serial_keys() {
    let source = r#"
server {
    db { driver: "postgres" }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "import postgres from \"postgres\"");
    assert_contains(&js, "SERIAL PRIMARY KEY");
    assert_contains(&js, "async function query(");
}

const MODEL_SERVER: &str = r#"
shared {
    type User { id: Int, name: String }
}
server {
    db { driver: "sqlite", path: "app.db" }
    model User { timestamps: true }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;

#[test]
fn model_emits_crud_with_column_whitelist() {
    let js = server_js(MODEL_SERVER);
    assert_contains(&js, "const UserModel = {");
    assert_contains(&js, "__validCols");
    assert_contains(&js, "Invalid column");
    for method in ["find(", "all()", "where(", "create(", "update(", "delete(", "count("] {
        assert_contains(&js, method);
    }
    assert_contains(&js, "created_at");
    assert_contains(&js, "updated_at");
}

#[test]
fn model_guards_dynamic_sql_with_assert_cols() {
    let js = server_js(MODEL_SERVER);
    let model_start = js.find("const UserModel").expect("model emitted");
    let model_body = &js[model_start..];
    for method in ["where(conditions)", "create(data)", "update(id, data)", "count(conditions"] {
        let method_at = model_body
            .find(method)
            .unwrap_or_else(|| panic!("missing {method}"));
        let after = &model_body[method_at..];
        let assert_at = after
            .find("this.__assertCols(keys)")
            .unwrap_or_else(|| panic!("{method} never asserts columns"));
        let sql_at = after
            .find('`')
            .unwrap_or_else(|| panic!("{method} has no SQL"));
        assert!(
            assert_at < sql_at,
            "{method} must call __assertCols before composing SQL"
        );
    }
}

#[test]
fn model_relations_add_accessors() {
    let source = r#"
shared {
    type Post { id: Int, title: String }
}
server {
    db { driver: "sqlite", path: "app.db" }
    model Post { belongs_to: "User", has_many: "comments" }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "user_id");
    assert_contains(&js, "comments(row)");
}

// -- realtime / jobs / scheduling / discovery --------------------------------

#[test]
fn websocket_block_emits_registries_and_helpers() {
    let source = r#"
server {
    ws "/chat" {
        on_message: fn(ws, msg) { broadcast(msg) },
    }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    for helper in [
        "__wsClients",
        "__wsRooms",
        "function broadcast(",
        "function join(",
        "function leave(",
        "function broadcast_to(",
        "websocket: __wsConfig",
        "server.upgrade",
    ] {
        assert_contains(&js, helper);
    }
}

#[test]
fn sse_declaration_registers_event_stream_route() {
    let source = r#"
server {
    sse "/events" fn(send, close) { send("tick", { at: now() }) }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "text/event-stream");
    assert_contains(&js, "__sseChannels");
    assert_contains(&js, "\"/events\"");
}

#[test]
fn background_jobs_retry_and_drain() {
    let source = r#"
server {
    background fn send_welcome(address) { print(address) }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "function spawn_job(");
    assert_contains(&js, "job.attempts < 2");
    assert_contains(&js, "__drainJobs");
    assert_contains(&js, "__jobQueue.pop()");
}

#[test]
fn schedule_handles_intervals_and_cron() {
    let source = r#"
server {
    schedule "5m" fn() { print("tick") }
    schedule "0 3 * * 1-5" fn() { print("nightly") }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "setInterval");
    assert_contains(&js, "__parseCron");
    assert_contains(&js, "__cronField");
    assert_contains(&js, "\"5m\"");
    assert_contains(&js, "0 3 * * 1-5");
}

#[test]
fn discover_emits_circuit_breaker_with_config() {
    let source = r#"
server {
    discover "billing" at "http://billing:4000" with { threshold: 3, timeout: 2000, reset_timeout: 15000 }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    for needle in [
        "__makeBreaker",
        "\"CLOSED\"",
        "\"OPEN\"",
        "\"HALF_OPEN\"",
        "threshold: 3",
        "timeout: 2000",
        "reset_timeout: 15000",
        "2 ** attempt",
        "AbortController",
        "X-Request-Id",
        "PORT_BILLING",
    ] {
        assert_contains(&js, needle);
    }
}

// -- openapi / rpc / tests ----------------------------------------------------

#[test]
fn routes_produce_openapi_spec_and_docs() {
    let source = r#"
server {
    route GET "/api/users/:id" => fn(req) { return respond(200, nil) }
}
"#;
    let compilation = build(source);
    let js = compilation.output.server_text().expect("server output");
    assert_contains(js, "__openApiSpec");
    assert_contains(js, "/openapi.json");
    assert_contains(js, "/docs");
    assert_contains(js, "swagger-ui");
    let spec = compilation.output.openapi.expect("openapi value");
    assert_eq!(spec["openapi"], "3.0.3");
    assert!(spec["paths"]["/api/users/{id}"]["get"].is_object());
}

#[test]
fn pub_server_functions_become_rpc_endpoints() {
    let source = r#"
server {
    pub fn list_users() { return [] }
    route GET "/x" => fn(req) { return respond(200, nil) }
}
"#;
    let js = server_js(source);
    assert_contains(&js, "/rpc/");
    assert_contains(&js, "__rpcHandlers");
    assert_contains(&js, "__args");
}

#[test]
fn test_blocks_export_the_handler_and_emit_bun_tests() {
    let source = r#"
server {
    route GET "/x" => fn(req) { return respond(200, nil) }
}
test "ping responds" {
    result = 1
    print(result)
}
"#;
    let compilation = build(source);
    let server = compilation.output.server_text().expect("server output");
    assert_contains(server, "export { __handleRequest };");
    let test_js = compilation.output.test.expect("test output");
    assert_contains(&test_js, "bun:test");
    assert_contains(&test_js, "test(\"ping responds\"");
}

#[test]
fn named_servers_produce_separate_outputs() {
    let source = r#"
server api {
    route GET "/a" => fn(req) { return respond(200, nil) }
}
server admin {
    route GET "/b" => fn(req) { return respond(200, nil) }
}
"#;
    let compilation = build(source);
    assert_eq!(compilation.output.servers.len(), 2);
    assert!(compilation.output.servers.contains_key("api"));
    assert!(compilation.output.servers.contains_key("admin"));
}

#[test]
fn dispatcher_documents_the_state_machine_order() {
    let js = server_js(JWT_SERVER);
    assert_ordered(&js, "DRAIN_CHECK", "ROUTE_MATCH");
    assert_ordered(&js, "RATE_LIMIT_GLOBAL", "ROUTE_MATCH");
}
