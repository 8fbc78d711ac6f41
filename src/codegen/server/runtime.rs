use super::{Features, METHOD_ORDER};
use crate::codegen::emitter::Emitter;
use crate::codegen::expr::{gen_expr, js_string};
use crate::codegen::GenCtx;

pub fn emit_imports(em: &mut Emitter, f: &Features<'_, '_>) {
    em.line("// server");
    em.line("import { AsyncLocalStorage } from \"node:async_hooks\";");
    em.line("import * as fs from \"node:fs\";");
    if f.has_csrf || f.has_auth() || f.session.is_some() {
        em.line("import { createHmac } from \"node:crypto\";");
    }
    match f.db_driver.as_deref() {
        Some("sqlite") => em.line("import { Database } from \"bun:sqlite\";"),
        Some("postgres") => em.line("import postgres from \"postgres\";"),
        Some("mysql") => em.line("import mysql from \"mysql2/promise\";"),
        _ => {}
    }
    for name in &f.env_names {
        em.line(&format!(
            "if (process.env[{}] == null) console.error(`[tova] missing env var {}`);",
            js_string(name),
            name
        ));
    }
}

pub fn emit_logging(em: &mut Emitter) {
    em.template(
        r#"
const __LOG_LEVELS = { debug: 10, info: 20, warn: 30, error: 40 };
const __logLevel = __LOG_LEVELS[process.env.LOG_LEVEL ?? "info"] ?? 20;
const __logFile = process.env.LOG_FILE ?? null;
const __requestContext = new AsyncLocalStorage();

function __requestId() {
  return __requestContext.getStore()?.requestId ?? "-";
}

function __log(level, message, extra = {}) {
  if ((__LOG_LEVELS[level] ?? 20) < __logLevel) return;
  const entry = JSON.stringify({
    ts: new Date().toISOString(),
    level,
    requestId: __requestId(),
    message,
    ...extra,
  });
  if (__logFile) {
    fs.appendFileSync(__logFile, entry + "\n");
  } else {
    console.log(entry);
  }
}

function locals() {
  const store = __requestContext.getStore();
  if (!store) return {};
  return (store.locals ??= {});
}
"#,
    );
}

pub fn emit_body_helpers(em: &mut Emitter, f: &Features<'_, '_>) {
    let max_body = f.max_body.unwrap_or(1_048_576);
    em.line(&format!("const __maxBodySize = {};", max_body));
    em.template(
        r#"
async function __readBodyBytes(req) {
  const reader = req.body?.getReader();
  if (!reader) return new Uint8Array(0);
  const chunks = [];
  let total = 0;
  for (;;) {
    const { done, value } = await reader.read();
    if (done) break;
    total += value.byteLength;
    if (total > __maxBodySize) {
      reader.cancel();
      throw new Error("__BODY_TOO_LARGE__");
    }
    chunks.push(value);
  }
  const out = new Uint8Array(total);
  let offset = 0;
  for (const chunk of chunks) {
    out.set(chunk, offset);
    offset += chunk.byteLength;
  }
  return out;
}

async function __parseBody(req) {
  const bytes = await __readBodyBytes(req);
  if (bytes.byteLength === 0) return null;
  const text = new TextDecoder().decode(bytes);
  const contentType = req.headers.get("content-type") ?? "";
  if (contentType.includes("application/json")) {
    try { return JSON.parse(text); } catch { return null; }
  }
  if (contentType.includes("application/x-www-form-urlencoded")) {
    return Object.fromEntries(new URLSearchParams(text));
  }
  return text;
}

function __parseQuery(url) {
  return Object.fromEntries(url.searchParams);
}

function __parseCookies(req) {
  const header = req.headers.get("cookie") ?? "";
  const out = {};
  for (const pair of header.split(";")) {
    const idx = pair.indexOf("=");
    if (idx < 0) continue;
    out[pair.slice(0, idx).trim()] = decodeURIComponent(pair.slice(idx + 1).trim());
  }
  return out;
}

function __normalizePath(pathname) {
  let path = pathname;
  try { path = decodeURIComponent(path); } catch {}
  path = path.replace(/\/\/+/g, "/");
  const segments = [];
  for (const segment of path.split("/")) {
    if (segment === "..") segments.pop();
    else if (segment !== "." ) segments.push(segment);
  }
  path = segments.join("/");
  if (!path.startsWith("/")) path = "/" + path;
  if (path.length > 1 && path.endsWith("/")) path = path.slice(0, -1);
  return path;
}
"#,
    );
}

pub fn emit_response_helpers(em: &mut Emitter) {
    em.template(
        r#"
function respond(status, body, headers = {}) {
  const isJson = body !== null && typeof body === "object";
  const h = new Headers(headers);
  if (!h.has("Content-Type")) {
    h.set("Content-Type", isJson ? "application/json" : "text/plain; charset=utf-8");
  }
  const payload = isJson ? JSON.stringify(body) : String(body ?? "");
  return new Response(payload, { status, headers: h });
}

function json(body, status = 200) {
  return respond(status, body);
}

function html(markup, status = 200) {
  return new Response(markup, {
    status,
    headers: { "Content-Type": "text/html; charset=utf-8" },
  });
}

function text(body, status = 200) {
  return new Response(String(body), {
    status,
    headers: { "Content-Type": "text/plain; charset=utf-8" },
  });
}

function with_headers(res, headers) {
  const out = new Response(res.body, res);
  for (const [key, value] of Object.entries(headers)) out.headers.set(key, value);
  return out;
}

function redirect(url, status = 302) {
  return new Response(null, { status, headers: { Location: url } });
}

function set_cookie(res, name, value, opts = {}) {
  const parts = [`${name}=${encodeURIComponent(value)}`];
  if (opts.max_age != null) parts.push(`Max-Age=${opts.max_age}`);
  parts.push(`Path=${opts.path ?? "/"}`);
  if (opts.http_only !== false) parts.push("HttpOnly");
  if (opts.secure !== false) parts.push("Secure");
  parts.push(`SameSite=${opts.same_site ?? "Lax"}`);
  const out = new Response(res.body, res);
  out.headers.append("Set-Cookie", parts.join("; "));
  return out;
}

function stream(fn) {
  const body = new ReadableStream({
    start(controller) {
      const send = (chunk) => controller.enqueue(new TextEncoder().encode(chunk));
      const close = () => controller.close();
      fn(send, close);
    },
  });
  return new Response(body, { headers: { "Content-Type": "application/octet-stream" } });
}

function sse(fn) {
  const body = new ReadableStream({
    start(controller) {
      const send = (event, data) => {
        const payload = typeof data === "string" ? data : JSON.stringify(data);
        controller.enqueue(new TextEncoder().encode(`event: ${event}\ndata: ${payload}\n\n`));
      };
      const close = () => controller.close();
      fn(send, close);
    },
  });
  return new Response(body, {
    headers: {
      "Content-Type": "text/event-stream",
      "Cache-Control": "no-cache",
      Connection: "keep-alive",
    },
  });
}

function negotiate(req, data) {
  const accept = req.headers.get("accept") ?? "";
  if (accept.includes("text/html")) {
    return html(`<pre>${JSON.stringify(data, null, 2)}</pre>`);
  }
  return respond(200, data);
}
"#,
    );
}

/// Route table: method + anchored regex + handler triples, registered in
/// specificity order (static first, `**` last), methods tie-broken
/// GET..OPTIONS.
pub fn emit_route_table(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.template(
        r#"
const __routes = [];
function __addRoute(method, pattern, regex, handler) {
  __routes.push({ method, pattern, regex, handler });
}
function __matchRoute(method, path) {
  for (const route of __routes) {
    if (route.method !== method) continue;
    const match = route.regex.exec(path);
    if (match) return { route, params: match.groups ?? {} };
  }
  return null;
}
"#,
    );
    for route in &f.routes {
        let handler = gen_expr(ctx, route.decl.handler);
        em.stmt(
            route.decl.loc,
            &format!(
                "__addRoute({}, {}, new RegExp({}), {});",
                js_string(&route.method),
                js_string(&route.path),
                js_string(&route.regex),
                handler
            ),
        );
    }
    em.blank();
    let order = METHOD_ORDER
        .iter()
        .map(|m| js_string(m))
        .collect::<Vec<_>>()
        .join(", ");
    em.line(&format!("const __methodOrder = [{}];", order));
}

/// The request dispatcher walks the fixed pipeline:
/// RECEIVED -> DRAIN_CHECK -> CORS_PREFLIGHT -> STATIC_SERVE ->
/// RATE_LIMIT_GLOBAL -> ROUTE_MATCH -> PROTECT_CHECK -> RATE_LIMIT_ROUTE ->
/// CSRF_CHECK -> AUTH_DECORATOR -> VALIDATION -> HANDLER -> SANITIZE ->
/// HEADERS -> LOG -> FINALLY. Any step may short-circuit with its status.
pub fn emit_dispatcher(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.template(
        r#"
let __activeRequests = 0;
let __draining = false;

async function __handleRequest(req) {
  const __start = Date.now();
  const requestId = req.headers.get("x-request-id") ?? crypto.randomUUID();
  __activeRequests += 1;
  try {
    return await __requestContext.run({ requestId }, async () => {
      let res;
      try {
        res = await __dispatch(req);
      } catch (err) {
        if (err instanceof Error && err.message === "__BODY_TOO_LARGE__") {
          res = respond(413, { error: "request body too large" });
        } else {
          __log("error", "unhandled error", { error: String(err?.stack ?? err) });
"#,
    );
    if let Some(on_error) = f.on_error {
        let handler = gen_expr(ctx, on_error);
        em.line(&format!(
            "          res = (await ({})(err, req)) ?? respond(500, {{ error: \"internal error\" }});",
            handler
        ));
    } else {
        em.line("          res = respond(500, { error: \"internal error\" });");
    }
    em.template(
        r#"
        }
      }
      res = __applyStandardHeaders(req, res);
      res.headers.set("X-Request-Id", requestId);
      __log("info", "request", {
        method: req.method,
        path: new URL(req.url).pathname,
        status: res.status,
        ms: Date.now() - __start,
      });
      return res;
    });
  } finally {
    __activeRequests -= 1;
  }
}

async function __dispatch(req) {
  const url = new URL(req.url);
  const path = __normalizePath(url.pathname);
  const method = req.method.toUpperCase();

  // DRAIN_CHECK
  if (__draining) {
    return respond(503, { error: "shutting down" }, { "Connection": "close" });
  }
"#,
    );

    if f.has_cors {
        em.template(
            r#"
  // CORS_PREFLIGHT
  if (method === "OPTIONS") {
    const corsHeaders = __getCorsHeaders(req);
    if (corsHeaders) {
      return new Response(null, { status: 204, headers: corsHeaders });
    }
  }
"#,
        );
    }

    for (prefix, dir) in &f.statics {
        em.line("  // STATIC_SERVE");
        em.line(&format!("  if (path.startsWith({})) {{", js_string(prefix)));
        em.line(&format!(
            "    const file = Bun.file({} + path.slice({}));",
            js_string(dir),
            prefix.len()
        ));
        em.line("    if (await file.exists()) return new Response(file);");
        em.line("    return respond(404, { error: \"not found\" });");
        em.line("  }");
    }

    if f.rate_limit.is_some() {
        em.template(
            r#"
  // RATE_LIMIT_GLOBAL
  {
    const limited = __checkRateLimit(__getClientIp(req), __globalRateLimit);
    if (limited) return limited;
  }
"#,
        );
    }

    if let Some(health) = &f.health_path {
        em.line(&format!(
            "  if (path === {} && method === \"GET\") return respond(200, {{ status: \"ok\" }});",
            js_string(health)
        ));
    }

    if !f.routes.is_empty() {
        em.template(
            r#"
  if (path === "/openapi.json" && method === "GET") {
    return respond(200, __openApiSpec);
  }
  if (path === "/docs" && method === "GET") {
    return html(__swaggerUi);
  }
"#,
        );
    }

    emit_rpc_dispatch(em, f);

    em.template(
        r#"
  // ROUTE_MATCH
  const matched = __matchRoute(method, path);
  if (!matched) {
    return respond(404, { error: "not found" });
  }
  const { route, params } = matched;
"#,
    );

    if !f.protects.is_empty() {
        em.template(
            r#"
  // PROTECT_CHECK
  {
    const denied = await __checkProtection(req, path);
    if (denied) return denied;
  }
"#,
        );
    }

    if f.protects.iter().any(|p| p.rate_limit.is_some()) {
        em.template(
            r#"
  // RATE_LIMIT_ROUTE
  for (const rule of __protectRules) {
    if (rule.rateLimit && rule.regex.test(path)) {
      const limited = __checkRateLimit(`${__getClientIp(req)}:${rule.pattern}`, rule.rateLimit);
      if (limited) return limited;
    }
  }
"#,
        );
    }

    if f.has_csrf || f.has_auth() {
        em.template(
            r#"
  // CSRF_CHECK
  if (__csrfEnabled && !["GET", "HEAD", "OPTIONS"].includes(method)) {
    if (!__csrfExemptPatterns.some((re) => re.test(path))) {
      const denied = __checkCsrf(req);
      if (denied) return denied;
    }
  }
"#,
        );
    }

    emit_handler_invocation(ctx, em, f);
    em.line("}");
    em.blank();
    emit_standard_headers(em, f);
}

fn emit_rpc_dispatch(em: &mut Emitter, f: &Features<'_, '_>) {
    if f.cookie_storage {
        em.template(
            r#"
  if (path === "/rpc/__logout" && method === "POST") {
    return __clearAuthCookie(respond(200, { ok: true }));
  }
"#,
        );
    }
    if f.rpc_fns.is_empty() {
        return;
    }
    let names = f
        .rpc_fns
        .iter()
        .map(|n| format!("{}: {}", n, n))
        .collect::<Vec<_>>()
        .join(", ");
    em.line(&format!("  const __rpcHandlers = {{ {} }};", names));
    em.template(
        r#"
  if (path.startsWith("/rpc/") && method === "POST") {
    const name = path.slice(5);
    const handler = __rpcHandlers[name];
    if (!handler) return respond(404, { error: "unknown rpc" });
"#,
    );
    if f.has_auth() {
        em.line("    const __rpcUser = await __authenticate(req);");
    }
    em.template(
        r#"
    const body = await __parseBody(req);
    const args = Array.isArray(body?.__args) ? body.__args : [];
    const result = await handler(...args);
"#,
    );
    if !f.sensitive.is_empty() {
        if f.has_auth() {
            em.line("    return respond(200, __autoSanitize(result, __rpcUser ?? null));");
        } else {
            em.line("    return respond(200, __autoSanitize(result, null));");
        }
    } else {
        em.line("    return respond(200, result ?? null);");
    }
    em.line("  }");
}

fn emit_handler_invocation(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.template(
        r#"
  // AUTH_DECORATOR / VALIDATION / HANDLER
  const request = {
    raw: req,
    method,
    path,
    params,
    query: __parseQuery(url),
    cookies: __parseCookies(req),
    headers: req.headers,
    body: ["POST", "PUT", "PATCH"].includes(method) ? await __parseBody(req) : null,
  };
"#,
    );
    if f.has_auth() {
        em.line("  request.user = await __authenticate(req);");
    }
    if f.session.is_some() {
        em.line("  request.__session = __loadSession(req);");
    }
    let decorated = f
        .routes
        .iter()
        .any(|r| !r.decl.decorators.is_empty());
    if decorated {
        emit_decorator_checks(ctx, em, f);
    }
    if f.middleware.is_empty() {
        em.line("  let result = await route.handler(request);");
    } else {
        // Middleware wraps the handler, outermost first in declaration order.
        em.line("  let __invoke = () => route.handler(request);");
        for mw in f.middleware.iter().rev() {
            let mw_js = gen_expr(ctx, mw);
            em.line(&format!(
                "  __invoke = ((next) => () => ({})(request, next))(__invoke);",
                mw_js
            ));
        }
        em.line("  let result = await __invoke();");
    }
    em.template(
        r#"
  if (result instanceof Response) {
"#,
    );
    if f.session.is_some() {
        em.line("    result = __commitSession(request, result);");
    }
    em.template(
        r#"
    return result;
  }
"#,
    );
    if !f.sensitive.is_empty() {
        em.line("  // SANITIZE");
        em.line("  result = __autoSanitize(result, request.user ?? null);");
    }
    em.line("  return respond(200, result ?? null);");
}

fn emit_decorator_checks(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    // Per-route decorators compiled into a lookup keyed by pattern.
    let mut entries: Vec<String> = Vec::new();
    for route in &f.routes {
        if route.decl.decorators.is_empty() {
            continue;
        }
        let mut fields: Vec<String> = Vec::new();
        for decorator in &route.decl.decorators {
            match decorator {
                crate::ast::RouteDecorator::Auth => fields.push("auth: true".to_string()),
                crate::ast::RouteDecorator::Role(role) => fields.push(format!(
                    "role: {}",
                    js_string(ctx.interner.resolve(*role))
                )),
                crate::ast::RouteDecorator::RateLimit { max, window } => {
                    fields.push(format!("rateLimit: {{ max: {}, window: {} }}", max, window))
                }
                crate::ast::RouteDecorator::Timeout(ms) => fields.push(format!("timeout: {}", ms)),
                crate::ast::RouteDecorator::Custom { .. } => {}
            }
        }
        entries.push(format!(
            "[{}]: {{ {} }}",
            js_string(&format!("{} {}", route.method, route.path)),
            fields.join(", ")
        ));
    }
    em.line(&format!(
        "  const __routeDecorators = {{ {} }};",
        entries.join(", ")
    ));
    em.template(
        r#"
  const __decor = __routeDecorators[`${route.method} ${route.pattern}`];
  if (__decor) {
    if ((__decor.auth || __decor.role) && !request.user) {
      return respond(401, { error: "authentication required" });
    }
    if (__decor.role) {
      const allowed = typeof __hasPermission === "function" && __hasPermission(request.user, __decor.role);
      if (!allowed) {
        return respond(403, { error: "forbidden" });
      }
    }
    if (__decor.rateLimit) {
      const limited = __checkRateLimit(`${__getClientIp(req)}:${route.pattern}`, __decor.rateLimit);
      if (limited) return limited;
    }
    if (__decor.timeout) {
      const controller = new AbortController();
      setTimeout(() => controller.abort(), __decor.timeout);
      request.signal = controller.signal;
    }
  }
"#,
    );
}

fn emit_standard_headers(em: &mut Emitter, f: &Features<'_, '_>) {
    em.line("function __applyStandardHeaders(req, res) {");
    em.indent();
    em.line("const out = new Response(res.body, res);");
    if f.has_cors {
        em.template(
            r#"
const corsHeaders = __getCorsHeaders(req);
if (corsHeaders) {
  for (const [key, value] of Object.entries(corsHeaders)) out.headers.set(key, value);
}
"#,
        );
    }
    if !f.csp.is_empty() {
        em.line("out.headers.set(\"Content-Security-Policy\", __getCspHeader());");
    }
    if f.hsts_active() {
        em.line(&format!(
            "out.headers.set(\"Strict-Transport-Security\", \"max-age={}; includeSubDomains\");",
            f.hsts_max_age
        ));
    }
    em.line("return out;");
    em.dedent();
    em.line("}");
}

pub fn emit_serve(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    if let Some((path, _)) = &f.ws {
        em.line(&format!("const __wsPath = {};", js_string(path)));
    }
    em.line("const __server = Bun.serve({");
    em.indent();
    em.line("port: Number(process.env.PORT ?? 3000),");
    if f.tls.is_some() {
        em.line("tls: { cert: Bun.file(process.env.TLS_CERT ?? \"cert.pem\"), key: Bun.file(process.env.TLS_KEY ?? \"key.pem\") },");
    }
    if f.ws.is_some() {
        em.template(
            r#"
fetch(req, server) {
  const url = new URL(req.url);
  if (url.pathname === __wsPath && server.upgrade(req, { data: { rooms: new Set() } })) {
    return undefined;
  }
  return __handleRequest(req);
},
websocket: __wsConfig,
"#,
        );
    } else {
        em.line("fetch: (req) => __handleRequest(req),");
    }
    em.dedent();
    em.line("});");
    em.template(
        r#"
__log("info", "server started", { port: __server.port });

async function __shutdown(signal) {
  __log("info", "shutdown requested", { signal });
  __draining = true;
"#,
    );
    if !f.backgrounds.is_empty() {
        em.line("  await __drainJobs();");
    }
    em.template(
        r#"
  const deadline = Date.now() + 10_000;
  while (__activeRequests > 0 && Date.now() < deadline) {
    await new Promise((resolve) => setTimeout(resolve, 50));
  }
  __server.stop(true);
  process.exit(0);
}

process.on("SIGINT", () => __shutdown("SIGINT"));
process.on("SIGTERM", () => __shutdown("SIGTERM"));
"#,
    );
}
