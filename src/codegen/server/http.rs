use super::{glob_to_regex, Features};
use crate::analysis::security::{config_get, literal_int};
use crate::codegen::emitter::Emitter;
use crate::codegen::expr::js_string;
use crate::codegen::GenCtx;

pub fn emit_cors(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    let origins = f
        .cors_origins
        .iter()
        .map(|o| js_string(o))
        .collect::<Vec<_>>()
        .join(", ");
    em.line(&format!("const __corsOrigins = new Set([{}]);", origins));
    em.line(&format!("const __corsCredentials = {};", f.cors_credentials));
    em.template(
        r#"
function __getCorsHeaders(req) {
  const origin = req.headers.get("origin");
  if (!origin) return null;
  const wildcard = __corsOrigins.has("*");
  if (!wildcard && !__corsOrigins.has(origin)) return null;
  const headers = {
    "Access-Control-Allow-Origin": wildcard ? "*" : origin,
    "Access-Control-Allow-Methods": "GET, POST, PUT, PATCH, DELETE, OPTIONS",
    "Access-Control-Allow-Headers": "Content-Type, Authorization, X-Csrf-Token",
    Vary: "Origin",
  };
  if (__corsCredentials && !wildcard) {
    headers["Access-Control-Allow-Credentials"] = "true";
  }
  return headers;
}
"#,
    );
}

/// Directive keys come in with underscores (`default_src`); the header
/// wants hyphens and quoted keyword sources.
pub fn emit_csp(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    let entries: Vec<String> = f
        .csp
        .iter()
        .map(|(directive, sources)| {
            let key = directive.replace('_', "-");
            let values: Vec<String> = sources.iter().map(|s| csp_source(s)).collect();
            format!("{}: [{}]", js_string(&key), values.join(", "))
        })
        .collect();
    em.line(&format!("const __cspDirectives = {{ {} }};", entries.join(", ")));
    em.template(
        r#"
function __getCspHeader() {
  return Object.entries(__cspDirectives)
    .map(([directive, sources]) => `${directive} ${sources.join(" ")}`)
    .join("; ");
}
"#,
    );
}

fn csp_source(source: &str) -> String {
    match source {
        "self" | "unsafe-inline" | "unsafe-eval" | "none" | "strict-dynamic" => {
            js_string(&format!("'{}'", source))
        }
        _ => js_string(source),
    }
}

pub fn emit_hsts(_em: &mut Emitter, _f: &Features<'_, '_>) {
    // The header itself is applied in __applyStandardHeaders; nothing else
    // to declare.
}

/// Client address resolution, honoring `trust_proxy`. Needed by the rate
/// limiter and the CSRF session binding.
pub fn emit_client_ip(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    em.line("function __getClientIp(req) {");
    if f.trust_proxy {
        em.template(
            r#"
  const forwarded = req.headers.get("x-forwarded-for");
  if (forwarded) return forwarded.split(",")[0].trim();
"#,
        );
    }
    em.template(
        r#"
  return __server?.requestIP?.(req)?.address ?? "unknown";
}
"#,
    );
}

pub fn emit_rate_limit(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    em.line("const __rateLimitStore = new Map();");
    if let Some((max, window)) = f.rate_limit {
        em.line(&format!(
            "const __globalRateLimit = {{ max: {}, window: {} }};",
            max, window
        ));
    }
    em.template(
        r#"
function __checkRateLimit(key, limit) {
  const now = Date.now();
  let entry = __rateLimitStore.get(key);
  if (!entry || now >= entry.reset) {
    entry = { count: 0, reset: now + limit.window * 1000 };
    __rateLimitStore.set(key, entry);
  }
  entry.count += 1;
  if (entry.count > limit.max) {
    const retryAfter = Math.max(1, Math.ceil((entry.reset - now) / 1000));
    return respond(429, { error: "rate limit exceeded" }, { "Retry-After": String(retryAfter) });
  }
  return null;
}
"#,
    );
}

/// Double-submit CSRF: the token is `ts:nonce:binding:sig` with an HMAC
/// binding it to the session, checked on every mutating request unless the
/// path matches an exempt glob.
pub fn emit_csrf(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    em.line(&format!("const __csrfEnabled = {};", f.csrf_enabled));
    let exempt: Vec<String> = f
        .csrf_exempt
        .iter()
        .map(|pattern| format!("new RegExp({})", js_string(&glob_to_regex(pattern))))
        .collect();
    em.line(&format!("const __csrfExemptPatterns = [{}];", exempt.join(", ")));
    em.template(
        r#"
const __csrfSecret = process.env.CSRF_SECRET ?? "tova-csrf-dev";

function __csrfSign(data) {
  return createHmac("sha256", __csrfSecret).update(data).digest("hex");
}

function __sessionBinding(req) {
  const cookies = __parseCookies(req);
  return cookies["__tova_session"] ?? cookies["__tova_auth"] ?? __getClientIp(req);
}

function __issueCsrfToken(req) {
  const ts = Date.now();
  const nonce = crypto.randomUUID();
  const binding = __csrfSign(__sessionBinding(req)).slice(0, 16);
  const sig = __csrfSign(`${ts}:${nonce}:${binding}`);
  return `${ts}:${nonce}:${binding}:${sig}`;
}

function __checkCsrf(req) {
  const header = req.headers.get("x-csrf-token");
  const cookie = __parseCookies(req)["__tova_csrf"];
  if (!header || !cookie || header !== cookie) {
    return respond(403, { error: "invalid csrf token" });
  }
  const parts = header.split(":");
  if (parts.length !== 4) {
    return respond(403, { error: "invalid csrf token" });
  }
  const [ts, nonce, binding, sig] = parts;
  if (__csrfSign(`${ts}:${nonce}:${binding}`) !== sig) {
    return respond(403, { error: "invalid csrf token" });
  }
  if (binding !== __csrfSign(__sessionBinding(req)).slice(0, 16)) {
    return respond(403, { error: "invalid csrf token" });
  }
  return null;
}
"#,
    );
}

pub fn emit_audit(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    let table = f.audit_table.as_deref().unwrap_or("audit_log");
    em.line(&format!("const __auditTable = {};", js_string(table)));
    em.template(
        r#"
if (!/^[a-zA-Z_][a-zA-Z0-9_]*$/.test(__auditTable)) {
  throw new Error(`invalid audit table name: ${__auditTable}`);
}
"#,
    );
    if f.db_driver.is_some() {
        em.template(
            r#"
function __auditLog(event, user, req) {
  try {
    run(
      `INSERT INTO ${__auditTable} (event, user_id, path, method, at) VALUES (?, ?, ?, ?, ?)`,
      [event, user?.id ?? null, new URL(req.url).pathname, req.method, new Date().toISOString()],
    );
  } catch (err) {
    console.error("[tova:audit]", err);
  }
}
"#,
        );
    } else {
        em.template(
            r#"
function __auditLog(event, user, req) {
  try {
    __log("info", "audit", {
      event,
      user: user?.id ?? null,
      path: new URL(req.url).pathname,
      method: req.method,
    });
  } catch (err) {
    console.error("[tova:audit]", err);
  }
}
"#,
        );
    }
}

/// HMAC-signed session IDs with an in-memory or SQLite-backed store, a
/// regeneration hook for privilege changes, and periodic cleanup.
pub fn emit_session(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    let config = f.session.expect("session config present");
    let ttl = config_get(config, ctx.interner, "ttl")
        .and_then(literal_int)
        .unwrap_or(86_400);
    em.line(&format!("const __sessionTtl = {};", ttl));
    let sqlite_store = f.db_driver.as_deref() == Some("sqlite");
    em.template(
        r#"
const __sessionSecret = process.env.SESSION_SECRET ?? "tova-session-dev";

function __signSessionId(id) {
  return createHmac("sha256", __sessionSecret).update(id).digest("hex").slice(0, 32);
}
"#,
    );
    if sqlite_store {
        em.template(
            r#"
__db.exec(`CREATE TABLE IF NOT EXISTS __sessions (
  id TEXT PRIMARY KEY,
  data TEXT NOT NULL,
  expires_at INTEGER NOT NULL
)`);
const __sessionStmts = {
  get: __db.prepare("SELECT data, expires_at FROM __sessions WHERE id = ?"),
  set: __db.prepare(
    "INSERT INTO __sessions (id, data, expires_at) VALUES (?, ?, ?) " +
      "ON CONFLICT(id) DO UPDATE SET data = excluded.data, expires_at = excluded.expires_at",
  ),
  delete: __db.prepare("DELETE FROM __sessions WHERE id = ?"),
  cleanup: __db.prepare("DELETE FROM __sessions WHERE expires_at < ?"),
};

function __sessionRead(id) {
  const row = __sessionStmts.get.get(id);
  if (!row || row.expires_at < Date.now()) return null;
  return JSON.parse(row.data);
}
function __sessionWrite(id, data) {
  __sessionStmts.set.run(id, JSON.stringify(data), Date.now() + __sessionTtl * 1000);
}
function __sessionDelete(id) {
  __sessionStmts.delete.run(id);
}
setInterval(() => __sessionStmts.cleanup.run(Date.now()), 60000);
"#,
        );
    } else {
        em.template(
            r#"
const __sessionStore = new Map();

function __sessionRead(id) {
  const entry = __sessionStore.get(id);
  if (!entry || entry.expiresAt < Date.now()) return null;
  return entry.data;
}
function __sessionWrite(id, data) {
  __sessionStore.set(id, { data, expiresAt: Date.now() + __sessionTtl * 1000 });
}
function __sessionDelete(id) {
  __sessionStore.delete(id);
}
setInterval(() => {
  const now = Date.now();
  for (const [id, entry] of __sessionStore) {
    if (entry.expiresAt < now) __sessionStore.delete(id);
  }
}, 60000);
"#,
        );
    }
    em.template(
        r#"
function __loadSession(req) {
  const raw = __parseCookies(req)["__tova_session"];
  let id = null;
  let data = {};
  if (raw) {
    const [candidate, sig] = raw.split(".");
    if (candidate && sig === __signSessionId(candidate)) {
      id = candidate;
      data = __sessionRead(id) ?? {};
    }
  }
  if (!id) {
    id = crypto.randomUUID();
  }
  const session = {
    id,
    __dirty: false,
    __destroyed: false,
    get(key) {
      return data[key];
    },
    set(key, value) {
      data[key] = value;
      session.__dirty = true;
    },
    delete(key) {
      delete data[key];
      session.__dirty = true;
    },
    destroy() {
      session.__destroyed = true;
    },
    __data: () => data,
  };
  return session;
}

function __commitSession(request, res) {
  const session = request.__session;
  if (!session) return res;
  if (session.__destroyed) {
    __sessionDelete(session.id);
    return set_cookie(res, "__tova_session", "", { max_age: 0 });
  }
  if (!session.__dirty) return res;
  __sessionWrite(session.id, session.__data());
  const value = `${session.id}.${__signSessionId(session.id)}`;
  const out = new Response(res.body, res);
  out.headers.append(
    "Set-Cookie",
    `__tova_session=${value}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=${__sessionTtl}`,
  );
  return out;
}

function __regenerateSession(request) {
  const old = request.__session;
  if (!old) return;
  __sessionDelete(old.id);
  old.id = crypto.randomUUID();
  old.__dirty = true;
}
"#,
    );
}
