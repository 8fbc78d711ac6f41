use super::Features;
use crate::codegen::emitter::Emitter;
use crate::codegen::expr::{gen_expr, js_string};
use crate::codegen::GenCtx;

/// JWT authentication: HS256-only verification through `crypto.subtle`,
/// with a cached imported key, plus signing and PBKDF2 password helpers.
pub fn emit_jwt(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    let secret = f
        .auth_value("secret")
        .map(|e| gen_expr(ctx, e))
        .unwrap_or_else(|| "process.env.JWT_SECRET".to_string());
    em.line(&format!("const __jwtSecret = {};", secret));
    if let Some(iss) = f.auth_value("issuer") {
        em.line(&format!("const __jwtIssuer = {};", gen_expr(ctx, iss)));
    } else {
        em.line("const __jwtIssuer = null;");
    }
    if let Some(aud) = f.auth_value("audience") {
        em.line(&format!("const __jwtAudience = {};", gen_expr(ctx, aud)));
    } else {
        em.line("const __jwtAudience = null;");
    }
    let expires = f
        .auth_value("expires")
        .map(|e| gen_expr(ctx, e))
        .unwrap_or_else(|| "3600".to_string());
    em.line(&format!("const __jwtExpires = {};", expires));

    em.template(
        r#"
let __jwtKeyCache = null;
async function __getJwtKey() {
  if (__jwtKeyCache) return __jwtKeyCache;
  __jwtKeyCache = await crypto.subtle.importKey(
    "raw",
    new TextEncoder().encode(__jwtSecret),
    { name: "HMAC", hash: "SHA-256" },
    false,
    ["sign", "verify"],
  );
  return __jwtKeyCache;
}

function __b64url(bytes) {
  let binary = "";
  for (const b of bytes) binary += String.fromCharCode(b);
  return btoa(binary).replace(/\+/g, "-").replace(/\//g, "_").replace(/=+$/, "");
}

function __b64urlDecode(part) {
  const padded = part.replace(/-/g, "+").replace(/_/g, "/");
  return atob(padded + "=".repeat((4 - (padded.length % 4)) % 4));
}

async function __authenticate(req) {
  let token = null;
"#,
    );
    if f.cookie_storage {
        em.line("  token = __parseCookies(req)[\"__tova_auth\"] ?? null;");
    }
    em.template(
        r#"
  if (!token) {
    const header = req.headers.get("authorization") ?? "";
    if (header.startsWith("Bearer ")) token = header.slice(7);
  }
  if (!token) return null;
  const parts = token.split(".");
  if (parts.length !== 3) return null;
  let __header;
  try {
    __header = JSON.parse(__b64urlDecode(parts[0]));
  } catch {
    return null;
  }
  if (__header.alg !== "HS256") return null;
  const key = await __getJwtKey();
  const data = new TextEncoder().encode(`${parts[0]}.${parts[1]}`);
  const signature = await crypto.subtle.sign("HMAC", key, data);
  if (__b64url(new Uint8Array(signature)) !== parts[2]) return null;
  let payload;
  try {
    payload = JSON.parse(__b64urlDecode(parts[1]));
  } catch {
    return null;
  }
  const now = Math.floor(Date.now() / 1000);
  if (payload.exp != null && now >= payload.exp) return null;
  if (payload.nbf != null && now < payload.nbf) return null;
  if (__jwtIssuer != null && payload.iss !== __jwtIssuer) return null;
  if (__jwtAudience != null && payload.aud !== __jwtAudience) return null;
  return payload;
}

async function sign_jwt(claims, opts = {}) {
  const now = Math.floor(Date.now() / 1000);
  const payload = {
    iat: now,
    exp: now + (opts.expires ?? __jwtExpires),
    ...(__jwtIssuer != null ? { iss: __jwtIssuer } : {}),
    ...(__jwtAudience != null ? { aud: __jwtAudience } : {}),
    ...claims,
  };
  const header = __b64url(new TextEncoder().encode(JSON.stringify({ alg: "HS256", typ: "JWT" })));
  const body = __b64url(new TextEncoder().encode(JSON.stringify(payload)));
  const key = await __getJwtKey();
  const signature = await crypto.subtle.sign(
    "HMAC",
    key,
    new TextEncoder().encode(`${header}.${body}`),
  );
  return `${header}.${body}.${__b64url(new Uint8Array(signature))}`;
}

const __PBKDF2_ITERATIONS = 100000;

async function hash_password(password) {
  const salt = crypto.getRandomValues(new Uint8Array(16));
  const key = await crypto.subtle.importKey(
    "raw",
    new TextEncoder().encode(password),
    "PBKDF2",
    false,
    ["deriveBits"],
  );
  const bits = await crypto.subtle.deriveBits(
    { name: "PBKDF2", salt, iterations: __PBKDF2_ITERATIONS, hash: "SHA-256" },
    key,
    256,
  );
  const toHex = (bytes) => [...bytes].map((b) => b.toString(16).padStart(2, "0")).join("");
  return `${toHex(salt)}:${toHex(new Uint8Array(bits))}`;
}

async function verify_password(password, stored) {
  const [saltHex, hashHex] = String(stored).split(":");
  if (!saltHex || !hashHex) return false;
  const salt = new Uint8Array(saltHex.match(/.{2}/g).map((h) => parseInt(h, 16)));
  const key = await crypto.subtle.importKey(
    "raw",
    new TextEncoder().encode(password),
    "PBKDF2",
    false,
    ["deriveBits"],
  );
  const bits = await crypto.subtle.deriveBits(
    { name: "PBKDF2", salt, iterations: __PBKDF2_ITERATIONS, hash: "SHA-256" },
    key,
    256,
  );
  const toHex = (bytes) => [...bytes].map((b) => b.toString(16).padStart(2, "0")).join("");
  return toHex(new Uint8Array(bits)) === hashHex;
}
"#,
    );

    if f.cookie_storage {
        em.template(
            r#"
function __setAuthCookie(res, token) {
  const out = new Response(res.body, res);
  out.headers.append(
    "Set-Cookie",
    `__tova_auth=${token}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=${__jwtExpires}`,
  );
  return out;
}

function __clearAuthCookie(res) {
  const out = new Response(res.body, res);
  out.headers.append(
    "Set-Cookie",
    "__tova_auth=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
  );
  return out;
}
"#,
        );
    }
}

pub fn emit_api_key(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    let header = f
        .auth_value("header")
        .map(|e| gen_expr(ctx, e))
        .unwrap_or_else(|| js_string("x-api-key"));
    em.line(&format!("const __apiKeyHeader = {};", header));
    let keys = f
        .auth_value("keys")
        .map(|e| gen_expr(ctx, e))
        .unwrap_or_else(|| "process.env.API_KEYS ?? \"\"".to_string());
    em.line(&format!(
        "const __validApiKeys = new Set(String({}).split(\",\").map((k) => k.trim()).filter(Boolean));",
        keys
    ));
    em.template(
        r#"
async function __authenticate(req) {
  const key = req.headers.get(__apiKeyHeader.toLowerCase());
  if (!key || !__validApiKeys.has(key)) return null;
  return { api_key: key };
}
"#,
    );
}
