use super::emitter::Emitter;
use super::expr::{gen_expr, js_string};
use super::stmt::{gen_body_stmts, gen_stmt};
use super::GenCtx;
use crate::ast::*;
use crate::intern::Interner;
use std::collections::HashMap;

/// Client bucket: components compiled to `tova_el` trees, state rewritten
/// to signals, wrapped in a DOMContentLoaded bootstrap with the single
/// delegated click listener and popstate handler for app-internal links.
pub fn generate(
    interner: &Interner,
    shared_js: &str,
    decls: &[&Stmt<'_>],
    security: &[&SecurityEntry<'_>],
    trait_defaults: HashMap<String, Vec<String>>,
) -> String {
    let mut ctx = GenCtx::new(interner);
    ctx.in_client = true;
    ctx.trait_defaults = trait_defaults;
    let mut em = Emitter::new();

    em.line("// client");
    em.line("import { signal, effect_of, tova_el, tova_fragment, mount, navigate } from \"tova/runtime\";");
    em.blank();
    if !shared_js.is_empty() {
        em.template(shared_js);
        em.blank();
    }

    let auth = security.iter().find_map(|e| match e {
        SecurityEntry::Auth { auth_type, config, .. } => {
            Some((interner.resolve(*auth_type).to_string(), config))
        }
        _ => None,
    });
    let cookie_mode = auth.as_ref().map_or(false, |(ty, config)| {
        ty == "jwt"
            && config.iter().any(|(k, v)| {
                interner.resolve(*k) == "storage"
                    && crate::analysis::security::literal_str(v, interner).as_deref()
                        == Some("cookie")
            })
    });
    if auth.is_some() {
        gen_auth_helpers(&mut em, cookie_mode);
        gen_role_helpers(&mut em, interner, security);
    }
    gen_rpc(&mut em, auth.is_some(), cookie_mode);

    let mut first_component: Option<String> = None;
    for stmt in decls {
        match &stmt.kind {
            StmtKind::Component(f) => {
                let name = interner.resolve(f.name).to_string();
                if first_component.is_none() {
                    first_component = Some(name.clone());
                }
                gen_component(&mut ctx, &mut em, f, &name);
            }
            _ => gen_stmt(&mut ctx, &mut em, stmt),
        }
    }

    em.blank();
    em.line("document.addEventListener(\"DOMContentLoaded\", () => {");
    em.indent();
    if let Some(root) = first_component {
        em.line("const __root = document.getElementById(\"app\") ?? document.body;");
        em.line(&format!("mount(__root, {});", root));
    }
    em.template(
        r#"
document.addEventListener("click", (e) => {
  const link = e.target.closest("a[href]");
  if (!link) return;
  const href = link.getAttribute("href");
  if (!href || !href.startsWith("/") || link.target || e.metaKey || e.ctrlKey) return;
  e.preventDefault();
  history.pushState({}, "", href);
  navigate(href);
});
window.addEventListener("popstate", () => {
  navigate(location.pathname);
});
"#,
    );
    em.dedent();
    em.line("});");

    let (out, _) = em.finish();
    out
}

fn gen_component(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &FuncDecl<'_>, name: &str) {
    em.blank();
    if let Some(doc) = f.doc {
        for line in ctx.interner.resolve(doc).to_string().lines() {
            em.line(&format!("// {}", line));
        }
    }
    let props: Vec<String> = f
        .params
        .iter()
        .map(|p| {
            let pname = ctx.interner.resolve(p.name).to_string();
            match p.default {
                Some(default) => format!("{} = {}", pname, gen_expr(ctx, default)),
                None => pname,
            }
        })
        .collect();
    let params = if props.is_empty() {
        String::new()
    } else {
        format!("{{ {} }} = {{}}", props.join(", "))
    };
    em.stmt(f.loc, &format!("function {}({}) {{", name, params));
    em.indent();
    ctx.push_scope(&f.params);
    let saved_state = ctx.client_state.clone();
    gen_body_stmts(ctx, em, &f.body, true);
    ctx.client_state = saved_state;
    ctx.pop_scope();
    em.dedent();
    em.line("}");
}

/// Lowers a JSX tree to `tova_el(tag, attrs, children)` calls.
pub fn gen_jsx(ctx: &mut GenCtx<'_>, expr: &Expr<'_>) -> String {
    match &expr.kind {
        ExprKind::Jsx { tag, attrs, children } => {
            let tag_name = ctx.interner.resolve(*tag).to_string();
            let is_component = tag_name.chars().next().map_or(false, |c| c.is_uppercase());
            let tag_js = if is_component { tag_name } else { js_string(&tag_name) };
            let attrs_js = gen_jsx_attrs(ctx, attrs);
            let children_js = gen_jsx_children(ctx, children);
            format!("tova_el({}, {}, [{}])", tag_js, attrs_js, children_js)
        }
        ExprKind::JsxFragment { children } => {
            let children_js = gen_jsx_children(ctx, children);
            format!("tova_fragment([{}])", children_js)
        }
        _ => gen_expr(ctx, expr),
    }
}

fn gen_jsx_attrs(ctx: &mut GenCtx<'_>, attrs: &[JsxAttr<'_>]) -> String {
    if attrs.is_empty() {
        return "{}".to_string();
    }
    let parts: Vec<String> = attrs
        .iter()
        .map(|attr| match attr {
            JsxAttr::Named { name, value, .. } => {
                let key = js_string(ctx.interner.resolve(*name));
                let value_js = match value {
                    JsxAttrValue::Str(sym) => js_string(ctx.interner.resolve(*sym)),
                    JsxAttrValue::Template(parts) => {
                        let mut out = String::from("`");
                        for part in parts {
                            match part {
                                StrPart::Text(sym) => {
                                    out.push_str(&ctx.interner.resolve(*sym).replace('`', "\\`"))
                                }
                                StrPart::Expr(e) => {
                                    out.push_str("${");
                                    out.push_str(&gen_expr(ctx, e));
                                    out.push('}');
                                }
                            }
                        }
                        out.push('`');
                        out
                    }
                    JsxAttrValue::Shorthand => "true".to_string(),
                    JsxAttrValue::Expr(e) => gen_expr(ctx, e),
                };
                format!("{}: {}", key, value_js)
            }
            JsxAttr::Spread { expr, .. } => format!("...{}", gen_expr(ctx, expr)),
        })
        .collect();
    format!("{{ {} }}", parts.join(", "))
}

fn gen_jsx_children(ctx: &mut GenCtx<'_>, children: &[JsxChild<'_>]) -> String {
    let parts: Vec<String> = children
        .iter()
        .map(|child| gen_jsx_child(ctx, child))
        .collect();
    parts.join(", ")
}

fn gen_jsx_child(ctx: &mut GenCtx<'_>, child: &JsxChild<'_>) -> String {
    match child {
        JsxChild::Text(sym) => js_string(ctx.interner.resolve(*sym)),
        JsxChild::Expr(e) | JsxChild::Element(e) => gen_jsx(ctx, e),
        JsxChild::For { pattern, iterable, key, body } => {
            let iter_js = gen_expr(ctx, iterable);
            let target = super::stmt::gen_pattern_destructure(ctx, pattern);
            let body_js = wrap_children(ctx, body);
            match key {
                Some(k) => {
                    let key_js = gen_expr(ctx, k);
                    format!(
                        "...{}.map(({}) => {{ const __el = {}; __el.key = {}; return __el; }})",
                        iter_js, target, body_js, key_js
                    )
                }
                None => format!("...{}.map(({}) => {})", iter_js, target, body_js),
            }
        }
        JsxChild::If { branches, else_body } => {
            let mut out = String::new();
            for (cond, body) in branches {
                let cond_js = gen_expr(ctx, cond);
                let body_js = wrap_children(ctx, body);
                out.push_str(&format!("{} ? {} : ", cond_js, body_js));
            }
            match else_body {
                Some(body) => out.push_str(&wrap_children(ctx, body)),
                None => out.push_str("null"),
            }
            format!("({})", out)
        }
    }
}

/// Multiple children under a `for` or `if` wrap in a fragment.
fn wrap_children(ctx: &mut GenCtx<'_>, children: &[JsxChild<'_>]) -> String {
    if children.len() == 1 {
        gen_jsx_child(ctx, &children[0])
    } else {
        format!("tova_fragment([{}])", gen_jsx_children(ctx, children))
    }
}

// -- auth helpers -----------------------------------------------------------

fn gen_auth_helpers(em: &mut Emitter, cookie_mode: bool) {
    if cookie_mode {
        em.template(
            r#"
// Cookie transport: the browser holds the HttpOnly cookie, nothing to read.
function getAuthToken() { return null; }
function setAuthToken(_token) {}
async function clearAuthToken() {
  await fetch("/rpc/__logout", { method: "POST", credentials: "include" });
}
"#,
        );
    } else {
        em.template(
            r#"
function getAuthToken() {
  return localStorage.getItem("__tova_token");
}
function setAuthToken(token) {
  if (token == null) localStorage.removeItem("__tova_token");
  else localStorage.setItem("__tova_token", token);
}
function clearAuthToken() {
  localStorage.removeItem("__tova_token");
}
"#,
        );
    }
}

fn gen_role_helpers(em: &mut Emitter, interner: &Interner, security: &[&SecurityEntry<'_>]) {
    let roles: Vec<String> = security
        .iter()
        .filter_map(|e| match e {
            SecurityEntry::Role { name, .. } => Some(js_string(interner.resolve(*name))),
            _ => None,
        })
        .collect();
    em.line(&format!("const __clientRoles = new Set([{}]);", roles.join(", ")));
    em.template(
        r#"
let __userRoles = [];
function __setUserRoles(roles) { __userRoles = roles ?? []; }
function can(permission) {
  for (const role of __userRoles) {
    if (role === permission) return true;
    if (__clientRoles.has(role) && role === "admin") return true;
  }
  return false;
}
"#,
    );
}

fn gen_rpc(em: &mut Emitter, has_auth: bool, cookie_mode: bool) {
    em.line("async function rpc(name, ...args) {");
    em.indent();
    em.line("const headers = { \"Content-Type\": \"application/json\" };");
    if has_auth && !cookie_mode {
        em.line("const __token = getAuthToken();");
        em.line("if (__token) headers[\"Authorization\"] = `Bearer ${__token}`;");
    }
    let credentials = if cookie_mode { ", credentials: \"include\"" } else { "" };
    em.line(&format!(
        "const res = await fetch(`/rpc/${{name}}`, {{ method: \"POST\", headers, body: JSON.stringify({{ __args: args }}){} }});",
        credentials
    ));
    em.line("if (!res.ok) throw new Error(`rpc ${name} failed: ${res.status}`);");
    em.line("return res.json();");
    em.dedent();
    em.line("}");
    em.blank();
}
