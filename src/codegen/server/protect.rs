use super::{Features, SensitiveField};
use crate::codegen::emitter::Emitter;
use crate::codegen::expr::js_string;
use std::collections::HashMap;

/// Roles, protect rules, and the pre-handler protection check.
pub fn emit_protection(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    let roles = f
        .roles
        .iter()
        .map(|r| js_string(r))
        .collect::<Vec<_>>()
        .join(", ");
    em.line(&format!("const __securityRoles = new Set([{}]);", roles));
    em.template(
        r#"
function __getUserRoles(user) {
  if (!user) return [];
  if (Array.isArray(user.roles)) return user.roles;
  if (typeof user.role === "string") return [user.role];
  return [];
}

function __hasPermission(user, required) {
  for (const role of __getUserRoles(user)) {
    if (role === required) return true;
  }
  return false;
}
"#,
    );

    let rules: Vec<String> = f
        .protects
        .iter()
        .map(|rule| {
            let role = rule
                .role
                .as_ref()
                .map(|r| js_string(r))
                .unwrap_or_else(|| "null".to_string());
            let rate = rule
                .rate_limit
                .map(|(max, window)| format!("{{ max: {}, window: {} }}", max, window))
                .unwrap_or_else(|| "null".to_string());
            format!(
                "{{ pattern: {}, regex: new RegExp({}), role: {}, authenticated: {}, rateLimit: {} }}",
                js_string(&rule.pattern),
                js_string(&rule.regex),
                role,
                rule.authenticated || rule.role.is_some(),
                rate
            )
        })
        .collect();
    em.line(&format!("const __protectRules = [{}];", rules.join(", ")));

    em.template(
        r#"
async function __checkProtection(req, path) {
  for (const rule of __protectRules) {
    if (!rule.regex.test(path)) continue;
    const user = typeof __authenticate === "function" ? await __authenticate(req) : null;
    if (!user) {
      return respond(401, { error: "authentication required" });
    }
    if (rule.role && !__hasPermission(user, rule.role)) {
      return respond(403, { error: "forbidden" });
    }
  }
  return null;
}
"#,
    );
}

/// Per-type sanitizers plus the recursive `__autoSanitize` dispatcher that
/// strips sensitive fields from anything leaving the server.
pub fn emit_sanitizers(em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    em.template(
        r#"
const __identityFields = ["id", "_id", "userId", "user_id", "uuid"];

function __isSameIdentity(viewer, value) {
  if (!viewer || !value) return false;
  for (const field of __identityFields) {
    if (viewer[field] != null && value[field] != null && String(viewer[field]) === String(value[field])) {
      return true;
    }
  }
  return false;
}

function __visibleTo(viewer, value, requirement) {
  if (requirement === "self") return __isSameIdentity(viewer, value);
  if (typeof __hasPermission === "function") return __hasPermission(viewer, requirement);
  return false;
}

function __canSee(viewer, value, requirement) {
  if (requirement == null) return true;
  return __visibleTo(viewer, value, requirement);
}
"#,
    );

    // Group sensitive fields per type.
    let mut by_type: HashMap<&str, Vec<&SensitiveField>> = HashMap::new();
    for field in &f.sensitive {
        by_type.entry(field.type_name.as_str()).or_default().push(field);
    }
    let mut types: Vec<&&str> = by_type.keys().collect::<Vec<_>>();
    types.sort();

    for type_name in &types {
        let fields = &by_type[**type_name];
        em.line(&format!("function __sanitize{}(value, viewer) {{", type_name));
        em.indent();
        em.line("const out = { ...value };");
        for field in fields.iter() {
            if field.never_expose {
                em.line(&format!("delete out.{};", field.field));
            } else if let Some(requirement) = &field.visible_to {
                em.line(&format!(
                    "if (!__canSee(viewer, value, {})) delete out.{};",
                    js_string(requirement),
                    field.field
                ));
            }
        }
        em.line("return out;");
        em.dedent();
        em.line("}");
    }

    let table: Vec<String> = types
        .iter()
        .map(|t| format!("{}: __sanitize{}", t, t))
        .collect();
    em.line(&format!("const __sanitizers = {{ {} }};", table.join(", ")));

    em.template(
        r#"
function __autoSanitize(value, viewer) {
  if (Array.isArray(value)) return value.map((item) => __autoSanitize(item, viewer));
  if (value != null && typeof value === "object") {
    const tag = value.__type ?? value.__tag ?? value.constructor?.name;
    const sanitizer = __sanitizers[tag];
    if (sanitizer) return sanitizer(value, viewer);
    const out = {};
    for (const [key, entry] of Object.entries(value)) {
      out[key] = __autoSanitize(entry, viewer);
    }
    return out;
  }
  return value;
}
"#,
    );
}
