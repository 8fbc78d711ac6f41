use super::emitter::Emitter;
use super::expr::js_string;
use super::GenCtx;
use crate::ast::TypeBody;
use crate::intern::Symbol;

/// Synthesizes `__eq`, `__show`, `toJSON`/`fromJSON`, and user-trait
/// bridging methods on a generated type.
pub fn gen_derives(
    ctx: &mut GenCtx<'_>,
    em: &mut Emitter,
    type_name: &str,
    body: &TypeBody<'_>,
    derives: &[Symbol],
) {
    for derive in derives {
        let derive_name = ctx.interner.resolve(*derive).to_string();
        match derive_name.as_str() {
            "Eq" => gen_eq(ctx, em, type_name, body),
            "Show" => gen_show(ctx, em, type_name, body),
            "JSON" => gen_json(ctx, em, type_name, body),
            other => gen_trait_bridge(ctx, em, type_name, other),
        }
    }
}

fn field_names(ctx: &GenCtx<'_>, body: &TypeBody<'_>) -> Vec<String> {
    match body {
        TypeBody::Struct(fields) => fields
            .iter()
            .map(|f| ctx.interner.resolve(f.name).to_string())
            .collect(),
        TypeBody::Enum(_) => Vec::new(),
    }
}

fn gen_eq(ctx: &mut GenCtx<'_>, em: &mut Emitter, type_name: &str, body: &TypeBody<'_>) {
    match body {
        TypeBody::Struct(_) => {
            let fields = field_names(ctx, body);
            let cmp: Vec<String> = fields.iter().map(|f| format!("a.{f} === b.{f}")).collect();
            let cond = if cmp.is_empty() { "true".to_string() } else { cmp.join(" && ") };
            em.line(&format!("{}.__eq = (a, b) => {};", type_name, cond));
        }
        TypeBody::Enum(variants) => {
            em.line(&format!("{}.__eq = (a, b) => {{", type_name));
            em.indent();
            em.line("if (a === b) return true;");
            em.line("if (a == null || b == null || a.__tag !== b.__tag) return false;");
            for variant in variants {
                if variant.fields.is_empty() {
                    continue;
                }
                let tag = js_string(ctx.interner.resolve(variant.name));
                let cmp: Vec<String> = (0..variant.fields.len())
                    .map(|i| format!("a._{i} === b._{i}"))
                    .collect();
                em.line(&format!("if (a.__tag === {}) return {};", tag, cmp.join(" && ")));
            }
            em.line("return true;");
            em.dedent();
            em.line("};");
        }
    }
}

fn gen_show(ctx: &mut GenCtx<'_>, em: &mut Emitter, type_name: &str, body: &TypeBody<'_>) {
    match body {
        TypeBody::Struct(_) => {
            let fields = field_names(ctx, body);
            let parts: Vec<String> = fields.iter().map(|f| format!("{f}: ${{v.{f}}}")).collect();
            em.line(&format!(
                "{}.__show = (v) => `{}({})`;",
                type_name,
                type_name,
                parts.join(", ")
            ));
        }
        TypeBody::Enum(variants) => {
            em.line(&format!("{}.__show = (v) => {{", type_name));
            em.indent();
            for variant in variants {
                let name = ctx.interner.resolve(variant.name).to_string();
                let tag = js_string(&name);
                if variant.fields.is_empty() {
                    em.line(&format!("if (v.__tag === {}) return {};", tag, js_string(&name)));
                } else {
                    let parts: Vec<String> = (0..variant.fields.len())
                        .map(|i| format!("${{v._{i}}}"))
                        .collect();
                    em.line(&format!(
                        "if (v.__tag === {}) return `{}({})`;",
                        tag,
                        name,
                        parts.join(", ")
                    ));
                }
            }
            em.line(&format!("return {};", js_string(type_name)));
            em.dedent();
            em.line("};");
        }
    }
}

fn gen_json(ctx: &mut GenCtx<'_>, em: &mut Emitter, type_name: &str, body: &TypeBody<'_>) {
    match body {
        TypeBody::Struct(_) => {
            let fields = field_names(ctx, body);
            let to_parts: Vec<String> = fields.iter().map(|f| format!("{f}: v.{f}")).collect();
            em.line(&format!(
                "{}.toJSON = (v) => ({{ {} }});",
                type_name,
                to_parts.join(", ")
            ));
            let from_parts: Vec<String> = fields.iter().map(|f| format!("{f}: data.{f}")).collect();
            em.line(&format!(
                "{}.fromJSON = (data) => {}({{ {} }});",
                type_name,
                type_name,
                from_parts.join(", ")
            ));
        }
        TypeBody::Enum(variants) => {
            em.line(&format!(
                "{}.toJSON = (v) => ({{ ...v }});",
                type_name
            ));
            em.line(&format!("{}.fromJSON = (data) => {{", type_name));
            em.indent();
            for variant in variants {
                let name = ctx.interner.resolve(variant.name).to_string();
                let tag = js_string(&name);
                if variant.fields.is_empty() {
                    em.line(&format!("if (data.__tag === {}) return {};", tag, name));
                } else {
                    let args: Vec<String> =
                        (0..variant.fields.len()).map(|i| format!("data._{i}")).collect();
                    em.line(&format!(
                        "if (data.__tag === {}) return {}({});",
                        tag,
                        name,
                        args.join(", ")
                    ));
                }
            }
            em.line("return null;");
            em.dedent();
            em.line("};");
        }
    }
}

/// `derive [UserTrait]` bridges the trait's default methods onto the type;
/// the analyzer has already vetted that defaults exist.
fn gen_trait_bridge(ctx: &mut GenCtx<'_>, em: &mut Emitter, type_name: &str, trait_name: &str) {
    let methods = ctx.trait_defaults.get(trait_name).cloned().unwrap_or_default();
    for method in methods {
        em.line(&format!(
            "{}.{} = (self, ...args) => {}.{}(self, ...args);",
            type_name, method, trait_name, method
        ));
    }
}
