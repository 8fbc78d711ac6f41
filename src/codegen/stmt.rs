use super::derive::gen_derives;
use super::emitter::Emitter;
use super::expr::{gen_expr, gen_params, gen_value_expr, js_string, setter_name};
use super::GenCtx;
use crate::ast::*;

/// Lowers one statement into the emitter, draining `?`-propagation
/// pre-statements first.
pub fn gen_stmt(ctx: &mut GenCtx<'_>, em: &mut Emitter, stmt: &Stmt<'_>) {
    match &stmt.kind {
        StmtKind::Expr(e) => {
            let (js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, e));
            drain(em, pre);
            em.stmt(stmt.loc, &format!("{};", js));
        }
        StmtKind::Assign { targets, value } => {
            let (value_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, value));
            drain(em, pre);
            if targets.len() == 1 {
                gen_single_assign(ctx, em, stmt, targets[0], &value_js);
            } else {
                let names: Vec<String> = targets
                    .iter()
                    .map(|t| assign_target_js(ctx, t))
                    .collect();
                let fresh: Vec<&String> = names
                    .iter()
                    .zip(targets.iter())
                    .filter(|(_, t)| matches!(t.kind, ExprKind::Ident(sym) if !ctx.is_declared(sym)))
                    .map(|(n, _)| n)
                    .collect();
                let all_fresh = fresh.len() == names.len();
                for target in targets.iter() {
                    if let ExprKind::Ident(sym) = target.kind {
                        ctx.declare(sym);
                    }
                }
                if all_fresh {
                    em.stmt(stmt.loc, &format!("let [{}] = {};", names.join(", "), value_js));
                } else {
                    em.stmt(stmt.loc, &format!("[{}] = {};", names.join(", "), value_js));
                }
            }
        }
        StmtKind::VarDecl { name, value, .. } => {
            let (value_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, value));
            drain(em, pre);
            ctx.declare(*name);
            em.stmt(
                stmt.loc,
                &format!("let {} = {};", ctx.interner.resolve(*name), value_js),
            );
        }
        StmtKind::LetDecl { pattern, value } => {
            let (value_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, value));
            drain(em, pre);
            let mut names = Vec::new();
            pattern.bound_names(&mut names);
            for (name, _) in names {
                ctx.declare(name);
            }
            let target = gen_pattern_destructure(ctx, pattern);
            em.stmt(stmt.loc, &format!("const {} = {};", target, value_js));
        }
        StmtKind::CompoundAssign { target, op, value } => {
            let (value_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, value));
            drain(em, pre);
            if let ExprKind::Ident(sym) = target.kind {
                if ctx.in_client && ctx.client_state.contains(&sym) {
                    let name = ctx.interner.resolve(sym).to_string();
                    em.stmt(
                        stmt.loc,
                        &format!(
                            "{}({}() {} {});",
                            setter_name(&name),
                            name,
                            op.js(),
                            value_js
                        ),
                    );
                    return;
                }
            }
            let target_js = assign_target_js(ctx, target);
            em.stmt(stmt.loc, &format!("{} {}= {};", target_js, op.js(), value_js));
        }
        StmtKind::Func(f) => gen_func(ctx, em, f, stmt.loc),
        StmtKind::TypeDecl { name, body, derives, .. } => {
            gen_type_decl(ctx, em, stmt, *name, body, derives);
        }
        StmtKind::TypeAlias { name, target, .. } => {
            em.stmt(
                stmt.loc,
                &format!(
                    "// type {} = {}",
                    ctx.interner.resolve(*name),
                    ctx.interner.resolve(*target)
                ),
            );
        }
        StmtKind::Interface { .. } => {}
        StmtKind::Trait { name, methods, .. } => {
            let trait_name = ctx.interner.resolve(*name).to_string();
            em.stmt(stmt.loc, &format!("const {} = {{", trait_name));
            em.indent();
            for method in methods {
                if let Some(body) = &method.default_body {
                    let params = gen_params(ctx, &method.params);
                    em.line(&format!("{}({}) {{", ctx.interner.resolve(method.name), params));
                    em.indent();
                    ctx.push_scope(&method.params);
                    gen_body_stmts(ctx, em, body, true);
                    ctx.pop_scope();
                    em.dedent();
                    em.line("},");
                }
            }
            em.dedent();
            em.line("};");
        }
        StmtKind::Impl { trait_name, type_name, methods } => {
            let target = ctx.interner.resolve(*type_name).to_string();
            for method in methods {
                let params = gen_params(ctx, &method.params);
                let prefix = if method.is_async { "async " } else { "" };
                em.stmt(
                    method.loc,
                    &format!(
                        "{}.{} = {}function ({}) {{",
                        target,
                        ctx.interner.resolve(method.name),
                        prefix,
                        params
                    ),
                );
                em.indent();
                ctx.push_scope(&method.params);
                gen_body_stmts(ctx, em, &method.body, true);
                ctx.pop_scope();
                em.dedent();
                em.line("};");
            }
            if trait_name.is_some() {
                // Trait impls also answer the bridged dispatch used by
                // derive-generated methods.
            }
        }
        StmtKind::Return(value) => match value {
            Some(v) => {
                let (js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, v));
                drain(em, pre);
                em.stmt(stmt.loc, &format!("return {};", js));
            }
            None => em.stmt(stmt.loc, "return;"),
        },
        StmtKind::If { branches, else_body } => {
            for (i, (cond, body)) in branches.iter().enumerate() {
                let (cond_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, cond));
                drain(em, pre);
                let keyword = if i == 0 { "if" } else { "} else if" };
                em.stmt(stmt.loc, &format!("{} ({}) {{", keyword, cond_js));
                em.indent();
                gen_body_stmts(ctx, em, body, false);
                em.dedent();
            }
            if let Some(body) = else_body {
                em.line("} else {");
                em.indent();
                gen_body_stmts(ctx, em, body, false);
                em.dedent();
            }
            em.line("}");
        }
        StmtKind::While { cond, body } => {
            let (cond_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, cond));
            drain(em, pre);
            em.stmt(stmt.loc, &format!("while ({}) {{", cond_js));
            em.indent();
            gen_body_stmts(ctx, em, body, false);
            em.dedent();
            em.line("}");
        }
        StmtKind::For { pattern, iterable, body } => {
            let (iter_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, iterable));
            drain(em, pre);
            let mut names = Vec::new();
            pattern.bound_names(&mut names);
            for (name, _) in names {
                ctx.declare(name);
            }
            let target = gen_pattern_destructure(ctx, pattern);
            em.stmt(stmt.loc, &format!("for (const {} of {}) {{", target, iter_js));
            em.indent();
            gen_body_stmts(ctx, em, body, false);
            em.dedent();
            em.line("}");
        }
        StmtKind::Break => em.stmt(stmt.loc, "break;"),
        StmtKind::Continue => em.stmt(stmt.loc, "continue;"),
        StmtKind::Guard { cond, else_body } => {
            let (cond_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, cond));
            drain(em, pre);
            em.stmt(stmt.loc, &format!("if (!({})) {{", cond_js));
            em.indent();
            gen_body_stmts(ctx, em, else_body, false);
            em.dedent();
            em.line("}");
        }
        StmtKind::Defer(body) => {
            em.stmt(stmt.loc, "__defers.push(() => {");
            em.indent();
            gen_body_stmts(ctx, em, body, false);
            em.dedent();
            em.line("});");
        }
        StmtKind::Import { names, module } => {
            let parts: Vec<String> = names
                .iter()
                .map(|(name, alias)| match alias {
                    Some(a) => format!(
                        "{} as {}",
                        ctx.interner.resolve(*name),
                        ctx.interner.resolve(*a)
                    ),
                    None => ctx.interner.resolve(*name).to_string(),
                })
                .collect();
            em.stmt(
                stmt.loc,
                &format!(
                    "import {{ {} }} from {};",
                    parts.join(", "),
                    js_string(ctx.interner.resolve(*module))
                ),
            );
        }
        StmtKind::StateDecl { name, value } => {
            let (value_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, value));
            drain(em, pre);
            let name_str = ctx.interner.resolve(*name).to_string();
            ctx.client_state.insert(*name);
            em.stmt(
                stmt.loc,
                &format!(
                    "const [{}, {}] = signal({});",
                    name_str,
                    setter_name(&name_str),
                    value_js
                ),
            );
        }
        StmtKind::ComputedDecl { name, value } => {
            ctx.client_state.insert(*name);
            let (value_js, pre) = with_pre(ctx, |ctx| gen_expr(ctx, value));
            drain(em, pre);
            em.stmt(
                stmt.loc,
                &format!("const {} = () => ({});", ctx.interner.resolve(*name), value_js),
            );
        }
        StmtKind::EffectDecl { body } => {
            em.stmt(stmt.loc, "effect_of(() => {");
            em.indent();
            gen_body_stmts(ctx, em, body, false);
            em.dedent();
            em.line("});");
        }
        StmtKind::StoreDecl { name, config } => {
            let fields: Vec<String> = config
                .iter()
                .map(|(k, v)| {
                    let value = gen_expr(ctx, v);
                    format!("{}: {}", ctx.interner.resolve(*k), value)
                })
                .collect();
            em.stmt(
                stmt.loc,
                &format!(
                    "const {} = {{ {} }};",
                    ctx.interner.resolve(*name),
                    fields.join(", ")
                ),
            );
        }
        // Target blocks and server leaves are routed by the driver and the
        // server generator, never through the plain statement path.
        StmtKind::ServerBlock { .. }
        | StmtKind::ClientBlock { .. }
        | StmtKind::SharedBlock { .. }
        | StmtKind::SecurityBlock { .. }
        | StmtKind::TestBlock { .. }
        | StmtKind::Route(_)
        | StmtKind::Middleware { .. }
        | StmtKind::OnError { .. }
        | StmtKind::WsDecl { .. }
        | StmtKind::SseDecl { .. }
        | StmtKind::HealthDecl { .. }
        | StmtKind::StaticDecl { .. }
        | StmtKind::ScheduleDecl { .. }
        | StmtKind::BackgroundDecl(_)
        | StmtKind::DiscoverDecl { .. }
        | StmtKind::SessionDecl { .. }
        | StmtKind::UploadDecl { .. }
        | StmtKind::MaxBodyDecl { .. }
        | StmtKind::CompressionDecl { .. }
        | StmtKind::CacheDecl { .. }
        | StmtKind::DbDecl { .. }
        | StmtKind::TlsDecl { .. }
        | StmtKind::EnvDecl { .. }
        | StmtKind::ModelDecl { .. }
        | StmtKind::Component(_) => {}
    }
}

fn gen_single_assign(
    ctx: &mut GenCtx<'_>,
    em: &mut Emitter,
    stmt: &Stmt<'_>,
    target: &Expr<'_>,
    value_js: &str,
) {
    if let ExprKind::Ident(sym) = target.kind {
        if ctx.in_client && ctx.client_state.contains(&sym) {
            let name = ctx.interner.resolve(sym).to_string();
            em.stmt(stmt.loc, &format!("{}({});", setter_name(&name), value_js));
            return;
        }
        let name = ctx.interner.resolve(sym).to_string();
        if ctx.is_declared(sym) {
            em.stmt(stmt.loc, &format!("{} = {};", name, value_js));
        } else {
            ctx.declare(sym);
            em.stmt(stmt.loc, &format!("let {} = {};", name, value_js));
        }
        return;
    }
    let target_js = assign_target_js(ctx, target);
    em.stmt(stmt.loc, &format!("{} = {};", target_js, value_js));
}

fn assign_target_js(ctx: &mut GenCtx<'_>, target: &Expr<'_>) -> String {
    match &target.kind {
        ExprKind::Ident(sym) => ctx.interner.resolve(*sym).to_string(),
        ExprKind::Member { object, property, .. } => {
            format!("{}.{}", gen_expr(ctx, object), ctx.interner.resolve(*property))
        }
        ExprKind::Index { object, index } => {
            format!("{}[{}]", gen_expr(ctx, object), gen_expr(ctx, index))
        }
        _ => gen_expr(ctx, target),
    }
}

/// JS destructuring target for an irrefutable pattern.
pub fn gen_pattern_destructure(ctx: &mut GenCtx<'_>, pattern: &Pattern<'_>) -> String {
    match &pattern.kind {
        PatternKind::Binding(name) => ctx.interner.resolve(*name).to_string(),
        PatternKind::Wildcard => "_".to_string(),
        PatternKind::Array { items, rest } => {
            let mut parts: Vec<String> = items
                .iter()
                .map(|p| gen_pattern_destructure(ctx, p))
                .collect();
            if let Some(rest) = rest {
                parts.push(format!("...{}", ctx.interner.resolve(*rest)));
            }
            format!("[{}]", parts.join(", "))
        }
        PatternKind::Object { entries, rest } => {
            let mut parts: Vec<String> = entries
                .iter()
                .map(|entry| {
                    let key = ctx.interner.resolve(entry.key).to_string();
                    let mut part = match entry.pattern {
                        Some(nested) => format!("{}: {}", key, gen_pattern_destructure(ctx, nested)),
                        None => key,
                    };
                    if let Some(default) = entry.default {
                        let default_js = gen_expr(ctx, default);
                        part.push_str(&format!(" = {}", default_js));
                    }
                    part
                })
                .collect();
            if let Some(rest) = rest {
                parts.push(format!("...{}", ctx.interner.resolve(*rest)));
            }
            format!("{{ {} }}", parts.join(", "))
        }
        // Refutable patterns cannot appear in destructuring position; the
        // parser rejects them before codegen.
        _ => "_".to_string(),
    }
}

// -- functions --------------------------------------------------------------

pub fn gen_func(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &FuncDecl<'_>, loc: crate::token::Loc) {
    if let Some(doc) = f.doc {
        for line in ctx.interner.resolve(doc).to_string().lines() {
            em.line(&format!("// {}", line));
        }
    }
    let params = gen_params(ctx, &f.params);
    let export = if f.is_pub && ctx.allow_export { "export " } else { "" };
    let asyncness = if f.is_async { "async " } else { "" };
    let star = if f.is_generator { "*" } else { "" };
    em.stmt(
        loc,
        &format!(
            "{}{}function{} {}({}) {{",
            export,
            asyncness,
            star,
            ctx.interner.resolve(f.name),
            params
        ),
    );
    em.indent();
    ctx.push_scope(&f.params);
    gen_body_stmts(ctx, em, &f.body, true);
    ctx.pop_scope();
    em.dedent();
    em.line("}");
}

/// Emits a function body. With `implicit_return`, a trailing expression
/// statement becomes the return value. Bodies containing `defer` are wrapped
/// in try/finally running the deferred blocks in reverse.
pub fn gen_body_stmts(
    ctx: &mut GenCtx<'_>,
    em: &mut Emitter,
    body: &[&Stmt<'_>],
    implicit_return: bool,
) {
    let has_defer = body_has_defer(body);
    if has_defer {
        em.line("const __defers = [];");
        em.line("try {");
        em.indent();
    }
    for (i, stmt) in body.iter().enumerate() {
        let last = i == body.len() - 1;
        if last && implicit_return {
            if let StmtKind::Expr(e) = &stmt.kind {
                if !matches!(e.kind, ExprKind::Yield { .. }) {
                    let (js, pre) = with_pre(ctx, |ctx| gen_value_expr(ctx, e));
                    drain(em, pre);
                    em.stmt(stmt.loc, &format!("return {};", js));
                    continue;
                }
            }
        }
        gen_stmt(ctx, em, stmt);
    }
    if has_defer {
        em.dedent();
        em.line("} finally {");
        em.indent();
        em.line("for (const __d of __defers.reverse()) __d();");
        em.dedent();
        em.line("}");
    }
}

fn body_has_defer(body: &[&Stmt<'_>]) -> bool {
    body.iter().any(|stmt| match &stmt.kind {
        StmtKind::Defer(_) => true,
        StmtKind::If { branches, else_body } => {
            branches.iter().any(|(_, b)| body_has_defer(b))
                || else_body.as_ref().map_or(false, |b| body_has_defer(b))
        }
        StmtKind::While { body, .. } | StmtKind::For { body, .. } => body_has_defer(body),
        StmtKind::Guard { else_body, .. } => body_has_defer(else_body),
        _ => false,
    })
}

/// Lambda body text at one indent level, used where a body must embed into
/// an expression. Mappings inside are not recorded.
pub fn gen_fn_body(ctx: &mut GenCtx<'_>, body: &[&Stmt<'_>], implicit_return: bool) -> String {
    let mut em = Emitter::new();
    em.indent();
    ctx.push_scope(&[]);
    gen_body_stmts(ctx, &mut em, body, implicit_return);
    ctx.pop_scope();
    let (out, _) = em.finish();
    out
}

// -- type declarations ------------------------------------------------------

fn gen_type_decl(
    ctx: &mut GenCtx<'_>,
    em: &mut Emitter,
    stmt: &Stmt<'_>,
    name: crate::intern::Symbol,
    body: &TypeBody<'_>,
    derives: &[crate::intern::Symbol],
) {
    let type_name = ctx.interner.resolve(name).to_string();
    match body {
        TypeBody::Struct(fields) => {
            em.stmt(stmt.loc, &format!("function {}(props = {{}}) {{", type_name));
            em.indent();
            em.line("return {");
            em.indent();
            em.line(&format!("__type: {},", js_string(&type_name)));
            for field in fields {
                let field_name = ctx.interner.resolve(field.name).to_string();
                match field.default {
                    Some(default) => {
                        let default_js = gen_expr(ctx, default);
                        em.line(&format!("{}: props.{} ?? {},", field_name, field_name, default_js));
                    }
                    None => em.line(&format!("{}: props.{},", field_name, field_name)),
                }
            }
            em.dedent();
            em.line("};");
            em.dedent();
            em.line("}");
        }
        TypeBody::Enum(variants) => {
            for variant in variants {
                let v_name = ctx.interner.resolve(variant.name).to_string();
                if variant.fields.is_empty() {
                    em.stmt(
                        variant.loc,
                        &format!("const {} = {{ __tag: {} }};", v_name, js_string(&v_name)),
                    );
                } else {
                    let params: Vec<String> = variant
                        .fields
                        .iter()
                        .map(|f| ctx.interner.resolve(f.name).to_string())
                        .collect();
                    let mut fields: Vec<String> = vec![format!("__tag: {}", js_string(&v_name))];
                    for (i, param) in params.iter().enumerate() {
                        if *param == format!("_{}", i) {
                            fields.push(param.clone());
                        } else {
                            // Positional access for patterns plus the named
                            // accessor.
                            fields.push(format!("_{}: {}", i, param));
                            fields.push(param.clone());
                        }
                    }
                    em.stmt(
                        variant.loc,
                        &format!(
                            "const {} = ({}) => ({{ {} }});",
                            v_name,
                            params.join(", "),
                            fields.join(", ")
                        ),
                    );
                }
            }
            let tags: Vec<String> = variants
                .iter()
                .map(|v| js_string(ctx.interner.resolve(v.name)))
                .collect();
            em.stmt(
                stmt.loc,
                &format!("const {} = {{ __variants: [{}] }};", type_name, tags.join(", ")),
            );
        }
    }
    gen_derives(ctx, em, &type_name, body, derives);
}

// -- helpers ----------------------------------------------------------------

pub fn with_pre<F>(ctx: &mut GenCtx<'_>, f: F) -> (String, Vec<String>)
where
    F: FnOnce(&mut GenCtx<'_>) -> String,
{
    ctx.pre.push(Vec::new());
    let out = f(ctx);
    let pre = ctx.pre.pop().unwrap_or_default();
    (out, pre)
}

pub fn drain(em: &mut Emitter, pre: Vec<String>) {
    for line in pre {
        em.line(&line);
    }
}
