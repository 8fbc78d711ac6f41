use super::stmt::gen_fn_body;
use super::GenCtx;
use crate::ast::*;

/// Capitalizes for the `setCount` signal setter convention.
pub fn setter_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("set{}{}", first.to_uppercase(), chars.as_str()),
        None => "set".to_string(),
    }
}

pub fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

/// Lowers an expression to JavaScript text. Statement-level effects of `?`
/// propagation are pushed onto the context's pre-statement frame.
pub fn gen_expr(ctx: &mut GenCtx<'_>, expr: &Expr<'_>) -> String {
    match &expr.kind {
        ExprKind::Int(n) => n.to_string(),
        ExprKind::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() {
                format!("{:.1}", f)
            } else {
                f.to_string()
            }
        }
        ExprKind::Str(parts) => gen_template(ctx, parts),
        ExprKind::RawStr(sym) => js_string(ctx.interner.resolve(*sym)),
        ExprKind::Regex { pattern, flags } => {
            format!("/{}/{}", ctx.interner.resolve(*pattern), ctx.interner.resolve(*flags))
        }
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Nil => "null".to_string(),
        ExprKind::Ident(sym) => {
            let name = ctx.interner.resolve(*sym).to_string();
            if ctx.in_client && ctx.client_state.contains(sym) {
                format!("{}()", name)
            } else {
                name
            }
        }
        ExprKind::Unary { op, operand } => {
            let inner = gen_expr(ctx, operand);
            match op {
                UnaryOp::Neg => format!("(-{})", inner),
                UnaryOp::Not => format!("(!{})", inner),
            }
        }
        ExprKind::Binary { op, left, right } => {
            let l = gen_expr(ctx, left);
            let r = gen_expr(ctx, right);
            format!("({} {} {})", l, op.js(), r)
        }
        ExprKind::Logical { op, left, right } => {
            let l = gen_expr(ctx, left);
            let r = gen_expr(ctx, right);
            let op = match op {
                LogicalOp::And => "&&",
                LogicalOp::Or => "||",
                LogicalOp::Coalesce => "??",
            };
            format!("({} {} {})", l, op, r)
        }
        ExprKind::ChainedCmp { first, rest } => gen_chained_cmp(ctx, first, rest),
        ExprKind::Member { object, property, optional } => {
            let obj = gen_expr(ctx, object);
            let prop = ctx.interner.resolve(*property);
            if *optional {
                format!("{}?.{}", obj, prop)
            } else {
                format!("{}.{}", obj, prop)
            }
        }
        ExprKind::Index { object, index } => {
            format!("{}[{}]", gen_expr(ctx, object), gen_expr(ctx, index))
        }
        ExprKind::Slice { object, start, end, step } => gen_slice(ctx, object, start, end, step),
        ExprKind::Call { callee, args } => {
            let callee_js = gen_expr(ctx, callee);
            let args_js = gen_args(ctx, args);
            format!("{}({})", callee_js, args_js)
        }
        ExprKind::Pipe { value, target } => gen_pipe(ctx, value, target),
        ExprKind::Lambda { params, body, is_async } => {
            let params_js = gen_params(ctx, params);
            let prefix = if *is_async { "async " } else { "" };
            let body_js = gen_lambda_body(ctx, body);
            format!("{}({}) => {}", prefix, params_js, body_js)
        }
        ExprKind::Match { subject, arms } => gen_match(ctx, subject, arms),
        ExprKind::If { branches, else_body } => {
            let mut out = String::new();
            for branch in branches {
                let cond = gen_expr(ctx, branch.cond);
                let body = gen_value_expr(ctx, branch.body);
                out.push_str(&format!("{} ? {} : ", cond, body));
            }
            match else_body {
                Some(e) => out.push_str(&gen_value_expr(ctx, e)),
                None => out.push_str("undefined"),
            }
            format!("({})", out)
        }
        ExprKind::Block(_) => {
            let body = gen_value_expr(ctx, expr);
            body
        }
        ExprKind::Yield { value, delegate } => {
            let star = if *delegate { "*" } else { "" };
            match value {
                Some(v) => format!("(yield{} {})", star, gen_expr(ctx, v)),
                None => "(yield)".to_string(),
            }
        }
        ExprKind::Await(operand) => format!("(await {})", gen_expr(ctx, operand)),
        ExprKind::Propagate(operand) => {
            let inner = gen_expr(ctx, operand);
            let tmp = ctx.fresh_tmp();
            ctx.push_pre(format!("const {} = {};", tmp, inner));
            ctx.push_pre(format!("if ({} == null) return {};", tmp, tmp));
            tmp
        }
        ExprKind::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    ArrayItem::Item(e) => gen_expr(ctx, e),
                    ArrayItem::Spread(e) => format!("...{}", gen_expr(ctx, e)),
                })
                .collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::Object(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|entry| match entry {
                    ObjectEntry::Field { key, value } => {
                        format!("{}: {}", object_key(ctx.interner.resolve(*key)), gen_expr(ctx, value))
                    }
                    ObjectEntry::Computed { key, value } => {
                        format!("[{}]: {}", gen_expr(ctx, key), gen_expr(ctx, value))
                    }
                    ObjectEntry::Spread(e) => format!("...{}", gen_expr(ctx, e)),
                })
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        ExprKind::ListComp { element, clauses } => gen_list_comp(ctx, element, clauses),
        ExprKind::DictComp { key, value, clauses } => gen_dict_comp(ctx, key, value, clauses),
        ExprKind::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(|e| gen_expr(ctx, e)).collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::Range { start, end, inclusive } => {
            let s = gen_expr(ctx, start);
            let e = gen_expr(ctx, end);
            let adjust = if *inclusive { " + 1" } else { "" };
            format!(
                "Array.from({{ length: Math.max(0, {} - {}{}) }}, (_, __i) => {} + __i)",
                e, s, adjust, s
            )
        }
        ExprKind::Jsx { .. } | ExprKind::JsxFragment { .. } => super::client::gen_jsx(ctx, expr),
    }
}

/// Expression used for its value; blocks become IIFEs returning their
/// trailing expression.
pub fn gen_value_expr(ctx: &mut GenCtx<'_>, expr: &Expr<'_>) -> String {
    match &expr.kind {
        ExprKind::Block(stmts) => {
            let body = gen_fn_body(ctx, stmts, true);
            format!("(() => {{\n{}}})()", body)
        }
        _ => gen_expr(ctx, expr),
    }
}

fn gen_lambda_body(ctx: &mut GenCtx<'_>, body: &Expr<'_>) -> String {
    match &body.kind {
        ExprKind::Block(stmts) => {
            let inner = gen_fn_body(ctx, stmts, true);
            format!("{{\n{}}}", inner)
        }
        _ => {
            ctx.pre.push(Vec::new());
            let value = gen_expr(ctx, body);
            let pre = ctx.pre.pop().unwrap_or_default();
            if pre.is_empty() {
                format!("({})", value)
            } else {
                let mut block = String::new();
                for line in pre {
                    block.push_str("  ");
                    block.push_str(&line);
                    block.push('\n');
                }
                block.push_str(&format!("  return {};\n", value));
                format!("{{\n{}}}", block)
            }
        }
    }
}

pub fn gen_params(ctx: &mut GenCtx<'_>, params: &[Param<'_>]) -> String {
    let parts: Vec<String> = params
        .iter()
        .map(|p| {
            let name = ctx.interner.resolve(p.name).to_string();
            if p.rest {
                format!("...{}", name)
            } else if let Some(default) = p.default {
                format!("{} = {}", name, gen_expr(ctx, default))
            } else {
                name
            }
        })
        .collect();
    parts.join(", ")
}

pub fn gen_args(ctx: &mut GenCtx<'_>, args: &[CallArg<'_>]) -> String {
    let mut positional: Vec<String> = Vec::new();
    let mut named: Vec<String> = Vec::new();
    for arg in args {
        match arg {
            CallArg::Positional(e) => positional.push(gen_expr(ctx, e)),
            CallArg::Spread(e) => positional.push(format!("...{}", gen_expr(ctx, e))),
            CallArg::Named { name, value } => named.push(format!(
                "{}: {}",
                object_key(ctx.interner.resolve(*name)),
                gen_expr(ctx, value)
            )),
        }
    }
    if !named.is_empty() {
        positional.push(format!("{{ {} }}", named.join(", ")));
    }
    positional.join(", ")
}

fn gen_template(ctx: &mut GenCtx<'_>, parts: &[StrPart<'_>]) -> String {
    if let [StrPart::Text(sym)] = parts {
        return js_string(ctx.interner.resolve(*sym));
    }
    let mut out = String::from("`");
    for part in parts {
        match part {
            StrPart::Text(sym) => {
                let text = ctx.interner.resolve(*sym).to_string();
                out.push_str(&escape_template_text(&text));
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

fn escape_template_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

/// `a < b < c` with single evaluation: each subject binds once, comparisons
/// short-circuit left to right.
fn gen_chained_cmp(
    ctx: &mut GenCtx<'_>,
    first: &Expr<'_>,
    rest: &[(BinaryOp, &Expr<'_>)],
) -> String {
    let mut values = vec![gen_expr(ctx, first)];
    for (_, operand) in rest {
        values.push(gen_expr(ctx, operand));
    }
    let names: Vec<String> = (0..values.len()).map(|i| format!("__c{}", i)).collect();
    let mut cond = String::new();
    for (i, (op, _)) in rest.iter().enumerate() {
        if i > 0 {
            cond.push_str(" && ");
        }
        cond.push_str(&format!("{} {} {}", names[i], op.js(), names[i + 1]));
    }
    format!("((({}) => {})({}))", names.join(", "), cond, values.join(", "))
}

fn gen_slice(
    ctx: &mut GenCtx<'_>,
    object: &Expr<'_>,
    start: &Option<&Expr<'_>>,
    end: &Option<&Expr<'_>>,
    step: &Option<&Expr<'_>>,
) -> String {
    let obj = gen_expr(ctx, object);
    let start_js = start.map(|e| gen_expr(ctx, e));
    let end_js = end.map(|e| gen_expr(ctx, e));
    match step {
        None => {
            let s = start_js.unwrap_or_else(|| "0".to_string());
            match end_js {
                Some(e) => format!("{}.slice({}, {})", obj, s, e),
                None => format!("{}.slice({})", obj, s),
            }
        }
        Some(step) => {
            let step_js = gen_expr(ctx, step);
            let s = start_js.unwrap_or_else(|| "0".to_string());
            let e = end_js.map(|e| e).unwrap_or_else(|| "__v.length".to_string());
            format!(
                "((__v) => {{ const __out = []; const __step = {step}; for (let __i = {s}; __step > 0 ? __i < {e} : __i > {e}; __i += __step) __out.push(__v[__i]); return __out; }})({obj})",
                step = step_js,
                s = s,
                e = e,
                obj = obj
            )
        }
    }
}

fn gen_pipe(ctx: &mut GenCtx<'_>, value: &Expr<'_>, target: &PipeTarget<'_>) -> String {
    let piped = gen_expr(ctx, value);
    match target {
        PipeTarget::Bare(callee) => {
            let f = gen_expr(ctx, callee);
            format!("{}({})", f, piped)
        }
        PipeTarget::Method { name, args } => {
            let args_js = gen_args(ctx, args);
            format!("{}.{}({})", piped, ctx.interner.resolve(*name), args_js)
        }
        PipeTarget::Call(call) => {
            let ExprKind::Call { callee, args } = &call.kind else {
                let f = gen_expr(ctx, call);
                return format!("{}({})", f, piped);
            };
            let has_placeholder = args
                .iter()
                .any(|a| matches!(a, CallArg::Positional(e) if e.is_placeholder(ctx.interner)));
            let callee_js = gen_expr(ctx, callee);
            let mut parts: Vec<String> = Vec::new();
            if has_placeholder {
                for arg in args {
                    match arg {
                        CallArg::Positional(e) if e.is_placeholder(ctx.interner) => {
                            parts.push(piped.clone());
                        }
                        CallArg::Positional(e) => parts.push(gen_expr(ctx, e)),
                        CallArg::Spread(e) => parts.push(format!("...{}", gen_expr(ctx, e))),
                        CallArg::Named { name, value } => parts.push(format!(
                            "{{ {}: {} }}",
                            object_key(ctx.interner.resolve(*name)),
                            gen_expr(ctx, value)
                        )),
                    }
                }
            } else {
                parts.push(piped);
                for arg in args {
                    match arg {
                        CallArg::Positional(e) => parts.push(gen_expr(ctx, e)),
                        CallArg::Spread(e) => parts.push(format!("...{}", gen_expr(ctx, e))),
                        CallArg::Named { name, value } => parts.push(format!(
                            "{{ {}: {} }}",
                            object_key(ctx.interner.resolve(*name)),
                            gen_expr(ctx, value)
                        )),
                    }
                }
            }
            format!("{}({})", callee_js, parts.join(", "))
        }
    }
}

// -- match lowering ---------------------------------------------------------

fn gen_match(ctx: &mut GenCtx<'_>, subject: &Expr<'_>, arms: &[MatchArm<'_>]) -> String {
    let subject_js = gen_expr(ctx, subject);
    let mut body = String::new();
    for arm in arms {
        let cond = gen_pattern_cond(ctx, arm.pattern, "__m");
        let bindings = pattern_bindings(ctx, arm.pattern, "__m");
        let names: Vec<&str> = bindings.iter().map(|(n, _)| n.as_str()).collect();
        let values: Vec<&str> = bindings.iter().map(|(_, v)| v.as_str()).collect();
        let arm_body = gen_value_expr(ctx, arm.body);

        match (&arm.guard, bindings.is_empty()) {
            (None, true) => {
                body.push_str(&format!("  if ({}) return {};\n", cond, arm_body));
            }
            (None, false) => {
                body.push_str(&format!(
                    "  if ({}) return (({}) => {})({});\n",
                    cond,
                    names.join(", "),
                    arm_body,
                    values.join(", ")
                ));
            }
            (Some(guard), _) => {
                let guard_js = gen_expr(ctx, guard);
                body.push_str(&format!(
                    "  if ({}) {{\n    const __arm = (({}) => ({}) ? {{ v: {} }} : null)({});\n    if (__arm) return __arm.v;\n  }}\n",
                    cond,
                    names.join(", "),
                    guard_js,
                    arm_body,
                    values.join(", ")
                ));
            }
        }
    }
    body.push_str("  return undefined;\n");
    format!("((__m) => {{\n{}}})({})", body, subject_js)
}

/// Condition that decides whether `subject_js` matches the pattern.
pub fn gen_pattern_cond(ctx: &mut GenCtx<'_>, pattern: &Pattern<'_>, subject_js: &str) -> String {
    match &pattern.kind {
        PatternKind::Wildcard | PatternKind::Binding(_) => "true".to_string(),
        PatternKind::Literal(lit) => {
            let lit_js = gen_expr(ctx, lit);
            if lit_js == "null" {
                format!("{} == null", subject_js)
            } else {
                format!("{} === {}", subject_js, lit_js)
            }
        }
        PatternKind::Variant { name, args } => {
            let tag = ctx.interner.resolve(*name).to_string();
            let mut cond = format!(
                "{s} != null && {s}.__tag === {t}",
                s = subject_js,
                t = js_string(&tag)
            );
            for (i, arg) in args.iter().enumerate() {
                if arg.is_irrefutable() {
                    continue;
                }
                let field = format!("{}._{}", subject_js, i);
                cond.push_str(&format!(" && {}", gen_pattern_cond(ctx, arg, &field)));
            }
            cond
        }
        PatternKind::StringConcat { prefix, .. } => {
            let p = js_string(ctx.interner.resolve(*prefix));
            format!(
                "typeof {s} === \"string\" && {s}.startsWith({p})",
                s = subject_js,
                p = p
            )
        }
        PatternKind::Array { items, rest } => {
            let op = if rest.is_some() { ">=" } else { "===" };
            let mut cond = format!(
                "Array.isArray({s}) && {s}.length {op} {n}",
                s = subject_js,
                op = op,
                n = items.len()
            );
            for (i, item) in items.iter().enumerate() {
                if item.is_irrefutable() {
                    continue;
                }
                let elem = format!("{}[{}]", subject_js, i);
                cond.push_str(&format!(" && {}", gen_pattern_cond(ctx, item, &elem)));
            }
            cond
        }
        PatternKind::Object { entries, .. } => {
            let mut cond = format!("{} != null", subject_js);
            for entry in entries {
                let key = ctx.interner.resolve(entry.key).to_string();
                if let Some(nested) = entry.pattern {
                    if !nested.is_irrefutable() {
                        let field = format!("{}.{}", subject_js, key);
                        cond.push_str(&format!(" && {}", gen_pattern_cond(ctx, nested, &field)));
                    }
                }
            }
            cond
        }
        PatternKind::Range { start, end, inclusive } => {
            let s = gen_expr(ctx, start);
            let e = gen_expr(ctx, end);
            let upper = if *inclusive { "<=" } else { "<" };
            format!(
                "{subj} >= {s} && {subj} {op} {e}",
                subj = subject_js,
                s = s,
                op = upper,
                e = e
            )
        }
    }
}

/// `(name, value_js)` pairs bound when the pattern matches.
pub fn pattern_bindings(
    ctx: &mut GenCtx<'_>,
    pattern: &Pattern<'_>,
    subject_js: &str,
) -> Vec<(String, String)> {
    let mut out = Vec::new();
    collect_bindings(ctx, pattern, subject_js, &mut out);
    out
}

fn collect_bindings(
    ctx: &mut GenCtx<'_>,
    pattern: &Pattern<'_>,
    subject_js: &str,
    out: &mut Vec<(String, String)>,
) {
    match &pattern.kind {
        PatternKind::Binding(name) => {
            out.push((ctx.interner.resolve(*name).to_string(), subject_js.to_string()));
        }
        PatternKind::Variant { args, .. } => {
            for (i, arg) in args.iter().enumerate() {
                collect_bindings(ctx, arg, &format!("{}._{}", subject_js, i), out);
            }
        }
        PatternKind::StringConcat { prefix, rest } => {
            let prefix_len = ctx.interner.resolve(*prefix).chars().count();
            out.push((
                ctx.interner.resolve(*rest).to_string(),
                format!("{}.slice({})", subject_js, prefix_len),
            ));
        }
        PatternKind::Array { items, rest } => {
            for (i, item) in items.iter().enumerate() {
                collect_bindings(ctx, item, &format!("{}[{}]", subject_js, i), out);
            }
            if let Some(rest) = rest {
                out.push((
                    ctx.interner.resolve(*rest).to_string(),
                    format!("{}.slice({})", subject_js, items.len()),
                ));
            }
        }
        PatternKind::Object { entries, rest } => {
            for entry in entries {
                let key = ctx.interner.resolve(entry.key).to_string();
                let mut access = format!("{}.{}", subject_js, key);
                if let Some(default) = entry.default {
                    let default_js = gen_expr(ctx, default);
                    access = format!("({} ?? {})", access, default_js);
                }
                match entry.pattern {
                    Some(nested) => collect_bindings(ctx, nested, &access, out),
                    None => out.push((key, access)),
                }
            }
            if let Some(rest) = rest {
                let keys: Vec<String> = entries
                    .iter()
                    .map(|e| js_string(ctx.interner.resolve(e.key)))
                    .collect();
                out.push((
                    ctx.interner.resolve(*rest).to_string(),
                    format!(
                        "Object.fromEntries(Object.entries({}).filter(([__k]) => ![{}].includes(__k)))",
                        subject_js,
                        keys.join(", ")
                    ),
                ));
            }
        }
        PatternKind::Literal(_) | PatternKind::Wildcard | PatternKind::Range { .. } => {}
    }
}

// -- comprehensions ---------------------------------------------------------

fn gen_list_comp(ctx: &mut GenCtx<'_>, element: &Expr<'_>, clauses: &[CompClause<'_>]) -> String {
    let mut open = String::new();
    let mut close = String::new();
    gen_comp_clauses(ctx, clauses, &mut open, &mut close);
    let elem = gen_expr(ctx, element);
    format!(
        "(() => {{ const __out = []; {}__out.push({});{} return __out; }})()",
        open, elem, close
    )
}

fn gen_dict_comp(
    ctx: &mut GenCtx<'_>,
    key: &Expr<'_>,
    value: &Expr<'_>,
    clauses: &[CompClause<'_>],
) -> String {
    let mut open = String::new();
    let mut close = String::new();
    gen_comp_clauses(ctx, clauses, &mut open, &mut close);
    let key_js = gen_expr(ctx, key);
    let value_js = gen_expr(ctx, value);
    format!(
        "(() => {{ const __out = {{}}; {}__out[{}] = {};{} return __out; }})()",
        open, key_js, value_js, close
    )
}

fn gen_comp_clauses(
    ctx: &mut GenCtx<'_>,
    clauses: &[CompClause<'_>],
    open: &mut String,
    close: &mut String,
) {
    for clause in clauses {
        match clause {
            CompClause::For { pattern, iterable } => {
                let iter = gen_expr(ctx, iterable);
                let target = super::stmt::gen_pattern_destructure(ctx, pattern);
                open.push_str(&format!("for (const {} of {}) {{ ", target, iter));
                close.push_str(" }");
            }
            CompClause::If(cond) => {
                let cond_js = gen_expr(ctx, cond);
                open.push_str(&format!("if ({}) {{ ", cond_js));
                close.push_str(" }");
            }
        }
    }
}

fn object_key(key: &str) -> String {
    let valid = !key.is_empty()
        && key
            .chars()
            .next()
            .map_or(false, |c| c.is_alphabetic() || c == '_' || c == '$')
        && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if valid {
        key.to_string()
    } else {
        js_string(key)
    }
}
