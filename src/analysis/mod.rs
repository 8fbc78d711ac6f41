mod builtins;
pub mod scope;
pub mod security;
pub mod types;

pub use builtins::{builtin_names, is_builtin};
pub use scope::{Binding, BindingKind, Frame, ScopeStack};
pub use types::{compatible, TypeTable};

use crate::ast::*;
use crate::diagnostics::{suggest, Diagnostic};
use crate::intern::{Interner, Symbol};
use crate::token::Loc;
use security::SecurityCheck;
use types::{is_narrowing, specialize_return, without_nil, FnSig, VariantSig};

/// Warnings promoted to errors under strict mode.
const STRICT_PROMOTED: &[&str] = &["W101", "W102", "W103", "W200"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Module,
    Shared,
    Server,
    Client,
    Test,
}

/// Single-pass tree walk producing the diagnostic list: scope and
/// mutability rules, usage tracking, undefined names, structural type
/// checks, match exhaustiveness, and the merged security analysis.
pub struct Analyzer<'int> {
    interner: &'int mut Interner,
    file: String,
    options: AnalyzeOptions,
    diags: Vec<Diagnostic>,
    scopes: ScopeStack,
    table: TypeTable,
    loop_depth: usize,
    fn_async: Vec<bool>,
    ctx: Ctx,
}

impl<'int> Analyzer<'int> {
    pub fn new(file: Symbol, interner: &'int mut Interner, options: AnalyzeOptions) -> Self {
        let file_name = interner.resolve(file).to_string();
        Analyzer {
            interner,
            file: file_name,
            options,
            diags: Vec::new(),
            scopes: ScopeStack::new(),
            table: TypeTable::default(),
            loop_depth: 0,
            fn_async: Vec::new(),
            ctx: Ctx::Module,
        }
    }

    pub fn analyze(mut self, program: &Program<'_>) -> Vec<Diagnostic> {
        self.hoist(&program.decls);

        let mut security = SecurityCheck::new(self.file.clone());
        for (i, decl) in program.decls.iter().enumerate() {
            if let StmtKind::SecurityBlock { entries } = &decl.kind {
                security.add_block(i, entries);
            }
        }

        for decl in &program.decls {
            self.visit_stmt(decl);
        }

        if let Some(frame) = self.scopes.pop() {
            // Module-level variables and exports are never flagged; private
            // functions still are.
            self.report_unused(&frame, true);
        }

        security.run(self.interner, &mut self.diags);

        if self.options.strict {
            self.diags = std::mem::take(&mut self.diags)
                .into_iter()
                .map(|d| {
                    if STRICT_PROMOTED.contains(&d.code.as_str()) {
                        d.promote()
                    } else {
                        d
                    }
                })
                .collect();
        }

        log::debug!(
            "analysis of {} produced {} diagnostic(s)",
            self.file,
            self.diags.len()
        );
        self.diags
    }

    // -- diagnostics --------------------------------------------------------

    fn error(&mut self, code: &str, message: String, loc: Loc) {
        self.diags
            .push(Diagnostic::error(code, message, &self.file, loc.line, loc.column));
    }

    fn warn(&mut self, code: &str, message: String, loc: Loc) {
        self.diags
            .push(Diagnostic::warning(code, message, &self.file, loc.line, loc.column));
    }

    // -- hoisting -----------------------------------------------------------

    /// Functions, types, imports, and variants are visible from the top of
    /// their enclosing block.
    fn hoist(&mut self, stmts: &[&Stmt<'_>]) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Func(f) => self.hoist_func(f),
                StmtKind::Component(f) | StmtKind::BackgroundDecl(f) => self.hoist_func(f),
                StmtKind::TypeDecl { name, body, .. } => {
                    let binding = Binding::new(BindingKind::Type, stmt.loc);
                    let _ = self.scopes.define(*name, binding);
                    if let TypeBody::Enum(variants) = body {
                        let enum_name = self.interner.resolve(*name).to_string();
                        let sigs: Vec<VariantSig> = variants
                            .iter()
                            .map(|v| VariantSig {
                                name: self.interner.resolve(v.name).to_string(),
                                arity: v.fields.len(),
                            })
                            .collect();
                        self.table.enums.insert(enum_name, sigs);
                        for v in variants {
                            let _ = self
                                .scopes
                                .define(v.name, Binding::new(BindingKind::Variant, v.loc));
                        }
                    }
                }
                StmtKind::TypeAlias { name, target, .. } => {
                    let _ = self
                        .scopes
                        .define(*name, Binding::new(BindingKind::Type, stmt.loc));
                    let name_str = self.interner.resolve(*name).to_string();
                    let target_str = self.interner.resolve(*target).to_string();
                    self.table.aliases.insert(name_str, target_str);
                }
                StmtKind::Interface { name, .. } => {
                    let _ = self
                        .scopes
                        .define(*name, Binding::new(BindingKind::Type, stmt.loc));
                }
                StmtKind::Trait { name, methods, .. } => {
                    let _ = self
                        .scopes
                        .define(*name, Binding::new(BindingKind::Type, stmt.loc));
                    let defaults: Vec<String> = methods
                        .iter()
                        .filter(|m| m.default_body.is_some())
                        .map(|m| self.interner.resolve(m.name).to_string())
                        .collect();
                    let name_str = self.interner.resolve(*name).to_string();
                    self.table.traits.insert(name_str, defaults);
                }
                StmtKind::Import { names, .. } => {
                    for (name, alias) in names {
                        let bound = alias.unwrap_or(*name);
                        let _ = self
                            .scopes
                            .define(bound, Binding::new(BindingKind::Import, stmt.loc).public());
                    }
                }
                StmtKind::ModelDecl { type_name, .. } => {
                    let model = format!("{}Model", self.interner.resolve(*type_name));
                    let model_sym = self.interner.intern(&model);
                    let _ = self
                        .scopes
                        .define(model_sym, Binding::new(BindingKind::Import, stmt.loc).public());
                }
                _ => {}
            }
        }
    }

    fn hoist_func(&mut self, f: &FuncDecl<'_>) {
        let mut binding = Binding::new(BindingKind::Function, f.loc);
        if f.is_pub {
            binding = binding.public();
        }
        binding.declared_type = Some("Function".to_string());
        let _ = self.scopes.define(f.name, binding);

        let required = f
            .params
            .iter()
            .filter(|p| p.default.is_none() && !p.rest)
            .count();
        let sig = FnSig {
            required,
            total: f.params.len(),
            has_rest: f.params.iter().any(|p| p.rest),
            ret_type: f.ret_type.map(|t| self.interner.resolve(t).to_string()),
            type_params: f
                .type_params
                .iter()
                .map(|t| self.interner.resolve(*t).to_string())
                .collect(),
            param_types: f
                .params
                .iter()
                .map(|p| p.ty.map(|t| self.interner.resolve(t).to_string()))
                .collect(),
        };
        let name = self.interner.resolve(f.name).to_string();
        self.table.functions.insert(name, sig);
    }

    // -- unused reporting ---------------------------------------------------

    fn report_unused(&mut self, frame: &Frame, module_level: bool) {
        let mut findings: Vec<(String, &'static str, &'static str, Loc)> = Vec::new();
        for (sym, binding) in frame.iter() {
            if binding.used || binding.is_pub {
                continue;
            }
            let name = self.interner.resolve(*sym).to_string();
            if name.starts_with('_') {
                continue;
            }
            match binding.kind {
                BindingKind::Immutable | BindingKind::Mutable if !module_level => {
                    findings.push((name, "W001", "unused variable", binding.declared_at));
                }
                BindingKind::Param => {
                    findings.push((name, "W003", "unused parameter", binding.declared_at));
                }
                BindingKind::Function => {
                    findings.push((name, "W002", "unused function", binding.declared_at));
                }
                _ => {}
            }
        }
        findings.sort_by_key(|(_, _, _, loc)| (loc.line, loc.column));
        for (name, code, what, loc) in findings {
            let message = format!("{} '{}'", what, name);
            let diag = Diagnostic::warning(code, message, &self.file, loc.line, loc.column)
                .with_hint(format!("prefix with an underscore to keep it: _{}", name));
            self.diags.push(diag);
        }
    }

    // -- statements ---------------------------------------------------------

    fn visit_block(&mut self, stmts: &[&Stmt<'_>], function_boundary: bool) {
        self.scopes.push(function_boundary);
        self.hoist(stmts);
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
        if let Some(frame) = self.scopes.pop() {
            self.report_unused(&frame, false);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt<'_>) {
        if stmt.kind.is_client_only() && self.ctx != Ctx::Client {
            self.error(
                "E302",
                "client declarations (state, computed, component) belong inside a client block"
                    .to_string(),
                stmt.loc,
            );
        }
        if stmt.kind.is_server_only() && self.ctx != Ctx::Server {
            self.error(
                "E303",
                "routes and server declarations belong inside a server block".to_string(),
                stmt.loc,
            );
        }

        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.visit_expr(e);
            }
            StmtKind::VarDecl { name, ty, value } => {
                let inferred = self.visit_expr(value);
                let declared = ty.map(|t| self.interner.resolve(t).to_string());
                if let (Some(expected), Some(actual)) = (declared.as_deref(), inferred.as_deref()) {
                    self.check_assignable(expected, actual, value.loc);
                }
                let final_ty = declared.or(inferred);
                self.define_value(*name, BindingKind::Mutable, final_ty, stmt.loc);
            }
            StmtKind::LetDecl { pattern, value } => {
                self.visit_expr(value);
                let mut names = Vec::new();
                pattern.bound_names(&mut names);
                for (name, loc) in names {
                    self.define_value(name, BindingKind::Immutable, None, loc);
                }
                self.visit_pattern_exprs(pattern);
            }
            StmtKind::Assign { targets, value } => {
                let inferred = self.visit_expr(value);
                for target in targets {
                    self.visit_assign_target(target, inferred.clone(), false, stmt.loc);
                }
            }
            StmtKind::CompoundAssign { target, value, .. } => {
                self.visit_expr(value);
                self.visit_assign_target(target, None, true, stmt.loc);
            }
            StmtKind::Func(f) => self.visit_func(f),
            StmtKind::Component(f) => self.visit_func(f),
            StmtKind::BackgroundDecl(f) => self.visit_func(f),
            StmtKind::TypeDecl { body, derives, .. } => {
                if let TypeBody::Struct(fields) = body {
                    for field in fields {
                        if let Some(default) = field.default {
                            self.visit_expr(default);
                        }
                    }
                }
                for derive in derives {
                    let derive_name = self.interner.resolve(*derive).to_string();
                    let known = matches!(derive_name.as_str(), "Eq" | "Show" | "JSON");
                    let bridged = self
                        .table
                        .traits
                        .get(&derive_name)
                        .map_or(false, |defaults| !defaults.is_empty());
                    if !known && !bridged {
                        self.warn(
                            "W_UNKNOWN_TRAIT",
                            format!(
                                "cannot derive '{}'; expected Eq, Show, JSON, or a trait with default methods",
                                derive_name
                            ),
                            stmt.loc,
                        );
                    }
                }
            }
            StmtKind::TypeAlias { .. } | StmtKind::Interface { .. } | StmtKind::Trait { .. } => {}
            StmtKind::Impl { methods, .. } => {
                for method in methods {
                    self.visit_func(method);
                }
            }
            StmtKind::Route(route) => {
                self.visit_expr(route.handler);
            }
            StmtKind::Return(value) => {
                if self.fn_async.is_empty() {
                    self.error("E301", "return outside of a function".to_string(), stmt.loc);
                }
                if let Some(v) = value {
                    self.visit_expr(v);
                }
            }
            StmtKind::If { branches, else_body } => {
                for (cond, body) in branches {
                    self.visit_expr(cond);
                    self.scopes.push(false);
                    self.apply_narrowing(cond, true);
                    self.hoist(body);
                    for s in body {
                        self.visit_stmt(s);
                    }
                    if let Some(frame) = self.scopes.pop() {
                        self.report_unused(&frame, false);
                    }
                }
                if let Some(body) = else_body {
                    self.scopes.push(false);
                    if branches.len() == 1 {
                        self.apply_narrowing(branches[0].0, false);
                    }
                    self.hoist(body);
                    for s in body {
                        self.visit_stmt(s);
                    }
                    if let Some(frame) = self.scopes.pop() {
                        self.report_unused(&frame, false);
                    }
                }
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(cond);
                self.loop_depth += 1;
                self.visit_block(body, false);
                self.loop_depth -= 1;
            }
            StmtKind::For { pattern, iterable, body } => {
                let iter_ty = self.visit_expr(iterable);
                self.loop_depth += 1;
                self.scopes.push(false);
                let elem_ty = iter_ty.as_deref().and_then(element_type);
                let mut names = Vec::new();
                pattern.bound_names(&mut names);
                for (name, loc) in names {
                    self.define_value(name, BindingKind::Immutable, elem_ty.clone(), loc);
                }
                self.hoist(body);
                for s in body {
                    self.visit_stmt(s);
                }
                if let Some(frame) = self.scopes.pop() {
                    self.report_unused(&frame, false);
                }
                self.loop_depth -= 1;
            }
            StmtKind::Break => {
                if self.loop_depth == 0 {
                    self.error("E203", "break outside of a loop".to_string(), stmt.loc);
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.error("E204", "continue outside of a loop".to_string(), stmt.loc);
                }
            }
            StmtKind::Guard { cond, else_body } => {
                self.visit_expr(cond);
                self.visit_block(else_body, false);
                // The guard holds for the rest of the enclosing scope.
                self.apply_narrowing(cond, true);
            }
            StmtKind::Defer(body) => self.visit_block(body, false),
            StmtKind::Import { .. } => {}
            StmtKind::ServerBlock { decls, .. } => self.visit_target_block(decls, Ctx::Server),
            StmtKind::ClientBlock { decls } => self.visit_target_block(decls, Ctx::Client),
            StmtKind::SharedBlock { decls } => self.visit_target_block(decls, Ctx::Shared),
            StmtKind::TestBlock { decls, .. } => self.visit_target_block(decls, Ctx::Test),
            StmtKind::SecurityBlock { .. } => {}
            StmtKind::Middleware { handler } | StmtKind::OnError { handler } => {
                self.visit_expr(handler);
            }
            StmtKind::WsDecl { config, .. } => self.visit_config(config),
            StmtKind::SseDecl { handler, .. } => {
                self.visit_expr(handler);
            }
            StmtKind::ScheduleDecl { handler, .. } => {
                self.visit_expr(handler);
            }
            StmtKind::DiscoverDecl { config, .. }
            | StmtKind::SessionDecl { config }
            | StmtKind::UploadDecl { config, .. }
            | StmtKind::CompressionDecl { config }
            | StmtKind::CacheDecl { config }
            | StmtKind::DbDecl { config }
            | StmtKind::TlsDecl { config }
            | StmtKind::StoreDecl { config, .. }
            | StmtKind::ModelDecl { config, .. } => self.visit_config(config),
            StmtKind::HealthDecl { .. }
            | StmtKind::StaticDecl { .. }
            | StmtKind::MaxBodyDecl { .. }
            | StmtKind::EnvDecl { .. } => {}
            StmtKind::StateDecl { name, value } => {
                let ty = self.visit_expr(value);
                self.define_value(*name, BindingKind::Mutable, ty, stmt.loc);
            }
            StmtKind::ComputedDecl { name, value } => {
                let ty = self.visit_expr(value);
                self.define_value(*name, BindingKind::Immutable, ty, stmt.loc);
            }
            StmtKind::EffectDecl { body } => self.visit_block(body, false),
        }
    }

    fn visit_target_block(&mut self, decls: &[&Stmt<'_>], ctx: Ctx) {
        let outer = self.ctx;
        self.ctx = ctx;
        self.scopes.push(false);
        self.hoist(decls);
        for stmt in decls {
            self.visit_stmt(stmt);
        }
        if let Some(frame) = self.scopes.pop() {
            // Target blocks are module surface; their variables feed the
            // generated output and stay exempt like other module-level names.
            self.report_unused(&frame, true);
        }
        self.ctx = outer;
    }

    fn visit_config(&mut self, config: &Config<'_>) {
        for (_, value) in config {
            self.visit_expr(value);
        }
    }

    fn visit_func(&mut self, f: &FuncDecl<'_>) {
        self.fn_async.push(f.is_async);
        self.scopes.push(true);
        for param in &f.params {
            if self.scopes.crosses_function_boundary(param.name) {
                self.warn(
                    "W101",
                    format!(
                        "parameter '{}' shadows a binding from an enclosing function",
                        self.interner.resolve(param.name)
                    ),
                    param.loc,
                );
            }
            let ty = param.ty.map(|t| self.interner.resolve(t).to_string());
            let binding = Binding::new(BindingKind::Param, param.loc).with_type(ty);
            if let Err(_prev) = self.scopes.define(param.name, binding) {
                self.error(
                    "E201",
                    format!("duplicate parameter '{}'", self.interner.resolve(param.name)),
                    param.loc,
                );
            }
            if let Some(default) = param.default {
                self.visit_expr(default);
            }
        }
        self.hoist(&f.body);
        for stmt in &f.body {
            self.visit_stmt(stmt);
        }
        if let Some(frame) = self.scopes.pop() {
            self.report_unused(&frame, false);
        }
        self.fn_async.pop();
    }

    fn define_value(&mut self, name: Symbol, kind: BindingKind, ty: Option<String>, loc: Loc) {
        if self.scopes.crosses_function_boundary(name) {
            self.warn(
                "W101",
                format!(
                    "'{}' shadows a binding from an enclosing function",
                    self.interner.resolve(name)
                ),
                loc,
            );
        }
        let binding = Binding::new(kind, loc).with_type(ty);
        if self.scopes.defined_in_current_frame(name) {
            self.error(
                "E201",
                format!("'{}' is already defined in this scope", self.interner.resolve(name)),
                loc,
            );
        } else {
            let _ = self.scopes.define(name, binding);
        }
    }

    fn visit_assign_target(
        &mut self,
        target: &Expr<'_>,
        value_ty: Option<String>,
        compound: bool,
        loc: Loc,
    ) {
        match &target.kind {
            ExprKind::Ident(name) => {
                let name_str = self.interner.resolve(*name).to_string();
                if self.scopes.defined_in_current_frame(*name) {
                    if compound {
                        let immutable = self
                            .scopes
                            .lookup(*name)
                            .map_or(false, |b| b.kind == BindingKind::Immutable);
                        if immutable {
                            self.emit_immutable_reassign(&name_str, loc);
                            return;
                        }
                    }
                    // Same-frame plain assignment rebinds.
                    if !compound {
                        let binding =
                            Binding::new(BindingKind::Immutable, loc).with_type(value_ty);
                        self.scopes.rebind(*name, binding);
                    } else if let Some(b) = self.scopes.lookup_mut(*name) {
                        b.used = true;
                    }
                } else if self.scopes.defined_in_outer_frame(*name) {
                    let binding_kind = self.scopes.lookup(*name).map(|b| b.kind);
                    match binding_kind {
                        Some(BindingKind::Immutable) => {
                            self.emit_immutable_reassign(&name_str, loc);
                        }
                        Some(_) => {
                            if let Some(b) = self.scopes.lookup_mut(*name) {
                                b.used = true;
                            }
                        }
                        None => {}
                    }
                } else if compound {
                    self.undefined_name(*name, target.loc);
                } else {
                    // First assignment creates an immutable binding.
                    self.define_value(*name, BindingKind::Immutable, value_ty, loc);
                }
            }
            ExprKind::Member { object, .. } => {
                self.visit_expr(object);
            }
            ExprKind::Index { object, index } => {
                self.visit_expr(object);
                self.visit_expr(index);
            }
            _ => {
                self.error("E201", "invalid assignment target".to_string(), target.loc);
            }
        }
    }

    fn emit_immutable_reassign(&mut self, name: &str, loc: Loc) {
        let diag = Diagnostic::error(
            "E202",
            format!("cannot reassign immutable binding '{}'", name),
            &self.file,
            loc.line,
            loc.column,
        )
        .with_hint("bindings created with '=' are immutable")
        .with_fix(
            format!("Declare '{}' as mutable with 'var'", name),
            format!("var {} = ...", name),
        );
        self.diags.push(diag);
    }

    fn undefined_name(&mut self, name: Symbol, loc: Loc) {
        let name_str = self.interner.resolve(name).to_string();
        if is_builtin(&name_str) {
            return;
        }
        let mut candidates: Vec<String> = self
            .scopes
            .visible_names(self.interner)
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        candidates.extend(builtin_names().map(|s| s.to_string()));
        let suggestion =
            suggest::find_similar(&name_str, candidates.iter().map(|s| s.as_str()), 2);
        let mut diag = Diagnostic::error(
            "E200",
            format!("'{}' is not defined", name_str),
            &self.file,
            loc.line,
            loc.column,
        )
        .with_length(name_str.chars().count() as u32);
        if let Some(similar) = suggestion {
            diag = diag
                .with_hint(format!("did you mean '{}'?", similar))
                .with_fix(format!("Replace with '{}'", similar), similar);
        }
        self.diags.push(diag);
    }

    // -- expressions --------------------------------------------------------

    fn visit_expr(&mut self, expr: &Expr<'_>) -> Option<String> {
        match &expr.kind {
            ExprKind::Int(_) => Some("Int".to_string()),
            ExprKind::Float(_) => Some("Float".to_string()),
            ExprKind::Str(parts) => {
                for part in parts {
                    if let StrPart::Expr(e) = part {
                        self.visit_expr(e);
                    }
                }
                Some("String".to_string())
            }
            ExprKind::RawStr(_) => Some("String".to_string()),
            ExprKind::Regex { .. } => Some("Regex".to_string()),
            ExprKind::Bool(_) => Some("Bool".to_string()),
            ExprKind::Nil => Some("Nil".to_string()),
            ExprKind::Ident(name) => {
                let name_str = self.interner.resolve(*name);
                if name_str == "_" {
                    return None;
                }
                if self.scopes.lookup(*name).is_some() {
                    let ty = self.scopes.effective_type(*name);
                    if let Some(binding) = self.scopes.lookup_mut(*name) {
                        if !binding.used {
                            binding.used = true;
                            binding.first_use_at = Some(expr.loc);
                        }
                    }
                    return ty;
                }
                self.undefined_name(*name, expr.loc);
                None
            }
            ExprKind::Unary { op, operand } => {
                let ty = self.visit_expr(operand);
                match op {
                    UnaryOp::Not => Some("Bool".to_string()),
                    UnaryOp::Neg => ty,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let lt = self.visit_expr(left);
                let rt = self.visit_expr(right);
                if op.is_comparison() {
                    return Some("Bool".to_string());
                }
                match (lt.as_deref(), rt.as_deref()) {
                    (Some("String"), _) | (_, Some("String")) if matches!(op, BinaryOp::Add | BinaryOp::Concat) => {
                        Some("String".to_string())
                    }
                    (Some("Int"), Some("Int")) => Some("Int".to_string()),
                    (Some("Float"), Some("Int"))
                    | (Some("Int"), Some("Float"))
                    | (Some("Float"), Some("Float")) => Some("Float".to_string()),
                    _ => None,
                }
            }
            ExprKind::Logical { op, left, right } => {
                self.visit_expr(left);
                let rt = self.visit_expr(right);
                match op {
                    LogicalOp::And | LogicalOp::Or => Some("Bool".to_string()),
                    LogicalOp::Coalesce => rt,
                }
            }
            ExprKind::ChainedCmp { first, rest } => {
                self.visit_expr(first);
                for (_, operand) in rest {
                    self.visit_expr(operand);
                }
                Some("Bool".to_string())
            }
            ExprKind::Member { object, .. } => {
                self.visit_expr(object);
                None
            }
            ExprKind::Index { object, index } => {
                let obj_ty = self.visit_expr(object);
                self.visit_expr(index);
                obj_ty.as_deref().and_then(element_type)
            }
            ExprKind::Slice { object, start, end, step } => {
                let obj_ty = self.visit_expr(object);
                for part in [start, end, step].into_iter().flatten() {
                    self.visit_expr(part);
                }
                obj_ty
            }
            ExprKind::Call { callee, args } => self.visit_call(callee, args),
            ExprKind::Pipe { value, target } => {
                self.visit_expr(value);
                match target {
                    PipeTarget::Call(call) => {
                        if let ExprKind::Call { callee, args } = &call.kind {
                            self.visit_expr(callee);
                            for arg in args {
                                self.visit_expr(arg.expr());
                            }
                        }
                    }
                    PipeTarget::Bare(e) => {
                        self.visit_expr(e);
                    }
                    PipeTarget::Method { args, .. } => {
                        for arg in args {
                            self.visit_expr(arg.expr());
                        }
                    }
                }
                None
            }
            ExprKind::Lambda { params, body, is_async } => {
                self.fn_async.push(*is_async);
                self.scopes.push(true);
                for param in params {
                    let ty = param.ty.map(|t| self.interner.resolve(t).to_string());
                    let _ = self
                        .scopes
                        .define(param.name, Binding::new(BindingKind::Param, param.loc).with_type(ty));
                    if let Some(default) = param.default {
                        self.visit_expr(default);
                    }
                }
                self.visit_expr(body);
                if let Some(frame) = self.scopes.pop() {
                    self.report_unused(&frame, false);
                }
                self.fn_async.pop();
                Some("Function".to_string())
            }
            ExprKind::Match { subject, arms } => {
                let subject_ty = self.visit_expr(subject);
                self.check_exhaustiveness(subject, subject_ty.as_deref(), arms, expr.loc);
                for arm in arms {
                    self.scopes.push(false);
                    let mut names = Vec::new();
                    arm.pattern.bound_names(&mut names);
                    for (name, loc) in names {
                        let _ = self
                            .scopes
                            .define(name, Binding::new(BindingKind::Immutable, loc));
                    }
                    if let Some(guard) = arm.guard {
                        self.visit_expr(guard);
                    }
                    self.visit_expr(arm.body);
                    if let Some(frame) = self.scopes.pop() {
                        self.report_unused(&frame, false);
                    }
                }
                None
            }
            ExprKind::If { branches, else_body } => {
                for branch in branches {
                    self.visit_expr(branch.cond);
                    self.scopes.push(false);
                    self.apply_narrowing(branch.cond, true);
                    self.visit_expr(branch.body);
                    self.scopes.pop();
                }
                if let Some(body) = else_body {
                    self.scopes.push(false);
                    if branches.len() == 1 {
                        self.apply_narrowing(branches[0].cond, false);
                    }
                    self.visit_expr(body);
                    self.scopes.pop();
                }
                None
            }
            ExprKind::Block(stmts) => {
                self.visit_block(stmts, false);
                None
            }
            ExprKind::Yield { value, .. } => {
                if let Some(v) = value {
                    self.visit_expr(v);
                }
                None
            }
            ExprKind::Await(operand) => {
                if !self.fn_async.last().copied().unwrap_or(false) {
                    self.error(
                        "E300",
                        "await is only allowed inside an async fn".to_string(),
                        expr.loc,
                    );
                }
                self.visit_expr(operand)
            }
            ExprKind::Propagate(operand) => {
                let ty = self.visit_expr(operand);
                ty.map(|t| without_nil(&t))
            }
            ExprKind::Array(items) => {
                let mut elem: Option<String> = None;
                for item in items {
                    let ty = match item {
                        ArrayItem::Item(e) => self.visit_expr(e),
                        ArrayItem::Spread(e) => {
                            self.visit_expr(e);
                            None
                        }
                    };
                    if elem.is_none() {
                        elem = ty;
                    }
                }
                elem.map(|t| format!("[{}]", t))
            }
            ExprKind::Object(entries) => {
                for entry in entries {
                    match entry {
                        ObjectEntry::Field { value, .. } => {
                            self.visit_expr(value);
                        }
                        ObjectEntry::Computed { key, value } => {
                            self.visit_expr(key);
                            self.visit_expr(value);
                        }
                        ObjectEntry::Spread(e) => {
                            self.visit_expr(e);
                        }
                    }
                }
                None
            }
            ExprKind::ListComp { element, clauses } => {
                self.scopes.push(false);
                self.visit_comp_clauses(clauses);
                let elem_ty = self.visit_expr(element);
                self.scopes.pop();
                elem_ty.map(|t| format!("[{}]", t))
            }
            ExprKind::DictComp { key, value, clauses } => {
                self.scopes.push(false);
                self.visit_comp_clauses(clauses);
                self.visit_expr(key);
                self.visit_expr(value);
                self.scopes.pop();
                None
            }
            ExprKind::Tuple(items) => {
                for item in items {
                    self.visit_expr(item);
                }
                None
            }
            ExprKind::Range { start, end, .. } => {
                self.visit_expr(start);
                self.visit_expr(end);
                Some("[Int]".to_string())
            }
            ExprKind::Jsx { attrs, children, .. } => {
                for attr in attrs {
                    match attr {
                        JsxAttr::Named { value, .. } => match value {
                            JsxAttrValue::Expr(e) => {
                                self.visit_expr(e);
                            }
                            JsxAttrValue::Template(parts) => {
                                for part in parts {
                                    if let StrPart::Expr(e) = part {
                                        self.visit_expr(e);
                                    }
                                }
                            }
                            JsxAttrValue::Str(_) | JsxAttrValue::Shorthand => {}
                        },
                        JsxAttr::Spread { expr, .. } => {
                            self.visit_expr(expr);
                        }
                    }
                }
                self.visit_jsx_children(children);
                Some("Element".to_string())
            }
            ExprKind::JsxFragment { children } => {
                self.visit_jsx_children(children);
                Some("Element".to_string())
            }
        }
    }

    fn visit_comp_clauses(&mut self, clauses: &[CompClause<'_>]) {
        for clause in clauses {
            match clause {
                CompClause::For { pattern, iterable } => {
                    let iter_ty = self.visit_expr(iterable);
                    let elem_ty = iter_ty.as_deref().and_then(element_type);
                    let mut names = Vec::new();
                    pattern.bound_names(&mut names);
                    for (name, loc) in names {
                        let mut binding = Binding::new(BindingKind::Immutable, loc);
                        binding.declared_type = elem_ty.clone();
                        binding.used = true;
                        let _ = self.scopes.define(name, binding);
                    }
                }
                CompClause::If(cond) => {
                    self.visit_expr(cond);
                }
            }
        }
    }

    fn visit_jsx_children(&mut self, children: &[JsxChild<'_>]) {
        for child in children {
            match child {
                JsxChild::Text(_) => {}
                JsxChild::Expr(e) | JsxChild::Element(e) => {
                    self.visit_expr(e);
                }
                JsxChild::For { pattern, iterable, key, body } => {
                    let iter_ty = self.visit_expr(iterable);
                    self.scopes.push(false);
                    let elem_ty = iter_ty.as_deref().and_then(element_type);
                    let mut names = Vec::new();
                    pattern.bound_names(&mut names);
                    for (name, loc) in names {
                        let mut binding = Binding::new(BindingKind::Immutable, loc);
                        binding.declared_type = elem_ty.clone();
                        binding.used = true;
                        let _ = self.scopes.define(name, binding);
                    }
                    if let Some(k) = key {
                        self.visit_expr(k);
                    }
                    self.visit_jsx_children(body);
                    self.scopes.pop();
                }
                JsxChild::If { branches, else_body } => {
                    for (cond, body) in branches {
                        self.visit_expr(cond);
                        self.visit_jsx_children(body);
                    }
                    if let Some(body) = else_body {
                        self.visit_jsx_children(body);
                    }
                }
            }
        }
    }

    fn visit_pattern_exprs(&mut self, pattern: &Pattern<'_>) {
        if let PatternKind::Object { entries, .. } = &pattern.kind {
            for entry in entries {
                if let Some(default) = entry.default {
                    self.visit_expr(default);
                }
                if let Some(nested) = entry.pattern {
                    self.visit_pattern_exprs(nested);
                }
            }
        }
    }

    fn visit_call(&mut self, callee: &Expr<'_>, args: &[CallArg<'_>]) -> Option<String> {
        let mut arg_types: Vec<Option<String>> = Vec::new();
        let mut has_spread = false;
        for arg in args {
            match arg {
                CallArg::Spread(e) => {
                    has_spread = true;
                    self.visit_expr(e);
                    arg_types.push(None);
                }
                CallArg::Positional(e) | CallArg::Named { value: e, .. } => {
                    arg_types.push(self.visit_expr(e));
                }
            }
        }

        if let ExprKind::Ident(name) = callee.kind {
            let name_str = self.interner.resolve(name).to_string();
            self.visit_expr(callee);

            if let Some(sig) = self.table.functions.get(&name_str).cloned() {
                if !has_spread {
                    let given = args.len();
                    if given < sig.required {
                        self.error(
                            "E210",
                            format!(
                                "'{}' needs at least {} argument(s), got {}",
                                name_str, sig.required, given
                            ),
                            callee.loc,
                        );
                    } else if !sig.has_rest && given > sig.total {
                        self.error(
                            "E211",
                            format!(
                                "'{}' accepts at most {} argument(s), got {}",
                                name_str, sig.total, given
                            ),
                            callee.loc,
                        );
                    }
                }
                return specialize_return(&sig, &arg_types);
            }

            if let Some((owner, variant)) = self
                .table
                .variant_owner(&name_str)
                .map(|(o, v)| (o.to_string(), v.clone()))
            {
                if !has_spread && args.len() != variant.arity {
                    self.error(
                        "E210",
                        format!(
                            "variant '{}' takes {} value(s), got {}",
                            name_str,
                            variant.arity,
                            args.len()
                        ),
                        callee.loc,
                    );
                }
                return Some(owner);
            }
            return None;
        }

        self.visit_expr(callee);
        None
    }

    fn check_assignable(&mut self, expected: &str, actual: &str, loc: Loc) {
        if is_narrowing(expected, actual) {
            self.warn(
                "W102",
                "implicit Float to Int narrowing loses precision".to_string(),
                loc,
            );
            return;
        }
        if !compatible(&self.table, expected, actual, self.options.strict) {
            self.warn(
                "W103",
                format!("expected '{}', found '{}'", expected, actual),
                loc,
            );
        }
    }

    // -- narrowing ----------------------------------------------------------

    /// Applies flow-sensitive type refinement for the supported condition
    /// shapes: nil comparisons, `type_of(x) == "T"`, and `result.isOk()`.
    fn apply_narrowing(&mut self, cond: &Expr<'_>, positive: bool) {
        match &cond.kind {
            ExprKind::Binary { op: BinaryOp::Eq, left, right } => {
                self.narrow_nil_cmp(left, right, positive);
                self.narrow_type_of(left, right, positive);
            }
            ExprKind::Binary { op: BinaryOp::NotEq, left, right } => {
                self.narrow_nil_cmp(left, right, !positive);
                self.narrow_type_of(left, right, false);
            }
            ExprKind::Logical { op: LogicalOp::And, left, right } if positive => {
                self.apply_narrowing(left, true);
                self.apply_narrowing(right, true);
            }
            ExprKind::Call { callee, .. } => {
                if let ExprKind::Member { object, property, .. } = &callee.kind {
                    let prop = self.interner.resolve(*property);
                    if prop == "isOk" || prop == "isErr" {
                        if let ExprKind::Ident(name) = object.kind {
                            let current = self.scopes.effective_type(name);
                            if let Some(current) = current {
                                let resolved = self.table.resolve_alias(&current).to_string();
                                if let Some((ok_ty, err_ty)) = result_sides(&resolved) {
                                    let wants_ok = (prop == "isOk") == positive;
                                    let narrowed = if wants_ok { ok_ty } else { err_ty };
                                    self.scopes.narrow(name, narrowed);
                                }
                            }
                        }
                    }
                }
            }
            ExprKind::Unary { op: UnaryOp::Not, operand } => {
                self.apply_narrowing(operand, !positive);
            }
            _ => {}
        }
    }

    fn narrow_nil_cmp(&mut self, left: &Expr<'_>, right: &Expr<'_>, eq_nil: bool) {
        let (ident, other) = match (&left.kind, &right.kind) {
            (ExprKind::Ident(name), _) => (*name, right),
            (_, ExprKind::Ident(name)) => (*name, left),
            _ => return,
        };
        if !matches!(other.kind, ExprKind::Nil) {
            return;
        }
        if eq_nil {
            self.scopes.narrow(ident, "Nil".to_string());
        } else if let Some(current) = self.scopes.effective_type(ident) {
            self.scopes.narrow(ident, without_nil(&current));
        }
    }

    fn narrow_type_of(&mut self, left: &Expr<'_>, right: &Expr<'_>, positive: bool) {
        if !positive {
            return;
        }
        let (call, lit) = match (&left.kind, &right.kind) {
            (ExprKind::Call { .. }, ExprKind::Str(_)) => (left, right),
            (ExprKind::Str(_), ExprKind::Call { .. }) => (right, left),
            _ => return,
        };
        let ExprKind::Call { callee, args } = &call.kind else { return };
        let ExprKind::Ident(fn_name) = callee.kind else { return };
        if self.interner.resolve(fn_name) != "type_of" {
            return;
        }
        let Some(CallArg::Positional(subject)) = args.first() else { return };
        let ExprKind::Ident(subject_name) = subject.kind else { return };
        let ExprKind::Str(parts) = &lit.kind else { return };
        if let [StrPart::Text(ty)] = parts.as_slice() {
            let ty = self.interner.resolve(*ty).to_string();
            self.scopes.narrow(subject_name, ty);
        }
    }

    // -- exhaustiveness -----------------------------------------------------

    fn check_exhaustiveness(
        &mut self,
        _subject: &Expr<'_>,
        subject_ty: Option<&str>,
        arms: &[MatchArm<'_>],
        loc: Loc,
    ) {
        let has_catch_all = arms
            .iter()
            .any(|arm| arm.pattern.is_irrefutable() && arm.guard.is_none());
        if has_catch_all {
            return;
        }
        let Some(subject_ty) = subject_ty else { return };
        let resolved = self.table.resolve_alias(subject_ty).to_string();

        if resolved == "Bool" {
            let mut covered = [false, false];
            for arm in arms {
                if arm.guard.is_some() {
                    continue;
                }
                if let PatternKind::Literal(lit) = &arm.pattern.kind {
                    if let ExprKind::Bool(b) = lit.kind {
                        covered[b as usize] = true;
                    }
                }
            }
            for (value, is_covered) in [(false, covered[0]), (true, covered[1])] {
                if !is_covered {
                    self.warn_non_exhaustive(&format!("{}", value), loc);
                }
            }
            return;
        }

        let Some(variants) = self.table.enums.get(&resolved).cloned() else { return };
        let mut covered: Vec<&str> = Vec::new();
        for arm in arms {
            if arm.guard.is_some() {
                continue;
            }
            if let PatternKind::Variant { name, .. } = &arm.pattern.kind {
                covered.push(self.interner.resolve(*name));
            }
        }
        let missing: Vec<String> = variants
            .iter()
            .filter(|v| !covered.contains(&v.name.as_str()))
            .map(|v| v.name.clone())
            .collect();
        for name in missing {
            self.warn_non_exhaustive(&name, loc);
        }
    }

    fn warn_non_exhaustive(&mut self, missing: &str, loc: Loc) {
        let diag = Diagnostic::warning(
            "W200",
            format!("match does not cover '{}'", missing),
            &self.file,
            loc.line,
            loc.column,
        )
        .with_hint("add the missing arm or a wildcard: _ => ...");
        self.diags.push(diag);
    }
}

/// Element type of `[T]` text.
fn element_type(ty: &str) -> Option<String> {
    let trimmed = ty.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        return Some(trimmed[1..trimmed.len() - 1].trim().to_string());
    }
    None
}

/// Ok/Err component types of `Result<T, E>` text.
fn result_sides(ty: &str) -> Option<(String, String)> {
    let inner = ty.strip_prefix("Result<")?.strip_suffix('>')?;
    let members: Vec<&str> = {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        for (i, c) in inner.char_indices() {
            match c {
                '<' | '[' | '(' => depth += 1,
                '>' | ']' | ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    parts.push(inner[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            }
        }
        parts.push(inner[start..].trim());
        parts
    };
    if members.len() == 2 {
        Some((members[0].to_string(), members[1].to_string()))
    } else {
        None
    }
}
