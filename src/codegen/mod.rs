pub mod client;
mod derive;
mod emitter;
mod expr;
pub mod server;
mod stmt;

pub use emitter::{Emitter, Mapping};
pub use expr::{gen_expr, js_string};
pub use stmt::{gen_body_stmts, gen_stmt};

use crate::ast::*;
use crate::intern::{Interner, Symbol};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct GenOptions {
    /// Force ES-module output even without imports or pub declarations.
    pub module: bool,
}

/// Everything one compilation produces.
#[derive(Debug, Default)]
pub struct CompileOutput {
    pub shared: String,
    /// Single unnamed server, when exactly one server block exists.
    pub server: Option<String>,
    /// Named servers, in declaration order.
    pub servers: IndexMap<String, String>,
    pub client: Option<String>,
    pub test: Option<String>,
    pub source_map: Vec<Mapping>,
    pub openapi: Option<serde_json::Value>,
    pub is_module: bool,
    pub multi_block: bool,
}

impl CompileOutput {
    /// The single server output, or the first named one.
    pub fn server_text(&self) -> Option<&str> {
        self.server
            .as_deref()
            .or_else(|| self.servers.values().next().map(|s| s.as_str()))
    }
}

/// Shared generation state threaded through the emitters.
pub struct GenCtx<'int> {
    pub interner: &'int Interner,
    pub in_client: bool,
    pub allow_export: bool,
    pub client_state: HashSet<Symbol>,
    pub trait_defaults: HashMap<String, Vec<String>>,
    pub pre: Vec<Vec<String>>,
    declared: Vec<HashSet<Symbol>>,
    tmp: u32,
}

impl<'int> GenCtx<'int> {
    pub fn new(interner: &'int Interner) -> Self {
        GenCtx {
            interner,
            in_client: false,
            allow_export: false,
            client_state: HashSet::new(),
            trait_defaults: HashMap::new(),
            pre: Vec::new(),
            declared: vec![HashSet::new()],
            tmp: 0,
        }
    }

    pub fn fresh_tmp(&mut self) -> String {
        let n = self.tmp;
        self.tmp += 1;
        format!("__tmp{}", n)
    }

    pub fn push_pre(&mut self, line: String) {
        if let Some(frame) = self.pre.last_mut() {
            frame.push(line);
        }
    }

    pub fn push_scope(&mut self, params: &[Param<'_>]) {
        let mut frame = HashSet::new();
        for p in params {
            frame.insert(p.name);
        }
        self.declared.push(frame);
    }

    pub fn pop_scope(&mut self) {
        self.declared.pop();
    }

    pub fn declare(&mut self, name: Symbol) {
        if let Some(frame) = self.declared.last_mut() {
            frame.insert(name);
        }
    }

    pub fn is_declared(&self, name: Symbol) -> bool {
        self.declared.iter().any(|frame| frame.contains(&name))
    }
}

/// AST to JavaScript. Classifies top-level declarations into target buckets
/// and hands each bucket to its generator; shared code lands in every
/// output.
pub struct CodeGenerator<'p, 'a, 'int> {
    program: &'p Program<'a>,
    interner: &'int Interner,
    options: GenOptions,
}

impl<'p, 'a, 'int> CodeGenerator<'p, 'a, 'int> {
    pub fn new(program: &'p Program<'a>, interner: &'int Interner, options: GenOptions) -> Self {
        CodeGenerator { program, interner, options }
    }

    pub fn generate(&self) -> CompileOutput {
        let mut shared_decls: Vec<&'a Stmt<'a>> = Vec::new();
        let mut servers: Vec<(Option<Symbol>, Vec<&'a Stmt<'a>>)> = Vec::new();
        let mut client_decls: Vec<&'a Stmt<'a>> = Vec::new();
        let mut security: Vec<&'a SecurityEntry<'a>> = Vec::new();
        let mut tests: Vec<(Option<Symbol>, Vec<&'a Stmt<'a>>)> = Vec::new();
        let mut multi_block = false;

        for decl in &self.program.decls {
            match &decl.kind {
                StmtKind::SharedBlock { decls } => {
                    multi_block = true;
                    shared_decls.extend(decls.iter().copied());
                }
                StmtKind::ServerBlock { name, decls } => {
                    multi_block = true;
                    servers.push((*name, decls.clone()));
                }
                StmtKind::ClientBlock { decls } => {
                    multi_block = true;
                    client_decls.extend(decls.iter().copied());
                }
                StmtKind::SecurityBlock { entries } => {
                    multi_block = true;
                    security.extend(entries.iter());
                }
                StmtKind::TestBlock { name, decls } => {
                    multi_block = true;
                    tests.push((*name, decls.clone()));
                }
                _ => shared_decls.push(*decl),
            }
        }

        let is_module = self.options.module || program_is_module(&shared_decls);
        let trait_defaults = collect_trait_defaults(self.interner, &self.program.decls);
        let type_fields = collect_type_fields(self.interner, &self.program.decls);

        // Shared bucket.
        let mut ctx = GenCtx::new(self.interner);
        ctx.allow_export = is_module;
        ctx.trait_defaults = trait_defaults.clone();
        let mut em = Emitter::new();
        if !shared_decls.is_empty() {
            em.line("// shared");
        }
        for stmt in &shared_decls {
            gen_stmt(&mut ctx, &mut em, stmt);
        }
        let (shared_js, shared_mappings) = em.finish();

        let mut output = CompileOutput {
            shared: shared_js.clone(),
            is_module,
            multi_block,
            source_map: shared_mappings,
            ..CompileOutput::default()
        };

        // Server bucket(s).
        let has_tests = !tests.is_empty();
        for (name, decls) in &servers {
            let gen = server::ServerGen::new(
                self.interner,
                &shared_js,
                decls,
                &security,
                trait_defaults.clone(),
                has_tests,
            )
            .with_type_fields(type_fields.clone());
            let (server_js, mappings, openapi) = gen.generate();
            if output.openapi.is_none() {
                output.openapi = openapi;
            }
            match name {
                Some(sym) if servers.len() > 1 => {
                    output
                        .servers
                        .insert(self.interner.resolve(*sym).to_string(), server_js);
                }
                _ => {
                    output.source_map = mappings;
                    output.server = Some(server_js);
                }
            }
        }
        if output.server.is_none() && output.servers.len() == 1 {
            // A single named server still reads as the primary output.
            let only = output.servers.values().next().cloned();
            output.server = only;
        }

        // Client bucket.
        if !client_decls.is_empty() {
            let client_js = client::generate(
                self.interner,
                &shared_js,
                &client_decls,
                &security,
                trait_defaults,
            );
            output.client = Some(client_js);
        }

        // Test bucket.
        if has_tests {
            output.test = Some(self.gen_tests(&tests));
        }

        log::debug!(
            "generated outputs for {}: shared={}B server={} client={} test={}",
            self.interner.resolve(self.program.file),
            output.shared.len(),
            output.server.is_some() || !output.servers.is_empty(),
            output.client.is_some(),
            output.test.is_some()
        );
        output
    }

    fn gen_tests(&self, tests: &[(Option<Symbol>, Vec<&'a Stmt<'a>>)]) -> String {
        let mut ctx = GenCtx::new(self.interner);
        let mut em = Emitter::new();
        em.line("import { test, expect } from \"bun:test\";");
        em.line("import { __handleRequest } from \"./server.js\";");
        em.blank();
        for (i, (name, decls)) in tests.iter().enumerate() {
            let title = match name {
                Some(sym) => self.interner.resolve(*sym).to_string(),
                None => format!("test {}", i + 1),
            };
            em.line(&format!("test({}, async () => {{", js_string(&title)));
            em.indent();
            ctx.push_scope(&[]);
            for stmt in decls {
                gen_stmt(&mut ctx, &mut em, stmt);
            }
            ctx.pop_scope();
            em.dedent();
            em.line("});");
            em.blank();
        }
        let (out, _) = em.finish();
        out
    }
}

fn program_is_module(decls: &[&Stmt<'_>]) -> bool {
    decls.iter().any(|d| match &d.kind {
        StmtKind::Import { .. } => true,
        StmtKind::Func(f) => f.is_pub,
        StmtKind::TypeDecl { is_pub, .. } => *is_pub,
        _ => false,
    })
}

/// Field name/type pairs per declared struct type; the model emitter builds
/// column whitelists from these.
fn collect_type_fields(
    interner: &Interner,
    decls: &[&Stmt<'_>],
) -> HashMap<String, Vec<(String, String)>> {
    let mut map = HashMap::new();
    for decl in decls {
        match &decl.kind {
            StmtKind::TypeDecl { name, body: TypeBody::Struct(fields), .. } => {
                let entries: Vec<(String, String)> = fields
                    .iter()
                    .map(|f| {
                        (
                            interner.resolve(f.name).to_string(),
                            interner.resolve(f.ty).to_string(),
                        )
                    })
                    .collect();
                map.insert(interner.resolve(*name).to_string(), entries);
            }
            StmtKind::SharedBlock { decls } | StmtKind::ServerBlock { decls, .. } => {
                map.extend(collect_type_fields(interner, decls));
            }
            _ => {}
        }
    }
    map
}

fn collect_trait_defaults(
    interner: &Interner,
    decls: &[&Stmt<'_>],
) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    for decl in decls {
        match &decl.kind {
            StmtKind::Trait { name, methods, .. } => {
                let defaults: Vec<String> = methods
                    .iter()
                    .filter(|m| m.default_body.is_some())
                    .map(|m| interner.resolve(m.name).to_string())
                    .collect();
                map.insert(interner.resolve(*name).to_string(), defaults);
            }
            StmtKind::SharedBlock { decls } | StmtKind::ServerBlock { decls, .. } => {
                let nested = collect_trait_defaults(interner, decls);
                map.extend(nested);
            }
            _ => {}
        }
    }
    map
}
