use super::Parser;
use crate::arena::Arena;
use crate::arena_ctx::AstContext;
use crate::ast::*;
use crate::intern::Interner;
use crate::lexer::Lexer;

macro_rules! with_program {
    ($src:expr, $program:ident, $interner:ident, $body:block) => {
        let mut $interner = Interner::new();
        let (tokens, _) = Lexer::new($src, &mut $interner).tokenize().expect("lex ok");
        let file = $interner.intern("test.tova");
        let exprs = Arena::new();
        let stmts = Arena::new();
        let pats = Arena::new();
        let ctx = AstContext::new(&exprs, &stmts, &pats);
        let parser = Parser::new(tokens, file, &mut $interner, ctx);
        let $program = parser.parse().expect("parse ok");
        $body
    };
}

macro_rules! with_failure {
    ($src:expr, $failure:ident, $body:block) => {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new($src, &mut interner).tokenize().expect("lex ok");
        let file = interner.intern("test.tova");
        let exprs = Arena::new();
        let stmts = Arena::new();
        let pats = Arena::new();
        let ctx = AstContext::new(&exprs, &stmts, &pats);
        let parser = Parser::new(tokens, file, &mut interner, ctx);
        let $failure = parser.parse().expect_err("parse should fail");
        $body
    };
}

fn first_expr<'p, 'a>(program: &'p Program<'a>) -> &'a Expr<'a> {
    match program.decls[0].kind {
        StmtKind::Expr(e) => e,
        StmtKind::Assign { value, .. } => value,
        StmtKind::VarDecl { value, .. } => value,
        _ => panic!("first declaration is not an expression"),
    }
}

#[test]
fn parses_simple_function() {
    with_program!("fn add(a, b) { return a + b }", program, interner, {
        assert_eq!(program.decls.len(), 1);
        match &program.decls[0].kind {
            StmtKind::Func(f) => {
                assert_eq!(interner.resolve(f.name), "add");
                assert_eq!(f.params.len(), 2);
                assert!(!f.is_async);
                assert!(!f.is_generator);
            }
            other => panic!("expected function, got {:?}", other),
        }
    });
}

#[test]
fn async_and_pub_flags_are_recorded() {
    with_program!("pub async fn fetch_all() { return 1 }", program, _interner, {
        match &program.decls[0].kind {
            StmtKind::Func(f) => {
                assert!(f.is_async);
                assert!(f.is_pub);
            }
            other => panic!("expected function, got {:?}", other),
        }
    });
}

#[test]
fn yield_marks_generator() {
    with_program!("fn nums() { yield 1\n yield 2 }", program, _interner, {
        match &program.decls[0].kind {
            StmtKind::Func(f) => assert!(f.is_generator),
            other => panic!("expected function, got {:?}", other),
        }
    });
}

#[test]
fn docstring_attaches_to_following_function() {
    with_program!("/// Doubles the input\nfn double(x) { return x * 2 }", program, interner, {
        match &program.decls[0].kind {
            StmtKind::Func(f) => {
                assert_eq!(interner.resolve(f.doc.expect("doc present")), "Doubles the input");
            }
            other => panic!("expected function, got {:?}", other),
        }
    });
}

#[test]
fn precedence_multiplication_binds_tighter_than_addition() {
    with_program!("x = 1 + 2 * 3", program, _interner, {
        let value = first_expr(&program);
        match &value.kind {
            ExprKind::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected addition at the top, got {:?}", other),
        }
    });
}

#[test]
fn power_is_right_associative() {
    with_program!("x = 2 ** 3 ** 2", program, _interner, {
        let value = first_expr(&program);
        match &value.kind {
            ExprKind::Binary { op: BinaryOp::Pow, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Pow, .. }));
            }
            other => panic!("expected power at the top, got {:?}", other),
        }
    });
}

#[test]
fn range_binds_below_additive() {
    with_program!("x = a .. b + 1", program, _interner, {
        let value = first_expr(&program);
        match &value.kind {
            ExprKind::Range { end, inclusive, .. } => {
                assert!(!inclusive);
                assert!(matches!(end.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("expected range at the top, got {:?}", other),
        }
    });
}

#[test]
fn chained_comparison_folds_into_one_node() {
    with_program!("x = a < b < c", program, _interner, {
        let value = first_expr(&program);
        match &value.kind {
            ExprKind::ChainedCmp { rest, .. } => assert_eq!(rest.len(), 2),
            other => panic!("expected chained comparison, got {:?}", other),
        }
    });
}

#[test]
fn single_comparison_stays_binary() {
    with_program!("x = a < b", program, _interner, {
        assert!(matches!(
            first_expr(&program).kind,
            ExprKind::Binary { op: BinaryOp::Lt, .. }
        ));
    });
}

#[test]
fn pipe_with_call_target() {
    with_program!("x = data |> transform(1)", program, _interner, {
        match &first_expr(&program).kind {
            ExprKind::Pipe { target: PipeTarget::Call(_), .. } => {}
            other => panic!("expected pipe call, got {:?}", other),
        }
    });
}

#[test]
fn pipe_with_method_target() {
    with_program!("x = name |> .trim()", program, interner, {
        match &first_expr(&program).kind {
            ExprKind::Pipe { target: PipeTarget::Method { name, .. }, .. } => {
                assert_eq!(interner.resolve(*name), "trim");
            }
            other => panic!("expected method pipe, got {:?}", other),
        }
    });
}

#[test]
fn pipe_with_bare_target() {
    with_program!("x = value |> print", program, _interner, {
        assert!(matches!(
            first_expr(&program).kind,
            ExprKind::Pipe { target: PipeTarget::Bare(_), .. }
        ));
    });
}

#[test]
fn implicit_it_wraps_argument_subtree() {
    with_program!("x = items.map(it * 2)", program, interner, {
        match &first_expr(&program).kind {
            ExprKind::Call { args, .. } => match &args[0] {
                CallArg::Positional(e) => match &e.kind {
                    ExprKind::Lambda { params, .. } => {
                        assert_eq!(params.len(), 1);
                        assert_eq!(interner.resolve(params[0].name), "it");
                    }
                    other => panic!("expected lambda wrap, got {:?}", other),
                },
                other => panic!("expected positional arg, got {:?}", other),
            },
            other => panic!("expected call, got {:?}", other),
        }
    });
}

#[test]
fn bare_it_argument_is_not_wrapped() {
    with_program!("x = items.find(it)", program, _interner, {
        match &first_expr(&program).kind {
            ExprKind::Call { args, .. } => {
                assert!(matches!(args[0], CallArg::Positional(e) if matches!(e.kind, ExprKind::Ident(_))));
            }
            other => panic!("expected call, got {:?}", other),
        }
    });
}

#[test]
fn explicit_lambda_argument_is_not_rewrapped() {
    with_program!("x = items.map((v) => it + v)", program, _interner, {
        match &first_expr(&program).kind {
            ExprKind::Call { args, .. } => match &args[0] {
                CallArg::Positional(e) => match &e.kind {
                    ExprKind::Lambda { params, .. } => assert_eq!(params.len(), 1),
                    other => panic!("expected the original lambda, got {:?}", other),
                },
                other => panic!("unexpected arg {:?}", other),
            },
            other => panic!("expected call, got {:?}", other),
        }
    });
}

#[test]
fn named_and_spread_call_arguments() {
    with_program!("x = request(url, timeout: 30, ...extras)", program, interner, {
        match &first_expr(&program).kind {
            ExprKind::Call { args, .. } => {
                assert!(matches!(args[0], CallArg::Positional(_)));
                match &args[1] {
                    CallArg::Named { name, .. } => assert_eq!(interner.resolve(*name), "timeout"),
                    other => panic!("expected named arg, got {:?}", other),
                }
                assert!(matches!(args[2], CallArg::Spread(_)));
            }
            other => panic!("expected call, got {:?}", other),
        }
    });
}

#[test]
fn match_with_guard_and_wildcard() {
    with_program!("x = match val { n if n > 0 => n, _ => 0 }", program, _interner, {
        match &first_expr(&program).kind {
            ExprKind::Match { arms, .. } => {
                assert_eq!(arms.len(), 2);
                assert!(arms[0].guard.is_some());
                assert!(matches!(arms[0].pattern.kind, PatternKind::Binding(_)));
                assert!(matches!(arms[1].pattern.kind, PatternKind::Wildcard));
            }
            other => panic!("expected match, got {:?}", other),
        }
    });
}

#[test]
fn variant_and_string_concat_patterns() {
    with_program!(
        r#"x = match v { Some(inner) => inner, "id:" ++ rest => rest, _ => nil }"#,
        program,
        interner,
        {
            match &first_expr(&program).kind {
                ExprKind::Match { arms, .. } => {
                    match &arms[0].pattern.kind {
                        PatternKind::Variant { name, args } => {
                            assert_eq!(interner.resolve(*name), "Some");
                            assert_eq!(args.len(), 1);
                        }
                        other => panic!("expected variant pattern, got {:?}", other),
                    }
                    match &arms[1].pattern.kind {
                        PatternKind::StringConcat { prefix, rest } => {
                            assert_eq!(interner.resolve(*prefix), "id:");
                            assert_eq!(interner.resolve(*rest), "rest");
                        }
                        other => panic!("expected concat pattern, got {:?}", other),
                    }
                }
                other => panic!("expected match, got {:?}", other),
            }
        }
    );
}

#[test]
fn destructuring_let_with_alias_and_default() {
    with_program!("let {x, y: vertical = 0} = point", program, interner, {
        match &program.decls[0].kind {
            StmtKind::LetDecl { pattern, .. } => match &pattern.kind {
                PatternKind::Object { entries, .. } => {
                    assert_eq!(entries.len(), 2);
                    assert_eq!(interner.resolve(entries[0].key), "x");
                    assert!(entries[0].pattern.is_none());
                    assert!(entries[1].pattern.is_some());
                    assert!(entries[1].default.is_some());
                }
                other => panic!("expected object pattern, got {:?}", other),
            },
            other => panic!("expected let, got {:?}", other),
        }
    });
}

#[test]
fn tuple_assignment() {
    with_program!("a, b = 1, 2", program, _interner, {
        match &program.decls[0].kind {
            StmtKind::Assign { targets, value } => {
                assert_eq!(targets.len(), 2);
                assert!(matches!(value.kind, ExprKind::Tuple(_)));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    });
}

#[test]
fn type_declaration_with_derives() {
    with_program!("type Point { x: Float, y: Float } derive [Eq, JSON]", program, interner, {
        match &program.decls[0].kind {
            StmtKind::TypeDecl { name, body, derives, .. } => {
                assert_eq!(interner.resolve(*name), "Point");
                assert!(matches!(body, TypeBody::Struct(fields) if fields.len() == 2));
                assert_eq!(derives.len(), 2);
            }
            other => panic!("expected type declaration, got {:?}", other),
        }
    });
}

#[test]
fn enum_declaration_with_payloads() {
    with_program!("type Shape = Circle(Float) | Rect(Float, Float) | Empty", program, _interner, {
        match &program.decls[0].kind {
            StmtKind::TypeDecl { body: TypeBody::Enum(variants), .. } => {
                assert_eq!(variants.len(), 3);
                assert_eq!(variants[0].fields.len(), 1);
                assert_eq!(variants[1].fields.len(), 2);
                assert!(variants[2].fields.is_empty());
            }
            other => panic!("expected enum declaration, got {:?}", other),
        }
    });
}

#[test]
fn primitive_union_becomes_alias() {
    with_program!("type Id = Int | String", program, interner, {
        match &program.decls[0].kind {
            StmtKind::TypeAlias { target, .. } => {
                assert_eq!(interner.resolve(*target), "Int | String");
            }
            other => panic!("expected type alias, got {:?}", other),
        }
    });
}

#[test]
fn server_block_with_route_and_db() {
    let src = r#"
server {
    db { driver: "sqlite", path: "app.db" }
    route GET "/api/users" => list_users
}
"#;
    with_program!(src, program, interner, {
        match &program.decls[0].kind {
            StmtKind::ServerBlock { decls, .. } => {
                assert!(matches!(decls[0].kind, StmtKind::DbDecl { .. }));
                match &decls[1].kind {
                    StmtKind::Route(route) => {
                        assert_eq!(interner.resolve(route.method), "GET");
                        assert_eq!(interner.resolve(route.path), "/api/users");
                    }
                    other => panic!("expected route, got {:?}", other),
                }
            }
            other => panic!("expected server block, got {:?}", other),
        }
    });
}

#[test]
fn decorated_route_parses_all_decorators() {
    let src = r#"
server {
    route POST "/api/orders" with auth, role("admin"), rate_limit(50, 30), timeout(5000) => create_order
}
"#;
    with_program!(src, program, _interner, {
        match &program.decls[0].kind {
            StmtKind::ServerBlock { decls, .. } => match &decls[0].kind {
                StmtKind::Route(route) => {
                    assert_eq!(route.decorators.len(), 4);
                    assert!(matches!(route.decorators[0], RouteDecorator::Auth));
                    assert!(matches!(route.decorators[1], RouteDecorator::Role(_)));
                    assert!(matches!(
                        route.decorators[2],
                        RouteDecorator::RateLimit { max: 50, window: 30 }
                    ));
                    assert!(matches!(route.decorators[3], RouteDecorator::Timeout(5000)));
                }
                other => panic!("expected route, got {:?}", other),
            },
            other => panic!("expected server block, got {:?}", other),
        }
    });
}

#[test]
fn db_outside_server_block_is_an_identifier() {
    with_program!("x = db", program, _interner, {
        assert!(matches!(first_expr(&program).kind, ExprKind::Ident(_)));
    });
}

#[test]
fn security_block_collects_entries() {
    let src = r#"
security {
    auth jwt { secret: env("JWT_SECRET"), storage: "cookie" }
    role admin
    protect "/admin/**" { require: role("admin") }
    cors { origins: ["https://app.example.com"] }
}
"#;
    with_program!(src, program, interner, {
        match &program.decls[0].kind {
            StmtKind::SecurityBlock { entries } => {
                assert_eq!(entries.len(), 4);
                match &entries[0] {
                    SecurityEntry::Auth { auth_type, config, .. } => {
                        assert_eq!(interner.resolve(*auth_type), "jwt");
                        assert_eq!(config.len(), 2);
                    }
                    other => panic!("expected auth entry, got {:?}", other),
                }
                assert!(matches!(entries[1], SecurityEntry::Role { .. }));
                assert!(matches!(entries[2], SecurityEntry::Protect { .. }));
                assert!(matches!(entries[3], SecurityEntry::Cors { .. }));
            }
            other => panic!("expected security block, got {:?}", other),
        }
    });
}

#[test]
fn client_block_with_component_state_and_jsx() {
    let src = r#"
client {
    component Counter(start) {
        state count = start
        <div class="counter">
            <button on:click={() => count += 1}>Increment</button>
            {count}
        </div>
    }
}
"#;
    with_program!(src, program, interner, {
        match &program.decls[0].kind {
            StmtKind::ClientBlock { decls } => match &decls[0].kind {
                StmtKind::Component(f) => {
                    assert_eq!(interner.resolve(f.name), "Counter");
                    assert!(matches!(f.body[0].kind, StmtKind::StateDecl { .. }));
                    match &f.body[1].kind {
                        StmtKind::Expr(e) => {
                            assert!(matches!(e.kind, ExprKind::Jsx { .. }));
                        }
                        other => panic!("expected JSX statement, got {:?}", other),
                    }
                }
                other => panic!("expected component, got {:?}", other),
            },
            other => panic!("expected client block, got {:?}", other),
        }
    });
}

#[test]
fn jsx_for_and_if_children() {
    let src = r#"
client {
    component TodoList(items) {
        <ul>
            for item in items key={item.id} {
                <li>{item.title}</li>
            }
            if items.length == 0 {
                <li>empty</li>
            }
        </ul>
    }
}
"#;
    with_program!(src, program, _interner, {
        match &program.decls[0].kind {
            StmtKind::ClientBlock { decls } => match &decls[0].kind {
                StmtKind::Component(f) => match &f.body[0].kind {
                    StmtKind::Expr(e) => match &e.kind {
                        ExprKind::Jsx { children, .. } => {
                            assert!(matches!(children[0], JsxChild::For { key: Some(_), .. }));
                            assert!(matches!(children[1], JsxChild::If { .. }));
                        }
                        other => panic!("expected JSX, got {:?}", other),
                    },
                    other => panic!("expected expression, got {:?}", other),
                },
                other => panic!("expected component, got {:?}", other),
            },
            other => panic!("expected client block, got {:?}", other),
        }
    });
}

#[test]
fn mismatched_jsx_closing_tag_is_fatal() {
    let src = r#"
client {
    component Broken() {
        <div>text</span>
    }
}
"#;
    with_failure!(src, failure, {
        assert!(failure
            .errors
            .iter()
            .any(|e| e.message.contains("mismatched closing tag")));
    });
}

#[test]
fn recovery_preserves_parsed_declarations() {
    let src = "fn good() { return 1 }\nfn bad( { }\nfn also_good() { return 2 }";
    with_failure!(src, failure, {
        assert!(!failure.errors.is_empty());
        assert!(failure.partial.decls.len() >= 1);
    });
}

#[test]
fn partial_ast_lower_bound_holds() {
    // Three good declarations and one bad one: the synchronizer may skip at
    // most one declaration per recorded error.
    let src = "fn a() { return 1 }\nfn b() { return 2 }\nfn broken( {\nfn c() { return 3 }";
    with_failure!(src, failure, {
        let total = 4i64;
        let errors = failure.errors.len() as i64;
        let kept = failure.partial.decls.len() as i64;
        assert!(kept >= total - 2 * errors, "kept {} of {} with {} errors", kept, total, errors);
    });
}

#[test]
fn error_cap_stops_at_fifty() {
    let mut src = String::new();
    for _ in 0..80 {
        src.push_str("fn ) {\n");
    }
    with_failure!(&src, failure, {
        assert!(failure.errors.len() <= 50);
    });
}

#[test]
fn list_comprehension_parses() {
    with_program!("x = [n * 2 for n in nums if n > 0]", program, _interner, {
        match &first_expr(&program).kind {
            ExprKind::ListComp { clauses, .. } => assert_eq!(clauses.len(), 2),
            other => panic!("expected comprehension, got {:?}", other),
        }
    });
}

#[test]
fn slice_with_step_parses() {
    with_program!("x = items[1:10:2]", program, _interner, {
        match &first_expr(&program).kind {
            ExprKind::Slice { start, end, step, .. } => {
                assert!(start.is_some());
                assert!(end.is_some());
                assert!(step.is_some());
            }
            other => panic!("expected slice, got {:?}", other),
        }
    });
}

#[test]
fn optional_chain_and_propagate() {
    with_program!("x = user?.profile?.name", program, _interner, {
        assert!(matches!(
            first_expr(&program).kind,
            ExprKind::Member { optional: true, .. }
        ));
    });
    with_program!("fn f() { return fetch_user()? }", program, _interner, {
        match &program.decls[0].kind {
            StmtKind::Func(f) => match &f.body[0].kind {
                StmtKind::Return(Some(e)) => {
                    assert!(matches!(e.kind, ExprKind::Propagate(_)));
                }
                other => panic!("expected return, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    });
}

#[test]
fn template_string_parses_parts() {
    with_program!(r#"x = "total: {count} items""#, program, _interner, {
        match &first_expr(&program).kind {
            ExprKind::Str(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(parts[1], StrPart::Expr(_)));
            }
            other => panic!("expected template string, got {:?}", other),
        }
    });
}

#[test]
fn guard_statement_parses() {
    with_program!("fn f(x) { guard x > 0 else { return 0 }\n return x }", program, _interner, {
        match &program.decls[0].kind {
            StmtKind::Func(f) => assert!(matches!(f.body[0].kind, StmtKind::Guard { .. })),
            other => panic!("expected function, got {:?}", other),
        }
    });
}

#[test]
fn duplicate_for_pattern_names_are_rejected() {
    with_failure!("fn f(pairs) { for (a, a) in pairs { } }", failure, {
        assert!(failure.errors.iter().any(|e| e.message.contains("duplicate binding")));
    });
}

#[test]
fn module_level_break_parses_for_analyzer() {
    with_program!("break", program, _interner, {
        assert!(matches!(program.decls[0].kind, StmtKind::Break));
    });
}

#[test]
fn every_node_line_within_source_bounds() {
    let src = "fn f() {\n  x = 1\n  if x > 0 {\n    print(x)\n  }\n}\n";
    let line_count = src.lines().count() as u32;
    with_program!(src, program, _interner, {
        fn check_stmt(stmt: &Stmt<'_>, max: u32) {
            assert!(stmt.loc.line >= 1 && stmt.loc.line <= max);
        }
        for decl in &program.decls {
            check_stmt(decl, line_count);
        }
    });
}

#[test]
fn trait_with_default_body_parses() {
    let src = "trait Greet { fn greeting(self) -> String { return \"hi\" } fn name(self) -> String }";
    with_program!(src, program, _interner, {
        match &program.decls[0].kind {
            StmtKind::Trait { methods, .. } => {
                assert_eq!(methods.len(), 2);
                assert!(methods[0].default_body.is_some());
                assert!(methods[1].default_body.is_none());
            }
            other => panic!("expected trait, got {:?}", other),
        }
    });
}

#[test]
fn impl_trait_for_type_parses() {
    let src = "impl Greet for User { fn name(self) { return self.name } }";
    with_program!(src, program, interner, {
        match &program.decls[0].kind {
            StmtKind::Impl { trait_name, type_name, methods } => {
                assert_eq!(interner.resolve(trait_name.expect("trait name")), "Greet");
                assert_eq!(interner.resolve(*type_name), "User");
                assert_eq!(methods.len(), 1);
            }
            other => panic!("expected impl, got {:?}", other),
        }
    });
}

#[test]
fn multi_server_blocks_parse_with_names() {
    let src = r#"
server api {
    route GET "/a" => h
}
server admin {
    route GET "/b" => h
}
"#;
    with_program!(src, program, interner, {
        match (&program.decls[0].kind, &program.decls[1].kind) {
            (
                StmtKind::ServerBlock { name: Some(a), .. },
                StmtKind::ServerBlock { name: Some(b), .. },
            ) => {
                assert_eq!(interner.resolve(*a), "api");
                assert_eq!(interner.resolve(*b), "admin");
            }
            other => panic!("expected two named server blocks, got {:?}", other),
        }
    });
}

#[test]
fn type_annotations_render_canonical_text() {
    with_program!("fn f(a: Int, b: [String], c: Result<Int, String>, d: Int?) { return a }", program, interner, {
        match &program.decls[0].kind {
            StmtKind::Func(f) => {
                let texts: Vec<&str> = f
                    .params
                    .iter()
                    .map(|p| interner.resolve(p.ty.expect("typed param")))
                    .collect();
                assert_eq!(texts, vec!["Int", "[String]", "Result<Int, String>", "Int | Nil"]);
            }
            other => panic!("expected function, got {:?}", other),
        }
    });
}
