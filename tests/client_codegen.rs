//! Client-target generation: components, signal rewriting, JSX lowering,
//! and the auth-aware RPC layer.

mod common;

use common::{assert_contains, build, client_js};

const COUNTER: &str = r#"
client {
    component Counter(start) {
        state count = start
        <div class="counter">
            <button on:click={() => count += 1}>bump</button>
            <span>{count}</span>
        </div>
    }
}
"#;

#[test]
fn component_compiles_to_element_tree() {
    let js = client_js(COUNTER);
    assert_contains(&js, "function Counter(");
    assert_contains(&js, "tova_el(\"div\"");
    assert_contains(&js, "tova_el(\"button\"");
    assert_contains(&js, "\"on:click\"");
}

#[test]
fn state_becomes_signal_pair_with_rewrites() {
    let js = client_js(COUNTER);
    assert_contains(&js, "const [count, setCount] = signal(start);");
    assert_contains(&js, "setCount(count() + 1)");
    assert_contains(&js, "count()");
}

#[test]
fn computed_becomes_thunk() {
    let source = r#"
client {
    component Stats() {
        state total = 0
        computed double = total * 2
        <span>{double}</span>
    }
}
"#;
    let js = client_js(source);
    assert_contains(&js, "const double = () => ((total() * 2));");
    assert_contains(&js, "double()");
}

#[test]
fn jsx_for_maps_and_wraps_multiple_children_in_fragment() {
    let source = r#"
client {
    component TodoList(items) {
        <ul>
            for item in items {
                <li>{item.title}</li>
                <li>spacer</li>
            }
        </ul>
    }
}
"#;
    let js = client_js(source);
    assert_contains(&js, ".map((item) =>");
    assert_contains(&js, "tova_fragment(");
}

#[test]
fn jsx_for_with_key_attaches_key() {
    let source = r#"
client {
    component TodoList(items) {
        <ul>
            for item in items key={item.id} {
                <li>{item.title}</li>
            }
        </ul>
    }
}
"#;
    let js = client_js(source);
    assert_contains(&js, "__el.key = item.id");
}

#[test]
fn jsx_conditional_children_become_ternaries() {
    let source = r#"
client {
    component Gate(show) {
        <div>
            if show {
                <span>yes</span>
            } else {
                <span>no</span>
            }
        </div>
    }
}
"#;
    let js = client_js(source);
    assert_contains(&js, "show ?");
    assert_contains(&js, ": tova_el(\"span\"");
}

#[test]
fn bootstrap_mounts_on_domcontentloaded_with_single_listeners() {
    let js = client_js(COUNTER);
    assert_contains(&js, "DOMContentLoaded");
    assert_contains(&js, "mount(__root, Counter)");
    assert_contains(&js, "document.addEventListener(\"click\"");
    assert_contains(&js, "popstate");
}

#[test]
fn shared_code_is_embedded_in_client_output() {
    let source = r#"
shared {
    fn format_name(user) { return user.name }
}
client {
    component Profile(user) {
        <span>{format_name(user)}</span>
    }
}
"#;
    let js = client_js(source);
    assert_contains(&js, "function format_name(user)");
}

const AUTH_CLIENT: &str = r#"
security {
    auth jwt { secret: env("S") }
    rate_limit { max: 10, window: 60 }
    role admin
}
client {
    component App() {
        <div>hello</div>
    }
}
"#;

#[test]
fn auth_client_gets_token_helpers_and_interceptor() {
    let js = client_js(AUTH_CLIENT);
    assert_contains(&js, "function getAuthToken()");
    assert_contains(&js, "function setAuthToken(");
    assert_contains(&js, "clearAuthToken");
    assert_contains(&js, "Authorization");
    assert_contains(&js, "function can(");
}

#[test]
fn cookie_mode_drops_localstorage_and_sends_credentials() {
    let source = r#"
security {
    auth jwt { secret: env("S"), storage: "cookie" }
    rate_limit { max: 10, window: 60 }
}
client {
    component App() {
        <div>hello</div>
    }
}
"#;
    let js = client_js(source);
    assert_contains(&js, "credentials: \"include\"");
    assert_contains(&js, "/rpc/__logout");
    assert!(
        !js.contains("localStorage.setItem"),
        "cookie transport must not touch localStorage:\n{js}"
    );
}

#[test]
fn rpc_posts_args_envelope() {
    let js = client_js(COUNTER);
    assert_contains(&js, "async function rpc(");
    assert_contains(&js, "JSON.stringify({ __args: args })");
    assert_contains(&js, "/rpc/${name}");
}

#[test]
fn client_and_server_outputs_are_both_emitted() {
    let source = r#"
server {
    route GET "/api/ping" => fn(req) { return respond(200, nil) }
}
client {
    component App() {
        <div>ping</div>
    }
}
"#;
    let compilation = build(source);
    assert!(compilation.output.server_text().is_some());
    assert!(compilation.output.client.is_some());
    assert!(compilation.output.multi_block);
}
