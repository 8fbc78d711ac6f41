use super::{glob_to_regex, Features};
use crate::analysis::security::{config_get, literal_bool, literal_int};
use crate::codegen::emitter::Emitter;
use crate::codegen::expr::{gen_expr, js_string};
use crate::codegen::stmt::gen_func;
use crate::codegen::GenCtx;

/// WebSocket support: client and room registries, broadcast helpers, and
/// the `Bun.serve` websocket config with optional auth on upgrade.
pub fn emit_ws(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    let (_, config) = f.ws.as_ref().expect("ws config present");
    em.blank();
    em.template(
        r#"
const __wsClients = new Set();
const __wsRooms = new Map();

function broadcast(message) {
  const payload = typeof message === "string" ? message : JSON.stringify(message);
  for (const ws of __wsClients) ws.send(payload);
}

function join(ws, room) {
  if (!__wsRooms.has(room)) __wsRooms.set(room, new Set());
  __wsRooms.get(room).add(ws);
  ws.data.rooms.add(room);
}

function leave(ws, room) {
  __wsRooms.get(room)?.delete(ws);
  ws.data.rooms.delete(room);
}

function broadcast_to(room, message) {
  const members = __wsRooms.get(room);
  if (!members) return;
  const payload = typeof message === "string" ? message : JSON.stringify(message);
  for (const ws of members) ws.send(payload);
}
"#,
    );

    let on_open = config_get(config, ctx.interner, "on_open").map(|e| gen_expr(ctx, e));
    let on_message = config_get(config, ctx.interner, "on_message").map(|e| gen_expr(ctx, e));
    let on_close = config_get(config, ctx.interner, "on_close").map(|e| gen_expr(ctx, e));
    let needs_auth = config_get(config, ctx.interner, "auth")
        .and_then(|e| literal_bool(e))
        .unwrap_or(false);

    em.line("const __wsConfig = {");
    em.indent();
    em.line("async open(ws) {");
    em.indent();
    if needs_auth && f.has_auth() {
        em.template(
            r#"
const user = await __authenticate(ws.data.upgradeReq ?? new Request("http://ws", { headers: {} }));
if (!user && ws.data.user == null) {
  ws.close(4401, "authentication required");
  return;
}
ws.data.user = user ?? ws.data.user;
"#,
        );
    }
    em.line("__wsClients.add(ws);");
    if let Some(handler) = &on_open {
        em.line(&format!("await ({})(ws);", handler));
    }
    em.dedent();
    em.line("},");
    em.line("async message(ws, message) {");
    em.indent();
    if let Some(handler) = &on_message {
        em.line(&format!("await ({})(ws, message);", handler));
    }
    em.dedent();
    em.line("},");
    em.line("close(ws) {");
    em.indent();
    em.line("__wsClients.delete(ws);");
    em.line("for (const room of ws.data.rooms) __wsRooms.get(room)?.delete(ws);");
    if let Some(handler) = &on_close {
        em.line(&format!("({})(ws);", handler));
    }
    em.dedent();
    em.line("},");
    em.dedent();
    em.line("};");
}

/// Each `sse "/path" fn(send, close)` registers a GET route producing a
/// `text/event-stream` response plus a channel registry entry.
pub fn emit_sse(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    em.line("const __sseChannels = new Map();");
    for (path, handler) in &f.sse {
        let handler_js = gen_expr(ctx, handler);
        let regex = glob_to_regex(path);
        em.line(&format!(
            "__sseChannels.set({}, {});",
            js_string(path),
            handler_js
        ));
        em.line(&format!(
            "__addRoute(\"GET\", {}, new RegExp({}), () => sse(__sseChannels.get({})));",
            js_string(path),
            js_string(&regex),
            js_string(path)
        ));
    }
}

/// Background jobs: a queue with one retry, drained LIFO on shutdown.
pub fn emit_background(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    for func in &f.backgrounds {
        gen_func(ctx, em, func, func.loc);
    }
    let handlers = f
        .backgrounds
        .iter()
        .map(|func| ctx.interner.resolve(func.name).to_string())
        .collect::<Vec<_>>()
        .join(", ");
    em.line(&format!("const __jobHandlers = {{ {} }};", handlers));
    em.template(
        r#"
const __jobQueue = [];
let __jobsRunning = false;

function spawn_job(name, ...args) {
  if (!__jobHandlers[name]) {
    throw new Error(`unknown background job: ${name}`);
  }
  __jobQueue.push({ name, args, attempts: 0 });
  queueMicrotask(__runJobs);
}

async function __runJobs() {
  if (__jobsRunning) return;
  __jobsRunning = true;
  while (__jobQueue.length > 0) {
    const job = __jobQueue.shift();
    try {
      await __jobHandlers[job.name](...job.args);
    } catch (err) {
      job.attempts += 1;
      if (job.attempts < 2) {
        __jobQueue.push(job);
      } else {
        __log("error", "background job failed", { job: job.name, error: String(err) });
      }
    }
  }
  __jobsRunning = false;
}

async function __drainJobs() {
  while (__jobQueue.length > 0) {
    const job = __jobQueue.pop();
    try {
      await __jobHandlers[job.name](...job.args);
    } catch (err) {
      __log("error", "job dropped during drain", { job: job.name, error: String(err) });
    }
  }
}
"#,
    );
}

/// `schedule "pattern" fn`: `Ns/Nm/Nh/Nd` shorthands become a bare
/// setInterval; anything else parses as 5-field cron with lists, ranges,
/// and steps, evaluated once a minute.
pub fn emit_schedule(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    em.template(
        r#"
function __cronField(spec, min, max) {
  const values = new Set();
  for (const part of spec.split(",")) {
    const [range, stepText] = part.split("/");
    const step = stepText ? Number(stepText) : 1;
    let lo = min;
    let hi = max;
    if (range !== "*") {
      const [a, b] = range.split("-");
      lo = Number(a);
      hi = b != null ? Number(b) : stepText ? max : lo;
    }
    for (let v = lo; v <= hi; v += step) values.add(v);
  }
  return values;
}

function __parseCron(pattern) {
  const fields = pattern.trim().split(/\s+/);
  if (fields.length !== 5) throw new Error(`invalid cron pattern: ${pattern}`);
  const [minute, hour, dom, month, dow] = fields;
  const sets = [
    __cronField(minute, 0, 59),
    __cronField(hour, 0, 23),
    __cronField(dom, 1, 31),
    __cronField(month, 1, 12),
    __cronField(dow, 0, 6),
  ];
  return (date) =>
    sets[0].has(date.getMinutes()) &&
    sets[1].has(date.getHours()) &&
    sets[2].has(date.getDate()) &&
    sets[3].has(date.getMonth() + 1) &&
    sets[4].has(date.getDay());
}

function __schedule(pattern, task) {
  const simple = /^(\d+)([smhd])$/.exec(pattern);
  if (simple) {
    const unit = { s: 1000, m: 60000, h: 3600000, d: 86400000 }[simple[2]];
    setInterval(task, Number(simple[1]) * unit);
    return;
  }
  const matches = __parseCron(pattern);
  let lastMinute = -1;
  setInterval(() => {
    const now = new Date();
    const minuteStamp = Math.floor(now.getTime() / 60000);
    if (minuteStamp === lastMinute) return;
    lastMinute = minuteStamp;
    if (matches(now)) task();
  }, 15000);
}
"#,
    );
    for (pattern, handler) in &f.schedules {
        let handler_js = gen_expr(ctx, handler);
        em.line(&format!(
            "__schedule({}, {});",
            js_string(pattern),
            handler_js
        ));
    }
}

/// `discover "peer" at "url"`: an RPC proxy per peer behind a three-state
/// circuit breaker with exponential backoff and request-ID propagation.
pub fn emit_discover(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    em.template(
        r#"
const __peers = {};

function __makeBreaker(name, opts = {}) {
  return {
    name,
    state: "CLOSED",
    failures: 0,
    openedAt: 0,
    threshold: opts.threshold ?? 5,
    timeout: opts.timeout ?? 5000,
    resetTimeout: opts.reset_timeout ?? 30000,
  };
}

async function __callPeer(peer, fn, args) {
  const breaker = peer.breaker;
  if (breaker.state === "OPEN") {
    if (Date.now() - breaker.openedAt < breaker.resetTimeout) {
      throw new Error(`circuit open for ${breaker.name}`);
    }
    breaker.state = "HALF_OPEN";
  }
  let lastError = null;
  for (let attempt = 0; attempt < 3; attempt += 1) {
    const controller = new AbortController();
    const timer = setTimeout(() => controller.abort(), breaker.timeout);
    try {
      const res = await fetch(`${peer.url}/rpc/${fn}`, {
        method: "POST",
        headers: {
          "Content-Type": "application/json",
          "X-Request-Id": __requestId(),
        },
        body: JSON.stringify({ __args: args }),
        signal: controller.signal,
      });
      clearTimeout(timer);
      if (!res.ok) throw new Error(`peer ${breaker.name} returned ${res.status}`);
      breaker.state = "CLOSED";
      breaker.failures = 0;
      return await res.json();
    } catch (err) {
      clearTimeout(timer);
      lastError = err;
      breaker.failures += 1;
      if (breaker.state === "HALF_OPEN" || breaker.failures >= breaker.threshold) {
        breaker.state = "OPEN";
        breaker.openedAt = Date.now();
        throw err;
      }
      await new Promise((resolve) => setTimeout(resolve, 2 ** attempt * 100));
    }
  }
  throw lastError ?? new Error(`peer ${breaker.name} unreachable`);
}
"#,
    );
    for (peer, url, config) in &f.discovers {
        let threshold = config_get(config, ctx.interner, "threshold")
            .and_then(literal_int)
            .unwrap_or(5);
        let timeout = config_get(config, ctx.interner, "timeout")
            .and_then(literal_int)
            .unwrap_or(5000);
        let reset = config_get(config, ctx.interner, "reset_timeout")
            .and_then(literal_int)
            .unwrap_or(30_000);
        let env_name = format!("PORT_{}", peer.to_uppercase().replace('-', "_"));
        em.line(&format!(
            "__peers[{peer}] = {{ url: process.env.{env} ? `http://localhost:${{process.env.{env}}}` : {url}, breaker: __makeBreaker({peer}, {{ threshold: {t}, timeout: {to}, reset_timeout: {r} }}) }};",
            peer = js_string(peer),
            env = env_name,
            url = js_string(url),
            t = threshold,
            to = timeout,
            r = reset
        ));
        em.line(&format!(
            "const {} = new Proxy({{}}, {{ get: (_, fn) => (...args) => __callPeer(__peers[{}], fn, args) }});",
            peer.replace('-', "_"),
            js_string(peer)
        ));
    }
}
