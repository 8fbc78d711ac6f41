use super::Features;
use crate::analysis::security::{config_get, literal_bool, literal_str};
use crate::codegen::emitter::Emitter;
use crate::codegen::expr::js_string;
use crate::codegen::GenCtx;
use std::collections::HashMap;

pub fn emit_db(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    em.blank();
    match f.db_driver.as_deref() {
        Some("postgres") => emit_postgres(em),
        Some("mysql") => emit_mysql(em),
        _ => emit_sqlite(ctx, em, f),
    }
}

fn emit_sqlite(ctx: &mut GenCtx<'_>, em: &mut Emitter, f: &Features<'_, '_>) {
    let config = f.db_config.expect("db config present");
    let path = config_get(config, ctx.interner, "path")
        .and_then(|e| literal_str(e, ctx.interner))
        .unwrap_or_else(|| "app.db".to_string());
    let wal = config_get(config, ctx.interner, "wal")
        .and_then(|e| literal_bool(e))
        .unwrap_or(true);
    em.line(&format!("const __db = new Database({});", js_string(&path)));
    if wal {
        em.line("__db.exec(\"PRAGMA journal_mode=WAL;\");");
    }
    em.line("__db.exec(\"PRAGMA foreign_keys=ON;\");");
    em.template(
        r#"
function query(sql, params = []) {
  return __db.query(sql).all(...params);
}

function run(sql, params = []) {
  return __db.query(sql).run(...params);
}

function get(sql, params = []) {
  return __db.query(sql).get(...params);
}

function exec(sql) {
  __db.exec(sql);
}

function transaction(fn) {
  return __db.transaction(fn)();
}

__db.exec(`CREATE TABLE IF NOT EXISTS __migrations (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  applied_at TEXT NOT NULL
)`);

function migrate(name, sql) {
  const done = get("SELECT 1 AS ok FROM __migrations WHERE name = ?", [name]);
  if (done) return false;
  transaction(() => {
    __db.exec(sql);
    run("INSERT INTO __migrations (name, applied_at) VALUES (?, ?)", [
      name,
      new Date().toISOString(),
    ]);
  });
  __log("info", "migration applied", { name });
  return true;
}
"#,
    );
}

fn emit_postgres(em: &mut Emitter) {
    em.template(
        r#"
const __sql = postgres(process.env.DATABASE_URL ?? "postgres://localhost/app");

async function query(sqlText, params = []) {
  return __sql.unsafe(sqlText, params);
}

async function run(sqlText, params = []) {
  const rows = await __sql.unsafe(sqlText, params);
  return { changes: rows.count ?? rows.length ?? 0, rows };
}

async function get(sqlText, params = []) {
  const rows = await __sql.unsafe(sqlText, params);
  return rows[0] ?? null;
}

async function exec(sqlText) {
  await __sql.unsafe(sqlText);
}

async function transaction(fn) {
  return __sql.begin(fn);
}

await exec(`CREATE TABLE IF NOT EXISTS __migrations (
  id SERIAL PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
)`);

async function migrate(name, sqlText) {
  const done = await get("SELECT 1 AS ok FROM __migrations WHERE name = $1", [name]);
  if (done) return false;
  await transaction(async (tx) => {
    await tx.unsafe(sqlText);
    await tx.unsafe("INSERT INTO __migrations (name) VALUES ($1)", [name]);
  });
  __log("info", "migration applied", { name });
  return true;
}
"#,
    );
}

fn emit_mysql(em: &mut Emitter) {
    em.template(
        r#"
const __pool = mysql.createPool(process.env.DATABASE_URL ?? "mysql://localhost/app");

async function query(sqlText, params = []) {
  const [rows] = await __pool.query(sqlText, params);
  return rows;
}

async function run(sqlText, params = []) {
  const [result] = await __pool.query(sqlText, params);
  return result;
}

async function get(sqlText, params = []) {
  const [rows] = await __pool.query(sqlText, params);
  return rows[0] ?? null;
}

async function exec(sqlText) {
  await __pool.query(sqlText);
}

async function transaction(fn) {
  const conn = await __pool.getConnection();
  try {
    await conn.beginTransaction();
    const result = await fn(conn);
    await conn.commit();
    return result;
  } catch (err) {
    await conn.rollback();
    throw err;
  } finally {
    conn.release();
  }
}

await exec(`CREATE TABLE IF NOT EXISTS __migrations (
  id INT AUTO_INCREMENT PRIMARY KEY,
  name VARCHAR(255) NOT NULL UNIQUE,
  applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)`);

async function migrate(name, sqlText) {
  const done = await get("SELECT 1 AS ok FROM __migrations WHERE name = ?", [name]);
  if (done) return false;
  await transaction(async (conn) => {
    await conn.query(sqlText);
    await conn.query("INSERT INTO __migrations (name) VALUES (?)", [name]);
  });
  __log("info", "migration applied", { name });
  return true;
}
"#,
    );
}

/// ORM surface for `model T`: a column whitelist enforced before any
/// dynamic SQL, CRUD, relation accessors, and optional timestamps.
pub fn emit_model(
    ctx: &mut GenCtx<'_>,
    em: &mut Emitter,
    f: &Features<'_, '_>,
    type_name: &str,
    config: &crate::ast::Config<'_>,
    type_fields: &HashMap<String, Vec<(String, String)>>,
) {
    let interner = ctx.interner;
    let table = table_name(type_name);
    let timestamps = config_get(config, interner, "timestamps")
        .and_then(|e| literal_bool(e))
        .unwrap_or(false);
    let belongs_to = config_get(config, interner, "belongs_to")
        .and_then(|e| literal_str(e, interner));
    let has_many = config_get(config, interner, "has_many")
        .and_then(|e| literal_str(e, interner));
    let postgres = f.db_driver.as_deref() == Some("postgres");
    let is_async = if postgres || f.db_driver.as_deref() == Some("mysql") {
        "async "
    } else {
        ""
    };
    let awaits = if is_async.is_empty() { "" } else { "await " };

    let mut cols: Vec<String> = type_fields
        .get(type_name)
        .map(|fields| fields.iter().map(|(name, _)| name.clone()).collect())
        .unwrap_or_else(|| vec!["id".to_string()]);
    if let Some(parent) = &belongs_to {
        let fk = format!("{}_id", table_name(parent).trim_end_matches('s'));
        if !cols.contains(&fk) {
            cols.push(fk);
        }
    }
    if timestamps {
        for col in ["created_at", "updated_at"] {
            if !cols.iter().any(|c| c == col) {
                cols.push(col.to_string());
            }
        }
    }
    let col_list = cols
        .iter()
        .map(|c| js_string(c))
        .collect::<Vec<_>>()
        .join(", ");
    em.blank();

    em.line(&format!("const {}Model = {{", type_name));
    em.indent();
    em.line(&format!("table: {},", js_string(&table)));
    em.line(&format!("__validCols: [{}],", col_list));
    em.template(
        r#"
__assertCols(keys) {
  for (const key of keys) {
    if (!this.__validCols.includes(key)) {
      throw new Error(`Invalid column: ${key}`);
    }
  }
},
"#,
    );
    let eq = |i: usize| -> String {
        if postgres {
            format!("${}", i)
        } else {
            "?".to_string()
        }
    };

    em.line(&format!(
        "{}find(id) {{ return {}get(`SELECT * FROM {} WHERE id = {}`, [id]); }},",
        is_async, awaits, table, eq(1)
    ));
    em.line(&format!(
        "{}all() {{ return {}query(`SELECT * FROM {}`); }},",
        is_async, awaits, table
    ));
    em.template(&format!(
        r#"
{asyncness}where(conditions) {{
  const keys = Object.keys(conditions);
  this.__assertCols(keys);
  const clause = keys.map((key, i) => `${{key}} = {placeholder}`).join(" AND ");
  return {awaits}query(`SELECT * FROM {table} WHERE ${{clause}}`, Object.values(conditions));
}},
"#,
        asyncness = is_async,
        awaits = awaits,
        table = table,
        placeholder = if postgres { "$${i + 1}" } else { "?" },
    ));

    // create
    em.line(&format!("{}create(data) {{", is_async));
    em.indent();
    if timestamps {
        em.line("data = { ...data, created_at: new Date().toISOString(), updated_at: new Date().toISOString() };");
    }
    em.line("const keys = Object.keys(data);");
    em.line("this.__assertCols(keys);");
    if postgres {
        em.line("const placeholders = keys.map((_, i) => `$${i + 1}`).join(\", \");");
        em.line(&format!(
            "const rows = {}query(`INSERT INTO {} (${{keys.join(\", \")}}) VALUES (${{placeholders}}) RETURNING *`, Object.values(data));",
            awaits, table
        ));
        em.line("return rows[0];");
    } else {
        em.line("const placeholders = keys.map(() => \"?\").join(\", \");");
        em.line(&format!(
            "const info = {}run(`INSERT INTO {} (${{keys.join(\", \")}}) VALUES (${{placeholders}})`, Object.values(data));",
            awaits, table
        ));
        em.line("return { id: info.lastInsertRowid ?? info.insertId ?? null, ...data };");
    }
    em.dedent();
    em.line("},");

    // update
    em.line(&format!("{}update(id, data) {{", is_async));
    em.indent();
    if timestamps {
        em.line("data = { ...data, updated_at: new Date().toISOString() };");
    }
    em.line("const keys = Object.keys(data);");
    em.line("this.__assertCols(keys);");
    if postgres {
        em.line("const sets = keys.map((key, i) => `${key} = $${i + 1}`).join(\", \");");
        em.line(&format!(
            "return {}run(`UPDATE {} SET ${{sets}} WHERE id = $${{keys.length + 1}}`, [...Object.values(data), id]);",
            awaits, table
        ));
    } else {
        em.line("const sets = keys.map((key) => `${key} = ?`).join(\", \");");
        em.line(&format!(
            "return {}run(`UPDATE {} SET ${{sets}} WHERE id = ?`, [...Object.values(data), id]);",
            awaits, table
        ));
    }
    em.dedent();
    em.line("},");

    em.line(&format!(
        "{}delete(id) {{ return {}run(`DELETE FROM {} WHERE id = {}`, [id]); }},",
        is_async, awaits, table, eq(1)
    ));

    // count
    em.line(&format!("{}count(conditions = {{}}) {{", is_async));
    em.indent();
    em.line("const keys = Object.keys(conditions);");
    em.line("this.__assertCols(keys);");
    if postgres {
        em.line("const clause = keys.length ? ` WHERE ${keys.map((key, i) => `${key} = $${i + 1}`).join(\" AND \")}` : \"\";");
    } else {
        em.line("const clause = keys.length ? ` WHERE ${keys.map((key) => `${key} = ?`).join(\" AND \")}` : \"\";");
    }
    em.line(&format!(
        "const row = {}get(`SELECT COUNT(*) AS n FROM {}${{clause}}`, Object.values(conditions));",
        awaits, table
    ));
    em.line("return Number(row?.n ?? 0);");
    em.dedent();
    em.line("},");

    if let Some(parent) = &belongs_to {
        let parent_table = table_name(parent);
        let fk = format!("{}_id", parent_table.trim_end_matches('s'));
        em.line(&format!(
            "{}{}(row) {{ return {}get(`SELECT * FROM {} WHERE id = {}`, [row.{}]); }},",
            is_async,
            parent.to_lowercase(),
            awaits,
            parent_table,
            eq(1),
            fk
        ));
    }
    if let Some(children) = &has_many {
        let child_table = children.to_lowercase();
        let fk = format!("{}_id", table.trim_end_matches('s'));
        em.line(&format!(
            "{}{}(row) {{ return {}query(`SELECT * FROM {} WHERE {} = {}`, [row.id]); }},",
            is_async, child_table, awaits, child_table, fk, eq(1)
        ));
    }

    em.dedent();
    em.line("};");
}

fn table_name(type_name: &str) -> String {
    let lower = type_name.to_lowercase();
    if lower.ends_with('s') {
        lower
    } else {
        format!("{}s", lower)
    }
}
