use crate::auth::AuthSession;
use crate::model::Document;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

const DOCUMENT_KEY: &str = "roster";
const SESSION_KEY: &str = "session";

/// Opens (or creates) the workspace store: a single key/value table holding
/// JSON documents. The roster lives under one key; the daemon only defines
/// the document's shape and mutation rules, not the storage mechanics.
pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("rollbook.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            key TEXT PRIMARY KEY,
            body TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn kv_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let body = conn
        .query_row("SELECT body FROM documents WHERE key = ?", [key], |r| {
            r.get::<_, String>(0)
        })
        .optional()?;
    Ok(body)
}

fn kv_set(conn: &Connection, key: &str, body: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO documents(key, body) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET body = excluded.body",
        (key, body),
    )?;
    Ok(())
}

fn kv_delete(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM documents WHERE key = ?", [key])?;
    Ok(())
}

/// Loads the roster document. A missing or corrupt row yields the empty
/// document; `selectedDate` is always reset to today regardless of what was
/// stored. Only storage-level failures propagate.
pub fn document_load(conn: &Connection) -> anyhow::Result<Document> {
    let Some(body) = kv_get(conn, DOCUMENT_KEY)? else {
        return Ok(Document::empty());
    };
    let doc = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(raw) => Document::from_value(raw),
        Err(_) => Document::empty(),
    };
    Ok(doc)
}

pub fn document_save(conn: &Connection, document: &Document) -> anyhow::Result<()> {
    let body = serde_json::to_string(document)?;
    kv_set(conn, DOCUMENT_KEY, &body)
}

pub fn session_load(conn: &Connection) -> anyhow::Result<Option<AuthSession>> {
    let Some(body) = kv_get(conn, SESSION_KEY)? else {
        return Ok(None);
    };
    Ok(serde_json::from_str(&body).ok())
}

pub fn session_save(conn: &Connection, session: &AuthSession) -> anyhow::Result<()> {
    let body = serde_json::to_string(session)?;
    kv_set(conn, SESSION_KEY, &body)
}

pub fn session_clear(conn: &Connection) -> anyhow::Result<()> {
    kv_delete(conn, SESSION_KEY)
}
