use serde_json::json;

use crate::auth;
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{optional_str, require_db, require_str, HandlerErr};
use crate::ipc::types::{AppState, Request};

/// The credential sheet arrives either inline (the shell already fetched it)
/// or as a path to a downloaded copy. The daemon never talks to the network.
fn credential_text(params: &serde_json::Value) -> Result<String, HandlerErr> {
    if let Some(text) = optional_str(params, "credentials") {
        return Ok(text);
    }
    let path = optional_str(params, "credentialsPath").ok_or_else(|| {
        HandlerErr::new("bad_params", "missing credentials or credentialsPath")
    })?;
    std::fs::read_to_string(&path)
        .map_err(|e| HandlerErr::new("credentials_unavailable", e.to_string()))
}

fn auth_login(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let usuario = require_str(params, "usuario")?;
    let password = require_str(params, "password")?;
    let text = credential_text(params)?;

    let records = auth::parse_credential_list(&text)
        .map_err(|e| HandlerErr::new("credentials_unavailable", e.to_string()))?;
    let session = auth::verify_credentials(&records, &usuario, &password)
        .map_err(|e| HandlerErr::new(e.code(), e.message()))?;

    // The session only becomes visible once it is safely stored.
    db::session_save(conn, &session)
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(json!({ "usuario": session.usuario, "correo": session.correo }))
}

fn auth_session(
    state: &mut AppState,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let session = db::session_load(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({
        "session": session.map(|s| json!({ "usuario": s.usuario, "correo": s.correo }))
    }))
}

fn auth_logout(
    state: &mut AppState,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    db::session_clear(conn).map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&mut AppState, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match f(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(dispatch(state, req, auth_login)),
        "auth.session" => Some(dispatch(state, req, auth_session)),
        "auth.logout" => Some(dispatch(state, req, auth_logout)),
        _ => None,
    }
}
