use serde_json::json;
use std::path::PathBuf;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{commit, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::today_str;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };
    // selectedDate is reset to today inside document_load; the stored value
    // never survives a reopen.
    let document = match db::document_load(&conn) {
        Ok(d) => d,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    state.workspace = Some(path.clone());
    state.db = Some(conn);
    state.document = document;
    state.roll_call = None;
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "selectedDate": state.document.selected_date,
            "courseCount": state.document.courses.len()
        }),
    )
}

fn date_select(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let date = params
        .get("date")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(today_str);

    let mut next = state.document.clone();
    next.selected_date = date.clone();
    commit(state, next)?;
    Ok(json!({ "selectedDate": date }))
}

fn handle_date_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    match date_select(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "date.select" => Some(handle_date_select(state, req)),
        _ => None,
    }
}
