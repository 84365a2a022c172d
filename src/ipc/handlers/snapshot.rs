use serde_json::json;
use std::path::PathBuf;

use crate::ipc::error::ok;
use crate::ipc::helpers::{commit, require_db, require_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::snapshot;

fn snapshot_export(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let out_path = PathBuf::from(require_str(params, "outPath")?);

    let summary = snapshot::export_snapshot(&state.document, &out_path)
        .map_err(|e| HandlerErr::new("snapshot_export_failed", e.to_string()))?;
    Ok(json!({
        "bundleFormat": summary.bundle_format,
        "rosterSha256": summary.roster_sha256,
        "outPath": out_path.to_string_lossy(),
    }))
}

fn snapshot_import(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let in_path = PathBuf::from(require_str(params, "inPath")?);

    let summary = snapshot::import_snapshot(&in_path)
        .map_err(|e| HandlerErr::new("snapshot_import_failed", e.to_string()))?;
    let course_count = summary.document.courses.len();
    let selected_date = summary.document.selected_date.clone();
    commit(state, summary.document)?;
    // The imported roster replaces everything the session was built on.
    state.roll_call = None;
    Ok(json!({
        "bundleFormatDetected": summary.bundle_format_detected,
        "courseCount": course_count,
        "selectedDate": selected_date,
    }))
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
        "snapshot.export" => Some(dispatch(state, req, snapshot_export)),
        "snapshot.import" => Some(dispatch(state, req, snapshot_import)),
        _ => None,
    }
}
