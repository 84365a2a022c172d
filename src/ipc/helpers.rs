use rusqlite::Connection;
use serde_json::json;

use super::error::err;
use super::types::AppState;
use crate::db;
use crate::model::{Document, RosterError};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RosterError> for HandlerErr {
    fn from(e: RosterError) -> HandlerErr {
        HandlerErr::new(e.code(), e.message())
    }
}

pub fn require_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// The id of the active course, or `no_course_selected` when nothing is.
pub fn selected_course_id(state: &AppState) -> Result<String, HandlerErr> {
    state
        .document
        .selected_course_id
        .clone()
        .filter(|id| state.document.courses.contains_key(id))
        .ok_or_else(|| HandlerErr::new("no_course_selected", "select a course first"))
}

/// Persists a replacement document and only then swaps it into the state.
/// On a storage failure the previous document stays current, so every
/// operation is atomic from the caller's point of view.
pub fn commit(state: &mut AppState, next: Document) -> Result<(), HandlerErr> {
    let conn = require_db(state)?;
    db::document_save(conn, &next).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "key": "roster" })),
    })?;
    state.document = next;
    Ok(())
}
