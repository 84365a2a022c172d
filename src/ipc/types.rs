use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::model::Document;
use crate::rollcall::RollCallSession;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Whole-daemon state. `document` is the in-memory roster for the open
/// workspace; handlers replace it wholesale after persisting, never mutate it
/// in place. `roll_call` is the only transient state independent of the
/// document and is dropped whenever its student snapshot goes stale.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub document: Document,
    pub roll_call: Option<RollCallSession>,
}

impl AppState {
    pub fn new() -> AppState {
        AppState {
            workspace: None,
            db: None,
            document: Document::empty(),
            roll_call: None,
        }
    }
}
