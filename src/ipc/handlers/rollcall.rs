use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{commit, require_db, require_str, selected_course_id, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::metrics;
use crate::model::{AttendanceStatus, RosterError, Student};
use crate::rollcall::RollCallSession;

fn session_payload(state: &AppState) -> serde_json::Value {
    let Some(session) = &state.roll_call else {
        return json!({ "active": false });
    };
    let course = state.document.course(session.course_id());
    let current: Option<&Student> = session
        .current()
        .and_then(|id| course.and_then(|c| c.students.get(id)));
    json!({
        "active": true,
        "complete": session.is_complete(),
        "position": session.position(),
        "total": session.total(),
        "date": state.document.selected_date,
        "current": current.map(|s| json!({
            "id": s.id,
            "name": s.name,
            "attendancePct": metrics::attendance_percentage(&s.stats)
        })),
    })
}

fn rollcall_start(
    state: &mut AppState,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let course = state
        .document
        .course(&course_id)
        .ok_or(RosterError::CourseNotFound)?;

    // Same display order the roster table uses.
    let mut students: Vec<&Student> = course.students.values().collect();
    students.sort_by(|a, b| a.name.cmp(&b.name));
    let order: Vec<String> = students.iter().map(|s| s.id.clone()).collect();

    state.roll_call = Some(RollCallSession::start(course_id, order));
    Ok(session_payload(state))
}

fn rollcall_state(
    state: &mut AppState,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    Ok(session_payload(state))
}

fn rollcall_mark(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let raw = require_str(params, "status")?;
    let status = AttendanceStatus::parse_mark(&raw).ok_or_else(|| {
        HandlerErr::new("bad_params", "status must be present, absent or later")
    })?;

    let Some(session) = state.roll_call.as_ref() else {
        return Err(HandlerErr::new("no_roll_call", "start a roll call first"));
    };
    let Some(student_id) = session.current().map(|s| s.to_string()) else {
        return Err(HandlerErr::new(
            "roll_call_complete",
            "every student already has a status",
        ));
    };
    let course_id = session.course_id().to_string();
    let date = state.document.selected_date.clone();

    // Ledger commit first; the session only advances once the new document
    // is safely persisted.
    let (next, _) = state
        .document
        .with_student(&course_id, &student_id, |student| {
            ledger::record(student, status, &date).map(|_| ())
        })?;
    commit(state, next)?;
    if let Some(session) = state.roll_call.as_mut() {
        session.apply_mark(status);
    }
    Ok(session_payload(state))
}

fn rollcall_undo(
    state: &mut AppState,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let Some(session) = state.roll_call.as_ref() else {
        return Err(HandlerErr::new("no_roll_call", "start a roll call first"));
    };
    let Some(op) = session.last_op().cloned() else {
        // Empty undo stack: nothing to do, not an error.
        let mut payload = session_payload(state);
        payload["undone"] = json!(false);
        return Ok(payload);
    };
    let course_id = session.course_id().to_string();
    let date = state.document.selected_date.clone();

    let (next, _) = state
        .document
        .with_student(&course_id, &op.student_id, |student| {
            ledger::undo(student, op.status, Some(&date));
            Ok(())
        })?;
    commit(state, next)?;
    if let Some(session) = state.roll_call.as_mut() {
        session.undo();
    }
    let mut payload = session_payload(state);
    payload["undone"] = json!(true);
    Ok(payload)
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
        "rollcall.start" => Some(dispatch(state, req, rollcall_start)),
        "rollcall.state" => Some(dispatch(state, req, rollcall_state)),
        "rollcall.mark" => Some(dispatch(state, req, rollcall_mark)),
        "rollcall.undo" => Some(dispatch(state, req, rollcall_undo)),
        _ => None,
    }
}
