use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    commit, optional_str, require_db, require_str, selected_course_id, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, Reclassification};
use crate::model::{AttendanceStatus, HistoryEntry, RosterError};

fn parse_mark_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    let raw = require_str(params, "status")?;
    AttendanceStatus::parse_mark(&raw).ok_or_else(|| {
        HandlerErr::new("bad_params", "status must be present, absent or later")
    })
}

fn attendance_record(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;
    let status = parse_mark_status(params)?;
    let date = optional_str(params, "date").unwrap_or_else(|| state.document.selected_date.clone());

    let (next, (entry_id, stats)) =
        state
            .document
            .with_student(&course_id, &student_id, |student| {
                let entry_id = ledger::record(student, status, &date)?;
                Ok((entry_id, student.stats.clone()))
            })?;
    commit(state, next)?;
    Ok(json!({ "entryId": entry_id, "stats": stats }))
}

fn attendance_undo(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;
    let status = parse_mark_status(params)?;
    let date = optional_str(params, "date");

    let (next, (removed, stats)) =
        state
            .document
            .with_student(&course_id, &student_id, |student| {
                let removed = ledger::undo(student, status, date.as_deref());
                Ok((removed, student.stats.clone()))
            })?;
    // No match is a safe no-op, reported rather than failed.
    commit(state, next)?;
    Ok(json!({ "removed": removed, "stats": stats }))
}

fn attendance_reclassify(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;
    let entry_id = require_str(params, "entryId")?;
    let raw = require_str(params, "change")?;
    let change = Reclassification::parse(&raw).ok_or_else(|| {
        HandlerErr::new("bad_params", "change must be late, justified or erroneous")
    })?;

    let (next, (outcome, stats)) =
        state
            .document
            .with_student(&course_id, &student_id, |student| {
                let outcome = ledger::reclassify(student, &entry_id, change)?;
                Ok((outcome, student.stats.clone()))
            })?;
    commit(state, next)?;
    Ok(json!({
        "entryId": entry_id,
        "priorStatus": outcome.prior,
        "status": outcome.status,
        "stats": stats
    }))
}

/// The absences view: entries a teacher may want to reclassify, date-sorted,
/// with the running total of real absences.
fn attendance_history(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;
    let course = state
        .document
        .course(&course_id)
        .ok_or(RosterError::CourseNotFound)?;
    let student = course
        .students
        .get(&student_id)
        .ok_or(RosterError::StudentNotFound)?;

    let mut rows: Vec<&HistoryEntry> = student
        .history
        .iter()
        .filter(|h| matches!(h.status, AttendanceStatus::Absent | AttendanceStatus::Late))
        .collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date));
    let absence_count = rows
        .iter()
        .filter(|h| h.status == AttendanceStatus::Absent)
        .count();

    let entries: Vec<serde_json::Value> = rows
        .iter()
        .map(|h| {
            json!({
                "id": h.id,
                "date": h.date,
                "status": h.status,
                "reason": h.reason,
            })
        })
        .collect();
    Ok(json!({
        "studentId": student_id,
        "entries": entries,
        "absenceCount": absence_count,
        "stats": student.stats
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
        "attendance.record" => Some(dispatch(state, req, attendance_record)),
        "attendance.undo" => Some(dispatch(state, req, attendance_undo)),
        "attendance.reclassify" => Some(dispatch(state, req, attendance_reclassify)),
        "attendance.history" => Some(dispatch(state, req, attendance_history)),
        _ => None,
    }
}
