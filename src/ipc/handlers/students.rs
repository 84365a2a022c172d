use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    commit, optional_str, require_db, require_str, selected_course_id, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::model::{Condition, RosterError, Student};

fn parse_condition(params: &serde_json::Value, key: &str) -> Result<Option<Condition>, HandlerErr> {
    let Some(raw) = params.get(key).and_then(|v| v.as_str()) else {
        return Ok(None);
    };
    Condition::parse(raw)
        .map(Some)
        .ok_or_else(|| HandlerErr::new("bad_params", "condition must be active or repeating"))
}

fn student_row(course_name: &str, s: &Student) -> serde_json::Value {
    let pct = metrics::attendance_percentage(&s.stats);
    let average = metrics::grade_average(&s.grades);
    json!({
        "id": s.id,
        "name": s.name,
        "condition": s.condition,
        "stats": s.stats,
        "attendancePct": pct,
        "gradeAverage": average,
        "lowAttendance": metrics::is_low_attendance(pct),
        "atRisk": metrics::is_at_risk(pct, average),
        "courseName": course_name,
    })
}

fn students_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = match optional_str(params, "courseId") {
        Some(id) => id,
        None => selected_course_id(state)?,
    };
    let course = state
        .document
        .course(&course_id)
        .ok_or(RosterError::CourseNotFound)?;

    let mut students: Vec<&Student> = course.students.values().collect();
    students.sort_by(|a, b| a.name.cmp(&b.name));
    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| student_row(&course.name, s))
        .collect();
    Ok(json!({ "courseId": course_id, "students": rows }))
}

fn students_add(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let name = require_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be empty"));
    }
    let condition = parse_condition(params, "condition")?.unwrap_or_default();

    let student_id = Uuid::new_v4().to_string();
    let (next, _) = state.document.with_course(&course_id, |course| {
        course.students.insert(
            student_id.clone(),
            Student::new(student_id.clone(), name.clone(), condition),
        );
        Ok(())
    })?;
    commit(state, next)?;
    // The roll-call snapshot no longer matches the roster.
    state.roll_call = None;
    Ok(json!({ "studentId": student_id, "name": name }))
}

fn students_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;
    let patch = params.get("patch").cloned().unwrap_or_else(|| json!({}));

    let new_name = match patch.get("name").and_then(|v| v.as_str()) {
        Some(raw) => {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                return Err(HandlerErr::new("bad_params", "name must not be empty"));
            }
            Some(trimmed)
        }
        None => None,
    };
    let new_condition = parse_condition(&patch, "condition")?;

    let (next, _) = state
        .document
        .with_student(&course_id, &student_id, |student| {
            if let Some(name) = new_name {
                student.name = name;
            }
            if let Some(condition) = new_condition {
                student.condition = condition;
            }
            Ok(())
        })?;
    commit(state, next)?;
    Ok(json!({ "studentId": student_id }))
}

fn students_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;

    let (next, _) = state.document.with_course(&course_id, |course| {
        course
            .students
            .remove(&student_id)
            .map(|_| ())
            .ok_or(RosterError::StudentNotFound)
    })?;
    commit(state, next)?;
    state.roll_call = None;
    Ok(json!({ "ok": true }))
}

/// The four inputs the external notification builder needs, nothing more.
/// Phone normalization and message templating happen outside the daemon.
fn students_risk_notice(
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

    let pct = metrics::attendance_percentage(&student.stats);
    let average = metrics::grade_average(&student.grades);
    Ok(json!({
        "studentName": student.name,
        "courseName": course.name,
        "attendancePct": pct,
        "gradeAverage": average,
        "atRisk": metrics::is_at_risk(pct, average),
        "preceptor": { "name": course.preceptor.name, "phone": course.preceptor.phone }
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
        "students.list" => Some(dispatch(state, req, students_list)),
        "students.add" => Some(dispatch(state, req, students_add)),
        "students.update" => Some(dispatch(state, req, students_update)),
        "students.delete" => Some(dispatch(state, req, students_delete)),
        "students.riskNotice" => Some(dispatch(state, req, students_risk_notice)),
        _ => None,
    }
}
