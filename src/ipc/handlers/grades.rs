use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    commit, optional_str, require_db, require_str, selected_course_id, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::model::{today_str, Grade, GradeKind, RosterError};

fn parse_kind(raw: &str) -> Result<GradeKind, HandlerErr> {
    GradeKind::parse(raw).ok_or_else(|| {
        HandlerErr::new(
            "bad_params",
            "kind must be written, oral, practical or conceptual",
        )
    })
}

/// New grade values must be finite numbers; only imported documents may
/// carry anything else, and those are skipped by the average.
fn parse_value(params: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    let n = v
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| HandlerErr::new("bad_params", "value must be a finite number"))?;
    Ok(Some(n))
}

fn grades_list(
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

    let mut grades: Vec<&Grade> = student.grades.iter().collect();
    grades.sort_by(|a, b| a.date.cmp(&b.date));
    let rows: Vec<serde_json::Value> = grades
        .iter()
        .map(|g| {
            json!({
                "id": g.id,
                "kind": g.kind,
                "date": g.date,
                "value": g.value,
            })
        })
        .collect();
    Ok(json!({
        "studentId": student_id,
        "grades": rows,
        "average": metrics::grade_average(&student.grades)
    }))
}

fn grades_add(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;
    let kind = parse_kind(&require_str(params, "kind")?)?;
    let value = parse_value(params, "value")?
        .ok_or_else(|| HandlerErr::new("bad_params", "missing value"))?;
    let date = optional_str(params, "date")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(today_str);

    let grade_id = Uuid::new_v4().to_string();
    let (next, average) = state
        .document
        .with_student(&course_id, &student_id, |student| {
            student.grades.push(Grade {
                id: grade_id.clone(),
                kind,
                date,
                value: json!(value),
            });
            Ok(metrics::grade_average(&student.grades))
        })?;
    commit(state, next)?;
    Ok(json!({ "gradeId": grade_id, "average": average }))
}

fn grades_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;
    let grade_id = require_str(params, "gradeId")?;
    let patch = params.get("patch").cloned().unwrap_or_else(|| json!({}));

    let new_kind = match patch.get("kind").and_then(|v| v.as_str()) {
        Some(raw) => Some(parse_kind(raw)?),
        None => None,
    };
    let new_value = parse_value(&patch, "value")?;
    let new_date = optional_str(&patch, "date");

    let (next, average) = state
        .document
        .with_student(&course_id, &student_id, |student| {
            let grade = student
                .grades
                .iter_mut()
                .find(|g| g.id == grade_id)
                .ok_or(RosterError::GradeNotFound)?;
            if let Some(kind) = new_kind {
                grade.kind = kind;
            }
            if let Some(value) = new_value {
                grade.value = json!(value);
            }
            if let Some(date) = new_date {
                grade.date = date;
            }
            Ok(metrics::grade_average(&student.grades))
        })?;
    commit(state, next)?;
    Ok(json!({ "gradeId": grade_id, "average": average }))
}

fn grades_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = selected_course_id(state)?;
    let student_id = require_str(params, "studentId")?;
    let grade_id = require_str(params, "gradeId")?;

    let (next, average) = state
        .document
        .with_student(&course_id, &student_id, |student| {
            let before = student.grades.len();
            student.grades.retain(|g| g.id != grade_id);
            if student.grades.len() == before {
                return Err(RosterError::GradeNotFound);
            }
            Ok(metrics::grade_average(&student.grades))
        })?;
    commit(state, next)?;
    Ok(json!({ "ok": true, "average": average }))
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
        "grades.list" => Some(dispatch(state, req, grades_list)),
        "grades.add" => Some(dispatch(state, req, grades_add)),
        "grades.update" => Some(dispatch(state, req, grades_update)),
        "grades.delete" => Some(dispatch(state, req, grades_delete)),
        _ => None,
    }
}
