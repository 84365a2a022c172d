use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::ipc::error::ok;
use crate::ipc::helpers::{commit, require_db, require_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Course, Preceptor, RosterError};

fn parse_days(params: &serde_json::Value) -> Vec<String> {
    params
        .get("days")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_preceptor(params: &serde_json::Value) -> Preceptor {
    let p = params.get("preceptor");
    Preceptor {
        name: p
            .and_then(|v| v.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
        phone: p
            .and_then(|v| v.get("phone"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
    }
}

fn courses_list(state: &AppState) -> serde_json::Value {
    let mut rows: Vec<&Course> = state.document.courses.values().collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    let courses: Vec<serde_json::Value> = rows
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "days": c.days,
                "preceptor": { "name": c.preceptor.name, "phone": c.preceptor.phone },
                "studentCount": c.students.len()
            })
        })
        .collect();
    json!({
        "courses": courses,
        "selectedCourseId": state.document.selected_course_id
    })
}

fn courses_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let name = require_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be empty"));
    }

    let course_id = Uuid::new_v4().to_string();
    let course = Course {
        id: course_id.clone(),
        name: name.clone(),
        days: parse_days(params),
        preceptor: parse_preceptor(params),
        students: HashMap::new(),
    };

    let mut next = state.document.clone();
    next.courses.insert(course_id.clone(), course);
    next.selected_course_id = Some(course_id.clone());
    commit(state, next)?;
    state.roll_call = None;
    Ok(json!({ "courseId": course_id, "name": name }))
}

fn courses_rename(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = require_str(params, "courseId")?;
    let name = require_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be empty"));
    }

    let (next, _) = state.document.with_course(&course_id, |course| {
        course.name = name.clone();
        Ok(())
    })?;
    commit(state, next)?;
    Ok(json!({ "courseId": course_id, "name": name }))
}

fn courses_select(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = require_str(params, "courseId")?;
    if !state.document.courses.contains_key(&course_id) {
        return Err(RosterError::CourseNotFound.into());
    }

    let mut next = state.document.clone();
    next.selected_course_id = Some(course_id.clone());
    commit(state, next)?;
    // Any running roll call belongs to the previous selection.
    state.roll_call = None;
    Ok(json!({ "selectedCourseId": course_id }))
}

fn courses_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_db(state)?;
    let course_id = require_str(params, "courseId")?;
    if !state.document.courses.contains_key(&course_id) {
        return Err(RosterError::CourseNotFound.into());
    }

    // Deleting the course removes every contained student with it; there is
    // no tombstone, later lookups report not_found.
    let mut next = state.document.clone();
    next.courses.remove(&course_id);
    if next.selected_course_id.as_deref() == Some(course_id.as_str()) {
        next.selected_course_id = None;
    }
    commit(state, next)?;
    state.roll_call = None;
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
        "courses.list" => Some(ok(&req.id, courses_list(state))),
        "courses.create" => Some(dispatch(state, req, courses_create)),
        "courses.rename" => Some(dispatch(state, req, courses_rename)),
        "courses.select" => Some(dispatch(state, req, courses_select)),
        "courses.delete" => Some(dispatch(state, req, courses_delete)),
        _ => None,
    }
}
