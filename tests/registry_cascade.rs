use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollbookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": "t", "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

struct Harness {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    workspace: PathBuf,
}

impl Harness {
    fn new(prefix: &str) -> Self {
        let workspace = temp_dir(prefix);
        let (child, stdin, reader) = spawn_sidecar();
        let mut h = Harness {
            child,
            stdin,
            reader,
            workspace,
        };
        let _ = h.call(
            "workspace.select",
            json!({ "path": h.workspace.to_string_lossy().to_string() }),
        );
        h
    }

    fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = request(&mut self.stdin, &mut self.reader, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "expected success for {}: {}",
            method,
            value
        );
        value["result"].clone()
    }

    fn call_err(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = request(&mut self.stdin, &mut self.reader, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "expected failure for {}: {}",
            method,
            value
        );
        value["error"]["code"].as_str().expect("code").to_string()
    }

    fn finish(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(self.workspace);
    }
}

#[test]
fn creating_a_course_selects_it() {
    let mut h = Harness::new("rollbook-reg-create");

    let created = h.call("courses.create", json!({ "name": "3A" }));
    let course_id = created["courseId"].as_str().expect("courseId").to_string();

    let listing = h.call("courses.list", json!({}));
    assert_eq!(listing["selectedCourseId"], json!(course_id.as_str()));
    assert_eq!(listing["courses"].as_array().expect("courses").len(), 1);

    h.finish();
}

#[test]
fn deleting_a_course_removes_its_students_with_it() {
    let mut h = Harness::new("rollbook-reg-cascade");

    let created = h.call("courses.create", json!({ "name": "3A" }));
    let course_id = created["courseId"].as_str().expect("courseId").to_string();
    let added = h.call("students.add", json!({ "name": "Ana" }));
    let student_id = added["studentId"].as_str().expect("studentId").to_string();

    let _ = h.call("courses.delete", json!({ "courseId": course_id }));

    // The selection is gone and so is everything nested under the course.
    let listing = h.call("courses.list", json!({}));
    assert_eq!(listing["selectedCourseId"], json!(null));
    assert_eq!(listing["courses"].as_array().expect("courses").len(), 0);

    let code = h.call_err("students.list", json!({ "courseId": course_id }));
    assert_eq!(code, "not_found");
    let code = h.call_err("students.list", json!({}));
    assert_eq!(code, "no_course_selected");

    // A second course does not resurrect the deleted student.
    let _ = h.call("courses.create", json!({ "name": "3B" }));
    let code = h.call_err(
        "attendance.record",
        json!({ "studentId": student_id, "status": "present" }),
    );
    assert_eq!(code, "not_found");

    h.finish();
}

#[test]
fn blank_names_are_rejected_everywhere() {
    let mut h = Harness::new("rollbook-reg-blank");

    let code = h.call_err("courses.create", json!({ "name": "   " }));
    assert_eq!(code, "bad_params");

    let created = h.call("courses.create", json!({ "name": "3A" }));
    let course_id = created["courseId"].as_str().expect("courseId").to_string();
    let code = h.call_err(
        "courses.rename",
        json!({ "courseId": course_id, "name": "" }),
    );
    assert_eq!(code, "bad_params");

    let code = h.call_err("students.add", json!({ "name": "  " }));
    assert_eq!(code, "bad_params");

    let added = h.call("students.add", json!({ "name": "Ana" }));
    let student_id = added["studentId"].as_str().expect("studentId").to_string();
    let code = h.call_err(
        "students.update",
        json!({ "studentId": student_id, "patch": { "name": " " } }),
    );
    assert_eq!(code, "bad_params");

    h.finish();
}

#[test]
fn unknown_ids_report_not_found() {
    let mut h = Harness::new("rollbook-reg-missing");
    let _ = h.call("courses.create", json!({ "name": "3A" }));

    let code = h.call_err("courses.select", json!({ "courseId": "nope" }));
    assert_eq!(code, "not_found");
    let code = h.call_err("courses.delete", json!({ "courseId": "nope" }));
    assert_eq!(code, "not_found");
    let code = h.call_err("students.delete", json!({ "studentId": "nope" }));
    assert_eq!(code, "not_found");
    let code = h.call_err(
        "grades.delete",
        json!({ "studentId": "nope", "gradeId": "nope" }),
    );
    assert_eq!(code, "not_found");

    h.finish();
}

#[test]
fn condition_updates_are_validated_and_applied() {
    let mut h = Harness::new("rollbook-reg-condition");
    let _ = h.call("courses.create", json!({ "name": "3A" }));

    let added = h.call("students.add", json!({ "name": "Ana" }));
    let student_id = added["studentId"].as_str().expect("studentId").to_string();

    let code = h.call_err(
        "students.update",
        json!({ "studentId": student_id, "patch": { "condition": "expelled" } }),
    );
    assert_eq!(code, "bad_params");

    let _ = h.call(
        "students.update",
        json!({ "studentId": student_id, "patch": { "condition": "repeating" } }),
    );
    let listing = h.call("students.list", json!({}));
    assert_eq!(listing["students"][0]["condition"], json!("repeating"));

    h.finish();
}

#[test]
fn mutations_before_a_workspace_is_selected_are_refused() {
    let workspace = temp_dir("rollbook-reg-noworkspace");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let value = request(
        &mut stdin,
        &mut reader,
        "courses.create",
        json!({ "name": "3A" }),
    );
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("no_workspace"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn roster_survives_a_daemon_restart() {
    let workspace = temp_dir("rollbook-reg-restart");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        let _ = request(
            &mut stdin,
            &mut reader,
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        let _ = request(
            &mut stdin,
            &mut reader,
            "courses.create",
            json!({ "name": "3A" }),
        );
        let _ = request(
            &mut stdin,
            &mut reader,
            "students.add",
            json!({ "name": "Ana" }),
        );
        drop(stdin);
        let _ = child.wait();
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let selected = request(
        &mut stdin,
        &mut reader,
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["ok"], json!(true));
    assert_eq!(selected["result"]["courseCount"], json!(1));

    let listing = request(&mut stdin, &mut reader, "students.list", json!({}));
    assert_eq!(listing["ok"], json!(true));
    let rows = listing["result"]["students"].as_array().expect("students");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("Ana"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
