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
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("rollbook-router-smoke");
    let bundle_out = workspace.join("smoke-snapshot.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "date.select",
        json!({ "date": "2024-04-01" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "auth.login",
        json!({
            "usuario": "nperez",
            "password": "abc123",
            "credentials": "usuario,contraseña,correo\nnperez,abc123,n@e.com\n"
        }),
    );
    let _ = request(&mut stdin, &mut reader, "5", "auth.session", json!({}));

    let created = request(
        &mut stdin,
        &mut reader,
        "6",
        "courses.create",
        json!({ "name": "Smoke Course", "days": ["mon", "wed"] }),
    );
    let course_id = created
        .get("result")
        .and_then(|v| v.get("courseId"))
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string();
    let _ = request(&mut stdin, &mut reader, "7", "courses.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "courses.rename",
        json!({ "courseId": course_id, "name": "Smoke Course B" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "courses.select",
        json!({ "courseId": course_id }),
    );

    let created_student = request(
        &mut stdin,
        &mut reader,
        "10",
        "students.add",
        json!({ "name": "Smoke Student", "condition": "active" }),
    );
    let student_id = created_student
        .get("result")
        .and_then(|v| v.get("studentId"))
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "students.update",
        json!({ "studentId": student_id, "patch": { "condition": "repeating" } }),
    );
    let _ = request(&mut stdin, &mut reader, "12", "students.list", json!({}));

    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "attendance.record",
        json!({ "studentId": student_id, "status": "absent" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "attendance.history",
        json!({ "studentId": student_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "attendance.undo",
        json!({ "studentId": student_id, "status": "absent" }),
    );

    let _ = request(&mut stdin, &mut reader, "16", "rollcall.start", json!({}));
    let _ = request(&mut stdin, &mut reader, "17", "rollcall.state", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "18",
        "rollcall.mark",
        json!({ "status": "present" }),
    );
    let _ = request(&mut stdin, &mut reader, "19", "rollcall.undo", json!({}));

    let added = request(
        &mut stdin,
        &mut reader,
        "20",
        "grades.add",
        json!({ "studentId": student_id, "kind": "written", "value": 7.5 }),
    );
    let grade_id = added
        .get("result")
        .and_then(|v| v.get("gradeId"))
        .and_then(|v| v.as_str())
        .expect("gradeId")
        .to_string();
    let _ = request(
        &mut stdin,
        &mut reader,
        "21",
        "grades.update",
        json!({ "studentId": student_id, "gradeId": grade_id, "patch": { "value": 8.0 } }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "22",
        "grades.list",
        json!({ "studentId": student_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "23",
        "grades.delete",
        json!({ "studentId": student_id, "gradeId": grade_id }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "24",
        "students.riskNotice",
        json!({ "studentId": student_id }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "25",
        "snapshot.export",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "26",
        "snapshot.import",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );

    let _ = request(&mut stdin, &mut reader, "27", "auth.logout", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "28",
        "courses.delete",
        json!({ "courseId": course_id }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
