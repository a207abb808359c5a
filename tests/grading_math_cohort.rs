use serde_json::{json, Map, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_scansheetd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn scansheetd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "request {} failed: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result payload")
}

/// One ZipGrade-style export row for the 34-question math template. `marks`
/// maps question index to the student's bubble; the key is "A" everywhere.
fn math_row(student_id: &str, first: &str, last: &str, marks: impl Fn(u32) -> &'static str) -> Value {
    let mut obj = Map::new();
    obj.insert("StudentID".to_string(), json!(student_id));
    obj.insert("FirstName".to_string(), json!(first));
    obj.insert("LastName".to_string(), json!(last));
    obj.insert("Class".to_string(), json!("12A1"));
    obj.insert("Key Version".to_string(), json!("132"));
    for i in 1..=34u32 {
        obj.insert(format!("Stu{}", i), json!(marks(i)));
        obj.insert(format!("PriKey{}", i), json!("A"));
    }
    Value::Object(obj)
}

#[test]
fn worked_example_scores_and_stats() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // All of P1 right, 3 of 4 in every P2 group, 4 of 6 in P3.
    let strong = math_row("101", "An", "Nguyen", |i| match i {
        1..=12 => "A",
        13..=28 => {
            if (i - 13) % 4 < 3 {
                "A"
            } else {
                "B"
            }
        }
        29..=32 => "A",
        _ => "B",
    });
    let blank = math_row("102", "Binh", "Tran", |_| "B");
    // A stray export row with no identity must be skipped, not graded.
    let stray = json!({ "StudentID": "", "FirstName": "", "LastName": "", "Stu1": "A" });

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "cohort.grade",
        json!({ "layoutId": "math", "rows": [strong, blank, stray] }),
    );

    let results = result
        .get("results")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("results");
    assert_eq!(results.len(), 2, "stray row must be skipped");

    let scores = results[0].get("scores").expect("scores");
    assert_eq!(scores.get("p1").and_then(|v| v.as_f64()), Some(3.0));
    assert_eq!(scores.get("p2").and_then(|v| v.as_f64()), Some(2.0));
    assert_eq!(scores.get("p3").and_then(|v| v.as_f64()), Some(2.0));
    assert_eq!(scores.get("total").and_then(|v| v.as_f64()), Some(7.0));

    assert_eq!(result.get("multiVersion").and_then(|v| v.as_bool()), Some(false));

    let stats = result
        .get("stats")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("stats");
    assert_eq!(stats.len(), 34);
    // Question 1: wrong only for the all-B student.
    assert_eq!(stats[0].get("wrongCount").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(stats[0].get("wrongPercent").and_then(|v| v.as_f64()), Some(50.0));
    assert_eq!(stats[0].get("displayKey").and_then(|v| v.as_str()), Some("A"));
    // Question 13 carries its booklet group label.
    assert_eq!(stats[12].get("label").and_then(|v| v.as_str()), Some("1a"));

    let summary = result.get("summary").expect("summary");
    assert_eq!(summary.get("gradedRows").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(summary.get("maxTotal").and_then(|v| v.as_f64()), Some(7.0));
    assert_eq!(summary.get("minTotal").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(summary.get("meanTotal").and_then(|v| v.as_f64()), Some(3.5));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn sort_by_total_descending() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let rows = vec![
        math_row("9", "An", "Nguyen", |_| "B"),
        math_row("10", "Binh", "Tran", |_| "A"),
    ];
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "cohort.grade",
        json!({ "layoutId": "math", "rows": rows, "sortKey": "total", "direction": "desc" }),
    );
    let results = result
        .get("results")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("results");
    assert_eq!(
        results[0].get("studentId").and_then(|v| v.as_str()),
        Some("10")
    );

    // Numeric-aware id sort: "9" before "10".
    let rows = vec![
        math_row("10", "Binh", "Tran", |_| "A"),
        math_row("9", "An", "Nguyen", |_| "B"),
    ];
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "cohort.grade",
        json!({ "layoutId": "math", "rows": rows, "sortKey": "sbd" }),
    );
    let results = result
        .get("results")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("results");
    assert_eq!(results[0].get("studentId").and_then(|v| v.as_str()), Some("9"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn inline_layout_with_explicit_group_clusters() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let mut obj = Map::new();
    obj.insert("StudentID".to_string(), json!("101"));
    obj.insert("FirstName".to_string(), json!("An"));
    obj.insert("LastName".to_string(), json!("Nguyen"));
    for i in 1..=8u32 {
        // Wrong on question 4 only: 3 of 4 in the first cluster, 4 of 4 in
        // the second.
        obj.insert(format!("Stu{}", i), json!(if i == 4 { "B" } else { "A" }));
        obj.insert(format!("PriKey{}", i), json!("A"));
    }

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "cohort.grade",
        json!({
            "layout": {
                "id": "custom",
                "name": "Custom",
                "totalQuestions": 8,
                "p1": { "range": { "start": 0, "end": 0 }, "scorePerQuestion": 0.0 },
                "p2": { "kind": "explicit", "groups": [
                    { "start": 1, "end": 4 },
                    { "start": 5, "end": 8 }
                ]},
                "p3": { "range": { "start": 0, "end": 0 }, "scorePerQuestion": 0.0 },
                "ignored": []
            },
            "rows": [Value::Object(obj)]
        }),
    );

    let results = result
        .get("results")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("results");
    let scores = results[0].get("scores").expect("scores");
    assert_eq!(scores.get("p2").and_then(|v| v.as_f64()), Some(1.5));
    assert_eq!(scores.get("total").and_then(|v| v.as_f64()), Some(1.5));

    let stats = result
        .get("stats")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("stats");
    assert_eq!(stats[4].get("label").and_then(|v| v.as_str()), Some("2a"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn inline_layout_with_overlap_is_rejected() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let payload = json!({
        "id": "1",
        "method": "cohort.grade",
        "params": {
            "layout": {
                "id": "custom",
                "name": "Custom",
                "totalQuestions": 10,
                "p1": { "range": { "start": 1, "end": 6 }, "scorePerQuestion": 0.25 },
                "p2": { "kind": "none" },
                "p3": { "range": { "start": 6, "end": 10 }, "scorePerQuestion": 0.5 },
                "ignored": []
            },
            "rows": []
        }
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_layout")
    );

    drop(stdin);
    let _ = child.wait();
}
