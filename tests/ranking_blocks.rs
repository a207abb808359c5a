use serde_json::json;
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

fn upload_period(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    period: &str,
    data_rows: Vec<serde_json::Value>,
) {
    let mut rows = vec![json!(["BANNER"]), json!([]), json!(["ID", "M", "P", "C", "B", "E"])];
    rows.extend(data_rows);
    let _ = request_ok(
        stdin,
        reader,
        id,
        "periods.upload",
        json!({ "period": period, "rows": rows }),
    );
}

fn ranking(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    params: serde_json::Value,
) -> Vec<serde_json::Value> {
    request_ok(stdin, reader, id, "ranking.rows", params)
        .get("rows")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("rows")
}

#[test]
fn zero_period_scores_are_excluded_from_averages() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // Columns: id, math, physics, chemistry, biology, english, names, class.
    upload_period(
        &mut stdin,
        &mut reader,
        "1",
        "P1",
        vec![json!(["101", 0.0, null, null, null, null, "Nguyen", "An", "12A1"])],
    );
    upload_period(
        &mut stdin,
        &mut reader,
        "2",
        "P2",
        vec![json!(["101", 8.0, null, null, null, null, "Nguyen", "An", "12A1"])],
    );

    let rows = ranking(
        &mut stdin,
        &mut reader,
        "3",
        json!({ "filter": { "type": "subject", "subject": "math" } }),
    );
    // Period 1's zero is a no-sitting sentinel: the average is 8, not 4.
    assert_eq!(rows[0].get("selected").and_then(|v| v.as_f64()), Some(8.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn block_totals_and_best_block_priority() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // math 8, physics 7, chemistry 6, english 6: blocks A and A1 tie at 21,
    // biology absent so block B is the 0 sentinel.
    upload_period(
        &mut stdin,
        &mut reader,
        "1",
        "P1",
        vec![
            json!(["101", 8.0, 7.0, 6.0, null, 6.0, "Nguyen", "An", "12A1"]),
            json!(["102", 4.0, null, null, null, null, "Le", "Hoa", "12A2"]),
        ],
    );

    let rows = ranking(
        &mut stdin,
        &mut reader,
        "2",
        json!({ "filter": { "type": "bestBlock" } }),
    );
    let s101 = rows
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_str()) == Some("101"))
        .expect("student 101");
    assert_eq!(s101.get("blockA").and_then(|v| v.as_f64()), Some(21.0));
    assert_eq!(s101.get("blockA1").and_then(|v| v.as_f64()), Some(21.0));
    assert_eq!(s101.get("blockB").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(s101.get("selected").and_then(|v| v.as_f64()), Some(21.0));

    let s102 = rows
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_str()) == Some("102"))
        .expect("student 102");
    assert_eq!(s102.get("selected").and_then(|v| v.as_f64()), Some(0.0));

    // The incomputable 0 sentinel stays out of the chained group average.
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "ranking.rows",
        json!({ "filter": { "type": "bestBlock" } }),
    );
    assert_eq!(result.get("selectedAverage").and_then(|v| v.as_f64()), Some(21.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn block_filter_classifies_by_label_with_precedence() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    upload_period(
        &mut stdin,
        &mut reader,
        "1",
        "P1",
        vec![
            json!(["1", 8.0, 7.0, 6.0, 5.0, 4.0, "Nguyen", "An", "12A1"]),
            json!(["2", 8.0, 7.0, 6.0, 5.0, 4.0, "Le", "Hoa", "12B1"]),
            json!(["3", 8.0, 7.0, 6.0, 5.0, 4.0, "Pham", "Chi", "12E1"]),
        ],
    );

    let a_rows = ranking(
        &mut stdin,
        &mut reader,
        "2",
        json!({ "filter": { "type": "block", "block": "A" } }),
    );
    assert_eq!(a_rows.len(), 1);
    assert_eq!(a_rows[0].get("studentId").and_then(|v| v.as_str()), Some("1"));
    // A = math + physics + chemistry.
    assert_eq!(a_rows[0].get("selected").and_then(|v| v.as_f64()), Some(21.0));

    let b_rows = ranking(
        &mut stdin,
        &mut reader,
        "3",
        json!({ "filter": { "type": "block", "block": "B" } }),
    );
    assert_eq!(b_rows.len(), 1);
    // B = math + chemistry + biology.
    assert_eq!(b_rows[0].get("selected").and_then(|v| v.as_f64()), Some(19.0));

    let a1_rows = ranking(
        &mut stdin,
        &mut reader,
        "4",
        json!({ "filter": { "type": "block", "block": "A1" } }),
    );
    assert_eq!(a1_rows.len(), 1);
    // A1 = math + physics + english.
    assert_eq!(a1_rows[0].get("selected").and_then(|v| v.as_f64()), Some(19.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn sort_rows_by_value_and_by_numeric_id() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    upload_period(
        &mut stdin,
        &mut reader,
        "1",
        "P1",
        vec![
            json!(["9", 5.0, null, null, null, null, "Nguyen", "An", "12A1"]),
            json!(["10", 9.0, null, null, null, null, "Le", "Hoa", "12A1"]),
        ],
    );

    let rows = ranking(
        &mut stdin,
        &mut reader,
        "2",
        json!({
            "filter": { "type": "subject", "subject": "math" },
            "sortKey": "value",
            "direction": "desc"
        }),
    );
    assert_eq!(rows[0].get("studentId").and_then(|v| v.as_str()), Some("10"));

    let rows = ranking(
        &mut stdin,
        &mut reader,
        "3",
        json!({
            "filter": { "type": "subject", "subject": "math" },
            "sortKey": "sbd"
        }),
    );
    // Numeric-aware compare puts 9 before 10.
    assert_eq!(rows[0].get("studentId").and_then(|v| v.as_str()), Some("9"));

    drop(stdin);
    let _ = child.wait();
}
