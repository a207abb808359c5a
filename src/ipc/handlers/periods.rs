use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::{apply_period_upload, merge_roster};
use crate::schema::{self, Subject, SubjectScore};
use serde_json::json;
use uuid::Uuid;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Ingests one fixed-column score export for a period. Unknown student ids
/// are auto-enrolled into the roster; ids present in the upload replace
/// their record for that period wholesale.
fn handle_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let period = match required_str(req, "period") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw_rows) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing params.rows", None);
    };

    let batch = schema::parse_score_batch(raw_rows);
    let before = state.roster.len();
    state.roster = merge_roster(&state.roster, &batch);
    let enrolled = state.roster.len() - before;

    let batch_id = Uuid::new_v4().to_string();
    let uploaded_at = chrono::Utc::now().to_rfc3339();
    let updated = apply_period_upload(
        state.periods.get(&period),
        &batch,
        batch_id.clone(),
        uploaded_at.clone(),
    );
    let record_count = updated.records.len();
    state.periods.insert(period.clone(), updated);

    ok(
        &req.id,
        json!({
            "period": period,
            "batchId": batch_id,
            "uploadedAt": uploaded_at,
            "rowsParsed": batch.len(),
            "recordCount": record_count,
            "autoEnrolled": enrolled,
        }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let periods: Vec<serde_json::Value> = state
        .periods
        .iter()
        .map(|(period, batch)| {
            json!({
                "period": period,
                "batchId": batch.batch_id,
                "uploadedAt": batch.uploaded_at,
                "recordCount": batch.records.len(),
            })
        })
        .collect();
    ok(&req.id, json!({ "periods": periods }))
}

/// Direct cell edit: replaces exactly one subject field of one record.
/// `value: null` clears the cell back to absent.
fn handle_edit_cell(state: &mut AppState, req: &Request) -> serde_json::Value {
    let period = match required_str(req, "period") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_raw = match required_str(req, "subject") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(subject) = Subject::parse(&subject_raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown subject: {}", subject_raw),
            None,
        );
    };
    let score = match req.params.get("value") {
        None | Some(serde_json::Value::Null) => SubjectScore::Absent,
        Some(v) => match v.as_f64() {
            Some(n) => SubjectScore::Recorded(n),
            None => return err(&req.id, "bad_params", "value must be a number or null", None),
        },
    };

    let Some(batch) = state.periods.get_mut(&period) else {
        return err(
            &req.id,
            "unknown_period",
            format!("no upload for period: {}", period),
            None,
        );
    };
    if !state.roster.iter().any(|p| p.id == student_id) {
        return err(
            &req.id,
            "unknown_student",
            format!("no roster entry: {}", student_id),
            None,
        );
    }

    let record = batch.records.entry(student_id.clone()).or_default();
    record.set(subject, score);

    let record_json = match serde_json::to_value(*record) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "period": period,
            "studentId": student_id,
            "record": record_json,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "periods.upload" => Some(handle_upload(state, req)),
        "periods.list" => Some(handle_list(state, req)),
        "periods.editCell" => Some(handle_edit_cell(state, req)),
        _ => None,
    }
}
