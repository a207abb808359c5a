use crate::blocks::{block_for, BlockType};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::{normalize_class_label, StudentProfile};
use serde_json::json;

fn profile_json(p: &StudentProfile) -> serde_json::Value {
    json!({
        "id": p.id,
        "firstName": p.first_name,
        "lastName": p.last_name,
        "displayName": p.display_name(),
        "classLabel": p.class_label,
        "block": block_for(p),
        "explicitBlock": p.block,
    })
}

/// Loads an explicit roster file. Uploaded profiles replace same-id entries;
/// auto-enrolled students from earlier score uploads survive unless the file
/// names them.
fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("students").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing params.students", None);
    };

    let mut loaded = 0usize;
    let mut replaced = 0usize;
    for value in raw {
        let Ok(mut profile) = serde_json::from_value::<StudentProfile>(value.clone()) else {
            // Malformed entries are skipped so one bad row never blocks the file.
            continue;
        };
        profile.id = profile.id.trim().to_string();
        if profile.id.is_empty() {
            continue;
        }
        profile.class_label = normalize_class_label(&profile.class_label);
        if let Some(slot) = state.roster.iter_mut().find(|p| p.id == profile.id) {
            *slot = profile;
            replaced += 1;
        } else {
            state.roster.push(profile);
            loaded += 1;
        }
    }

    ok(
        &req.id,
        json!({
            "added": loaded,
            "replaced": replaced,
            "rosterSize": state.roster.len(),
        }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let students: Vec<serde_json::Value> = state.roster.iter().map(profile_json).collect();
    ok(&req.id, json!({ "students": students }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.id", None);
    };
    let Some(profile) = state.roster.iter_mut().find(|p| p.id == id) else {
        return err(
            &req.id,
            "unknown_student",
            format!("no roster entry: {}", id),
            None,
        );
    };

    if let Some(v) = req.params.get("firstName").and_then(|v| v.as_str()) {
        profile.first_name = v.trim().to_string();
    }
    if let Some(v) = req.params.get("lastName").and_then(|v| v.as_str()) {
        profile.last_name = v.trim().to_string();
    }
    if let Some(v) = req.params.get("classLabel").and_then(|v| v.as_str()) {
        profile.class_label = normalize_class_label(v);
    }
    match req.params.get("block") {
        None => {}
        Some(serde_json::Value::Null) => profile.block = None,
        Some(v) => match serde_json::from_value::<BlockType>(v.clone()) {
            Ok(b) => profile.block = Some(b),
            Err(_) => {
                return err(
                    &req.id,
                    "bad_params",
                    "block must be one of: A, A1, B, Other, or null",
                    None,
                )
            }
        },
    }

    let updated = profile_json(profile);
    ok(&req.id, json!({ "student": updated }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.load" => Some(handle_load(state, req)),
        "roster.list" => Some(handle_list(state, req)),
        "roster.update" => Some(handle_update(state, req)),
        _ => None,
    }
}
