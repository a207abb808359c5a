use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::layouts;
use serde_json::json;

fn handle_list(req: &Request) -> serde_json::Value {
    let summaries: Vec<serde_json::Value> = layouts::builtin_layouts()
        .iter()
        .map(|l| {
            json!({
                "id": l.id,
                "name": l.name,
                "totalQuestions": l.total_questions,
            })
        })
        .collect();
    ok(&req.id, json!({ "layouts": summaries }))
}

fn handle_get(req: &Request) -> serde_json::Value {
    let Some(layout_id) = req.params.get("layoutId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.layoutId", None);
    };
    match layouts::find_builtin(layout_id) {
        Some(layout) => match serde_json::to_value(&layout) {
            Ok(v) => ok(&req.id, json!({ "layout": v })),
            Err(e) => err(&req.id, "internal", e.to_string(), None),
        },
        None => err(
            &req.id,
            "unknown_layout",
            format!("no built-in layout: {}", layout_id),
            None,
        ),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "layouts.list" => Some(handle_list(req)),
        "layouts.get" => Some(handle_get(req)),
        _ => None,
    }
}
