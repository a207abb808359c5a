use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "rosterSize": state.roster.len(),
            "periodCount": state.periods.len(),
        }),
    )
}

fn handle_session_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.roster.clear();
    state.periods.clear();
    ok(&req.id, json!({ "cleared": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.reset" => Some(handle_session_reset(state, req)),
        _ => None,
    }
}
