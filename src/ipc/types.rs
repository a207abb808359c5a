use crate::roster::{PeriodBatch, StudentProfile};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Mutable session owned by the request loop. The computation modules only
/// ever see immutable snapshots of these fields.
#[derive(Default)]
pub struct AppState {
    pub roster: Vec<StudentProfile>,
    pub periods: BTreeMap<String, PeriodBatch>,
}
