use crate::blocks::compare_numeric_aware;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::layouts::{self, PartLayout};
use crate::schema;
use crate::scoring::{self, GradedResult};
use std::cmp::Ordering;

fn resolve_layout(req: &Request) -> Result<PartLayout, serde_json::Value> {
    if let Some(inline) = req.params.get("layout") {
        let layout: PartLayout = serde_json::from_value(inline.clone())
            .map_err(|e| err(&req.id, "bad_params", format!("bad layout: {}", e), None))?;
        layout
            .validate()
            .map_err(|e| err(&req.id, &e.code, e.message, e.details))?;
        return Ok(layout);
    }
    let Some(layout_id) = req.params.get("layoutId").and_then(|v| v.as_str()) else {
        return Err(err(
            &req.id,
            "bad_params",
            "missing params.layoutId or params.layout",
            None,
        ));
    };
    layouts::find_builtin(layout_id).ok_or_else(|| {
        err(
            &req.id,
            "unknown_layout",
            format!("no built-in layout: {}", layout_id),
            None,
        )
    })
}

fn compare_results(a: &GradedResult, b: &GradedResult, key: &str) -> Ordering {
    match key {
        "sbd" => compare_numeric_aware(&a.student_id, &b.student_id),
        "name" => {
            let fa = a.first_name.to_lowercase();
            let fb = b.first_name.to_lowercase();
            fa.cmp(&fb).then_with(|| {
                a.last_name
                    .to_lowercase()
                    .cmp(&b.last_name.to_lowercase())
            })
        }
        "p1" => a.scores.p1.partial_cmp(&b.scores.p1).unwrap_or(Ordering::Equal),
        "p2" => a.scores.p2.partial_cmp(&b.scores.p2).unwrap_or(Ordering::Equal),
        "p3" => a.scores.p3.partial_cmp(&b.scores.p3).unwrap_or(Ordering::Equal),
        _ => a
            .scores
            .total
            .partial_cmp(&b.scores.total)
            .unwrap_or(Ordering::Equal),
    }
}

fn handle_grade(req: &Request) -> serde_json::Value {
    let layout = match resolve_layout(req) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let Some(raw_rows) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing params.rows", None);
    };

    let rows = schema::extract_answer_rows(raw_rows, layout.total_questions);
    let mut report = scoring::grade_cohort(&rows, &layout);

    if let Some(sort_key) = req.params.get("sortKey").and_then(|v| v.as_str()) {
        let valid = ["sbd", "name", "total", "p1", "p2", "p3"];
        if !valid.contains(&sort_key) {
            return err(
                &req.id,
                "bad_params",
                format!("sortKey must be one of: {}", valid.join(", ")),
                None,
            );
        }
        let descending = req
            .params
            .get("direction")
            .and_then(|v| v.as_str())
            .map(|d| d.eq_ignore_ascii_case("desc"))
            .unwrap_or(false);
        report.results.sort_by(|a, b| {
            let ord = compare_results(a, b, sort_key);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    match serde_json::to_value(&report) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cohort.grade" => Some(handle_grade(req)),
        _ => None,
    }
}
