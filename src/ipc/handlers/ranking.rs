use crate::blocks::{
    ranking_rows, selected_average, sort_ranking_rows, BlockType, RankingFilter, SortDirection,
    SortKey,
};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schema::Subject;
use serde_json::json;

fn parse_filter(req: &Request) -> Result<RankingFilter, serde_json::Value> {
    let Some(filter) = req.params.get("filter") else {
        return Err(err(&req.id, "bad_params", "missing params.filter", None));
    };
    let kind = filter.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match kind {
        "subject" => {
            let raw = filter.get("subject").and_then(|v| v.as_str()).unwrap_or("");
            Subject::parse(raw).map(RankingFilter::Subject).ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    format!("unknown subject: {}", raw),
                    None,
                )
            })
        }
        "block" => {
            let raw = filter.get("block").and_then(|v| v.as_str()).unwrap_or("");
            let block = match raw {
                "A" => BlockType::A,
                "A1" => BlockType::A1,
                "B" => BlockType::B,
                _ => {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        "filter.block must be one of: A, A1, B",
                        None,
                    ))
                }
            };
            Ok(RankingFilter::Block(block))
        }
        "bestBlock" => Ok(RankingFilter::BestBlock),
        other => Err(err(
            &req.id,
            "bad_params",
            format!("filter.type must be subject, block or bestBlock (got: {})", other),
            None,
        )),
    }
}

fn parse_sort(req: &Request) -> Result<Option<(SortKey, SortDirection)>, serde_json::Value> {
    let Some(raw) = req.params.get("sortKey").and_then(|v| v.as_str()) else {
        return Ok(None);
    };
    let key = match raw {
        "sbd" | "studentId" => SortKey::StudentId,
        "name" => SortKey::Name,
        "value" => SortKey::Value,
        other => {
            return Err(err(
                &req.id,
                "bad_params",
                format!("sortKey must be sbd, name or value (got: {})", other),
                None,
            ))
        }
    };
    let direction = match req.params.get("direction").and_then(|v| v.as_str()) {
        Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
        _ => SortDirection::Asc,
    };
    Ok(Some((key, direction)))
}

fn handle_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter = match parse_filter(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let sort = match parse_sort(req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let mut rows = ranking_rows(&state.roster, &state.periods, filter);
    if let Some((key, direction)) = sort {
        sort_ranking_rows(&mut rows, key, direction);
    }
    let group_average = selected_average(&rows);

    let rows_json = match serde_json::to_value(&rows) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "rows": rows_json,
            "rowCount": rows.len(),
            "selectedAverage": group_average,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "ranking.rows" => Some(handle_rows(state, req)),
        _ => None,
    }
}
