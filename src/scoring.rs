use crate::layouts::{IndexKind, PartLayout};
use crate::schema::AnswerSheetRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Shown in place of a concrete key when one file mixes exam versions.
pub const WILDCARD_KEY: &str = "*";

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Non-linear partial credit for a 4-question group. Fixed exam-board rule,
/// deliberately not configurable.
pub fn group_score(correct_count: u32) -> f64 {
    match correct_count {
        1 => 0.1,
        2 => 0.25,
        3 => 0.5,
        4 => 1.0,
        _ => 0.0,
    }
}

/// Cohort-level canonical keys. `display_key` is informational only; scoring
/// always compares a student against the key on their own row.
#[derive(Debug, Clone)]
pub struct KeyBook {
    first_seen: Vec<String>,
    pub multi_version: bool,
}

impl KeyBook {
    /// One pass over the cohort: the first non-empty key per index becomes
    /// its display key, and any index with two distinct non-empty keys marks
    /// the whole cohort as multi-version.
    pub fn resolve(rows: &[AnswerSheetRow], total_questions: u32) -> KeyBook {
        let mut first_seen = vec![String::new(); total_questions as usize];
        let mut multi_version = false;
        for row in rows {
            for i in 1..=total_questions {
                let key = &row.cell(i).key;
                if key.is_empty() {
                    continue;
                }
                let slot = &mut first_seen[(i - 1) as usize];
                if slot.is_empty() {
                    *slot = key.clone();
                } else if slot != key {
                    multi_version = true;
                }
            }
        }
        KeyBook {
            first_seen,
            multi_version,
        }
    }

    /// The key printed in the statistics header row: a concrete letter, the
    /// wildcard when versions disagree anywhere, empty when never observed.
    pub fn display_key(&self, index: u32) -> String {
        let first = self
            .first_seen
            .get(index.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default();
        if first.is_empty() {
            String::new()
        } else if self.multi_version {
            WILDCARD_KEY.to_string()
        } else {
            first
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionOutcome {
    Correct,
    Wrong,
    Ignored,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PartScores {
    pub total: f64,
    pub p1: f64,
    pub p2: f64,
    pub p3: f64,
}

/// One student's graded sitting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedResult {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub class_label: String,
    pub exam_version: String,
    pub scores: PartScores,
    /// Question index -> outcome. Ignored indices carry `ignored`; undefined
    /// indices are omitted.
    pub outcomes: BTreeMap<u32, QuestionOutcome>,
    pub raw_marks: BTreeMap<u32, String>,
}

fn mark_matches_key(row: &AnswerSheetRow, index: u32) -> bool {
    let cell = row.cell(index);
    // An absent key can never be answered correctly.
    !cell.key.is_empty() && cell.mark == cell.key
}

/// Grades one typed row against a layout. Pure; cohort statistics are folded
/// separately from the returned outcome map.
pub fn grade_row(row: &AnswerSheetRow, layout: &PartLayout) -> GradedResult {
    let mut outcomes = BTreeMap::new();
    let mut raw_marks = BTreeMap::new();

    for i in 1..=layout.total_questions {
        if layout.index_kind(i) == IndexKind::Ignored {
            outcomes.insert(i, QuestionOutcome::Ignored);
        }
        raw_marks.insert(i, row.cell(i).mark.clone());
    }

    let mut score_single = |range: &crate::layouts::QuestionRange, per_question: f64| -> f64 {
        let mut subtotal = 0.0;
        for i in range.indices() {
            if layout.index_kind(i) == IndexKind::Ignored {
                continue;
            }
            if mark_matches_key(row, i) {
                subtotal += per_question;
                outcomes.insert(i, QuestionOutcome::Correct);
            } else {
                outcomes.insert(i, QuestionOutcome::Wrong);
            }
        }
        round2(subtotal)
    };

    let p1 = score_single(&layout.p1.range, layout.p1.score_per_question);
    let p3 = score_single(&layout.p3.range, layout.p3.score_per_question);

    let mut p2 = 0.0;
    for group in layout.p2.groups() {
        let mut correct_in_group = 0;
        for i in group.indices() {
            if layout.index_kind(i) == IndexKind::Ignored {
                continue;
            }
            if mark_matches_key(row, i) {
                correct_in_group += 1;
                outcomes.insert(i, QuestionOutcome::Correct);
            } else {
                outcomes.insert(i, QuestionOutcome::Wrong);
            }
        }
        p2 += group_score(correct_in_group);
    }
    let p2 = round2(p2);

    GradedResult {
        student_id: row.student_id.clone(),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        display_name: row.display_name(),
        class_label: row.class_label.clone(),
        exam_version: row.exam_version.clone(),
        scores: PartScores {
            // Parts are rounded above; the sum is rounded again so drift
            // never reaches the displayed total.
            total: round2(p1 + p2 + p3),
            p1,
            p2,
            p3,
        },
        outcomes,
        raw_marks,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStat {
    pub index: u32,
    pub label: String,
    pub wrong_count: usize,
    pub wrong_percent: f64,
    pub display_key: String,
}

/// Folds graded rows into per-question wrong counts and percentages.
/// Ignored indices never count; an index nobody had a key for counts every
/// graded row as wrong (it was graded wrong for each of them).
pub fn cohort_stats(
    results: &[GradedResult],
    keys: &KeyBook,
    layout: &PartLayout,
) -> Vec<QuestionStat> {
    let graded_rows = results.len();
    let mut stats = Vec::with_capacity(layout.total_questions as usize);
    for i in 1..=layout.total_questions {
        let wrong_count = results
            .iter()
            .filter(|r| r.outcomes.get(&i) == Some(&QuestionOutcome::Wrong))
            .count();
        let wrong_percent = if graded_rows > 0 {
            round1(wrong_count as f64 / graded_rows as f64 * 100.0)
        } else {
            0.0
        };
        stats.push(QuestionStat {
            index: i,
            label: layout.question_label(i),
            wrong_count,
            wrong_percent,
            display_key: keys.display_key(i),
        });
    }
    stats
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortSummary {
    pub graded_rows: usize,
    pub min_total: f64,
    pub max_total: f64,
    pub mean_total: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortReport {
    pub results: Vec<GradedResult>,
    pub stats: Vec<QuestionStat>,
    pub multi_version: bool,
    pub summary: CohortSummary,
}

/// Grades one uploaded cohort end to end.
pub fn grade_cohort(rows: &[AnswerSheetRow], layout: &PartLayout) -> CohortReport {
    let keys = KeyBook::resolve(rows, layout.total_questions);
    let results: Vec<GradedResult> = rows.iter().map(|r| grade_row(r, layout)).collect();
    let stats = cohort_stats(&results, &keys, layout);

    let mut min_total = 0.0;
    let mut max_total = 0.0;
    let mut mean_total = 0.0;
    if !results.is_empty() {
        min_total = results
            .iter()
            .map(|r| r.scores.total)
            .fold(f64::INFINITY, f64::min);
        max_total = results
            .iter()
            .map(|r| r.scores.total)
            .fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = results.iter().map(|r| r.scores.total).sum();
        mean_total = round2(sum / results.len() as f64);
    }

    CohortReport {
        multi_version: keys.multi_version,
        summary: CohortSummary {
            graded_rows: results.len(),
            min_total,
            max_total,
            mean_total,
        },
        results,
        stats,
    }
}
