use crate::roster::{PeriodBatch, StudentProfile};
use crate::schema::Subject;
use crate::scoring::round2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Combined-subject exam blocks. `Other` students still rank by single
/// subject but have no block total of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    A,
    A1,
    B,
    Other,
}

impl BlockType {
    /// Fixed priority used wherever one block must win: best-of-all-blocks
    /// tie-breaks resolve to the earliest entry here.
    pub const RANKED: [BlockType; 3] = [BlockType::A, BlockType::A1, BlockType::B];

    /// The three subjects whose averages compose this block's total.
    pub fn subjects(self) -> Option<[Subject; 3]> {
        match self {
            BlockType::A => Some([Subject::Math, Subject::Physics, Subject::Chemistry]),
            BlockType::A1 => Some([Subject::Math, Subject::Physics, Subject::English]),
            BlockType::B => Some([Subject::Math, Subject::Chemistry, Subject::Biology]),
            BlockType::Other => None,
        }
    }
}

/// Substring inference over a free-text class label. The precedence is an
/// explicit policy: E beats B beats A, so "12AB" classifies as B.
pub fn classify_class_label(label: &str) -> BlockType {
    let upper = label.to_ascii_uppercase();
    if upper.contains('E') {
        BlockType::A1
    } else if upper.contains('B') {
        BlockType::B
    } else if upper.contains('A') {
        BlockType::A
    } else {
        BlockType::Other
    }
}

/// Explicit assignment wins; the label pattern is only a fallback.
pub fn block_for(profile: &StudentProfile) -> BlockType {
    profile
        .block
        .unwrap_or_else(|| classify_class_label(&profile.class_label))
}

/// Average of one subject across periods, excluding absent entries and
/// recorded zeros (the documented no-sitting convention). `None` when no
/// period qualifies.
pub fn subject_average(
    periods: &BTreeMap<String, PeriodBatch>,
    student_id: &str,
    subject: Subject,
) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for batch in periods.values() {
        let Some(record) = batch.records.get(student_id) else {
            continue;
        };
        if let Some(v) = record.get(subject).counts_toward_average() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(round2(sum / count as f64))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverages {
    pub math: Option<f64>,
    pub physics: Option<f64>,
    pub chemistry: Option<f64>,
    pub biology: Option<f64>,
    pub english: Option<f64>,
}

impl SubjectAverages {
    pub fn get(&self, subject: Subject) -> Option<f64> {
        match subject {
            Subject::Math => self.math,
            Subject::Physics => self.physics,
            Subject::Chemistry => self.chemistry,
            Subject::Biology => self.biology,
            Subject::English => self.english,
        }
    }
}

/// A block total is 0, not absent, when any of its three subject averages
/// could not be computed. Downstream averaging must skip these zeros.
pub fn block_total(averages: &SubjectAverages, block: BlockType) -> f64 {
    let Some(subjects) = block.subjects() else {
        return 0.0;
    };
    let mut sum = 0.0;
    for s in subjects {
        match averages.get(s) {
            Some(v) => sum += v,
            None => return 0.0,
        }
    }
    round2(sum)
}

/// Max of the three block totals; equal totals resolve to the earliest block
/// in `BlockType::RANKED`.
pub fn best_block(averages: &SubjectAverages) -> (BlockType, f64) {
    let mut best = (BlockType::A, block_total(averages, BlockType::A));
    for block in &BlockType::RANKED[1..] {
        let total = block_total(averages, *block);
        if total > best.1 {
            best = (*block, total);
        }
    }
    best
}

/// What single value the ranking view sorts and displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankingFilter {
    Subject(Subject),
    Block(BlockType),
    BestBlock,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub class_label: String,
    pub block: BlockType,
    pub averages: SubjectAverages,
    pub block_a: f64,
    pub block_a1: f64,
    pub block_b: f64,
    pub selected: f64,
}

/// Joins the roster with the period map under the active filter. Derived
/// view, recomputed from scratch on every call.
pub fn ranking_rows(
    roster: &[StudentProfile],
    periods: &BTreeMap<String, PeriodBatch>,
    filter: RankingFilter,
) -> Vec<RankingRow> {
    let mut rows = Vec::new();
    for profile in roster {
        let averages = SubjectAverages {
            math: subject_average(periods, &profile.id, Subject::Math),
            physics: subject_average(periods, &profile.id, Subject::Physics),
            chemistry: subject_average(periods, &profile.id, Subject::Chemistry),
            biology: subject_average(periods, &profile.id, Subject::Biology),
            english: subject_average(periods, &profile.id, Subject::English),
        };
        let block = block_for(profile);

        let selected = match filter {
            RankingFilter::Subject(s) => averages.get(s).unwrap_or(0.0),
            RankingFilter::Block(b) => {
                if block != b {
                    continue;
                }
                block_total(&averages, b)
            }
            RankingFilter::BestBlock => best_block(&averages).1,
        };

        rows.push(RankingRow {
            student_id: profile.id.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            display_name: profile.display_name(),
            class_label: profile.class_label.clone(),
            block,
            block_a: block_total(&averages, BlockType::A),
            block_a1: block_total(&averages, BlockType::A1),
            block_b: block_total(&averages, BlockType::B),
            averages,
            selected,
        });
    }
    rows
}

/// Cohort average of the selected values, skipping the 0 sentinels emitted
/// for incomputable block totals.
pub fn selected_average(rows: &[RankingRow]) -> f64 {
    let values: Vec<f64> = rows.iter().map(|r| r.selected).filter(|v| *v != 0.0).collect();
    if values.is_empty() {
        0.0
    } else {
        round2(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    StudentId,
    Name,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Numeric-aware string compare: digit runs compare as integers, everything
/// else case-insensitively, so "SBD9" sorts before "SBD10".
pub fn compare_numeric_aware(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let mut na = String::new();
                    while let Some(c) = ai.peek().copied() {
                        if !c.is_ascii_digit() {
                            break;
                        }
                        na.push(c);
                        ai.next();
                    }
                    let mut nb = String::new();
                    while let Some(c) = bi.peek().copied() {
                        if !c.is_ascii_digit() {
                            break;
                        }
                        nb.push(c);
                        bi.next();
                    }
                    let ta = na.trim_start_matches('0');
                    let tb = nb.trim_start_matches('0');
                    let ord = ta
                        .len()
                        .cmp(&tb.len())
                        .then_with(|| ta.cmp(tb))
                        .then_with(|| na.len().cmp(&nb.len()));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                } else {
                    let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                    if ord != Ordering::Equal {
                        return ord;
                    }
                    ai.next();
                    bi.next();
                }
            }
        }
    }
}

fn compare_name(a: &RankingRow, b: &RankingRow) -> Ordering {
    let fa = a.first_name.to_lowercase();
    let fb = b.first_name.to_lowercase();
    fa.cmp(&fb).then_with(|| {
        let la = a.last_name.to_lowercase();
        let lb = b.last_name.to_lowercase();
        la.cmp(&lb)
    })
}

/// Stable sort; direction only flips the comparator, so equal rows keep
/// their roster order either way.
pub fn sort_ranking_rows(rows: &mut [RankingRow], key: SortKey, direction: SortDirection) {
    rows.sort_by(|a, b| {
        let ord = match key {
            SortKey::StudentId => compare_numeric_aware(&a.student_id, &b.student_id),
            SortKey::Name => compare_name(a, b),
            SortKey::Value => a
                .selected
                .partial_cmp(&b.selected)
                .unwrap_or(Ordering::Equal),
        };
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}
