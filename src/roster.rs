use crate::blocks::BlockType;
use crate::schema::{ScoreBatchRow, Subject, SubjectScore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Roster identity, independent of any particular sitting. `block` is the
/// explicit assignment; when unset, classification falls back to substring
/// inference over the class label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub class_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockType>,
}

impl StudentProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
            .trim()
            .to_string()
    }
}

/// Rewrites the institutional shorthand `12` + zeros to `12E<n>`, n = number
/// of zero digits (`"1200"` -> `"12E2"`). Anything else passes through.
pub fn normalize_class_label(raw: &str) -> String {
    let label = raw.trim();
    if let Some(rest) = label.strip_prefix("12") {
        if !rest.is_empty() && rest.bytes().all(|b| b == b'0') {
            return format!("12E{}", rest.len());
        }
    }
    label.to_string()
}

/// Reconciles the explicit roster with students discovered via score uploads.
/// Known ids keep their profile untouched; unknown ids are auto-enrolled with
/// whatever identity fields the batch carries. Pure: returns a new roster.
pub fn merge_roster(existing: &[StudentProfile], batch: &[ScoreBatchRow]) -> Vec<StudentProfile> {
    let mut merged = existing.to_vec();
    for row in batch {
        if merged.iter().any(|p| p.id == row.student_id) {
            continue;
        }
        merged.push(StudentProfile {
            id: row.student_id.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            class_label: normalize_class_label(&row.class_label),
            block: None,
        });
    }
    merged
}

/// One student's scores for one period, explicit per subject.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRecord {
    pub math: SubjectScore,
    pub physics: SubjectScore,
    pub chemistry: SubjectScore,
    pub biology: SubjectScore,
    pub english: SubjectScore,
}

impl Default for PeriodRecord {
    fn default() -> Self {
        Self {
            math: SubjectScore::Absent,
            physics: SubjectScore::Absent,
            chemistry: SubjectScore::Absent,
            biology: SubjectScore::Absent,
            english: SubjectScore::Absent,
        }
    }
}

impl PeriodRecord {
    pub fn from_columns(scores: &[SubjectScore; 5]) -> Self {
        Self {
            math: scores[0],
            physics: scores[1],
            chemistry: scores[2],
            biology: scores[3],
            english: scores[4],
        }
    }

    pub fn get(&self, subject: Subject) -> SubjectScore {
        match subject {
            Subject::Math => self.math,
            Subject::Physics => self.physics,
            Subject::Chemistry => self.chemistry,
            Subject::Biology => self.biology,
            Subject::English => self.english,
        }
    }

    pub fn set(&mut self, subject: Subject, score: SubjectScore) {
        match subject {
            Subject::Math => self.math = score,
            Subject::Physics => self.physics = score,
            Subject::Chemistry => self.chemistry = score,
            Subject::Biology => self.biology = score,
            Subject::English => self.english = score,
        }
    }
}

/// All records for one testing period, with upload provenance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBatch {
    pub batch_id: String,
    pub uploaded_at: String,
    pub records: BTreeMap<String, PeriodRecord>,
}

/// Applies a score upload to a period. Ids present in the upload have their
/// record replaced wholesale; ids only in the previous upload are retained.
/// Returns the new batch; the caller owns where it is stored.
pub fn apply_period_upload(
    previous: Option<&PeriodBatch>,
    batch: &[ScoreBatchRow],
    batch_id: String,
    uploaded_at: String,
) -> PeriodBatch {
    let mut records = previous.map(|b| b.records.clone()).unwrap_or_default();
    for row in batch {
        records.insert(row.student_id.clone(), PeriodRecord::from_columns(&row.scores));
    }
    PeriodBatch {
        batch_id,
        uploaded_at,
        records,
    }
}
