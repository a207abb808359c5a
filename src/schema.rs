use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subjects carried by the recurring period tests. Order matches the fixed
/// column layout of score-batch uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Math,
    Physics,
    Chemistry,
    Biology,
    English,
}

impl Subject {
    pub const ALL: [Subject; 5] = [
        Subject::Math,
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::English,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::English => "english",
        }
    }

    pub fn parse(s: &str) -> Option<Subject> {
        Subject::ALL
            .into_iter()
            .find(|sub| sub.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

// Header aliases seen across scanner export revisions. Resolution is
// case-insensitive on the trimmed header text.
const STUDENT_ID_ALIASES: [&str; 4] = ["StudentID", "Student ID", "SBD", "ID"];
const FIRST_NAME_ALIASES: [&str; 2] = ["FirstName", "First Name"];
const LAST_NAME_ALIASES: [&str; 2] = ["LastName", "Last Name"];
const CLASS_ALIASES: [&str; 3] = ["Class", "ClassName", "Lop"];
const VERSION_ALIASES: [&str; 3] = ["Key Version", "Exam Code", "KeyVersion"];

const MARK_PREFIX: &str = "Stu";
const KEY_PREFIX: &str = "PriKey";

/// Canonical-field to source-column mapping, built once per uploaded file so
/// the scoring code never touches raw string-keyed records.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    pub student_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class_label: Option<String>,
    pub exam_version: Option<String>,
}

fn find_alias(headers: &[String], aliases: &[&str]) -> Option<String> {
    headers
        .iter()
        .find(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
        .cloned()
}

impl HeaderMap {
    /// Scans the first object-shaped row for recognized identity columns.
    pub fn from_rows(rows: &[Value]) -> HeaderMap {
        let Some(obj) = rows.iter().find_map(|r| r.as_object()) else {
            return HeaderMap::default();
        };
        let headers: Vec<String> = obj.keys().cloned().collect();
        HeaderMap {
            student_id: find_alias(&headers, &STUDENT_ID_ALIASES),
            first_name: find_alias(&headers, &FIRST_NAME_ALIASES),
            last_name: find_alias(&headers, &LAST_NAME_ALIASES),
            class_label: find_alias(&headers, &CLASS_ALIASES),
            exam_version: find_alias(&headers, &VERSION_ALIASES),
        }
    }
}

/// One student's mark and the canonical key on their own sheet, both already
/// trimmed and uppercased. Empty string means the bubble (or key) was blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionCell {
    pub mark: String,
    pub key: String,
}

/// A typed answer-sheet row. `cells[i - 1]` holds question index `i`.
#[derive(Debug, Clone)]
pub struct AnswerSheetRow {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub class_label: String,
    pub exam_version: String,
    pub cells: Vec<QuestionCell>,
}

impl AnswerSheetRow {
    pub fn cell(&self, index: u32) -> &QuestionCell {
        static EMPTY: QuestionCell = QuestionCell {
            mark: String::new(),
            key: String::new(),
        };
        self.cells
            .get(index.saturating_sub(1) as usize)
            .unwrap_or(&EMPTY)
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
            .trim()
            .to_string()
    }
}

fn str_field(obj: &serde_json::Map<String, Value>, column: &Option<String>) -> String {
    let Some(column) = column else {
        return String::new();
    };
    match obj.get(column) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn answer_field(obj: &serde_json::Map<String, Value>, column: &str) -> String {
    match obj.get(column) {
        Some(Value::String(s)) => s.trim().to_ascii_uppercase(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Extracts typed rows from a raw export. Rows that are not objects, or that
/// carry neither a student id nor any name field, are stray export artifacts
/// and are dropped so one bad row never blocks the batch.
pub fn extract_answer_rows(raw: &[Value], total_questions: u32) -> Vec<AnswerSheetRow> {
    let map = HeaderMap::from_rows(raw);
    let mut out = Vec::new();
    for value in raw {
        let Some(obj) = value.as_object() else {
            continue;
        };
        let student_id = str_field(obj, &map.student_id);
        let first_name = str_field(obj, &map.first_name);
        let last_name = str_field(obj, &map.last_name);
        if student_id.is_empty() && first_name.is_empty() && last_name.is_empty() {
            continue;
        }

        let mut cells = Vec::with_capacity(total_questions as usize);
        for i in 1..=total_questions {
            cells.push(QuestionCell {
                mark: answer_field(obj, &format!("{}{}", MARK_PREFIX, i)),
                key: answer_field(obj, &format!("{}{}", KEY_PREFIX, i)),
            });
        }

        out.push(AnswerSheetRow {
            student_id,
            first_name,
            last_name,
            class_label: str_field(obj, &map.class_label),
            exam_version: str_field(obj, &map.exam_version),
            cells,
        });
    }
    out
}

/// A period score cell as ingested: blank and non-numeric cells are recorded
/// as absent from the start, never coerced to 0. Excluding recorded zeros
/// from averaging is a separate, documented policy applied downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum SubjectScore {
    Absent,
    Recorded(f64),
}

impl From<Option<f64>> for SubjectScore {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(x) => SubjectScore::Recorded(x),
            None => SubjectScore::Absent,
        }
    }
}

impl From<SubjectScore> for Option<f64> {
    fn from(v: SubjectScore) -> Self {
        match v {
            SubjectScore::Recorded(x) => Some(x),
            SubjectScore::Absent => None,
        }
    }
}

impl SubjectScore {
    /// The averaging policy: absent cells never count, and a recorded score
    /// of exactly 0 is treated as "no sitting this period" by institutional
    /// convention, not as an achieved zero.
    pub fn counts_toward_average(self) -> Option<f64> {
        match self {
            SubjectScore::Recorded(v) if v != 0.0 => Some(v),
            _ => None,
        }
    }
}

fn score_cell(value: Option<&Value>) -> SubjectScore {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(SubjectScore::Recorded).unwrap_or(SubjectScore::Absent),
        Some(Value::String(s)) => match s.trim() {
            "" => SubjectScore::Absent,
            t => t
                .parse::<f64>()
                .map(SubjectScore::Recorded)
                .unwrap_or(SubjectScore::Absent),
        },
        _ => SubjectScore::Absent,
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// One row of a fixed-column score-batch upload.
#[derive(Debug, Clone)]
pub struct ScoreBatchRow {
    pub student_id: String,
    pub scores: [SubjectScore; 5],
    pub last_name: String,
    pub first_name: String,
    pub class_label: String,
}

/// Rows above this offset are banner/header furniture in the score exports.
pub const SCORE_BATCH_HEADER_ROWS: usize = 3;

/// Parses a positional score-batch export: student id in column 0, then the
/// five subject columns in `Subject::ALL` order, then optional last name,
/// first name and class columns. Rows without a student id are dropped.
pub fn parse_score_batch(raw: &[Value]) -> Vec<ScoreBatchRow> {
    let mut out = Vec::new();
    for value in raw.iter().skip(SCORE_BATCH_HEADER_ROWS) {
        let Some(cols) = value.as_array() else {
            continue;
        };
        let student_id = cell_text(cols.first());
        if student_id.is_empty() {
            continue;
        }
        let mut scores = [SubjectScore::Absent; 5];
        for (i, slot) in scores.iter_mut().enumerate() {
            *slot = score_cell(cols.get(1 + i));
        }
        out.push(ScoreBatchRow {
            student_id,
            scores,
            last_name: cell_text(cols.get(6)),
            first_name: cell_text(cols.get(7)),
            class_label: cell_text(cols.get(8)),
        });
    }
    out
}
