use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration-level failure (bad layout, unknown subject). Data-quality
/// problems in uploaded rows are absorbed by the scorers, never raised.
#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl EngineError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Inclusive 1-based question range. `start == 0 && end == 0` means "no such
/// part" (the exports use 0 as a no-op sentinel index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRange {
    pub start: u32,
    pub end: u32,
}

impl QuestionRange {
    pub fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0 || self.start > self.end
    }

    pub fn contains(&self, index: u32) -> bool {
        !self.is_empty() && index >= self.start && index <= self.end
    }

    /// Iterates real question indices, skipping the 0 sentinel.
    pub fn indices(&self) -> impl Iterator<Item = u32> {
        let (start, end) = if self.is_empty() {
            (1, 0)
        } else {
            (self.start.max(1), self.end)
        };
        start..=end
    }
}

/// A part graded one question at a time with a fixed per-question value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePart {
    pub range: QuestionRange,
    pub score_per_question: f64,
}

impl SinglePart {
    pub fn none() -> Self {
        Self {
            range: QuestionRange::empty(),
            score_per_question: 0.0,
        }
    }
}

/// How the group-scored part carves its questions into clusters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum GroupPlan {
    /// No group-scored part at all.
    None,
    /// A contiguous range walked in fixed-size steps (the common case).
    Stride { range: QuestionRange, size: u32 },
    /// Explicit `[start, end]` clusters for subjects whose booklet does not
    /// lay the groups out contiguously.
    Explicit { groups: Vec<QuestionRange> },
}

impl GroupPlan {
    /// Materializes the concrete group ranges, in booklet order.
    pub fn groups(&self) -> Vec<QuestionRange> {
        match self {
            GroupPlan::None => Vec::new(),
            GroupPlan::Stride { range, size } => {
                let mut out = Vec::new();
                if range.is_empty() || *size == 0 {
                    return out;
                }
                let mut start = range.start;
                while start <= range.end {
                    let end = (start + size - 1).min(range.end);
                    out.push(QuestionRange { start, end });
                    start = end + 1;
                }
                out
            }
            GroupPlan::Explicit { groups } => {
                groups.iter().copied().filter(|g| !g.is_empty()).collect()
            }
        }
    }
}

/// Per-subject three-part grading scheme over one answer sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartLayout {
    pub id: String,
    pub name: String,
    pub total_questions: u32,
    pub p1: SinglePart,
    pub p2: GroupPlan,
    pub p3: SinglePart,
    #[serde(default)]
    pub ignored: Vec<QuestionRange>,
}

/// Which part of the layout owns a question index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    P1,
    P2,
    P3,
    Ignored,
    Undefined,
}

impl PartLayout {
    pub fn index_kind(&self, index: u32) -> IndexKind {
        for r in &self.ignored {
            if r.contains(index) {
                return IndexKind::Ignored;
            }
        }
        if self.p1.range.contains(index) {
            return IndexKind::P1;
        }
        for g in self.p2.groups() {
            if g.contains(index) {
                return IndexKind::P2;
            }
        }
        if self.p3.range.contains(index) {
            return IndexKind::P3;
        }
        IndexKind::Undefined
    }

    /// Booklet label for a group-scored question, e.g. question 14 of a
    /// stride-4 part starting at 13 prints as `1b`. Single questions print
    /// as their plain index.
    pub fn question_label(&self, index: u32) -> String {
        for (gi, g) in self.p2.groups().iter().enumerate() {
            if g.contains(index) {
                let offset = (index - g.start) as u8;
                let letter = (b'a' + offset.min(25)) as char;
                return format!("{}{}", gi + 1, letter);
            }
        }
        index.to_string()
    }

    /// Rejects layouts where an index would belong to two parts at once.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.total_questions == 0 {
            return Err(EngineError::new("bad_layout", "totalQuestions must be > 0"));
        }
        let mut owner: HashMap<u32, &'static str> = HashMap::new();
        let mut claim = |indices: Vec<u32>, label: &'static str| -> Result<(), EngineError> {
            for i in indices {
                if i > self.total_questions {
                    return Err(EngineError::new(
                        "bad_layout",
                        format!("{} index {} exceeds totalQuestions {}", label, i, self.total_questions),
                    ));
                }
                if let Some(prev) = owner.insert(i, label) {
                    return Err(EngineError::new(
                        "bad_layout",
                        format!("question {} assigned to both {} and {}", i, prev, label),
                    ));
                }
            }
            Ok(())
        };

        claim(self.p1.range.indices().collect(), "p1")?;
        for g in self.p2.groups() {
            claim(g.indices().collect(), "p2")?;
        }
        claim(self.p3.range.indices().collect(), "p3")?;
        for r in &self.ignored {
            claim(r.indices().collect(), "ignored")?;
        }
        Ok(())
    }
}

/// Built-in layouts matching the scan-sheet templates the school runs.
pub fn builtin_layouts() -> Vec<PartLayout> {
    vec![
        PartLayout {
            id: "math".to_string(),
            name: "Mathematics".to_string(),
            total_questions: 34,
            p1: SinglePart {
                range: QuestionRange { start: 1, end: 12 },
                score_per_question: 0.25,
            },
            p2: GroupPlan::Stride {
                range: QuestionRange { start: 13, end: 28 },
                size: 4,
            },
            p3: SinglePart {
                range: QuestionRange { start: 29, end: 34 },
                score_per_question: 0.5,
            },
            ignored: Vec::new(),
        },
        PartLayout {
            id: "science".to_string(),
            name: "Combined Science".to_string(),
            total_questions: 40,
            p1: SinglePart {
                range: QuestionRange { start: 1, end: 18 },
                score_per_question: 0.25,
            },
            p2: GroupPlan::Stride {
                range: QuestionRange { start: 19, end: 34 },
                size: 4,
            },
            p3: SinglePart {
                range: QuestionRange { start: 35, end: 40 },
                score_per_question: 0.25,
            },
            ignored: Vec::new(),
        },
        PartLayout {
            id: "english".to_string(),
            name: "English".to_string(),
            total_questions: 40,
            p1: SinglePart {
                range: QuestionRange { start: 1, end: 40 },
                score_per_question: 0.25,
            },
            p2: GroupPlan::None,
            p3: SinglePart::none(),
            ignored: Vec::new(),
        },
    ]
}

pub fn find_builtin(id: &str) -> Option<PartLayout> {
    builtin_layouts().into_iter().find(|l| l.id == id)
}
