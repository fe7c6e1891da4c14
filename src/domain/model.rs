use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 單一欄位值；CSV 讀入時皆為文字，驗證後宣告為數值的欄位轉成 `Number`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, FieldValue>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.data.get(field)
    }
}

/// 一次上傳的完整資料；列順序即為推論結果的對應依據
#[derive(Debug, Clone)]
pub struct Batch {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            columns,
            records,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// 已通過 schema 驗證的 Batch，只能由 `SchemaValidator` 產生
#[derive(Debug, Clone)]
pub struct ValidatedBatch(Batch);

impl ValidatedBatch {
    pub(crate) fn new(batch: Batch) -> Self {
        Self(batch)
    }

    pub fn batch(&self) -> &Batch {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 模型服務對單筆資料的原始輸出；`scores[i]` 對應 `classes[i]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPrediction {
    pub scores: Vec<f64>,
    pub classes: Vec<String>,
}

impl RawPrediction {
    pub fn new(scores: Vec<f64>, classes: Vec<&str>) -> Self {
        Self {
            scores,
            classes: classes.into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BusinessLabel {
    #[serde(rename = "Churn")]
    Churn,
    #[serde(rename = "No Churn")]
    NoChurn,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl BusinessLabel {
    pub const ALL: [BusinessLabel; 3] = [
        BusinessLabel::Churn,
        BusinessLabel::NoChurn,
        BusinessLabel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessLabel::Churn => "Churn",
            BusinessLabel::NoChurn => "No Churn",
            BusinessLabel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BusinessLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnmappableReason {
    EmptyScores,
    LengthMismatch { scores: usize, classes: usize },
    NonFiniteScore { index: usize },
    MissingClass { index: usize },
}

impl fmt::Display for UnmappableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmappableReason::EmptyScores => f.write_str("empty scores"),
            UnmappableReason::LengthMismatch { scores, classes } => {
                write!(f, "{} scores but {} classes", scores, classes)
            }
            UnmappableReason::NonFiniteScore { index } => {
                write!(f, "non-finite score at index {}", index)
            }
            UnmappableReason::MissingClass { index } => {
                write!(f, "missing class at index {}", index)
            }
        }
    }
}

/// 單筆預測的對應結果，所有失敗情形都列舉為 `Unknown` 的原因
#[derive(Debug, Clone, PartialEq)]
pub enum MappingOutcome {
    Affirmative { class: String, score: f64 },
    Negative { class: String, score: f64 },
    Unknown(UnmappableReason),
}

impl MappingOutcome {
    pub fn label(&self) -> BusinessLabel {
        match self {
            MappingOutcome::Affirmative { .. } => BusinessLabel::Churn,
            MappingOutcome::Negative { .. } => BusinessLabel::NoChurn,
            MappingOutcome::Unknown(_) => BusinessLabel::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabeledRecord {
    pub record: Record,
    pub outcome: MappingOutcome,
    pub persisted_at: Option<DateTime<Utc>>,
}

impl LabeledRecord {
    pub fn label(&self) -> BusinessLabel {
        self.outcome.label()
    }
}

#[derive(Debug, Clone)]
pub struct LabeledBatch {
    pub columns: Vec<String>,
    pub records: Vec<LabeledRecord>,
    pub created_at: DateTime<Utc>,
}

impl LabeledBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn labels(&self) -> Vec<BusinessLabel> {
        self.records.iter().map(LabeledRecord::label).collect()
    }

    pub fn unknown_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.label() == BusinessLabel::Unknown)
            .count()
    }

    /// 回傳一份所有列共用同一寫入時間戳的新 batch
    pub fn stamped(&self, persisted_at: DateTime<Utc>) -> LabeledBatch {
        LabeledBatch {
            columns: self.columns.clone(),
            records: self
                .records
                .iter()
                .map(|r| LabeledRecord {
                    record: r.record.clone(),
                    outcome: r.outcome.clone(),
                    persisted_at: Some(persisted_at),
                })
                .collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelShare {
    pub label: BusinessLabel,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryReport {
    pub total: usize,
    pub entries: Vec<LabelShare>,
}

impl SummaryReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn percentage_of(&self, label: BusinessLabel) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.percentage)
    }

    pub fn total_percentage(&self) -> f64 {
        self.entries.iter().map(|e| e.percentage).sum()
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub labeled: LabeledBatch,
    pub summary: SummaryReport,
}

/// 外部資料表寫入完成後的回執
#[derive(Debug, Clone)]
pub struct SinkReceipt {
    pub destination: String,
    pub rows_written: usize,
    pub job_id: Option<String>,
    pub persisted_at: DateTime<Utc>,
}
