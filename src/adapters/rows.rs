use crate::domain::model::{FieldValue, LabeledRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// 輸出列的欄位配置：原始欄位 + 標籤欄 + 寫入時間欄
#[derive(Debug, Clone)]
pub(crate) struct OutputLayout {
    passthrough: Vec<String>,
    label_column: String,
    timestamp_column: String,
}

impl OutputLayout {
    pub(crate) fn new(columns: &[String], label_column: &str, timestamp_column: &str) -> Self {
        let passthrough = columns
            .iter()
            .filter(|c| {
                let collides = c.as_str() == label_column || c.as_str() == timestamp_column;
                if collides {
                    tracing::warn!("Input column '{}' is replaced by the derived column", c);
                }
                !collides
            })
            .cloned()
            .collect();

        Self {
            passthrough,
            label_column: label_column.to_string(),
            timestamp_column: timestamp_column.to_string(),
        }
    }

    pub(crate) fn header(&self) -> Vec<String> {
        let mut header = self.passthrough.clone();
        header.push(self.label_column.clone());
        header.push(self.timestamp_column.clone());
        header
    }

    pub(crate) fn csv_row(&self, record: &LabeledRecord) -> Vec<String> {
        let mut row: Vec<String> = self
            .passthrough
            .iter()
            .map(|c| record.record.get(c).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        row.push(record.label().to_string());
        row.push(format_timestamp(record.persisted_at));
        row
    }

    pub(crate) fn json_row(&self, record: &LabeledRecord) -> Map<String, Value> {
        let mut row = Map::new();
        for column in &self.passthrough {
            let value = match record.record.get(column) {
                Some(FieldValue::Number(n)) => serde_json::Number::from_f64(*n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                Some(FieldValue::Text(s)) => Value::String(s.clone()),
                Some(FieldValue::Null) | None => Value::Null,
            };
            row.insert(column.clone(), value);
        }
        row.insert(
            self.label_column.clone(),
            Value::String(record.label().to_string()),
        );
        row.insert(
            self.timestamp_column.clone(),
            match record.persisted_at {
                Some(at) => Value::String(format_timestamp(Some(at))),
                None => Value::Null,
            },
        );
        row
    }
}

pub(crate) fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MappingOutcome, Record};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn labeled() -> LabeledRecord {
        let mut data = HashMap::new();
        data.insert("DataUsage".to_string(), FieldValue::Number(2.5));
        data.insert("prediction".to_string(), FieldValue::Text("old".into()));
        LabeledRecord {
            record: Record { data },
            outcome: MappingOutcome::Affirmative {
                class: "1".into(),
                score: 0.8,
            },
            persisted_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_layout_replaces_colliding_columns() {
        let layout = OutputLayout::new(
            &["DataUsage".to_string(), "prediction".to_string()],
            "prediction",
            "prediction_time",
        );
        assert_eq!(
            layout.header(),
            vec!["DataUsage", "prediction", "prediction_time"]
        );
        assert_eq!(
            layout.csv_row(&labeled()),
            vec!["2.5", "Churn", "2024-05-01T12:00:00.000000Z"]
        );
    }

    #[test]
    fn test_json_row_keeps_types() {
        let layout = OutputLayout::new(&["DataUsage".to_string()], "prediction", "prediction_time");
        let row = layout.json_row(&labeled());

        assert_eq!(row["DataUsage"], serde_json::json!(2.5));
        assert_eq!(row["prediction"], serde_json::json!("Churn"));
        assert_eq!(
            row["prediction_time"],
            serde_json::json!("2024-05-01T12:00:00.000000Z")
        );
    }
}
