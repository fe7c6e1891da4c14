use crate::config::SchemaConfig;
use crate::domain::model::{Batch, FieldValue, Record, ValidatedBatch};
use crate::utils::error::{EtlError, Result};

/// 依宣告的欄位型別檢查並轉換輸入；任何數值欄位解析失敗即整批拒絕
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    categorical: Vec<String>,
    numeric: Vec<String>,
}

impl SchemaValidator {
    pub fn new(categorical: Vec<String>, numeric: Vec<String>) -> Self {
        Self {
            categorical,
            numeric,
        }
    }

    pub fn from_config(schema: &SchemaConfig) -> Self {
        Self::new(
            schema.categorical_columns.clone(),
            schema.numeric_columns.clone(),
        )
    }

    pub fn validate(&self, batch: &Batch) -> Result<ValidatedBatch> {
        let categorical: Vec<&String> = self
            .categorical
            .iter()
            .filter(|c| batch.has_column(c))
            .collect();
        let numeric: Vec<&String> = self
            .numeric
            .iter()
            .filter(|c| batch.has_column(c))
            .collect();

        let skipped = self.categorical.len() + self.numeric.len() - categorical.len() - numeric.len();
        if skipped > 0 {
            tracing::debug!("{} declared columns not present in input, skipped", skipped);
        }

        let mut records = Vec::with_capacity(batch.len());
        for (index, record) in batch.records.iter().enumerate() {
            let mut data = record.data.clone();

            for column in &categorical {
                if let Some(value) = data.get_mut(column.as_str()) {
                    *value = to_text(value);
                }
            }

            for column in &numeric {
                if let Some(value) = data.get_mut(column.as_str()) {
                    *value = to_number(value).ok_or_else(|| EtlError::CoercionError {
                        column: column.to_string(),
                        row: index + 1,
                        value: value.to_string(),
                    })?;
                }
            }

            records.push(Record { data });
        }

        tracing::info!(
            "✅ Schema validated: {} rows, {} categorical and {} numeric columns coerced",
            records.len(),
            categorical.len(),
            numeric.len()
        );

        Ok(ValidatedBatch::new(Batch {
            columns: batch.columns.clone(),
            records,
            created_at: batch.created_at,
        }))
    }
}

fn to_text(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Null => FieldValue::Null,
        FieldValue::Number(n) => FieldValue::Text(n.to_string()),
        FieldValue::Text(s) => FieldValue::Text(s.clone()),
    }
}

/// 一般試算表匯出的缺值標記，與空白儲存格同樣視為 null
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// 空值與缺值標記保留為 null；其餘非有限值 (inf) 視為無法解析
fn to_number(value: &FieldValue) -> Option<FieldValue> {
    match value {
        FieldValue::Null => Some(FieldValue::Null),
        FieldValue::Number(n) if n.is_finite() => Some(FieldValue::Number(*n)),
        FieldValue::Number(_) => None,
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
                return Some(FieldValue::Null);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FieldValue::Number)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::parse_delimited;

    fn validator() -> SchemaValidator {
        SchemaValidator::from_config(&SchemaConfig::default())
    }

    #[test]
    fn test_coerces_declared_columns() {
        let batch =
            parse_delimited(b"CustServCalls,DataUsage,Extra\n3,2.5,x\n", b',').unwrap();
        let validated = validator().validate(&batch).unwrap();
        let record = &validated.batch().records[0];

        assert_eq!(
            record.get("CustServCalls"),
            Some(&FieldValue::Text("3".into()))
        );
        assert_eq!(record.get("DataUsage"), Some(&FieldValue::Number(2.5)));
        assert_eq!(record.get("Extra"), Some(&FieldValue::Text("x".into())));
    }

    #[test]
    fn test_non_numeric_value_rejects_whole_batch() {
        let batch = parse_delimited(b"DataUsage,RoamMins\n1.0,2\nabc,3\n", b',').unwrap();
        let err = validator().validate(&batch).unwrap_err();

        match err {
            EtlError::CoercionError { column, row, value } => {
                assert_eq!(column, "DataUsage");
                assert_eq!(row, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_declared_columns_are_skipped() {
        let batch = parse_delimited(b"Unrelated\nhello\n", b',').unwrap();
        let validated = validator().validate(&batch).unwrap();
        assert_eq!(validated.len(), 1);
    }

    #[test]
    fn test_empty_numeric_cell_stays_null() {
        let batch = parse_delimited(b"DataUsage,DataPlan\n,\n", b',').unwrap();
        let validated = validator().validate(&batch).unwrap();
        let record = &validated.batch().records[0];
        assert_eq!(record.get("DataUsage"), Some(&FieldValue::Null));
        assert_eq!(record.get("DataPlan"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_missing_markers_become_null() {
        let batch = parse_delimited(
            b"DataUsage,RoamMins,OverageFee\n1.5,NA,NaN\nN/A,3,null\n",
            b',',
        )
        .unwrap();
        let validated = validator().validate(&batch).unwrap();
        let records = &validated.batch().records;

        assert_eq!(records[0].get("DataUsage"), Some(&FieldValue::Number(1.5)));
        assert_eq!(records[0].get("RoamMins"), Some(&FieldValue::Null));
        assert_eq!(records[0].get("OverageFee"), Some(&FieldValue::Null));
        assert_eq!(records[1].get("DataUsage"), Some(&FieldValue::Null));
        assert_eq!(records[1].get("RoamMins"), Some(&FieldValue::Number(3.0)));
        assert_eq!(records[1].get("OverageFee"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_infinite_text_is_rejected() {
        let batch = parse_delimited(b"OverageFee\ninf\n", b',').unwrap();
        assert!(matches!(
            validator().validate(&batch),
            Err(EtlError::CoercionError { .. })
        ));
    }

    #[test]
    fn test_input_batch_is_left_untouched() {
        let batch = parse_delimited(b"DataUsage\n4\n", b',').unwrap();
        let _ = validator().validate(&batch).unwrap();
        assert_eq!(
            batch.records[0].get("DataUsage"),
            Some(&FieldValue::Text("4".into()))
        );
    }
}
