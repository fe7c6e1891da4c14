use crate::domain::model::{Batch, FieldValue, Record};
use crate::utils::error::{EtlError, Result};
use std::collections::{HashMap, HashSet};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 將含標題列的分隔檔解析為 Batch，保留欄位與列順序
pub fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<Batch> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(EtlError::schema("missing header row"));
    }

    let mut seen = HashSet::new();
    for column in &columns {
        if column.is_empty() {
            return Err(EtlError::schema("header contains an empty column name"));
        }
        if !seen.insert(column.as_str()) {
            return Err(EtlError::schema(format!("duplicate column '{}'", column)));
        }
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| match e.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => EtlError::schema(format!(
                "row {} has {} fields, expected {}",
                index + 1,
                len,
                expected_len
            )),
            _ => EtlError::CsvError(e),
        })?;

        let data: HashMap<String, FieldValue> = columns
            .iter()
            .zip(row.iter())
            .map(|(column, cell)| {
                let value = if cell.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::Text(cell.to_string())
                };
                (column.clone(), value)
            })
            .collect();

        records.push(Record { data });
    }

    tracing::debug!(
        "Parsed {} rows with {} columns from input",
        records.len(),
        columns.len()
    );

    Ok(Batch::new(columns, records))
}
