//! Vertex AI 線上預測端點客戶端

use crate::config::ChurnConfig;
use crate::domain::model::{Batch, FieldValue, RawPrediction, ValidatedBatch};
use crate::domain::ports::PredictionService;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

/// 單筆 instance：依輸入欄位順序輸出的 `欄位名稱 -> 值`
#[derive(Debug)]
pub struct Instance<'a> {
    fields: Vec<(&'a str, &'a FieldValue)>,
}

impl Serialize for Instance<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub instances: Vec<Instance<'a>>,
}

impl<'a> PredictRequest<'a> {
    /// 建立請求前先檢查每筆資料的欄位與型別，避免格式漂移送上網路
    pub fn build(
        batch: &'a Batch,
        categorical: &[String],
        numeric: &[String],
    ) -> Result<Self> {
        let mut instances = Vec::with_capacity(batch.len());

        for (index, record) in batch.records.iter().enumerate() {
            let mut fields = Vec::with_capacity(batch.columns.len());
            for column in &batch.columns {
                let value = record.get(column).ok_or_else(|| {
                    EtlError::inference(format!(
                        "instance {} is missing field '{}'",
                        index + 1,
                        column
                    ))
                })?;

                let typed_ok = if numeric.contains(column) {
                    matches!(value, FieldValue::Number(n) if n.is_finite())
                        || value.is_null()
                } else if categorical.contains(column) {
                    matches!(value, FieldValue::Text(_) | FieldValue::Null)
                } else {
                    true
                };
                if !typed_ok {
                    return Err(EtlError::inference(format!(
                        "instance {} field '{}' has unexpected value '{}'",
                        index + 1,
                        column,
                        value
                    )));
                }

                fields.push((column.as_str(), value));
            }
            if record.data.len() != fields.len() {
                return Err(EtlError::inference(format!(
                    "instance {} has fields outside the input header",
                    index + 1
                )));
            }
            instances.push(Instance { fields });
        }

        Ok(Self { instances })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    predictions: Vec<serde_json::Value>,
    #[serde(default)]
    deployed_model_id: Option<String>,
}

pub struct VertexInferenceClient {
    client: Client,
    predict_url: String,
    endpoint_name: String,
    access_token: Option<String>,
    categorical: Vec<String>,
    numeric: Vec<String>,
}

impl VertexInferenceClient {
    pub fn new(config: &ChurnConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.inference.timeout_seconds))
            .build()
            .map_err(|e| EtlError::ConfigError {
                message: format!("failed to build inference HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            predict_url: config.predict_url(),
            endpoint_name: format!(
                "projects/{}/locations/{}/endpoints/{}",
                config.project_id, config.region, config.endpoint_id
            ),
            access_token: config.access_token().map(str::to_string),
            categorical: config.schema.categorical_columns.clone(),
            numeric: config.schema.numeric_columns.clone(),
        })
    }
}

#[async_trait]
impl PredictionService for VertexInferenceClient {
    async fn predict(&self, batch: &ValidatedBatch) -> Result<Vec<RawPrediction>> {
        if batch.is_empty() {
            tracing::info!("Empty batch, skipping prediction request");
            return Ok(Vec::new());
        }

        let request_body = PredictRequest::build(batch.batch(), &self.categorical, &self.numeric)?;

        tracing::info!(
            "📡 Sending {} instances to {}",
            request_body.instances.len(),
            self.endpoint_name
        );
        tracing::debug!("Predict URL: {}", self.predict_url);

        let mut request = self.client.post(&self.predict_url).json(&request_body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EtlError::inference(format!("request to {} failed: {}", self.endpoint_name, e)))?;

        let status = response.status();
        tracing::debug!("Predict response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::inference(format!(
                "endpoint returned {}: {}",
                status,
                truncate(&body, MAX_ERROR_BODY)
            )));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| EtlError::inference(format!("unexpected response shape: {}", e)))?;

        if parsed.predictions.len() != batch.len() {
            return Err(EtlError::inference(format!(
                "endpoint returned {} predictions for {} instances",
                parsed.predictions.len(),
                batch.len()
            )));
        }

        if let Some(model) = &parsed.deployed_model_id {
            tracing::debug!("Served by deployed model {}", model);
        }

        Ok(parsed
            .predictions
            .iter()
            .enumerate()
            .map(|(index, value)| raw_prediction_from_value(index, value))
            .collect())
    }

    fn endpoint_name(&self) -> String {
        self.endpoint_name.clone()
    }
}

/// 單筆結構異常不視為錯誤，交由 PredictionMapper 轉為 Unknown
fn raw_prediction_from_value(index: usize, value: &serde_json::Value) -> RawPrediction {
    let Some(obj) = value.as_object() else {
        tracing::warn!("Prediction {} is not an object", index + 1);
        return RawPrediction::default();
    };

    let scores = obj
        .get("scores")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|s| s.as_f64().unwrap_or(f64::NAN))
                .collect()
        })
        .unwrap_or_default();

    let classes = obj
        .get("classes")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|c| match c {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    _ => String::new(),
                })
                .collect()
        })
        .unwrap_or_default();

    RawPrediction { scores, classes }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::core::input::parse_delimited;
    use crate::core::schema::SchemaValidator;
    use serde_json::json;

    #[test]
    fn test_request_serializes_typed_instances() {
        let batch = parse_delimited(b"CustServCalls,DataUsage\n3,2.5\n", b',').unwrap();
        let schema = SchemaConfig::default();
        let validated = SchemaValidator::from_config(&schema).validate(&batch).unwrap();

        let request = PredictRequest::build(
            validated.batch(),
            &schema.categorical_columns,
            &schema.numeric_columns,
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"instances": [{"CustServCalls": "3", "DataUsage": 2.5}]})
        );
    }

    #[test]
    fn test_request_rejects_unvalidated_numeric_text() {
        let batch = parse_delimited(b"DataUsage\n2.5\n", b',').unwrap();
        let schema = SchemaConfig::default();

        let err = PredictRequest::build(&batch, &schema.categorical_columns, &schema.numeric_columns)
            .unwrap_err();
        assert!(matches!(err, EtlError::InferenceError { .. }));
    }

    #[test]
    fn test_raw_prediction_tolerates_numeric_classes() {
        let raw = raw_prediction_from_value(0, &json!({"scores": [0.1, 0.9], "classes": [0, 1]}));
        assert_eq!(raw.classes, vec!["0", "1"]);
        assert_eq!(raw.scores, vec![0.1, 0.9]);
    }

    #[test]
    fn test_raw_prediction_from_malformed_value_is_empty() {
        assert_eq!(raw_prediction_from_value(0, &json!("oops")), RawPrediction::default());
        let raw = raw_prediction_from_value(0, &json!({"scores": ["x"], "classes": ["1"]}));
        assert!(raw.scores[0].is_nan());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
