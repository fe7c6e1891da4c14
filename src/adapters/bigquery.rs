//! BigQuery 載入工作 (load job) 寫入器：一次上傳整批，輪詢至工作完成

use crate::adapters::rows::OutputLayout;
use crate::config::ChurnConfig;
use crate::domain::model::{LabeledBatch, SinkReceipt};
use crate::domain::ports::TableSink;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const BOUNDARY: &str = "churn_etl_load_boundary";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: Option<JobReference>,
    status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    error_result: Option<ErrorProto>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

impl ErrorProto {
    fn describe(&self) -> String {
        match (&self.reason, &self.message) {
            (Some(reason), Some(message)) => format!("{}: {}", reason, message),
            (None, Some(message)) => message.clone(),
            (Some(reason), None) => reason.clone(),
            (None, None) => "unspecified error".to_string(),
        }
    }
}

pub struct BigQuerySink {
    client: Client,
    base_url: String,
    project_id: String,
    dataset: String,
    table: String,
    table_id: String,
    location: Option<String>,
    access_token: Option<String>,
    label_column: String,
    timestamp_column: String,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl BigQuerySink {
    pub fn new(config: &ChurnConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.sink.timeout_seconds))
            .build()
            .map_err(|e| EtlError::ConfigError {
                message: format!("failed to build BigQuery HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.bigquery_base_url(),
            project_id: config.project_id.clone(),
            dataset: config.sink.dataset.clone(),
            table: config.sink.table.clone(),
            table_id: config.table_id(),
            location: config.sink.location.clone(),
            access_token: config.access_token().map(str::to_string),
            label_column: config.sink.label_column.clone(),
            timestamp_column: config.sink.timestamp_column.clone(),
            poll_interval: Duration::from_millis(config.sink.poll_interval_ms),
            job_timeout: Duration::from_secs(config.sink.job_timeout_seconds),
        })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/bigquery/v2/projects/{}/jobs",
            self.base_url, self.project_id
        )
    }

    fn job_url(&self, job_id: &str) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/jobs/{}",
            self.base_url, self.project_id, job_id
        )
    }

    fn job_metadata(&self, job_id: &str) -> serde_json::Value {
        let mut job_reference = json!({
            "projectId": self.project_id,
            "jobId": job_id,
        });
        if let Some(location) = &self.location {
            job_reference["location"] = json!(location);
        }

        json!({
            "jobReference": job_reference,
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.project_id,
                        "datasetId": self.dataset,
                        "tableId": self.table,
                    },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": "WRITE_APPEND",
                    "createDisposition": "CREATE_IF_NEEDED",
                    "autodetect": true,
                }
            }
        })
    }

    fn ndjson(&self, batch: &LabeledBatch) -> Result<String> {
        let layout = OutputLayout::new(&batch.columns, &self.label_column, &self.timestamp_column);
        let mut body = String::new();
        for record in &batch.records {
            let line = serde_json::to_string(&layout.json_row(record))?;
            body.push_str(&line);
            body.push('\n');
        }
        Ok(body)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_job(&self, response: reqwest::Response) -> Result<JobResource> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::persistence(format!(
                "BigQuery returned {}: {}",
                status,
                body.chars().take(512).collect::<String>()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| EtlError::persistence(format!("unexpected job response: {}", e)))
    }

    async fn wait_for_job(&self, job_id: &str, location: Option<String>, mut job: JobResource) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.job_timeout;

        loop {
            let status = job.status.as_ref().ok_or_else(|| {
                EtlError::persistence(format!("job {} response has no status", job_id))
            })?;

            if let Some(error) = &status.error_result {
                let details: Vec<String> = status.errors.iter().map(ErrorProto::describe).collect();
                return Err(EtlError::persistence(format!(
                    "load job {} failed: {}{}",
                    job_id,
                    error.describe(),
                    if details.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", details.join("; "))
                    }
                )));
            }

            if status.state == "DONE" {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(EtlError::persistence(format!(
                    "load job {} still {} after {:?}",
                    job_id, status.state, self.job_timeout
                )));
            }

            tracing::debug!("Load job {} is {}, polling again", job_id, status.state);
            tokio::time::sleep(self.poll_interval).await;

            let mut request = self.client.get(self.job_url(job_id));
            if let Some(location) = &location {
                request = request.query(&[("location", location)]);
            }
            let response = self
                .with_auth(request)
                .send()
                .await
                .map_err(|e| EtlError::persistence(format!("polling job {} failed: {}", job_id, e)))?;
            job = self.read_job(response).await?;
        }
    }
}

static JOB_SEQ: AtomicU64 = AtomicU64::new(0);

/// 時間戳加上隨機尾碼；同一微秒內的多次執行也不會撞到同一個 job id
fn job_id_for(persisted_at: DateTime<Utc>) -> String {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u32(std::process::id());
    hasher.write_u64(JOB_SEQ.fetch_add(1, Ordering::Relaxed));
    format!(
        "churn_etl_{}_{:016x}",
        persisted_at.format("%Y%m%d_%H%M%S_%6f"),
        hasher.finish()
    )
}

fn multipart_body(metadata: &serde_json::Value, data: &str) -> String {
    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: application/octet-stream\r\n\r\n{data}\r\n--{b}--\r\n",
        b = BOUNDARY,
        meta = metadata,
        data = data
    )
}

#[async_trait]
impl TableSink for BigQuerySink {
    async fn append(&self, batch: &LabeledBatch) -> Result<SinkReceipt> {
        let persisted_at = Utc::now();

        if batch.is_empty() {
            tracing::info!("Empty batch, nothing appended to {}", self.destination());
            return Ok(SinkReceipt {
                destination: self.destination(),
                rows_written: 0,
                job_id: None,
                persisted_at,
            });
        }

        let stamped = batch.stamped(persisted_at);
        let data = self.ndjson(&stamped)?;
        let job_id = job_id_for(persisted_at);
        let body = multipart_body(&self.job_metadata(&job_id), &data);

        tracing::info!(
            "💾 Appending {} rows to {} (job {})",
            stamped.len(),
            self.destination(),
            job_id
        );
        tracing::debug!("Load payload is {} bytes", body.len());

        let request = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "multipart")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", BOUNDARY),
            )
            .body(body);

        let response = self
            .with_auth(request)
            .send()
            .await
            .map_err(|e| EtlError::persistence(format!("load request failed: {}", e)))?;
        let job = self.read_job(response).await?;

        let (job_id, location) = match &job.job_reference {
            Some(reference) => (
                reference.job_id.clone(),
                reference.location.clone().or_else(|| self.location.clone()),
            ),
            None => (job_id, self.location.clone()),
        };

        self.wait_for_job(&job_id, location, job).await?;

        tracing::info!("✅ Load job {} completed", job_id);
        Ok(SinkReceipt {
            destination: self.destination(),
            rows_written: stamped.len(),
            job_id: Some(job_id),
            persisted_at,
        })
    }

    fn destination(&self) -> String {
        self.table_id.clone()
    }
}
