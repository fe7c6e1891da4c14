use chrono::Utc;
use churn_etl::domain::model::{
    FieldValue, LabeledBatch, LabeledRecord, MappingOutcome, Record,
};
use churn_etl::domain::ports::TableSink;
use churn_etl::{BigQuerySink, ChurnConfig, EtlError};
use httpmock::prelude::*;
use serde_json::json;
use std::collections::HashMap;

const UPLOAD_PATH: &str = "/upload/bigquery/v2/projects/churn-demo/jobs";

fn config(server: &MockServer, extra: &str) -> ChurnConfig {
    let toml_content = format!(
        r#"
project_id = "churn-demo"
region = "us-central1"
endpoint_id = "1"

[sink]
base_url = "{}"
dataset = "analytics"
table = "churn_scores"
poll_interval_ms = 10
{}
"#,
        server.base_url(),
        extra
    );
    ChurnConfig::from_toml_str(&toml_content).unwrap()
}

fn labeled_batch() -> LabeledBatch {
    let mut data = HashMap::new();
    data.insert("DataUsage".to_string(), FieldValue::Number(2.5));
    LabeledBatch {
        columns: vec!["DataUsage".to_string()],
        records: vec![LabeledRecord {
            record: Record { data },
            outcome: MappingOutcome::Affirmative {
                class: "1".to_string(),
                score: 0.8,
            },
            persisted_at: None,
        }],
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_polls_running_job_until_done() {
    let server = MockServer::start_async().await;

    let upload_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(UPLOAD_PATH)
                .query_param("uploadType", "multipart")
                .header_exists("content-type")
                .body_contains("\"datasetId\":\"analytics\"")
                .body_contains("\"tableId\":\"churn_scores\"")
                .body_contains("NEWLINE_DELIMITED_JSON")
                .body_contains("\"DataUsage\":2.5");
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "churn-demo", "jobId": "job_42", "location": "EU"},
                "status": {"state": "RUNNING"}
            }));
        })
        .await;

    let poll_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/bigquery/v2/projects/churn-demo/jobs/job_42")
                .query_param("location", "EU");
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "churn-demo", "jobId": "job_42", "location": "EU"},
                "status": {"state": "DONE"}
            }));
        })
        .await;

    let sink = BigQuerySink::new(&config(&server, "")).unwrap();
    let receipt = sink.append(&labeled_batch()).await.unwrap();

    upload_mock.assert_async().await;
    poll_mock.assert_async().await;
    assert_eq!(receipt.rows_written, 1);
    assert_eq!(receipt.job_id.as_deref(), Some("job_42"));
    assert_eq!(receipt.destination, "churn-demo.analytics.churn_scores");
}

#[tokio::test]
async fn test_job_error_result_is_persistence_error() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path(UPLOAD_PATH);
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "churn-demo", "jobId": "job_bad"},
                "status": {
                    "state": "DONE",
                    "errorResult": {"reason": "invalid", "message": "Provided Schema does not match Table"},
                    "errors": [{"reason": "invalid", "message": "Field prediction_time has changed type"}]
                }
            }));
        })
        .await;

    let sink = BigQuerySink::new(&config(&server, "")).unwrap();
    let err = sink.append(&labeled_batch()).await.unwrap_err();

    match err {
        EtlError::PersistenceError { message } => {
            assert!(message.contains("job_bad"));
            assert!(message.contains("Provided Schema does not match Table"));
            assert!(message.contains("changed type"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_job_that_never_finishes_times_out() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path(UPLOAD_PATH);
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "churn-demo", "jobId": "job_slow"},
                "status": {"state": "PENDING"}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/bigquery/v2/projects/churn-demo/jobs/job_slow");
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "churn-demo", "jobId": "job_slow"},
                "status": {"state": "RUNNING"}
            }));
        })
        .await;

    let sink = BigQuerySink::new(&config(&server, "job_timeout_seconds = 1")).unwrap();
    let err = sink.append(&labeled_batch()).await.unwrap_err();

    assert!(matches!(err, EtlError::PersistenceError { .. }));
    assert!(err.to_string().contains("still RUNNING"));
}

#[tokio::test]
async fn test_configured_location_is_sent_with_job() {
    let server = MockServer::start_async().await;

    let upload_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(UPLOAD_PATH)
                .body_contains("\"location\":\"asia-east1\"");
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "churn-demo", "jobId": "job_loc"},
                "status": {"state": "DONE"}
            }));
        })
        .await;

    let sink = BigQuerySink::new(&config(&server, "location = \"asia-east1\"")).unwrap();
    sink.append(&labeled_batch()).await.unwrap();

    upload_mock.assert_async().await;
}
