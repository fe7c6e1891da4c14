use crate::config::ChurnConfig;
use crate::core::aggregate::Aggregator;
use crate::core::input::parse_delimited;
use crate::core::mapper::PredictionMapper;
use crate::core::schema::SchemaValidator;
use crate::domain::model::{
    Batch, LabeledBatch, LabeledRecord, MappingOutcome, SinkReceipt, TransformResult,
    ValidatedBatch,
};
use crate::domain::ports::{Pipeline, PredictionService, Storage, TableSink};
use crate::utils::error::{EtlError, Result};

#[derive(Debug, Clone)]
pub struct InputSource {
    pub path: String,
    pub delimiter: u8,
}

impl InputSource {
    pub fn csv(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }
}

/// validate → infer → map → aggregate → persist
pub struct ChurnPipeline<S: Storage, P: PredictionService, K: TableSink> {
    storage: S,
    input: InputSource,
    validator: SchemaValidator,
    mapper: PredictionMapper,
    aggregator: Aggregator,
    predictor: P,
    sink: K,
}

impl<S: Storage, P: PredictionService, K: TableSink> ChurnPipeline<S, P, K> {
    pub fn new(storage: S, input: InputSource, config: &ChurnConfig, predictor: P, sink: K) -> Self {
        Self {
            storage,
            input,
            validator: SchemaValidator::from_config(&config.schema),
            mapper: PredictionMapper::new(config.inference.positive_class.clone()),
            aggregator: Aggregator::new(),
            predictor,
            sink,
        }
    }

    /// 只讀取並驗證輸入，不呼叫任何遠端服務
    pub async fn validate_only(&self) -> Result<ValidatedBatch> {
        let batch = self.extract().await?;
        self.validator.validate(&batch)
    }

    pub fn sink_destination(&self) -> String {
        self.sink.destination()
    }

    pub fn endpoint_name(&self) -> String {
        self.predictor.endpoint_name()
    }

    fn label(&self, validated: &ValidatedBatch, outcomes: Vec<MappingOutcome>) -> LabeledBatch {
        let batch = validated.batch();
        let records = batch
            .records
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (record, outcome))| {
                if let MappingOutcome::Unknown(reason) = &outcome {
                    tracing::warn!("Row {} labeled Unknown: {}", index + 1, reason);
                }
                LabeledRecord {
                    record: record.clone(),
                    outcome,
                    persisted_at: None,
                }
            })
            .collect();

        LabeledBatch {
            columns: batch.columns.clone(),
            records,
            created_at: batch.created_at,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, P: PredictionService, K: TableSink> Pipeline for ChurnPipeline<S, P, K> {
    async fn extract(&self) -> Result<Batch> {
        tracing::info!("📂 Reading input from {}", self.input.path);
        let bytes = self.storage.read_file(&self.input.path).await?;
        parse_delimited(&bytes, self.input.delimiter)
    }

    async fn transform(&self, batch: Batch) -> Result<TransformResult> {
        let validated = self.validator.validate(&batch)?;

        let predictions = self.predictor.predict(&validated).await?;
        if predictions.len() != validated.len() {
            return Err(EtlError::inference(format!(
                "received {} predictions for {} records",
                predictions.len(),
                validated.len()
            )));
        }

        let outcomes = self.mapper.map_all(&predictions);
        let labeled = self.label(&validated, outcomes);
        let summary = self.aggregator.summarize(&labeled.labels());

        tracing::info!(
            "🏷️ Labeled {} records ({} unknown)",
            labeled.len(),
            labeled.unknown_count()
        );

        Ok(TransformResult { labeled, summary })
    }

    async fn load(&self, result: &TransformResult) -> Result<SinkReceipt> {
        self.sink.append(&result.labeled).await
    }
}
