use crate::domain::model::{SinkReceipt, SummaryReport};
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    pub extract: Duration,
    pub transform: Duration,
    pub load: Duration,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: usize,
    pub unknown: usize,
    pub summary: SummaryReport,
    pub receipt: SinkReceipt,
    pub timings: StageTimings,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// 每次呼叫都是獨立的一批；任何階段失敗都直接中止並回傳該錯誤
    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("🚀 Starting churn prediction run");
        let mut timings = StageTimings::default();

        let started = Instant::now();
        let batch = self.pipeline.extract().await?;
        timings.extract = started.elapsed();
        tracing::info!("Extracted {} records", batch.len());

        let started = Instant::now();
        let result = self.pipeline.transform(batch).await?;
        timings.transform = started.elapsed();

        for share in &result.summary.entries {
            tracing::info!(
                "📊 {}: {} rows ({:.2}%)",
                share.label,
                share.count,
                share.percentage
            );
        }

        let started = Instant::now();
        let receipt = self.pipeline.load(&result).await?;
        timings.load = started.elapsed();
        tracing::info!(
            "Persisted {} rows to {}",
            receipt.rows_written,
            receipt.destination
        );

        tracing::debug!(
            "Stage timings - extract: {:?}, transform: {:?}, load: {:?}",
            timings.extract,
            timings.transform,
            timings.load
        );

        Ok(RunReport {
            rows: result.labeled.len(),
            unknown: result.labeled.unknown_count(),
            summary: result.summary,
            receipt,
            timings,
        })
    }
}
