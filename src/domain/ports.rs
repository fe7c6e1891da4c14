use crate::domain::model::{
    Batch, LabeledBatch, RawPrediction, SinkReceipt, TransformResult, ValidatedBatch,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// 只在檔案不存在時建立並寫入完整內容；已存在則回傳 `false`，不動既有內容
    fn create_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// 附加到檔尾，不覆寫既有內容
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 託管分類模型；回傳結果必須與輸入逐列對齊
#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, batch: &ValidatedBatch) -> Result<Vec<RawPrediction>>;
    fn endpoint_name(&self) -> String;
}

/// 外部持久化資料表，一次呼叫為一次 append
#[async_trait]
pub trait TableSink: Send + Sync {
    async fn append(&self, batch: &LabeledBatch) -> Result<SinkReceipt>;
    fn destination(&self) -> String;
}

#[async_trait]
impl<T: TableSink + ?Sized> TableSink for Box<T> {
    async fn append(&self, batch: &LabeledBatch) -> Result<SinkReceipt> {
        (**self).append(batch).await
    }

    fn destination(&self) -> String {
        (**self).destination()
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Batch>;
    async fn transform(&self, batch: Batch) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<SinkReceipt>;
}
