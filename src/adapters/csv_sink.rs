use crate::adapters::rows::OutputLayout;
use crate::config::ChurnConfig;
use crate::domain::model::{LabeledBatch, SinkReceipt};
use crate::domain::ports::{Storage, TableSink};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::Utc;

/// 將結果附加到本地 CSV 檔；既有檔案的標題必須一致
pub struct CsvFileSink<S: Storage> {
    storage: S,
    output_path: String,
    filename: String,
    label_column: String,
    timestamp_column: String,
}

impl<S: Storage> CsvFileSink<S> {
    pub fn new(storage: S, config: &ChurnConfig) -> Self {
        Self {
            storage,
            output_path: config.sink.output_path.clone(),
            filename: config.sink.filename.clone(),
            label_column: config.sink.label_column.clone(),
            timestamp_column: config.sink.timestamp_column.clone(),
        }
    }

    /// 既有檔案的標題列，以及檔尾是否缺少換行
    async fn existing_header(&self) -> Result<Option<(Vec<String>, bool)>> {
        match self.storage.read_file(&self.filename).await {
            Ok(bytes) => {
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(true)
                    .from_reader(bytes.as_slice());
                let header: Vec<String> = reader.headers()?.iter().map(String::from).collect();
                if header.is_empty() {
                    return Ok(None);
                }
                Ok(Some((header, !bytes.ends_with(b"\n"))))
            }
            Err(EtlError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn check_header(&self, existing: &[String], header: &[String]) -> Result<()> {
        if existing != header {
            return Err(EtlError::persistence(format!(
                "schema mismatch with existing {}: expected [{}], got [{}]",
                self.filename,
                existing.join(", "),
                header.join(", ")
            )));
        }
        Ok(())
    }

    fn encode(
        &self,
        layout: &OutputLayout,
        batch: &LabeledBatch,
        with_header: bool,
    ) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if with_header {
            writer.write_record(layout.header())?;
        }
        for record in &batch.records {
            writer.write_record(layout.csv_row(record))?;
        }
        writer
            .into_inner()
            .map_err(|e| EtlError::persistence(format!("failed to flush CSV: {}", e)))
    }

    async fn append_rows(
        &self,
        layout: &OutputLayout,
        batch: &LabeledBatch,
        existing: (Vec<String>, bool),
    ) -> Result<()> {
        let (existing_header, missing_newline) = existing;
        self.check_header(&existing_header, &layout.header())?;

        let mut rows = Vec::new();
        if missing_newline {
            rows.push(b'\n');
        }
        rows.extend(self.encode(layout, batch, false)?);
        self.storage.append_file(&self.filename, &rows).await
    }

    async fn write(&self, batch: &LabeledBatch) -> Result<usize> {
        let layout = OutputLayout::new(&batch.columns, &self.label_column, &self.timestamp_column);

        if let Some(existing) = self.existing_header().await? {
            self.append_rows(&layout, batch, existing).await?;
            return Ok(batch.len());
        }

        // 新檔：標題與資料一次建立；若同時有其他寫入者先建好，改走附加
        let content = self.encode(&layout, batch, true)?;
        if !self.storage.create_file(&self.filename, &content).await? {
            match self.existing_header().await? {
                Some(existing) => self.append_rows(&layout, batch, existing).await?,
                None => self.storage.append_file(&self.filename, &content).await?,
            }
        }
        Ok(batch.len())
    }
}

#[async_trait]
impl<S: Storage> TableSink for CsvFileSink<S> {
    async fn append(&self, batch: &LabeledBatch) -> Result<SinkReceipt> {
        let persisted_at = Utc::now();
        let stamped = batch.stamped(persisted_at);

        tracing::info!("💾 Appending {} rows to {}", stamped.len(), self.destination());

        let rows_written = self.write(&stamped).await.map_err(|e| match e {
            EtlError::PersistenceError { .. } => e,
            other => EtlError::persistence(other.to_string()),
        })?;

        Ok(SinkReceipt {
            destination: self.destination(),
            rows_written,
            job_id: None,
            persisted_at,
        })
    }

    fn destination(&self) -> String {
        format!("{}/{}", self.output_path.trim_end_matches('/'), self.filename)
    }
}
