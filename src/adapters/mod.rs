// Adapters layer: concrete implementations for external systems (storage, inference endpoint, tables).

pub mod bigquery;
pub mod csv_sink;
mod rows;
pub mod storage;
pub mod vertex;

pub use bigquery::BigQuerySink;
pub use csv_sink::CsvFileSink;
pub use storage::LocalStorage;
pub use vertex::VertexInferenceClient;
