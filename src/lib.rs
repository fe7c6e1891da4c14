pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use adapters::{BigQuerySink, CsvFileSink, LocalStorage, VertexInferenceClient};
pub use config::{ChurnConfig, SinkKind};
pub use crate::core::{
    etl::{EtlEngine, RunReport},
    pipeline::{ChurnPipeline, InputSource},
};
pub use domain::model::{BusinessLabel, RawPrediction, SummaryReport};
pub use utils::error::{EtlError, Result};
