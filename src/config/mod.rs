pub mod churn_config;
#[cfg(feature = "cli")]
pub mod cli;

pub use churn_config::{
    ChurnConfig, DisplayConfig, InferenceConfig, SchemaConfig, SinkConfig, SinkKind,
};
