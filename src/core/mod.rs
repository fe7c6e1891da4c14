pub mod aggregate;
pub mod etl;
pub mod input;
pub mod mapper;
pub mod pipeline;
pub mod schema;

pub use crate::domain::model::{Batch, Record, TransformResult};
pub use crate::domain::ports::{Pipeline, PredictionService, Storage, TableSink};
pub use crate::utils::error::Result;
