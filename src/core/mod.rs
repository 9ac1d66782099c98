pub mod aggregator;
pub mod dictionary;
pub mod etl;
pub mod pipeline;
pub mod resolution;
pub mod schema;
pub mod translator;

pub use crate::domain::model::{Record, Table, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, WorkbookStore};
pub use crate::utils::error::Result;
