//! CSV ingestion, candidate feature construction, and result writing for grove.

mod domain;
mod error;
mod holdout;
mod reader;
mod schema;
mod writer;

pub use domain::{Dataset, ExperimentName};
pub use error::IoError;
pub use holdout::holdout_split;
pub use reader::{LabelPolicy, SampleReader};
pub use schema::{ColumnKind, FeatureSchema};
pub use writer::ResultWriter;
