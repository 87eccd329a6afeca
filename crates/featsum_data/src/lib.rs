//! # featsum_data
//!
//! Tabular feature-test data for featsum.
//!
//! This crate owns everything that happens to spreadsheet rows before they
//! reach a language model:
//!
//! - **Ingestion**: load the first worksheet of an Excel/ODS/CSV file and
//!   normalize it into [`Row`]s
//! - **Category Index**: derive the selectable category labels and filter rows
//!   by a selection
//! - **Dataset**: narrow rows into a [`FilteredDataset`] with project/year stats
//! - **Serialization**: compact tab-separated text for prompts
//! - **Chunking**: project-aligned partitions that fit one completion request
//!
//! ## Example
//!
//! ```rust,no_run
//! use featsum_data::{FilteredDataset, RowProvider, SpreadsheetReader};
//!
//! let reader = SpreadsheetReader::new("data/features.xlsx");
//! let rows = reader.rows().unwrap();
//!
//! let selection = vec!["Smart Home".to_string()];
//! let dataset = FilteredDataset::prepare(&rows, &selection);
//! println!("{}", featsum_data::serialize_rows(&dataset.rows));
//! ```

pub mod category;
pub mod chunk;
pub mod dataset;
pub mod error;
pub mod models;
pub mod reader;

pub use category::{category_counts, filter_by_categories, list_categories, row_label};
pub use chunk::{partition_by_project, Chunk};
pub use dataset::{serialize_rows, FilteredDataset};
pub use error::{DataError, DataResult};
pub use models::{Row, Scalar, Year};
pub use reader::{RowProvider, SpreadsheetReader, StaticRows, REQUIRED_COLUMNS};
