//! Docid indexing: turns a record stream into a vectors matrix, a parallel
//! docid-index array and the docid -> index map.

pub mod builder;
pub mod record;

pub use builder::{DocidIndexMap, IndexBuilder, IndexOutput};
pub use record::{JsonlRecords, VectorRecord};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Record {record} (docid '{docid}') has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        record: usize,
        docid: String,
        expected: usize,
        actual: usize,
    },
    #[error("Record stream is empty")]
    EmptyInput,
    #[error("Invalid record on line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid docid map: {0}")]
    InvalidMapping(String),
    #[error("Docid map is not a JSON object of indices: {0}")]
    MappingJson(#[source] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
