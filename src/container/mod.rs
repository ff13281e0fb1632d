//! Safetensors-style binary container.
//!
//! Layout (little-endian):
//! ```text
//! [u64 header_len][header_len bytes of JSON header][tensor payloads...]
//! ```
//! The writer serializes named tensors; the reader fetches the header through
//! byte-range requests and resolves tensor payloads on demand.

pub mod header;
pub mod reader;
pub mod source;
pub mod types;
pub mod writer;

pub use reader::{ContainerReader, FetchedHeader, TensorData};
pub use source::{open_source, FileSource, HttpSource, MemorySource, RangeSource};
pub use types::{ContainerHeader, Dtype, TensorBuffer, TensorEntry};
pub use writer::ContainerWriter;

use std::time::Duration;
use thiserror::Error;

/// Size of the little-endian header length prefix.
pub const HEADER_PREFIX_LEN: u64 = 8;

/// Largest header the reader accepts before fetching it.
pub const MAX_HEADER_LEN: u64 = 100_000_000;

/// Reserved header key holding free-form string metadata.
pub const METADATA_KEY: &str = "__metadata__";

pub type Result<T> = std::result::Result<T, ContainerError>;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Header encoding failed: {0}")]
    Encoding(String),
    #[error("Malformed header: {0}")]
    MalformedHeader(String),
    #[error(
        "Tensor '{name}' ({dtype} {shape:?}) expects {expected} payload bytes, got {actual}"
    )]
    ShapeMismatch {
        name: String,
        dtype: Dtype,
        shape: Vec<u64>,
        expected: u64,
        actual: u64,
    },
    #[error("Unknown tensor: '{0}'")]
    UnknownTensor(String),
    #[error("Source {source_desc} does not honour range requests: {detail}")]
    RangeUnsupported { source_desc: String, detail: String },
    #[error("Truncated read at offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },
    #[error("Transport timed out after {timeout:?} reading {source_desc}")]
    TransportTimeout {
        source_desc: String,
        timeout: Duration,
    },
    #[error("Tensor '{name}' has dtype {actual}, requested {requested}")]
    DtypeMismatch {
        name: String,
        actual: Dtype,
        requested: Dtype,
    },
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
