//! Safetensors-style vector containers.
//!
//! `index` turns a JSONL vector dataset into a vectors matrix and docid
//! indices, `container` writes and lazily reads the binary format, and
//! `pipeline` wires both together behind an explicit configuration.

pub mod container;
pub mod index;
pub mod pipeline;

pub use container::{
    ContainerError, ContainerHeader, ContainerReader, ContainerWriter, Dtype, FetchedHeader,
    RangeSource, TensorBuffer, TensorData, TensorEntry,
};
pub use index::{DocidIndexMap, IndexBuilder, IndexError, IndexOutput, JsonlRecords, VectorRecord};
pub use pipeline::{convert, restore, ConversionReport, PipelineConfig, PipelineError, RestoredDataset};
