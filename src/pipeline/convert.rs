//! End-to-end conversion: JSONL records in, two containers and the docid map out.

use super::{PipelineConfig, Result};
use crate::container::ContainerWriter;
use crate::index::{IndexBuilder, IndexOutput, JsonlRecords};
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Tensor name inside the vectors container.
pub const VECTORS_TENSOR: &str = "vectors";
/// Tensor name inside the docids container.
pub const DOCIDS_TENSOR: &str = "docids";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub rows: usize,
    pub dim: usize,
    pub distinct_docids: usize,
    pub vectors_path: PathBuf,
    pub vectors_bytes: u64,
    pub docids_path: PathBuf,
    pub docids_bytes: u64,
    pub mapping_path: PathBuf,
}

/// Read the JSONL input once and write both containers plus the docid map.
#[instrument(skip(config), fields(input = %config.input_path.display()))]
pub fn convert(config: &PipelineConfig) -> Result<ConversionReport> {
    config.validate()?;
    let records = JsonlRecords::open(&config.input_path)?;
    let output = IndexBuilder::build(records)?;
    write_outputs(config, &output)
}

pub fn write_outputs(config: &PipelineConfig, output: &IndexOutput) -> Result<ConversionReport> {
    fs::create_dir_all(&config.output_dir)?;

    let vectors_path = config.vectors_path();
    let vectors_bytes = ContainerWriter::new()
        .extend_metadata(&config.metadata)
        .add_tensor(VECTORS_TENSOR, output.vectors_tensor())
        .write_to_path(&vectors_path)?;
    info!(path = %vectors_path.display(), rows = output.rows, dim = output.dim, "saved vectors");

    let docids_path = config.docids_path();
    let docids_bytes = ContainerWriter::new()
        .extend_metadata(&config.metadata)
        .add_tensor(DOCIDS_TENSOR, output.docids_tensor())
        .write_to_path(&docids_path)?;
    info!(path = %docids_path.display(), "saved docids");

    let mapping_path = config.mapping_path();
    output.mapping.write_json(&mapping_path)?;
    info!(path = %mapping_path.display(), docids = output.mapping.len(), "saved docid map");

    Ok(ConversionReport {
        rows: output.rows,
        dim: output.dim,
        distinct_docids: output.mapping.len(),
        vectors_path,
        vectors_bytes,
        docids_path,
        docids_bytes,
        mapping_path,
    })
}
