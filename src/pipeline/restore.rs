//! Reverse of `convert`: rebuild the dataset from both containers and the docid map.

use super::convert::{DOCIDS_TENSOR, VECTORS_TENSOR};
use super::{PipelineConfig, PipelineError, Result};
use crate::container::{ContainerReader, FileSource};
use crate::index::{DocidIndexMap, VectorRecord};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, instrument};

/// Rows resolved back to their docid strings, in container order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoredDataset {
    pub vectors: Vec<Vec<f32>>,
    pub docids: Vec<String>,
}

impl RestoredDataset {
    pub fn len(&self) -> usize {
        self.docids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docids.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = VectorRecord> + '_ {
        self.docids
            .iter()
            .zip(&self.vectors)
            .map(|(docid, vector)| VectorRecord::new(docid.clone(), vector.clone()))
    }

    /// `{"vectors": [[...], ...], "docids": [...]}`.
    pub fn to_json_writer<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer(writer, self)
    }

    /// One `{"vector": [...], "docid": "..."}` line per row, the conversion input format.
    pub fn to_jsonl_writer<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for record in self.records() {
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Atomically write the dataset to `path`, as JSONL when `jsonl` is set.
    pub fn write_to_path(&self, path: impl AsRef<Path>, jsonl: bool) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut writer = BufWriter::new(NamedTempFile::new_in(dir)?);
        if jsonl {
            self.to_jsonl_writer(&mut writer)?;
        } else {
            self.to_json_writer(&mut writer).map_err(std::io::Error::from)?;
        }
        writer.flush()?;

        let tmp = writer.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        info!(path = %path.display(), rows = self.len(), "dataset written");
        Ok(())
    }
}

/// Load both containers named by `config` and join their rows through the docid map.
#[instrument(skip(config), fields(output_dir = %config.output_dir.display()))]
pub async fn restore(config: &PipelineConfig) -> Result<RestoredDataset> {
    config.validate()?;
    let mapping = DocidIndexMap::read_json(config.mapping_path())?;

    let vectors = ContainerReader::new(FileSource::new(config.vectors_path()));
    let docids = ContainerReader::new(FileSource::new(config.docids_path()));
    let (vectors_header, docids_header) =
        tokio::try_join!(vectors.fetch_header(), docids.fetch_header())?;
    let (vectors, indices) = tokio::try_join!(
        vectors.fetch_tensor(&vectors_header, VECTORS_TENSOR),
        docids.fetch_tensor(&docids_header, DOCIDS_TENSOR),
    )?;

    let (rows, dim) = match vectors.entry.shape.as_slice() {
        &[rows, dim] => (rows as usize, dim as usize),
        shape => {
            return Err(PipelineError::Inconsistent(format!(
                "'{VECTORS_TENSOR}' has shape {shape:?}, expected [rows, dim]"
            )))
        }
    };
    let values = vectors.to_f32()?;
    let indices = indices.to_i64()?;
    if indices.len() != rows {
        return Err(PipelineError::Inconsistent(format!(
            "{rows} vector rows but {} docid indices",
            indices.len()
        )));
    }

    let matrix: Vec<Vec<f32>> = if dim == 0 {
        vec![Vec::new(); rows]
    } else {
        values.chunks(dim).map(<[f32]>::to_vec).collect()
    };
    let docids = indices
        .iter()
        .enumerate()
        .map(|(row, &idx)| {
            u64::try_from(idx)
                .ok()
                .and_then(|i| mapping.docid(i))
                .map(str::to_string)
                .ok_or_else(|| {
                    PipelineError::Inconsistent(format!(
                        "row {row} has docid index {idx}, absent from the docid map"
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(rows, dim, docids = mapping.len(), "dataset restored");
    Ok(RestoredDataset {
        vectors: matrix,
        docids,
    })
}
