//! Single-pass index builder: vectors matrix, docid indices, docid map.

use super::record::VectorRecord;
use super::{IndexError, Result};
use crate::container::TensorBuffer;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Dense docid -> index assignment in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocidIndexMap {
    order: Vec<String>,
    lookup: HashMap<String, u64>,
}

impl DocidIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for `docid`, assigning the next free one on first sight.
    pub fn get_or_insert(&mut self, docid: &str) -> u64 {
        if let Some(&idx) = self.lookup.get(docid) {
            return idx;
        }
        let idx = self.order.len() as u64;
        self.order.push(docid.to_string());
        self.lookup.insert(docid.to_string(), idx);
        idx
    }

    pub fn get(&self, docid: &str) -> Option<u64> {
        self.lookup.get(docid).copied()
    }

    /// Docid holding `index`.
    pub fn docid(&self, index: u64) -> Option<&str> {
        self.order.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(docid, index)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.order
            .iter()
            .enumerate()
            .map(|(i, d)| (d.as_str(), i as u64))
    }

    pub fn to_json_writer<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer(writer, self)
    }

    /// Persist as a flat JSON object `{ "<docid>": <index>, ... }`.
    ///
    /// Same temp-file-then-rename discipline as the container writer: `path`
    /// either keeps its old contents or holds the complete new map.
    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut writer = BufWriter::new(NamedTempFile::new_in(dir)?);
        self.to_json_writer(&mut writer)?;
        writer.flush()?;

        let tmp = writer.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Rebuild from `(docid, index)` assignments in any order.
    ///
    /// Indices must cover `[0, K)` exactly once for `K` docids.
    pub fn from_assignments<I>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let assignments: Vec<(String, u64)> = assignments.into_iter().collect();
        let count = assignments.len();
        let mut slots: Vec<Option<String>> = vec![None; count];

        for (docid, idx) in assignments {
            let slot = usize::try_from(idx)
                .ok()
                .and_then(|i| slots.get_mut(i))
                .ok_or_else(|| {
                    IndexError::InvalidMapping(format!(
                        "docid '{docid}' has index {idx}, outside [0, {count})"
                    ))
                })?;
            if let Some(previous) = slot {
                return Err(IndexError::InvalidMapping(format!(
                    "index {idx} is assigned to both '{previous}' and '{docid}'"
                )));
            }
            *slot = Some(docid);
        }

        let mut map = Self::new();
        for docid in slots.into_iter().flatten() {
            map.get_or_insert(&docid);
        }
        Ok(map)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let raw: HashMap<String, u64> =
            serde_json::from_reader(reader).map_err(IndexError::MappingJson)?;
        Self::from_assignments(raw)
    }

    /// Load a map written by [`DocidIndexMap::write_json`].
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let map = Self::from_json_reader(BufReader::new(File::open(path)?))?;
        debug!(docids = map.len(), "docid map loaded");
        Ok(map)
    }
}

impl Serialize for DocidIndexMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (docid, idx) in self.iter() {
            map.serialize_entry(docid, &idx)?;
        }
        map.end()
    }
}

/// Everything one pass over the records produces.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOutput {
    /// Row-major `rows x dim` matrix.
    pub vectors: Vec<f32>,
    pub rows: usize,
    pub dim: usize,
    /// Per-row docid index, parallel to `vectors`.
    pub doc_indices: Vec<i64>,
    pub mapping: DocidIndexMap,
}

impl IndexOutput {
    /// F32 tensor of shape `[rows, dim]`.
    pub fn vectors_tensor(&self) -> TensorBuffer {
        TensorBuffer::from_f32(vec![self.rows as u64, self.dim as u64], &self.vectors)
    }

    /// I64 tensor of shape `[rows]`.
    pub fn docids_tensor(&self) -> TensorBuffer {
        TensorBuffer::from_i64(vec![self.rows as u64], &self.doc_indices)
    }
}

#[derive(Debug, Default)]
pub struct IndexBuilder {
    dim: Option<usize>,
    vectors: Vec<f32>,
    doc_indices: Vec<i64>,
    mapping: DocidIndexMap,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `records` once and build the output.
    pub fn build<I>(records: I) -> Result<IndexOutput>
    where
        I: IntoIterator<Item = Result<VectorRecord>>,
    {
        let mut builder = Self::new();
        for record in records {
            builder.push(record?)?;
        }
        builder.finish()
    }

    pub fn rows(&self) -> usize {
        self.doc_indices.len()
    }

    pub fn push(&mut self, record: VectorRecord) -> Result<()> {
        let row = self.rows();
        let dim = *self.dim.get_or_insert(record.vector.len());
        if record.vector.len() != dim {
            return Err(IndexError::DimensionMismatch {
                record: row + 1,
                docid: record.docid,
                expected: dim,
                actual: record.vector.len(),
            });
        }

        let idx = self.mapping.get_or_insert(&record.docid);
        self.vectors.extend_from_slice(&record.vector);
        self.doc_indices.push(idx as i64);
        debug!(docid = %record.docid, idx, head = ?record.vector.first(), "record indexed");
        Ok(())
    }

    pub fn finish(self) -> Result<IndexOutput> {
        let dim = self.dim.ok_or(IndexError::EmptyInput)?;
        let rows = self.doc_indices.len();
        info!(rows, dim, docids = self.mapping.len(), "index built");

        Ok(IndexOutput {
            vectors: self.vectors,
            rows,
            dim,
            doc_indices: self.doc_indices,
            mapping: self.mapping,
        })
    }
}
