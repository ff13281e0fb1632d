//! Container writer: lays out named tensors behind a JSON header.

use super::header;
use super::types::{ContainerHeader, TensorBuffer, TensorEntry};
use super::{ContainerError, Result, HEADER_PREFIX_LEN};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

/// Accumulates tensors in caller order and serializes them as one container.
#[derive(Debug, Default)]
pub struct ContainerWriter {
    tensors: Vec<(String, TensorBuffer)>,
    metadata: BTreeMap<String, String>,
}

impl ContainerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tensor. Payloads are written in the order tensors are added.
    pub fn add_tensor(mut self, name: impl Into<String>, tensor: TensorBuffer) -> Self {
        self.tensors.push((name.into(), tensor));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn extend_metadata(mut self, metadata: &BTreeMap<String, String>) -> Self {
        self.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Build the header: cumulative offsets in declaration order.
    pub fn layout(&self) -> Result<ContainerHeader> {
        let mut entries = Vec::with_capacity(self.tensors.len());
        let mut offset = 0u64;

        for (name, tensor) in &self.tensors {
            let actual = tensor.data.len() as u64;
            let expected = tensor.dtype.byte_len(&tensor.shape);
            if expected != Some(actual) {
                return Err(ContainerError::ShapeMismatch {
                    name: name.clone(),
                    dtype: tensor.dtype,
                    shape: tensor.shape.clone(),
                    expected: expected.unwrap_or(u64::MAX),
                    actual,
                });
            }

            entries.push(TensorEntry {
                name: name.clone(),
                dtype: tensor.dtype,
                shape: tensor.shape.clone(),
                data_offsets: (offset, offset + actual),
            });
            offset += actual;
        }

        Ok(ContainerHeader::from_parts(entries, self.metadata.clone()))
    }

    /// Serialize into `out`. Returns the total number of bytes written.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let header = self.layout()?;
        let header_bytes = header::encode(&header)?;
        let header_len = header_bytes.len() as u64;

        out.write_all(&header_len.to_le_bytes())?;
        out.write_all(&header_bytes)?;
        for (_, tensor) in &self.tensors {
            out.write_all(&tensor.data)?;
        }

        Ok(HEADER_PREFIX_LEN + header_len + header.data_len())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write the container to `path`.
    ///
    /// Bytes go to a temp file beside `path`, which is flushed, synced and
    /// renamed over the destination only once complete. On failure the temp
    /// file is removed and `path` is left as it was.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), tensors = self.tensors.len()))]
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let tmp = NamedTempFile::new_in(dir)?;
        let mut writer = BufWriter::new(tmp);
        let written = self.write_to(&mut writer)?;
        writer.flush()?;

        let tmp = writer
            .into_inner()
            .map_err(|e| ContainerError::Io(e.into_error()))?;
        tmp.as_file().sync_all()?;
        debug!(bytes = written, "container flushed");

        tmp.persist(path).map_err(|e| ContainerError::Io(e.error))?;
        info!(bytes = written, "container written");
        Ok(written)
    }
}
