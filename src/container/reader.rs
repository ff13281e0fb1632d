//! Two-phase container reader.
//!
//! `fetch_header` issues two range requests (the 8-byte length prefix, then
//! the header itself) and never touches payload bytes. `fetch_tensor` issues
//! one bounded request per tensor.

use super::header;
use super::source::{open_source, RangeSource};
use super::types::{ContainerHeader, Dtype, TensorEntry};
use super::{ContainerError, Result, HEADER_PREFIX_LEN, MAX_HEADER_LEN};
use bytes::{Buf, Bytes};
use futures::future::try_join_all;
use std::ops::Deref;
use std::time::Duration;
use tracing::{debug, instrument};

/// Header plus its encoded length, which locates the data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedHeader {
    pub header_len: u64,
    pub header: ContainerHeader,
}

impl FetchedHeader {
    /// Absolute offset of the first payload byte.
    pub fn data_start(&self) -> u64 {
        HEADER_PREFIX_LEN + self.header_len
    }

    /// Expected size of the whole container, `None` if it overflows `u64`.
    pub fn total_len(&self) -> Option<u64> {
        self.data_start().checked_add(self.header.data_len())
    }

    /// Absolute `(start, end)` of `entry`'s payload within the container.
    fn absolute_span(&self, entry: &TensorEntry) -> Result<(u64, u64)> {
        let (start, end) = entry.data_offsets;
        match (
            self.data_start().checked_add(start),
            self.data_start().checked_add(end),
        ) {
            (Some(abs_start), Some(abs_end)) => Ok((abs_start, abs_end)),
            _ => Err(ContainerError::MalformedHeader(format!(
                "tensor '{}' spans [{start}, {end}) past the end of a u64-addressed container",
                entry.name
            ))),
        }
    }
}

impl Deref for FetchedHeader {
    type Target = ContainerHeader;

    fn deref(&self) -> &ContainerHeader {
        &self.header
    }
}

/// Raw payload of one tensor with typed little-endian views.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    pub entry: TensorEntry,
    pub bytes: Bytes,
}

impl TensorData {
    fn expect(&self, requested: Dtype) -> Result<Bytes> {
        if self.entry.dtype != requested {
            return Err(ContainerError::DtypeMismatch {
                name: self.entry.name.clone(),
                actual: self.entry.dtype,
                requested,
            });
        }
        Ok(self.bytes.clone())
    }

    fn count(&self) -> usize {
        self.bytes.len() / self.entry.dtype.size() as usize
    }

    pub fn to_f32(&self) -> Result<Vec<f32>> {
        let mut buf = self.expect(Dtype::F32)?;
        Ok((0..self.count()).map(|_| buf.get_f32_le()).collect())
    }

    pub fn to_f64(&self) -> Result<Vec<f64>> {
        let mut buf = self.expect(Dtype::F64)?;
        Ok((0..self.count()).map(|_| buf.get_f64_le()).collect())
    }

    pub fn to_i32(&self) -> Result<Vec<i32>> {
        let mut buf = self.expect(Dtype::I32)?;
        Ok((0..self.count()).map(|_| buf.get_i32_le()).collect())
    }

    pub fn to_i64(&self) -> Result<Vec<i64>> {
        let mut buf = self.expect(Dtype::I64)?;
        Ok((0..self.count()).map(|_| buf.get_i64_le()).collect())
    }
}

pub struct ContainerReader<S> {
    source: S,
}

impl ContainerReader<Box<dyn RangeSource>> {
    /// Reader over a local path or an `http(s)://` URL.
    pub fn open(location: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::new(open_source(location, timeout)?))
    }
}

impl<S: RangeSource> ContainerReader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn read_exact_range(&self, start: u64, len: u64) -> Result<Bytes> {
        let bytes = self.source.read_range(start, len).await?;
        let actual = bytes.len() as u64;
        if actual < len {
            return Err(ContainerError::TruncatedRead {
                offset: start,
                expected: len,
                actual,
            });
        }
        if actual > len {
            return Err(ContainerError::RangeUnsupported {
                source_desc: self.source.describe(),
                detail: format!("returned {actual} bytes for a {len}-byte range at {start}"),
            });
        }
        Ok(bytes)
    }

    /// Fetch and decode the header only.
    #[instrument(skip(self), fields(source = %self.source.describe()))]
    pub async fn fetch_header(&self) -> Result<FetchedHeader> {
        let mut prefix = self.read_exact_range(0, HEADER_PREFIX_LEN).await?;
        let header_len = prefix.get_u64_le();
        if header_len > MAX_HEADER_LEN {
            return Err(ContainerError::MalformedHeader(format!(
                "header length {header_len} exceeds limit {MAX_HEADER_LEN}"
            )));
        }

        let bytes = self.read_exact_range(HEADER_PREFIX_LEN, header_len).await?;
        let header = header::decode(&bytes)?;
        debug!(header_len, tensors = header.len(), "header fetched");

        Ok(FetchedHeader { header_len, header })
    }

    /// Fetch one tensor's payload with a single range request.
    #[instrument(skip(self, header), fields(source = %self.source.describe()))]
    pub async fn fetch_tensor(&self, header: &FetchedHeader, name: &str) -> Result<TensorData> {
        let entry = header
            .get(name)
            .ok_or_else(|| ContainerError::UnknownTensor(name.to_string()))?
            .clone();

        let (start, end) = header.absolute_span(&entry)?;
        if start == end {
            return Ok(TensorData {
                entry,
                bytes: Bytes::new(),
            });
        }

        let bytes = self.read_exact_range(start, end - start).await?;

        Ok(TensorData { entry, bytes })
    }

    /// Fetch several tensors concurrently against the same header.
    pub async fn fetch_tensors(
        &self,
        header: &FetchedHeader,
        names: &[&str],
    ) -> Result<Vec<TensorData>> {
        try_join_all(names.iter().map(|name| self.fetch_tensor(header, name))).await
    }

    /// Fetch the entire data section in one request.
    pub async fn fetch_data_section(&self, header: &FetchedHeader) -> Result<Bytes> {
        let len = header.data_len();
        if len == 0 {
            return Ok(Bytes::new());
        }
        if header.total_len().is_none() {
            return Err(ContainerError::MalformedHeader(format!(
                "data section of {len} bytes overflows a u64-addressed container"
            )));
        }
        self.read_exact_range(header.data_start(), len).await
    }
}
