//! Container data model: dtypes, header entries, writer input buffers.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Element type of a tensor. Closed set; anything else is rejected on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dtype {
    Bool,
    U8,
    I8,
    U16,
    I16,
    F16,
    BF16,
    U32,
    I32,
    F32,
    U64,
    I64,
    F64,
}

impl Dtype {
    /// Bytes per element.
    pub fn size(self) -> u64 {
        match self {
            Dtype::Bool | Dtype::U8 | Dtype::I8 => 1,
            Dtype::U16 | Dtype::I16 | Dtype::F16 | Dtype::BF16 => 2,
            Dtype::U32 | Dtype::I32 | Dtype::F32 => 4,
            Dtype::U64 | Dtype::I64 | Dtype::F64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dtype::Bool => "BOOL",
            Dtype::U8 => "U8",
            Dtype::I8 => "I8",
            Dtype::U16 => "U16",
            Dtype::I16 => "I16",
            Dtype::F16 => "F16",
            Dtype::BF16 => "BF16",
            Dtype::U32 => "U32",
            Dtype::I32 => "I32",
            Dtype::F32 => "F32",
            Dtype::U64 => "U64",
            Dtype::I64 => "I64",
            Dtype::F64 => "F64",
        }
    }

    /// Byte length of a tensor with this dtype and `shape`, or `None` on overflow.
    pub fn byte_len(self, shape: &[u64]) -> Option<u64> {
        shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .and_then(|n| n.checked_mul(self.size()))
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tensor's header record. Offsets are relative to the data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorEntry {
    pub name: String,
    pub dtype: Dtype,
    pub shape: Vec<u64>,
    pub data_offsets: (u64, u64),
}

impl TensorEntry {
    pub fn byte_len(&self) -> u64 {
        self.data_offsets.1 - self.data_offsets.0
    }

    pub fn element_count(&self) -> u64 {
        self.shape.iter().product()
    }
}

/// Parsed container header.
///
/// Entries are kept in declaration order, which is also data offset order:
/// the first entry starts at 0 and each entry ends where the next begins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerHeader {
    entries: Vec<TensorEntry>,
    pub metadata: BTreeMap<String, String>,
}

impl ContainerHeader {
    pub(crate) fn from_parts(
        entries: Vec<TensorEntry>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self { entries, metadata }
    }

    pub fn entries(&self) -> &[TensorEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&TensorEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte length of the data section.
    pub fn data_len(&self) -> u64 {
        self.entries.last().map(|e| e.data_offsets.1).unwrap_or(0)
    }
}

/// Writer input: one tensor's dtype, shape and little-endian payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBuffer {
    pub dtype: Dtype,
    pub shape: Vec<u64>,
    pub data: Bytes,
}

impl TensorBuffer {
    pub fn new(dtype: Dtype, shape: Vec<u64>, data: impl Into<Bytes>) -> Self {
        Self {
            dtype,
            shape,
            data: data.into(),
        }
    }

    pub fn from_f32(shape: Vec<u64>, values: &[f32]) -> Self {
        let mut buf = BytesMut::with_capacity(values.len() * 4);
        for &v in values {
            buf.put_f32_le(v);
        }
        Self::new(Dtype::F32, shape, buf.freeze())
    }

    pub fn from_f64(shape: Vec<u64>, values: &[f64]) -> Self {
        let mut buf = BytesMut::with_capacity(values.len() * 8);
        for &v in values {
            buf.put_f64_le(v);
        }
        Self::new(Dtype::F64, shape, buf.freeze())
    }

    pub fn from_i32(shape: Vec<u64>, values: &[i32]) -> Self {
        let mut buf = BytesMut::with_capacity(values.len() * 4);
        for &v in values {
            buf.put_i32_le(v);
        }
        Self::new(Dtype::I32, shape, buf.freeze())
    }

    pub fn from_i64(shape: Vec<u64>, values: &[i64]) -> Self {
        let mut buf = BytesMut::with_capacity(values.len() * 8);
        for &v in values {
            buf.put_i64_le(v);
        }
        Self::new(Dtype::I64, shape, buf.freeze())
    }
}
