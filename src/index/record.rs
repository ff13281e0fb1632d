//! `VectorRecord` and the line-delimited JSON stream that yields them.

use super::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One input line: `{"vector": [f0, f1, ...], "docid": "<string>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub docid: String,
    pub vector: Vec<f32>,
}

impl VectorRecord {
    pub fn new(docid: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            docid: docid.into(),
            vector,
        }
    }
}

/// Single-pass iterator over a JSONL source. Blank lines are skipped.
pub struct JsonlRecords<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl JsonlRecords<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> JsonlRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for JsonlRecords<R> {
    type Item = Result<VectorRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(IndexError::Io(e))),
            }
            self.line += 1;

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(text).map_err(|source| IndexError::InvalidRecord {
                    line: self.line,
                    source,
                }),
            );
        }
    }
}
