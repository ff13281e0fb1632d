//! Header codec: `ContainerHeader` <-> UTF-8 JSON bytes.
//!
//! ```text
//! { "__metadata__": { "k": "v" },
//!   "<name>": { "dtype": "F32", "shape": [d0, d1], "data_offsets": [start, end] } }
//! ```

use super::types::{ContainerHeader, Dtype, TensorEntry};
use super::{ContainerError, Result, METADATA_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryRecord {
    dtype: Dtype,
    shape: Vec<u64>,
    data_offsets: [u64; 2],
}

/// Encode `header` as deterministic JSON (sorted keys, no padding).
pub fn encode(header: &ContainerHeader) -> Result<Vec<u8>> {
    validate_entries(header.entries())?;

    let mut map = Map::new();
    if !header.metadata.is_empty() {
        let meta: Map<String, Value> = header
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        map.insert(METADATA_KEY.to_string(), Value::Object(meta));
    }

    for entry in header.entries() {
        let record = EntryRecord {
            dtype: entry.dtype,
            shape: entry.shape.clone(),
            data_offsets: [entry.data_offsets.0, entry.data_offsets.1],
        };
        let value = serde_json::to_value(&record)
            .map_err(|e| ContainerError::Encoding(format!("tensor '{}': {}", entry.name, e)))?;
        map.insert(entry.name.clone(), value);
    }

    serde_json::to_vec(&Value::Object(map)).map_err(|e| ContainerError::Encoding(e.to_string()))
}

fn validate_entries(entries: &[TensorEntry]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut cursor = 0u64;

    for entry in entries {
        if entry.name.is_empty() {
            return Err(ContainerError::Encoding("tensor name is empty".into()));
        }
        if entry.name == METADATA_KEY {
            return Err(ContainerError::Encoding(format!(
                "tensor name '{METADATA_KEY}' is reserved"
            )));
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(ContainerError::Encoding(format!(
                "duplicate tensor name '{}'",
                entry.name
            )));
        }

        let (start, end) = entry.data_offsets;
        let expected = entry.dtype.byte_len(&entry.shape).ok_or_else(|| {
            ContainerError::Encoding(format!("tensor '{}': shape overflows u64", entry.name))
        })?;
        if start != cursor || end < start || end - start != expected {
            return Err(ContainerError::Encoding(format!(
                "tensor '{}': offsets [{start}, {end}] do not continue at {cursor} with {expected} bytes",
                entry.name
            )));
        }
        cursor = end;
    }
    Ok(())
}

/// Decode header bytes. Entries come back sorted by data offset.
pub fn decode(bytes: &[u8]) -> Result<ContainerHeader> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ContainerError::MalformedHeader(format!("not valid UTF-8: {e}")))?;
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ContainerError::MalformedHeader(format!("invalid JSON: {e}")))?;
    let Value::Object(map) = value else {
        return Err(ContainerError::MalformedHeader(
            "top level is not a JSON object".into(),
        ));
    };

    let mut metadata = BTreeMap::new();
    let mut entries = Vec::with_capacity(map.len());

    for (name, value) in map {
        if name == METADATA_KEY {
            metadata = decode_metadata(value)?;
            continue;
        }
        entries.push(decode_entry(name, value)?);
    }

    entries.sort_by_key(|e| e.data_offsets);

    let mut cursor = 0u64;
    for entry in &entries {
        if entry.data_offsets.0 != cursor {
            return Err(ContainerError::MalformedHeader(format!(
                "tensor '{}' starts at {}, expected {cursor}",
                entry.name, entry.data_offsets.0
            )));
        }
        cursor = entry.data_offsets.1;
    }

    Ok(ContainerHeader::from_parts(entries, metadata))
}

fn decode_entry(name: String, value: Value) -> Result<TensorEntry> {
    if name.is_empty() {
        return Err(ContainerError::MalformedHeader("empty tensor name".into()));
    }
    let record: EntryRecord = serde_json::from_value(value)
        .map_err(|e| ContainerError::MalformedHeader(format!("tensor '{name}': {e}")))?;

    let [start, end] = record.data_offsets;
    if end < start {
        return Err(ContainerError::MalformedHeader(format!(
            "tensor '{name}': data_offsets end {end} < start {start}"
        )));
    }
    let expected = record.dtype.byte_len(&record.shape).ok_or_else(|| {
        ContainerError::MalformedHeader(format!("tensor '{name}': shape overflows u64"))
    })?;
    if end - start != expected {
        return Err(ContainerError::MalformedHeader(format!(
            "tensor '{name}': {} {:?} needs {expected} bytes, offsets span {}",
            record.dtype,
            record.shape,
            end - start
        )));
    }

    Ok(TensorEntry {
        name,
        dtype: record.dtype,
        shape: record.shape,
        data_offsets: (start, end),
    })
}

fn decode_metadata(value: Value) -> Result<BTreeMap<String, String>> {
    let Value::Object(map) = value else {
        return Err(ContainerError::MalformedHeader(format!(
            "'{METADATA_KEY}' is not an object"
        )));
    };
    map.into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => Ok((k, s)),
            other => Err(ContainerError::MalformedHeader(format!(
                "'{METADATA_KEY}.{k}' is not a string: {other}"
            ))),
        })
        .collect()
}
