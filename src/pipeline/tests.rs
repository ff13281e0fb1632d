use super::*;
use crate::container::{ContainerReader, Dtype, FileSource};
use crate::index::{IndexError, JsonlRecords, VectorRecord};
use std::collections::HashMap;
use std::fs;
use tempfile::tempdir;

const INPUT: &str = r#"{"vector":[1.0,2.0],"docid":"a"}
{"vector":[3.0,4.0],"docid":"b"}
{"vector":[5.0,6.0],"docid":"a"}
"#;

#[test]
fn defaults_match_original_layout() {
    let config = PipelineConfig::default();
    assert_eq!(config.vectors_path(), std::path::Path::new("output/vectors.safetensors"));
    assert_eq!(config.docids_path(), std::path::Path::new("output/docids.safetensors"));
    assert_eq!(config.mapping_path(), std::path::Path::new("output/docid_to_idx.json"));
    assert!(config.validate().is_ok());
}

#[test]
fn toml_overrides_defaults() {
    let config = PipelineConfig::from_toml_str(
        r#"
        input_path = "data/in.jsonl"
        output_dir = "out"
        http_timeout_secs = 5

        [metadata]
        collection = "msmarco"
        "#,
    )
    .unwrap();

    assert_eq!(config.input_path, std::path::PathBuf::from("data/in.jsonl"));
    assert_eq!(config.vectors_file, "vectors.safetensors");
    assert_eq!(config.http_timeout().as_secs(), 5);
    assert_eq!(config.metadata.get("collection").map(String::as_str), Some("msmarco"));
}

#[test]
fn toml_rejects_unknown_keys_and_bad_values() {
    assert!(matches!(
        PipelineConfig::from_toml_str("inptu_path = \"x\""),
        Err(PipelineError::Config(_))
    ));
    assert!(matches!(
        PipelineConfig::from_toml_str("http_timeout_secs = 0"),
        Err(PipelineError::Config(_))
    ));
    assert!(matches!(
        PipelineConfig::from_toml_str("docids_file = \"vectors.safetensors\""),
        Err(PipelineError::Config(_))
    ));
}

#[test]
fn env_style_overrides() {
    let vars: HashMap<&str, &str> = [
        (config::ENV_INPUT, "in.jsonl"),
        (config::ENV_OUTPUT_DIR, "/tmp/vecpack"),
        (config::ENV_HTTP_TIMEOUT, "12"),
    ]
    .into_iter()
    .collect();

    let config = PipelineConfig::default()
        .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
        .unwrap();
    assert_eq!(config.input_path, std::path::PathBuf::from("in.jsonl"));
    assert_eq!(config.output_dir, std::path::PathBuf::from("/tmp/vecpack"));
    assert_eq!(config.http_timeout_secs, 12);

    let bad = PipelineConfig::default()
        .with_overrides(|k| (k == config::ENV_HTTP_TIMEOUT).then(|| "soon".to_string()));
    assert!(matches!(bad, Err(PipelineError::Config(_))));
}

#[tokio::test]
async fn convert_writes_readable_containers() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("vectors.jsonl");
    fs::write(&input, INPUT).unwrap();

    let config = PipelineConfig::default()
        .with_input(&input)
        .with_output_dir(dir.path().join("output"))
        .with_metadata("source", "unit-test");
    let report = convert(&config).unwrap();

    assert_eq!((report.rows, report.dim, report.distinct_docids), (3, 2, 2));
    assert_eq!(report.vectors_bytes, fs::metadata(&report.vectors_path).unwrap().len());

    let vectors = ContainerReader::new(FileSource::new(&report.vectors_path));
    let header = vectors.fetch_header().await.unwrap();
    assert_eq!(header.metadata.get("source").map(String::as_str), Some("unit-test"));
    let entry = header.get(VECTORS_TENSOR).unwrap();
    assert_eq!((entry.dtype, entry.shape.clone()), (Dtype::F32, vec![3, 2]));
    let data = vectors.fetch_tensor(&header, VECTORS_TENSOR).await.unwrap();
    assert_eq!(data.to_f32().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    let docids = ContainerReader::new(FileSource::new(&report.docids_path));
    let header = docids.fetch_header().await.unwrap();
    let idx = docids.fetch_tensor(&header, DOCIDS_TENSOR).await.unwrap().to_i64().unwrap();
    assert_eq!(idx, vec![0, 1, 0]);

    let mapping: HashMap<String, i64> =
        serde_json::from_slice(&fs::read(&report.mapping_path).unwrap()).unwrap();
    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping["a"], idx[0]);
    assert_eq!(mapping["b"], idx[1]);
}

#[test]
fn convert_propagates_index_errors() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("empty.jsonl");
    fs::write(&input, "").unwrap();

    let config = PipelineConfig::default()
        .with_input(&input)
        .with_output_dir(dir.path().join("output"));
    assert!(matches!(
        convert(&config),
        Err(PipelineError::Index(crate::index::IndexError::EmptyInput))
    ));
    assert!(!config.vectors_path().exists());
}

#[test]
fn missing_input_is_io_error() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::default()
        .with_input(dir.path().join("nope.jsonl"))
        .with_output_dir(dir.path().join("output"));
    assert!(matches!(
        convert(&config),
        Err(PipelineError::Index(crate::index::IndexError::Io(_)))
    ));
}

#[tokio::test]
async fn restore_returns_converted_records() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("vectors.jsonl");
    fs::write(&input, INPUT).unwrap();
    let config = PipelineConfig::default()
        .with_input(&input)
        .with_output_dir(dir.path().join("output"));
    convert(&config).unwrap();

    let dataset = restore(&config).await.unwrap();
    let expected: Vec<VectorRecord> = JsonlRecords::open(&input)
        .unwrap()
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(dataset.records().collect::<Vec<_>>(), expected);
    assert_eq!(dataset.docids, vec!["a", "b", "a"]);

    let exported = dir.path().join("export").join("vectors.jsonl");
    dataset.write_to_path(&exported, true).unwrap();
    assert_eq!(fs::read_to_string(&exported).unwrap().lines().count(), 3);
    let again: Vec<VectorRecord> = JsonlRecords::open(&exported)
        .unwrap()
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(again, expected);

    let json = dir.path().join("data.json");
    dataset.write_to_path(&json, false).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&fs::read(&json).unwrap()).unwrap();
    assert_eq!(parsed["docids"], serde_json::json!(["a", "b", "a"]));
    assert_eq!(parsed["vectors"][2], serde_json::json!([5.0, 6.0]));
}

#[tokio::test]
async fn restore_rejects_broken_docid_map() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("vectors.jsonl");
    fs::write(&input, INPUT).unwrap();
    let config = PipelineConfig::default()
        .with_input(&input)
        .with_output_dir(dir.path().join("output"));
    convert(&config).unwrap();

    fs::write(config.mapping_path(), r#"{"a":0,"b":0}"#).unwrap();
    assert!(matches!(
        restore(&config).await,
        Err(PipelineError::Index(IndexError::InvalidMapping(_)))
    ));

    fs::write(config.mapping_path(), r#"{"a":0}"#).unwrap();
    assert!(matches!(
        restore(&config).await,
        Err(PipelineError::Inconsistent(_))
    ));
}
