//! vecpack CLI: convert JSONL vectors to containers, export them back, and inspect containers lazily.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vecpack::{convert, restore, ContainerReader, Dtype, PipelineConfig, TensorData};

#[derive(Parser)]
#[command(name = "vecpack")]
#[command(about = "Pack JSONL vectors into safetensors containers and read them by range")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults plus VECPACK_* variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSONL vector file into vectors/docids containers and a docid map
    Convert {
        /// JSONL input file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Rebuild the dataset from the two containers and the docid map
    Export {
        /// Directory holding the containers and docid map
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Destination file
        #[arg(long, default_value = "data.json")]
        to: PathBuf,

        /// Write JSONL records instead of one {"vectors", "docids"} object
        #[arg(long)]
        jsonl: bool,
    },

    /// Print a container's header, fetching only the header bytes
    Inspect {
        /// Local path or http(s) URL
        location: String,
    },

    /// Fetch one tensor and print its values
    Dump {
        /// Local path or http(s) URL
        location: String,

        /// Tensor name
        tensor: String,

        /// Maximum number of values to print
        #[arg(short, long, default_value = "16")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Convert { input, output_dir } => cmd_convert(config, input, output_dir),
        Commands::Export {
            output_dir,
            to,
            jsonl,
        } => cmd_export(config, output_dir, &to, jsonl).await,
        Commands::Inspect { location } => cmd_inspect(&location, config.http_timeout()).await,
        Commands::Dump {
            location,
            tensor,
            limit,
        } => cmd_dump(&location, &tensor, limit, config.http_timeout()).await,
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => PipelineConfig::from_env().context("reading VECPACK_* environment"),
    }
}

fn cmd_convert(
    mut config: PipelineConfig,
    input: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    if let Some(input) = input {
        config = config.with_input(input);
    }
    if let Some(dir) = output_dir {
        config = config.with_output_dir(dir);
    }

    let report = convert(&config)
        .with_context(|| format!("converting {}", config.input_path.display()))?;

    println!("Rows:            {}", report.rows);
    println!("Dimension:       {}", report.dim);
    println!("Distinct docids: {}", report.distinct_docids);
    println!(
        "Saved vectors to {} ({} bytes)",
        report.vectors_path.display(),
        report.vectors_bytes
    );
    println!(
        "Saved docids to {} ({} bytes)",
        report.docids_path.display(),
        report.docids_bytes
    );
    println!("Saved docid map to {}", report.mapping_path.display());
    Ok(())
}

async fn cmd_export(
    mut config: PipelineConfig,
    output_dir: Option<PathBuf>,
    to: &Path,
    jsonl: bool,
) -> Result<()> {
    if let Some(dir) = output_dir {
        config = config.with_output_dir(dir);
    }

    let dataset = restore(&config)
        .await
        .with_context(|| format!("restoring from {}", config.output_dir.display()))?;
    dataset
        .write_to_path(to, jsonl)
        .with_context(|| format!("writing {}", to.display()))?;

    println!("Rows:            {}", dataset.len());
    println!("Saved dataset to {}", to.display());
    Ok(())
}

async fn cmd_inspect(location: &str, timeout: Duration) -> Result<()> {
    let reader = ContainerReader::open(location, timeout)?;
    let header = reader
        .fetch_header()
        .await
        .with_context(|| format!("fetching header of {location}"))?;

    println!("Header length:   {} bytes", header.header_len);
    println!("Data section:    {} bytes", header.data_len());
    for (k, v) in &header.metadata {
        println!("Metadata:        {k} = {v}");
    }
    for entry in header.entries() {
        println!(
            "  {:<24} {:<5} {:?} [{}, {})",
            entry.name,
            entry.dtype.as_str(),
            entry.shape,
            entry.data_offsets.0,
            entry.data_offsets.1
        );
    }
    Ok(())
}

async fn cmd_dump(location: &str, name: &str, limit: usize, timeout: Duration) -> Result<()> {
    let reader = ContainerReader::open(location, timeout)?;
    let header = reader
        .fetch_header()
        .await
        .with_context(|| format!("fetching header of {location}"))?;
    let tensor = reader
        .fetch_tensor(&header, name)
        .await
        .with_context(|| format!("fetching tensor '{name}'"))?;

    println!(
        "{} {} {:?} ({} bytes)",
        name,
        tensor.entry.dtype,
        tensor.entry.shape,
        tensor.bytes.len()
    );
    println!("{}", render_values(&tensor, limit)?);
    Ok(())
}

fn render_values(tensor: &TensorData, limit: usize) -> Result<String> {
    fn join<T: ToString>(values: Vec<T>, limit: usize) -> String {
        let total = values.len();
        let mut out: Vec<String> = values.into_iter().take(limit).map(|v| v.to_string()).collect();
        if total > limit {
            out.push(format!("... ({} more)", total - limit));
        }
        out.join(" ")
    }

    Ok(match tensor.entry.dtype {
        Dtype::F32 => join(tensor.to_f32()?, limit),
        Dtype::F64 => join(tensor.to_f64()?, limit),
        Dtype::I32 => join(tensor.to_i32()?, limit),
        Dtype::I64 => join(tensor.to_i64()?, limit),
        other => format!("<{other} payload, {} raw bytes>", tensor.bytes.len()),
    })
}
