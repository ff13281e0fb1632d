//! JSONL -> containers conversion and back, driven by an explicit [`PipelineConfig`].

pub mod config;
pub mod convert;
pub mod restore;

pub use config::PipelineConfig;
pub use convert::{convert, write_outputs, ConversionReport, DOCIDS_TENSOR, VECTORS_TENSOR};
pub use restore::{restore, RestoredDataset};

use crate::container::ContainerError;
use crate::index::IndexError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Containers disagree: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests;
