//! Byte-range transports the reader fetches from.

use super::{ContainerError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::RANGE, Client, StatusCode};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;
use url::Url;

/// A resource that can return an arbitrary byte span without reading the rest.
///
/// `read_range` takes `&self` so independent ranges can be fetched concurrently.
/// A short result means the resource ended early; callers decide what that means.
#[async_trait]
pub trait RangeSource: Send + Sync {
    async fn read_range(&self, start: u64, len: u64) -> Result<Bytes>;

    /// Human-readable location, used in errors and logs.
    fn describe(&self) -> String;
}

#[async_trait]
impl<T: RangeSource + ?Sized> RangeSource for Box<T> {
    async fn read_range(&self, start: u64, len: u64) -> Result<Bytes> {
        (**self).read_range(start, len).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[async_trait]
impl<T: RangeSource + ?Sized> RangeSource for Arc<T> {
    async fn read_range(&self, start: u64, len: u64) -> Result<Bytes> {
        (**self).read_range(start, len).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Local file. Each read opens its own handle and seeks.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RangeSource for FileSource {
    async fn read_range(&self, start: u64, len: u64) -> Result<Bytes> {
        let mut file = File::open(&self.path).await?;
        let file_len = file.metadata().await?.len();
        file.seek(SeekFrom::Start(start)).await?;

        let cap = len.min(file_len.saturating_sub(start)) as usize;
        let mut buf = Vec::with_capacity(cap);
        file.take(len).read_to_end(&mut buf).await?;

        debug!(path = %self.path.display(), start, len, got = buf.len(), "file range read");
        Ok(Bytes::from(buf))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// HTTP(S) resource read with `Range: bytes=a-b` requests.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContainerError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    fn map_err(&self, e: reqwest::Error) -> ContainerError {
        if e.is_timeout() {
            ContainerError::TransportTimeout {
                source_desc: self.url.to_string(),
                timeout: self.timeout,
            }
        } else {
            ContainerError::Transport(format!("{}: {}", self.url, e))
        }
    }
}

#[async_trait]
impl RangeSource for HttpSource {
    async fn read_range(&self, start: u64, len: u64) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        let last = start.checked_add(len - 1).ok_or_else(|| {
            ContainerError::Transport(format!(
                "{}: range of {len} bytes at {start} overflows u64",
                self.url
            ))
        })?;
        let range = format!("bytes={start}-{last}");
        debug!(url = %self.url, %range, "range request");

        let response = self
            .client
            .get(self.url.clone())
            .header(RANGE, &range)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK => {
                return Err(ContainerError::RangeUnsupported {
                    source_desc: self.url.to_string(),
                    detail: format!("answered 200 to '{range}'"),
                })
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(ContainerError::TruncatedRead {
                    offset: start,
                    expected: len,
                    actual: 0,
                })
            }
            status => {
                return Err(ContainerError::Http {
                    url: self.url.to_string(),
                    status: status.as_u16(),
                })
            }
        }

        response.bytes().await.map_err(|e| self.map_err(e))
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// In-memory container bytes.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    async fn read_range(&self, start: u64, len: u64) -> Result<Bytes> {
        let total = self.data.len() as u64;
        let lo = start.min(total) as usize;
        let hi = start.saturating_add(len).min(total) as usize;
        Ok(self.data.slice(lo..hi))
    }

    fn describe(&self) -> String {
        format!("<memory: {} bytes>", self.data.len())
    }
}

/// `http://` / `https://` locations become [`HttpSource`], anything else a [`FileSource`].
pub fn open_source(location: &str, timeout: Duration) -> Result<Box<dyn RangeSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let url = Url::parse(location)
            .map_err(|e| ContainerError::Transport(format!("invalid URL '{location}': {e}")))?;
        Ok(Box::new(HttpSource::new(url, timeout)?))
    } else {
        Ok(Box::new(FileSource::new(location)))
    }
}
