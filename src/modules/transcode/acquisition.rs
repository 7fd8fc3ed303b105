use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

use super::events::AssetRef;
use super::transport::Transport;
use crate::error::{AppError, AppResult};

pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Brings the source asset onto local disk.
///
/// The transport's own download is tried first. When it fails, or the asset is
/// above the transport's limit, the file is streamed straight from its resource
/// URL in fixed-size chunks. There is no total timeout on that stream; only the
/// connection itself is bounded.
///
/// The declared size is only a hint. Whatever path is taken, the bytes actually
/// written are held to `ceiling` and a larger file is removed.
pub struct Acquisition {
    transport: Arc<dyn Transport>,
    http: Client,
    chunk_size: usize,
    ceiling: u64,
}

impl Acquisition {
    pub fn new(
        transport: Arc<dyn Transport>,
        chunk_size: usize,
        ceiling: u64,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("Failed to build download client: {}", e))?;

        Ok(Self {
            transport,
            http,
            chunk_size: chunk_size.max(1),
            ceiling,
        })
    }

    /// Returns the size of the file written at `dest`.
    pub async fn acquire(&self, asset: &AssetRef, dest: &Path) -> AppResult<u64> {
        let within_limit = self
            .transport
            .primary_limit()
            .is_none_or(|limit| asset.size <= limit);

        if within_limit {
            match self.transport.fetch(asset, dest).await {
                Ok(()) => match written_size(dest).await {
                    Ok(size) if size > self.ceiling => {
                        discard(dest).await;
                        return Err(AppError::AssetTooLarge {
                            size,
                            ceiling: self.ceiling,
                        });
                    }
                    Ok(size) => return Ok(size),
                    Err(e) => warn!("⚠️ Primary download of {} unusable: {}", asset.file_id, e),
                },
                Err(e) => warn!("⚠️ Primary download of {} failed: {:#}", asset.file_id, e),
            }
            discard(dest).await;
        } else {
            info!(
                "📡 {} bytes exceeds the transport download limit, streaming directly",
                asset.size
            );
        }

        let url = self
            .transport
            .resource_url(asset)
            .await
            .map_err(|e| AppError::acquisition(format!("{e:#}")))?;

        if let Err(e) = self.stream_to_file(&url, dest).await {
            discard(dest).await;
            return Err(match e.downcast::<AppError>() {
                Ok(err) => err,
                Err(e) => AppError::acquisition(format!("{e:#}")),
            });
        }

        written_size(dest).await
    }

    /// Resource URLs may carry credentials, so they are stripped from every
    /// error raised here.
    async fn stream_to_file(&self, url: &Url, dest: &Path) -> anyhow::Result<u64> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("request failed")?
            .error_for_status()
            .map_err(reqwest::Error::without_url)
            .context("server rejected the download")?;

        if let Some(size) = response.content_length().filter(|&n| n > self.ceiling) {
            return Err(AppError::AssetTooLarge {
                size,
                ceiling: self.ceiling,
            }
            .into());
        }

        let mut file = fs::File::create(dest)
            .await
            .with_context(|| format!("cannot create {}", dest.display()))?;

        let mut buffer = BytesMut::with_capacity(self.chunk_size);
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(reqwest::Error::without_url)
                .context("stream interrupted")?;

            received += chunk.len() as u64;
            if received > self.ceiling {
                return Err(AppError::AssetTooLarge {
                    size: received,
                    ceiling: self.ceiling,
                }
                .into());
            }

            buffer.extend_from_slice(&chunk);
            if buffer.len() >= self.chunk_size {
                file.write_all(&buffer).await?;
                buffer.clear();
            }
        }

        if !buffer.is_empty() {
            file.write_all(&buffer).await?;
        }
        file.flush().await?;

        Ok(received)
    }
}

async fn written_size(dest: &Path) -> AppResult<u64> {
    let meta = fs::metadata(dest)
        .await
        .map_err(|e| AppError::acquisition(format!("no file at {}: {}", dest.display(), e)))?;

    if meta.len() == 0 {
        return Err(AppError::acquisition("downloaded file is empty"));
    }
    Ok(meta.len())
}

async fn discard(dest: &Path) {
    if let Err(e) = fs::remove_file(dest).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial download {}: {}", dest.display(), e);
        }
    }
}
