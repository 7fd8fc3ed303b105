use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use super::events::{AssetRef, Notice};

/// The chat transport as seen by the rendition engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Primary acquisition path: fetch the asset by reference and write it to `dest`.
    async fn fetch(&self, asset: &AssetRef, dest: &Path) -> Result<()>;

    /// Fully qualified URL the asset can be streamed from directly.
    async fn resource_url(&self, asset: &AssetRef) -> Result<Url>;

    /// Largest asset the primary path accepts, if it has a limit.
    fn primary_limit(&self) -> Option<u64>;

    async fn notify(&self, chat_id: i64, reply_to: Option<i64>, text: &str) -> Result<Notice>;

    async fn update_notice(&self, notice: &Notice, text: &str) -> Result<()>;

    /// Uploads a finished artifact with its caption.
    async fn deliver(&self, chat_id: i64, artifact: &Path, caption: &str) -> Result<()>;
}
