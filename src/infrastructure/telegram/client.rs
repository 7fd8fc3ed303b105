use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;

use super::types::{ApiEnvelope, File, Message, Update};
use crate::config::settings::AppConfig;
use crate::modules::transcode::events::{AssetRef, Notice};
use crate::modules::transcode::transport::Transport;

/// Long-poll window handed to `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 30;

/// Longest silence tolerated on a primary download before it is abandoned.
pub const DOWNLOAD_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Thin client for a Bot API server, hosted or self-hosted.
///
/// Every request URL embeds the bot token, so URLs are stripped from the
/// transport errors this client returns.
#[derive(Clone)]
pub struct BotApiClient {
    /// Method calls; bounded so a stalled server cannot wedge a run.
    api: Client,
    /// Primary downloads; a stalled read gives up so the fallback can run.
    download: Client,
    /// Uploads; only the connection is bounded.
    transfer: Client,
    server: String,
    token: String,
    primary_limit: Option<u64>,
}

impl BotApiClient {
    pub fn new(server: &Url, token: &str, primary_limit: Option<u64>) -> Result<Self> {
        Self::with_read_timeout(server, token, primary_limit, DOWNLOAD_READ_TIMEOUT)
    }

    pub fn with_read_timeout(
        server: &Url,
        token: &str,
        primary_limit: Option<u64>,
        read_timeout: Duration,
    ) -> Result<Self> {
        let api = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 90))
            .build()
            .map_err(|e| anyhow!("Failed to build Bot API client: {}", e))?;

        let download = Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build download client: {}", e))?;

        let transfer = Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("Failed to build transfer client: {}", e))?;

        Ok(Self {
            api,
            download,
            transfer,
            server: server.as_str().trim_end_matches('/').to_string(),
            token: token.to_string(),
            primary_limit,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        info!("Using Bot API server at {}", config.bot_api_server);
        Self::new(
            &config.bot_api_server,
            &config.bot_token,
            config.primary_download_limit,
        )
    }

    // The token contains a colon, so these are formatted rather than joined.
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.server, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.server,
            self.token,
            file_path.trim_start_matches('/')
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &impl Serialize) -> Result<T> {
        let response = self
            .api
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("{method} request failed"))?;

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("{method} returned an unreadable body"))?;

        unwrap_envelope(method, envelope)
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.call("getFile", &json!({ "file_id": file_id })).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<Message> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(id) = reply_to {
            body["reply_to_message_id"] = json!(id);
        }
        self.call("sendMessage", &body).await
    }

    pub async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        match self.call::<serde_json::Value>("editMessageText", &body).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("message is not modified") => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Uploads `path` as a document, streaming it from disk.
    pub async fn send_document(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("cannot open {}", path.display()))?;
        let length = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(file_name)
            .mime_str("video/mp4")?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .transfer
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("sendDocument request failed")?;

        let envelope: ApiEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("sendDocument returned an unreadable body")?;
        unwrap_envelope("sendDocument", envelope).map(|_| ())
    }

    async fn file_path(&self, asset: &AssetRef) -> Result<String> {
        let file = self.get_file(&asset.file_id).await?;
        file.file_path
            .ok_or_else(|| anyhow!("getFile returned no path for {}", file.file_id))
    }

    async fn download(&self, file_path: &str, dest: &Path) -> Result<()> {
        let response = self
            .download
            .get(self.file_url(file_path))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(reqwest::Error::without_url)
            .context("file download failed")?;

        let mut out = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(reqwest::Error::without_url)
                .context("file download interrupted")?;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        Ok(())
    }
}

fn unwrap_envelope<T>(method: &str, envelope: ApiEnvelope<T>) -> Result<T> {
    if !envelope.ok {
        bail!(
            "{} failed ({}): {}",
            method,
            envelope.error_code.unwrap_or_default(),
            envelope.description.as_deref().unwrap_or("no description")
        );
    }
    envelope
        .result
        .ok_or_else(|| anyhow!("{method} returned no result"))
}

#[async_trait]
impl Transport for BotApiClient {
    async fn fetch(&self, asset: &AssetRef, dest: &Path) -> Result<()> {
        let file_path = self.file_path(asset).await?;

        // A self-hosted server in local mode hands back a path on its own disk.
        let local = PathBuf::from(&file_path);
        if local.is_absolute() && tokio::fs::try_exists(&local).await.unwrap_or(false) {
            debug!("Copying {} from local Bot API storage", local.display());
            tokio::fs::copy(&local, dest).await?;
            return Ok(());
        }

        self.download(&file_path, dest).await
    }

    async fn resource_url(&self, asset: &AssetRef) -> Result<Url> {
        let file_path = self.file_path(asset).await?;
        Url::parse(&self.file_url(&file_path)).context("invalid file URL")
    }

    fn primary_limit(&self) -> Option<u64> {
        self.primary_limit
    }

    async fn notify(&self, chat_id: i64, reply_to: Option<i64>, text: &str) -> Result<Notice> {
        let message = self.send_message(chat_id, reply_to, text).await?;
        Ok(Notice {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }

    async fn update_notice(&self, notice: &Notice, text: &str) -> Result<()> {
        self.edit_message_text(notice.chat_id, notice.message_id, text)
            .await
    }

    async fn deliver(&self, chat_id: i64, artifact: &Path, caption: &str) -> Result<()> {
        self.send_document(chat_id, artifact, caption).await
    }
}
