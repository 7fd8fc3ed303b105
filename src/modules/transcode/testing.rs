//! Test doubles shared by the transcode tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use url::Url;

use super::events::{AssetRef, Notice};
use super::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Notify { message_id: i64, text: String },
    Update { message_id: i64, text: String },
    Deliver { caption: String, size: u64 },
}

/// In-memory transport that records everything sent through it.
pub struct FakeTransport {
    fetch_bytes: Option<usize>,
    resource_url: Option<Url>,
    primary_limit: Option<u64>,
    reject_delivery: Vec<&'static str>,
    fetch_calls: AtomicUsize,
    next_id: AtomicI64,
    events: Mutex<Vec<Event>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            fetch_bytes: None,
            resource_url: None,
            primary_limit: None,
            reject_delivery: Vec::new(),
            fetch_calls: AtomicUsize::new(0),
            next_id: AtomicI64::new(100),
            events: Mutex::new(Vec::new()),
        }
    }

    /// The primary fetch succeeds and writes this many bytes.
    pub fn with_fetch_bytes(mut self, bytes: usize) -> Self {
        self.fetch_bytes = Some(bytes);
        self
    }

    pub fn with_resource_url(mut self, url: Url) -> Self {
        self.resource_url = Some(url);
        self
    }

    pub fn with_primary_limit(mut self, limit: u64) -> Self {
        self.primary_limit = Some(limit);
        self
    }

    /// Uploads whose caption mentions `label` are refused.
    pub fn rejecting_delivery_of(mut self, label: &'static str) -> Self {
        self.reject_delivery.push(label);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn deliveries(&self) -> Vec<(String, u64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Deliver { caption, size } => Some((caption, size)),
                _ => None,
            })
            .collect()
    }

    /// Every text posted or edited in, in order.
    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Notify { text, .. } | Event::Update { text, .. } => Some(text),
                Event::Deliver { .. } => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, _asset: &AssetRef, dest: &Path) -> Result<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.fetch_bytes {
            Some(n) => {
                tokio::fs::write(dest, vec![0u8; n]).await?;
                Ok(())
            }
            None => bail!("primary download unavailable"),
        }
    }

    async fn resource_url(&self, _asset: &AssetRef) -> Result<Url> {
        self.resource_url
            .clone()
            .ok_or_else(|| anyhow!("no resource url"))
    }

    fn primary_limit(&self) -> Option<u64> {
        self.primary_limit
    }

    async fn notify(&self, chat_id: i64, _reply_to: Option<i64>, text: &str) -> Result<Notice> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.push(Event::Notify {
            message_id,
            text: text.to_string(),
        });
        Ok(Notice {
            chat_id,
            message_id,
        })
    }

    async fn update_notice(&self, notice: &Notice, text: &str) -> Result<()> {
        self.push(Event::Update {
            message_id: notice.message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn deliver(&self, _chat_id: i64, artifact: &Path, caption: &str) -> Result<()> {
        let size = tokio::fs::metadata(artifact).await?.len();
        self.push(Event::Deliver {
            caption: caption.to_string(),
            size,
        });
        if self.reject_delivery.iter().any(|l| caption.contains(l)) {
            bail!("Request Entity Too Large");
        }
        Ok(())
    }
}

/// Writes an executable shell script standing in for the encoder.
#[cfg(unix)]
pub fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(format!("encoder-{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script body: write `bytes` zero bytes to the last argument and exit 0.
pub fn writes_output(bytes: usize) -> String {
    format!("for out; do :; done\nhead -c {bytes} /dev/zero > \"$out\"\nexit 0")
}

/// Script body: fail for arguments containing `needle`, otherwise behave like
/// [`writes_output`].
pub fn fails_when(needle: &str, bytes: usize) -> String {
    format!(
        "case \"$*\" in *{needle}*) echo \"Conversion failed for {needle}\" >&2; exit 1;; esac\n{}",
        writes_output(bytes)
    )
}
