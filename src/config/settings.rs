use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::config::env::{self, EnvKey, Lookup, ProcessEnv};
use crate::error::AppError;
use crate::modules::transcode::profile::{self, Profile};

pub const MIB: u64 = 1024 * 1024;

/// How the encode jobs of one run are scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanOut {
    /// One encoder at a time, in catalog order.
    Sequential,
    /// All jobs launched at once, running encoders capped by `max_parallel_encodes`.
    Concurrent,
}

impl FromStr for FanOut {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(FanOut::Sequential),
            "concurrent" => Ok(FanOut::Concurrent),
            other => Err(format!("unknown fan-out policy '{other}'")),
        }
    }
}

impl fmt::Display for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanOut::Sequential => f.write_str("sequential"),
            FanOut::Concurrent => f.write_str("concurrent"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub bot_token: String,
    pub api_id: String,
    pub api_hash: String,
    pub bot_api_server: Url,
    /// Ceiling for the inbound asset, in bytes.
    pub max_file_size: u64,
    /// Artifacts at or above this many bytes are not transported.
    pub delivery_threshold: u64,
    /// Largest asset the transport's own download path accepts. `None` means no limit.
    pub primary_download_limit: Option<u64>,
    pub download_chunk_size: usize,
    pub work_dir: PathBuf,
    pub ffmpeg_path: Option<PathBuf>,
    pub encoder_threads: usize,
    pub fan_out: FanOut,
    pub max_parallel_encodes: usize,
    pub encode_timeout: Option<Duration>,
    pub profiles: Vec<&'static Profile>,
    pub request_workers: usize,
    pub watermark_text: Option<String>,
}

impl AppConfig {
    pub fn new() -> Result<Self, AppError> {
        Self::from_lookup(&ProcessEnv)
    }

    pub fn from_lookup(src: &impl Lookup) -> Result<Self, AppError> {
        let bot_token = env::get(src, EnvKey::BotToken)?;
        let api_id = env::get(src, EnvKey::ApiId)?;
        let api_hash = env::get(src, EnvKey::ApiHash)?;

        let server = env::get_or(src, EnvKey::BotApiServer, "http://localhost:8081");
        let bot_api_server = Url::parse(&server).map_err(|e| {
            AppError::ConfigurationFailed(format!("BOT_API_SERVER '{server}' is invalid: {e}"))
        })?;

        let profiles = profile::resolve(&env::get_or(
            src,
            EnvKey::Profiles,
            profile::DEFAULT_PROFILES,
        ))
        .map_err(|e| AppError::ConfigurationFailed(format!("PROFILES: {e}")))?;

        let encoder_threads = env::get_parsed(src, EnvKey::EncoderThreads, 1usize).max(1);
        let default_parallel = (num_cpus::get() / encoder_threads).max(1);
        let max_parallel_encodes =
            env::get_parsed(src, EnvKey::MaxParallelEncodes, default_parallel).max(1);

        let primary_limit_mb: u64 = env::get_parsed(src, EnvKey::PrimaryDownloadLimitMb, 20);
        let primary_download_limit =
            (primary_limit_mb > 0).then(|| primary_limit_mb.saturating_mul(MIB));
        let timeout_secs: u64 = env::get_parsed(src, EnvKey::EncodeTimeoutSecs, 0);
        let chunk_kb: usize = env::get_parsed(src, EnvKey::DownloadChunkKb, 1024);
        let fan_out = env::get_parsed_strict(src, EnvKey::FanOut, FanOut::Concurrent)?;
        let max_file_size_mb: u64 = env::get_parsed(src, EnvKey::MaxFileSizeMb, 2000);
        let threshold_mb: u64 = env::get_parsed(src, EnvKey::DeliveryThresholdMb, 50);

        Ok(Self {
            server_port: env::get_parsed(src, EnvKey::ServerPort, 3000),
            bot_token,
            api_id,
            api_hash,
            bot_api_server,
            max_file_size: max_file_size_mb.saturating_mul(MIB),
            delivery_threshold: threshold_mb.saturating_mul(MIB),
            primary_download_limit,
            download_chunk_size: chunk_kb.max(1).saturating_mul(1024),
            work_dir: PathBuf::from(env::get_or(src, EnvKey::WorkDir, "/tmp/output_videos")),
            ffmpeg_path: env::get_opt(src, EnvKey::FfmpegPath).map(PathBuf::from),
            encoder_threads,
            fan_out,
            max_parallel_encodes,
            encode_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            profiles,
            request_workers: env::get_parsed(src, EnvKey::RequestWorkers, 1usize).max(1),
            watermark_text: env::get_opt(src, EnvKey::WatermarkText),
        })
    }

    /// Number of encoders allowed to run at the same time within one run.
    pub fn encode_concurrency(&self) -> usize {
        match self.fan_out {
            FanOut::Sequential => 1,
            FanOut::Concurrent => self.max_parallel_encodes,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config(work_dir: &std::path::Path) -> AppConfig {
    let vars: std::collections::HashMap<String, String> = [
        ("BOT_TOKEN", "123:abc"),
        ("API_ID", "1"),
        ("API_HASH", "hash"),
        ("MAX_PARALLEL_ENCODES", "2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .chain([("WORK_DIR".to_string(), work_dir.display().to_string())])
    .collect();

    AppConfig::from_lookup(&vars).expect("test config")
}
