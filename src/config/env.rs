use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::AppError;

pub enum EnvKey {
    ServerPort,
    BotToken,
    ApiId,
    ApiHash,
    BotApiServer,
    MaxFileSizeMb,
    DeliveryThresholdMb,
    PrimaryDownloadLimitMb,
    DownloadChunkKb,
    WorkDir,
    FfmpegPath,
    EncoderThreads,
    FanOut,
    MaxParallelEncodes,
    EncodeTimeoutSecs,
    Profiles,
    RequestWorkers,
    WatermarkText,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::BotToken => "BOT_TOKEN",
            EnvKey::ApiId => "API_ID",
            EnvKey::ApiHash => "API_HASH",
            EnvKey::BotApiServer => "BOT_API_SERVER",
            EnvKey::MaxFileSizeMb => "MAX_FILE_SIZE_MB",
            EnvKey::DeliveryThresholdMb => "DELIVERY_THRESHOLD_MB",
            EnvKey::PrimaryDownloadLimitMb => "PRIMARY_DOWNLOAD_LIMIT_MB",
            EnvKey::DownloadChunkKb => "DOWNLOAD_CHUNK_KB",
            EnvKey::WorkDir => "WORK_DIR",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::EncoderThreads => "ENCODER_THREADS",
            EnvKey::FanOut => "FAN_OUT",
            EnvKey::MaxParallelEncodes => "MAX_PARALLEL_ENCODES",
            EnvKey::EncodeTimeoutSecs => "ENCODE_TIMEOUT_SECS",
            EnvKey::Profiles => "PROFILES",
            EnvKey::RequestWorkers => "REQUEST_WORKERS",
            EnvKey::WatermarkText => "WATERMARK_TEXT",
        }
    }
}

/// Where configuration values come from. The process environment in
/// production, a plain map in tests.
pub trait Lookup {
    fn lookup(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl Lookup for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl Lookup for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Empty strings count as unset.
pub fn get_opt(src: &impl Lookup, key: EnvKey) -> Option<String> {
    src.lookup(key.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn get(src: &impl Lookup, key: EnvKey) -> Result<String, AppError> {
    let name = key.as_str();
    get_opt(src, key).ok_or_else(|| AppError::ConfigurationFailed(format!("{name} is not set")))
}

pub fn get_or(src: &impl Lookup, key: EnvKey, default: &str) -> String {
    get_opt(src, key).unwrap_or_else(|| default.to_string())
}

pub fn get_parsed<T: FromStr>(src: &impl Lookup, key: EnvKey, default: T) -> T {
    match get_opt(src, key) {
        Some(val) => val.parse::<T>().unwrap_or(default),
        None => default,
    }
}

/// Like [`get_parsed`], but a value that is set and does not parse is an error.
pub fn get_parsed_strict<T>(src: &impl Lookup, key: EnvKey, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    let name = key.as_str();
    match get_opt(src, key) {
        Some(val) => val
            .parse::<T>()
            .map_err(|e| AppError::ConfigurationFailed(format!("{name}: {e}"))),
        None => Ok(default),
    }
}
