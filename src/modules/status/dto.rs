use serde::Serialize;
use utoipa::ToSchema;

use crate::modules::transcode::profile::Profile;
use crate::state::StatsSnapshot;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub encoder: String,
    pub uptime_secs: u64,
    pub fan_out: String,
    pub encode_concurrency: usize,
    pub stats: StatsSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub crf: u8,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub preset: String,
    pub container: String,
}

impl From<&Profile> for ProfileResponse {
    fn from(p: &Profile) -> Self {
        Self {
            label: p.label.to_string(),
            width: p.width,
            height: p.height,
            crf: p.crf,
            video_bitrate: p.video_bitrate.to_string(),
            audio_bitrate: p.audio_bitrate.to_string(),
            preset: p.preset.to_string(),
            container: p.container.to_string(),
        }
    }
}
