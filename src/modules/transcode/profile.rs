use serde::Serialize;

/// A named target rendition.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// x264 constant rate factor.
    pub crf: u8,
    /// Target and ceiling video bitrate, in encoder notation.
    pub video_bitrate: &'static str,
    pub audio_bitrate: &'static str,
    pub preset: &'static str,
    pub container: &'static str,
}

impl Profile {
    /// File name of this profile's artifact inside a run directory.
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.label, self.container)
    }

    pub fn scale_filter(&self) -> String {
        format!("scale={}:{}", self.width, self.height)
    }
}

pub static CATALOG: [Profile; 4] = [
    Profile {
        label: "360p",
        width: 640,
        height: 360,
        crf: 26,
        video_bitrate: "800k",
        audio_bitrate: "96k",
        preset: "fast",
        container: "mp4",
    },
    Profile {
        label: "480p",
        width: 854,
        height: 480,
        crf: 25,
        video_bitrate: "1200k",
        audio_bitrate: "128k",
        preset: "fast",
        container: "mp4",
    },
    Profile {
        label: "720p",
        width: 1280,
        height: 720,
        crf: 23,
        video_bitrate: "2500k",
        audio_bitrate: "128k",
        preset: "fast",
        container: "mp4",
    },
    Profile {
        label: "1080p",
        width: 1920,
        height: 1080,
        crf: 21,
        video_bitrate: "5000k",
        audio_bitrate: "192k",
        preset: "fast",
        container: "mp4",
    },
];

pub const DEFAULT_PROFILES: &str = "360p,480p,720p";

pub fn find(label: &str) -> Option<&'static Profile> {
    CATALOG.iter().find(|p| p.label.eq_ignore_ascii_case(label))
}

/// Resolves a comma separated list of labels, keeping the given order and
/// dropping duplicates.
pub fn resolve(list: &str) -> Result<Vec<&'static Profile>, String> {
    let mut profiles: Vec<&'static Profile> = Vec::new();

    for label in list.split(',').map(str::trim).filter(|l| !l.is_empty()) {
        let profile = find(label).ok_or_else(|| format!("unknown profile '{label}'"))?;
        if !profiles.contains(&profile) {
            profiles.push(profile);
        }
    }

    if profiles.is_empty() {
        return Err("no profiles configured".to_string());
    }

    Ok(profiles)
}
