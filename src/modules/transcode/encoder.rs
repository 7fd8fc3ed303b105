use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use super::profile::Profile;
use crate::config::settings::AppConfig;
use crate::error::{AppError, AppResult};

/// Startup limit for `ffmpeg -version`.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured result of one encoder process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

/// The external encoder binary, verified once at startup.
#[derive(Debug, Clone)]
pub struct Encoder {
    program: PathBuf,
    version: String,
    threads: usize,
    timeout: Option<Duration>,
}

impl Encoder {
    /// Locates the encoder (explicit path or `ffmpeg` on `PATH`) and reads its version.
    pub async fn discover(config: &AppConfig) -> AppResult<Self> {
        let program = match &config.ffmpeg_path {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                return Err(AppError::DependencyMissing(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            None => which::which("ffmpeg").map_err(|e| {
                AppError::DependencyMissing(format!("ffmpeg not found in PATH: {e}"))
            })?,
        };

        let version = read_version(&program, VERSION_TIMEOUT).await?;
        info!("✅ Encoder detected: {} ({})", version, program.display());

        Ok(Self::new(
            program,
            version,
            config.encoder_threads,
            config.encode_timeout,
        ))
    }

    pub fn new(
        program: PathBuf,
        version: String,
        threads: usize,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            program,
            version,
            threads: threads.max(1),
            timeout,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn args(&self, input: &Path, profile: &Profile, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-vf".into(),
            profile.scale_filter(),
            "-c:v".into(),
            "libx264".into(),
            "-crf".into(),
            profile.crf.to_string(),
            "-b:v".into(),
            profile.video_bitrate.into(),
            "-maxrate".into(),
            profile.video_bitrate.into(),
            "-bufsize".into(),
            "2M".into(),
            "-preset".into(),
            profile.preset.into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            profile.audio_bitrate.into(),
            "-movflags".into(),
            "+faststart".into(),
            "-threads".into(),
            self.threads.to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// Runs the encoder for one profile and waits for it to exit.
    ///
    /// The child is killed if this future is dropped or the watchdog fires.
    pub async fn execute(
        &self,
        input: &Path,
        profile: &Profile,
        output: &Path,
    ) -> Result<ProcessOutput, String> {
        let args = self.args(input, profile, output);
        debug!("Encoder args for {}: {:?}", profile.label, args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn encoder: {e}"))?;

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| format!("encoder timed out after {}s", limit.as_secs()))?,
            None => child.wait_with_output().await,
        };

        let output = waited.map_err(|e| format!("failed waiting for encoder: {e}"))?;

        Ok(ProcessOutput {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs `<program> -version` and returns the first line it prints.
pub async fn read_version(program: &Path, limit: Duration) -> AppResult<String> {
    let missing = |reason: String| AppError::DependencyMissing(reason);

    let run = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(limit, run)
        .await
        .map_err(|_| missing(format!("version check timed out after {}s", limit.as_secs())))?
        .map_err(|e| missing(format!("cannot execute {}: {}", program.display(), e)))?;

    if !output.status.success() {
        return Err(missing(format!(
            "{} -version exited with {}",
            program.display(),
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or("unknown version")
        .trim()
        .to_string())
}
