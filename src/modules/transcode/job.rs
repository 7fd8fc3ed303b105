use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, info, warn};

use super::encoder::{Encoder, ProcessOutput};
use super::model::{Artifact, EncodeOutcome, JobState};
use super::profile::Profile;
use crate::common::text::{USER_TEXT_LIMIT, truncate};

/// One (source asset, profile) encode.
#[derive(Debug)]
pub struct EncodeJob {
    pub profile: &'static Profile,
    state: JobState,
    output: PathBuf,
}

impl EncodeJob {
    /// The artifact lands at `<run_dir>/<label>.<container>`.
    pub fn new(profile: &'static Profile, run_dir: &Path) -> Self {
        Self {
            profile,
            state: JobState::Queued,
            output: run_dir.join(profile.output_file_name()),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Encodes `input` into this job's output file.
    ///
    /// The output path is guarded from the moment the encoder starts, so any
    /// failure leaves nothing behind at that path.
    pub async fn run(&mut self, encoder: &Encoder, input: &Path) -> EncodeOutcome {
        self.state = JobState::Running;
        info!("🔄 Encoding {}...", self.profile.label);

        let guard = TempPath::from_path(&self.output);
        let result = encoder.execute(input, self.profile, &self.output).await;

        let outcome = match result {
            Ok(process) => self.classify(process, guard).await,
            Err(detail) => EncodeOutcome::Failed { detail },
        };

        self.state = match &outcome {
            EncodeOutcome::Succeeded(_) => JobState::Succeeded,
            EncodeOutcome::Failed { detail } => {
                warn!("❌ Encoding {} failed: {}", self.profile.label, detail);
                JobState::Failed
            }
        };
        outcome
    }

    /// A zero exit status alone is not success; the output has to be there.
    async fn classify(&self, process: ProcessOutput, guard: TempPath) -> EncodeOutcome {
        if !process.status.success() {
            warn!(
                "Encoder stderr for {} ({}):\n{}",
                self.profile.label, process.status, process.stderr
            );
            let detail = format!("encoder exited with {}: {}", process.status, process.stderr.trim());
            return EncodeOutcome::Failed {
                detail: truncate(&detail, USER_TEXT_LIMIT),
            };
        }

        if !process.stderr.trim().is_empty() {
            debug!("Encoder stderr for {}:\n{}", self.profile.label, process.stderr);
        }

        match tokio::fs::metadata(&self.output).await {
            Ok(meta) if meta.len() > 0 => {
                info!("✅ Encoded {} ({} bytes)", self.profile.label, meta.len());
                EncodeOutcome::Succeeded(Artifact::new(self.profile, guard, meta.len()))
            }
            Ok(_) => EncodeOutcome::Failed {
                detail: "output is empty".to_string(),
            },
            Err(_) => EncodeOutcome::Failed {
                detail: "output not produced".to_string(),
            },
        }
    }
}
