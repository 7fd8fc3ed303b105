use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::warn;

use super::profile::Profile;

/// Orchestrator lifecycle for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Acquiring,
    Dispatching,
    Aggregating,
    Finalized,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Acquiring => "acquiring",
            RunState::Dispatching => "dispatching",
            RunState::Aggregating => "aggregating",
            RunState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// The acquired input of a run. Its file is removed when this is dropped.
#[derive(Debug)]
pub struct SourceAsset {
    pub id: String,
    pub size: u64,
    pub ceiling: u64,
    path: TempPath,
}

impl SourceAsset {
    pub fn new(id: String, path: TempPath, size: u64, ceiling: u64) -> Self {
        Self {
            id,
            size,
            ceiling,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) {
        release_file(self.path);
    }
}

/// A finished encoder output, owned exclusively until the delivery decision.
#[derive(Debug)]
pub struct Artifact {
    pub profile: &'static Profile,
    pub size: u64,
    path: TempPath,
}

impl Artifact {
    pub fn new(profile: &'static Profile, path: TempPath, size: u64) -> Self {
        Self {
            profile,
            size,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) {
        release_file(self.path);
    }
}

/// Removes a guarded file now instead of at drop, logging anything other than
/// "already gone".
pub fn release_file(path: TempPath) {
    let shown: PathBuf = path.to_path_buf();
    if let Err(e) = path.close() {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", shown.display(), e);
        }
    }
}

/// What one encode job produced.
#[derive(Debug)]
pub enum EncodeOutcome {
    Succeeded(Artifact),
    Failed { detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDecision {
    Deliver,
    SkipTooLarge,
}

/// Terminal outcome for one profile of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileOutcome {
    Delivered { size: u64 },
    SkippedTooLarge { size: u64 },
    EncodeFailed { detail: String },
    DeliveryFailed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileReport {
    pub label: &'static str,
    pub outcome: ProfileOutcome,
}

/// Aggregate of one run, folded in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub delivered: usize,
    pub skipped_too_large: usize,
    pub failed: usize,
    pub reports: Vec<ProfileReport>,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(mut self, report: ProfileReport) -> Self {
        match report.outcome {
            ProfileOutcome::Delivered { .. } => self.delivered += 1,
            ProfileOutcome::SkippedTooLarge { .. } => self.skipped_too_large += 1,
            ProfileOutcome::EncodeFailed { .. } | ProfileOutcome::DeliveryFailed { .. } => {
                self.failed += 1
            }
        }
        self.reports.push(report);
        self
    }

    /// A job whose task died before reporting. Its label is unknown.
    pub fn record_lost(mut self) -> Self {
        self.failed += 1;
        self
    }

    /// Renditions that reached the requester.
    pub fn success_count(&self) -> usize {
        self.delivered
    }

    pub fn headline(&self) -> String {
        format!("{}/{} versions generated", self.success_count(), self.total)
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Rejected { size: u64, ceiling: u64 },
    AcquisitionFailed { reason: String },
    Completed(RunSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(label: &'static str, outcome: ProfileOutcome) -> ProfileReport {
        ProfileReport { label, outcome }
    }

    #[test]
    fn summary_folds_every_outcome() {
        let summary = [
            report("360p", ProfileOutcome::Delivered { size: 10 }),
            report("480p", ProfileOutcome::EncodeFailed { detail: "exit 1".into() }),
            report("720p", ProfileOutcome::SkippedTooLarge { size: 99 }),
            report("1080p", ProfileOutcome::DeliveryFailed { detail: "413".into() }),
        ]
        .into_iter()
        .fold(RunSummary::new(4), RunSummary::record);

        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.skipped_too_large, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.headline(), "1/4 versions generated");
    }

    #[test]
    fn all_failed_reports_zero() {
        let summary = RunSummary::new(3).record_lost().record_lost().record_lost();
        assert_eq!(summary.success_count(), 0);
        assert_eq!(summary.headline(), "0/3 versions generated");
    }

    #[test]
    fn releasing_artifact_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("360p.mp4");
        std::fs::write(&path, b"data").unwrap();

        let profile = super::super::profile::find("360p").unwrap();
        let artifact = Artifact::new(profile, TempPath::from_path(&path), 4);
        assert!(artifact.path().exists());

        artifact.release();
        assert!(!path.exists());
    }

    #[test]
    fn dropping_source_asset_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.mp4");
        std::fs::write(&path, b"data").unwrap();

        {
            let _asset = SourceAsset::new("id".into(), TempPath::from_path(&path), 4, 10);
        }
        assert!(!path.exists());
    }

    #[test]
    fn releasing_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        release_file(TempPath::from_path(dir.path().join("never-written.mp4")));
    }
}
