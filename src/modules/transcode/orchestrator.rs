//! Per-request driver: acquire the source once, fan out one encode job per
//! profile, push every finished artifact through the delivery gate and clean
//! up everything the run created.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tempfile::{TempDir, TempPath};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::acquisition::Acquisition;
use super::delivery::DeliveryGate;
use super::encoder::Encoder;
use super::events::{AssetRef, Notice};
use super::job::EncodeJob;
use super::model::{
    EncodeOutcome, ProfileOutcome, ProfileReport, RunOutcome, RunState, RunSummary, SourceAsset,
};
use super::transport::Transport;
use crate::common::text::mib;
use crate::config::settings::{AppConfig, FanOut};
use crate::error::AppError;

pub struct Orchestrator {
    config: Arc<AppConfig>,
    transport: Arc<dyn Transport>,
    encoder: Arc<Encoder>,
    acquisition: Acquisition,
    gate: DeliveryGate,
}

/// Everything a spawned job needs, cheap to clone.
#[derive(Clone)]
struct JobContext {
    encoder: Arc<Encoder>,
    transport: Arc<dyn Transport>,
    gate: DeliveryGate,
    input: Arc<PathBuf>,
    chat_id: i64,
}

impl Orchestrator {
    pub fn new(
        config: Arc<AppConfig>,
        transport: Arc<dyn Transport>,
        encoder: Arc<Encoder>,
    ) -> anyhow::Result<Self> {
        let acquisition = Acquisition::new(
            transport.clone(),
            config.download_chunk_size,
            config.max_file_size,
        )?;
        let gate = DeliveryGate::new(config.delivery_threshold);

        Ok(Self {
            config,
            transport,
            encoder,
            acquisition,
            gate,
        })
    }

    /// Runs one request to completion. Never fails: every path ends in a
    /// [`RunOutcome`] with the run's files released.
    pub async fn handle(&self, asset: AssetRef) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, file_id = %asset.file_id);
        self.run(asset, run_id).instrument(span).await
    }

    async fn run(&self, asset: AssetRef, run_id: Uuid) -> RunOutcome {
        let mut state = RunState::Idle;
        let ceiling = self.config.max_file_size;

        if asset.size > ceiling {
            info!("🚫 Rejected {} bytes, ceiling is {}", asset.size, ceiling);
            self.say(asset.chat_id, Some(asset.message_id), &too_large(ceiling))
                .await;
            return RunOutcome::Rejected {
                size: asset.size,
                ceiling,
            };
        }

        advance(&mut state, RunState::Acquiring);
        let start = self
            .say(asset.chat_id, Some(asset.message_id), "📥 Downloading...")
            .await;

        let run_dir = match self.create_run_dir(run_id) {
            Ok(dir) => dir,
            Err(e) => {
                error!("Cannot prepare working directory: {:#}", e);
                return self
                    .acquisition_failed(&mut state, &asset, start, format!("{e:#}"))
                    .await;
            }
        };

        let input_path = run_dir
            .path()
            .join(format!("input.{}", asset.input_extension()));
        let input_guard = TempPath::from_path(&input_path);

        let size = match self.acquisition.acquire(&asset, &input_path).await {
            Ok(size) => size,
            Err(AppError::AssetTooLarge { size, ceiling }) => {
                info!("🚫 Acquired {} bytes, ceiling is {}", size, ceiling);
                drop(input_guard);
                release_dir(run_dir);
                advance(&mut state, RunState::Finalized);
                self.conclude(start, &asset, &too_large(ceiling)).await;
                return RunOutcome::Rejected { size, ceiling };
            }
            Err(e) => {
                error!("❌ {}", e);
                drop(input_guard);
                release_dir(run_dir);
                let reason = match e {
                    AppError::AcquisitionFailed { reason } => reason,
                    other => other.to_string(),
                };
                return self
                    .acquisition_failed(&mut state, &asset, start, reason)
                    .await;
            }
        };

        let source = SourceAsset::new(asset.file_id.clone(), input_guard, size, ceiling);
        info!("⬇️ Acquired {} bytes", source.size);
        self.edit(start.as_ref(), &format!("🎬 Compressing ({}MB)...", mib(source.size)))
            .await;

        advance(&mut state, RunState::Dispatching);
        let ctx = JobContext {
            encoder: self.encoder.clone(),
            transport: self.transport.clone(),
            gate: self.gate,
            input: Arc::new(source.path().to_path_buf()),
            chat_id: asset.chat_id,
        };

        let summary = match self.config.fan_out {
            FanOut::Sequential => self.run_sequential(&ctx, &run_dir, &mut state).await,
            FanOut::Concurrent => self.run_concurrent(&ctx, &run_dir, &mut state).await,
        };

        advance(&mut state, RunState::Finalized);
        source.release();
        release_dir(run_dir);

        info!(
            delivered = summary.delivered,
            skipped = summary.skipped_too_large,
            failed = summary.failed,
            "🏁 Run finished: {}",
            summary.headline()
        );
        self.conclude(start, &asset, &format!("✅ Done! {}", summary.headline()))
            .await;

        RunOutcome::Completed(summary)
    }

    /// One encoder at a time, in catalog order.
    async fn run_sequential(
        &self,
        ctx: &JobContext,
        run_dir: &TempDir,
        state: &mut RunState,
    ) -> RunSummary {
        advance(state, RunState::Aggregating);
        let mut summary = RunSummary::new(self.config.profiles.len());

        for profile in self.config.profiles.iter().copied() {
            let notice = self.queue_notice(ctx.chat_id, profile.label).await;
            let job = EncodeJob::new(profile, run_dir.path());
            summary = summary.record(run_job(ctx.clone(), job, notice).await);
        }

        summary
    }

    /// Every job is launched up front; a semaphore caps how many encoders
    /// run at once. Results are folded in completion order.
    async fn run_concurrent(
        &self,
        ctx: &JobContext,
        run_dir: &TempDir,
        state: &mut RunState,
    ) -> RunSummary {
        let permits = Arc::new(Semaphore::new(self.config.encode_concurrency()));
        let mut jobs = JoinSet::new();

        for profile in self.config.profiles.iter().copied() {
            let notice = self.queue_notice(ctx.chat_id, profile.label).await;
            let job = EncodeJob::new(profile, run_dir.path());
            let ctx = ctx.clone();
            let permits = permits.clone();

            jobs.spawn(
                async move {
                    let label = job.profile.label;
                    match permits.acquire_owned().await {
                        Ok(_permit) => run_job(ctx, job, notice).await,
                        Err(_) => ProfileReport {
                            label,
                            outcome: ProfileOutcome::EncodeFailed {
                                detail: "scheduler closed".to_string(),
                            },
                        },
                    }
                }
                .in_current_span(),
            );
        }

        advance(state, RunState::Aggregating);
        let mut summary = RunSummary::new(self.config.profiles.len());

        while let Some(joined) = jobs.join_next().await {
            summary = match joined {
                Ok(report) => summary.record(report),
                Err(e) => {
                    error!("Encode task died: {}", e);
                    summary.record_lost()
                }
            };
        }

        summary
    }

    fn create_run_dir(&self, run_id: Uuid) -> anyhow::Result<TempDir> {
        std::fs::create_dir_all(&self.config.work_dir).with_context(|| {
            format!("cannot create {}", self.config.work_dir.display())
        })?;

        tempfile::Builder::new()
            .prefix(&format!("run-{}-", run_id.simple()))
            .tempdir_in(&self.config.work_dir)
            .context("cannot create run directory")
    }

    async fn acquisition_failed(
        &self,
        state: &mut RunState,
        asset: &AssetRef,
        start: Option<Notice>,
        reason: String,
    ) -> RunOutcome {
        advance(state, RunState::Finalized);
        // The reason can name hosts and paths; it stays in the logs.
        self.conclude(start, asset, "❌ Download failed").await;
        RunOutcome::AcquisitionFailed { reason }
    }

    /// Puts `text` on the start notice, or posts it when there is none.
    async fn conclude(&self, start: Option<Notice>, asset: &AssetRef, text: &str) {
        match start {
            Some(notice) => self.edit(Some(&notice), text).await,
            None => {
                self.say(asset.chat_id, Some(asset.message_id), text).await;
            }
        }
    }

    async fn queue_notice(&self, chat_id: i64, label: &str) -> Option<Notice> {
        self.say(chat_id, None, &format!("🔄 {label}...")).await
    }

    /// Posts a notice. Transport trouble is logged, never fatal to the run.
    async fn say(&self, chat_id: i64, reply_to: Option<i64>, text: &str) -> Option<Notice> {
        match self.transport.notify(chat_id, reply_to, text).await {
            Ok(notice) => Some(notice),
            Err(e) => {
                warn!("Failed to send notice: {:#}", e);
                None
            }
        }
    }

    async fn edit(&self, notice: Option<&Notice>, text: &str) {
        if let Some(notice) = notice {
            if let Err(e) = self.transport.update_notice(notice, text).await {
                warn!("Failed to update notice: {:#}", e);
            }
        }
    }
}

/// Encode, then hand a success to the delivery gate. Lifecycle notices for a
/// profile are only ever touched from here, so they stay in order.
async fn run_job(ctx: JobContext, mut job: EncodeJob, notice: Option<Notice>) -> ProfileReport {
    let label = job.profile.label;

    let outcome = match job.run(&ctx.encoder, &ctx.input).await {
        EncodeOutcome::Succeeded(artifact) => {
            ctx.gate
                .dispose(artifact, ctx.transport.as_ref(), ctx.chat_id, notice.as_ref())
                .await
        }
        EncodeOutcome::Failed { detail } => {
            if let Some(notice) = &notice {
                if let Err(e) = ctx
                    .transport
                    .update_notice(notice, &format!("❌ {label} failed"))
                    .await
                {
                    warn!("Failed to update notice for {}: {:#}", label, e);
                }
            }
            ProfileOutcome::EncodeFailed { detail }
        }
    };

    ProfileReport { label, outcome }
}

fn too_large(ceiling: u64) -> String {
    format!("❌ File too large. Maximum: {}MB", mib(ceiling))
}

fn advance(state: &mut RunState, next: RunState) {
    info!("Run {} -> {}", state, next);
    *state = next;
}

fn release_dir(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        warn!("Failed to remove run directory {}: {}", path.display(), e);
    }
}
