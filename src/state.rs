use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use utoipa::ToSchema;

use crate::config::settings::AppConfig;
use crate::modules::transcode::model::RunOutcome;

/// Running totals since startup.
#[derive(Debug, Default)]
pub struct RunStats {
    in_flight: AtomicU64,
    completed: AtomicU64,
    rejected: AtomicU64,
    acquisition_failed: AtomicU64,
    crashed: AtomicU64,
    delivered: AtomicU64,
    skipped_too_large: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatsSnapshot {
    pub in_flight: u64,
    pub completed: u64,
    pub rejected: u64,
    pub acquisition_failed: u64,
    pub crashed: u64,
    pub renditions_delivered: u64,
    pub renditions_skipped_too_large: u64,
    pub renditions_failed: u64,
}

impl RunStats {
    pub fn started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: &RunOutcome) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        match outcome {
            RunOutcome::Rejected { .. } => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
            RunOutcome::AcquisitionFailed { .. } => {
                self.acquisition_failed.fetch_add(1, Ordering::Relaxed);
            }
            RunOutcome::Completed(summary) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                self.delivered
                    .fetch_add(summary.delivered as u64, Ordering::Relaxed);
                self.skipped_too_large
                    .fetch_add(summary.skipped_too_large as u64, Ordering::Relaxed);
                self.failed
                    .fetch_add(summary.failed as u64, Ordering::Relaxed);
            }
        }
    }

    /// A run that ended without an outcome.
    pub fn crashed(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.crashed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            in_flight: self.in_flight.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            acquisition_failed: self.acquisition_failed.load(Ordering::Relaxed),
            crashed: self.crashed.load(Ordering::Relaxed),
            renditions_delivered: self.delivered.load(Ordering::Relaxed),
            renditions_skipped_too_large: self.skipped_too_large.load(Ordering::Relaxed),
            renditions_failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub encoder_version: String,
    pub stats: Arc<RunStats>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, encoder_version: String) -> Self {
        Self {
            config,
            encoder_version,
            stats: Arc::new(RunStats::default()),
            started_at: Instant::now(),
        }
    }
}
