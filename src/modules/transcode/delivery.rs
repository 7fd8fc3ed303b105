use tracing::{info, warn};

use super::events::Notice;
use super::model::{Artifact, DeliveryDecision, ProfileOutcome};
use super::transport::Transport;
use crate::common::text::{USER_TEXT_LIMIT, mib, truncate};

/// Decides whether a finished artifact is sent, then always disposes of it.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryGate {
    threshold: u64,
}

impl DeliveryGate {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn evaluate(&self, size: u64) -> DeliveryDecision {
        if size >= self.threshold {
            DeliveryDecision::SkipTooLarge
        } else {
            DeliveryDecision::Deliver
        }
    }

    /// Sends or skips `artifact`, reports the result on the profile's notice and
    /// removes the local file in every case.
    pub async fn dispose(
        &self,
        artifact: Artifact,
        transport: &dyn Transport,
        chat_id: i64,
        notice: Option<&Notice>,
    ) -> ProfileOutcome {
        let label = artifact.profile.label;
        let size = tokio::fs::metadata(artifact.path())
            .await
            .map(|m| m.len())
            .unwrap_or(artifact.size);
        let size_mib = mib(size);

        let (outcome, text) = match self.evaluate(size) {
            DeliveryDecision::SkipTooLarge => {
                info!("⚠️ {} is {}MB, above the delivery threshold", label, size_mib);
                (
                    ProfileOutcome::SkippedTooLarge { size },
                    format!(
                        "⚠️ {label} too large to send ({size_mib}MB, limit {}MB)",
                        mib(self.threshold)
                    ),
                )
            }
            DeliveryDecision::Deliver => {
                let caption = format!("🎬 {label} - {size_mib}MB");
                match transport.deliver(chat_id, artifact.path(), &caption).await {
                    Ok(()) => {
                        info!("📤 Delivered {} ({}MB)", label, size_mib);
                        (
                            ProfileOutcome::Delivered { size },
                            format!("✅ {label} - {size_mib}MB"),
                        )
                    }
                    Err(e) => {
                        warn!("❌ Delivery of {} failed: {:#}", label, e);
                        (
                            ProfileOutcome::DeliveryFailed {
                                detail: truncate(&format!("{e:#}"), USER_TEXT_LIMIT),
                            },
                            format!("❌ {label} could not be sent"),
                        )
                    }
                }
            }
        };

        artifact.release();

        if let Some(notice) = notice {
            if let Err(e) = transport.update_notice(notice, &text).await {
                warn!("Failed to update notice for {}: {:#}", label, e);
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::MIB;
    use crate::modules::transcode::profile;
    use crate::modules::transcode::testing::{Event, FakeTransport};
    use tempfile::TempPath;

    fn artifact(dir: &std::path::Path, label: &str, bytes: usize) -> (Artifact, std::path::PathBuf) {
        let p = profile::find(label).unwrap();
        let path = dir.join(p.output_file_name());
        std::fs::write(&path, vec![1u8; bytes]).unwrap();
        (
            Artifact::new(p, TempPath::from_path(&path), bytes as u64),
            path,
        )
    }

    #[test]
    fn threshold_is_inclusive() {
        let gate = DeliveryGate::new(50 * MIB);
        assert_eq!(gate.evaluate(50 * MIB - 1), DeliveryDecision::Deliver);
        assert_eq!(gate.evaluate(50 * MIB), DeliveryDecision::SkipTooLarge);
        assert_eq!(gate.evaluate(80 * MIB), DeliveryDecision::SkipTooLarge);
    }

    #[tokio::test]
    async fn delivers_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let (artifact, path) = artifact(dir.path(), "480p", 3 * MIB as usize + 10);
        let transport = FakeTransport::new();
        let notice = transport.notify(1, None, "🔄 480p...").await.unwrap();

        let outcome = DeliveryGate::new(50 * MIB)
            .dispose(artifact, &transport, 1, Some(&notice))
            .await;

        assert_eq!(outcome, ProfileOutcome::Delivered { size: 3 * MIB + 10 });
        assert_eq!(
            transport.deliveries(),
            vec![("🎬 480p - 3MB".to_string(), 3 * MIB + 10)]
        );
        assert!(transport.events().contains(&Event::Update {
            message_id: notice.message_id,
            text: "✅ 480p - 3MB".into()
        }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn too_large_is_not_sent_but_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (artifact, path) = artifact(dir.path(), "720p", 2048);
        let transport = FakeTransport::new();

        let outcome = DeliveryGate::new(1024)
            .dispose(artifact, &transport, 1, None)
            .await;

        assert_eq!(outcome, ProfileOutcome::SkippedTooLarge { size: 2048 });
        assert!(transport.deliveries().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn rejected_upload_is_failure_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (artifact, path) = artifact(dir.path(), "360p", 512);
        let transport = FakeTransport::new().rejecting_delivery_of("360p");

        let outcome = DeliveryGate::new(50 * MIB)
            .dispose(artifact, &transport, 1, None)
            .await;

        assert!(matches!(outcome, ProfileOutcome::DeliveryFailed { .. }));
        assert!(!path.exists());
    }
}
