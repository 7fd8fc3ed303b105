use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use tracing::{Instrument, error, info, info_span, warn};

use crate::common::text::{USER_TEXT_LIMIT, truncate};
use crate::infrastructure::telegram::client::BotApiClient;
use crate::infrastructure::telegram::types::Message;
use crate::modules::transcode::events::AssetRef;
use crate::modules::transcode::orchestrator::Orchestrator;
use crate::modules::transcode::transport::Transport;
use crate::state::{AppState, RunStats};

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub async fn start_transcoder_worker(
    state: AppState,
    client: BotApiClient,
    orchestrator: Arc<Orchestrator>,
) {
    info!("🎥 Starting Transcoder Worker...");

    let (tx, rx) = async_channel::unbounded::<AssetRef>();
    let transport: Arc<dyn Transport> = Arc::new(client.clone());

    for id in 0..state.config.request_workers.max(1) {
        tokio::spawn(run_request_worker(
            id,
            rx.clone(),
            orchestrator.clone(),
            transport.clone(),
            state.stats.clone(),
        ));
    }
    drop(rx);

    info!(
        "🎥 Transcoder Worker polling for videos with {} request worker(s)",
        state.config.request_workers.max(1)
    );

    let mut offset = 0;
    loop {
        match poll_once(&client, offset, &tx).await {
            Ok(next) => offset = next,
            Err(PollError::QueueClosed) => {
                error!("❌ Request queue closed, stopping poller");
                return;
            }
            Err(PollError::Api(e)) => {
                warn!("⚠️ getUpdates failed: {:#}. Retrying in {}s", e, POLL_RETRY_DELAY.as_secs());
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}

#[derive(Debug)]
enum PollError {
    Api(anyhow::Error),
    QueueClosed,
}

/// Fetches one batch of updates and queues every accepted video.
/// Returns the offset for the next call.
async fn poll_once(
    client: &BotApiClient,
    offset: i64,
    tx: &Sender<AssetRef>,
) -> Result<i64, PollError> {
    let updates = client.get_updates(offset).await.map_err(PollError::Api)?;

    let mut next = offset;
    for update in updates {
        next = next.max(update.update_id + 1);

        let Some(asset) = update.message.as_ref().and_then(Message::asset_ref) else {
            continue;
        };

        info!(
            "📦 Received video {} ({} bytes) from chat {}",
            asset.file_id, asset.size, asset.chat_id
        );
        tx.send(asset).await.map_err(|_| PollError::QueueClosed)?;
    }
    Ok(next)
}

/// Consumes queued requests one at a time until the queue closes.
async fn run_request_worker(
    id: usize,
    rx: Receiver<AssetRef>,
    orchestrator: Arc<Orchestrator>,
    transport: Arc<dyn Transport>,
    stats: Arc<RunStats>,
) {
    while let Ok(asset) = rx.recv().await {
        let (chat_id, message_id) = (asset.chat_id, asset.message_id);
        stats.started();

        let run = orchestrator.clone();
        let task = tokio::spawn(
            async move { run.handle(asset).await }
                .instrument(info_span!("request", worker = id, chat_id)),
        );

        match task.await {
            Ok(outcome) => stats.record(&outcome),
            Err(e) => {
                error!("❌ Run for chat {} ended abnormally: {}", chat_id, e);
                stats.crashed();
                let text = format!("❌ Error: {}", truncate(&e.to_string(), USER_TEXT_LIMIT));
                if let Err(e) = transport.notify(chat_id, Some(message_id), &text).await {
                    warn!("Failed to report error to chat {}: {:#}", chat_id, e);
                }
            }
        }
    }
    info!("Request worker {} stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn poll_queues_videos_and_advances_offset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    { "update_id": 40, "message": {
                        "message_id": 1, "chat": { "id": 5 }, "text": "hi"
                    }},
                    { "update_id": 41, "message": {
                        "message_id": 2, "chat": { "id": 5 },
                        "video": { "file_id": "V1", "file_size": 100, "mime_type": "video/mp4" }
                    }}
                ]
            })))
            .mount(&server)
            .await;

        let client = BotApiClient::new(&Url::parse(&server.uri()).unwrap(), "123:abc", None).unwrap();
        let (tx, rx) = async_channel::unbounded();

        let next = poll_once(&client, 0, &tx).await.unwrap();

        assert_eq!(next, 42);
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.recv().await.unwrap().file_id, "V1");
    }

    #[tokio::test]
    async fn poll_reports_api_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "ok": false, "error_code": 409, "description": "Conflict"
            })))
            .mount(&server)
            .await;

        let client = BotApiClient::new(&Url::parse(&server.uri()).unwrap(), "123:abc", None).unwrap();
        let (tx, _rx) = async_channel::unbounded();

        assert!(matches!(
            poll_once(&client, 7, &tx).await,
            Err(PollError::Api(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn worker_drains_queue_and_counts_runs() {
        use crate::config::settings::{MIB, test_config};
        use crate::modules::transcode::encoder::Encoder;
        use crate::modules::transcode::testing::{FakeTransport, fake_encoder, writes_output};

        let scratch = tempfile::tempdir().unwrap();
        let bin = scratch.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();

        let config = Arc::new(test_config(&scratch.path().join("work")));
        let encoder = Encoder::new(fake_encoder(&bin, &writes_output(1024)), "t".into(), 1, None);
        let transport = Arc::new(FakeTransport::new().with_fetch_bytes(2048));
        let orchestrator = Arc::new(
            Orchestrator::new(config, transport.clone(), Arc::new(encoder)).unwrap(),
        );
        let stats = Arc::new(RunStats::default());

        let (tx, rx) = async_channel::unbounded();
        let asset = |size: u64| AssetRef {
            file_id: "F".into(),
            file_name: None,
            size,
            mime_type: Some("video/mp4".into()),
            chat_id: 1,
            message_id: 2,
        };
        tx.send(asset(2048)).await.unwrap();
        tx.send(asset(5000 * MIB)).await.unwrap();
        drop(tx);

        run_request_worker(0, rx, orchestrator, transport.clone(), stats.clone()).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.renditions_delivered, 3);
    }
}
