//! Fetch-and-send of a single selected file.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::messages;
use super::surface::{ChatRef, ChatSurface, MessageRef};
use super::BrowseKind;
use crate::core::AppResult;
use crate::drive::RemoteTree;

/// Records points for delivered files.
#[async_trait]
pub trait PointsLedger: Send + Sync {
    async fn award(&self, user_id: i64, points: i64) -> AppResult<()>;
}

/// One requested file. Lives only for the duration of the fetch and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub file_id: String,
    pub file_name: String,
    pub kind: BrowseKind,
    pub user_id: i64,
    pub chat: ChatRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Delivered { bytes: usize },
    Failed,
}

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// A "still working" message that goes out only if not cancelled in time.
///
/// Firing and cancelling both go through one compare-and-swap on `state`, so
/// exactly one of them wins. When firing won, `cancel` waits until the notice
/// has been sent, which keeps it ahead of whatever the caller sends next.
pub struct DelayedNotice {
    state: Arc<AtomicU8>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl DelayedNotice {
    pub fn arm(surface: Arc<dyn ChatSurface>, chat: ChatRef, delay: Duration, text: impl Into<String>) -> Self {
        let state = Arc::new(AtomicU8::new(ARMED));
        let token = CancellationToken::new();
        let text = text.into();

        let handle = tokio::spawn({
            let state = Arc::clone(&state);
            let token = token.clone();
            async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {
                        if state
                            .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            if let Err(e) = surface.send_text(chat, &text).await {
                                log::warn!("Failed to send slow-fetch notice to chat {}: {}", chat.0, e);
                            }
                        }
                    }
                }
            }
        });

        Self {
            state,
            token,
            handle: Some(handle),
        }
    }

    /// Stops the notice. Returns `true` if it had already fired.
    pub async fn cancel(mut self) -> bool {
        match self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.token.cancel();
                false
            }
            Err(_) => {
                if let Some(handle) = self.handle.take() {
                    if let Err(e) = handle.await {
                        log::warn!("Slow-fetch notice task failed: {}", e);
                    }
                }
                true
            }
        }
    }
}

impl Drop for DelayedNotice {
    fn drop(&mut self) {
        let _ = self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire);
        self.token.cancel();
    }
}

/// Fetches a file from the remote tree and delivers it as a document.
#[derive(Clone)]
pub struct DownloadPipeline {
    tree: Arc<dyn RemoteTree>,
    surface: Arc<dyn ChatSurface>,
    notice_delay: Duration,
    ledger: Option<Arc<dyn PointsLedger>>,
}

impl DownloadPipeline {
    pub fn new(tree: Arc<dyn RemoteTree>, surface: Arc<dyn ChatSurface>, notice_delay: Duration) -> Self {
        Self {
            tree,
            surface,
            notice_delay,
            ledger: None,
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn PointsLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Runs one download. `status` is the menu message the user pressed; it
    /// becomes the progress line and is removed or replaced at the end.
    ///
    /// Never returns an error: every failure ends in a message naming the file.
    pub async fn download(&self, job: DownloadJob, status: MessageRef) -> DownloadOutcome {
        if let Err(e) = self.surface.edit_text(status, &messages::preparing(&job.file_name)).await {
            log::warn!("Could not update status message for {}: {}", job.file_name, e);
        }

        let notice = DelayedNotice::arm(Arc::clone(&self.surface), job.chat, self.notice_delay, messages::SLOW_FETCH);
        let fetched = self.tree.fetch_content(&job.file_id).await;
        let notice_fired = notice.cancel().await;
        if notice_fired {
            log::debug!("Fetch of {} outlasted the notice delay", job.file_id);
        }

        let content = match fetched {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Download of '{}' for user {} failed: {}", job.file_name, job.user_id, e);
                self.report_failure(status, &job.file_name).await;
                return DownloadOutcome::Failed;
            }
        };

        let size = content.len();
        if let Err(e) = self.surface.send_document(job.chat, &job.file_name, content).await {
            log::warn!("Sending '{}' to chat {} failed: {}", job.file_name, job.chat.0, e);
            self.report_failure(status, &job.file_name).await;
            return DownloadOutcome::Failed;
        }

        if let Err(e) = self.surface.delete_message(status).await {
            log::debug!("Could not delete status message {}: {}", status.message_id, e);
        }

        log::info!(
            "Delivered '{}' ({} bytes) to user {}",
            job.file_name,
            size,
            job.user_id
        );
        self.award_points(job.user_id, job.kind);

        DownloadOutcome::Delivered { bytes: size }
    }

    async fn report_failure(&self, status: MessageRef, file_name: &str) {
        if let Err(e) = self.surface.edit_text(status, &messages::download_failed(file_name)).await {
            log::warn!("Could not report failed download of {}: {}", file_name, e);
        }
    }

    fn award_points(&self, user_id: i64, kind: BrowseKind) {
        let Some(ledger) = self.ledger.clone() else {
            return;
        };
        let points = kind.points();
        tokio::spawn(async move {
            if let Err(e) = ledger.award(user_id, points).await {
                log::warn!("Failed to award {} points to user {}: {}", points, user_id, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryTree, RecordingSurface, SurfaceEvent};
    use crate::drive::NameMatch;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Ledger(Mutex<Vec<(i64, i64)>>);

    #[async_trait]
    impl PointsLedger for Ledger {
        async fn award(&self, user_id: i64, points: i64) -> AppResult<()> {
            self.0.lock().unwrap().push((user_id, points));
            Ok(())
        }
    }

    fn job(file_id: &str) -> DownloadJob {
        DownloadJob {
            file_id: file_id.into(),
            file_name: "unit1.pdf".into(),
            kind: BrowseKind::Assignments,
            user_id: 9,
            chat: ChatRef(9),
        }
    }

    fn setup() -> (Arc<MemoryTree>, Arc<RecordingSurface>) {
        let tree = Arc::new(MemoryTree::new("root", NameMatch::Exact));
        tree.add_file("root", "F123", "unit1.pdf", &b"pdf bytes"[..]);
        (tree, Arc::new(RecordingSurface::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_notice_cancelled_before_delay_never_fires() {
        let surface = Arc::new(RecordingSurface::new());
        let notice = DelayedNotice::arm(surface.clone(), ChatRef(1), Duration::from_secs(7), "slow");

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!notice.cancel().await);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(surface.texts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notice_fires_once_after_delay() {
        let surface = Arc::new(RecordingSurface::new());
        let notice = DelayedNotice::arm(surface.clone(), ChatRef(1), Duration::from_secs(7), "slow");

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert!(notice.cancel().await);
        assert_eq!(surface.texts(), vec!["slow".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_notice_does_not_fire() {
        let surface = Arc::new(RecordingSurface::new());
        drop(DelayedNotice::arm(surface.clone(), ChatRef(1), Duration::from_secs(1), "slow"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(surface.texts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_download_delivers_and_awards_points() {
        let (tree, surface) = setup();
        let ledger = Arc::new(Ledger::default());
        let pipeline =
            DownloadPipeline::new(tree.clone(), surface.clone(), Duration::from_secs(7)).with_ledger(ledger.clone());
        let status = surface.seed_message(ChatRef(9));

        let outcome = pipeline.download(job("F123"), status).await;
        assert_eq!(outcome, DownloadOutcome::Delivered { bytes: 9 });

        tokio::task::yield_now().await;
        assert_eq!(*ledger.0.lock().unwrap(), vec![(9, 2)]);

        let events = surface.events();
        assert_eq!(
            events,
            vec![
                SurfaceEvent::EditText {
                    message: status,
                    text: "⬇️ Preparing to download 'unit1.pdf'...".into()
                },
                SurfaceEvent::Document {
                    chat: ChatRef(9),
                    file_name: "unit1.pdf".into(),
                    size: 9
                },
                SurfaceEvent::Delete { message: status },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_download_sends_notice_before_document() {
        let (tree, surface) = setup();
        tree.set_fetch_delay(Duration::from_secs(10));
        let pipeline = DownloadPipeline::new(tree.clone(), surface.clone(), Duration::from_secs(7));
        let status = surface.seed_message(ChatRef(9));

        pipeline.download(job("F123"), status).await;

        let events = surface.events();
        let notice_at = events
            .iter()
            .position(|e| matches!(e, SurfaceEvent::Text { text, .. } if text == messages::SLOW_FETCH))
            .unwrap();
        let document_at = events
            .iter()
            .position(|e| matches!(e, SurfaceEvent::Document { .. }))
            .unwrap();
        assert!(notice_at < document_at);
        assert_eq!(surface.texts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_reports_file_name() {
        let (tree, surface) = setup();
        tree.fail_fetch("F123");
        let ledger = Arc::new(Ledger::default());
        let pipeline =
            DownloadPipeline::new(tree.clone(), surface.clone(), Duration::from_secs(7)).with_ledger(ledger.clone());
        let status = surface.seed_message(ChatRef(9));

        assert_eq!(pipeline.download(job("F123"), status).await, DownloadOutcome::Failed);
        tokio::task::yield_now().await;

        assert!(ledger.0.lock().unwrap().is_empty());
        assert_eq!(
            surface.events().last(),
            Some(&SurfaceEvent::EditText {
                message: status,
                text: "❌ Sorry, failed to download 'unit1.pdf'.".into()
            })
        );
        assert!(!surface
            .events()
            .iter()
            .any(|e| matches!(e, SurfaceEvent::Document { .. })));
    }
}
