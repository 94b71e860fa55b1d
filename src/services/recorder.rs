use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::models::{clamp_weight, InteractionKind, NewInteraction};
use crate::store::InteractionStore;

/// Map size above which stale debounce entries are purged
const GC_THRESHOLD: usize = 1000;

type DebounceKey = (i64, i64, InteractionKind);

/// Result of a recording attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordOutcome {
    pub accepted: bool,
    pub weight: f64,
}

/// Records user-content interactions with duplicate suppression.
///
/// The debounce map is the only shared mutable state in the core: the
/// check-and-set runs under one mutex so two concurrent requests for the
/// same (user, post, kind) cannot both be accepted within the window.
/// Accepted rows are handed to a background writer task; persistence never
/// blocks or fails the triggering request.
pub struct InteractionRecorder {
    window: Duration,
    last_accepted: Mutex<HashMap<DebounceKey, Instant>>,
    write_tx: mpsc::UnboundedSender<NewInteraction>,
}

/// Handle for gracefully shutting down the interaction writer
pub struct RecorderHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl RecorderHandle {
    /// Signals the writer task to flush pending rows and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Interaction writer shutdown signal sent");
    }
}

impl InteractionRecorder {
    /// Creates a recorder and spawns its background writer task
    pub fn new(store: Arc<dyn InteractionStore>, window: Duration) -> (Self, RecorderHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            writer_task(store, write_rx, shutdown_rx).await;
        });

        let recorder = Self {
            window,
            last_accepted: Mutex::new(HashMap::new()),
            write_tx,
        };

        (recorder, RecorderHandle { shutdown_tx })
    }

    /// Automatic tracking path (route middleware): suppresses duplicates of
    /// the same (user, post, kind) within the debounce window.
    pub fn record_tracked(
        &self,
        user_id: i64,
        post_id: i64,
        kind: InteractionKind,
        weight: Option<f64>,
    ) -> RecordOutcome {
        let weight = clamp_weight(weight.unwrap_or_else(|| kind.base_weight()));
        let key = (user_id, post_id, kind);
        let now = Instant::now();

        {
            let mut map = self
                .last_accepted
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(last) = map.get(&key) {
                if now.duration_since(*last) < self.window {
                    tracing::debug!(user_id, post_id, kind = %kind, "Interaction debounced");
                    return RecordOutcome {
                        accepted: false,
                        weight,
                    };
                }
            }

            // Stamp before persisting to keep the race window minimal
            map.insert(key, now);

            if map.len() > GC_THRESHOLD {
                let cutoff = self.window * 2;
                let before = map.len();
                map.retain(|_, accepted_at| now.duration_since(*accepted_at) <= cutoff);
                tracing::debug!(purged = before - map.len(), "Debounce map purged");
            }
        }

        self.enqueue(NewInteraction {
            user_id,
            post_id,
            kind,
            weight,
        });

        RecordOutcome {
            accepted: true,
            weight,
        }
    }

    /// Explicit tracking path (behavior API): always records, no debounce
    pub fn record_explicit(
        &self,
        user_id: i64,
        post_id: i64,
        kind: InteractionKind,
        weight: f64,
    ) -> RecordOutcome {
        let weight = clamp_weight(weight);

        self.enqueue(NewInteraction {
            user_id,
            post_id,
            kind,
            weight,
        });

        RecordOutcome {
            accepted: true,
            weight,
        }
    }

    fn enqueue(&self, row: NewInteraction) {
        if let Err(e) = self.write_tx.send(row) {
            tracing::error!(error = %e, "Failed to queue interaction for persistence");
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Background task persisting queued interactions.
///
/// Persistence failures are logged and swallowed; the request that triggered
/// the recording has already been answered.
async fn writer_task(
    store: Arc<dyn InteractionStore>,
    mut write_rx: mpsc::UnboundedReceiver<NewInteraction>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    tracing::info!("Interaction writer task started");

    loop {
        tokio::select! {
            maybe_row = write_rx.recv() => {
                match maybe_row {
                    Some(row) => {
                        if let Err(e) = store.create(row).await {
                            tracing::error!(error = %e, "Failed to persist interaction");
                        }
                    }
                    // Recorder dropped, nothing more will arrive
                    None => break,
                }
            }
            // A dropped handle closes the channel without signalling; only an
            // explicit send triggers the flush-and-stop path
            Some(_) = shutdown_rx.recv() => {
                tracing::info!("Interaction writer shutting down, flushing pending rows");

                while let Ok(row) = write_rx.try_recv() {
                    if let Err(e) = store.create(row).await {
                        tracing::error!(error = %e, "Failed to flush interaction during shutdown");
                    }
                }

                tracing::info!("Interaction writer task stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn recorder_with_window(
        store: Arc<MemoryStore>,
        window: Duration,
    ) -> (InteractionRecorder, RecorderHandle) {
        InteractionRecorder::new(store, window)
    }

    #[tokio::test]
    async fn test_rapid_duplicates_record_once() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _handle) = recorder_with_window(store.clone(), Duration::from_secs(30));

        let mut accepted = 0;
        for _ in 0..5 {
            if recorder
                .record_tracked(1, 10, InteractionKind::View, None)
                .accepted
            {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);

        // Give the writer task time to drain the queue
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.interaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_accepted_again_after_window_elapses() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _handle) = recorder_with_window(store.clone(), Duration::from_millis(40));

        assert!(
            recorder
                .record_tracked(1, 10, InteractionKind::View, None)
                .accepted
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(
            recorder
                .record_tracked(1, 10, InteractionKind::View, None)
                .accepted
        );
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_debounce_each_other() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _handle) = recorder_with_window(store.clone(), Duration::from_secs(30));

        assert!(
            recorder
                .record_tracked(1, 10, InteractionKind::View, None)
                .accepted
        );
        assert!(
            recorder
                .record_tracked(1, 10, InteractionKind::Like, None)
                .accepted
        );
        assert!(
            recorder
                .record_tracked(2, 10, InteractionKind::View, None)
                .accepted
        );
        assert!(
            recorder
                .record_tracked(1, 11, InteractionKind::View, None)
                .accepted
        );
    }

    #[tokio::test]
    async fn test_explicit_path_bypasses_debounce() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _handle) = recorder_with_window(store.clone(), Duration::from_secs(30));

        for _ in 0..3 {
            let outcome = recorder.record_explicit(1, 10, InteractionKind::Like, 2.5);
            assert!(outcome.accepted);
            assert_eq!(outcome.weight, 2.5);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.interaction_count().await, 3);
    }

    #[tokio::test]
    async fn test_default_and_override_weights() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _handle) = recorder_with_window(store.clone(), Duration::from_secs(30));

        let outcome = recorder.record_tracked(1, 10, InteractionKind::Comment, None);
        assert_eq!(outcome.weight, 3.0);

        let outcome = recorder.record_tracked(1, 11, InteractionKind::Comment, Some(4.5));
        assert_eq!(outcome.weight, 4.5);

        // Override beyond the invariant is clamped
        let outcome = recorder.record_tracked(1, 12, InteractionKind::Comment, Some(99.0));
        assert_eq!(outcome.weight, 10.0);
    }

    #[tokio::test]
    async fn test_stale_entries_purged_past_threshold() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _handle) = recorder_with_window(store.clone(), Duration::from_millis(50));

        for post_id in 0..1001 {
            recorder.record_tracked(1, post_id, InteractionKind::View, None);
        }
        assert!(recorder.tracked_keys() > GC_THRESHOLD);

        // All entries are now older than 2x the window, so the next accepted
        // event collapses the map
        tokio::time::sleep(Duration::from_millis(150)).await;
        recorder.record_tracked(2, 1, InteractionKind::View, None);
        assert!(recorder.tracked_keys() <= 2);
    }

    #[tokio::test]
    async fn test_persistence_failure_never_reaches_caller() {
        let mut store = crate::store::MockInteractionStore::new();
        store
            .expect_create()
            .returning(|_| Err(crate::error::AppError::Internal("store down".to_string())));

        let (recorder, _handle) =
            InteractionRecorder::new(Arc::new(store), Duration::from_secs(30));

        // The caller still sees an accepted event; the writer logs and
        // swallows the store failure
        let outcome = recorder.record_tracked(1, 10, InteractionKind::View, None);
        assert!(outcome.accepted);

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_rows() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, handle) = recorder_with_window(store.clone(), Duration::from_secs(30));

        for post_id in 0..10 {
            recorder.record_tracked(1, post_id, InteractionKind::View, None);
        }

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.interaction_count().await, 10);
    }
}
