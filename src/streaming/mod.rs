//! Debounced delivery of streaming partial content.
//!
//! Backends may emit partials far faster than a UI wants to repaint. The
//! coordinator keeps only the latest partial and applies it on a fixed
//! cadence: an apply timer starts when a partial arrives while idle, and
//! later partials merely overwrite the pending slot. Applies therefore
//! happen at most once per debounce interval, always with the newest
//! content, and completion flushes synchronously so nothing is lost.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::types::{MessageId, SessionId};

/// Interval between partial-content applies.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Callback that pushes one partial into the owning log or UI.
pub type UpdateSink = Arc<dyn Fn(SessionId, MessageId, String) + Send + Sync>;

/// Slot state guarded by one lock, so arming decisions and slot contents
/// can never be observed out of step with each other.
#[derive(Default)]
struct Slot {
    content: Option<String>,
    timer_armed: bool,
}

struct Inner {
    session: SessionId,
    target: MessageId,
    debounce: Duration,
    sink: UpdateSink,
    slot: Mutex<Slot>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Debounces partial updates for one in-flight response message.
#[derive(Clone)]
pub struct StreamingCoordinator {
    inner: Arc<Inner>,
}

impl StreamingCoordinator {
    pub fn new(
        session: SessionId,
        target: MessageId,
        debounce: Duration,
        sink: UpdateSink,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                target,
                debounce,
                sink,
                slot: Mutex::new(Slot::default()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Record the latest partial. Arms the apply timer only if none is
    /// running; an already-armed timer keeps its original deadline. The
    /// timer keeps firing every interval while partials keep arriving and
    /// disarms itself, under the slot lock, once it finds the slot empty.
    pub fn queue_update(&self, content: String) {
        let arm = {
            let mut slot = match self.inner.slot.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            slot.content = Some(content);
            !std::mem::replace(&mut slot.timer_armed, true)
        };
        if !arm {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.debounce).await;
                let next = {
                    let mut slot = match inner.slot.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    let taken = slot.content.take();
                    if taken.is_none() {
                        slot.timer_armed = false;
                    }
                    taken
                };
                match next {
                    Some(content) => (inner.sink)(inner.session, inner.target, content),
                    None => return,
                }
            }
        });
        if let Ok(mut timer) = self.inner.timer.lock() {
            *timer = Some(handle);
        }
    }

    /// Stop debouncing and flush any pending partial synchronously. Called
    /// once when the response completes (or fails); the final content
    /// itself is applied by the caller.
    pub fn finish(&self) {
        if let Ok(mut timer) = self.inner.timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
        let pending = match self.inner.slot.lock() {
            Ok(mut slot) => {
                slot.timer_armed = false;
                slot.content.take()
            }
            Err(_) => None,
        };
        if let Some(content) = pending {
            (self.inner.sink)(self.inner.session, self.inner.target, content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recording_sink() -> (UpdateSink, Arc<Mutex<Vec<String>>>) {
        let applied: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&applied);
        let sink: UpdateSink = Arc::new(move |_, _, content| {
            log.lock().unwrap().push(content);
        });
        (sink, applied)
    }

    fn coordinator(sink: UpdateSink) -> StreamingCoordinator {
        StreamingCoordinator::new(SessionId::new(), MessageId::new(), DEFAULT_DEBOUNCE, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_updates_applies_newest_once() {
        let (sink, applied) = recording_sink();
        let coord = coordinator(sink);
        for i in 0..10 {
            coord.queue_update(format!("partial {i}"));
        }
        tokio::time::sleep(DEFAULT_DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(applied.lock().unwrap().as_slice(), ["partial 9"]);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_stream_applies_once_per_interval() {
        let (sink, applied) = recording_sink();
        let coord = coordinator(sink);
        // 20 updates over 300 ms: one apply at 150 ms, one at 300 ms.
        for i in 0..20 {
            coord.queue_update(format!("p{i}"));
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        // Let the second interval's timer fire.
        tokio::time::sleep(DEFAULT_DEBOUNCE + Duration::from_millis(50)).await;
        assert_eq!(applied.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn update_after_a_timed_apply_lands_within_one_interval() {
        let (sink, applied) = recording_sink();
        let coord = coordinator(sink);
        coord.queue_update("p1".to_string());
        tokio::time::sleep(DEFAULT_DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(applied.lock().unwrap().as_slice(), ["p1"]);

        // The timer has already fired once; a fresh partial must still be
        // applied on the next interval, not sit until completion.
        coord.queue_update("p2".to_string());
        tokio::time::sleep(DEFAULT_DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(applied.lock().unwrap().as_slice(), ["p1", "p2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_disarms_and_rearms_cleanly() {
        let (sink, applied) = recording_sink();
        let coord = coordinator(sink);
        coord.queue_update("p1".to_string());
        // Two idle intervals: apply, then disarm on the empty check.
        tokio::time::sleep(DEFAULT_DEBOUNCE * 3).await;
        assert_eq!(applied.lock().unwrap().as_slice(), ["p1"]);

        coord.queue_update("p2".to_string());
        tokio::time::sleep(DEFAULT_DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(applied.lock().unwrap().as_slice(), ["p1", "p2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn finish_flushes_pending_without_waiting() {
        let (sink, applied) = recording_sink();
        let coord = coordinator(sink);
        coord.queue_update("almost done".to_string());
        coord.finish();
        assert_eq!(applied.lock().unwrap().as_slice(), ["almost done"]);
    }

    #[tokio::test(start_paused = true)]
    async fn finish_with_nothing_pending_applies_nothing() {
        let (sink, applied) = recording_sink();
        let coord = coordinator(sink);
        coord.finish();
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_duplicate_apply_after_finish() {
        let (sink, applied) = recording_sink();
        let coord = coordinator(sink);
        coord.queue_update("p1".to_string());
        coord.finish();
        tokio::time::sleep(DEFAULT_DEBOUNCE * 2).await;
        assert_eq!(applied.lock().unwrap().len(), 1);
    }
}
