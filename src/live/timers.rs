//! Per-session scheduled task handles.
//!
//! Each session has at most one pending timer (question deadline or
//! auto-advance). Scheduling a new one aborts the old handle; as a second
//! line of defense, a firing timer re-checks the session epoch before acting,
//! so an aborted-but-already-fired task still becomes a no-op.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Tracks the pending timer task per session.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    handles: Arc<DashMap<Uuid, JoinHandle<()>>>,
}

impl TimerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: Arc::new(DashMap::new()),
        }
    }

    /// Store a timer handle for a session, aborting any previous one.
    pub fn set(&self, session_id: Uuid, handle: JoinHandle<()>) {
        if let Some(previous) = self.handles.insert(session_id, handle) {
            previous.abort();
        }
    }

    /// Cancel and forget the pending timer for a session, if any.
    pub fn cancel(&self, session_id: Uuid) {
        if let Some((_, handle)) = self.handles.remove(&session_id) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn replaced_timer_is_aborted() {
        let timers = TimerRegistry::new();
        let session_id = Uuid::new_v4();
        let fired = Arc::new(AtomicBool::new(false));

        let fired_flag = Arc::clone(&fired);
        timers.set(
            session_id,
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                fired_flag.store(true, Ordering::SeqCst);
            }),
        );
        timers.set(session_id, tokio::spawn(async {}));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_aborts_the_pending_timer() {
        let timers = TimerRegistry::new();
        let session_id = Uuid::new_v4();
        let fired = Arc::new(AtomicBool::new(false));

        let fired_flag = Arc::clone(&fired);
        timers.set(
            session_id,
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                fired_flag.store(true, Ordering::SeqCst);
            }),
        );
        timers.cancel(session_id);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
