use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::warn;

use harj_types::ConversationId;

/// Book-keeping for delayed reply tasks.
///
/// Each conversation gets a child token of the root, so a single conversation
/// can be cancelled (on delete) or everything at once (on shutdown).
pub(crate) struct ReplyScheduler {
    root: CancellationToken,
    tracker: TaskTracker,
    pending: Mutex<HashMap<ConversationId, Pending>>,
}

struct Pending {
    token: CancellationToken,
    count: usize,
}

impl ReplyScheduler {
    pub(crate) fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register one more pending reply and hand back the token it must watch.
    pub(crate) fn begin(&self, id: ConversationId) -> CancellationToken {
        let mut pending = match self.pending.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = pending.entry(id).or_insert_with(|| Pending {
            token: self.root.child_token(),
            count: 0,
        });
        entry.count += 1;
        entry.token.clone()
    }

    /// Mark one pending reply as landed. Returns `true` when none remain.
    pub(crate) fn finish(&self, id: ConversationId) -> bool {
        let mut pending = match self.pending.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(entry) = pending.get_mut(&id) else {
            return true;
        };
        entry.count = entry.count.saturating_sub(1);
        if entry.count == 0 {
            pending.remove(&id);
            true
        } else {
            false
        }
    }

    /// Cancel every pending reply of one conversation.
    pub(crate) fn cancel(&self, id: ConversationId) -> usize {
        let mut pending = match self.pending.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        match pending.remove(&id) {
            Some(entry) => {
                entry.token.cancel();
                entry.count
            }
            None => 0,
        }
    }

    pub(crate) fn pending(&self, id: ConversationId) -> usize {
        self.pending
            .lock()
            .map(|p| p.get(&id).map_or(0, |e| e.count))
            .unwrap_or(0)
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.root.is_cancelled() {
            warn!("reply scheduler is shut down, dropping task");
            return;
        }
        self.tracker.spawn(task);
    }

    /// Cancel everything and wait until in-flight tasks have returned.
    pub(crate) async fn shutdown(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
        self.root.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
