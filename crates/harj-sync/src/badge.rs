use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use harj_types::UserId;

use crate::backend::ChatBackend;
use crate::handle::SyncHandle;

/// Global unread counter shown outside the chat screen, refreshed on its
/// own slower schedule.
pub struct UnreadBadge {
    count: watch::Receiver<usize>,
    handle: SyncHandle,
}

impl UnreadBadge {
    pub fn spawn(backend: Arc<dyn ChatBackend>, user: UserId, every: Duration) -> Self {
        let (tx, count) = watch::channel(0);
        let token = CancellationToken::new();
        let stop = token.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let result = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    result = backend.unread_count(user) => result,
                };
                match result {
                    Ok(n) => {
                        tx.send_if_modified(|current| {
                            let changed = *current != n;
                            *current = n;
                            changed
                        });
                    }
                    Err(e) => warn!("unread badge poll failed for user {}: {}", user, e),
                }
            }
            debug!("unread badge for user {} stopped", user);
        });

        Self {
            count,
            handle: SyncHandle::new(token, task),
        }
    }

    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.clone()
    }

    pub async fn stop(self) {
        self.handle.stop().await;
    }
}
