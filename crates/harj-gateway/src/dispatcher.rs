use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

use harj_types::UserId;
use harj_types::events::ChatEvent;

const EVENT_BUFFER: usize = 1024;

/// Fans chat events out to every subscriber. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every subscriber sees every event and filters by participant
    broadcast_tx: broadcast::Sender<ChatEvent>,

    /// Live gateway connections per user
    online_users: RwLock<HashMap<UserId, usize>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                online_users: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChatEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }

    pub async fn user_online(&self, user_id: UserId) {
        *self.inner.online_users.write().await.entry(user_id).or_insert(0) += 1;
    }

    pub async fn user_offline(&self, user_id: UserId) {
        let mut users = self.inner.online_users.write().await;
        if let Some(count) = users.get_mut(&user_id) {
            *count -= 1;
            if *count == 0 {
                users.remove(&user_id);
            }
        }
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.inner.online_users.read().await.contains_key(&user_id)
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.inner.online_users.read().await.keys().copied().collect();
        users.sort();
        users
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
