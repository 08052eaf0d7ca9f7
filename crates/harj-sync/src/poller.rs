use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use harj_chat::{ChatError, ChatResult};
use harj_types::events::ChatEvent;
use harj_types::{ConversationDetail, ConversationId, MessageId, UserId};

use crate::backend::ChatBackend;
use crate::config::SyncConfig;
use crate::handle::SyncHandle;
use crate::optimistic::{PendingSend, PendingSends};
use crate::view::{ChatView, Notice};

/// What wakes the background loop.
pub enum SyncTrigger {
    /// Re-fetch every `poll_interval`
    Interval,
    /// Re-fetch whenever an event for this user arrives, with the interval
    /// kept as a fallback. If the channel closes the loop keeps polling.
    Push(broadcast::Receiver<ChatEvent>),
}

/// Keeps one user's [`ChatView`] consistent with the service. Cheap to clone.
#[derive(Clone)]
pub struct ChatSync {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    backend: Arc<dyn ChatBackend>,
    user: UserId,
    config: SyncConfig,
    state: Mutex<SyncState>,
    updates: watch::Sender<ChatView>,
}

struct SyncState {
    view: ChatView,
    pending: PendingSends,
    /// Set once a conversation has been selected, by the user or automatically
    has_selected: bool,
}

/// A freshly fetched conversation. A failed read receipt does not hide a
/// successful fetch.
struct Loaded {
    detail: ConversationDetail,
    read_error: Option<ChatError>,
}

impl SyncState {
    fn refresh_messages(&mut self) {
        match &self.view.active {
            Some(active) => self.view.messages = self.pending.reconcile(&active.conversation),
            None => self.view.messages.clear(),
        }
    }

    /// Install `loaded` as the active conversation unless the user has moved
    /// on while it was in flight.
    fn apply_loaded(&mut self, id: ConversationId, mut loaded: Loaded) {
        if self.view.selected != Some(id) {
            debug!("discarding stale fetch of conversation {}", id);
            return;
        }
        if loaded.read_error.is_none() {
            let user = self.view.user;
            for message in &mut loaded.detail.conversation.messages {
                if message.sender_id != user {
                    message.is_read = true;
                }
            }
            if let Some(summary) = self.view.conversations.iter_mut().find(|s| s.conversation.id == id) {
                summary.unread_count = 0;
            }
        }
        self.view.active = Some(loaded.detail);
        self.refresh_messages();
    }
}

impl ChatSync {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        user: UserId,
        config: SyncConfig,
        viewport_width: u32,
    ) -> Self {
        let view = ChatView::new(user, viewport_width, config.wide_layout_min_width);
        let (updates, _) = watch::channel(view.clone());
        Self {
            inner: Arc::new(SyncInner {
                backend,
                user,
                config,
                state: Mutex::new(SyncState {
                    view,
                    pending: PendingSends::new(),
                    has_selected: false,
                }),
                updates,
            }),
        }
    }

    pub fn user(&self) -> UserId {
        self.inner.user
    }

    pub fn view(&self) -> ChatView {
        self.lock().view.clone()
    }

    /// Receives a fresh snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.inner.updates.subscribe()
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        self.update(|s| std::mem::take(&mut s.view.notices))
    }

    /// One poll: re-fetch the list and, if one is selected, the active
    /// conversation, marking it read. Failures are logged and retried on the
    /// next tick.
    pub async fn tick(&self) {
        let user = self.inner.user;

        match self.inner.backend.conversations_for_user(user).await {
            Ok(list) => self.update(|s| {
                s.view.conversations = list;
                if s.view.selected.is_none() && !s.has_selected && s.view.is_wide() {
                    if let Some(first) = s.view.conversations.first() {
                        debug!("auto-selecting conversation {}", first.conversation.id);
                        s.view.selected = Some(first.conversation.id);
                        s.has_selected = true;
                    }
                }
            }),
            Err(e) => warn!("conversation list poll failed for user {}: {}", user, e),
        }

        let selected = self.lock().view.selected;
        if let Some(id) = selected {
            match self.load(id).await {
                Ok(Some(loaded)) => {
                    if let Some(e) = &loaded.read_error {
                        warn!("mark-read of conversation {} failed: {}", id, e);
                    }
                    self.update(|s| s.apply_loaded(id, loaded));
                }
                Ok(None) => {
                    debug!("conversation {} disappeared, back to list", id);
                    self.update(|s| {
                        if s.view.selected == Some(id) {
                            s.view.clear_selection();
                        }
                    });
                }
                Err(e) => warn!("poll of conversation {} failed: {}", id, e),
            }
        }

        self.update(|s| s.view.loading = false);
    }

    /// Open a conversation. Returns `false` and leaves the previous
    /// selection intact if it could not be loaded.
    pub async fn select(&self, id: ConversationId) -> bool {
        self.update(|s| s.view.loading = true);

        match self.load(id).await {
            Ok(Some(loaded)) => {
                self.update(|s| {
                    if let Some(e) = &loaded.read_error {
                        s.view.notices.push(Notice::MarkReadFailed {
                            conversation_id: id,
                            reason: e.to_string(),
                        });
                    }
                    s.view.selected = Some(id);
                    s.has_selected = true;
                    s.view.loading = false;
                    s.apply_loaded(id, loaded);
                });
                true
            }
            Ok(None) => {
                self.update(|s| {
                    s.view.notices.push(Notice::ConversationGone { conversation_id: id });
                    s.view.loading = false;
                });
                false
            }
            Err(e) => {
                self.update(|s| {
                    s.view.notices.push(Notice::OpenFailed {
                        conversation_id: id,
                        reason: e.to_string(),
                    });
                    s.view.loading = false;
                });
                false
            }
        }
    }

    /// Start (or resume) a conversation with `other` and open it.
    pub async fn contact(&self, other: UserId) -> Option<ConversationId> {
        match self.inner.backend.start_conversation(self.inner.user, other).await {
            Ok(conversation) => self.select(conversation.id).await.then_some(conversation.id),
            Err(e) => {
                self.update(|s| {
                    s.view.notices.push(Notice::ContactFailed {
                        user_id: other,
                        reason: e.to_string(),
                    })
                });
                None
            }
        }
    }

    /// Send to the selected conversation. The message shows up immediately
    /// under a temporary id; a failure marks it failed and raises a notice.
    pub async fn send(&self, text: &str) -> ChatResult<MessageId> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidArgument("message text is empty".into()));
        }

        let user = self.inner.user;
        let (conversation_id, temp_id) = self
            .update(|s| {
                let id = s.view.selected?;
                let send = PendingSend::new(id, user, text);
                let temp_id = send.temp_id.clone();
                s.pending.push(send);
                s.refresh_messages();
                Some((id, temp_id))
            })
            .ok_or_else(|| ChatError::InvalidArgument("no conversation selected".into()))?;

        self.deliver(conversation_id, temp_id.clone(), text).await;
        Ok(temp_id)
    }

    /// Resend a failed message.
    pub async fn retry(&self, temp_id: &MessageId) -> ChatResult<()> {
        let send = self
            .update(|s| {
                let send = s.pending.begin_retry(temp_id);
                s.refresh_messages();
                send
            })
            .ok_or_else(|| ChatError::NotFound(format!("no failed send {}", temp_id)))?;

        self.deliver(send.conversation_id, send.temp_id, &send.text).await;
        Ok(())
    }

    /// Drop a local message that will not be sent.
    pub fn discard(&self, temp_id: &MessageId) -> bool {
        self.update(|s| {
            let removed = s.pending.discard(temp_id);
            s.refresh_messages();
            removed
        })
    }

    pub fn back_to_list(&self) {
        self.update(|s| s.view.clear_selection());
    }

    pub fn set_viewport_width(&self, width: u32) {
        self.update(|s| s.view.viewport_width = width);
    }

    /// Run [`tick`](Self::tick) in the background until the handle is
    /// stopped or dropped.
    pub fn spawn(&self, trigger: SyncTrigger) -> SyncHandle {
        let token = CancellationToken::new();
        let stop = token.clone();
        let sync = self.clone();
        let task = tokio::spawn(async move { sync.run(trigger, stop).await });
        SyncHandle::new(token, task)
    }

    async fn run(&self, trigger: SyncTrigger, stop: CancellationToken) {
        let user = self.inner.user;
        let mut push = match trigger {
            SyncTrigger::Interval => None,
            SyncTrigger::Push(rx) => Some(rx),
        };
        let mut interval = tokio::time::interval(self.inner.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("chat sync started for user {}", user);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = interval.tick() => {}
                relevant = next_push(&mut push, user) => {
                    if !relevant {
                        continue;
                    }
                    interval.reset();
                }
            }

            // A tick abandoned mid-flight writes nothing.
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = self.tick() => {}
            }
        }
        info!("chat sync stopped for user {}", user);
    }

    async fn load(&self, id: ConversationId) -> ChatResult<Option<Loaded>> {
        let user = self.inner.user;
        let Some(detail) = self.inner.backend.conversation_by_id(id, user).await? else {
            return Ok(None);
        };
        let read_error = self.inner.backend.mark_read(id, user).await.err();
        Ok(Some(Loaded { detail, read_error }))
    }

    async fn deliver(&self, conversation_id: ConversationId, temp_id: MessageId, text: &str) {
        match self
            .inner
            .backend
            .send_message(conversation_id, self.inner.user, text)
            .await
        {
            Ok(message) => self.update(|s| {
                s.pending.confirm(&temp_id, message.id.clone());
                if let Some(active) = s.view.active.as_mut() {
                    let conversation = &mut active.conversation;
                    if conversation.id == conversation_id
                        && !conversation.messages.iter().any(|m| m.id == message.id)
                    {
                        conversation.last_message_timestamp = message.timestamp;
                        conversation.messages.push(message);
                    }
                }
                s.refresh_messages();
            }),
            Err(e) => {
                warn!("send to conversation {} failed: {}", conversation_id, e);
                self.update(|s| {
                    s.pending.fail(&temp_id, e.message());
                    s.view.notices.push(Notice::SendFailed {
                        temp_id: temp_id.clone(),
                        reason: e.to_string(),
                    });
                    s.refresh_messages();
                });
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        match self.inner.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mutate the state and publish the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut SyncState) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut state);
        self.inner.updates.send_replace(state.view.clone());
        out
    }
}

/// Wait for the next pushed event. Resolves to `true` when it warrants a
/// re-fetch; never resolves when there is no push channel.
async fn next_push(push: &mut Option<broadcast::Receiver<ChatEvent>>, user: UserId) -> bool {
    let Some(rx) = push.as_mut() else {
        return std::future::pending::<bool>().await;
    };
    match rx.recv().await {
        Ok(event) => event.concerns(user),
        Err(RecvError::Lagged(n)) => {
            debug!("push receiver for user {} lagged by {} events", user, n);
            true
        }
        Err(RecvError::Closed) => {
            warn!("push channel closed for user {}, polling only", user);
            *push = None;
            false
        }
    }
}
