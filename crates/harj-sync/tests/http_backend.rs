use std::sync::Arc;

use harj_api::{AppStateInner, router};
use harj_chat::{ChatError, MessagingService, SilentResponder};
use harj_gateway::Dispatcher;
use harj_store::{MemoryDirectory, MemoryStore};
use harj_sync::{ChatBackend, ChatSync, HttpBackend, SyncConfig};
use harj_types::{ConversationId, UserId, UserProfile};

async fn serve() -> (HttpBackend, MessagingService) {
    let directory = MemoryDirectory::with_users([
        UserProfile::new(UserId(1), "Samir"),
        UserProfile::new(UserId(2), "Lina"),
        UserProfile::new(UserId(3), "Omar"),
    ]);
    let service = MessagingService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(directory),
        Arc::new(SilentResponder),
        Dispatcher::new(),
    );
    let app = router(AppStateInner::new(service.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (HttpBackend::new(format!("http://{}", addr)), service)
}

#[tokio::test]
async fn http_backend_speaks_the_api() {
    let (backend, _service) = serve().await;

    let conv = backend.start_conversation(UserId(1), UserId(2)).await.unwrap();
    assert_eq!(backend.start_conversation(UserId(2), UserId(1)).await.unwrap().id, conv.id);

    let message = backend.send_message(conv.id, UserId(2), "hello").await.unwrap();
    assert_eq!(message.sender_id, UserId(2));
    assert_eq!(backend.unread_count(UserId(1)).await.unwrap(), 1);

    let list = backend.conversations_for_user(UserId(1)).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].other_user.name, "Lina");

    backend.mark_read(conv.id, UserId(1)).await.unwrap();
    assert_eq!(backend.unread_count(UserId(1)).await.unwrap(), 0);

    let detail = backend.conversation_by_id(conv.id, UserId(1)).await.unwrap().unwrap();
    assert!(detail.conversation.messages[0].is_read);
    assert!(backend.conversation_by_id(conv.id, UserId(3)).await.unwrap().is_none());
}

#[tokio::test]
async fn http_errors_come_back_typed() {
    let (backend, _service) = serve().await;
    let conv = backend.start_conversation(UserId(1), UserId(2)).await.unwrap();

    assert!(matches!(
        backend.start_conversation(UserId(1), UserId(1)).await,
        Err(ChatError::InvalidArgument(_))
    ));
    assert!(matches!(
        backend.send_message(conv.id, UserId(3), "hi").await,
        Err(ChatError::Unauthorized(_))
    ));
    assert!(matches!(
        backend.send_message(ConversationId(404), UserId(1), "hi").await,
        Err(ChatError::NotFound(_))
    ));

    let offline = HttpBackend::new("http://127.0.0.1:9");
    assert!(matches!(offline.unread_count(UserId(1)).await, Err(ChatError::Unavailable(_))));
}

#[tokio::test]
async fn sync_loop_runs_over_http() {
    let (backend, service) = serve().await;
    let conv = service.start_conversation(UserId(1), UserId(2)).await.unwrap();
    service.send_message(conv.id, UserId(2), "hi from Lina").await.unwrap();

    let sync = ChatSync::new(Arc::new(backend), UserId(1), SyncConfig::default(), 1024);
    sync.tick().await;
    let view = sync.view();
    assert_eq!(view.selected, Some(conv.id));
    assert_eq!(view.messages.len(), 1);

    sync.send("hi Lina").await.unwrap();
    sync.tick().await;
    let view = sync.view();
    assert_eq!(view.messages.len(), 2);
    assert!(view.messages.iter().all(|m| !m.is_local()));
    assert_eq!(service.get_unread_count(UserId(1)).await.unwrap(), 0);
}
