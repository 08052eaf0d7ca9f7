use std::sync::Arc;
use std::time::Duration;

use harj_chat::{ChatError, FixedResponder, MessagingService, SilentResponder};
use harj_db::SqliteStore;
use harj_gateway::Dispatcher;
use harj_store::{ConversationStore, MemoryDirectory, MemoryStore};
use harj_types::events::ChatEvent;
use harj_types::{UserId, UserProfile};

const SELLER: UserId = UserId(1);
const BUYER: UserId = UserId(2);
const STRANGER: UserId = UserId(3);

const REPLY_DELAY: Duration = Duration::from_millis(2500);

fn directory() -> MemoryDirectory {
    MemoryDirectory::with_users([
        UserProfile::new(SELLER, "Samir"),
        UserProfile::new(BUYER, "Lina"),
        UserProfile::new(STRANGER, "Omar"),
    ])
}

fn service_with(store: Arc<dyn ConversationStore>, responder: FixedResponder) -> MessagingService {
    MessagingService::new(store, Arc::new(directory()), Arc::new(responder), Dispatcher::new())
}

fn service() -> MessagingService {
    service_with(
        Arc::new(MemoryStore::new()),
        FixedResponder::new(REPLY_DELAY, "Okay, understood."),
    )
}

#[tokio::test(start_paused = true)]
async fn first_contact_gets_a_reply_and_a_read_receipt() {
    let service = service();

    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    assert!(conv.messages.is_empty());

    let sent = service.send_message(conv.id, SELLER, "hi").await.unwrap();
    assert_eq!(sent.sender_id, SELLER);
    assert!(!sent.is_read);

    let detail = service.get_conversation_by_id(conv.id, SELLER).await.unwrap().unwrap();
    assert_eq!(detail.conversation.typing_user, Some(BUYER));
    assert_eq!(detail.other_user.name, "Lina");
    assert_eq!(service.pending_replies(conv.id), 1);

    tokio::time::sleep(REPLY_DELAY + Duration::from_millis(100)).await;

    let detail = service.get_conversation_by_id(conv.id, SELLER).await.unwrap().unwrap();
    let messages = &detail.conversation.messages;
    assert_eq!(messages.len(), 2);
    assert!(messages[0].is_read);
    assert_eq!(messages[1].sender_id, BUYER);
    assert_eq!(messages[1].text, "Okay, understood.");
    assert!(!messages[1].is_read);
    assert_eq!(detail.conversation.typing_user, None);
    assert_eq!(service.pending_replies(conv.id), 0);
}

#[tokio::test(start_paused = true)]
async fn unread_counts_follow_the_reply_and_clear_on_open() {
    let service = service();
    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    service.send_message(conv.id, SELLER, "hi").await.unwrap();
    tokio::time::sleep(REPLY_DELAY * 2).await;

    assert_eq!(service.get_unread_count(BUYER).await.unwrap(), 0);
    assert_eq!(service.get_unread_count(SELLER).await.unwrap(), 1);

    service.mark_conversation_as_read(conv.id, SELLER).await.unwrap();
    assert_eq!(service.get_unread_count(SELLER).await.unwrap(), 0);

    // Stays at zero until the counterpart writes again.
    service.mark_conversation_as_read(conv.id, SELLER).await.unwrap();
    assert_eq!(service.get_unread_count(SELLER).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn restarting_returns_the_same_conversation() {
    let service = service();
    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    service.send_message(conv.id, SELLER, "hi").await.unwrap();
    tokio::time::sleep(REPLY_DELAY * 2).await;

    let again = service.start_conversation(BUYER, SELLER).await.unwrap();
    assert_eq!(again.id, conv.id);
    assert_eq!(again.messages.len(), 2);

    let list = service.get_conversations_for_user(SELLER).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].other_user.id, BUYER);
    assert_eq!(list[0].unread_count, 1);
}

#[tokio::test]
async fn outsiders_cannot_see_a_conversation() {
    let service = service();
    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    assert!(service.get_conversation_by_id(conv.id, STRANGER).await.unwrap().is_none());
    assert!(service.get_conversations_for_user(STRANGER).await.unwrap().is_empty());

    // A stranger marking it read changes nothing.
    service.send_message(conv.id, BUYER, "is it still available?").await.unwrap();
    assert!(service.mark_conversation_as_read(conv.id, STRANGER).await.unwrap().is_empty());
    assert_eq!(service.get_unread_count(SELLER).await.unwrap(), 1);
}

#[tokio::test]
async fn list_is_sorted_by_latest_activity() {
    let service = service_with(
        Arc::new(MemoryStore::new()),
        FixedResponder::new(REPLY_DELAY, "ok"),
    );
    let with_buyer = service.start_conversation(SELLER, BUYER).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let with_stranger = service.start_conversation(SELLER, STRANGER).await.unwrap();

    let list = service.get_conversations_for_user(SELLER).await.unwrap();
    let ids: Vec<_> = list.iter().map(|s| s.conversation.id).collect();
    assert_eq!(ids, [with_stranger.id, with_buyer.id]);

    tokio::time::sleep(Duration::from_millis(5)).await;
    service.send_message(with_buyer.id, BUYER, "still there?").await.unwrap();

    let list = service.get_conversations_for_user(SELLER).await.unwrap();
    let ids: Vec<_> = list.iter().map(|s| s.conversation.id).collect();
    assert_eq!(ids, [with_buyer.id, with_stranger.id]);
}

#[tokio::test(start_paused = true)]
async fn typing_stays_on_until_the_last_reply_lands() {
    let service = service();
    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();

    service.send_message(conv.id, SELLER, "one").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    service.send_message(conv.id, SELLER, "two").await.unwrap();
    assert_eq!(service.pending_replies(conv.id), 2);

    // First reply has landed, second is still pending.
    tokio::time::sleep(Duration::from_millis(2000)).await;
    let detail = service.get_conversation_by_id(conv.id, SELLER).await.unwrap().unwrap();
    assert_eq!(detail.conversation.messages.len(), 3);
    assert_eq!(detail.conversation.typing_user, Some(BUYER));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let detail = service.get_conversation_by_id(conv.id, SELLER).await.unwrap().unwrap();
    assert_eq!(detail.conversation.messages.len(), 4);
    assert_eq!(detail.conversation.typing_user, None);
    assert!(detail.conversation.messages.iter().filter(|m| m.sender_id == SELLER).all(|m| m.is_read));
}

#[tokio::test(start_paused = true)]
async fn deleting_cancels_pending_replies() {
    let service = service();
    let mut events = service.dispatcher().subscribe();
    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    service.send_message(conv.id, SELLER, "hi").await.unwrap();
    assert_eq!(service.pending_replies(conv.id), 1);

    service.delete_conversation(conv.id, BUYER).await.unwrap();
    assert_eq!(service.pending_replies(conv.id), 0);

    tokio::time::sleep(REPLY_DELAY * 2).await;
    assert!(service.get_conversation_by_id(conv.id, SELLER).await.unwrap().is_none());
    assert_eq!(service.get_unread_count(SELLER).await.unwrap(), 0);

    let mut saw_reply = false;
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::MessageCreated { message, .. } = event {
            saw_reply |= message.sender_id == BUYER;
        }
    }
    assert!(!saw_reply);

    // The pair can start over with a fresh conversation.
    let fresh = service.start_conversation(SELLER, BUYER).await.unwrap();
    assert_ne!(fresh.id, conv.id);
}

#[tokio::test(start_paused = true)]
async fn shutdown_drops_scheduled_replies() {
    let service = service();
    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    service.send_message(conv.id, SELLER, "hi").await.unwrap();

    service.shutdown().await;
    tokio::time::sleep(REPLY_DELAY * 2).await;

    let detail = service.get_conversation_by_id(conv.id, SELLER).await.unwrap().unwrap();
    assert_eq!(detail.conversation.messages.len(), 1);
    assert_eq!(detail.conversation.typing_user, None);

    // Sending still works; no new reply is scheduled.
    service.send_message(conv.id, SELLER, "anyone?").await.unwrap();
    assert_eq!(service.pending_replies(conv.id), 0);
}

#[tokio::test(start_paused = true)]
async fn reply_without_read_receipt_leaves_trigger_unread() {
    let mut responder = FixedResponder::new(REPLY_DELAY, "ok");
    responder.mark_trigger_read = false;
    let service = service_with(Arc::new(MemoryStore::new()), responder);

    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    service.send_message(conv.id, SELLER, "hi").await.unwrap();
    tokio::time::sleep(REPLY_DELAY * 2).await;

    assert_eq!(service.get_unread_count(BUYER).await.unwrap(), 1);
    assert_eq!(service.get_unread_count(SELLER).await.unwrap(), 1);
}

#[tokio::test]
async fn sqlite_backend_behaves_like_memory() {
    let store = SqliteStore::open_in_memory().unwrap();
    let service = service_with(
        Arc::new(store),
        FixedResponder::new(Duration::from_millis(50), "Sure, I'll look into it."),
    );

    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    assert_eq!(service.start_conversation(BUYER, SELLER).await.unwrap().id, conv.id);

    service.send_message(conv.id, SELLER, "hi").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let detail = service.get_conversation_by_id(conv.id, SELLER).await.unwrap().unwrap();
    let messages = &detail.conversation.messages;
    assert_eq!(messages.len(), 2);
    assert!(messages[0].is_read);
    assert!(messages[0].timestamp <= messages[1].timestamp);
    assert_eq!(service.get_unread_count(SELLER).await.unwrap(), 1);

    service.mark_conversation_as_read(conv.id, SELLER).await.unwrap();
    assert_eq!(service.get_unread_count(SELLER).await.unwrap(), 0);
}

#[tokio::test]
async fn silent_service_reports_not_found_for_unknown_ids() {
    let service = MessagingService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(directory()),
        Arc::new(SilentResponder),
        Dispatcher::new(),
    );
    let conv = service.start_conversation(SELLER, BUYER).await.unwrap();
    let missing = harj_types::ConversationId(conv.id.0 + 100);

    assert!(matches!(
        service.send_message(missing, SELLER, "hi").await,
        Err(ChatError::NotFound(_))
    ));
    assert!(service.mark_conversation_as_read(missing, SELLER).await.unwrap().is_empty());
    assert!(service.get_conversation_by_id(missing, SELLER).await.unwrap().is_none());
}
