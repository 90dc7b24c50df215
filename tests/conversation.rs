//! Conversation, membership and image flows driven against the in-memory
//! backend.

use std::sync::Arc;
use std::time::Duration;

use quickchat::client::backend::{Backend, MemoryBackend};
use quickchat::client::services::conversation::{self, Conversation};
use quickchat::client::services::groups::{self, DeleteConfirmation, GroupDirectory};
use quickchat::client::services::images::{self, ImageFile};
use quickchat::client::services::friends;
use quickchat::client::session::ChatSession;
use quickchat::common::error::ChatError;
use quickchat::common::models::*;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn session_for(mem: &MemoryBackend, name: &str) -> ChatSession {
    let user = mem.add_user(name);
    ChatSession::new(Arc::new(mem.clone()) as Arc<dyn Backend>, user)
}

async fn group_with(mem: &MemoryBackend, admin: &ChatSession, others: &[&ChatSession]) -> GroupWithRole {
    let group = groups::create_group(admin, "Weekend", "plans").await.unwrap();
    for s in others {
        mem.insert_member(group.id(), s.user_id(), Role::Member).await.unwrap();
    }
    group
}

#[tokio::test]
async fn duplicate_delivery_is_appended_once() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let group = group_with(&mem, &alice, &[&bob]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, group.id()).await.unwrap();

    let row = mem.deliver(&NewMessage::text(bob.user_id(), MessageTarget::Group(group.id()), "hi"));
    mem.push_event(row.clone());
    assert_eq!(conversation::poll(&conv, &alice).await.unwrap(), 1);

    let guard = conv.lock().await;
    assert_eq!(guard.messages().len(), 1);
    assert_eq!(guard.messages()[0].sender.display_name, "Bob");
}

#[tokio::test]
async fn own_message_echo_is_absorbed() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let group = group_with(&mem, &alice, &[]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, group.id()).await.unwrap();
    let sent = conversation::send_text(&conv, &alice, "  hello  ").await.unwrap();
    assert_eq!(sent.row.text(), "hello");

    // the insert is echoed back on the subscription
    assert_eq!(conversation::poll(&conv, &alice).await.unwrap(), 0);
    assert_eq!(conv.lock().await.messages().len(), 1);
}

#[tokio::test]
async fn switching_groups_stops_old_deliveries() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let first = group_with(&mem, &alice, &[&bob]).await;
    let second = group_with(&mem, &alice, &[&bob]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, first.id()).await.unwrap();
    conversation::open_group(&conv, &alice, second.id()).await.unwrap();
    assert_eq!(mem.active_subscriptions(), 1);

    let stale = mem.deliver(&NewMessage::text(bob.user_id(), MessageTarget::Group(first.id()), "old"));
    assert!(!conversation::ingest(&conv, &alice, stale).await.unwrap());
    assert_eq!(conversation::poll(&conv, &alice).await.unwrap(), 0);

    mem.deliver(&NewMessage::text(bob.user_id(), MessageTarget::Group(second.id()), "new"));
    assert_eq!(conversation::poll(&conv, &alice).await.unwrap(), 1);
    let guard = conv.lock().await;
    assert_eq!(guard.messages().len(), 1);
    assert_eq!(guard.messages()[0].row.text(), "new");
}

#[tokio::test]
async fn navigation_during_sender_lookup_drops_the_row() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let first = group_with(&mem, &alice, &[&bob]).await;
    let second = group_with(&mem, &alice, &[&bob]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, first.id()).await.unwrap();
    let row = mem.deliver(&NewMessage::text(bob.user_id(), MessageTarget::Group(first.id()), "late"));

    mem.set_sender_delay(Some(Duration::from_millis(100)));
    let pending = {
        let conv = conv.clone();
        let alice = alice.clone();
        tokio::spawn(async move { conversation::ingest(&conv, &alice, row).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    mem.set_sender_delay(None);
    conversation::open_group(&conv, &alice, second.id()).await.unwrap();

    assert!(!pending.await.unwrap().unwrap());
    let guard = conv.lock().await;
    assert_eq!(guard.target(), Some(MessageTarget::Group(second.id())));
    assert!(guard.messages().is_empty());
}

#[tokio::test]
async fn overlapping_polls_keep_arrival_order() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let group = group_with(&mem, &alice, &[&bob]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, group.id()).await.unwrap();
    mem.deliver(&NewMessage::text(bob.user_id(), MessageTarget::Group(group.id()), "first"));

    mem.set_sender_delay(Some(Duration::from_millis(100)));
    let slow = {
        let conv = conv.clone();
        let alice = alice.clone();
        tokio::spawn(async move { conversation::poll(&conv, &alice).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    mem.set_sender_delay(None);
    mem.deliver(&NewMessage::text(bob.user_id(), MessageTarget::Group(group.id()), "second"));

    assert_eq!(conversation::poll(&conv, &alice).await.unwrap(), 1);
    assert_eq!(slow.await.unwrap().unwrap(), 1);
    let guard = conv.lock().await;
    let texts: Vec<&str> = guard.messages().iter().map(|m| m.row.text()).collect();
    assert_eq!(texts, ["first", "second"]);
}

#[tokio::test]
async fn missing_sender_profile_does_not_drop_the_batch() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let group = group_with(&mem, &alice, &[&bob]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, group.id()).await.unwrap();
    let ghost = uuid::Uuid::new_v4();
    mem.deliver(&NewMessage::text(ghost, MessageTarget::Group(group.id()), "who am i"));
    mem.deliver(&NewMessage::text(bob.user_id(), MessageTarget::Group(group.id()), "hello"));

    assert_eq!(conversation::poll(&conv, &alice).await.unwrap(), 2);
    let guard = conv.lock().await;
    let senders: Vec<&str> = guard.messages().iter().map(|m| m.sender.display_name.as_str()).collect();
    assert_eq!(senders, ["Unknown", "Bob"]);
    assert_eq!(guard.messages()[0].sender.id, ghost);
}

#[tokio::test]
async fn leaving_the_open_group_clears_the_view() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let group = group_with(&mem, &alice, &[&bob]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &bob, group.id()).await.unwrap();
    let mut dir = GroupDirectory::new(groups::load_groups(&bob).await.unwrap());

    groups::leave_group(&conv, &bob, &mut dir, group.id()).await.unwrap();
    let guard = conv.lock().await;
    assert_eq!(guard.target(), None);
    assert!(!guard.is_subscribed());
    assert!(dir.get(group.id()).is_none());
    assert_eq!(mem.members_of(group.id()).len(), 1);
}

#[tokio::test]
async fn admin_removes_member_and_keeps_view() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let group = group_with(&mem, &alice, &[&bob]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, group.id()).await.unwrap();
    let mut dir = GroupDirectory::new(groups::load_groups(&alice).await.unwrap());

    groups::remove_member(&conv, &alice, &mut dir, group.id(), bob.user_id()).await.unwrap();
    assert_eq!(conv.lock().await.target(), Some(MessageTarget::Group(group.id())));
    let members = mem.members_of(group.id());
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, alice.user_id());
}

#[tokio::test]
async fn member_cannot_remove_or_delete() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let group = group_with(&mem, &alice, &[&bob]).await;

    let conv = Conversation::shared();
    let mut dir = GroupDirectory::new(groups::load_groups(&bob).await.unwrap());
    let before = mem.call_count();

    let err = groups::remove_member(&conv, &bob, &mut dir, group.id(), alice.user_id()).await.unwrap_err();
    assert!(matches!(err, ChatError::PermissionDenied(_)));

    let mut confirmation = DeleteConfirmation::new(group.id());
    confirmation.confirm();
    confirmation.confirm();
    let err = groups::delete_group(&conv, &bob, &mut dir, &confirmation).await.unwrap_err();
    assert!(matches!(err, ChatError::PermissionDenied(_)));

    assert_eq!(mem.call_count(), before);
    assert_eq!(mem.members_of(group.id()).len(), 2);
}

#[tokio::test]
async fn delete_needs_both_confirmations() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let group = group_with(&mem, &alice, &[]).await;

    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, group.id()).await.unwrap();
    let mut dir = GroupDirectory::new(groups::load_groups(&alice).await.unwrap());

    let mut confirmation = DeleteConfirmation::new(group.id());
    assert!(!confirmation.confirm());
    let before = mem.call_count();
    let err = groups::delete_group(&conv, &alice, &mut dir, &confirmation).await.unwrap_err();
    assert!(matches!(err, ChatError::ConfirmationRequired));
    assert_eq!(mem.call_count(), before);

    assert!(confirmation.confirm());
    groups::delete_group(&conv, &alice, &mut dir, &confirmation).await.unwrap();
    assert!(mem.groups().is_empty());
    assert_eq!(conv.lock().await.target(), None);
}

#[tokio::test]
async fn creator_added_by_trigger_is_not_an_error() {
    let mem = MemoryBackend::new();
    mem.set_creator_trigger(true);
    let alice = session_for(&mem, "Alice");

    let group = groups::create_group(&alice, "  Book club ", "").await.unwrap();
    assert_eq!(group.group.name, "Book club");
    assert_eq!(group.user_role, Role::Admin);
    let members = mem.members_of(group.id());
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, Role::Admin);
}

#[tokio::test]
async fn blank_group_name_makes_no_call() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let err = groups::create_group(&alice, "   ", "x").await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
    assert_eq!(mem.call_count(), 0);
}

#[tokio::test]
async fn adding_members_by_code() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");
    let group = group_with(&mem, &alice, &[]).await;

    let code = bob.user().friend_code.to_lowercase();
    let added = groups::add_member_by_code(&alice, group.id(), &code).await.unwrap();
    assert_eq!(added.id, bob.user_id());

    let err = groups::add_member_by_code(&alice, group.id(), &code).await.unwrap_err();
    assert!(matches!(err, ChatError::AlreadyMember));
    let err = groups::add_member_by_code(&alice, group.id(), "ZZZZZZ").await.unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
}

#[tokio::test]
async fn rejected_images_never_upload() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");

    assert!(images::upload_image(&alice, None).await.is_err());
    let text = ImageFile::new("notes.png", b"just some text".to_vec());
    assert!(images::upload_image(&alice, Some(text)).await.is_err());
    let mut big = PNG.to_vec();
    big.resize(images::MAX_IMAGE_BYTES + 1, 0);
    let err = images::upload_image(&alice, Some(ImageFile::new("big.png", big))).await.unwrap_err();
    assert_eq!(err.to_string(), "File too large (max 5MB)");

    assert_eq!(mem.upload_count(), 0);
}

#[tokio::test]
async fn image_message_reaches_the_group() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let group = group_with(&mem, &alice, &[]).await;
    let conv = Conversation::shared();
    conversation::open_group(&conv, &alice, group.id()).await.unwrap();

    let uploaded = images::upload_image(&alice, Some(ImageFile::new("cat.png", PNG.to_vec()))).await.unwrap();
    assert!(uploaded.path.starts_with(&alice.user_id().to_string()));
    assert_eq!(mem.object(&uploaded.path).map(|(_, mime)| mime), Some("image/png".to_string()));

    let sent = images::send_image_message(&conv, &alice, &uploaded, " look ").await.unwrap();
    assert_eq!(sent.row.message_type, MessageType::Image);
    assert_eq!(sent.row.image_url.as_deref(), Some(uploaded.public_url.as_str()));
    assert_eq!(sent.row.text(), "look");
    assert_eq!(mem.messages().len(), 1);
}

#[tokio::test]
async fn direct_messages_show_up_for_both_sides() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let bob = session_for(&mem, "Bob");

    let alice_conv = Conversation::shared();
    let bob_conv = Conversation::shared();
    let friend = friends::start_chat(&alice_conv, &alice, &bob.user().friend_code).await.unwrap();
    assert_eq!(friend.id, bob.user_id());
    conversation::open_direct(&bob_conv, &bob, alice.user_id()).await.unwrap();

    friends::send_direct_message(&alice_conv, &alice, bob.user_id(), "hey bob").await.unwrap();
    assert_eq!(conversation::poll(&bob_conv, &bob).await.unwrap(), 1);
    assert_eq!(bob_conv.lock().await.messages()[0].row.text(), "hey bob");

    let contacts = friends::recent_contacts(&bob).await.unwrap();
    assert_eq!(contacts.iter().map(|c| c.id).collect::<Vec<_>>(), vec![alice.user_id()]);

    let err = friends::find_by_friend_code(&alice, &alice.user().friend_code).await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
}

#[tokio::test]
async fn sending_without_a_conversation_fails_locally() {
    let mem = MemoryBackend::new();
    let alice = session_for(&mem, "Alice");
    let conv = Conversation::shared();
    let err = conversation::send_text(&conv, &alice, "hello").await.unwrap_err();
    assert!(matches!(err, ChatError::NoActiveConversation));
    assert_eq!(mem.call_count(), 0);
}
