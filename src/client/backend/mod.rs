//! Seam between the chat services and the hosted backend.
//!
//! [`RestBackend`] talks to the real service (PostgREST tables, GoTrue auth,
//! object storage, realtime WebSocket). [`MemoryBackend`] keeps everything in
//! process and is what the tests drive.

pub mod memory;
pub mod realtime;
pub mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::common::error::ChatResult;
use crate::common::models::*;

/// Which inserts on the `messages` table a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelFilter {
    /// Inserts with `group_id = <id>`.
    GroupInserts(GroupId),
    /// Inserts with `receiver_id = <id>`, i.e. direct messages to that user.
    DirectInserts(UserId),
}

impl ChannelFilter {
    pub fn matches(&self, row: &MessageRow) -> bool {
        match self {
            ChannelFilter::GroupInserts(group) => row.group_id == Some(*group),
            ChannelFilter::DirectInserts(user) => row.group_id.is_none() && row.receiver_id == Some(*user),
        }
    }

    /// Channel topic name used on the realtime socket.
    pub fn topic(&self) -> String {
        match self {
            ChannelFilter::GroupInserts(group) => format!("realtime:group-{}", group),
            ChannelFilter::DirectInserts(user) => format!("realtime:direct-{}", user),
        }
    }

    /// PostgREST-style row filter sent with the join request.
    pub fn row_filter(&self) -> String {
        match self {
            ChannelFilter::GroupInserts(group) => format!("group_id=eq.{}", group),
            ChannelFilter::DirectInserts(user) => format!("receiver_id=eq.{}", user),
        }
    }
}

/// Live subscription handle. Owned by the conversation it feeds; dropping or
/// disposing it tells the backend side to leave the channel.
#[derive(Debug)]
pub struct RealtimeSubscription {
    filter: ChannelFilter,
    events: mpsc::UnboundedReceiver<MessageRow>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RealtimeSubscription {
    pub fn new(
        filter: ChannelFilter,
        events: mpsc::UnboundedReceiver<MessageRow>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self { filter, events, shutdown: Some(shutdown) }
    }

    pub fn filter(&self) -> ChannelFilter {
        self.filter
    }

    /// Non-blocking: next buffered event, if any.
    pub fn try_next(&mut self) -> Option<MessageRow> {
        self.events.try_recv().ok()
    }

    /// Waits for the next event. `None` once the channel is closed.
    pub async fn next(&mut self) -> Option<MessageRow> {
        self.events.recv().await
    }

    pub fn dispose(mut self) {
        self.signal_shutdown();
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            log::debug!("[REALTIME] leaving {}", self.filter.topic());
            let _ = tx.send(());
        }
        self.events.close();
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

/// Every remote operation the client performs.
#[async_trait]
pub trait Backend: Send + Sync {
    // auth
    async fn sign_in(&self, email: &str, password: &str) -> ChatResult<AuthSession>;
    async fn sign_up(&self, email: &str, password: &str) -> ChatResult<AuthSession>;
    /// Adopts a previously issued token (restored session).
    async fn restore(&self, session: &AuthSession) -> ChatResult<()>;
    async fn sign_out(&self) -> ChatResult<()>;

    // users
    async fn insert_user(&self, user: &User) -> ChatResult<User>;
    async fn fetch_user(&self, user_id: UserId) -> ChatResult<User>;
    async fn fetch_sender(&self, user_id: UserId) -> ChatResult<SenderProfile>;
    async fn find_user_by_friend_code(&self, code: &str) -> ChatResult<Option<SenderProfile>>;
    async fn load_credentials(&self, user_id: UserId) -> ChatResult<StoredCredentials>;
    /// Stores sealed keys through the `update_user_api_keys` procedure and the
    /// endpoint overrides on the user row.
    async fn update_credentials(&self, user_id: UserId, creds: &StoredCredentials) -> ChatResult<()>;

    // groups
    async fn list_memberships(&self, user_id: UserId) -> ChatResult<Vec<GroupWithRole>>;
    async fn list_group_members(&self, group_id: GroupId) -> ChatResult<Vec<MemberProfile>>;
    async fn find_membership(&self, group_id: GroupId, user_id: UserId) -> ChatResult<Option<GroupMember>>;
    async fn insert_group(&self, group: &NewGroup) -> ChatResult<Group>;
    async fn insert_member(&self, group_id: GroupId, user_id: UserId, role: Role) -> ChatResult<()>;
    async fn delete_member(&self, group_id: GroupId, user_id: UserId) -> ChatResult<()>;
    async fn delete_group(&self, group_id: GroupId) -> ChatResult<()>;
    async fn update_last_read(&self, group_id: GroupId, user_id: UserId, at: DateTime<Utc>) -> ChatResult<()>;

    // messages
    /// Group history, oldest first, joined with sender profiles.
    async fn group_history(&self, group_id: GroupId) -> ChatResult<Vec<ChatMessage>>;
    /// Direct history between two users, oldest first.
    async fn direct_history(&self, a: UserId, b: UserId) -> ChatResult<Vec<ChatMessage>>;
    /// Users the caller has exchanged direct messages with.
    async fn direct_contacts(&self, user_id: UserId) -> ChatResult<Vec<SenderProfile>>;
    async fn insert_message(&self, message: &NewMessage) -> ChatResult<MessageRow>;

    // storage
    async fn upload_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> ChatResult<()>;
    fn public_url(&self, path: &str) -> String;

    // realtime
    async fn subscribe(&self, filter: ChannelFilter) -> ChatResult<RealtimeSubscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn row(group: Option<GroupId>, receiver: Option<UserId>) -> MessageRow {
        MessageRow {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: receiver,
            group_id: group,
            message_type: MessageType::Text,
            content: Some("x".into()),
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn filters_match_only_their_target() {
        let g = Uuid::new_v4();
        let u = Uuid::new_v4();
        assert!(ChannelFilter::GroupInserts(g).matches(&row(Some(g), None)));
        assert!(!ChannelFilter::GroupInserts(g).matches(&row(Some(Uuid::new_v4()), None)));
        assert!(ChannelFilter::DirectInserts(u).matches(&row(None, Some(u))));
        assert!(!ChannelFilter::DirectInserts(u).matches(&row(Some(g), Some(u))));
        assert_eq!(ChannelFilter::GroupInserts(g).row_filter(), format!("group_id=eq.{}", g));
    }

    #[tokio::test]
    async fn dispose_signals_shutdown() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let sub = RealtimeSubscription::new(ChannelFilter::GroupInserts(Uuid::new_v4()), rx, stop_tx);
        sub.dispose();
        assert!(stop_rx.await.is_ok());
        assert!(tx.send(row(None, None)).is_err());
    }
}
