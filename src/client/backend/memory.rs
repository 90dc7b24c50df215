//! In-process backend.
//!
//! Keeps every table in memory and fans inserts out to live subscriptions,
//! like the hosted service would. Every trait call bumps a counter so tests
//! can assert that a rejected operation never reached the backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{Backend, ChannelFilter, RealtimeSubscription};
use crate::common::codes;
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::*;

#[derive(Default)]
struct State {
    accounts: HashMap<String, (String, UserId)>,
    session: Option<AuthSession>,
    users: Vec<User>,
    credentials: HashMap<UserId, StoredCredentials>,
    groups: Vec<Group>,
    members: Vec<GroupMember>,
    messages: Vec<MessageRow>,
    objects: HashMap<String, (Vec<u8>, String)>,
    subscribers: Vec<(ChannelFilter, mpsc::UnboundedSender<MessageRow>)>,
}

impl State {
    fn broadcast(&mut self, row: &MessageRow) {
        self.subscribers.retain(|(_, tx)| !tx.is_closed());
        for (filter, tx) in &self.subscribers {
            if filter.matches(row) {
                let _ = tx.send(row.clone());
            }
        }
    }

    fn sender(&self, user_id: UserId) -> SenderProfile {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(SenderProfile::from)
            .unwrap_or_else(|| SenderProfile::unknown(user_id))
    }

    fn joined(&self, rows: Vec<MessageRow>) -> Vec<ChatMessage> {
        rows.into_iter()
            .map(|row| ChatMessage { sender: self.sender(row.sender_id), row })
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    calls: Arc<AtomicUsize>,
    uploads: Arc<AtomicUsize>,
    sender_delay: Arc<Mutex<Option<Duration>>>,
    creator_trigger: Arc<Mutex<bool>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user profile, bypassing auth.
    pub fn add_user(&self, display_name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            avatar_url: None,
            color: codes::random_user_color().to_string(),
            friend_code: codes::generate_friend_code(),
        };
        self.state.lock().users.push(user.clone());
        user
    }

    /// Total number of `Backend` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Subscriptions whose receiving side is still alive.
    pub fn active_subscriptions(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state.subscribers.len()
    }

    /// Delivers `row` to matching subscribers without storing it. Used to
    /// replay duplicates or late events.
    pub fn push_event(&self, row: MessageRow) {
        self.state.lock().broadcast(&row);
    }

    /// Stores a message as if another client had sent it and notifies
    /// subscribers.
    pub fn deliver(&self, message: &NewMessage) -> MessageRow {
        let row = Self::materialize(message);
        let mut state = self.state.lock();
        state.messages.push(row.clone());
        state.broadcast(&row);
        row
    }

    /// Makes `fetch_sender` sleep, so tests can navigate while a read is
    /// in flight.
    pub fn set_sender_delay(&self, delay: Option<Duration>) {
        *self.sender_delay.lock() = delay;
    }

    /// Simulates a database trigger that adds the creator as admin when a
    /// group row is inserted.
    pub fn set_creator_trigger(&self, enabled: bool) {
        *self.creator_trigger.lock() = enabled;
    }

    pub fn messages(&self) -> Vec<MessageRow> {
        self.state.lock().messages.clone()
    }

    pub fn members_of(&self, group_id: GroupId) -> Vec<GroupMember> {
        self.state
            .lock()
            .members
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.state.lock().groups.clone()
    }

    pub fn object(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.state.lock().objects.get(path).cloned()
    }

    pub fn raw_credentials(&self, user_id: UserId) -> StoredCredentials {
        self.state.lock().credentials.get(&user_id).cloned().unwrap_or_default()
    }

    fn track(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn materialize(message: &NewMessage) -> MessageRow {
        MessageRow {
            id: Uuid::new_v4(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            group_id: message.group_id,
            message_type: message.message_type,
            content: Some(message.content.clone()),
            image_url: message.image_url.clone(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> ChatResult<AuthSession> {
        self.track();
        let mut state = self.state.lock();
        match state.accounts.get(email) {
            Some((stored, user_id)) if stored == password => {
                let session = AuthSession {
                    access_token: format!("token-{}", Uuid::new_v4()),
                    user_id: *user_id,
                    email: Some(email.to_string()),
                };
                state.session = Some(session.clone());
                Ok(session)
            }
            _ => Err(ChatError::Backend { status: 400, message: "Invalid login credentials".to_string() }),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> ChatResult<AuthSession> {
        self.track();
        let mut state = self.state.lock();
        if state.accounts.contains_key(email) {
            return Err(ChatError::Backend { status: 422, message: "User already registered".to_string() });
        }
        let user_id = Uuid::new_v4();
        state.accounts.insert(email.to_string(), (password.to_string(), user_id));
        let session = AuthSession {
            access_token: format!("token-{}", Uuid::new_v4()),
            user_id,
            email: Some(email.to_string()),
        };
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn restore(&self, session: &AuthSession) -> ChatResult<()> {
        self.track();
        self.state.lock().session = Some(session.clone());
        Ok(())
    }

    async fn sign_out(&self) -> ChatResult<()> {
        self.track();
        self.state.lock().session = None;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> ChatResult<User> {
        self.track();
        let mut state = self.state.lock();
        if state.users.iter().any(|u| u.id == user.id || u.friend_code == user.friend_code) {
            return Err(ChatError::Conflict("users_pkey".to_string()));
        }
        state.users.push(user.clone());
        Ok(user.clone())
    }

    async fn fetch_user(&self, user_id: UserId) -> ChatResult<User> {
        self.track();
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound("User not found".to_string()))
    }

    async fn fetch_sender(&self, user_id: UserId) -> ChatResult<SenderProfile> {
        self.track();
        let delay = *self.sender_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock();
        state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(SenderProfile::from)
            .ok_or_else(|| ChatError::NotFound("User not found".to_string()))
    }

    async fn find_user_by_friend_code(&self, code: &str) -> ChatResult<Option<SenderProfile>> {
        self.track();
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .find(|u| u.friend_code == code)
            .map(SenderProfile::from))
    }

    async fn load_credentials(&self, user_id: UserId) -> ChatResult<StoredCredentials> {
        self.track();
        Ok(self.raw_credentials(user_id))
    }

    async fn update_credentials(&self, user_id: UserId, creds: &StoredCredentials) -> ChatResult<()> {
        self.track();
        self.state.lock().credentials.insert(user_id, creds.clone());
        Ok(())
    }

    async fn list_memberships(&self, user_id: UserId) -> ChatResult<Vec<GroupWithRole>> {
        self.track();
        let state = self.state.lock();
        Ok(state
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                state
                    .groups
                    .iter()
                    .find(|g| g.id == m.group_id)
                    .map(|g| GroupWithRole { group: g.clone(), user_role: m.role })
            })
            .collect())
    }

    async fn list_group_members(&self, group_id: GroupId) -> ChatResult<Vec<MemberProfile>> {
        self.track();
        let state = self.state.lock();
        Ok(state
            .members
            .iter()
            .filter(|m| m.group_id == group_id)
            .map(|m| MemberProfile { profile: state.sender(m.user_id), role: m.role, joined_at: m.joined_at })
            .collect())
    }

    async fn find_membership(&self, group_id: GroupId, user_id: UserId) -> ChatResult<Option<GroupMember>> {
        self.track();
        Ok(self
            .state
            .lock()
            .members
            .iter()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
            .cloned())
    }

    async fn insert_group(&self, group: &NewGroup) -> ChatResult<Group> {
        self.track();
        let trigger = *self.creator_trigger.lock();
        let mut state = self.state.lock();
        if state.groups.iter().any(|g| g.group_code == group.group_code) {
            return Err(ChatError::Conflict("groups_group_code_key".to_string()));
        }
        let row = Group {
            id: Uuid::new_v4(),
            name: group.name.clone(),
            description: group.description.clone(),
            group_code: group.group_code.clone(),
            avatar_url: None,
            color: group.color.clone(),
            created_by: group.created_by,
        };
        state.groups.push(row.clone());
        if trigger {
            state.members.push(GroupMember {
                group_id: row.id,
                user_id: group.created_by,
                role: Role::Admin,
                joined_at: Utc::now(),
                last_read_at: None,
            });
        }
        Ok(row)
    }

    async fn insert_member(&self, group_id: GroupId, user_id: UserId, role: Role) -> ChatResult<()> {
        self.track();
        let mut state = self.state.lock();
        if state.members.iter().any(|m| m.group_id == group_id && m.user_id == user_id) {
            return Err(ChatError::Conflict("group_members_group_id_user_id_key".to_string()));
        }
        if !state.groups.iter().any(|g| g.id == group_id) {
            return Err(ChatError::Backend { status: 409, message: "group does not exist".to_string() });
        }
        state.members.push(GroupMember { group_id, user_id, role, joined_at: Utc::now(), last_read_at: None });
        Ok(())
    }

    async fn delete_member(&self, group_id: GroupId, user_id: UserId) -> ChatResult<()> {
        self.track();
        self.state
            .lock()
            .members
            .retain(|m| !(m.group_id == group_id && m.user_id == user_id));
        Ok(())
    }

    async fn delete_group(&self, group_id: GroupId) -> ChatResult<()> {
        self.track();
        let mut state = self.state.lock();
        state.groups.retain(|g| g.id != group_id);
        state.members.retain(|m| m.group_id != group_id);
        state.messages.retain(|m| m.group_id != Some(group_id));
        Ok(())
    }

    async fn update_last_read(&self, group_id: GroupId, user_id: UserId, at: DateTime<Utc>) -> ChatResult<()> {
        self.track();
        let mut state = self.state.lock();
        if let Some(member) = state
            .members
            .iter_mut()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
        {
            member.last_read_at = Some(at);
        }
        Ok(())
    }

    async fn group_history(&self, group_id: GroupId) -> ChatResult<Vec<ChatMessage>> {
        self.track();
        let state = self.state.lock();
        let mut rows: Vec<MessageRow> = state
            .messages
            .iter()
            .filter(|m| m.group_id == Some(group_id))
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(state.joined(rows))
    }

    async fn direct_history(&self, a: UserId, b: UserId) -> ChatResult<Vec<ChatMessage>> {
        self.track();
        let state = self.state.lock();
        let mut rows: Vec<MessageRow> = state
            .messages
            .iter()
            .filter(|m| {
                m.group_id.is_none()
                    && ((m.sender_id == a && m.receiver_id == Some(b)) || (m.sender_id == b && m.receiver_id == Some(a)))
            })
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(state.joined(rows))
    }

    async fn direct_contacts(&self, user_id: UserId) -> ChatResult<Vec<SenderProfile>> {
        self.track();
        let state = self.state.lock();
        let mut ids: Vec<UserId> = Vec::new();
        for m in state.messages.iter().rev().filter(|m| m.group_id.is_none()) {
            let other = match m.receiver_id {
                Some(receiver) if m.sender_id == user_id => receiver,
                Some(receiver) if receiver == user_id => m.sender_id,
                _ => continue,
            };
            if !ids.contains(&other) {
                ids.push(other);
            }
        }
        Ok(ids.into_iter().map(|id| state.sender(id)).collect())
    }

    async fn insert_message(&self, message: &NewMessage) -> ChatResult<MessageRow> {
        self.track();
        Ok(self.deliver(message))
    }

    async fn upload_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> ChatResult<()> {
        self.track();
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.objects.contains_key(path) {
            return Err(ChatError::Conflict("The resource already exists".to_string()));
        }
        state.objects.insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://chat-images/{}", path)
    }

    async fn subscribe(&self, filter: ChannelFilter) -> ChatResult<RealtimeSubscription> {
        self.track();
        let (tx, rx) = mpsc::unbounded_channel();
        // nothing listens for the leave signal in memory
        let (stop_tx, _stop_rx) = oneshot::channel();
        self.state.lock().subscribers.push((filter, tx));
        Ok(RealtimeSubscription::new(filter, rx, stop_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inserts_reach_matching_subscribers_only() {
        let backend = MemoryBackend::new();
        let alice = backend.add_user("Alice");
        let group = Uuid::new_v4();
        let mut sub = backend.subscribe(ChannelFilter::GroupInserts(group)).await.unwrap();
        backend
            .insert_message(&NewMessage::text(alice.id, MessageTarget::Group(Uuid::new_v4()), "elsewhere"))
            .await
            .unwrap();
        let row = backend
            .insert_message(&NewMessage::text(alice.id, MessageTarget::Group(group), "here"))
            .await
            .unwrap();
        assert_eq!(sub.try_next().map(|r| r.id), Some(row.id));
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned() {
        let backend = MemoryBackend::new();
        let sub = backend.subscribe(ChannelFilter::DirectInserts(Uuid::new_v4())).await.unwrap();
        assert_eq!(backend.active_subscriptions(), 1);
        sub.dispose();
        assert_eq!(backend.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn duplicate_membership_is_a_conflict() {
        let backend = MemoryBackend::new();
        let alice = backend.add_user("Alice");
        let group = backend
            .insert_group(&NewGroup {
                name: "g".into(),
                description: String::new(),
                group_code: "ABC234".into(),
                color: "#000000".into(),
                created_by: alice.id,
            })
            .await
            .unwrap();
        backend.insert_member(group.id, alice.id, Role::Admin).await.unwrap();
        let err = backend.insert_member(group.id, alice.id, Role::Member).await.unwrap_err();
        assert!(matches!(err, ChatError::Conflict(_)));
        assert_eq!(backend.call_count(), 3);
    }
}
