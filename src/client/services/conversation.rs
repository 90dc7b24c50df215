//! The open conversation: its target, its ordered messages and the realtime
//! subscription feeding it.
//!
//! Navigation bumps a generation counter. Every async step re-checks the
//! generation after its await point, so results that belong to a view the
//! user already left are dropped instead of leaking into the new one.
//!
//! Realtime rows are drained and ingested behind a FIFO gate: a poll that
//! starts while another is still resolving senders waits for it, so rows
//! are appended in arrival order.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::backend::{ChannelFilter, RealtimeSubscription};
use crate::client::services::groups;
use crate::client::session::ChatSession;
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::*;

pub type SharedConversation = Arc<Mutex<Conversation>>;

#[derive(Debug, Default)]
pub struct Conversation {
    target: Option<MessageTarget>,
    messages: Vec<ChatMessage>,
    subscription: Option<RealtimeSubscription>,
    generation: u64,
    ingest_gate: Arc<Mutex<()>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedConversation {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn target(&self) -> Option<MessageTarget> {
        self.target
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn is_showing_group(&self, group_id: GroupId) -> bool {
        self.target == Some(MessageTarget::Group(group_id))
    }

    /// Whether `row` belongs to the active target, seen from user `me`.
    pub fn accepts(&self, me: UserId, row: &MessageRow) -> bool {
        match (self.target, row.target()) {
            (Some(MessageTarget::Group(active)), Some(MessageTarget::Group(group))) => active == group,
            (Some(MessageTarget::Direct(friend)), Some(MessageTarget::Direct(receiver))) => {
                (row.sender_id == me && receiver == friend) || (row.sender_id == friend && receiver == me)
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id() == id)
    }

    /// Appends unless a message with the same id is already present.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if self.contains(message.id()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Back to the empty state. Disposes the subscription if any.
    pub fn close(&mut self) {
        if let Some(sub) = self.subscription.take() {
            sub.dispose();
        }
        self.target = None;
        self.messages.clear();
        self.generation += 1;
    }

    fn begin(&mut self, target: MessageTarget) -> u64 {
        self.close();
        self.target = Some(target);
        self.generation
    }

    fn drain_pending(&mut self) -> Vec<MessageRow> {
        let mut rows = Vec::new();
        if let Some(sub) = self.subscription.as_mut() {
            while let Some(row) = sub.try_next() {
                rows.push(row);
            }
        }
        rows
    }
}

/// Switches the view to a group: history first, then the live subscription.
pub async fn open_group(conv: &SharedConversation, session: &ChatSession, group_id: GroupId) -> ChatResult<()> {
    log::info!("[CONVERSATION] opening group {}", group_id);
    let generation = conv.lock().await.begin(MessageTarget::Group(group_id));
    let history = session.backend().group_history(group_id).await?;
    if !install_history(conv, generation, history).await {
        return Ok(());
    }
    if let Err(e) = groups::mark_read(session, group_id).await {
        log::warn!("[CONVERSATION] mark read failed for {}: {}", group_id, e);
    }
    attach(conv, session, generation, ChannelFilter::GroupInserts(group_id)).await
}

/// Switches the view to the direct conversation with `friend`.
pub async fn open_direct(conv: &SharedConversation, session: &ChatSession, friend: UserId) -> ChatResult<()> {
    log::info!("[CONVERSATION] opening direct chat with {}", friend);
    let generation = conv.lock().await.begin(MessageTarget::Direct(friend));
    let history = session.backend().direct_history(session.user_id(), friend).await?;
    if !install_history(conv, generation, history).await {
        return Ok(());
    }
    attach(conv, session, generation, ChannelFilter::DirectInserts(session.user_id())).await
}

pub async fn close(conv: &SharedConversation) {
    conv.lock().await.close();
}

async fn install_history(conv: &SharedConversation, generation: u64, history: Vec<ChatMessage>) -> bool {
    let mut guard = conv.lock().await;
    if guard.generation != generation {
        log::debug!("[CONVERSATION] discarding stale history");
        return false;
    }
    for message in history {
        guard.append(message);
    }
    true
}

async fn attach(conv: &SharedConversation, session: &ChatSession, generation: u64, filter: ChannelFilter) -> ChatResult<()> {
    let subscription = session.backend().subscribe(filter).await?;
    let mut guard = conv.lock().await;
    if guard.generation != generation {
        // user navigated away while the channel was joining
        subscription.dispose();
        return Ok(());
    }
    guard.subscription = Some(subscription);
    Ok(())
}

/// Handles one realtime insert. Returns whether it was appended.
pub async fn ingest(conv: &SharedConversation, session: &ChatSession, row: MessageRow) -> ChatResult<bool> {
    let me = session.user_id();
    let generation = {
        let guard = conv.lock().await;
        if !guard.accepts(me, &row) || guard.contains(row.id) {
            return Ok(false);
        }
        guard.generation
    };

    let sender = match session.backend().fetch_sender(row.sender_id).await {
        Ok(sender) => sender,
        Err(ChatError::NotFound(_)) => {
            log::debug!("[CONVERSATION] no profile for sender {}", row.sender_id);
            SenderProfile::unknown(row.sender_id)
        }
        Err(e) => return Err(e),
    };

    let group = {
        let mut guard = conv.lock().await;
        if guard.generation != generation || !guard.accepts(me, &row) {
            log::debug!("[CONVERSATION] dropping {} delivered to a closed view", row.id);
            return Ok(false);
        }
        let group = row.group_id;
        if !guard.append(ChatMessage { row, sender }) {
            return Ok(false);
        }
        group
    };

    if let Some(group_id) = group {
        if let Err(e) = groups::mark_read(session, group_id).await {
            log::warn!("[CONVERSATION] mark read failed for {}: {}", group_id, e);
        }
    }
    Ok(true)
}

/// Ingests every event buffered on the subscription. Returns how many were
/// appended. A row that fails is logged and skipped; the rest of the batch
/// still goes through.
pub async fn poll(conv: &SharedConversation, session: &ChatSession) -> ChatResult<usize> {
    let gate = conv.lock().await.ingest_gate.clone();
    let _turn = gate.lock().await;

    let rows = conv.lock().await.drain_pending();
    let mut appended = 0;
    for row in rows {
        let id = row.id;
        match ingest(conv, session, row).await {
            Ok(true) => appended += 1,
            Ok(false) => {}
            Err(e) => log::warn!("[CONVERSATION] realtime row {} skipped: {}", id, e),
        }
    }
    Ok(appended)
}

/// Sends a text message to the active conversation.
pub async fn send_text(conv: &SharedConversation, session: &ChatSession, text: &str) -> ChatResult<ChatMessage> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::validation("Message cannot be empty"));
    }
    let target = active_target(conv).await?;
    post(conv, session, NewMessage::text(session.user_id(), target, text)).await
}

pub(crate) async fn active_target(conv: &SharedConversation) -> ChatResult<MessageTarget> {
    conv.lock().await.target.ok_or(ChatError::NoActiveConversation)
}

/// Inserts `message` and appends the stored row through the de-duplicating
/// path, so the realtime echo of our own message is absorbed.
pub(crate) async fn post(conv: &SharedConversation, session: &ChatSession, message: NewMessage) -> ChatResult<ChatMessage> {
    let row = session.backend().insert_message(&message).await?;
    let sent = ChatMessage { row, sender: SenderProfile::from(session.user()) };
    let mut guard = conv.lock().await;
    if guard.accepts(session.user_id(), &sent.row) {
        guard.append(sent.clone());
    }
    Ok(sent)
}
