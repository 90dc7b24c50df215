// Direct messages: find people by friend code, list recent contacts, chat 1:1.
use crate::client::services::conversation::{self, SharedConversation};
use crate::client::session::ChatSession;
use crate::common::codes;
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::*;

pub async fn find_by_friend_code(session: &ChatSession, friend_code: &str) -> ChatResult<SenderProfile> {
    let code = codes::normalize_code(friend_code);
    if code.is_empty() {
        return Err(ChatError::validation("Please enter a friend code"));
    }
    if code == session.user().friend_code {
        return Err(ChatError::validation("That is your own friend code"));
    }
    session
        .backend()
        .find_user_by_friend_code(&code)
        .await?
        .ok_or_else(|| ChatError::NotFound("User not found".to_string()))
}

/// People the caller has exchanged direct messages with, most recent first.
pub async fn recent_contacts(session: &ChatSession) -> ChatResult<Vec<SenderProfile>> {
    let contacts = session.backend().direct_contacts(session.user_id()).await?;
    log::debug!("[FRIENDS] {} direct contacts", contacts.len());
    Ok(contacts)
}

/// Finds a user by code and opens the direct conversation with them.
pub async fn start_chat(conv: &SharedConversation, session: &ChatSession, friend_code: &str) -> ChatResult<SenderProfile> {
    let friend = find_by_friend_code(session, friend_code).await?;
    conversation::open_direct(conv, session, friend.id).await?;
    Ok(friend)
}

pub async fn send_direct_message(
    conv: &SharedConversation,
    session: &ChatSession,
    friend: UserId,
    text: &str,
) -> ChatResult<ChatMessage> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::validation("Message cannot be empty"));
    }
    if friend == session.user_id() {
        return Err(ChatError::validation("You cannot message yourself"));
    }
    conversation::post(conv, session, NewMessage::text(session.user_id(), MessageTarget::Direct(friend), text)).await
}
