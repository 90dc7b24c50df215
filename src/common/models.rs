// Row types shared by the backend implementations, the services and the GUI.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type GroupId = Uuid;
pub type MessageId = Uuid;

/// Profile row from the `users` table. API credentials are not part of it,
/// they are loaded separately by the AI service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub color: String,
    pub friend_code: String,
}

/// The subset of a user shown next to a message or in a member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub color: String,
}

impl SenderProfile {
    /// Placeholder for a sender whose profile row is missing.
    pub fn unknown(id: UserId) -> Self {
        Self {
            id,
            display_name: "Unknown".to_string(),
            avatar_url: None,
            color: "#667eea".to_string(),
        }
    }

    pub fn initial(&self) -> String {
        crate::common::format::avatar_initial(&self.display_name)
    }
}

impl From<&User> for SenderProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            color: user.color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub group_code: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub color: String,
    pub created_by: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
}

/// A group as seen from the caller's membership: metadata plus the caller's role.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupWithRole {
    pub group: Group,
    pub user_role: Role,
}

impl GroupWithRole {
    pub fn id(&self) -> GroupId {
        self.group.id
    }
}

/// A member row joined with the member's profile, for the settings view.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberProfile {
    pub profile: SenderProfile,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub group_code: String,
    pub color: String,
    pub created_by: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
}

/// Where a message goes. A message row carries exactly one of
/// `receiver_id` / `group_id`, this is the typed form of that choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTarget {
    Direct(UserId),
    Group(GroupId),
}

/// Raw row from the `messages` table, as returned by the REST API and pushed
/// by the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(default)]
    pub receiver_id: Option<UserId>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    /// The target this row was addressed to. Rows with a group id are group
    /// messages even if a receiver is (wrongly) set as well.
    pub fn target(&self) -> Option<MessageTarget> {
        match (self.group_id, self.receiver_id) {
            (Some(group), _) => Some(MessageTarget::Group(group)),
            (None, Some(receiver)) => Some(MessageTarget::Direct(receiver)),
            (None, None) => None,
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Message row joined with the sender's display attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub row: MessageRow,
    pub sender: SenderProfile,
}

impl ChatMessage {
    pub fn id(&self) -> MessageId {
        self.row.id
    }

    pub fn is_from(&self, user: UserId) -> bool {
        self.row.sender_id == user
    }

    pub fn formatted_time(&self) -> String {
        crate::common::format::format_message_time(self.row.created_at)
    }
}

/// Outgoing message, before the backend assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub sender_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub message_type: MessageType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewMessage {
    pub fn text(sender_id: UserId, target: MessageTarget, content: impl Into<String>) -> Self {
        let mut msg = Self {
            sender_id,
            receiver_id: None,
            group_id: None,
            message_type: MessageType::Text,
            content: content.into(),
            image_url: None,
        };
        msg.set_target(target);
        msg
    }

    pub fn image(sender_id: UserId, target: MessageTarget, image_url: impl Into<String>, caption: impl Into<String>) -> Self {
        let mut msg = Self::text(sender_id, target, caption);
        msg.message_type = MessageType::Image;
        msg.image_url = Some(image_url.into());
        msg
    }

    fn set_target(&mut self, target: MessageTarget) {
        match target {
            MessageTarget::Direct(user) => self.receiver_id = Some(user),
            MessageTarget::Group(group) => self.group_id = Some(group),
        }
    }
}

/// API credentials as stored on the user row: sealed keys and optional
/// endpoint overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub gemini_endpoint: Option<String>,
    #[serde(default)]
    pub openai_endpoint: Option<String>,
}

/// Tokens returned by a successful sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_sets_exactly_one_target() {
        let me = Uuid::new_v4();
        let group = Uuid::new_v4();
        let msg = NewMessage::text(me, MessageTarget::Group(group), "hi");
        assert_eq!(msg.group_id, Some(group));
        assert!(msg.receiver_id.is_none());

        let friend = Uuid::new_v4();
        let img = NewMessage::image(me, MessageTarget::Direct(friend), "https://x/y.png", "");
        assert_eq!(img.receiver_id, Some(friend));
        assert!(img.group_id.is_none());
        assert_eq!(img.message_type, MessageType::Image);
    }

    #[test]
    fn message_row_parses_realtime_record() {
        let raw = serde_json::json!({
            "id": "7d7a3a8e-8f57-4b39-9df3-0c1a4b0e9c11",
            "sender_id": "1b2d4e38-66a0-4c4f-9d8d-7a52f3b1a001",
            "receiver_id": null,
            "group_id": "0f9e1d3c-2b4a-4c5d-8e7f-6a5b4c3d2e1f",
            "message_type": "image",
            "content": "look",
            "image_url": "https://cdn/x.png",
            "created_at": "2024-05-01T10:00:00+00:00"
        });
        let row: MessageRow = serde_json::from_value(raw).unwrap();
        assert_eq!(row.message_type, MessageType::Image);
        assert!(matches!(row.target(), Some(MessageTarget::Group(_))));
        assert_eq!(row.text(), "look");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let r: Role = serde_json::from_str("\"member\"").unwrap();
        assert!(!r.is_admin());
    }
}
