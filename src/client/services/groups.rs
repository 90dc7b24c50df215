use chrono::Utc;

use crate::client::services::conversation::{self, SharedConversation};
use crate::client::session::ChatSession;
use crate::common::codes;
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::*;

/// The caller's groups as last loaded, with the caller's role in each.
/// Role checks for admin-only actions are made against this list.
#[derive(Debug, Clone, Default)]
pub struct GroupDirectory {
    groups: Vec<GroupWithRole>,
}

impl GroupDirectory {
    pub fn new(groups: Vec<GroupWithRole>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[GroupWithRole] {
        &self.groups
    }

    pub fn get(&self, group_id: GroupId) -> Option<&GroupWithRole> {
        self.groups.iter().find(|g| g.id() == group_id)
    }

    pub fn role_of(&self, group_id: GroupId) -> Option<Role> {
        self.get(group_id).map(|g| g.user_role)
    }

    pub fn is_admin(&self, group_id: GroupId) -> bool {
        self.role_of(group_id).is_some_and(Role::is_admin)
    }

    pub fn insert(&mut self, group: GroupWithRole) {
        self.remove(group.id());
        self.groups.push(group);
    }

    pub fn remove(&mut self, group_id: GroupId) {
        self.groups.retain(|g| g.id() != group_id);
    }
}

/// Two-step confirmation required before a group is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteConfirmation {
    group_id: GroupId,
    confirmations: u8,
}

impl DeleteConfirmation {
    pub fn new(group_id: GroupId) -> Self {
        Self { group_id, confirmations: 0 }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Records one confirmation. Returns true once both have been given.
    pub fn confirm(&mut self) -> bool {
        self.confirmations = (self.confirmations + 1).min(2);
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.confirmations >= 2
    }

    /// 1 before the first confirmation, 2 before the second.
    pub fn stage(&self) -> u8 {
        self.confirmations + 1
    }
}

pub async fn load_groups(session: &ChatSession) -> ChatResult<Vec<GroupWithRole>> {
    let groups = session.backend().list_memberships(session.user_id()).await?;
    log::info!("[GROUPS] loaded {} groups for {}", groups.len(), session.user_id());
    Ok(groups)
}

pub async fn group_members(session: &ChatSession, group_id: GroupId) -> ChatResult<Vec<MemberProfile>> {
    session.backend().list_group_members(group_id).await
}

/// Creates a group and makes the caller its admin.
pub async fn create_group(session: &ChatSession, name: &str, description: &str) -> ChatResult<GroupWithRole> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ChatError::validation("Group name is required"));
    }
    let mut new_group = NewGroup {
        name: name.to_string(),
        description: description.trim().to_string(),
        group_code: codes::generate_group_code(),
        color: codes::random_group_color(),
        created_by: session.user_id(),
    };
    let group = match session.backend().insert_group(&new_group).await {
        Err(ChatError::Conflict(_)) => {
            log::warn!("[GROUPS] group code {} taken, retrying", new_group.group_code);
            new_group.group_code = codes::generate_group_code();
            session.backend().insert_group(&new_group).await?
        }
        other => other?,
    };

    match session.backend().insert_member(group.id, session.user_id(), Role::Admin).await {
        Ok(()) => {}
        Err(ChatError::Conflict(_)) => {
            log::info!("[GROUPS] creator already member of {} (added by trigger)", group.id);
        }
        Err(e) => return Err(e),
    }
    log::info!("[GROUPS] created group '{}' code {}", group.name, group.group_code);
    Ok(GroupWithRole { group, user_role: Role::Admin })
}

/// Adds the user owning `friend_code` as a plain member.
pub async fn add_member_by_code(session: &ChatSession, group_id: GroupId, friend_code: &str) -> ChatResult<SenderProfile> {
    let code = codes::normalize_code(friend_code);
    if code.is_empty() {
        return Err(ChatError::validation("Please enter a friend code"));
    }
    let backend = session.backend();
    let user = backend
        .find_user_by_friend_code(&code)
        .await?
        .ok_or_else(|| ChatError::NotFound("User not found".to_string()))?;
    if backend.find_membership(group_id, user.id).await?.is_some() {
        return Err(ChatError::AlreadyMember);
    }
    match backend.insert_member(group_id, user.id, Role::Member).await {
        Ok(()) => {}
        Err(ChatError::Conflict(_)) => return Err(ChatError::AlreadyMember),
        Err(e) => return Err(e),
    }
    log::info!("[GROUPS] added {} to {}", user.id, group_id);
    Ok(user)
}

pub async fn leave_group(
    conv: &SharedConversation,
    session: &ChatSession,
    directory: &mut GroupDirectory,
    group_id: GroupId,
) -> ChatResult<()> {
    end_membership(conv, session, directory, group_id, session.user_id()).await
}

/// Removes `user_id` from the group. Removing someone else needs the admin
/// role, removing oneself is the same as leaving.
pub async fn remove_member(
    conv: &SharedConversation,
    session: &ChatSession,
    directory: &mut GroupDirectory,
    group_id: GroupId,
    user_id: UserId,
) -> ChatResult<()> {
    if user_id != session.user_id() && !directory.is_admin(group_id) {
        return Err(ChatError::PermissionDenied("remove members"));
    }
    end_membership(conv, session, directory, group_id, user_id).await
}

async fn end_membership(
    conv: &SharedConversation,
    session: &ChatSession,
    directory: &mut GroupDirectory,
    group_id: GroupId,
    user_id: UserId,
) -> ChatResult<()> {
    session.backend().delete_member(group_id, user_id).await?;
    if user_id == session.user_id() {
        directory.remove(group_id);
        let mut guard = conv.lock().await;
        if guard.is_showing_group(group_id) {
            guard.close();
        }
        log::info!("[GROUPS] left group {}", group_id);
    } else {
        log::info!("[GROUPS] removed {} from {}", user_id, group_id);
    }
    Ok(())
}

/// Deletes the group and, at the backend, its messages.
pub async fn delete_group(
    conv: &SharedConversation,
    session: &ChatSession,
    directory: &mut GroupDirectory,
    confirmation: &DeleteConfirmation,
) -> ChatResult<()> {
    let group_id = confirmation.group_id();
    if !directory.is_admin(group_id) {
        return Err(ChatError::PermissionDenied("delete the group"));
    }
    if !confirmation.is_complete() {
        return Err(ChatError::ConfirmationRequired);
    }
    session.backend().delete_group(group_id).await?;
    directory.remove(group_id);
    let mut guard = conv.lock().await;
    if guard.is_showing_group(group_id) {
        guard.close();
    }
    log::warn!("[GROUPS] deleted group {}", group_id);
    Ok(())
}

pub async fn send_group_message(
    conv: &SharedConversation,
    session: &ChatSession,
    group_id: GroupId,
    text: &str,
) -> ChatResult<ChatMessage> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::validation("Message cannot be empty"));
    }
    conversation::post(conv, session, NewMessage::text(session.user_id(), MessageTarget::Group(group_id), text)).await
}

pub async fn mark_read(session: &ChatSession, group_id: GroupId) -> ChatResult<()> {
    session
        .backend()
        .update_last_read(group_id, session.user_id(), Utc::now())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn group(role: Role) -> GroupWithRole {
        GroupWithRole {
            group: Group {
                id: Uuid::new_v4(),
                name: "Rust".into(),
                description: String::new(),
                group_code: "ABCDEF".into(),
                avatar_url: None,
                color: "#123456".into(),
                created_by: Uuid::new_v4(),
            },
            user_role: role,
        }
    }

    #[test]
    fn directory_tracks_roles() {
        let admin = group(Role::Admin);
        let member = group(Role::Member);
        let mut dir = GroupDirectory::new(vec![admin.clone(), member.clone()]);
        assert!(dir.is_admin(admin.id()));
        assert!(!dir.is_admin(member.id()));
        assert!(!dir.is_admin(Uuid::new_v4()));
        dir.remove(admin.id());
        assert!(dir.get(admin.id()).is_none());
        assert_eq!(dir.groups().len(), 1);
    }

    #[test]
    fn confirmation_needs_two_steps() {
        let mut c = DeleteConfirmation::new(Uuid::new_v4());
        assert_eq!(c.stage(), 1);
        assert!(!c.confirm());
        assert_eq!(c.stage(), 2);
        assert!(c.confirm());
        assert!(c.confirm());
        assert!(c.is_complete());
    }
}
