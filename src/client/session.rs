use std::sync::Arc;

use crate::client::backend::Backend;
use crate::common::codes;
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::{AuthSession, User, UserId};

const MIN_PASSWORD_LEN: usize = 6;

/// Authenticated context passed to every service call: the backend handle
/// and the signed-in user's profile.
#[derive(Clone)]
pub struct ChatSession {
    backend: Arc<dyn Backend>,
    user: User,
    auth: Option<AuthSession>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // il token non va mai nei log
        f.debug_struct("ChatSession").field("user", &self.user).finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, user: User) -> Self {
        Self { backend, user, auth: None }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn auth(&self) -> Option<&AuthSession> {
        self.auth.as_ref()
    }

    pub async fn sign_in(backend: Arc<dyn Backend>, email: &str, password: &str) -> ChatResult<Self> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ChatError::validation("Email and password are required"));
        }
        let auth = backend.sign_in(email, password).await?;
        let user = match backend.fetch_user(auth.user_id).await {
            Ok(user) => user,
            Err(ChatError::NotFound(_)) => {
                // account without profile row (e.g. created from the dashboard)
                let name = email.split('@').next().unwrap_or(email);
                create_profile(backend.as_ref(), auth.user_id, name).await?
            }
            Err(e) => return Err(e),
        };
        log::info!("[SESSION] signed in as {} ({})", user.display_name, user.id);
        Ok(Self { backend, user, auth: Some(auth) })
    }

    /// Creates the auth account and its `users` profile row.
    pub async fn sign_up(backend: Arc<dyn Backend>, email: &str, password: &str, display_name: &str) -> ChatResult<Self> {
        let email = email.trim();
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ChatError::validation("Display name is required"));
        }
        if !email.contains('@') {
            return Err(ChatError::validation("Please enter a valid email address"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ChatError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let auth = backend.sign_up(email, password).await?;
        let user = create_profile(backend.as_ref(), auth.user_id, display_name).await?;
        log::info!("[SESSION] registered {} with friend code {}", user.id, user.friend_code);
        Ok(Self { backend, user, auth: Some(auth) })
    }

    /// Re-adopts a stored token. Fetching the profile doubles as token check.
    pub async fn restore(backend: Arc<dyn Backend>, auth: AuthSession) -> ChatResult<Self> {
        backend.restore(&auth).await?;
        let user = backend.fetch_user(auth.user_id).await?;
        log::info!("[SESSION] restored session for {}", user.id);
        Ok(Self { backend, user, auth: Some(auth) })
    }

    pub async fn sign_out(self) -> ChatResult<()> {
        log::info!("[SESSION] signing out {}", self.user.id);
        self.backend.sign_out().await
    }
}

async fn create_profile(backend: &dyn Backend, user_id: UserId, display_name: &str) -> ChatResult<User> {
    let mut user = User {
        id: user_id,
        display_name: display_name.to_string(),
        avatar_url: None,
        color: codes::random_user_color().to_string(),
        friend_code: codes::generate_friend_code(),
    };
    match backend.insert_user(&user).await {
        Ok(created) => Ok(created),
        Err(ChatError::Conflict(what)) => {
            // friend code collision, one more try
            log::warn!("[SESSION] profile insert conflict ({}), regenerating friend code", what);
            user.friend_code = codes::generate_friend_code();
            backend.insert_user(&user).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::backend::MemoryBackend;

    #[tokio::test]
    async fn sign_up_creates_profile_then_sign_in_finds_it() {
        let backend = Arc::new(MemoryBackend::new());
        let created = ChatSession::sign_up(backend.clone(), "ada@example.com", "secret1", " Ada ")
            .await
            .unwrap();
        assert_eq!(created.user().display_name, "Ada");
        assert_eq!(created.user().friend_code.len(), 6);
        assert!(codes::USER_COLORS.contains(&created.user().color.as_str()));

        let again = ChatSession::sign_in(backend, "ada@example.com", "secret1").await.unwrap();
        assert_eq!(again.user_id(), created.user_id());
    }

    #[tokio::test]
    async fn sign_up_validates_before_calling_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let err = ChatSession::sign_up(backend.clone(), "ada@example.com", "123", "Ada").await.unwrap_err();
        assert!(err.is_local());
        let err = ChatSession::sign_up(backend.clone(), "nope", "secret1", "Ada").await.unwrap_err();
        assert!(err.is_local());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        ChatSession::sign_up(backend.clone(), "ada@example.com", "secret1", "Ada").await.unwrap();
        let err = ChatSession::sign_in(backend, "ada@example.com", "wrong!").await.unwrap_err();
        assert!(matches!(err, ChatError::Backend { status: 400, .. }));
    }
}
