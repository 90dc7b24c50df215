use std::collections::{HashMap, HashSet};
use std::time::Duration;

use iced::widget::image;
use iced::Command;

use crate::client::gui::widgets::toast::{Toast, ToastLevel, TOAST_DURATION_MS};
use crate::client::idle::IdleLock;
use crate::client::models::messages::{ConversationView, Message};
use crate::client::services::ai::{AiProvider, ProviderChoice};
use crate::client::services::groups::DeleteConfirmation;
use crate::client::services::images::UploadedImage;
use crate::client::utils::preferences::ThemePreference;
use crate::common::models::*;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AppState {
    #[default]
    CheckingSession,
    /// Backend configuration missing or invalid. Nothing else is shown.
    ConfigError(String),
    Login,
    Chat,
}

/// Dialog shown over the chat screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modal {
    #[default]
    None,
    CreateGroup,
    GroupSettings,
    ImagePicker,
    ImagePreview,
    ImageViewer(MessageId),
    Assistant,
    ApiKeys,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantTurn {
    pub from_user: bool,
    pub text: String,
    pub provider: Option<AiProvider>,
    pub failed: bool,
}

#[derive(Debug, Default)]
pub struct ChatAppState {
    pub app_state: AppState,
    pub modal: Modal,
    pub theme: ThemePreference,
    pub loading: bool,
    pub error_message: Option<String>,
    toasts: Vec<Toast>,
    next_toast_id: u64,

    // login
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub is_login: bool,
    pub show_password: bool,

    // sidebar
    pub me: Option<User>,
    pub groups: Vec<GroupWithRole>,
    pub contacts: Vec<SenderProfile>,
    pub friend_code_input: String,
    pub active_contact: Option<SenderProfile>,

    // conversation
    pub conversation: ConversationView,
    pub opening: bool,
    pub message_input: String,
    pub sending: bool,
    pub polling: bool,

    // create group
    pub new_group_name: String,
    pub new_group_description: String,

    // group settings
    pub members: Vec<MemberProfile>,
    pub member_code_input: String,
    pub delete_confirmation: Option<DeleteConfirmation>,
    pub leave_confirmation: Option<GroupId>,

    // images
    pub image_path_input: String,
    pub pending_upload: Option<UploadedImage>,
    pub preview: Option<image::Handle>,
    pub image_caption: String,
    pub image_cache: HashMap<String, image::Handle>,
    image_requests: HashSet<String>,
    image_bytes: HashMap<String, Vec<u8>>,

    // assistant
    pub ai_input: String,
    pub ai_choice: ProviderChoice,
    pub ai_history: Vec<AssistantTurn>,
    pub ai_pending: bool,
    pub ai_providers: Vec<AiProvider>,
    pub gemini_key_input: String,
    pub openai_key_input: String,
    pub gemini_endpoint_input: String,
    pub openai_endpoint_input: String,

    // idle lock
    pub idle: IdleLock,
    pub clock: String,
}

impl ChatAppState {
    pub fn new(theme: ThemePreference, idle_threshold: Duration) -> Self {
        Self {
            theme,
            is_login: true,
            idle: IdleLock::new(idle_threshold),
            ..Self::default()
        }
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    /// Shows a toast and schedules its removal.
    pub fn toast(&mut self, level: ToastLevel, message: impl Into<String>) -> Command<Message> {
        self.next_toast_id += 1;
        let id = self.next_toast_id;
        self.toasts.push(Toast { id, level, message: message.into() });
        Command::perform(
            async move {
                tokio::time::sleep(Duration::from_millis(TOAST_DURATION_MS)).await;
                id
            },
            Message::DismissToast,
        )
    }

    pub fn error(&mut self, message: impl Into<String>) -> Command<Message> {
        self.toast(ToastLevel::Error, message)
    }

    pub fn active_group(&self) -> Option<&GroupWithRole> {
        match self.conversation.target {
            Some(MessageTarget::Group(id)) => self.groups.iter().find(|g| g.id() == id),
            _ => None,
        }
    }

    pub fn is_admin_of_active(&self) -> bool {
        self.active_group().is_some_and(|g| g.user_role.is_admin())
    }

    pub fn active_title(&self) -> Option<String> {
        match self.conversation.target? {
            MessageTarget::Group(_) => self.active_group().map(|g| g.group.name.clone()),
            MessageTarget::Direct(id) => self
                .active_contact
                .as_ref()
                .filter(|c| c.id == id)
                .map(|c| c.display_name.clone())
                .or_else(|| Some("Direct message".to_string())),
        }
    }

    pub fn my_id(&self) -> Option<UserId> {
        self.me.as_ref().map(|u| u.id)
    }

    /// Replaces the conversation snapshot. Returns the image URLs that still
    /// have to be downloaded.
    pub fn set_conversation(&mut self, view: ConversationView) -> Vec<String> {
        if view.target != self.conversation.target && self.modal == Modal::GroupSettings {
            self.modal = Modal::None;
        }
        self.conversation = view;
        let missing: Vec<String> = self
            .conversation
            .messages
            .iter()
            .filter_map(|m| m.row.image_url.clone())
            .filter(|url| !self.image_cache.contains_key(url) && !self.image_requests.contains(url))
            .collect();
        self.image_requests.extend(missing.iter().cloned());
        missing
    }

    pub fn image_loaded(&mut self, url: String, bytes: Vec<u8>) {
        self.image_requests.remove(&url);
        self.image_cache.insert(url.clone(), image::Handle::from_memory(bytes.clone()));
        self.image_bytes.insert(url, bytes);
    }

    /// Raw bytes of a downloaded image, as fetched.
    pub fn image_bytes(&self, url: &str) -> Option<&[u8]> {
        self.image_bytes.get(url).map(Vec::as_slice)
    }

    /// Leaving asks twice. Returns true on the second click for the same
    /// group.
    pub fn confirm_leave(&mut self, group_id: GroupId) -> bool {
        if self.leave_confirmation == Some(group_id) {
            self.leave_confirmation = None;
            return true;
        }
        self.leave_confirmation = Some(group_id);
        false
    }

    pub fn viewer_message(&self, id: MessageId) -> Option<&ChatMessage> {
        self.conversation.messages.iter().find(|m| m.id() == id)
    }

    pub fn reset_image_flow(&mut self) {
        self.image_path_input.clear();
        self.pending_upload = None;
        self.preview = None;
        self.image_caption.clear();
    }

    /// Back to the login screen, dropping everything tied to the user.
    pub fn signed_out(&mut self) {
        let theme = self.theme;
        let threshold = Duration::from_secs(self.idle.threshold_secs());
        *self = Self::new(theme, threshold);
        self.app_state = AppState::Login;
    }

    /// Updates that only touch local state. Everything else is handled by
    /// the application.
    pub fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::EmailChanged(v) => self.email = v,
            Message::PasswordChanged(v) => self.password = v,
            Message::DisplayNameChanged(v) => self.display_name = v,
            Message::ToggleLoginRegister => {
                self.is_login = !self.is_login;
                self.error_message = None;
            }
            Message::ToggleShowPassword => self.show_password = !self.show_password,
            Message::MessageInputChanged(v) => self.message_input = v,
            Message::FriendCodeChanged(v) => self.friend_code_input = v,
            Message::OpenCreateGroup => {
                self.new_group_name.clear();
                self.new_group_description.clear();
                self.modal = Modal::CreateGroup;
            }
            Message::CreateGroupNameChanged(v) => self.new_group_name = v,
            Message::CreateGroupDescriptionChanged(v) => self.new_group_description = v,
            Message::CloseModal => {
                if matches!(self.modal, Modal::ImagePicker | Modal::ImagePreview) {
                    self.reset_image_flow();
                }
                self.delete_confirmation = None;
                self.leave_confirmation = None;
                self.modal = Modal::None;
            }
            Message::MemberCodeChanged(v) => self.member_code_input = v,
            Message::OpenImagePicker => {
                if self.conversation.target.is_some() {
                    self.reset_image_flow();
                    self.modal = Modal::ImagePicker;
                }
            }
            Message::ImagePathChanged(v) => self.image_path_input = v,
            Message::ImageCaptionChanged(v) => self.image_caption = v,
            Message::OpenImageViewer(id) => self.modal = Modal::ImageViewer(id),
            Message::OpenAssistant => self.modal = Modal::Assistant,
            Message::AiInputChanged(v) => self.ai_input = v,
            Message::AiProviderSelected(choice) => self.ai_choice = choice,
            Message::OpenApiKeys => {
                self.gemini_key_input.clear();
                self.openai_key_input.clear();
                self.modal = Modal::ApiKeys;
            }
            Message::GeminiKeyChanged(v) => self.gemini_key_input = v,
            Message::OpenAiKeyChanged(v) => self.openai_key_input = v,
            Message::GeminiEndpointChanged(v) => self.gemini_endpoint_input = v,
            Message::OpenAiEndpointChanged(v) => self.openai_endpoint_input = v,
            Message::IdleTick => {
                // il blocco conta solo dentro la chat
                if self.app_state == AppState::Chat {
                    self.idle.tick();
                }
                self.clock = chrono::Local::now().format("%H:%M:%S").to_string();
            }
            Message::UserActivity => self.idle.activity(),
            Message::Unlock => self.idle.unlock(),
            Message::DismissToast(id) => self.toasts.retain(|t| t.id != id),
            _ => {}
        }
        Command::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn image_message(url: &str) -> ChatMessage {
        let sender = Uuid::new_v4();
        ChatMessage {
            row: MessageRow {
                id: Uuid::new_v4(),
                sender_id: sender,
                receiver_id: None,
                group_id: Some(Uuid::new_v4()),
                message_type: MessageType::Image,
                content: None,
                image_url: Some(url.to_string()),
                created_at: Utc::now(),
            },
            sender: SenderProfile { id: sender, display_name: "A".into(), avatar_url: None, color: "#000".into() },
        }
    }

    #[test]
    fn image_urls_are_requested_once() {
        let mut state = ChatAppState::new(ThemePreference::Dark, Duration::from_secs(300));
        let view = ConversationView { target: None, messages: vec![image_message("u1")] };
        assert_eq!(state.set_conversation(view.clone()), vec!["u1".to_string()]);
        assert!(state.set_conversation(view.clone()).is_empty());
        state.image_loaded("u1".into(), vec![1, 2, 3]);
        assert!(state.set_conversation(view).is_empty());
    }

    #[test]
    fn idle_time_only_counts_in_chat() {
        let mut state = ChatAppState::new(ThemePreference::Dark, Duration::from_secs(2));
        state.app_state = AppState::Login;
        for _ in 0..5 {
            state.update(Message::IdleTick);
        }
        assert!(!state.idle.is_locked());
        assert_eq!(state.idle.idle_secs(), 0);

        state.app_state = AppState::Chat;
        state.update(Message::IdleTick);
        state.update(Message::IdleTick);
        assert!(state.idle.is_locked());
    }

    #[test]
    fn leaving_needs_a_second_click() {
        let mut state = ChatAppState::new(ThemePreference::Dark, Duration::from_secs(300));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(!state.confirm_leave(a));
        assert!(!state.confirm_leave(b));
        assert!(state.confirm_leave(b));
        assert_eq!(state.leave_confirmation, None);

        assert!(!state.confirm_leave(a));
        state.update(Message::CloseModal);
        assert!(!state.confirm_leave(a));
    }

    #[test]
    fn downloaded_bytes_are_kept_for_saving() {
        let mut state = ChatAppState::new(ThemePreference::Dark, Duration::from_secs(300));
        assert!(state.image_bytes("u1").is_none());
        state.image_loaded("u1".into(), vec![1, 2, 3]);
        assert_eq!(state.image_bytes("u1"), Some(&[1u8, 2, 3][..]));
        assert!(state.image_cache.contains_key("u1"));
    }

    #[test]
    fn sign_out_keeps_theme_only() {
        let mut state = ChatAppState::new(ThemePreference::Light, Duration::from_secs(60));
        state.message_input = "draft".into();
        state.app_state = AppState::Chat;
        state.signed_out();
        assert_eq!(state.app_state, AppState::Login);
        assert_eq!(state.theme, ThemePreference::Light);
        assert!(state.message_input.is_empty());
        assert!(state.is_login);
    }
}
