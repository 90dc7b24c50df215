use crate::client::services::ai::{AiProvider, AiReply, ProviderChoice};
use crate::client::services::images::UploadedImage;
use crate::client::session::ChatSession;
use crate::common::models::*;

/// Snapshot of the shared conversation, taken after every change so the
/// view never has to lock it.
#[derive(Debug, Clone, Default)]
pub struct ConversationView {
    pub target: Option<MessageTarget>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub enum Message {
    NoOp,
    // Sessione e autenticazione
    SessionRestored(Result<ChatSession, String>),
    SessionMissing,
    EmailChanged(String),
    PasswordChanged(String),
    DisplayNameChanged(String),
    ToggleLoginRegister,
    ToggleShowPassword,
    SubmitAuth,
    AuthResult(Result<ChatSession, String>),
    Logout,
    LogoutCompleted,
    // Sidebar
    RefreshSidebar,
    GroupsLoaded(Result<Vec<GroupWithRole>, String>),
    ContactsLoaded(Result<Vec<SenderProfile>, String>),
    SelectGroup(GroupId),
    SelectContact(SenderProfile),
    ConversationOpened(Result<ConversationView, String>),
    ConversationUpdated(ConversationView),
    CloseConversation,
    // Composer
    MessageInputChanged(String),
    SendMessage,
    MessageSent(Result<ConversationView, String>),
    PollRealtime,
    RealtimePolled(Result<Option<ConversationView>, String>),
    // Direct messages
    FriendCodeChanged(String),
    StartDirectChat,
    DirectChatStarted(Result<(SenderProfile, ConversationView), String>),
    CopyFriendCode,
    // Group creation
    OpenCreateGroup,
    CreateGroupNameChanged(String),
    CreateGroupDescriptionChanged(String),
    CreateGroupSubmit,
    GroupCreated(Result<GroupWithRole, String>),
    CloseModal,
    // Group settings
    OpenGroupSettings,
    MembersLoaded(GroupId, Result<Vec<MemberProfile>, String>),
    MemberCodeChanged(String),
    AddMember,
    MemberAdded(Result<SenderProfile, String>),
    RemoveMember(UserId),
    LeaveGroup,
    MembershipChanged(Result<ConversationView, String>),
    DeleteGroup,
    GroupDeleted(Result<ConversationView, String>),
    CopyGroupCode,
    // Images
    OpenImagePicker,
    ImagePathChanged(String),
    UploadImage,
    ImageUploaded(Result<(UploadedImage, Vec<u8>), String>),
    ImageCaptionChanged(String),
    SendImage,
    ImageFetched(String, Result<Vec<u8>, String>),
    OpenImageViewer(MessageId),
    DownloadImage(String),
    ImageSaved(Result<std::path::PathBuf, String>),
    // AI assistant
    OpenAssistant,
    AiInputChanged(String),
    AiProviderSelected(ProviderChoice),
    SendAiMessage,
    AiReplied(Result<AiReply, String>),
    OpenApiKeys,
    GeminiKeyChanged(String),
    OpenAiKeyChanged(String),
    GeminiEndpointChanged(String),
    OpenAiEndpointChanged(String),
    SaveApiKeys,
    ApiKeysSaved(Result<Vec<AiProvider>, String>),
    CredentialsLoaded(Result<Vec<AiProvider>, String>),
    // Idle lock, theme, notifications
    IdleTick,
    UserActivity,
    Unlock,
    ToggleTheme,
    DismissToast(u64),
}
