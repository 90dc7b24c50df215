use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use iced::widget::{image, scrollable, Text};
use iced::{event, keyboard, mouse, window, Application, Command, Element, Event, Subscription, Theme};
use tokio::sync::Mutex;

use crate::client::backend::{Backend, RestBackend};
use crate::client::config::{BackendConfig, ClientConfig};
use crate::client::gui::views;
use crate::client::gui::widgets::message_list;
use crate::client::gui::widgets::toast::ToastLevel;
use crate::client::models::app_state::{AppState, AssistantTurn, ChatAppState, Modal};
use crate::client::models::messages::{ConversationView, Message};
use crate::client::services::ai::{AiProvider, AiService, ChatTurn};
use crate::client::services::conversation::{self, Conversation, SharedConversation};
use crate::client::services::groups::{self, DeleteConfirmation, GroupDirectory};
use crate::client::services::images::{self, ImageFile};
use crate::client::services::friends;
use crate::client::session::ChatSession;
use crate::client::utils::{preferences, session_store};
use crate::common::models::MessageTarget;

const REALTIME_POLL_MS: u64 = 200;

/// Start-up input: the backend settings (or why they are unusable) and the
/// local client settings.
pub type Flags = (Result<BackendConfig, String>, ClientConfig);

pub struct ChatApp {
    pub state: ChatAppState,
    config: ClientConfig,
    backend: Option<Arc<dyn Backend>>,
    session: Option<ChatSession>,
    conversation: SharedConversation,
    directory: Arc<Mutex<GroupDirectory>>,
    ai: Arc<Mutex<AiService>>,
    http: reqwest::Client,
}

async fn snapshot(conv: &SharedConversation) -> ConversationView {
    let guard = conv.lock().await;
    ConversationView {
        target: guard.target(),
        messages: guard.messages().to_vec(),
    }
}

/// Runs `fut` and maps its error to the display string carried by messages.
fn perform<T, F>(fut: F, map: impl Fn(Result<T, String>) -> Message + Send + 'static) -> Command<Message>
where
    T: Send + 'static,
    F: Future<Output = crate::common::error::ChatResult<T>> + Send + 'static,
{
    Command::perform(async move { fut.await.map_err(|e| e.to_string()) }, map)
}

fn activity(event: Event, _status: event::Status) -> Option<Message> {
    match event {
        Event::Mouse(mouse::Event::CursorMoved { .. })
        | Event::Mouse(mouse::Event::ButtonPressed(_))
        | Event::Mouse(mouse::Event::WheelScrolled { .. })
        | Event::Keyboard(keyboard::Event::KeyPressed { .. })
        | Event::Touch(_)
        | Event::Window(_, window::Event::Focused) => Some(Message::UserActivity),
        _ => None,
    }
}

impl ChatApp {
    fn data_dir(&self) -> PathBuf {
        self.config.data_dir.clone()
    }

    fn after_sign_in(&mut self, session: ChatSession) -> Command<Message> {
        log::info!("[APP] signed in as {}", session.user_id());
        if let Some(auth) = session.auth() {
            if let Err(e) = session_store::save_session(&self.config.data_dir, auth) {
                log::warn!("[APP] session not persisted: {}", e);
            }
        }
        self.state.loading = false;
        self.state.error_message = None;
        self.state.password.clear();
        self.state.me = Some(session.user().clone());
        self.state.app_state = AppState::Chat;
        self.state.idle.unlock();
        self.session = Some(session.clone());

        let ai = self.ai.clone();
        let load_keys = perform(
            async move {
                let mut ai = ai.lock().await;
                ai.load(&session).await?;
                Ok(ai.available_providers())
            },
            Message::CredentialsLoaded,
        );
        Command::batch([self.refresh_sidebar(), load_keys])
    }

    fn refresh_sidebar(&self) -> Command<Message> {
        let Some(session) = self.session.clone() else {
            return Command::none();
        };
        let directory = self.directory.clone();
        let groups_session = session.clone();
        let groups = perform(
            async move {
                let groups = groups::load_groups(&groups_session).await?;
                *directory.lock().await = GroupDirectory::new(groups.clone());
                Ok(groups)
            },
            Message::GroupsLoaded,
        );
        let contacts = perform(async move { friends::recent_contacts(&session).await }, Message::ContactsLoaded);
        Command::batch([groups, contacts])
    }

    fn load_members(&self) -> Command<Message> {
        let (Some(session), Some(group_id)) = (self.session.clone(), self.state.active_group().map(|g| g.id())) else {
            return Command::none();
        };
        Command::perform(
            async move { groups::group_members(&session, group_id).await.map_err(|e| e.to_string()) },
            move |res| Message::MembersLoaded(group_id, res),
        )
    }

    /// Installs a new snapshot, downloads images it references and keeps
    /// the list scrolled to the newest message.
    fn show_conversation(&mut self, view: ConversationView) -> Command<Message> {
        let grew = view.target == self.state.conversation.target
            && view.messages.len() > self.state.conversation.messages.len();
        let switched = view.target != self.state.conversation.target;
        let missing = self.state.set_conversation(view);
        let mut commands: Vec<Command<Message>> = missing.into_iter().map(|url| self.fetch_image(url)).collect();
        if grew || switched {
            commands.push(scrollable::snap_to(message_list::scroll_id(), scrollable::RelativeOffset::END));
        }
        Command::batch(commands)
    }

    fn fetch_image(&self, url: String) -> Command<Message> {
        let http = self.http.clone();
        let key = url.clone();
        Command::perform(
            async move {
                let resp = http.get(&url).send().await.map_err(|e| e.to_string())?;
                if !resp.status().is_success() {
                    return Err(format!("HTTP {}", resp.status()));
                }
                resp.bytes().await.map(|b| b.to_vec()).map_err(|e| e.to_string())
            },
            move |res| Message::ImageFetched(key.clone(), res),
        )
    }

    fn open(&mut self, target: MessageTarget) -> Command<Message> {
        let Some(session) = self.session.clone() else {
            return Command::none();
        };
        self.state.opening = true;
        self.state.modal = Modal::None;
        self.state.message_input.clear();
        let conv = self.conversation.clone();
        perform(
            async move {
                match target {
                    MessageTarget::Group(id) => conversation::open_group(&conv, &session, id).await?,
                    MessageTarget::Direct(id) => conversation::open_direct(&conv, &session, id).await?,
                }
                Ok(snapshot(&conv).await)
            },
            Message::ConversationOpened,
        )
    }
}

impl Application for ChatApp {
    type Message = Message;
    type Theme = Theme;
    type Executor = iced::executor::Default;
    type Flags = Flags;

    fn new((backend_config, config): Flags) -> (Self, Command<Message>) {
        let theme = preferences::load_theme(&config.data_dir);
        let mut state = ChatAppState::new(theme, config.idle_threshold);

        let backend: Result<Arc<dyn Backend>, String> = backend_config.and_then(|cfg| {
            RestBackend::new(cfg)
                .map(|b| Arc::new(b) as Arc<dyn Backend>)
                .map_err(|e| e.to_string())
        });

        let mut app = ChatApp {
            state: ChatAppState::default(),
            ai: Arc::new(Mutex::new(AiService::new(&config))),
            config,
            backend: None,
            session: None,
            conversation: Conversation::shared(),
            directory: Arc::new(Mutex::new(GroupDirectory::default())),
            http: reqwest::Client::new(),
        };

        let cmd = match backend {
            Err(reason) => {
                log::error!("[APP] configuration error: {}", reason);
                state.app_state = AppState::ConfigError(reason);
                Command::none()
            }
            Ok(backend) => {
                app.backend = Some(backend.clone());
                match session_store::load_session(&app.config.data_dir) {
                    Some(auth) => {
                        log::info!("[APP_START] found saved session (redacted)");
                        Command::perform(
                            async move { ChatSession::restore(backend, auth).await.map_err(|e| e.to_string()) },
                            Message::SessionRestored,
                        )
                    }
                    None => Command::perform(async {}, |_| Message::SessionMissing),
                }
            }
        };
        app.state = state;
        (app, cmd)
    }

    fn title(&self) -> String {
        "Quick Chat".to_string()
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::SessionRestored(Ok(session)) => self.after_sign_in(session),
            Message::SessionRestored(Err(e)) => {
                log::warn!("[APP] saved session rejected: {}", e);
                if let Err(e) = session_store::clear_session(&self.config.data_dir) {
                    log::warn!("[APP] could not clear stored session: {}", e);
                }
                self.state.app_state = AppState::Login;
                Command::none()
            }
            Message::SessionMissing => {
                self.state.app_state = AppState::Login;
                Command::none()
            }
            Message::SubmitAuth => {
                let Some(backend) = self.backend.clone() else {
                    return Command::none();
                };
                let email = self.state.email.trim().to_string();
                let password = self.state.password.clone();
                let display_name = self.state.display_name.trim().to_string();
                let is_login = self.state.is_login;
                self.state.loading = true;
                self.state.error_message = None;
                perform(
                    async move {
                        if is_login {
                            ChatSession::sign_in(backend, &email, &password).await
                        } else {
                            ChatSession::sign_up(backend, &email, &password, &display_name).await
                        }
                    },
                    Message::AuthResult,
                )
            }
            Message::AuthResult(Ok(session)) => {
                let welcome = format!("Welcome, {}!", session.user().display_name);
                let cmd = self.after_sign_in(session);
                Command::batch([cmd, self.state.toast(ToastLevel::Success, welcome)])
            }
            Message::AuthResult(Err(e)) => {
                self.state.loading = false;
                self.state.error_message = Some(e.clone());
                self.state.error(e)
            }
            Message::Logout => {
                let Some(session) = self.session.take() else {
                    return Command::none();
                };
                let conv = self.conversation.clone();
                let data_dir = self.data_dir();
                Command::perform(
                    async move {
                        conversation::close(&conv).await;
                        if let Err(e) = session.sign_out().await {
                            log::warn!("[APP] sign out failed: {}", e);
                        }
                        if let Err(e) = session_store::clear_session(&data_dir) {
                            log::warn!("[APP] could not clear stored session: {}", e);
                        }
                    },
                    |_| Message::LogoutCompleted,
                )
            }
            Message::LogoutCompleted => {
                self.state.signed_out();
                self.conversation = Conversation::shared();
                self.directory = Arc::new(Mutex::new(GroupDirectory::default()));
                self.ai = Arc::new(Mutex::new(AiService::new(&self.config)));
                self.state.toast(ToastLevel::Info, "Signed out")
            }

            Message::RefreshSidebar => self.refresh_sidebar(),
            Message::GroupsLoaded(Ok(groups)) => {
                self.state.groups = groups;
                Command::none()
            }
            Message::ContactsLoaded(Ok(contacts)) => {
                self.state.contacts = contacts;
                Command::none()
            }
            Message::GroupsLoaded(Err(e)) | Message::ContactsLoaded(Err(e)) => self.state.error(e),
            Message::SelectGroup(group_id) => {
                self.state.active_contact = None;
                self.open(MessageTarget::Group(group_id))
            }
            Message::SelectContact(contact) => {
                let target = MessageTarget::Direct(contact.id);
                self.state.active_contact = Some(contact);
                self.open(target)
            }
            Message::ConversationOpened(res) => {
                self.state.opening = false;
                match res {
                    Ok(view) => self.show_conversation(view),
                    Err(e) => self.state.error(e),
                }
            }
            Message::ConversationUpdated(view) => self.show_conversation(view),
            Message::CloseConversation => {
                self.state.active_contact = None;
                let conv = self.conversation.clone();
                Command::perform(
                    async move {
                        conversation::close(&conv).await;
                        snapshot(&conv).await
                    },
                    Message::ConversationUpdated,
                )
            }

            Message::SendMessage => {
                let Some(session) = self.session.clone() else {
                    return Command::none();
                };
                let text = self.state.message_input.trim().to_string();
                if text.is_empty() || self.state.sending {
                    return Command::none();
                }
                self.state.sending = true;
                let conv = self.conversation.clone();
                perform(
                    async move {
                        conversation::send_text(&conv, &session, &text).await?;
                        Ok(snapshot(&conv).await)
                    },
                    Message::MessageSent,
                )
            }
            Message::MessageSent(res) => {
                self.state.sending = false;
                match res {
                    Ok(view) => {
                        let direct = matches!(view.target, Some(MessageTarget::Direct(_)));
                        self.state.message_input.clear();
                        self.state.reset_image_flow();
                        if matches!(self.state.modal, Modal::ImagePreview) {
                            self.state.modal = Modal::None;
                        }
                        let cmd = self.show_conversation(view);
                        if direct {
                            Command::batch([cmd, self.refresh_sidebar()])
                        } else {
                            cmd
                        }
                    }
                    Err(e) => self.state.error(e),
                }
            }
            Message::PollRealtime => {
                let Some(session) = self.session.clone() else {
                    return Command::none();
                };
                // one drain at a time, ticks that overlap are skipped
                if self.state.polling {
                    return Command::none();
                }
                self.state.polling = true;
                let conv = self.conversation.clone();
                perform(
                    async move {
                        Ok(match conversation::poll(&conv, &session).await? {
                            0 => None,
                            _ => Some(snapshot(&conv).await),
                        })
                    },
                    Message::RealtimePolled,
                )
            }
            Message::RealtimePolled(res) => {
                self.state.polling = false;
                match res {
                    Ok(Some(view)) => self.show_conversation(view),
                    Ok(None) => Command::none(),
                    Err(e) => {
                        log::warn!("[APP] realtime delivery failed: {}", e);
                        Command::none()
                    }
                }
            }

            Message::StartDirectChat => {
                let Some(session) = self.session.clone() else {
                    return Command::none();
                };
                let code = self.state.friend_code_input.clone();
                self.state.opening = true;
                self.state.modal = Modal::None;
                let conv = self.conversation.clone();
                perform(
                    async move {
                        let friend = friends::start_chat(&conv, &session, &code).await?;
                        Ok((friend, snapshot(&conv).await))
                    },
                    Message::DirectChatStarted,
                )
            }
            Message::DirectChatStarted(res) => {
                self.state.opening = false;
                match res {
                    Ok((friend, view)) => {
                        self.state.friend_code_input.clear();
                        if !self.state.contacts.iter().any(|c| c.id == friend.id) {
                            self.state.contacts.insert(0, friend.clone());
                        }
                        self.state.active_contact = Some(friend);
                        self.show_conversation(view)
                    }
                    Err(e) => self.state.error(e),
                }
            }
            Message::CopyFriendCode => match &self.state.me {
                Some(me) => {
                    let code = me.friend_code.clone();
                    Command::batch([
                        iced::clipboard::write(code),
                        self.state.toast(ToastLevel::Success, "Friend code copied"),
                    ])
                }
                None => Command::none(),
            },

            Message::CreateGroupSubmit => {
                let Some(session) = self.session.clone() else {
                    return Command::none();
                };
                let name = self.state.new_group_name.clone();
                let description = self.state.new_group_description.clone();
                self.state.loading = true;
                let directory = self.directory.clone();
                perform(
                    async move {
                        let group = groups::create_group(&session, &name, &description).await?;
                        directory.lock().await.insert(group.clone());
                        Ok(group)
                    },
                    Message::GroupCreated,
                )
            }
            Message::GroupCreated(res) => {
                self.state.loading = false;
                match res {
                    Ok(group) => {
                        let id = group.id();
                        let toast = self
                            .state
                            .toast(ToastLevel::Success, format!("Group \"{}\" created", group.group.name));
                        self.state.groups.retain(|g| g.id() != id);
                        self.state.groups.insert(0, group);
                        Command::batch([toast, self.open(MessageTarget::Group(id))])
                    }
                    Err(e) => self.state.error(e),
                }
            }

            Message::OpenGroupSettings => {
                if self.state.active_group().is_none() {
                    return Command::none();
                }
                self.state.members.clear();
                self.state.member_code_input.clear();
                self.state.delete_confirmation = None;
                self.state.leave_confirmation = None;
                self.state.modal = Modal::GroupSettings;
                self.load_members()
            }
            Message::MembersLoaded(group_id, res) => {
                if self.state.active_group().map(|g| g.id()) != Some(group_id) {
                    return Command::none();
                }
                match res {
                    Ok(members) => {
                        self.state.members = members;
                        Command::none()
                    }
                    Err(e) => self.state.error(e),
                }
            }
            Message::AddMember => {
                let (Some(session), Some(group_id)) = (self.session.clone(), self.state.active_group().map(|g| g.id())) else {
                    return Command::none();
                };
                let code = self.state.member_code_input.clone();
                perform(
                    async move { groups::add_member_by_code(&session, group_id, &code).await },
                    Message::MemberAdded,
                )
            }
            Message::MemberAdded(res) => match res {
                Ok(profile) => {
                    self.state.member_code_input.clear();
                    let toast = self
                        .state
                        .toast(ToastLevel::Success, format!("{} added to the group", profile.display_name));
                    Command::batch([toast, self.load_members()])
                }
                Err(e) => self.state.error(e),
            },
            Message::RemoveMember(user_id) => {
                let (Some(session), Some(group_id)) = (self.session.clone(), self.state.active_group().map(|g| g.id())) else {
                    return Command::none();
                };
                let conv = self.conversation.clone();
                let directory = self.directory.clone();
                perform(
                    async move {
                        let mut dir = directory.lock().await;
                        groups::remove_member(&conv, &session, &mut dir, group_id, user_id).await?;
                        drop(dir);
                        Ok(snapshot(&conv).await)
                    },
                    Message::MembershipChanged,
                )
            }
            Message::LeaveGroup => {
                let (Some(session), Some(group_id)) = (self.session.clone(), self.state.active_group().map(|g| g.id())) else {
                    return Command::none();
                };
                if !self.state.confirm_leave(group_id) {
                    return Command::none();
                }
                let conv = self.conversation.clone();
                let directory = self.directory.clone();
                perform(
                    async move {
                        let mut dir = directory.lock().await;
                        groups::leave_group(&conv, &session, &mut dir, group_id).await?;
                        drop(dir);
                        Ok(snapshot(&conv).await)
                    },
                    Message::MembershipChanged,
                )
            }
            Message::MembershipChanged(res) => match res {
                Ok(view) => {
                    let still_member = view.target.is_some();
                    let cmd = self.show_conversation(view);
                    let mut commands = vec![cmd, self.refresh_sidebar()];
                    if still_member && self.state.modal == Modal::GroupSettings {
                        commands.push(self.load_members());
                    } else if !still_member {
                        commands.push(self.state.toast(ToastLevel::Info, "You are no longer in this group"));
                    }
                    Command::batch(commands)
                }
                Err(e) => self.state.error(e),
            },
            Message::DeleteGroup => {
                let (Some(session), Some(group_id)) = (self.session.clone(), self.state.active_group().map(|g| g.id())) else {
                    return Command::none();
                };
                if !self.state.is_admin_of_active() {
                    return self.state.error("Only admins can delete the group");
                }
                let mut confirmation = match self.state.delete_confirmation {
                    Some(c) if c.group_id() == group_id => c,
                    _ => DeleteConfirmation::new(group_id),
                };
                if !confirmation.confirm() {
                    self.state.delete_confirmation = Some(confirmation);
                    return Command::none();
                }
                self.state.delete_confirmation = None;
                let conv = self.conversation.clone();
                let directory = self.directory.clone();
                perform(
                    async move {
                        let mut dir = directory.lock().await;
                        groups::delete_group(&conv, &session, &mut dir, &confirmation).await?;
                        drop(dir);
                        Ok(snapshot(&conv).await)
                    },
                    Message::GroupDeleted,
                )
            }
            Message::GroupDeleted(res) => match res {
                Ok(view) => {
                    self.state.modal = Modal::None;
                    let cmd = self.show_conversation(view);
                    Command::batch([cmd, self.refresh_sidebar(), self.state.toast(ToastLevel::Warning, "Group deleted")])
                }
                Err(e) => self.state.error(e),
            },
            Message::CopyGroupCode => match self.state.active_group() {
                Some(group) => {
                    let code = group.group.group_code.clone();
                    Command::batch([
                        iced::clipboard::write(code),
                        self.state.toast(ToastLevel::Success, "Group code copied"),
                    ])
                }
                None => Command::none(),
            },

            Message::UploadImage => {
                let Some(session) = self.session.clone() else {
                    return Command::none();
                };
                let path = PathBuf::from(self.state.image_path_input.trim());
                self.state.loading = true;
                perform(
                    async move {
                        let file = ImageFile::from_path(&path).await?;
                        let bytes = file.bytes.clone();
                        let uploaded = images::upload_image(&session, Some(file)).await?;
                        Ok((uploaded, bytes))
                    },
                    Message::ImageUploaded,
                )
            }
            Message::ImageUploaded(res) => {
                self.state.loading = false;
                match res {
                    Ok((uploaded, bytes)) => {
                        // anteprima locale, l'URL pubblico si scarica solo dopo l'invio
                        self.state.preview = Some(image::Handle::from_memory(bytes));
                        self.state.pending_upload = Some(uploaded);
                        self.state.image_caption.clear();
                        self.state.modal = Modal::ImagePreview;
                        Command::none()
                    }
                    Err(e) => self.state.error(e),
                }
            }
            Message::SendImage => {
                let (Some(session), Some(uploaded)) = (self.session.clone(), self.state.pending_upload.clone()) else {
                    return Command::none();
                };
                if self.state.sending {
                    return Command::none();
                }
                self.state.sending = true;
                let caption = self.state.image_caption.clone();
                let conv = self.conversation.clone();
                perform(
                    async move {
                        images::send_image_message(&conv, &session, &uploaded, &caption).await?;
                        Ok(snapshot(&conv).await)
                    },
                    Message::MessageSent,
                )
            }
            Message::ImageFetched(url, Ok(bytes)) => {
                self.state.image_loaded(url, bytes);
                Command::none()
            }
            Message::DownloadImage(url) => {
                let Some(bytes) = self.state.image_bytes(&url).map(<[u8]>::to_vec) else {
                    return self.state.error("Image is still loading");
                };
                let dir = self.data_dir();
                perform(
                    async move { images::save_image(&dir, &bytes).await },
                    Message::ImageSaved,
                )
            }
            Message::ImageSaved(Ok(path)) => {
                self.state.toast(ToastLevel::Success, format!("Image saved to {}", path.display()))
            }
            Message::ImageSaved(Err(e)) => self.state.error(e),
            Message::ImageFetched(url, Err(e)) => {
                log::warn!("[APP] image {} not loaded: {}", url, e);
                Command::none()
            }

            Message::SendAiMessage => {
                let text = self.state.ai_input.trim().to_string();
                if text.is_empty() || self.state.ai_pending {
                    return Command::none();
                }
                let history: Vec<ChatTurn> = self
                    .state
                    .ai_history
                    .iter()
                    .filter(|t| !t.failed)
                    .map(|t| if t.from_user { ChatTurn::user(&t.text) } else { ChatTurn::assistant(&t.text) })
                    .collect();
                self.state.ai_history.push(AssistantTurn { from_user: true, text: text.clone(), provider: None, failed: false });
                self.state.ai_input.clear();
                self.state.ai_pending = true;
                let choice = self.state.ai_choice;
                let ai = self.ai.clone();
                perform(
                    async move {
                        // the service lock is released before the HTTP call
                        let request = ai.lock().await.prepare(&text, choice)?;
                        Ok(request.send(&history).await)
                    },
                    Message::AiReplied,
                )
            }
            Message::AiReplied(res) => {
                self.state.ai_pending = false;
                let turn = match res {
                    Ok(reply) => AssistantTurn {
                        from_user: false,
                        text: reply.text().to_string(),
                        provider: Some(reply.provider),
                        failed: !reply.is_success(),
                    },
                    Err(e) => AssistantTurn { from_user: false, text: e, provider: None, failed: true },
                };
                self.state.ai_history.push(turn);
                Command::none()
            }
            Message::OpenApiKeys => {
                let cmd = self.state.update(Message::OpenApiKeys);
                if let Ok(ai) = self.ai.try_lock() {
                    self.state.gemini_key_input = ai.key(AiProvider::Gemini).unwrap_or_default().to_string();
                    self.state.openai_key_input = ai.key(AiProvider::ChatGpt).unwrap_or_default().to_string();
                    self.state.gemini_endpoint_input = ai.endpoint(AiProvider::Gemini).unwrap_or_default().to_string();
                    self.state.openai_endpoint_input = ai.endpoint(AiProvider::ChatGpt).unwrap_or_default().to_string();
                }
                cmd
            }
            Message::SaveApiKeys => {
                let Some(session) = self.session.clone() else {
                    return Command::none();
                };
                let keys = [self.state.gemini_key_input.clone(), self.state.openai_key_input.clone()];
                let endpoints = [self.state.gemini_endpoint_input.clone(), self.state.openai_endpoint_input.clone()];
                self.state.loading = true;
                let ai = self.ai.clone();
                perform(
                    async move {
                        let mut ai = ai.lock().await;
                        ai.save(
                            &session,
                            [Some(keys[0].as_str()), Some(keys[1].as_str())],
                            [Some(endpoints[0].as_str()), Some(endpoints[1].as_str())],
                        )
                        .await?;
                        Ok(ai.available_providers())
                    },
                    Message::ApiKeysSaved,
                )
            }
            Message::ApiKeysSaved(res) => {
                self.state.loading = false;
                match res {
                    Ok(providers) => {
                        self.state.ai_providers = providers;
                        self.state.gemini_key_input.clear();
                        self.state.openai_key_input.clear();
                        self.state.modal = Modal::Assistant;
                        self.state.toast(ToastLevel::Success, "API keys saved")
                    }
                    Err(e) => self.state.error(e),
                }
            }
            Message::CredentialsLoaded(res) => match res {
                Ok(providers) => {
                    self.state.ai_providers = providers;
                    Command::none()
                }
                Err(e) => {
                    log::warn!("[APP] credentials not loaded: {}", e);
                    Command::none()
                }
            },

            Message::ToggleTheme => {
                self.state.theme = self.state.theme.toggled();
                if let Err(e) = preferences::save_theme(&self.config.data_dir, self.state.theme) {
                    log::warn!("[APP] theme preference not saved: {}", e);
                }
                Command::none()
            }

            other => self.state.update(other),
        }
    }

    fn view(&self) -> Element<Message> {
        if self.state.idle.is_locked() && self.state.app_state == AppState::Chat {
            return views::screensaver::view(&self.state);
        }
        match &self.state.app_state {
            AppState::CheckingSession => Text::new("Checking session...").into(),
            AppState::ConfigError(reason) => views::config_error::view(reason, self.state.theme),
            AppState::Login => views::login::view(&self.state),
            AppState::Chat => views::chat::view(&self.state),
        }
    }

    fn theme(&self) -> Theme {
        self.state.theme.theme()
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subs = vec![
            iced::time::every(Duration::from_secs(1)).map(|_| Message::IdleTick),
            event::listen_with(activity),
        ];
        if self.state.app_state == AppState::Chat && self.state.conversation.target.is_some() {
            subs.push(iced::time::every(Duration::from_millis(REALTIME_POLL_MS)).map(|_| Message::PollRealtime));
        }
        Subscription::batch(subs)
    }
}
