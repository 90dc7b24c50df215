use iced::widget::{Button, Column, Container, Row, Scrollable, Space, Text, TextInput};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{self, Palette, BOLD_FONT, EMOJI_FONT};
use crate::client::gui::views::{assistant, create_group, group_settings, image_dialogs};
use crate::client::gui::widgets::message_list::{self, avatar};
use crate::client::gui::widgets::toast::toast_view;
use crate::client::models::app_state::{ChatAppState, Modal};
use crate::client::models::messages::Message;
use crate::common::models::MessageTarget;

const SIDEBAR_WIDTH: f32 = 290.0;

pub fn view(state: &ChatAppState) -> Element<'_, Message> {
    let palette = Palette::for_theme(state.theme);

    let panel: Element<Message> = match state.modal {
        Modal::None => conversation_panel(state, palette),
        Modal::CreateGroup => create_group::view(state, palette),
        Modal::GroupSettings => group_settings::view(state, palette),
        Modal::ImagePicker => image_dialogs::picker(state, palette),
        Modal::ImagePreview => image_dialogs::preview(state, palette),
        Modal::ImageViewer(id) => image_dialogs::viewer(state, id, palette),
        Modal::Assistant => assistant::view(state, palette),
        Modal::ApiKeys => assistant::api_keys(state, palette),
    };

    let main = Column::new()
        .width(Length::Fill)
        .height(Length::Fill)
        .push(Container::new(toast_view(state.toasts())).padding([8, 12, 0, 12]))
        .push(panel);

    Container::new(Row::new().push(sidebar(state, palette)).push(main))
        .width(Length::Fill)
        .height(Length::Fill)
        .style(style::filled(palette.bg_main, palette.text_primary))
        .into()
}

fn section_title<'a>(label: &'a str, palette: Palette) -> Text<'a> {
    Text::new(label).size(13).font(BOLD_FONT).style(palette.text_secondary)
}

fn sidebar(state: &ChatAppState, palette: Palette) -> Element<'_, Message> {
    let mut profile = Row::new().spacing(10).align_items(Alignment::Center);
    if let Some(me) = &state.me {
        let me_profile = crate::common::models::SenderProfile::from(me);
        profile = profile
            .push(avatar(&me_profile, 40.0, palette))
            .push(
                Column::new()
                    .spacing(2)
                    .push(Text::new(&me.display_name).font(BOLD_FONT).size(16).style(palette.text_primary))
                    .push(
                        Button::new(Text::new(format!("Code: {}", me.friend_code)).size(12).style(palette.text_secondary))
                            .padding(0)
                            .style(iced::theme::Button::Text)
                            .on_press(Message::CopyFriendCode),
                    ),
            );
    }
    let theme_icon = match state.theme {
        crate::client::utils::preferences::ThemePreference::Dark => "☀️",
        crate::client::utils::preferences::ThemePreference::Light => "🌙",
    };
    let header = Row::new()
        .align_items(Alignment::Center)
        .push(profile)
        .push(Space::with_width(Length::Fill))
        .push(
            Button::new(Text::new(theme_icon).font(EMOJI_FONT).size(16))
                .on_press(Message::ToggleTheme)
                .style(iced::theme::Button::Text)
                .padding(6),
        )
        .push(
            Button::new(Text::new("🚪").font(EMOJI_FONT).size(16))
                .on_press(Message::Logout)
                .style(iced::theme::Button::Text)
                .padding(6),
        );

    let active = state.conversation.target;

    let mut groups = Column::new().spacing(4);
    if state.groups.is_empty() {
        groups = groups.push(Text::new("No groups yet").size(13).style(palette.text_secondary));
    }
    for g in &state.groups {
        let selected = active == Some(MessageTarget::Group(g.id()));
        let dot = Container::new(Space::new(Length::Fixed(10.0), Length::Fixed(10.0)))
            .style(style::rounded(style::hex_color(&g.group.color, palette.accent), palette.text_primary, 5.0));
        let mut row = Row::new()
            .spacing(10)
            .align_items(Alignment::Center)
            .push(dot)
            .push(Text::new(&g.group.name).size(15));
        if g.user_role.is_admin() {
            row = row.push(Text::new("admin").size(11).style(palette.text_secondary));
        }
        groups = groups.push(
            Button::new(row)
                .width(Length::Fill)
                .padding([8, 10])
                .style(if selected { iced::theme::Button::Primary } else { iced::theme::Button::Text })
                .on_press(Message::SelectGroup(g.id())),
        );
    }

    let mut contacts = Column::new().spacing(4);
    for c in &state.contacts {
        let selected = active == Some(MessageTarget::Direct(c.id));
        contacts = contacts.push(
            Button::new(
                Row::new()
                    .spacing(10)
                    .align_items(Alignment::Center)
                    .push(avatar(c, 26.0, palette))
                    .push(Text::new(&c.display_name).size(15)),
            )
            .width(Length::Fill)
            .padding([6, 10])
            .style(if selected { iced::theme::Button::Primary } else { iced::theme::Button::Text })
            .on_press(Message::SelectContact(c.clone())),
        );
    }

    let friend_row = Row::new()
        .spacing(6)
        .push(
            TextInput::new("Friend code", &state.friend_code_input)
                .on_input(Message::FriendCodeChanged)
                .on_submit(Message::StartDirectChat)
                .padding(8)
                .size(13),
        )
        .push(
            Button::new(Text::new("Chat").size(13))
                .on_press(Message::StartDirectChat)
                .style(iced::theme::Button::Secondary)
                .padding([8, 10]),
        );

    let groups_header = Row::new()
        .align_items(Alignment::Center)
        .push(section_title("GROUPS", palette))
        .push(Space::with_width(Length::Fill))
        .push(
            Button::new(Text::new("+ New").size(13))
                .on_press(Message::OpenCreateGroup)
                .style(iced::theme::Button::Text)
                .padding([2, 6]),
        );

    let lists = Column::new()
        .spacing(12)
        .push(groups_header)
        .push(groups)
        .push(section_title("DIRECT MESSAGES", palette))
        .push(friend_row)
        .push(contacts);

    let assistant_btn = Button::new(
        Row::new()
            .spacing(8)
            .align_items(Alignment::Center)
            .push(Text::new("🤖").font(EMOJI_FONT).size(16))
            .push(Text::new("AI Assistant").size(15)),
    )
    .width(Length::Fill)
    .padding([10, 12])
    .style(iced::theme::Button::Secondary)
    .on_press(Message::OpenAssistant);

    let content = Column::new()
        .spacing(16)
        .padding(16)
        .height(Length::Fill)
        .push(header)
        .push(Scrollable::new(lists).height(Length::Fill))
        .push(assistant_btn);

    Container::new(content)
        .width(Length::Fixed(SIDEBAR_WIDTH))
        .height(Length::Fill)
        .style(style::filled(palette.input_bg, palette.text_primary))
        .into()
}

fn conversation_panel(state: &ChatAppState, palette: Palette) -> Element<'_, Message> {
    let Some(target) = state.conversation.target else {
        return Container::new(
            Column::new()
                .spacing(12)
                .align_items(Alignment::Center)
                .push(Text::new("💬").font(EMOJI_FONT).size(56))
                .push(Text::new("Select a group or a contact to start chatting").size(16).style(palette.text_secondary)),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x()
        .center_y()
        .into();
    };

    let title = state.active_title().unwrap_or_default();
    let subtitle = match (target, state.active_group()) {
        (MessageTarget::Group(_), Some(g)) => format!("Group · code {}", g.group.group_code),
        (MessageTarget::Group(_), None) => "Group".to_string(),
        (MessageTarget::Direct(_), _) => "Direct message".to_string(),
    };

    let mut header = Row::new()
        .spacing(12)
        .align_items(Alignment::Center)
        .push(
            Column::new()
                .spacing(2)
                .push(Text::new(title).font(BOLD_FONT).size(20).style(palette.text_primary))
                .push(Text::new(subtitle).size(12).style(palette.text_secondary)),
        )
        .push(Space::with_width(Length::Fill));
    if matches!(target, MessageTarget::Group(_)) {
        header = header.push(
            Button::new(Text::new("⚙️").font(EMOJI_FONT).size(16))
                .on_press(Message::OpenGroupSettings)
                .style(iced::theme::Button::Secondary)
                .padding(8),
        );
    }
    header = header.push(
        Button::new(Text::new("✕").size(16))
            .on_press(Message::CloseConversation)
            .style(iced::theme::Button::Secondary)
            .padding(8),
    );

    let body: Element<Message> = if state.opening {
        Container::new(Text::new("Loading messages...").size(14).style(palette.text_secondary))
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x()
            .padding(20)
            .into()
    } else {
        message_list::view(
            &state.conversation.messages,
            state.my_id(),
            &state.image_cache,
            palette,
            matches!(target, MessageTarget::Group(_)),
        )
    };

    let send_enabled = !state.message_input.trim().is_empty() && !state.sending;
    let composer = Row::new()
        .spacing(8)
        .align_items(Alignment::Center)
        .push(
            Button::new(Text::new("📎").font(EMOJI_FONT).size(16))
                .on_press(Message::OpenImagePicker)
                .style(iced::theme::Button::Secondary)
                .padding([10, 12]),
        )
        .push(
            Container::new(
                TextInput::new("Type a message...", &state.message_input)
                    .on_input(Message::MessageInputChanged)
                    .on_submit(if send_enabled { Message::SendMessage } else { Message::NoOp })
                    .padding(12)
                    .size(14)
                    .width(Length::Fill),
            )
            .width(Length::Fill)
            .style(style::input(palette)),
        )
        .push({
            let send = Button::new(Text::new("Send").size(14)).padding([12, 16]);
            if send_enabled {
                send.on_press(Message::SendMessage).style(iced::theme::Button::Primary)
            } else {
                send.style(iced::theme::Button::Secondary)
            }
        });

    Column::new()
        .width(Length::Fill)
        .height(Length::Fill)
        .push(
            Container::new(header)
                .padding([12, 16])
                .width(Length::Fill)
                .style(style::filled(palette.input_bg, palette.text_primary)),
        )
        .push(
            Container::new(body)
                .width(Length::Fill)
                .height(Length::Fill)
                .style(style::filled(palette.chat_bg, palette.text_primary)),
        )
        .push(
            Container::new(composer)
                .padding([12, 16])
                .width(Length::Fill)
                .style(style::filled(palette.input_bg, palette.text_primary)),
        )
        .into()
}
