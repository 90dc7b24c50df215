use iced::widget::{Button, Column, Container, Row, Space, Text, TextInput};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{self, Palette, BOLD_FONT, EMOJI_FONT};
use crate::client::gui::widgets::toast::toast_view;
use crate::client::models::app_state::ChatAppState;
use crate::client::models::messages::Message;

fn tab<'a>(label: &'a str, active: bool, palette: Palette) -> Button<'a, Message> {
    let text = Text::new(label).size(16).horizontal_alignment(iced::alignment::Horizontal::Center);
    let text = if active {
        text.font(BOLD_FONT).style(palette.text_primary)
    } else {
        text.style(palette.text_secondary)
    };
    let button = Button::new(Container::new(text).width(Length::Fill).center_x())
        .width(Length::Fill)
        .padding([12, 16]);
    if active {
        button.style(iced::theme::Button::Primary)
    } else {
        button.on_press(Message::ToggleLoginRegister).style(iced::theme::Button::Secondary)
    }
}

fn field<'a>(
    icon: &'a str,
    label: &'a str,
    input: impl Into<Element<'a, Message>>,
    palette: Palette,
) -> Column<'a, Message> {
    Column::new()
        .spacing(8)
        .push(
            Row::new()
                .spacing(8)
                .align_items(Alignment::Center)
                .push(Text::new(icon).font(EMOJI_FONT).size(16).style(palette.text_secondary))
                .push(Text::new(label).size(14).style(palette.text_secondary)),
        )
        .push(Container::new(input).style(style::input(palette)))
}

pub fn view(state: &ChatAppState) -> Element<'_, Message> {
    let palette = Palette::for_theme(state.theme);
    let is_login = state.is_login;

    let email_valid = state.email.contains('@');
    let password_valid = state.password.len() >= 6;
    let name_valid = is_login || !state.display_name.trim().is_empty();
    let submit_enabled = email_valid && password_valid && name_valid && !state.loading;
    let on_submit = if submit_enabled { Message::SubmitAuth } else { Message::NoOp };

    let title = Text::new("Quick Chat")
        .size(42)
        .font(BOLD_FONT)
        .style(palette.text_primary)
        .horizontal_alignment(iced::alignment::Horizontal::Center);
    let subtitle = Text::new("Messages, groups and an AI assistant")
        .size(16)
        .style(palette.text_secondary);

    let tabs = Row::new()
        .spacing(2)
        .push(tab("Sign In", is_login, palette))
        .push(tab("Sign Up", !is_login, palette));

    let mut form = Column::new().spacing(16);
    if !is_login {
        form = form.push(field(
            "👤",
            "Display name",
            TextInput::new("How others will see you", &state.display_name)
                .on_input(Message::DisplayNameChanged)
                .on_submit(on_submit.clone())
                .padding(12)
                .size(14),
            palette,
        ));
    }
    form = form
        .push(field(
            "✉️",
            "Email",
            TextInput::new("you@example.com", &state.email)
                .on_input(Message::EmailChanged)
                .on_submit(on_submit.clone())
                .padding(12)
                .size(14),
            palette,
        ))
        .push(field(
            "🔒",
            "Password",
            Row::new()
                .align_items(Alignment::Center)
                .push(
                    TextInput::new("At least 6 characters", &state.password)
                        .on_input(Message::PasswordChanged)
                        .on_submit(on_submit)
                        .secure(!state.show_password)
                        .width(Length::Fill)
                        .padding(12)
                        .size(14),
                )
                .push(
                    Button::new(Text::new(if state.show_password { "🙈" } else { "👁️" }).font(EMOJI_FONT).size(16))
                        .on_press(Message::ToggleShowPassword)
                        .style(iced::theme::Button::Text)
                        .padding([8, 12]),
                ),
            palette,
        ));

    let label = if state.loading {
        "Connecting..."
    } else if is_login {
        "Sign In"
    } else {
        "Create Account"
    };
    let submit = Button::new(
        Container::new(Text::new(label).font(BOLD_FONT).size(16))
            .width(Length::Fill)
            .center_x(),
    )
    .width(Length::Fill)
    .padding(16);
    let submit = if submit_enabled {
        submit.on_press(Message::SubmitAuth).style(iced::theme::Button::Primary)
    } else {
        submit.style(iced::theme::Button::Secondary)
    };

    let mut card_content = Column::new()
        .width(Length::Fixed(420.0))
        .spacing(24)
        .padding(32)
        .align_items(Alignment::Center)
        .push(Column::new().spacing(8).align_items(Alignment::Center).push(title).push(subtitle))
        .push(tabs)
        .push(form)
        .push(submit);
    if let Some(err) = &state.error_message {
        card_content = card_content.push(Text::new(err).size(14).style(palette.danger));
    }

    let card = Container::new(card_content).style(style::card(palette));

    let main_content = Column::new()
        .width(Length::Fill)
        .height(Length::Fill)
        .push(Container::new(toast_view(state.toasts())).padding([8, 12, 0, 12]))
        .push(Space::with_height(Length::Fixed(8.0)))
        .push(
            Container::new(card)
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x()
                .center_y(),
        );

    Container::new(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .style(style::filled(palette.bg_main, palette.text_primary))
        .into()
}
