use iced::widget::{pick_list, Button, Column, Container, Row, Scrollable, Space, Text, TextInput};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{self, Palette, BOLD_FONT, EMOJI_FONT};
use crate::client::gui::widgets::dialog::{dialog, labeled};
use crate::client::models::app_state::ChatAppState;
use crate::client::models::messages::Message;
use crate::client::services::ai::{AiProvider, ProviderChoice};
use crate::common::crypto::validate_api_key;

pub fn view(state: &ChatAppState, palette: Palette) -> Element<'_, Message> {
    let status = if state.ai_providers.is_empty() {
        "No API key configured. Add one to start.".to_string()
    } else {
        let names: Vec<String> = state.ai_providers.iter().map(|p| p.to_string()).collect();
        format!("Available: {}", names.join(", "))
    };

    let toolbar = Row::new()
        .spacing(10)
        .align_items(Alignment::Center)
        .push(Text::new(status).size(13).style(palette.text_secondary))
        .push(Space::with_width(Length::Fill))
        .push(pick_list(ProviderChoice::ALL.to_vec(), Some(state.ai_choice), Message::AiProviderSelected).padding(8))
        .push(
            Button::new(Text::new("API Keys").size(13))
                .on_press(Message::OpenApiKeys)
                .style(iced::theme::Button::Secondary)
                .padding([8, 12]),
        );

    let mut history = Column::new().spacing(10).padding([4, 4]);
    if state.ai_history.is_empty() {
        history = history.push(
            Container::new(
                Column::new()
                    .spacing(8)
                    .align_items(Alignment::Center)
                    .push(Text::new("🤖").font(EMOJI_FONT).size(40))
                    .push(Text::new("Ask me anything").size(15).style(palette.text_secondary)),
            )
            .width(Length::Fill)
            .center_x()
            .padding(24),
        );
    }
    for turn in &state.ai_history {
        let (bg, fg) = if turn.from_user {
            (palette.my_message_bg, palette.bubble_text(true))
        } else if turn.failed {
            (palette.other_message_bg, palette.danger)
        } else {
            (palette.other_message_bg, palette.bubble_text(false))
        };
        let mut content = Column::new().spacing(4);
        if let Some(provider) = turn.provider {
            content = content.push(Text::new(provider.to_string()).size(11).font(BOLD_FONT).style(palette.text_secondary));
        }
        content = content.push(Text::new(&turn.text).size(14).style(fg));
        let bubble = Container::new(content)
            .padding([8, 12])
            .max_width(420.0)
            .style(style::rounded(bg, fg, 12.0));
        let row = if turn.from_user {
            Row::new().push(Space::with_width(Length::Fill)).push(bubble)
        } else {
            Row::new().push(bubble).push(Space::with_width(Length::Fill))
        };
        history = history.push(row);
    }
    if state.ai_pending {
        history = history.push(Text::new("Thinking...").size(13).style(palette.text_secondary));
    }

    let can_send = !state.ai_input.trim().is_empty() && !state.ai_pending;
    let send = Button::new(Text::new("Ask").size(14)).padding([10, 16]);
    let send = if can_send {
        send.on_press(Message::SendAiMessage).style(iced::theme::Button::Primary)
    } else {
        send.style(iced::theme::Button::Secondary)
    };
    let composer = Row::new()
        .spacing(8)
        .align_items(Alignment::Center)
        .push(
            Container::new(
                TextInput::new("Type a question...", &state.ai_input)
                    .on_input(Message::AiInputChanged)
                    .on_submit(if can_send { Message::SendAiMessage } else { Message::NoOp })
                    .padding(12)
                    .size(14),
            )
            .width(Length::Fill)
            .style(style::input(palette)),
        )
        .push(send);

    let body = Column::new()
        .spacing(14)
        .push(toolbar)
        .push(Scrollable::new(history).height(Length::Fixed(380.0)))
        .push(composer);

    dialog("AI Assistant", body, 640.0, palette)
}

fn key_field<'a>(
    label: &'a str,
    value: &'a str,
    provider: AiProvider,
    on_input: fn(String) -> Message,
    palette: Palette,
) -> Column<'a, Message> {
    let mut column = labeled(
        label,
        TextInput::new("Paste your API key", value).on_input(on_input).secure(true).padding(12).size(14),
        palette,
    );
    if !validate_api_key(value.trim(), Some(provider)) {
        column = column.push(
            Text::new(format!("This does not look like a {provider} key. It will be saved anyway."))
                .size(12)
                .style(palette.danger),
        );
    }
    column
}

pub fn api_keys(state: &ChatAppState, palette: Palette) -> Element<'_, Message> {
    let body = Column::new()
        .spacing(16)
        .push(
            Text::new("Keys are stored with your profile. Leave a field empty to remove that key.")
                .size(13)
                .style(palette.text_secondary),
        )
        .push(key_field("Gemini API key", &state.gemini_key_input, AiProvider::Gemini, Message::GeminiKeyChanged, palette))
        .push(key_field("OpenAI API key", &state.openai_key_input, AiProvider::ChatGpt, Message::OpenAiKeyChanged, palette))
        .push(labeled(
            "Gemini endpoint (optional)",
            TextInput::new("Default Google endpoint", &state.gemini_endpoint_input)
                .on_input(Message::GeminiEndpointChanged)
                .padding(12)
                .size(14),
            palette,
        ))
        .push(labeled(
            "OpenAI endpoint (optional)",
            TextInput::new("Default OpenAI endpoint", &state.openai_endpoint_input)
                .on_input(Message::OpenAiEndpointChanged)
                .padding(12)
                .size(14),
            palette,
        ))
        .push(
            Row::new()
                .spacing(10)
                .push(Space::with_width(Length::Fill))
                .push(
                    Button::new(Text::new("Back").size(14))
                        .on_press(Message::OpenAssistant)
                        .style(iced::theme::Button::Secondary)
                        .padding([10, 18]),
                )
                .push(
                    Button::new(Text::new(if state.loading { "Saving..." } else { "Save" }).size(14))
                        .on_press(Message::SaveApiKeys)
                        .style(iced::theme::Button::Primary)
                        .padding([10, 18]),
                ),
        );

    dialog("API Keys", body, 520.0, palette)
}
