use iced::widget::{Button, Column, Container, Text};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{self, Palette, BOLD_FONT, EMOJI_FONT};
use crate::client::models::app_state::ChatAppState;
use crate::client::models::messages::Message;

pub fn view(state: &ChatAppState) -> Element<'_, Message> {
    let palette = Palette::for_theme(state.theme);
    let content = Column::new()
        .spacing(20)
        .align_items(Alignment::Center)
        .push(Text::new("💬").font(EMOJI_FONT).size(72))
        .push(Text::new("Quick Chat").font(BOLD_FONT).size(40).style(palette.text_primary))
        .push(Text::new(&state.clock).size(56).style(palette.text_primary))
        .push(
            Text::new("App is locked due to inactivity. Click below to unlock.")
                .size(16)
                .style(palette.text_secondary),
        )
        .push(
            Button::new(Text::new("Unlock App").font(BOLD_FONT).size(16))
                .on_press(Message::Unlock)
                .style(iced::theme::Button::Primary)
                .padding([12, 24]),
        );

    Container::new(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x()
        .center_y()
        .style(style::filled(palette.bg_main, palette.text_primary))
        .into()
}
