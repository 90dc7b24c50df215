use iced::widget::{Column, Container, Text};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{self, Palette, BOLD_FONT};
use crate::client::models::messages::Message;
use crate::client::utils::preferences::ThemePreference;

/// Static screen shown when the backend is not configured. It replaces the
/// whole window and offers no actions.
pub fn view<'a>(reason: &'a str, theme: ThemePreference) -> Element<'a, Message> {
    let palette = Palette::for_theme(theme);
    let content = Column::new()
        .spacing(16)
        .padding(32)
        .width(Length::Fixed(560.0))
        .align_items(Alignment::Center)
        .push(Text::new("Configuration Error").font(BOLD_FONT).size(32).style(palette.danger))
        .push(Text::new(reason).size(16).style(palette.text_primary))
        .push(
            Text::new("Set SUPABASE_URL and SUPABASE_ANON_KEY in the environment or in a .env file, then restart the app.")
                .size(14)
                .style(palette.text_secondary),
        );

    Container::new(Container::new(content).style(style::card(palette)))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x()
        .center_y()
        .style(style::filled(palette.bg_main, palette.text_primary))
        .into()
}
