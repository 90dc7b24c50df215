// Palette e stili condivisi dalle view
use iced::widget::container::Appearance;
use iced::{theme, Background, Border, Color, Font, Shadow, Vector};

use crate::client::utils::preferences::ThemePreference;
use crate::common::format::parse_hex_color;

pub const BOLD_FONT: Font = Font {
    family: iced::font::Family::SansSerif,
    weight: iced::font::Weight::Bold,
    ..Font::DEFAULT
};

pub const EMOJI_FONT: Font = Font::with_name("Segoe UI Emoji");

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub bg_main: Color,
    pub chat_bg: Color,
    pub card_bg: Color,
    pub input_bg: Color,
    pub my_message_bg: Color,
    pub other_message_bg: Color,
    pub accent: Color,
    pub danger: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub bubble_text: Color,
}

impl Palette {
    pub fn for_theme(theme: ThemePreference) -> Self {
        match theme {
            ThemePreference::Dark => Self {
                bg_main: Color::from_rgb(0.06, 0.07, 0.18),
                chat_bg: Color::from_rgb(0.08, 0.09, 0.20),
                card_bg: Color::from_rgb(0.18, 0.19, 0.36),
                input_bg: Color::from_rgb(0.12, 0.13, 0.26),
                my_message_bg: Color::from_rgb(0.40, 0.49, 0.92),
                other_message_bg: Color::from_rgb(0.20, 0.22, 0.38),
                accent: Color::from_rgb(0.0, 0.7, 0.3),
                danger: Color::from_rgb(0.9, 0.25, 0.25),
                text_primary: Color::WHITE,
                text_secondary: Color::from_rgb(0.7, 0.7, 0.7),
                bubble_text: Color::WHITE,
            },
            ThemePreference::Light => Self {
                bg_main: Color::from_rgb(0.95, 0.95, 0.97),
                chat_bg: Color::WHITE,
                card_bg: Color::from_rgb(0.98, 0.98, 1.0),
                input_bg: Color::from_rgb(0.90, 0.91, 0.95),
                my_message_bg: Color::from_rgb(0.40, 0.49, 0.92),
                other_message_bg: Color::from_rgb(0.88, 0.89, 0.93),
                accent: Color::from_rgb(0.0, 0.6, 0.3),
                danger: Color::from_rgb(0.8, 0.15, 0.15),
                text_primary: Color::from_rgb(0.1, 0.1, 0.15),
                text_secondary: Color::from_rgb(0.4, 0.4, 0.45),
                bubble_text: Color::from_rgb(0.1, 0.1, 0.15),
            },
        }
    }

    pub fn bubble_text(&self, mine: bool) -> Color {
        if mine {
            Color::WHITE
        } else {
            self.bubble_text
        }
    }
}

/// `#rrggbb` to a colour, `fallback` when it does not parse.
pub fn hex_color(hex: &str, fallback: Color) -> Color {
    parse_hex_color(hex)
        .map(|(r, g, b)| Color::from_rgb(r, g, b))
        .unwrap_or(fallback)
}

pub fn filled(color: Color, text: Color) -> theme::Container {
    rounded(color, text, 0.0)
}

pub fn rounded(color: Color, text: Color, radius: f32) -> theme::Container {
    theme::Container::Custom(Box::new(move |_: &iced::Theme| Appearance {
        background: Some(Background::Color(color)),
        text_color: Some(text),
        border: Border { radius: radius.into(), ..Default::default() },
        ..Default::default()
    }))
}

pub fn card(palette: Palette) -> theme::Container {
    theme::Container::Custom(Box::new(move |_: &iced::Theme| Appearance {
        background: Some(Background::Color(palette.card_bg)),
        text_color: Some(palette.text_primary),
        border: Border { radius: 16.0.into(), ..Default::default() },
        shadow: Shadow {
            offset: Vector::new(0.0, 4.0),
            blur_radius: 12.0,
            color: Color::from_rgba(0.0, 0.0, 0.0, 0.3),
        },
    }))
}

pub fn input(palette: Palette) -> theme::Container {
    theme::Container::Custom(Box::new(move |_: &iced::Theme| Appearance {
        background: Some(Background::Color(palette.input_bg)),
        text_color: Some(palette.text_primary),
        border: Border {
            width: 1.0,
            color: Color::from_rgb(0.3, 0.3, 0.4),
            radius: 12.0.into(),
        },
        ..Default::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_fall_back() {
        let c = hex_color("#ff0000", Color::BLACK);
        assert_eq!(c, Color::from_rgb(1.0, 0.0, 0.0));
        assert_eq!(hex_color("nope", Color::BLACK), Color::BLACK);
    }
}
