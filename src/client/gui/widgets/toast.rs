use iced::widget::{Button, Column, Container, Row, Text};
use iced::{Element, Length};

use crate::client::gui::style::EMOJI_FONT;
use crate::client::models::messages::Message;

pub const TOAST_DURATION_MS: u64 = 3000;
const MAX_VISIBLE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn emoji(&self) -> &'static str {
        match self.level {
            ToastLevel::Success => "✅",
            ToastLevel::Error => "❌",
            ToastLevel::Info => "ℹ️",
            ToastLevel::Warning => "⚠️",
        }
    }

    pub fn color(&self) -> iced::Color {
        match self.level {
            ToastLevel::Success => iced::Color::from_rgb(0.2, 0.8, 0.4),
            ToastLevel::Error => iced::Color::from_rgb(1.0, 0.2, 0.2),
            ToastLevel::Info => iced::Color::from_rgb(0.2, 0.6, 1.0),
            ToastLevel::Warning => iced::Color::from_rgb(1.0, 0.8, 0.0),
        }
    }
}

/// Newest toasts stacked, click to dismiss early.
pub fn toast_view(toasts: &[Toast]) -> Element<'_, Message> {
    let mut column = Column::new().spacing(6);
    for toast in toasts.iter().rev().take(MAX_VISIBLE) {
        let bg_color = toast.color();
        let body = Row::new()
            .spacing(12)
            .push(Text::new(toast.emoji()).font(EMOJI_FONT).size(18).style(iced::Color::WHITE))
            .push(Text::new(&toast.message).size(15).style(iced::Color::WHITE));
        let bar = Container::new(body)
            .padding([10, 14])
            .width(Length::Fill)
            .style(iced::theme::Container::Custom(Box::new(move |_: &iced::Theme| {
                iced::widget::container::Appearance {
                    background: Some(iced::Background::Color(bg_color)),
                    text_color: Some(iced::Color::WHITE),
                    border: iced::Border {
                        radius: 8.0.into(),
                        ..Default::default()
                    },
                    shadow: iced::Shadow {
                        offset: iced::Vector::new(0.0, 4.0),
                        blur_radius: 12.0,
                        color: iced::Color::from_rgba(0.0, 0.0, 0.0, 0.3),
                    },
                }
            })));
        column = column.push(
            Button::new(bar)
                .padding(0)
                .style(iced::theme::Button::Text)
                .on_press(Message::DismissToast(toast.id)),
        );
    }
    column.width(Length::Fill).into()
}
