// Lista messaggi della conversazione attiva
use std::collections::HashMap;

use iced::widget::{image, scrollable, Button, Column, Container, Image, Row, Scrollable, Space, Text};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{self, Palette, BOLD_FONT};
use crate::client::models::messages::Message;
use crate::common::models::{ChatMessage, MessageType, SenderProfile, UserId};

pub const MESSAGES_SCROLL_ID: &str = "conversation_messages_scroll";

pub fn scroll_id() -> scrollable::Id {
    scrollable::Id::new(MESSAGES_SCROLL_ID)
}

/// Round badge with the profile's initial on its colour.
pub fn avatar<'a>(profile: &SenderProfile, size: f32, palette: Palette) -> Element<'a, Message> {
    let bg = style::hex_color(&profile.color, palette.accent);
    Container::new(Text::new(profile.initial()).font(BOLD_FONT).size(size * 0.5).style(iced::Color::WHITE))
        .width(Length::Fixed(size))
        .height(Length::Fixed(size))
        .center_x()
        .center_y()
        .style(style::rounded(bg, iced::Color::WHITE, size / 2.0))
        .into()
}

pub fn view<'a>(
    messages: &'a [ChatMessage],
    me: Option<UserId>,
    images: &'a HashMap<String, image::Handle>,
    palette: Palette,
    show_sender: bool,
) -> Element<'a, Message> {
    let mut column = Column::new().spacing(8).padding([12, 16]);
    if messages.is_empty() {
        column = column.push(
            Container::new(Text::new("No messages yet. Start the conversation!").size(14).style(palette.text_secondary))
                .width(Length::Fill)
                .center_x()
                .padding(20),
        );
    }
    for msg in messages {
        let mine = me.is_some_and(|id| msg.is_from(id));
        column = column.push(bubble(msg, mine, images, palette, show_sender));
    }
    column = column.push(Space::new(Length::Fixed(0.0), Length::Fixed(20.0)));

    Scrollable::new(column)
        .width(Length::Fill)
        .height(Length::Fill)
        .id(scroll_id())
        .into()
}

fn bubble<'a>(
    msg: &'a ChatMessage,
    mine: bool,
    images: &'a HashMap<String, image::Handle>,
    palette: Palette,
    show_sender: bool,
) -> Element<'a, Message> {
    let bubble_color = if mine { palette.my_message_bg } else { palette.other_message_bg };
    let text_color = palette.bubble_text(mine);

    let mut content = Column::new().spacing(4);
    if show_sender && !mine {
        let sender_color = style::hex_color(&msg.sender.color, text_color);
        content = content.push(Text::new(&msg.sender.display_name).size(13).font(BOLD_FONT).style(sender_color));
    }

    if msg.row.message_type == MessageType::Image {
        let picture: Element<'a, Message> = match msg.row.image_url.as_ref().and_then(|u| images.get(u)) {
            Some(handle) => Image::new(handle.clone()).width(Length::Fixed(240.0)).into(),
            None => Text::new("🖼 Loading image...").size(13).style(text_color).into(),
        };
        content = content.push(
            Button::new(picture)
                .padding(0)
                .style(iced::theme::Button::Text)
                .on_press(Message::OpenImageViewer(msg.id())),
        );
    }
    if !msg.row.text().is_empty() {
        content = content.push(Text::new(msg.row.text()).size(14).style(text_color));
    }
    content = content.push(Text::new(msg.formatted_time()).size(10).style(palette.text_secondary));

    let bubble = Container::new(content)
        .padding([8, 12])
        .max_width(360.0)
        .style(style::rounded(bubble_color, text_color, 12.0));

    let row = if mine {
        Row::new().push(Space::with_width(Length::Fill)).push(bubble)
    } else {
        Row::new().spacing(8).align_items(Alignment::End).push(avatar(&msg.sender, 28.0, palette)).push(bubble)
    };
    row.width(Length::Fill).into()
}
