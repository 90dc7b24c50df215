use iced::widget::{Button, Column, Container, Row, Scrollable, Space, Text};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{self, Palette, BOLD_FONT};
use crate::client::models::messages::Message;

/// Card drawn in the conversation panel while a dialog is open. The close
/// button always sends `CloseModal`.
pub fn dialog<'a>(title: &'a str, body: impl Into<Element<'a, Message>>, width: f32, palette: Palette) -> Element<'a, Message> {
    let header = Row::new()
        .align_items(Alignment::Center)
        .push(Text::new(title).font(BOLD_FONT).size(22).style(palette.text_primary))
        .push(Space::with_width(Length::Fill))
        .push(
            Button::new(Text::new("✕").size(16))
                .on_press(Message::CloseModal)
                .style(iced::theme::Button::Secondary)
                .padding([6, 10]),
        );

    let card = Container::new(
        Column::new()
            .spacing(20)
            .padding(28)
            .width(Length::Fixed(width))
            .push(header)
            .push(body),
    )
    .style(style::card(palette));

    Container::new(Scrollable::new(Container::new(card).width(Length::Fill).center_x().padding(24)))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_y()
        .into()
}

/// Label plus styled input box, the layout every form in the app uses.
pub fn labeled<'a>(label: &'a str, input: impl Into<Element<'a, Message>>, palette: Palette) -> Column<'a, Message> {
    Column::new()
        .spacing(6)
        .push(Text::new(label).size(14).style(palette.text_secondary))
        .push(Container::new(input).width(Length::Fill).style(style::input(palette)))
}
