use iced::widget::{Button, Column, Row, Space, Text, TextInput};
use iced::{Element, Length};

use crate::client::gui::style::Palette;
use crate::client::gui::widgets::dialog::{dialog, labeled};
use crate::client::models::app_state::ChatAppState;
use crate::client::models::messages::Message;

pub fn view(state: &ChatAppState, palette: Palette) -> Element<'_, Message> {
    let can_create = !state.new_group_name.trim().is_empty() && !state.loading;

    let name = TextInput::new("Group name", &state.new_group_name)
        .on_input(Message::CreateGroupNameChanged)
        .on_submit(if can_create { Message::CreateGroupSubmit } else { Message::NoOp })
        .padding(12)
        .size(14);
    let description = TextInput::new("What is this group about? (optional)", &state.new_group_description)
        .on_input(Message::CreateGroupDescriptionChanged)
        .padding(12)
        .size(14);

    let create = Button::new(Text::new(if state.loading { "Creating..." } else { "Create Group" }).size(15)).padding([12, 20]);
    let create = if can_create {
        create.on_press(Message::CreateGroupSubmit).style(iced::theme::Button::Primary)
    } else {
        create.style(iced::theme::Button::Secondary)
    };

    let body = Column::new()
        .spacing(16)
        .push(labeled("Name", name, palette))
        .push(labeled("Description", description, palette))
        .push(
            Text::new("You will be the admin. Share the group code so others can be added.")
                .size(13)
                .style(palette.text_secondary),
        )
        .push(
            Row::new()
                .spacing(10)
                .push(Space::with_width(Length::Fill))
                .push(
                    Button::new(Text::new("Cancel").size(15))
                        .on_press(Message::CloseModal)
                        .style(iced::theme::Button::Secondary)
                        .padding([12, 20]),
                )
                .push(create),
        );

    dialog("Create Group", body, 460.0, palette)
}
