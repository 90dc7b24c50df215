use iced::widget::{Button, Column, Container, Row, Space, Text, TextInput};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{self, Palette, BOLD_FONT};
use crate::client::gui::widgets::dialog::{dialog, labeled};
use crate::client::gui::widgets::message_list::avatar;
use crate::client::models::app_state::ChatAppState;
use crate::client::models::messages::Message;
use crate::common::models::Role;

pub fn view(state: &ChatAppState, palette: Palette) -> Element<'_, Message> {
    let Some(group) = state.active_group() else {
        return dialog("Group Settings", Text::new("This group is no longer available.").size(14), 520.0, palette);
    };
    let is_admin = group.user_role.is_admin();
    let me = state.my_id();

    let code_row = Row::new()
        .spacing(10)
        .align_items(Alignment::Center)
        .push(Text::new("Group code").size(14).style(palette.text_secondary))
        .push(Text::new(&group.group.group_code).font(BOLD_FONT).size(18).style(palette.accent))
        .push(Space::with_width(Length::Fill))
        .push(
            Button::new(Text::new("Copy").size(13))
                .on_press(Message::CopyGroupCode)
                .style(iced::theme::Button::Secondary)
                .padding([6, 12]),
        );

    let mut info = Column::new().spacing(8).push(code_row);
    if !group.group.description.is_empty() {
        info = info.push(Text::new(&group.group.description).size(14).style(palette.text_primary));
    }

    let mut members = Column::new().spacing(6);
    if state.members.is_empty() {
        members = members.push(Text::new("Loading members...").size(13).style(palette.text_secondary));
    }
    for member in &state.members {
        let is_me = me == Some(member.profile.id);
        let name = if is_me {
            format!("{} (you)", member.profile.display_name)
        } else {
            member.profile.display_name.clone()
        };
        let badge = match member.role {
            Role::Admin => "Admin",
            Role::Member => "Member",
        };
        let mut row = Row::new()
            .spacing(10)
            .align_items(Alignment::Center)
            .push(avatar(&member.profile, 30.0, palette))
            .push(Text::new(name).size(15))
            .push(Space::with_width(Length::Fill))
            .push(Text::new(badge).size(12).style(palette.text_secondary));
        if is_admin && !is_me {
            row = row.push(
                Button::new(Text::new("Remove").size(12))
                    .on_press(Message::RemoveMember(member.profile.id))
                    .style(iced::theme::Button::Destructive)
                    .padding([4, 10]),
            );
        }
        members = members.push(
            Container::new(row)
                .padding([6, 10])
                .width(Length::Fill)
                .style(style::rounded(palette.input_bg, palette.text_primary, 8.0)),
        );
    }

    let add_row = Row::new()
        .spacing(8)
        .align_items(Alignment::End)
        .push(labeled(
            "Add member by friend code",
            TextInput::new("ABC123", &state.member_code_input)
                .on_input(Message::MemberCodeChanged)
                .on_submit(Message::AddMember)
                .padding(10)
                .size(14),
            palette,
        ))
        .push(
            Button::new(Text::new("Add").size(14))
                .on_press(Message::AddMember)
                .style(iced::theme::Button::Primary)
                .padding([10, 16]),
        );

    let leaving = state.leave_confirmation.is_some();
    let mut actions = Row::new().spacing(10).push(Space::with_width(Length::Fill)).push(
        Button::new(Text::new(if leaving { "Click again to leave" } else { "Leave Group" }).size(14))
            .on_press(Message::LeaveGroup)
            .style(if leaving { iced::theme::Button::Destructive } else { iced::theme::Button::Secondary })
            .padding([10, 16]),
    );
    if is_admin {
        let label = match state.delete_confirmation.as_ref().map(|c| c.stage()) {
            Some(2) => "Click again to confirm",
            _ => "Delete Group",
        };
        actions = actions.push(
            Button::new(Text::new(label).size(14))
                .on_press(Message::DeleteGroup)
                .style(iced::theme::Button::Destructive)
                .padding([10, 16]),
        );
    }

    let mut body = Column::new()
        .spacing(18)
        .push(info)
        .push(Text::new(format!("Members ({})", state.members.len())).font(BOLD_FONT).size(15))
        .push(members)
        .push(add_row)
        .push(actions);
    if leaving {
        body = body.push(
            Text::new("Are you sure you want to leave this group?").size(13).style(palette.text_secondary),
        );
    }
    if state.delete_confirmation.is_some() {
        body = body.push(
            Text::new("Deleting the group removes every message for all members. This cannot be undone.")
                .size(13)
                .style(palette.danger),
        );
    }

    dialog("Group Settings", body, 520.0, palette)
}
