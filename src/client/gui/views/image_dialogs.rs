// Dialoghi immagini: scelta file, anteprima prima dell'invio, visualizzatore
use iced::widget::{Button, Column, Container, Image, Row, Space, Text, TextInput};
use iced::{Alignment, Element, Length};

use crate::client::gui::style::{Palette, BOLD_FONT};
use crate::client::gui::widgets::dialog::{dialog, labeled};
use crate::client::gui::widgets::message_list::avatar;
use crate::client::models::app_state::ChatAppState;
use crate::client::models::messages::Message;
use crate::client::services::images::{ALLOWED_MIME_TYPES, MAX_IMAGE_BYTES};
use crate::common::models::MessageId;

pub fn picker(state: &ChatAppState, palette: Palette) -> Element<'_, Message> {
    let can_upload = !state.image_path_input.trim().is_empty() && !state.loading;
    let upload = Button::new(Text::new(if state.loading { "Uploading..." } else { "Upload" }).size(14)).padding([10, 18]);
    let upload = if can_upload {
        upload.on_press(Message::UploadImage).style(iced::theme::Button::Primary)
    } else {
        upload.style(iced::theme::Button::Secondary)
    };

    let hint = format!(
        "{} up to {} MB",
        ALLOWED_MIME_TYPES.join(", "),
        MAX_IMAGE_BYTES / (1024 * 1024)
    );

    let body = Column::new()
        .spacing(16)
        .push(labeled(
            "Image file",
            TextInput::new("/path/to/picture.png", &state.image_path_input)
                .on_input(Message::ImagePathChanged)
                .on_submit(if can_upload { Message::UploadImage } else { Message::NoOp })
                .padding(12)
                .size(14),
            palette,
        ))
        .push(Text::new(hint).size(12).style(palette.text_secondary))
        .push(Row::new().push(Space::with_width(Length::Fill)).push(upload));

    dialog("Send Image", body, 480.0, palette)
}

pub fn preview(state: &ChatAppState, palette: Palette) -> Element<'_, Message> {
    let picture: Element<Message> = match &state.preview {
        Some(handle) => Image::new(handle.clone()).width(Length::Fill).into(),
        None => Text::new("No image selected").size(14).style(palette.text_secondary).into(),
    };

    let send = Button::new(Text::new(if state.sending { "Sending..." } else { "Send" }).size(14)).padding([10, 18]);
    let send = if state.pending_upload.is_some() && !state.sending {
        send.on_press(Message::SendImage).style(iced::theme::Button::Primary)
    } else {
        send.style(iced::theme::Button::Secondary)
    };

    let body = Column::new()
        .spacing(16)
        .push(Container::new(picture).width(Length::Fill).max_height(360.0).center_x())
        .push(labeled(
            "Caption",
            TextInput::new("Add a caption (optional)", &state.image_caption)
                .on_input(Message::ImageCaptionChanged)
                .on_submit(Message::SendImage)
                .padding(12)
                .size(14),
            palette,
        ))
        .push(
            Row::new()
                .spacing(10)
                .push(Space::with_width(Length::Fill))
                .push(
                    Button::new(Text::new("Cancel").size(14))
                        .on_press(Message::CloseModal)
                        .style(iced::theme::Button::Secondary)
                        .padding([10, 18]),
                )
                .push(send),
        );

    dialog("Preview", body, 520.0, palette)
}

pub fn viewer(state: &ChatAppState, id: MessageId, palette: Palette) -> Element<'_, Message> {
    let Some(message) = state.viewer_message(id) else {
        return dialog("Image", Text::new("Image not available").size(14).style(palette.text_secondary), 480.0, palette);
    };

    let url = message.row.image_url.as_deref();
    let picture: Element<Message> = match url.and_then(|u| state.image_cache.get(u)) {
        Some(handle) => Image::new(handle.clone()).width(Length::Fill).into(),
        None => Text::new("Loading image...").size(14).style(palette.text_secondary).into(),
    };

    let download = Button::new(Text::new("Download").size(14))
        .style(iced::theme::Button::Secondary)
        .padding([8, 14]);
    let download = match url.filter(|u| state.image_bytes(u).is_some()) {
        Some(u) => download.on_press(Message::DownloadImage(u.to_string())),
        None => download,
    };

    let meta = Row::new()
        .spacing(10)
        .align_items(Alignment::Center)
        .push(avatar(&message.sender, 32.0, palette))
        .push(
            Column::new()
                .spacing(2)
                .push(Text::new(&message.sender.display_name).font(BOLD_FONT).size(15))
                .push(Text::new(message.formatted_time()).size(12).style(palette.text_secondary)),
        )
        .push(Space::with_width(Length::Fill))
        .push(download);

    let mut body = Column::new().spacing(16).push(picture).push(meta);
    if !message.row.text().is_empty() {
        body = body.push(Text::new(message.row.text()).size(14).style(palette.text_primary));
    }

    dialog("Image", body, 720.0, palette)
}
