pub mod assistant;
pub mod chat;
pub mod config_error;
pub mod create_group;
pub mod group_settings;
pub mod image_dialogs;
pub mod login;
pub mod screensaver;
