pub mod dialog;
pub mod message_list;
pub mod toast;
