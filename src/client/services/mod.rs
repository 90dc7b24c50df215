pub mod ai;
pub mod conversation;
pub mod friends;
pub mod groups;
pub mod images;
