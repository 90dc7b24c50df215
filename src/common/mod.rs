pub mod codes;
pub mod crypto;
pub mod error;
pub mod format;
pub mod models;
