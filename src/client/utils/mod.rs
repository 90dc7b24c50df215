pub mod preferences;
pub mod session_store;
