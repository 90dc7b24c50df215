pub mod backend;
pub mod config;
pub mod gui;
pub mod idle;
pub mod models;
pub mod services;
pub mod session;
pub mod utils;
