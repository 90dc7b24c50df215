use iced::Application;

use quickchat::client::config::{BackendConfig, ClientConfig};
use quickchat::client::gui::app::ChatApp;

fn main() -> iced::Result {
    // load environment from .env (optional)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let backend = BackendConfig::from_env().map_err(|e| e.to_string());
    let client = ClientConfig::from_env();
    log::info!("[APP_START] data dir {}", client.data_dir.display());

    let mut settings = iced::Settings::with_flags((backend, client));
    settings.window.size = iced::Size::new(1100.0, 720.0);
    settings.window.min_size = Some(iced::Size::new(800.0, 560.0));
    ChatApp::run(settings)
}
