//! AI credential persistence through the backend.

use std::sync::Arc;

use quickchat::client::backend::{Backend, MemoryBackend};
use quickchat::client::config::ClientConfig;
use quickchat::client::services::ai::{AiProvider, AiService, ProviderChoice};
use quickchat::client::session::ChatSession;
use quickchat::common::error::ChatError;

const GEMINI_KEY: &str = "AIzaSyD-abcdefghijklmnopqrstuvwxyz0123456";

#[tokio::test]
async fn keys_are_sealed_at_rest_and_reopened() {
    let mem = MemoryBackend::new();
    let user = mem.add_user("Alice");
    let session = ChatSession::new(Arc::new(mem.clone()) as Arc<dyn Backend>, user.clone());
    let config = ClientConfig::default();

    let mut ai = AiService::new(&config);
    ai.save(&session, [Some(GEMINI_KEY), None], [None, Some("https://proxy.local/v1/chat")])
        .await
        .unwrap();

    let raw = mem.raw_credentials(user.id);
    let sealed = raw.gemini_api_key.clone().unwrap();
    assert_ne!(sealed, GEMINI_KEY);
    assert!(raw.openai_api_key.is_none());
    assert_eq!(raw.openai_endpoint.as_deref(), Some("https://proxy.local/v1/chat"));

    let mut reloaded = AiService::new(&config);
    reloaded.load(&session).await.unwrap();
    assert_eq!(reloaded.key(AiProvider::Gemini), Some(GEMINI_KEY));
    assert_eq!(reloaded.available_providers(), vec![AiProvider::Gemini]);
    assert_eq!(reloaded.resolve(ProviderChoice::Auto).unwrap(), AiProvider::Gemini);
    assert!(matches!(
        reloaded.resolve(ProviderChoice::Specific(AiProvider::ChatGpt)),
        Err(ChatError::MissingCredential(AiProvider::ChatGpt))
    ));
}

#[tokio::test]
async fn empty_values_clear_stored_keys() {
    let mem = MemoryBackend::new();
    let user = mem.add_user("Alice");
    let session = ChatSession::new(Arc::new(mem.clone()) as Arc<dyn Backend>, user.clone());
    let mut ai = AiService::new(&ClientConfig::default());

    ai.save(&session, [Some(GEMINI_KEY), None], [None, None]).await.unwrap();
    ai.save(&session, [Some("   "), None], [None, None]).await.unwrap();

    assert!(mem.raw_credentials(user.id).gemini_api_key.is_none());
    assert!(!ai.is_configured());
}
