//! AI assistant: one credential per provider, one HTTP request per message.
//!
//! Keys are stored sealed on the user profile and opened on load. Requests
//! are sent once; failures come back as [`AiOutcome::Failed`] rather than
//! as errors, so the chat view can render them as an assistant bubble.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};

use crate::client::config::ClientConfig;
use crate::client::session::ChatSession;
use crate::common::crypto::{fingerprint, CredentialCipher, XorCipher};
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::StoredCredentials;

pub const NO_REPLY_TEXT: &str = "Sorry, I couldn't generate a response.";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiProvider {
    Gemini,
    ChatGpt,
}

impl AiProvider {
    pub const ALL: [AiProvider; 2] = [AiProvider::Gemini, AiProvider::ChatGpt];

    pub fn id(self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::ChatGpt => "chatgpt",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AiProvider::Gemini => "Gemini",
            AiProvider::ChatGpt => "ChatGPT",
        })
    }
}

/// Which provider a message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderChoice {
    /// First configured provider, Gemini before ChatGPT.
    #[default]
    Auto,
    Specific(AiProvider),
}

impl ProviderChoice {
    pub const ALL: [ProviderChoice; 3] = [
        ProviderChoice::Auto,
        ProviderChoice::Specific(AiProvider::Gemini),
        ProviderChoice::Specific(AiProvider::ChatGpt),
    ];
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderChoice::Auto => f.write_str("Auto"),
            ProviderChoice::Specific(provider) => provider.fmt(f),
        }
    }
}

impl FromStr for ProviderChoice {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ProviderChoice::Auto),
            "gemini" => Ok(ProviderChoice::Specific(AiProvider::Gemini)),
            "chatgpt" | "openai" => Ok(ProviderChoice::Specific(AiProvider::ChatGpt)),
            other => Err(ChatError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One earlier exchange passed along as context.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: TurnRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AiOutcome {
    Reply(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiReply {
    pub provider: AiProvider,
    pub outcome: AiOutcome,
}

impl AiReply {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AiOutcome::Reply(_))
    }

    pub fn text(&self) -> &str {
        match &self.outcome {
            AiOutcome::Reply(text) | AiOutcome::Failed(text) => text,
        }
    }
}

pub fn gemini_body(message: &str, history: &[ChatTurn]) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": turn.content }] })
        })
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));
    json!({ "contents": contents })
}

pub fn openai_body(model: &str, message: &str, history: &[ChatTurn]) -> Value {
    let mut messages: Vec<Value> = history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            };
            json!({ "role": role, "content": turn.content })
        })
        .collect();
    messages.push(json!({ "role": "user", "content": message }));
    json!({ "model": model, "messages": messages, "temperature": OPENAI_TEMPERATURE })
}

fn gemini_reply_text(body: &Value) -> Option<String> {
    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn openai_reply_text(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn provider_error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message").and_then(Value::as_str).map(str::to_string)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub struct AiService {
    http: Client,
    cipher: Arc<dyn CredentialCipher>,
    gemini_model: String,
    openai_model: String,
    gemini_key: Option<String>,
    openai_key: Option<String>,
    gemini_endpoint: Option<String>,
    openai_endpoint: Option<String>,
}

impl AiService {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_cipher(config, Arc::new(XorCipher::default()))
    }

    pub fn with_cipher(config: &ClientConfig, cipher: Arc<dyn CredentialCipher>) -> Self {
        Self {
            http: Client::new(),
            cipher,
            gemini_model: config.gemini_model.clone(),
            openai_model: config.openai_model.clone(),
            gemini_key: None,
            openai_key: None,
            gemini_endpoint: None,
            openai_endpoint: None,
        }
    }

    /// Sets plaintext keys in memory without persisting them.
    pub fn set_keys(&mut self, gemini: Option<&str>, openai: Option<&str>) {
        self.gemini_key = non_empty(gemini);
        self.openai_key = non_empty(openai);
    }

    pub fn set_endpoints(&mut self, gemini: Option<&str>, openai: Option<&str>) {
        self.gemini_endpoint = non_empty(gemini);
        self.openai_endpoint = non_empty(openai);
    }

    pub fn key(&self, provider: AiProvider) -> Option<&str> {
        match provider {
            AiProvider::Gemini => self.gemini_key.as_deref(),
            AiProvider::ChatGpt => self.openai_key.as_deref(),
        }
    }

    pub fn endpoint(&self, provider: AiProvider) -> Option<&str> {
        match provider {
            AiProvider::Gemini => self.gemini_endpoint.as_deref(),
            AiProvider::ChatGpt => self.openai_endpoint.as_deref(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.available_providers().is_empty()
    }

    pub fn available_providers(&self) -> Vec<AiProvider> {
        AiProvider::ALL.into_iter().filter(|p| self.key(*p).is_some()).collect()
    }

    /// Loads and opens the caller's stored credentials. A value that does not
    /// open is treated as absent.
    pub async fn load(&mut self, session: &ChatSession) -> ChatResult<()> {
        let stored = session.backend().load_credentials(session.user_id()).await?;
        self.gemini_key = stored.gemini_api_key.as_deref().and_then(|v| self.cipher.open(v));
        self.openai_key = stored.openai_api_key.as_deref().and_then(|v| self.cipher.open(v));
        self.gemini_endpoint = non_empty(stored.gemini_endpoint.as_deref());
        self.openai_endpoint = non_empty(stored.openai_endpoint.as_deref());
        log::info!("[AI] credentials loaded, providers: {:?}", self.available_providers());
        Ok(())
    }

    /// Seals and persists plaintext keys plus endpoint overrides. Empty
    /// values clear the stored entry.
    pub async fn save(&mut self, session: &ChatSession, keys: [Option<&str>; 2], endpoints: [Option<&str>; 2]) -> ChatResult<()> {
        let [gemini, openai] = keys.map(non_empty);
        let [gemini_endpoint, openai_endpoint] = endpoints.map(non_empty);
        let stored = StoredCredentials {
            gemini_api_key: gemini.as_deref().and_then(|k| self.cipher.seal(k)),
            openai_api_key: openai.as_deref().and_then(|k| self.cipher.seal(k)),
            gemini_endpoint: gemini_endpoint.clone(),
            openai_endpoint: openai_endpoint.clone(),
        };
        session.backend().update_credentials(session.user_id(), &stored).await?;
        if let Some(k) = &gemini {
            log::info!("[AI] stored Gemini key {}", fingerprint(k));
        }
        if let Some(k) = &openai {
            log::info!("[AI] stored OpenAI key {}", fingerprint(k));
        }
        self.gemini_key = gemini;
        self.openai_key = openai;
        self.gemini_endpoint = gemini_endpoint;
        self.openai_endpoint = openai_endpoint;
        Ok(())
    }

    pub fn resolve(&self, choice: ProviderChoice) -> ChatResult<AiProvider> {
        match choice {
            ProviderChoice::Auto => self
                .available_providers()
                .into_iter()
                .next()
                .ok_or(ChatError::NoProviderConfigured),
            ProviderChoice::Specific(provider) => match self.key(provider) {
                Some(_) => Ok(provider),
                None => Err(ChatError::MissingCredential(provider)),
            },
        }
    }

    /// Resolves the provider and copies out everything one request needs,
    /// so the service can be released before the network call.
    pub fn prepare(&self, message: &str, choice: ProviderChoice) -> ChatResult<AiRequest> {
        if message.trim().is_empty() {
            return Err(ChatError::validation("Message cannot be empty"));
        }
        let provider = self.resolve(choice)?;
        let key = self.key(provider).ok_or(ChatError::MissingCredential(provider))?.to_string();
        let (url, model) = match provider {
            AiProvider::Gemini => (
                self.gemini_endpoint
                    .clone()
                    .unwrap_or_else(|| format!("{}/{}:generateContent", GEMINI_BASE, self.gemini_model)),
                self.gemini_model.clone(),
            ),
            AiProvider::ChatGpt => (
                self.openai_endpoint.clone().unwrap_or_else(|| OPENAI_CHAT_URL.to_string()),
                self.openai_model.clone(),
            ),
        };
        Ok(AiRequest { http: self.http.clone(), provider, key, url, model, message: message.to_string() })
    }

    pub async fn send_message(&self, message: &str, choice: ProviderChoice, history: &[ChatTurn]) -> ChatResult<AiReply> {
        Ok(self.prepare(message, choice)?.send(history).await)
    }
}

/// One outbound assistant call, detached from the `AiService` it came from.
pub struct AiRequest {
    http: Client,
    provider: AiProvider,
    key: String,
    url: String,
    model: String,
    message: String,
}

impl AiRequest {
    pub async fn send(self, history: &[ChatTurn]) -> AiReply {
        let provider = self.provider;
        log::info!("[AI] sending to {} (key {})", provider, fingerprint(&self.key));
        let request = match provider {
            AiProvider::Gemini => self
                .http
                .post(&self.url)
                .query(&[("key", self.key.as_str())])
                .json(&gemini_body(&self.message, history)),
            AiProvider::ChatGpt => self
                .http
                .post(&self.url)
                .bearer_auth(&self.key)
                .json(&openai_body(&self.model, &self.message, history)),
        };
        let outcome = match request.send().await {
            Ok(resp) => {
                let status = resp.status();
                let body: Value = resp.json().await.unwrap_or(Value::Null);
                if status.is_success() {
                    let text = match provider {
                        AiProvider::Gemini => gemini_reply_text(&body),
                        AiProvider::ChatGpt => openai_reply_text(&body),
                    };
                    AiOutcome::Reply(text.unwrap_or_else(|| NO_REPLY_TEXT.to_string()))
                } else {
                    log::warn!("[AI] {} answered {}", provider, status);
                    AiOutcome::Failed(
                        provider_error_message(&body)
                            .unwrap_or_else(|| format!("Failed to get response from {}", provider)),
                    )
                }
            }
            Err(e) => {
                log::error!("[AI] {} request failed: {}", provider, e);
                AiOutcome::Failed(format!("Failed to get response from {}", provider))
            }
        };
        AiReply { provider, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GEMINI_KEY: &str = "AIzaSyA-test-key-0123456789abcdefghij";

    fn service() -> AiService {
        AiService::new(&ClientConfig::default())
    }

    #[test]
    fn parses_choices() {
        assert_eq!("auto".parse::<ProviderChoice>().unwrap(), ProviderChoice::Auto);
        assert_eq!(
            "ChatGPT".parse::<ProviderChoice>().unwrap(),
            ProviderChoice::Specific(AiProvider::ChatGpt)
        );
        assert!(matches!("claude".parse::<ProviderChoice>(), Err(ChatError::UnsupportedProvider(_))));
    }

    #[test]
    fn auto_prefers_gemini() {
        let mut svc = service();
        svc.set_keys(Some("sk-x"), Some("sk-y"));
        assert_eq!(svc.resolve(ProviderChoice::Auto).unwrap(), AiProvider::Gemini);
        svc.set_keys(None, Some("sk-y"));
        assert_eq!(svc.resolve(ProviderChoice::Auto).unwrap(), AiProvider::ChatGpt);
        assert_eq!(
            svc.resolve(ProviderChoice::Specific(AiProvider::Gemini)).unwrap_err().to_string(),
            "Gemini API key not configured"
        );
    }

    #[test]
    fn request_bodies_carry_history() {
        let history = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        let g = gemini_body("how are you", &history);
        assert_eq!(g["contents"][1]["role"], "model");
        assert_eq!(g["contents"][2]["parts"][0]["text"], "how are you");
        let o = openai_body("gpt-3.5-turbo", "how are you", &history);
        assert_eq!(o["messages"][1]["role"], "assistant");
        assert_eq!(o["messages"][2]["content"], "how are you");
        assert_eq!(o["temperature"], 0.7);
    }

    #[tokio::test]
    async fn auto_without_keys_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let mut svc = service();
        svc.set_endpoints(Some(&server.uri()), Some(&server.uri()));
        let err = svc.send_message("hello", ProviderChoice::Auto, &[]).await.unwrap_err();
        assert!(matches!(err, ChatError::NoProviderConfigured));
        assert!(!svc.is_configured());
    }

    #[tokio::test]
    async fn gemini_reply_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini"))
            .and(query_param("key", GEMINI_KEY))
            .and(body_partial_json(json!({ "contents": [{ "role": "user", "parts": [{ "text": "ciao" }] }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Ciao! Come posso aiutarti?" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let mut svc = service();
        svc.set_keys(Some(GEMINI_KEY), None);
        svc.set_endpoints(Some(&format!("{}/gemini", server.uri())), None);
        let reply = svc.send_message("ciao", ProviderChoice::Auto, &[]).await.unwrap();
        assert_eq!(reply.provider, AiProvider::Gemini);
        assert_eq!(reply.outcome, AiOutcome::Reply("Ciao! Come posso aiutarti?".into()));
    }

    #[tokio::test]
    async fn prepared_request_outlives_key_changes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-old"))
            .and(body_partial_json(json!({ "model": "gpt-3.5-turbo" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "  done  " } }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let mut svc = service();
        svc.set_keys(None, Some("sk-old"));
        svc.set_endpoints(None, Some(&format!("{}/v1/chat/completions", server.uri())));
        let request = svc.prepare("ping", ProviderChoice::Auto).unwrap();

        svc.set_keys(None, None);
        assert!(!svc.is_configured());

        let reply = request.send(&[]).await;
        assert_eq!(reply.provider, AiProvider::ChatGpt);
        assert_eq!(reply.outcome, AiOutcome::Reply("done".into()));
    }

    #[tokio::test]
    async fn openai_failure_uses_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let mut svc = service();
        svc.set_keys(None, Some("sk-test"));
        svc.set_endpoints(None, Some(&format!("{}/v1/chat/completions", server.uri())));
        let reply = svc
            .send_message("hi", ProviderChoice::Specific(AiProvider::ChatGpt), &[])
            .await
            .unwrap();
        assert!(!reply.is_success());
        assert_eq!(reply.text(), "Incorrect API key provided");
    }

    #[tokio::test]
    async fn empty_choices_fall_back_to_apology() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;
        let mut svc = service();
        svc.set_keys(None, Some("sk-test"));
        svc.set_endpoints(None, Some(&server.uri()));
        let reply = svc.send_message("hi", ProviderChoice::Auto, &[]).await.unwrap();
        assert_eq!(reply.text(), NO_REPLY_TEXT);
    }

    #[tokio::test]
    async fn error_without_body_gets_default_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let mut svc = service();
        svc.set_keys(Some(GEMINI_KEY), None);
        svc.set_endpoints(Some(&server.uri()), None);
        let reply = svc.send_message("hi", ProviderChoice::Auto, &[]).await.unwrap();
        assert_eq!(reply.outcome, AiOutcome::Failed("Failed to get response from Gemini".into()));
    }
}
