// Client da terminale: login, gruppi, messaggi in tempo reale, assistente AI
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use quickchat::client::backend::{Backend, RestBackend};
use quickchat::client::config::{BackendConfig, ClientConfig};
use quickchat::client::services::ai::{AiService, ChatTurn, ProviderChoice};
use quickchat::client::services::conversation::{self, Conversation, SharedConversation};
use quickchat::client::services::{friends, groups};
use quickchat::client::session::ChatSession;
use quickchat::client::utils::session_store;
use quickchat::common::models::{ChatMessage, GroupWithRole, MessageId};

const HELP: &str = "\
Commands:
  /login <email> <password>
  /signup <email> <password> <display name>
  /groups                  list your groups
  /open <number|code>      open a group from /groups
  /dm <friend code>        open a direct conversation
  /close                   leave the current conversation
  /ask [auto|gemini|chatgpt] <question>
  /whoami
  /logout
  /quit
Any other line is sent to the open conversation.";

fn print_message(msg: &ChatMessage) {
    let body = match &msg.row.image_url {
        Some(url) if msg.row.text().is_empty() => format!("[image] {}", url),
        Some(url) => format!("[image] {} {}", url, msg.row.text()),
        None => msg.row.text().to_string(),
    };
    println!("[{}] {}: {}", msg.formatted_time(), msg.sender.display_name, body);
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Background task printing messages that arrive on the open conversation.
fn spawn_tail(conv: SharedConversation, session: ChatSession, seen: Arc<Mutex<HashSet<MessageId>>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(200)).await;
            match conversation::poll(&conv, &session).await {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("[CLI] realtime delivery failed: {}", e);
                    continue;
                }
            }
            let guard = conv.lock().await;
            let mut seen = seen.lock().await;
            for msg in guard.messages() {
                if seen.insert(msg.id()) && !msg.is_from(session.user_id()) {
                    println!();
                    print_message(msg);
                    prompt();
                }
            }
        }
    })
}

async fn show_history(conv: &SharedConversation, seen: &Arc<Mutex<HashSet<MessageId>>>) {
    let guard = conv.lock().await;
    let mut seen = seen.lock().await;
    seen.clear();
    if guard.messages().is_empty() {
        println!("(no messages yet)");
    }
    for msg in guard.messages() {
        seen.insert(msg.id());
        print_message(msg);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load .env variables so KEYRING_FALLBACK can be set there for development
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let client_config = ClientConfig::from_env();
    let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(BackendConfig::from_env()?)?);

    let conv = Conversation::shared();
    let seen: Arc<Mutex<HashSet<MessageId>>> = Arc::new(Mutex::new(HashSet::new()));
    let mut ai = AiService::new(&client_config);
    let mut session: Option<ChatSession> = None;
    let mut directory = groups::GroupDirectory::default();
    let mut history: Vec<ChatTurn> = Vec::new();
    let mut tail: Option<JoinHandle<()>> = None;

    if let Some(auth) = session_store::load_session(&client_config.data_dir) {
        match ChatSession::restore(backend.clone(), auth).await {
            Ok(s) => {
                println!("[CLI] Welcome back, {}", s.user().display_name);
                session = Some(s);
            }
            Err(e) => log::info!("[CLI] saved session not usable: {}", e),
        }
    }
    if let Some(s) = &session {
        if let Err(e) = ai.load(s).await {
            log::warn!("[CLI] credentials not loaded: {}", e);
        }
        tail = Some(spawn_tail(conv.clone(), s.clone(), seen.clone()));
    }

    println!("[CLI] Quick Chat. Type /help for commands.");
    let mut input = BufReader::new(stdin());
    let mut line = String::new();
    loop {
        line.clear();
        prompt();
        if input.read_line(&mut line).await? == 0 {
            break;
        }
        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }
        let (command, rest) = cmd.split_once(' ').unwrap_or((cmd, ""));
        let rest = rest.trim();

        match command {
            "/help" => println!("{}", HELP),
            "/quit" => break,
            "/login" | "/signup" => {
                let mut parts = rest.splitn(3, ' ');
                let (Some(email), Some(password)) = (parts.next(), parts.next()) else {
                    println!("[CLI] Usage: {} <email> <password>{}", command, if command == "/signup" { " <name>" } else { "" });
                    continue;
                };
                let result = if command == "/login" {
                    ChatSession::sign_in(backend.clone(), email, password).await
                } else {
                    ChatSession::sign_up(backend.clone(), email, password, parts.next().unwrap_or("")).await
                };
                match result {
                    Ok(s) => {
                        if let Some(auth) = s.auth() {
                            if let Err(e) = session_store::save_session(&client_config.data_dir, auth) {
                                log::warn!("[CLI] session not persisted: {}", e);
                            }
                        }
                        if let Err(e) = ai.load(&s).await {
                            log::warn!("[CLI] credentials not loaded: {}", e);
                        }
                        println!("[CLI] Signed in as {} (friend code {})", s.user().display_name, s.user().friend_code);
                        if let Some(t) = tail.take() {
                            t.abort();
                        }
                        tail = Some(spawn_tail(conv.clone(), s.clone(), seen.clone()));
                        session = Some(s);
                    }
                    Err(e) => println!("[CLI] {}", e),
                }
            }
            _ => {
                let Some(s) = session.clone() else {
                    println!("[CLI] You must sign in first (/login or /signup)");
                    continue;
                };
                match command {
                    "/whoami" => println!("{} · friend code {}", s.user().display_name, s.user().friend_code),
                    "/groups" => match groups::load_groups(&s).await {
                        Ok(list) => {
                            if list.is_empty() {
                                println!("(no groups)");
                            }
                            for (i, g) in list.iter().enumerate() {
                                println!("{:>2}. {} [{}]{}", i + 1, g.group.name, g.group.group_code, if g.user_role.is_admin() { " admin" } else { "" });
                            }
                            directory = groups::GroupDirectory::new(list);
                        }
                        Err(e) => println!("[CLI] {}", e),
                    },
                    "/open" => {
                        let found: Option<&GroupWithRole> = match rest.parse::<usize>() {
                            Ok(n) if n >= 1 => directory.groups().get(n - 1),
                            _ => directory.groups().iter().find(|g| g.group.group_code.eq_ignore_ascii_case(rest)),
                        };
                        let Some(group) = found.cloned() else {
                            println!("[CLI] Unknown group, run /groups first");
                            continue;
                        };
                        match conversation::open_group(&conv, &s, group.id()).await {
                            Ok(()) => {
                                println!("--- {} ---", group.group.name);
                                show_history(&conv, &seen).await;
                            }
                            Err(e) => println!("[CLI] {}", e),
                        }
                    }
                    "/dm" => match friends::start_chat(&conv, &s, rest).await {
                        Ok(friend) => {
                            println!("--- {} ---", friend.display_name);
                            show_history(&conv, &seen).await;
                        }
                        Err(e) => println!("[CLI] {}", e),
                    },
                    "/close" => conversation::close(&conv).await,
                    "/ask" => {
                        let (choice, question) = match rest.split_once(' ') {
                            Some((first, q)) => match first.parse::<ProviderChoice>() {
                                Ok(choice) => (choice, q),
                                Err(_) => (ProviderChoice::Auto, rest),
                            },
                            None => (ProviderChoice::Auto, rest),
                        };
                        match ai.send_message(question, choice, &history).await {
                            Ok(reply) => {
                                println!("[{}] {}", reply.provider, reply.text());
                                if reply.is_success() {
                                    history.push(ChatTurn::user(question));
                                    history.push(ChatTurn::assistant(reply.text()));
                                }
                            }
                            Err(e) => println!("[CLI] {}", e),
                        }
                    }
                    "/logout" => {
                        if let Some(t) = tail.take() {
                            t.abort();
                        }
                        conversation::close(&conv).await;
                        if let Err(e) = s.sign_out().await {
                            log::warn!("[CLI] sign out failed: {}", e);
                        }
                        session_store::clear_session(&client_config.data_dir)?;
                        session = None;
                        ai = AiService::new(&client_config);
                        history.clear();
                        println!("[CLI] Signed out");
                    }
                    _ if command.starts_with('/') => println!("[CLI] Unknown command, type /help"),
                    _ => match conversation::send_text(&conv, &s, cmd).await {
                        Ok(sent) => {
                            seen.lock().await.insert(sent.id());
                        }
                        Err(e) => println!("[CLI] {}", e),
                    },
                }
            }
        }
    }

    if let Some(t) = tail {
        t.abort();
    }
    Ok(())
}
