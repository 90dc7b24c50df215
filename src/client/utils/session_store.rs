use std::path::{Path, PathBuf};

use keyring::Entry;

use crate::common::models::AuthSession;

const SERVICE: &str = "quickchat_app";
const USER: &str = "quickchat_session";
const FALLBACK_FILE: &str = "session.json";

fn fallback_allowed() -> bool {
    std::env::var("KEYRING_FALLBACK").unwrap_or_default() == "true"
}

fn fallback_path(data_dir: &Path) -> PathBuf {
    data_dir.join(FALLBACK_FILE)
}

pub fn save_session(data_dir: &Path, session: &AuthSession) -> anyhow::Result<()> {
    let encoded = serde_json::to_string(session)?;
    let entry = Entry::new(SERVICE, USER);
    match entry.set_password(&encoded) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Keyring non disponibile: file solo se esplicitamente permesso
            if fallback_allowed() {
                std::fs::create_dir_all(data_dir)?;
                std::fs::write(fallback_path(data_dir), encoded)?;
                log::warn!("[SESSION_STORE] keyring unavailable ({}), session written to fallback file", e);
                Ok(())
            } else {
                Err(anyhow::anyhow!("keyring unavailable and file fallback disabled: {}", e))
            }
        }
    }
}

pub fn load_session(data_dir: &Path) -> Option<AuthSession> {
    let raw = match Entry::new(SERVICE, USER).get_password() {
        Ok(raw) => Some(raw),
        Err(_) if fallback_allowed() => std::fs::read_to_string(fallback_path(data_dir)).ok(),
        Err(_) => None,
    }?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(session) => Some(session),
        Err(e) => {
            log::warn!("[SESSION_STORE] ignoring unreadable stored session: {}", e);
            None
        }
    }
}

pub fn clear_session(data_dir: &Path) -> anyhow::Result<()> {
    let _ = Entry::new(SERVICE, USER).delete_password();
    if fallback_allowed() {
        let path = fallback_path(data_dir);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
