use std::fs;
use std::path::{Path, PathBuf};

const THEME_FILE: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemePreference {
    #[default]
    Dark,
    Light,
}

impl ThemePreference {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemePreference::Dark => "dark",
            ThemePreference::Light => "light",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "dark" => Some(ThemePreference::Dark),
            "light" => Some(ThemePreference::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemePreference::Dark => ThemePreference::Light,
            ThemePreference::Light => ThemePreference::Dark,
        }
    }

    pub fn theme(self) -> iced::Theme {
        match self {
            ThemePreference::Dark => iced::Theme::Dark,
            ThemePreference::Light => iced::Theme::Light,
        }
    }
}

fn theme_path(data_dir: &Path) -> PathBuf {
    data_dir.join(THEME_FILE)
}

/// Saved theme, dark when nothing (valid) is stored.
pub fn load_theme(data_dir: &Path) -> ThemePreference {
    fs::read_to_string(theme_path(data_dir))
        .ok()
        .and_then(|s| ThemePreference::parse(&s))
        .unwrap_or_default()
}

pub fn save_theme(data_dir: &Path, theme: ThemePreference) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;
    fs::write(theme_path(data_dir), theme.as_str())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_data_dir() {
        let dir = std::env::temp_dir().join(format!("quickchat-theme-{}", uuid::Uuid::new_v4()));
        assert_eq!(load_theme(&dir), ThemePreference::Dark);
        save_theme(&dir, ThemePreference::Light).unwrap();
        assert_eq!(load_theme(&dir), ThemePreference::Light);
        fs::write(dir.join(THEME_FILE), "purple").unwrap();
        assert_eq!(load_theme(&dir), ThemePreference::Dark);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn toggle_flips() {
        assert_eq!(ThemePreference::Dark.toggled(), ThemePreference::Light);
        assert_eq!(ThemePreference::Light.toggled().toggled(), ThemePreference::Light);
    }
}
