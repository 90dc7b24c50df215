use chrono::{DateTime, Local, Utc};

/// Time shown under a message bubble, e.g. `3:07 PM`.
pub fn format_message_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%-I:%M %p").to_string()
}

/// First letter of a display name, upper-cased, for avatars without an image.
pub fn avatar_initial(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}

/// Parses `#rgb` / `#rrggbb` into 0..1 floats. Used by the GUI for avatar
/// backgrounds.
pub fn parse_hex_color(hex: &str) -> Option<(f32, f32, f32)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);
    Some((r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_handles_unicode_and_empty() {
        assert_eq!(avatar_initial("luigi"), "L");
        assert_eq!(avatar_initial("élodie"), "É");
        assert_eq!(avatar_initial(""), "?");
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ffffff"), Some((1.0, 1.0, 1.0)));
        assert_eq!(parse_hex_color("#000"), Some((0.0, 0.0, 0.0)));
        assert!(parse_hex_color("#12345").is_none());
        assert!(parse_hex_color("#zzzzzz").is_none());
    }

    #[test]
    fn message_time_has_am_pm() {
        let t = format_message_time(Utc::now());
        assert!(t.ends_with("AM") || t.ends_with("PM"));
    }
}
