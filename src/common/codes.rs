use rand::seq::SliceRandom;
use rand::Rng;

/// Palette for user avatars.
pub const USER_COLORS: [&str; 12] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A",
    "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2",
    "#F8B739", "#52B788", "#E63946", "#457B9D",
];

// no 0/O, 1/I
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn random_user_color() -> &'static str {
    USER_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_COLORS[0])
}

/// Random `#rrggbb` colour for a new group.
pub fn random_group_color() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..=0xFF_FFFF);
    format!("#{:06x}", value)
}

/// Six characters, shareable, used for both friend codes and group codes.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn generate_friend_code() -> String {
    generate_code()
}

pub fn generate_group_code() -> String {
    generate_code()
}

/// Codes are typed by humans: trim and upper-case before lookups.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_unambiguous_alphabet() {
        for _ in 0..200 {
            let code = generate_friend_code();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains('0') && !code.contains('O') && !code.contains('I') && !code.contains('1'));
        }
    }

    #[test]
    fn group_color_is_always_six_hex_digits() {
        for _ in 0..200 {
            let c = random_group_color();
            assert_eq!(c.len(), 7);
            assert!(c.starts_with('#'));
            assert!(c[1..].chars().all(|ch| ch.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn user_color_comes_from_palette() {
        assert!(USER_COLORS.contains(&random_user_color()));
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_code("  ab3xyz "), "AB3XYZ");
    }
}
