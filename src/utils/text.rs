//! Small text helpers shared by the cycles and the media clients.

use sha2::{Digest, Sha256};

/// Caesar-13 over ASCII letters; everything else passes through
pub fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            _ => c,
        })
        .collect()
}

/// Truncate to at most `max` characters (not bytes)
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Hex sha256 of the normalized input, used for cross-restart dedup keys
pub fn dedup_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.trim().to_lowercase().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Expand `#{n}` and `{city}` placeholders in a title/description template
pub fn fill_template(template: &str, upload_number: i64, city: Option<&str>) -> String {
    let filled = template.replace("#{n}", &format!("#{upload_number}"));
    match city {
        Some(city) => filled.replace("{city}", city),
        None => filled,
    }
}

/// Make text safe for an ffmpeg `drawtext` filter argument
pub fn sanitize_drawtext(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .filter(|c| !matches!(c, ';' | '[' | ']' | '%' | '{' | '}' | '\\'))
        .map(|c| if c == '\'' { '\u{2019}' } else { c })
        .collect::<String>()
        .replace(':', "\\:")
}

/// `#rrggbb` colors pass through; anything else falls back to the default background
pub fn valid_hex_color(color: &str) -> &str {
    let bytes = color.as_bytes();
    if bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(u8::is_ascii_hexdigit) {
        color
    } else {
        "#1a1a2e"
    }
}
