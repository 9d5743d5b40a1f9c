//! Session key to file name mapping.
//!
//! Keys are arbitrary strings (`telegram:123`, `web:a/b`), so they are
//! escaped before touching the filesystem. ASCII letters, digits and `-`
//! pass through; `:` (the channel separator) becomes `_`; every other byte,
//! including `_` itself, `.`, `/` and `%`, becomes `%XX`. The escaped form
//! never contains a path separator or a dot, and decodes back to exactly one
//! key.

pub const SESSION_FILE_EXTENSION: &str = "jsonl";

/// Escape `key` into a file stem.
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' => escaped.push(byte as char),
            b':' => escaped.push('_'),
            other => escaped.push_str(&format!("%{other:02X}")),
        }
    }
    escaped
}

/// `<escaped-key>.jsonl`.
pub fn session_file_name(key: &str) -> String {
    format!("{}.{SESSION_FILE_EXTENSION}", escape_key(key))
}

/// File name the pre-rename store used: `:` becomes `_`, then characters
/// that are unsafe in file names (`<>:"/\|?*`) become `_` and surrounding
/// whitespace is trimmed. Lossy, so it is only used to find legacy logs.
pub fn legacy_file_name(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();
    format!("{}.{SESSION_FILE_EXTENSION}", stem.trim())
}

/// Decode a stem produced by [`escape_key`].
///
/// Returns `None` for names that [`escape_key`] could not have produced.
pub fn unescape_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => decoded.push(b':'),
            b'%' => {
                let hex = stem.get(i + 1..i + 3)?;
                if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return None;
                }
                let byte = u8::from_str_radix(hex, 16).ok()?;
                decoded.push(byte);
                i += 2;
            }
            b @ (b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-') => decoded.push(b),
            _ => return None,
        }
        i += 1;
    }
    String::from_utf8(decoded).ok()
}

/// Key for a file name ending in `.jsonl`, if it is one of ours.
pub fn key_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(&format!(".{SESSION_FILE_EXTENSION}"))?;
    unescape_key(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_channel_key() {
        assert_eq!(escape_key("telegram:123"), "telegram_123");
        assert_eq!(session_file_name("telegram:123"), "telegram_123.jsonl");
    }

    #[test]
    fn test_legacy_file_name() {
        assert_eq!(legacy_file_name("telegram:123_456"), "telegram_123_456.jsonl");
        assert_eq!(legacy_file_name("email:a@b.com"), "email_a@b.com.jsonl");
        assert_eq!(legacy_file_name("web:a/b?c"), "web_a_b_c.jsonl");
        // Plain channel keys map to the same name under both schemes
        assert_eq!(legacy_file_name("telegram:7"), session_file_name("telegram:7"));
    }

    #[test]
    fn test_underscore_and_colon_do_not_collide() {
        assert_ne!(escape_key("a_b"), escape_key("a:b"));
        assert_eq!(escape_key("a_b"), "a%5Fb");
    }

    #[test]
    fn test_traversal_is_neutralized() {
        let escaped = escape_key("../../etc/passwd");
        assert!(!escaped.contains('/'));
        assert!(!escaped.contains('.'));
        assert_eq!(escaped, "%2E%2E%2F%2E%2E%2Fetc%2Fpasswd");
    }

    #[test]
    fn test_roundtrip_awkward_keys() {
        for key in ["", "web:a:b:c", "discord:user_42", "x%41", "chat:héllo", "a b\tc", "web:../x"] {
            let escaped = escape_key(key);
            assert_eq!(unescape_key(&escaped).as_deref(), Some(key), "key {key:?}");
        }
    }

    #[test]
    fn test_empty_key_file_name() {
        assert_eq!(session_file_name(""), ".jsonl");
        assert_eq!(key_from_file_name(".jsonl").as_deref(), Some(""));
    }

    #[test]
    fn test_foreign_names_are_rejected() {
        assert_eq!(unescape_key("notes.bak"), None);
        assert_eq!(unescape_key("bad%zz"), None);
        assert_eq!(unescape_key("trailing%4"), None);
        assert_eq!(key_from_file_name("telegram_1.json"), None);
        assert_eq!(key_from_file_name("telegram_1.jsonl").as_deref(), Some("telegram:1"));
    }
}
