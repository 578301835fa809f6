use base64::Engine;

/// Sanitizes a filename by removing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Sanitizes track filename in "Artist - Title" format
pub fn sanitize_track_filename(artist: &str, title: &str) -> String {
    let sanitized_artist = sanitize_filename(artist);
    let sanitized_title = sanitize_filename(title);
    format!("{} - {}", sanitized_artist, sanitized_title)
}

/// Generates a unique ID for a chat request
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parses "3:45" or "1:02:03" into seconds. Plain numbers are seconds.
pub fn parse_clock_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut total = 0u64;
    for part in text.split(':') {
        let value = part.trim().parse::<u64>().ok()?;
        total = total.checked_mul(60)?.checked_add(value)?;
    }
    Some(total)
}

/// Accepts a Netscape cookie jar either as plain text or base64.
///
/// Env vars on most hosting panels cannot hold newlines, so the jar is often
/// pasted base64 encoded.
pub fn decode_cookie_blob(blob: &str) -> Option<String> {
    let trimmed = blob.trim();
    if trimmed.is_empty() {
        return None;
    }

    if looks_like_cookie_jar(trimmed) {
        return Some(format!("{}\n", trimmed.replace("\\n", "\n")));
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => {
            let decoded = String::from_utf8(bytes).ok()?;
            if looks_like_cookie_jar(&decoded) {
                Some(decoded)
            } else {
                log::warn!("⚠️ [COOKIES] Decoded cookie blob is not a Netscape cookie file");
                None
            }
        }
        Err(e) => {
            log::warn!("⚠️ [COOKIES] Cookie blob is neither a cookie file nor base64: {}", e);
            None
        }
    }
}

fn looks_like_cookie_jar(text: &str) -> bool {
    text.starts_with("# Netscape HTTP Cookie File")
        || text.starts_with("# HTTP Cookie File")
        || text.lines().any(|line| line.split('\t').count() == 7)
}

/// Lowercases and splits on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Whole-word (or whole-phrase) containment on tokenized text.
pub fn contains_word(tokens: &[String], phrase: &str) -> bool {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return false;
    }
    tokens.windows(needle.len()).any(|window| window == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_track_filename() {
        assert_eq!(sanitize_track_filename("AC/DC", "T.N.T?"), "AC_DC - T.N.T_");
    }

    #[test]
    fn parses_clock_durations() {
        assert_eq!(parse_clock_duration("3:45"), Some(225));
        assert_eq!(parse_clock_duration("1:02:03"), Some(3723));
        assert_eq!(parse_clock_duration("59"), Some(59));
        assert_eq!(parse_clock_duration(""), None);
        assert_eq!(parse_clock_duration("live"), None);
    }

    #[test]
    fn decodes_plain_and_base64_cookie_jars() {
        let jar = "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc";
        assert!(decode_cookie_blob(jar).unwrap().contains("SID\tabc"));

        let encoded = base64::engine::general_purpose::STANDARD.encode(jar);
        assert_eq!(decode_cookie_blob(&encoded).unwrap(), jar);

        assert!(decode_cookie_blob("not cookies at all!").is_none());
        assert!(decode_cookie_blob("   ").is_none());
    }

    #[test]
    fn escaped_newlines_are_restored() {
        let jar = "# Netscape HTTP Cookie File\\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc";
        let decoded = decode_cookie_blob(jar).unwrap();
        assert_eq!(decoded.lines().count(), 2);
    }

    #[test]
    fn word_matching_respects_boundaries() {
        let tokens = tokenize("Alive (Sped Up Version)");
        assert!(!contains_word(&tokens, "live"));
        assert!(contains_word(&tokens, "sped up"));
        assert!(contains_word(&tokens, "SPED"));
        assert!(!contains_word(&tokens, "up sped"));
    }
}
