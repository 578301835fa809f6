use crate::errors::{AppError, Result};
use regex::Regex;
use url::Url;

const SHORT_LINK_HOSTS: &[&str] = &["spotify.link", "spotify.app.link"];

/// A Spotify link the bot knows how to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyLink {
    Track(String),
    /// `spotify.link` share links; the track id is only known after following redirects.
    Short(Url),
}

pub struct InputValidator {
    web_link: Regex,
    uri: Regex,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            web_link: Regex::new(
                r"^https?://open\.spotify\.com/(?:intl-[A-Za-z]{2}(?:-[A-Za-z]{2})?/)?(track|album|playlist|artist|episode|show)/([A-Za-z0-9]+)",
            )
            .expect("static regex"),
            uri: Regex::new(r"^spotify:(track|album|playlist|artist|episode|show):([A-Za-z0-9]+)$")
                .expect("static regex"),
        }
    }

    /// Picks the first Spotify-looking token out of a chat message.
    pub fn extract_link<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.split_whitespace()
            .map(|token| token.trim_matches(|c: char| matches!(c, '<' | '>' | '(' | ')' | '"' | '\'')))
            .find(|token| token.contains("spotify.com") || token.contains("spotify.link") || token.starts_with("spotify:"))
    }

    pub fn validate_spotify_link(&self, link: &str) -> Result<SpotifyLink> {
        let link = link.trim();
        if link.is_empty() {
            return Err(AppError::InvalidLink("link cannot be empty".to_string()));
        }

        if let Some(captures) = self.uri.captures(link).or_else(|| self.web_link.captures(link)) {
            return Self::from_kind(&captures[1], &captures[2]);
        }

        let parsed = Url::parse(link)
            .map_err(|e| AppError::InvalidLink(format!("not a URL: {}", e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::InvalidLink("URL must have a host".to_string()))?;

        if SHORT_LINK_HOSTS.contains(&host) {
            return Ok(SpotifyLink::Short(parsed));
        }

        Err(AppError::InvalidLink(format!(
            "{} is not a Spotify track link",
            host
        )))
    }

    /// Same as `validate_spotify_link` but for already-resolved URLs; short links are not accepted.
    pub fn track_id_from_url(&self, link: &str) -> Result<String> {
        match self.validate_spotify_link(link)? {
            SpotifyLink::Track(id) => Ok(id),
            SpotifyLink::Short(url) => Err(AppError::InvalidLink(format!(
                "short link {} did not resolve to a track",
                url
            ))),
        }
    }

    fn from_kind(kind: &str, id: &str) -> Result<SpotifyLink> {
        match kind {
            "track" => Ok(SpotifyLink::Track(id.to_string())),
            other => Err(AppError::InvalidLink(format!(
                "{} links are not supported, send a single track",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_track_links() {
        let validator = InputValidator::new();
        let expected = SpotifyLink::Track("4iV5W9uYEdYUVa79Axb7Rh".to_string());

        for link in [
            "https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh",
            "https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh?si=1a2b3c",
            "https://open.spotify.com/intl-es/track/4iV5W9uYEdYUVa79Axb7Rh",
            "spotify:track:4iV5W9uYEdYUVa79Axb7Rh",
        ] {
            assert_eq!(validator.validate_spotify_link(link).unwrap(), expected, "{}", link);
        }
    }

    #[test]
    fn rejects_collections_and_foreign_hosts() {
        let validator = InputValidator::new();
        assert!(matches!(
            validator.validate_spotify_link("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Err(AppError::InvalidLink(_))
        ));
        assert!(validator.validate_spotify_link("https://youtube.com/watch?v=abc").is_err());
        assert!(validator.validate_spotify_link("").is_err());
    }

    #[test]
    fn short_links_need_resolution() {
        let validator = InputValidator::new();
        let link = validator.validate_spotify_link("https://spotify.link/AbCdEf").unwrap();
        assert!(matches!(link, SpotifyLink::Short(_)));
        assert!(validator.track_id_from_url("https://spotify.link/AbCdEf").is_err());
    }

    #[test]
    fn extracts_link_from_message_text() {
        let validator = InputValidator::new();
        let text = "listen to this (https://open.spotify.com/track/abc123?si=x) !!";
        assert_eq!(
            validator.extract_link(text),
            Some("https://open.spotify.com/track/abc123?si=x")
        );
        assert_eq!(validator.extract_link("no links here"), None);
    }
}
