use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("No acceptable candidate for '{0}'")]
    NoMatch(String),

    #[error("All download backends failed: {0}")]
    Backend(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Tagging error: {0}")]
    Tagging(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

impl From<lofty::error::LoftyError> for AppError {
    fn from(error: lofty::error::LoftyError) -> Self {
        AppError::Tagging(error.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, error))
    }
}

impl AppError {
    /// Text shown in the chat when a request dies with this error.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidLink(reason) => format!("❌ Unsupported link: {}", reason),
            AppError::Metadata(_) => "❌ Error reading Spotify.".to_string(),
            AppError::Search(_) => "❌ The search service is not responding.".to_string(),
            AppError::NoMatch(_) => "❌ I couldn't find an exact audio match.".to_string(),
            AppError::Backend(_) | AppError::Download(_) => {
                "❌ Error downloading the audio (servers busy).".to_string()
            }
            AppError::Upload(reason) => format!("❌ Error sending file: {}", reason),
            AppError::Telegram(error) => format!("❌ Error sending file: {}", error),
            _ => "❌ Something went wrong, try again later.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
