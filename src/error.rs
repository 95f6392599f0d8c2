use reqwest::StatusCode;
use thiserror::Error;

/// Startup configuration problems. These are the only fatal errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Last.fm API key not found or is placeholder; set LASTFM_API_KEY via .env or environment variable")]
    MissingApiKey,
    #[error("Last.fm username not found or is placeholder; set LASTFM_USERNAME via .env or environment variable")]
    MissingUsername,
    #[error("poll interval must be at least one second")]
    InvalidInterval,
}

#[derive(Debug, Error)]
pub enum LastFmError {
    #[error("error connecting to Last.fm: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Last.fm responded with HTTP {0}")]
    Status(StatusCode),
    #[error("Last.fm API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("malformed Last.fm response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("error saving image file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("missing essential track field `{0}`")]
    MissingField(&'static str),
    #[error("invalid album art url `{url}`: {reason}")]
    InvalidArtUrl { url: String, reason: String },
}
