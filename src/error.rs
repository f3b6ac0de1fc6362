use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetch failed for {feed}: {reason}")]
    Fetch { feed: String, reason: String },

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown feed: {0}")]
    UnknownFeed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures that make a fetched document unusable for its feed.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The historical-results container is absent; nothing in the page can be trusted.
    #[error("history container not found (tried {tried})")]
    MissingAnchor { tried: String },

    #[error("invalid selector {selector}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::UnknownFeed(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
