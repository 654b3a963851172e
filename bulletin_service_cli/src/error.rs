use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to parse feed {url}: {reason}")]
    Feed { url: String, reason: String },

    #[error("no useful content could be extracted from {0}")]
    NoContent(String),

    #[error("search query must have at least {min} characters")]
    QueryTooShort { min: usize },

    #[error("bulletin #{0} not found")]
    NotFound(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Whether a feed/page download is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Http(_) => true,
            ServiceError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
