use reqwest::StatusCode;

// Custom error type for fetch-and-relay operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Origin returned status code {0}")]
    OriginStatus(StatusCode),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic relay error: {0}")]
    Generic(String),
}

impl RelayError {
    /// Status code the origin answered with, when the failure was an
    /// upstream one. Used to pass the origin status through unchanged.
    pub fn origin_status(&self) -> Option<StatusCode> {
        match self {
            RelayError::OriginStatus(status) => Some(*status),
            _ => None,
        }
    }
}
