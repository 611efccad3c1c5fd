use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection, timeout or body decoding failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// A 2xx answer whose body carried `error: true`.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Unauthorized(_))
    }
}
