use thiserror::Error;

/// Failure talking to an external collaborator.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {service}: {reason}")]
    Decode { service: String, reason: String },

    #[error("Failed to resolve credentials: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The collaborator answered but refused the work.
    #[error("{0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
