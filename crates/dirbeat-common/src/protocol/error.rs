use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("DIR @ {0} does not respond")]
    DirUnreachable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("DIR rejected the request: {0}")]
    Remote(String),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DirError>;
