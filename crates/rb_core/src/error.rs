use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data access error: {0}")]
    DataAccess(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Wraps any store-side failure as a retrieval failure, keeping
    /// errors that are already retrieval errors untouched.
    pub fn into_retrieval(self) -> Self {
        match self {
            Error::Retrieval(msg) => Error::Retrieval(msg),
            other => Error::Retrieval(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
