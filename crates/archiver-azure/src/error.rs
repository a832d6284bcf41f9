//! Error types for archiver-azure

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure to construct a client. Never carries secret material.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection string is empty")]
    EmptyConnectionString,

    #[error("connection string segment {0} is not a Key=Value pair")]
    MalformedSegment(usize),

    #[error("connection string is missing {0}")]
    MissingSetting(&'static str),

    #[error("account key is not valid base64: {0}")]
    InvalidAccountKey(#[from] base64::DecodeError),

    #[error("invalid blob endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<ClientError> for archiver_core::Error {
    fn from(err: ClientError) -> Self {
        archiver_core::Error::Configuration(err.to_string())
    }
}
