use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The news provider answered, but reported an error in its payload.
    #[error("Upstream rejected request: {message}")]
    UpstreamRejected {
        message: String,
        code: Option<String>,
    },

    /// The call to the news provider failed at the network or HTTP layer.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Message suitable for the `message` field of an error response.
    pub fn detail(&self) -> String {
        match self {
            Error::UpstreamRejected { message, .. } => message.clone(),
            Error::Transport(message)
            | Error::Store(message)
            | Error::InvalidFilter(message)
            | Error::InvalidUrl(message)
            | Error::Config(message) => message.clone(),
            Error::Serialization(e) => e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
