use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or incomplete credentials, or no identity to fetch for.
    #[error("{0}")]
    Configuration(String),

    #[error("Could not resolve user id for @{username}. Response: {response}")]
    IdentityResolution { username: String, response: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Could not sign request: {0}")]
    Signing(String),
}

/// Everything that can go wrong between issuing a GET and holding a parsed JSON body.  None of
/// these are retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] hyper::Error),

    #[error("could not build request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response was not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Error::Transport(e.into())
    }
}

impl From<hyper::http::Error> for Error {
    fn from(e: hyper::http::Error) -> Self {
        Error::Transport(e.into())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Transport(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Transport(e.into())
    }
}

impl Error {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
