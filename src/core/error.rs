//! Error taxonomy shared by the engines and stores.

use thiserror::Error;

/// Failure kinds surfaced to callers. Validation failures are raised before
/// any I/O; upstream failures abort the whole refresh and name the feed that
/// failed; store failures carry the storage engine's message.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {param}: {message}")]
    Validation {
        param: &'static str,
        message: String,
    },

    #[error("{feed} upstream error: {message}")]
    Upstream { feed: String, message: String },

    #[error("store error: {message}")]
    Store { message: String },
}

impl Error {
    pub fn validation(param: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            param,
            message: message.into(),
        }
    }

    pub fn upstream(feed: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Upstream {
            feed: feed.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Error::Store {
            message: message.into(),
        }
    }
}

impl From<fjall::Error> for Error {
    fn from(err: fjall::Error) -> Self {
        Error::store(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::store(format!("serialization failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
