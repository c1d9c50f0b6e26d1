use std::time::Duration;

use thiserror::Error;

use crate::encoding::Encoding;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid transport option: {0}")]
    InvalidOption(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("unknown encoding set on transport: {0}")]
    UnsupportedEncoding(Encoding),

    #[error("{transport}: failed to encode or decode event: {message}")]
    Codec {
        transport: &'static str,
        message: String,
    },

    #[error("failed to encode Event into a Message: {0}")]
    UnexpectedMessage(String),

    #[error("{transport} {operation} failed: {message}")]
    Backend {
        transport: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("{0}: no receiver registered")]
    NoReceiver(&'static str),

    #[error("{0} doesn't implement receiver")]
    ReceiveUnsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("receiver shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

impl Error {
    pub(crate) fn codec(transport: &'static str, message: impl Into<String>) -> Self {
        Error::Codec {
            transport,
            message: message.into(),
        }
    }

    pub(crate) fn backend(
        transport: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Error::Backend {
            transport,
            operation,
            message: message.into(),
        }
    }
}
