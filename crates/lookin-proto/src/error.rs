//! Error taxonomy for the LookinServer protocol client (spec §7).
//!
//! Kinds, not type hierarchies: every variant below is one of the ten kinds
//! spec.md §7 enumerates. `Error` is `Clone` so a single failure can be
//! delivered to every pending request a teardown fails at once (spec §5,
//! "Disconnect is a broadcast cancellation").

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("send failed: {0}")]
    SendError(String),

    #[error("read failed: {0}")]
    ReadError(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("could not parse value for attribute {attribute:?}: {message}")]
    ParseError { attribute: String, message: String },

    #[error("unknown attribute: {0:?}")]
    UnknownAttribute(String),
}

pub type Result<T> = std::result::Result<T, Error>;
