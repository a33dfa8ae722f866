use std::io;
use thiserror::Error;

/// Frame-level decode failures.
///
/// All of these are local to the reader loop: the offending burst is
/// dropped and logged at debug level, no event is emitted, and the loop
/// continues. They never escalate to the adaptor state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("burst shorter than the fixed frame header")]
    Truncated,

    #[error("destination {0:#06X} is not an accepted address")]
    NotForUs(u16),

    #[error("unknown function byte {0:#04X}")]
    UnknownFunction(u8),
}

/// Custom error types for the radio adaptor
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serial link unavailable: {0}")]
    LinkUnavailable(String),

    #[error("serial write failed: {0}")]
    LinkWrite(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("frame of {0} bytes overflows the one-byte length field")]
    OversizeFrame(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("message bus error: {0}")]
    Bus(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new link-unavailable error (fatal: requires adaptor restart)
    pub fn link_unavailable(msg: impl Into<String>) -> Self {
        Error::LinkUnavailable(msg.into())
    }

    /// Creates a new link-write error
    pub fn link_write(msg: impl Into<String>) -> Self {
        Error::LinkWrite(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new message-bus error
    pub fn bus(msg: impl Into<String>) -> Self {
        Error::Bus(msg.into())
    }

    /// Creates a new internal error (unrecoverable fault)
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
