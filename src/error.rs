//! Errors handed back to the host
//!
//! Only caller mistakes and local resource failures end up here. Anything that
//! goes wrong while talking to the daemon is logged and degraded to a
//! sentinel string instead.

use std::io;

use thiserror::Error;

/// Return codes understood by the host's expansion function interface.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A result string was produced, possibly one of the sentinels.
    Ok = 0,
    /// Temporary failure, never produced by this module.
    Defer = 1,
    /// The lookup could not be performed for this input.
    Fail = 2,
    /// The module was invoked incorrectly.
    Error = 3,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid number of arguments.")]
    InvalidArguments { expected: usize, got: usize },

    #[error("Socket path is too long.")]
    SocketPathTooLong { len: usize, max: usize },

    #[error("Unrecognized address format.")]
    UnrecognizedAddress(String),

    #[error("Call to socket() failed (errno = {}).", errno(.0))]
    Socket(#[source] io::Error),

    #[error("Unable to start I/O driver (errno = {}).", errno(.0))]
    Runtime(#[source] io::Error),

    #[error("Unable to read configuration: {0}")]
    ConfigIo(#[source] io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// The code the host should see for this error.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::InvalidArguments { .. }
            | Self::SocketPathTooLong { .. }
            | Self::ConfigIo(_)
            | Self::Config(_) => Outcome::Error,
            Self::UnrecognizedAddress(_) | Self::Socket(_) | Self::Runtime(_) => Outcome::Fail,
        }
    }
}

/// The OS error number carried by `err`, or -1 when there is none.
#[must_use]
pub fn errno(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(-1)
}

pub type Result<T> = std::result::Result<T, Error>;
