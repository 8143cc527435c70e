use std::io;
use thiserror::Error;
use crate::protocol::FrameError;

/// type alias for all operations in this crate that could fail with a [`KvdError`]
pub type Result<T> = std::result::Result<T, KvdError>;

/// Error variants used across the server, client and protocol layers.
/// It wraps any lower level errors from third party crates
#[derive(Error)]
pub enum KvdError {
    /// variant for errors caused by std::io
    #[error("IO error")]
    Io {
        /// source of the IO Error
        #[from]
        source: io::Error,
    },

    /// variant for malformed or over-limit frames on the wire
    #[error("protocol error")]
    Frame {
        /// the frame error that was detected
        #[from]
        source: FrameError,
    },

    /// variant for errors when parsing strings to some other type
    #[error("{}", .0)]
    Parsing(String),

    /// variant for reporting unexpected or error responses received from the server
    #[error("{}", .0)]
    Server(String),
}

/// a custom Debug implementation that will write the entire error chain
impl std::fmt::Debug for KvdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// writes the entire error chain of the given error `e`, to the formatter.
fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by: {}", cause)?;
        current = cause.source();
    }
    Ok(())
}
