//! Error type shared by every module of the crate.
//!
//! Two broad categories are distinguished:
//! - misuse (an ill-formed path, an empty command line, a handle in the wrong
//!   state), which the caller can fix by changing the call;
//! - [`Error::Io`], a platform call that failed. The wrapped [`std::io::Error`]
//!   carries the raw OS error code.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Standard stream of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Stdin => write!(f, "stdin"),
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The string is not a valid path identifier.
    #[error("invalid path: '{path}'")]
    InvalidPath { path: String },

    /// A command line needs at least the program name.
    #[error("empty command line")]
    EmptyCommandLine,

    /// The redirection mode is not supported for this stream.
    #[error("invalid redirection of {stream}: {mode}")]
    InvalidRedirect { stream: Stream, mode: &'static str },

    /// `open` was called while the previous child is still alive.
    #[error("previously opened process {pid} not terminated yet")]
    AlreadyRunning { pid: u32 },

    /// The operation needs a child that has been spawned.
    #[error("no subprocess has been started")]
    NotRunning,

    /// A platform call failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_path(path: &str) -> Self {
        Error::InvalidPath {
            path: path.to_string(),
        }
    }

    /// Platform error code of the failed call, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_path_message_quotes_input() {
        let e = Error::invalid_path("C::/");
        assert_eq!(e.to_string(), "invalid path: 'C::/'");
    }

    #[test]
    fn io_error_exposes_os_code() {
        let e = Error::from(std::io::Error::from_raw_os_error(2));
        assert_eq!(e.raw_os_error(), Some(2));
        assert_eq!(Error::NotRunning.raw_os_error(), None);
    }

    #[test]
    fn redirect_message_names_stream() {
        let e = Error::InvalidRedirect {
            stream: Stream::Stdin,
            mode: "merge with output",
        };
        assert_eq!(e.to_string(), "invalid redirection of stdin: merge with output");
    }
}
