//! Framing error types

use std::io;

use thiserror::Error;

/// Framing errors
#[derive(Error, Debug)]
pub enum Error {
    /// Prefix width outside {1, 2, 4}
    #[error("invalid prefix width: {width} (expected 1, 2 or 4)")]
    InvalidPrefixWidth {
        /// Rejected width
        width: u8,
    },

    /// Payload cannot be described by the configured prefix
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Payload size
        size: u64,
        /// Maximum allowed for the prefix width
        max: u64,
    },

    /// Incoming frame does not fit the caller's buffer.
    ///
    /// The prefix has already been consumed while the payload has not, so the
    /// stream is out of sync until exactly `needed` bytes are drained.
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Announced payload length
        needed: usize,
        /// Capacity of the supplied buffer
        got: usize,
    },

    /// Underlying stream failed while reading, end-of-stream included
    #[error(transparent)]
    Read(io::Error),

    /// Underlying stream failed while writing
    #[error("write failed after {written} payload bytes: {source}")]
    Write {
        /// Original stream error
        #[source]
        source: io::Error,
        /// Payload bytes that reached the stream before the failure
        written: usize,
    },
}

impl Error {
    /// Whether the stream ended before a complete frame was read
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Read(err) if err.kind() == io::ErrorKind::UnexpectedEof)
    }

    /// Convert into an `io::Error`, handing back the original stream error
    /// for `Read` and `Write` failures.
    #[must_use]
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Read(err) | Self::Write { source: err, .. } => err,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        err.into_io()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_is_transparent() {
        let err = Error::Read(io::Error::other("InnerReadError"));
        assert_eq!(err.to_string(), "InnerReadError");
        assert!(!err.is_eof());
    }

    #[test]
    fn test_into_io_preserves_original() {
        let err = Error::Write {
            source: io::Error::new(io::ErrorKind::BrokenPipe, "WriteError"),
            written: 0,
        };
        let io_err = err.into_io();
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(io_err.to_string(), "WriteError");
    }

    #[test]
    fn test_into_io_wraps_framing_errors() {
        let err: io::Error = Error::BufferTooSmall { needed: 4, got: 2 }.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let inner = err.into_inner().unwrap();
        assert!(matches!(
            inner.downcast_ref::<Error>(),
            Some(Error::BufferTooSmall { needed: 4, got: 2 })
        ));
    }

    #[test]
    fn test_is_eof() {
        let err = Error::Read(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(err.is_eof());
    }
}
