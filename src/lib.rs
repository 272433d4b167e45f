//! Length-prefixed message framing over blocking byte streams
//!
//! A byte stream such as a TCP connection keeps bytes in order but has no
//! notion of messages. This crate puts a fixed-width length prefix in front of
//! every message so the receiver reads back exactly the boundaries the sender
//! wrote.
//!
//! # Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//! use framing::{ByteOrder, FramedStream};
//!
//! // Any `Read + Write` works; a cursor stands in for a connection here.
//! let mut framed = FramedStream::new(Cursor::new(Vec::new()), 2, ByteOrder::Big)?;
//! framed.write_frame(b"hello")?;
//! framed.write_frame(b"world")?;
//!
//! framed.get_mut().set_position(0);
//! assert_eq!(framed.read_frame()?.as_ref(), b"hello");
//!
//! let mut buf = [0u8; 16];
//! let n = framed.read_frame_into(&mut buf)?;
//! assert_eq!(&buf[..n], b"world");
//! # Ok::<(), framing::Error>(())
//! ```
//!
//! # Wire Format
//!
//! ```text
//! [PREFIX (1, 2 or 4 bytes)] [PAYLOAD (prefix value bytes)]
//! ```
//!
//! The prefix is the payload length, big- or little-endian. There is no magic
//! number, version, checksum or terminator.
//!
//! | prefix width | max payload bytes |
//! |---|---|
//! | 1 | 255 |
//! | 2 | 65535 |
//! | 4 | 4294967295 |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod protocol;
pub mod transport;

pub use protocol::{
    ByteOrder, Error, MAX_PREFIX_LEN, MetricsSnapshot, Prefix, PrefixCodec, PrefixWidth, Result,
    discard, read_frame, read_frame_into, write_frame,
};
pub use transport::{Duplex, FrameReader, FrameWriter, FramedStream, Frames, FramingConfig};

/// Snapshot of the process-wide framing counters
#[must_use]
pub fn metrics() -> MetricsSnapshot {
    protocol::metrics::Metrics::totals()
}
