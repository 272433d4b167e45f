//! Framing protocol core
//!
//! This module provides the prefix wire format, its codec, and the blocking
//! frame read/write routines shared by every stream adapter.

mod codec;
mod error;
pub(crate) mod metrics;
mod types;

pub(crate) use codec::{recv_frame, recv_into};
pub use codec::{Prefix, PrefixCodec, discard, read_frame, read_frame_into, write_frame};
pub use error::{Error, Result};
pub use metrics::MetricsSnapshot;
pub use types::{ByteOrder, PrefixWidth};

/// Widest supported prefix in bytes
pub const MAX_PREFIX_LEN: usize = 4;
