//! Stream adapters that own an underlying byte stream

mod socket;
mod split;
mod stream;

pub use socket::Duplex;
pub use split::{FrameReader, FrameWriter, Frames};
pub use stream::{FramedStream, FramingConfig};
