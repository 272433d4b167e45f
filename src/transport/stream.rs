//! Framed duplex stream.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, instrument};

use super::socket::Duplex;
use super::split::{FrameReader, FrameWriter, Frames};
use crate::protocol::metrics::ActiveStream;
use crate::protocol::{self, ByteOrder, PrefixCodec, PrefixWidth, Result};

/// Framing configuration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FramingConfig {
    /// Bytes used to encode each payload length.
    pub prefix_width: PrefixWidth,
    /// Serialization order of the prefix.
    pub byte_order: ByteOrder,
}

impl FramingConfig {
    /// Create a configuration from its parts.
    #[must_use]
    pub const fn new(prefix_width: PrefixWidth, byte_order: ByteOrder) -> Self {
        Self {
            prefix_width,
            byte_order,
        }
    }

    /// Replace the prefix width.
    #[must_use]
    pub const fn with_prefix_width(mut self, prefix_width: PrefixWidth) -> Self {
        self.prefix_width = prefix_width;
        self
    }

    /// Replace the byte order.
    #[must_use]
    pub const fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Largest payload a frame can carry with this configuration.
    #[must_use]
    pub const fn max_frame_size(&self) -> u64 {
        self.prefix_width.max_frame_size()
    }

    /// Build the prefix codec described by this configuration.
    #[must_use]
    pub fn codec(&self) -> PrefixCodec {
        PrefixCodec::new(self.prefix_width, self.byte_order)
    }
}

impl From<PrefixCodec> for FramingConfig {
    fn from(codec: PrefixCodec) -> Self {
        Self::new(codec.width(), codec.order())
    }
}

/// Message-oriented view of a byte stream.
///
/// Every [`write_frame`](Self::write_frame) sends one length-prefixed frame
/// and every read returns exactly one whole frame.
///
/// A write and a read are each a prefix step followed by a payload step, so
/// both take `&mut self`. To read and write from different threads, split the
/// stream with [`try_split`](Self::try_split).
///
/// # Examples
///
/// ```rust,no_run
/// use std::net::TcpStream;
/// use framing::{ByteOrder, FramedStream};
///
/// let stream = TcpStream::connect("127.0.0.1:7000")?;
/// let mut framed = FramedStream::new(stream, 2, ByteOrder::Big)?;
///
/// framed.write_frame(b"ping")?;
/// let reply = framed.read_frame()?;
/// println!("{} byte reply", reply.len());
/// framed.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct FramedStream<S> {
    inner: S,
    codec: PrefixCodec,
    _active: ActiveStream,
}

impl<S> FramedStream<S> {
    /// Wrap `stream`, validating the prefix width.
    ///
    /// No I/O is performed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPrefixWidth`](crate::Error::InvalidPrefixWidth)
    /// unless `prefix_width` is 1, 2 or 4.
    pub fn new(stream: S, prefix_width: u8, byte_order: ByteOrder) -> Result<Self> {
        let width = PrefixWidth::try_from(prefix_width)?;
        Ok(Self::with_codec(stream, PrefixCodec::new(width, byte_order)))
    }

    /// Wrap `stream` using a validated configuration.
    #[must_use]
    pub fn with_config(stream: S, config: FramingConfig) -> Self {
        Self::with_codec(stream, config.codec())
    }

    /// Wrap `stream` using an existing prefix codec.
    #[must_use]
    pub fn with_codec(stream: S, codec: PrefixCodec) -> Self {
        Self {
            inner: stream,
            codec,
            _active: ActiveStream::open(),
        }
    }

    /// Prefix codec in use
    #[must_use]
    pub const fn codec(&self) -> &PrefixCodec {
        &self.codec
    }

    /// Configuration this stream was built with
    #[must_use]
    pub fn config(&self) -> FramingConfig {
        FramingConfig::from(self.codec)
    }

    /// Prefix width
    #[must_use]
    pub const fn prefix_width(&self) -> PrefixWidth {
        self.codec.width()
    }

    /// Prefix byte order
    #[must_use]
    pub const fn byte_order(&self) -> ByteOrder {
        self.codec.order()
    }

    /// Largest payload a single frame can carry
    #[must_use]
    pub const fn max_frame_size(&self) -> u64 {
        self.codec.max_frame_size()
    }

    /// Borrow the underlying stream
    #[must_use]
    pub const fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    ///
    /// Reading or writing through it directly breaks frame alignment.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the underlying stream without closing it
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Write> FramedStream<S> {
    /// Send `payload` as one frame.
    ///
    /// Returns the payload length; prefix bytes are not counted.
    ///
    /// # Errors
    ///
    /// [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) before anything is
    /// written, or [`Error::Write`](crate::Error::Write) with the stream's
    /// error. Writes are never retried.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<usize> {
        protocol::write_frame(&mut self.inner, &self.codec, payload)
    }
}

impl<S: Read> FramedStream<S> {
    /// Receive one frame into a freshly allocated buffer.
    ///
    /// # Errors
    ///
    /// [`Error::Read`](crate::Error::Read) with the stream's error. A stream
    /// that ends before or inside a frame yields `UnexpectedEof`; after a
    /// truncated frame the stream must not be used again.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        protocol::read_frame(&mut self.inner, &self.codec)
    }

    /// Receive one frame into `buf`, returning its length.
    ///
    /// # Errors
    ///
    /// As [`read_frame`](Self::read_frame), plus
    /// [`Error::BufferTooSmall`](crate::Error::BufferTooSmall) if the frame does
    /// not fit. The prefix is consumed in that case and the payload is not:
    /// the stream stays desynchronized until [`discard`](Self::discard) drains
    /// exactly `needed` bytes.
    pub fn read_frame_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        protocol::read_frame_into(&mut self.inner, &self.codec, buf)
    }

    /// Drain `len` bytes from the stream.
    pub fn discard(&mut self, len: usize) -> Result<()> {
        protocol::discard(&mut self.inner, len)
    }

    /// Iterate over incoming frames until the peer closes the stream
    pub fn frames(&mut self) -> Frames<'_, S> {
        Frames::new(&mut self.inner, self.codec)
    }
}

impl<S: Duplex> FramedStream<S> {
    /// Shut down both directions and release the stream.
    #[instrument(level = "debug", skip(self))]
    pub fn close(self) -> io::Result<()> {
        let result = self.inner.shutdown(Shutdown::Both);
        debug!(width = self.codec.width().as_u8(), "framed stream closed");
        result
    }

    /// Set the read timeout of the underlying stream
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(timeout)
    }

    /// Set the write timeout of the underlying stream
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_write_timeout(timeout)
    }

    /// Set both read and write timeouts
    pub fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(timeout)?;
        self.inner.set_write_timeout(timeout)
    }

    /// Local endpoint address
    pub fn local_addr(&self) -> io::Result<S::Addr> {
        self.inner.local_addr()
    }

    /// Remote endpoint address
    pub fn peer_addr(&self) -> io::Result<S::Addr> {
        self.inner.peer_addr()
    }

    /// Split into halves that can be moved to separate threads.
    ///
    /// The stream handle is cloned; if cloning fails the stream is dropped.
    /// The read half keeps the stream counted as active until it is dropped.
    #[instrument(level = "debug", skip(self))]
    pub fn try_split(self) -> io::Result<(FrameReader<S>, FrameWriter<S>)> {
        let writer = self.inner.try_clone()?;
        let Self {
            inner,
            codec,
            _active: active,
        } = self;
        debug!(width = codec.width().as_u8(), "framed stream split");
        Ok((
            FrameReader::split_from(inner, codec, active),
            FrameWriter::new(writer, codec),
        ))
    }
}

impl<S: Read> Read for FramedStream<S> {
    /// Read at most one whole frame; `Ok(0)` at a clean end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(protocol::recv_into(&mut self.inner, &self.codec, buf)?.unwrap_or(0))
    }
}

impl<S: Write> Write for FramedStream<S> {
    /// Send `buf` as exactly one frame.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_frame(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::protocol::metrics::local_active_streams;
    use std::io::Cursor;

    #[test]
    fn test_new_validates_width() {
        for width in [0u8, 3, 8] {
            let result = FramedStream::new(Cursor::new(Vec::<u8>::new()), width, ByteOrder::Big);
            assert!(matches!(
                result,
                Err(Error::InvalidPrefixWidth { width: w }) if w == width
            ));
        }

        let framed = FramedStream::new(Cursor::new(Vec::<u8>::new()), 2, ByteOrder::Little).unwrap();
        assert_eq!(framed.prefix_width(), PrefixWidth::Two);
        assert_eq!(framed.byte_order(), ByteOrder::Little);
        assert_eq!(framed.max_frame_size(), 65_535);
    }

    #[test]
    fn test_config_builder() {
        let config = FramingConfig::default()
            .with_prefix_width(PrefixWidth::One)
            .with_byte_order(ByteOrder::Little);
        assert_eq!(config.max_frame_size(), 255);

        let framed = FramedStream::with_config(Vec::<u8>::new(), config);
        assert_eq!(framed.config(), config);
        assert_eq!(FramingConfig::default().codec(), PrefixCodec::default());
    }

    #[test]
    fn test_write_then_read_on_one_buffer() {
        let mut framed = FramedStream::with_config(Cursor::new(Vec::<u8>::new()), FramingConfig::default());
        assert_eq!(framed.write_frame(b"13 bytes long").unwrap(), 13);
        assert_eq!(framed.write_frame(b"13 bytes long").unwrap(), 13);
        assert_eq!(framed.get_ref().get_ref().len(), 2 * (4 + 13));

        framed.get_mut().set_position(0);
        assert_eq!(framed.read_frame().unwrap().as_ref(), b"13 bytes long");

        let mut fixed = [0u8; 20];
        assert_eq!(framed.read_frame_into(&mut fixed).unwrap(), 13);
        assert_eq!(&fixed[..13], b"13 bytes long");
    }

    #[test]
    fn test_io_traits_keep_frame_boundaries() {
        let mut framed = FramedStream::new(Cursor::new(Vec::<u8>::new()), 1, ByteOrder::Big).unwrap();
        framed.write_all(b"one").unwrap();
        framed.write_all(b"two!").unwrap();
        framed.flush().unwrap();

        framed.get_mut().set_position(0);
        let mut buf = [0u8; 16];
        assert_eq!(framed.read(&mut buf).unwrap(), 3);
        assert_eq!(framed.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"two!");
        assert_eq!(framed.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_frames_iterator() {
        let mut framed = FramedStream::new(Cursor::new(Vec::<u8>::new()), 4, ByteOrder::Little).unwrap();
        for payload in [&b"a"[..], b"bc", b"def"] {
            framed.write_frame(payload).unwrap();
        }
        framed.get_mut().set_position(0);

        let lens: Vec<usize> = framed.frames().map(|f| f.unwrap().len()).collect();
        assert_eq!(lens, vec![1, 2, 3]);
    }

    #[test]
    fn test_active_stream_gauge_tracks_lifetime() {
        let start = local_active_streams();
        let framed = FramedStream::with_config(Vec::<u8>::new(), FramingConfig::default());
        assert_eq!(local_active_streams(), start + 1);
        assert!(crate::metrics().active_streams >= 1);

        let _inner: Vec<u8> = framed.into_inner();
        assert_eq!(local_active_streams(), start);
    }

    #[cfg(unix)]
    #[test]
    fn test_split_halves_stay_counted() {
        use std::os::unix::net::UnixStream;

        let (a, b) = UnixStream::pair().unwrap();
        let start = local_active_streams();
        let framed = FramedStream::new(a, 2, ByteOrder::Big).unwrap();
        assert_eq!(local_active_streams(), start + 1);

        let (mut reader, mut writer) = framed.try_split().unwrap();
        assert_eq!(local_active_streams(), start + 1);

        // halves still carry traffic while counted
        let mut peer = FrameWriter::new(b, PrefixCodec::new(PrefixWidth::Two, ByteOrder::Big));
        peer.write_frame(b"in").unwrap();
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"in");
        writer.write_frame(b"out").unwrap();

        drop(writer);
        assert_eq!(local_active_streams(), start + 1);
        drop(reader);
        assert_eq!(local_active_streams(), start);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_serde() {
        let config: FramingConfig =
            serde_json::from_str(r#"{"prefix_width":2,"byte_order":"little"}"#).unwrap();
        assert_eq!(config, FramingConfig::new(PrefixWidth::Two, ByteOrder::Little));

        let partial: FramingConfig = serde_json::from_str(r#"{"prefix_width":1}"#).unwrap();
        assert_eq!(partial.byte_order, ByteOrder::Big);

        assert!(serde_json::from_str::<FramingConfig>(r#"{"prefix_width":3}"#).is_err());
        let json = serde_json::to_string(&FramingConfig::default()).unwrap();
        assert_eq!(json, r#"{"prefix_width":4,"byte_order":"big"}"#);
    }
}
