//! Length prefix codec and blocking frame I/O
//!
//! # Format
//!
//! ```text
//! [PREFIX (1, 2 or 4 bytes)] [PAYLOAD (variable)]
//! ```
//!
//! The prefix is the payload length as an unsigned integer in the configured
//! byte order. Frames follow each other with no padding or terminator.

use std::fmt;
use std::io::{self, Read, Write};
use std::ops::Deref;

use bytes::Bytes;
use tracing::{instrument, trace};

use super::metrics::{FrameDirection, Metrics};
use super::{ByteOrder, Error, MAX_PREFIX_LEN, PrefixWidth, Result};

type EncodeFn = fn(u32, &mut [u8; MAX_PREFIX_LEN]);
type DecodeFn = fn(&[u8]) -> u32;

/// Encoded length prefix, dereferences to the wire bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    bytes: [u8; MAX_PREFIX_LEN],
    len: usize,
}

impl Deref for Prefix {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl AsRef<[u8]> for Prefix {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Prefix").field(&self.deref()).finish()
    }
}

/// Prefix encoder/decoder for one width and byte order.
///
/// The conversion routines are picked once in [`PrefixCodec::new`], so framing
/// a message never branches on the configuration.
#[derive(Clone, Copy)]
pub struct PrefixCodec {
    width: PrefixWidth,
    order: ByteOrder,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl PrefixCodec {
    /// Select the codec for a prefix width and byte order
    #[must_use]
    pub fn new(width: PrefixWidth, order: ByteOrder) -> Self {
        let (encode, decode): (EncodeFn, DecodeFn) = match (width, order) {
            (PrefixWidth::One, _) => (encode_u8, decode_u8),
            (PrefixWidth::Two, ByteOrder::Big) => (encode_u16_be, decode_u16_be),
            (PrefixWidth::Two, ByteOrder::Little) => (encode_u16_le, decode_u16_le),
            (PrefixWidth::Four, ByteOrder::Big) => (encode_u32_be, decode_u32_be),
            (PrefixWidth::Four, ByteOrder::Little) => (encode_u32_le, decode_u32_le),
        };

        Self {
            width,
            order,
            encode,
            decode,
        }
    }

    /// Prefix width
    #[must_use]
    pub const fn width(&self) -> PrefixWidth {
        self.width
    }

    /// Prefix byte order
    #[must_use]
    pub const fn order(&self) -> ByteOrder {
        self.order
    }

    /// Largest payload this codec can describe
    #[must_use]
    pub const fn max_frame_size(&self) -> u64 {
        self.width.max_frame_size()
    }

    /// Encode a payload length into a prefix
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if `len` exceeds [`Self::max_frame_size`].
    pub fn encode(&self, len: usize) -> Result<Prefix> {
        let max = self.max_frame_size();
        let value = match u32::try_from(len) {
            Ok(value) if u64::from(value) <= max => value,
            _ => {
                Metrics::record_oversized();
                return Err(Error::FrameTooLarge {
                    size: len as u64,
                    max,
                });
            }
        };

        let mut bytes = [0u8; MAX_PREFIX_LEN];
        (self.encode)(value, &mut bytes);
        Ok(Prefix {
            bytes,
            len: self.width.as_usize(),
        })
    }

    /// Decode a prefix into a payload length
    ///
    /// Only the first `width` bytes of `prefix` are inspected.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` is shorter than the prefix width.
    #[must_use]
    pub fn decode(&self, prefix: &[u8]) -> usize {
        (self.decode)(&prefix[..self.width.as_usize()]) as usize
    }
}

impl fmt::Debug for PrefixCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixCodec")
            .field("width", &self.width)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PrefixCodec {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.order == other.order
    }
}

impl Eq for PrefixCodec {}

impl Default for PrefixCodec {
    fn default() -> Self {
        Self::new(PrefixWidth::default(), ByteOrder::default())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn encode_u8(value: u32, out: &mut [u8; MAX_PREFIX_LEN]) {
    out[0] = value as u8;
}

#[allow(clippy::cast_possible_truncation)]
fn encode_u16_be(value: u32, out: &mut [u8; MAX_PREFIX_LEN]) {
    out[..2].copy_from_slice(&(value as u16).to_be_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn encode_u16_le(value: u32, out: &mut [u8; MAX_PREFIX_LEN]) {
    out[..2].copy_from_slice(&(value as u16).to_le_bytes());
}

fn encode_u32_be(value: u32, out: &mut [u8; MAX_PREFIX_LEN]) {
    *out = value.to_be_bytes();
}

fn encode_u32_le(value: u32, out: &mut [u8; MAX_PREFIX_LEN]) {
    *out = value.to_le_bytes();
}

fn decode_u8(prefix: &[u8]) -> u32 {
    u32::from(prefix[0])
}

fn decode_u16_be(prefix: &[u8]) -> u32 {
    u32::from(u16::from_be_bytes([prefix[0], prefix[1]]))
}

fn decode_u16_le(prefix: &[u8]) -> u32 {
    u32::from(u16::from_le_bytes([prefix[0], prefix[1]]))
}

fn decode_u32_be(prefix: &[u8]) -> u32 {
    u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]])
}

fn decode_u32_le(prefix: &[u8]) -> u32 {
    u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]])
}

/// Write one frame: the prefix, then the payload.
///
/// Returns the payload length; prefix bytes are not counted.
///
/// # Errors
///
/// - [`Error::FrameTooLarge`] if the payload cannot be described by the
///   prefix; nothing is written in that case.
/// - [`Error::Write`] carrying the stream's own error and the number of
///   payload bytes written before it failed.
#[instrument(level = "trace", skip_all, fields(len = payload.len()))]
pub fn write_frame<W>(writer: &mut W, codec: &PrefixCodec, payload: &[u8]) -> Result<usize>
where
    W: Write + ?Sized,
{
    let prefix = codec.encode(payload.len())?;

    writer
        .write_all(&prefix)
        .map_err(|source| write_failed(source, 0))?;

    let mut written = 0;
    while written < payload.len() {
        match writer.write(&payload[written..]) {
            Ok(0) => {
                let source =
                    io::Error::new(io::ErrorKind::WriteZero, "failed to write whole frame");
                return Err(write_failed(source, written));
            }
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(source) => return Err(write_failed(source, written)),
        }
    }

    Metrics::record_frame(FrameDirection::Sent, payload.len());
    trace!(width = codec.width().as_u8(), len = payload.len(), "frame sent");
    Ok(payload.len())
}

/// Read one frame into a freshly allocated buffer.
///
/// Exactly the announced number of bytes is allocated.
///
/// # Errors
///
/// Returns [`Error::Read`] with the stream's own error if reading fails, or
/// an `UnexpectedEof` error if the stream ends before a complete frame.
pub fn read_frame<R>(reader: &mut R, codec: &PrefixCodec) -> Result<Bytes>
where
    R: Read + ?Sized,
{
    recv_frame(reader, codec)?.ok_or_else(closed_at_boundary)
}

/// Read one frame into `buf`, returning the payload length.
///
/// # Errors
///
/// Same as [`read_frame`], plus [`Error::BufferTooSmall`] when the announced
/// payload is longer than `buf`. The prefix has been consumed at that point
/// but the payload has not, so the stream stays out of sync until the caller
/// drains `needed` bytes with [`discard`].
pub fn read_frame_into<R>(reader: &mut R, codec: &PrefixCodec, buf: &mut [u8]) -> Result<usize>
where
    R: Read + ?Sized,
{
    recv_into(reader, codec, buf)?.ok_or_else(closed_at_boundary)
}

/// Skip `len` bytes of the stream.
///
/// Used to resynchronize after [`Error::BufferTooSmall`].
///
/// # Errors
///
/// Returns [`Error::Read`] if the stream fails or ends early.
pub fn discard<R>(reader: &mut R, len: usize) -> Result<()>
where
    R: Read + ?Sized,
{
    let expected = len as u64;
    let skipped = io::copy(&mut Read::take(&mut *reader, expected), &mut io::sink())
        .map_err(read_failed)?;
    if skipped < expected {
        return Err(read_failed(truncated(skipped, expected, "discarded")));
    }
    Ok(())
}

/// Allocating frame read that reports a clean end-of-stream as `None`.
#[instrument(level = "trace", skip_all)]
pub(crate) fn recv_frame<R>(reader: &mut R, codec: &PrefixCodec) -> Result<Option<Bytes>>
where
    R: Read + ?Sized,
{
    let Some(len) = read_prefix(reader, codec)? else {
        return Ok(None);
    };

    let mut payload = Vec::new();
    payload
        .try_reserve_exact(len)
        .map_err(|err| read_failed(io::Error::new(io::ErrorKind::OutOfMemory, err)))?;
    let filled = Read::take(&mut *reader, len as u64)
        .read_to_end(&mut payload)
        .map_err(read_failed)?;
    if filled < len {
        return Err(read_failed(truncated(
            filled as u64,
            len as u64,
            "payload",
        )));
    }

    Metrics::record_frame(FrameDirection::Received, len);
    trace!(width = codec.width().as_u8(), len, "frame received");
    Ok(Some(Bytes::from(payload)))
}

/// Fixed-buffer frame read that reports a clean end-of-stream as `None`.
#[instrument(level = "trace", skip_all, fields(capacity = buf.len()))]
pub(crate) fn recv_into<R>(
    reader: &mut R,
    codec: &PrefixCodec,
    buf: &mut [u8],
) -> Result<Option<usize>>
where
    R: Read + ?Sized,
{
    let Some(len) = read_prefix(reader, codec)? else {
        return Ok(None);
    };

    if len > buf.len() {
        Metrics::record_short_buffer();
        return Err(Error::BufferTooSmall {
            needed: len,
            got: buf.len(),
        });
    }

    read_payload(reader, &mut buf[..len])?;

    Metrics::record_frame(FrameDirection::Received, len);
    trace!(width = codec.width().as_u8(), len, "frame received");
    Ok(Some(len))
}

fn read_prefix<R>(reader: &mut R, codec: &PrefixCodec) -> Result<Option<usize>>
where
    R: Read + ?Sized,
{
    let width = codec.width().as_usize();
    let mut scratch = [0u8; MAX_PREFIX_LEN];

    let filled = read_full(reader, &mut scratch[..width]).map_err(read_failed)?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < width {
        return Err(read_failed(truncated(filled as u64, width as u64, "prefix")));
    }

    Ok(Some(codec.decode(&scratch)))
}

fn read_payload<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: Read + ?Sized,
{
    let filled = read_full(reader, buf).map_err(read_failed)?;
    if filled < buf.len() {
        return Err(read_failed(truncated(
            filled as u64,
            buf.len() as u64,
            "payload",
        )));
    }
    Ok(())
}

/// Fill `buf` across short reads, stopping early only at end-of-stream.
fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: Read + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn truncated(filled: u64, expected: u64, part: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("stream closed after {filled} of {expected} {part} bytes"),
    )
}

/// Clean end-of-stream; not counted as a read error.
fn closed_at_boundary() -> Error {
    Error::Read(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "stream closed at frame boundary",
    ))
}

fn read_failed(err: io::Error) -> Error {
    Metrics::record_error(FrameDirection::Received);
    Error::Read(err)
}

fn write_failed(source: io::Error, written: usize) -> Error {
    Metrics::record_error(FrameDirection::Sent);
    Error::Write { source, written }
}
