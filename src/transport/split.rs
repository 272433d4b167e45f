//! One-directional framed halves.

use std::io::{self, Read, Write};
use std::iter::FusedIterator;
use std::time::Duration;

use bytes::Bytes;
use tracing::instrument;

use super::socket::Duplex;
use crate::protocol::metrics::ActiveStream;
use crate::protocol::{self, PrefixCodec, Result};

/// Read half of a framed stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    codec: PrefixCodec,
    _active: Option<ActiveStream>,
}

impl<R> FrameReader<R> {
    /// Frame reads from `inner` with the given codec
    #[must_use]
    pub const fn new(inner: R, codec: PrefixCodec) -> Self {
        Self {
            inner,
            codec,
            _active: None,
        }
    }

    /// Read half of a split stream, carrying its active-stream guard
    pub(crate) const fn split_from(inner: R, codec: PrefixCodec, active: ActiveStream) -> Self {
        Self {
            inner,
            codec,
            _active: Some(active),
        }
    }

    /// Prefix codec in use
    #[must_use]
    pub const fn codec(&self) -> &PrefixCodec {
        &self.codec
    }

    /// Borrow the underlying reader
    #[must_use]
    pub const fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying reader.
    ///
    /// Reading from it directly desynchronizes the frame boundaries.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwrap the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> FrameReader<R> {
    /// Read one frame into a fresh buffer
    pub fn read_frame(&mut self) -> Result<Bytes> {
        protocol::read_frame(&mut self.inner, &self.codec)
    }

    /// Read one frame into `buf`, see [`protocol::read_frame_into`]
    pub fn read_frame_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        protocol::read_frame_into(&mut self.inner, &self.codec, buf)
    }

    /// Drain `len` payload bytes left behind by
    /// [`Error::BufferTooSmall`](crate::Error::BufferTooSmall)
    pub fn discard(&mut self, len: usize) -> Result<()> {
        protocol::discard(&mut self.inner, len)
    }

    /// Iterate over incoming frames until the stream closes
    pub fn frames(&mut self) -> Frames<'_, R> {
        Frames::new(&mut self.inner, self.codec)
    }
}

impl<R: Duplex> FrameReader<R> {
    /// Set the read timeout of the underlying stream
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(timeout)
    }

    /// Remote endpoint address
    pub fn peer_addr(&self) -> io::Result<R::Addr> {
        self.inner.peer_addr()
    }
}

impl<R: Read> Read for FrameReader<R> {
    /// Read at most one whole frame; `Ok(0)` at a clean end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(protocol::recv_into(&mut self.inner, &self.codec, buf)?.unwrap_or(0))
    }
}

/// Write half of a framed stream.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    codec: PrefixCodec,
}

impl<W> FrameWriter<W> {
    /// Frame writes to `inner` with the given codec
    #[must_use]
    pub const fn new(inner: W, codec: PrefixCodec) -> Self {
        Self { inner, codec }
    }

    /// Prefix codec in use
    #[must_use]
    pub const fn codec(&self) -> &PrefixCodec {
        &self.codec
    }

    /// Borrow the underlying writer
    #[must_use]
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying writer
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> FrameWriter<W> {
    /// Write one frame, returning the payload length
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<usize> {
        protocol::write_frame(&mut self.inner, &self.codec, payload)
    }
}

impl<W: Duplex> FrameWriter<W> {
    /// Set the write timeout of the underlying stream
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_write_timeout(timeout)
    }

    /// Shut down the write direction; the peer sees a clean end-of-stream
    #[instrument(level = "debug", skip(self))]
    pub fn finish(&self) -> io::Result<()> {
        self.inner.shutdown(std::net::Shutdown::Write)
    }
}

impl<W: Write> Write for FrameWriter<W> {
    /// Send `buf` as exactly one frame.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_frame(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Iterator over incoming frames.
///
/// Ends at a clean end-of-stream on a frame boundary. An error is yielded
/// once, after which the iterator is exhausted since the stream can no
/// longer be trusted to be frame-aligned.
#[derive(Debug)]
pub struct Frames<'a, R: ?Sized> {
    reader: &'a mut R,
    codec: PrefixCodec,
    done: bool,
}

impl<'a, R: Read + ?Sized> Frames<'a, R> {
    pub(crate) fn new(reader: &'a mut R, codec: PrefixCodec) -> Self {
        Self {
            reader,
            codec,
            done: false,
        }
    }
}

impl<R: Read + ?Sized> Iterator for Frames<'_, R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match protocol::recv_frame(&mut *self.reader, &self.codec) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: Read + ?Sized> FusedIterator for Frames<'_, R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ByteOrder, Error, PrefixWidth};
    use std::io::Cursor;

    fn codec() -> PrefixCodec {
        PrefixCodec::new(PrefixWidth::Two, ByteOrder::Little)
    }

    #[test]
    fn test_direct_reader_is_not_counted() {
        let reader = FrameReader::new(Cursor::new(Vec::<u8>::new()), codec());
        assert!(reader._active.is_none());
    }

    #[test]
    fn test_writer_and_reader_agree() {
        let mut writer = FrameWriter::new(Vec::new(), codec());
        writer.write_frame(b"alpha").unwrap();
        writer.write_frame(b"").unwrap();
        writer.write_frame(b"gamma").unwrap();

        let mut reader = FrameReader::new(Cursor::new(writer.into_inner()), codec());
        let frames: Vec<Bytes> = reader.frames().collect::<Result<_>>().unwrap();
        assert_eq!(frames, vec![
            Bytes::from_static(b"alpha"),
            Bytes::new(),
            Bytes::from_static(b"gamma"),
        ]);
    }

    #[test]
    fn test_frames_stops_after_truncation() {
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire, codec())
            .write_frame(b"whole")
            .unwrap();
        wire.extend_from_slice(&[9, 0, b'x']);

        let mut reader = FrameReader::new(Cursor::new(wire), codec());
        let mut frames = reader.frames();
        assert_eq!(frames.next().unwrap().unwrap().as_ref(), b"whole");
        assert!(frames.next().unwrap().unwrap_err().is_eof());
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_io_write_sends_one_frame_per_call() {
        let mut writer = FrameWriter::new(Vec::new(), codec());
        assert_eq!(writer.write(b"abc").unwrap(), 3);
        writer.flush().unwrap();
        assert_eq!(writer.get_ref().as_slice(), &[3, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn test_io_read_reports_clean_eof_as_zero() {
        let mut reader = FrameReader::new(Cursor::new(vec![1, 0, b'z']), codec());
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'z');
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_io_read_wraps_buffer_too_small() {
        let mut reader = FrameReader::new(Cursor::new(vec![4, 0, 1, 2, 3, 4]), codec());
        let mut buf = [0u8; 2];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(matches!(
            err.get_ref().and_then(|e| e.downcast_ref::<Error>()),
            Some(Error::BufferTooSmall { needed: 4, got: 2 })
        ));

        reader.discard(4).unwrap();
        assert!(reader.read_frame().unwrap_err().is_eof());
    }
}
