//! Stream management passthrough for framed endpoints.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// Byte stream whose management operations a framed stream forwards
/// unchanged: shutdown, timeouts, endpoint addresses and handle cloning.
///
/// Framing itself only needs [`Read`] and [`Write`]; this trait unlocks the
/// passthrough methods on [`FramedStream`](super::FramedStream) and its halves.
pub trait Duplex: Read + Write + Sized {
    /// Endpoint address type reported by the stream.
    type Addr;

    /// Shut down the read half, the write half, or both.
    fn shutdown(&self, how: Shutdown) -> io::Result<()>;

    /// Set the read timeout; `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Set the write timeout; `None` blocks indefinitely.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Local endpoint address.
    fn local_addr(&self) -> io::Result<Self::Addr>;

    /// Remote endpoint address.
    fn peer_addr(&self) -> io::Result<Self::Addr>;

    /// Create a second handle to the same stream.
    fn try_clone(&self) -> io::Result<Self>;
}

impl Duplex for TcpStream {
    type Addr = SocketAddr;

    fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        TcpStream::shutdown(self, how)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }
}

#[cfg(unix)]
impl Duplex for std::os::unix::net::UnixStream {
    type Addr = std::os::unix::net::SocketAddr;

    fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        Self::shutdown(self, how)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_write_timeout(self, timeout)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Self::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<Self::Addr> {
        Self::peer_addr(self)
    }

    fn try_clone(&self) -> io::Result<Self> {
        Self::try_clone(self)
    }
}
