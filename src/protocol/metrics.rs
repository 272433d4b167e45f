use std::sync::atomic::{AtomicU64, Ordering};

/// Track framing metrics without external dependencies.
pub(crate) struct Metrics;

static FRAMES_SENT: AtomicU64 = AtomicU64::new(0);
static FRAMES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static BYTES_SENT: AtomicU64 = AtomicU64::new(0);
static BYTES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static OVERSIZED_FRAMES: AtomicU64 = AtomicU64::new(0);
static SHORT_BUFFERS: AtomicU64 = AtomicU64::new(0);
static READ_ERRORS: AtomicU64 = AtomicU64::new(0);
static WRITE_ERRORS: AtomicU64 = AtomicU64::new(0);
static ACTIVE_STREAMS: AtomicU64 = AtomicU64::new(0);

// Per-thread mirrors so unit tests can assert exact deltas while other
// tests update the process-wide counters concurrently.
#[cfg(test)]
thread_local! {
    static LOCAL_READ_ERRORS: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
    static LOCAL_ACTIVE_STREAMS: std::cell::Cell<i64> = const { std::cell::Cell::new(0) };
}

/// Direction of frame flow for counting.
#[derive(Clone, Copy)]
pub(crate) enum FrameDirection {
    Sent,
    Received,
}

impl Metrics {
    #[inline]
    pub(crate) fn record_frame(direction: FrameDirection, payload_len: usize) {
        let len = payload_len as u64;
        match direction {
            FrameDirection::Sent => {
                FRAMES_SENT.fetch_add(1, Ordering::Relaxed);
                BYTES_SENT.fetch_add(len, Ordering::Relaxed);
            }
            FrameDirection::Received => {
                FRAMES_RECEIVED.fetch_add(1, Ordering::Relaxed);
                BYTES_RECEIVED.fetch_add(len, Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub(crate) fn record_oversized() {
        OVERSIZED_FRAMES.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_short_buffer() {
        SHORT_BUFFERS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_error(direction: FrameDirection) {
        match direction {
            FrameDirection::Sent => WRITE_ERRORS.fetch_add(1, Ordering::Relaxed),
            FrameDirection::Received => {
                #[cfg(test)]
                LOCAL_READ_ERRORS.with(|n| n.set(n.get() + 1));
                READ_ERRORS.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    #[inline]
    pub(crate) fn record_stream_open() {
        #[cfg(test)]
        LOCAL_ACTIVE_STREAMS.with(|n| n.set(n.get() + 1));
        ACTIVE_STREAMS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_stream_close() {
        #[cfg(test)]
        LOCAL_ACTIVE_STREAMS.with(|n| n.set(n.get() - 1));
        ACTIVE_STREAMS.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn totals() -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: FRAMES_SENT.load(Ordering::Relaxed),
            frames_received: FRAMES_RECEIVED.load(Ordering::Relaxed),
            bytes_sent: BYTES_SENT.load(Ordering::Relaxed),
            bytes_received: BYTES_RECEIVED.load(Ordering::Relaxed),
            oversized_frames: OVERSIZED_FRAMES.load(Ordering::Relaxed),
            short_buffers: SHORT_BUFFERS.load(Ordering::Relaxed),
            read_errors: READ_ERRORS.load(Ordering::Relaxed),
            write_errors: WRITE_ERRORS.load(Ordering::Relaxed),
            active_streams: ACTIVE_STREAMS.load(Ordering::Relaxed),
        }
    }
}

/// Read errors recorded on the current thread.
#[cfg(test)]
pub(crate) fn local_read_errors() -> u64 {
    LOCAL_READ_ERRORS.with(std::cell::Cell::get)
}

/// Framed streams opened and not yet closed on the current thread.
#[cfg(test)]
pub(crate) fn local_active_streams() -> i64 {
    LOCAL_ACTIVE_STREAMS.with(std::cell::Cell::get)
}

/// Counts a framed stream in the active-streams gauge for its lifetime.
#[derive(Debug)]
pub(crate) struct ActiveStream;

impl ActiveStream {
    pub(crate) fn open() -> Self {
        Metrics::record_stream_open();
        Self
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        Metrics::record_stream_close();
    }
}

/// Lightweight snapshot of process-wide framing counters.
///
/// Payload byte counts exclude prefix bytes.
#[allow(missing_docs)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub oversized_frames: u64,
    pub short_buffers: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub active_streams: u64,
}

impl MetricsSnapshot {
    /// Average payload size of sent frames in bytes.
    #[must_use]
    pub fn avg_frame_size_sent(&self) -> Option<u64> {
        average(self.bytes_sent, self.frames_sent)
    }

    /// Average payload size of received frames in bytes.
    #[must_use]
    pub fn avg_frame_size_received(&self) -> Option<u64> {
        average(self.bytes_received, self.frames_received)
    }
}

fn average(total: u64, count: u64) -> Option<u64> {
    if count == 0 {
        return None;
    }
    Some(total / count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_averages() {
        let snapshot = MetricsSnapshot {
            frames_sent: 4,
            bytes_sent: 100,
            ..MetricsSnapshot::default()
        };
        assert_eq!(snapshot.avg_frame_size_sent(), Some(25));
        assert_eq!(snapshot.avg_frame_size_received(), None);
    }

    #[test]
    fn test_record_frame_is_monotonic() {
        let before = Metrics::totals();
        Metrics::record_frame(FrameDirection::Received, 13);
        let after = Metrics::totals();
        assert!(after.frames_received > before.frames_received);
        assert!(after.bytes_received >= before.bytes_received + 13);
    }

    #[test]
    fn test_active_stream_guard() {
        let start = local_active_streams();
        let guard = ActiveStream::open();
        assert_eq!(local_active_streams(), start + 1);
        assert!(Metrics::totals().active_streams >= 1);
        drop(guard);
        assert_eq!(local_active_streams(), start);
    }
}
