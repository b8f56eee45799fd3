use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{encode_packet, FrameConfig, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes host → target packets to any `Write` stream.
///
/// A packet is committed once its first byte is accepted: the target has
/// started reading a length prefix and has to see the rest, however long
/// that takes. Only a packet that never got a byte out may be abandoned on
/// a write timeout.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
    sent: usize,
    config: FrameConfig,
}

impl<T: Write> PacketWriter<T> {
    /// Create a new packet writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            sent: 0,
            config,
        }
    }

    /// Length-prefix `payload` and push it out, blocking until it is done.
    ///
    /// Fails with a `TimedOut` I/O error only if the stream took none of the
    /// packet.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.begin(payload)?;
        while !self.progress()? {}
        self.flush()
    }

    /// Stage `payload` as the next packet without writing anything.
    ///
    /// A packet still in flight is finished first.
    pub fn begin(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        while self.in_flight() {
            self.progress()?;
        }

        self.buf.clear();
        self.sent = 0;
        encode_packet(payload, &mut self.buf)
    }

    /// Whether a staged packet still has bytes to go out.
    pub fn in_flight(&self) -> bool {
        self.sent < self.buf.len()
    }

    /// Push as much of the staged packet as the stream takes.
    ///
    /// `Ok(true)` once the packet is complete (or nothing was staged),
    /// `Ok(false)` when the stream stalled part way. A stall before the first
    /// byte drops the packet and returns the `TimedOut` error.
    pub fn progress(&mut self) -> Result<bool> {
        while self.in_flight() {
            match self.inner.write(&self.buf[self.sent..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => self.sent += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    if self.sent == 0 {
                        self.buf.clear();
                        return Err(FrameError::Io(io_timeout()));
                    }
                    trace!(sent = self.sent, total = self.buf.len(), "packet stalled");
                    return Ok(false);
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        if !self.buf.is_empty() {
            debug!(len = self.buf.len() - LENGTH_PREFIX_SIZE, "packet handed to target");
            self.buf.clear();
            self.sent = 0;
        }
        Ok(true)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current packet writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn io_timeout() -> std::io::Error {
    std::io::Error::from(ErrorKind::TimedOut)
}
