use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, trace};

use crate::delay::Delay;
use crate::error::{RegsError, Result};
use crate::port::DccPort;
use crate::traits::RegisterIo;

const INITIAL_BUFFER_CAPACITY: usize = 1024;
/// Upper bound on bytes taken from the target in one drain pass, so a target
/// streaming flat out cannot pin the host inside a single call.
const MAX_DRAIN: usize = 4096;

/// Timing knobs for a [`ProbeStream`].
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Delay between two polls of a slot flag.
    pub poll_interval: Duration,
    /// How long `read` waits for the first byte. `None` waits forever,
    /// `Some(Duration::ZERO)` never waits.
    pub read_timeout: Option<Duration>,
    /// How long a write waits for the target to take one byte.
    pub write_timeout: Option<Duration>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// The host's byte-stream view of the DCC mailbox.
///
/// Reading drains the target → host slot; writing feeds the host → target
/// slot one byte per handshake. While a write waits for the target to take a
/// byte, the stream keeps draining the other slot into an internal buffer:
/// a target blocked mid-send would otherwise never get to read.
pub struct ProbeStream<I, D> {
    port: DccPort<I>,
    delay: D,
    rx: BytesMut,
    config: ProbeConfig,
}

impl<I: RegisterIo, D: Delay> ProbeStream<I, D> {
    /// Create a probe stream with default timing.
    pub fn new(io: I, delay: D) -> Self {
        Self::with_config(io, delay, ProbeConfig::default())
    }

    /// Create a probe stream with explicit timing.
    pub fn with_config(io: I, delay: D, config: ProbeConfig) -> Self {
        Self {
            port: DccPort::new(io),
            delay,
            rx: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Move everything the target has sent so far into `dst` without waiting.
    pub fn take_received(&mut self, dst: &mut BytesMut) -> Result<usize> {
        self.drain_t2h()?;
        let n = self.rx.len();
        dst.extend_from_slice(&self.rx);
        self.rx.clear();
        Ok(n)
    }

    /// Bytes received from the target and not yet handed out.
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.config.read_timeout = timeout;
    }

    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.config.write_timeout = timeout;
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Consume the stream and return the register accessor.
    pub fn into_inner(self) -> I {
        self.port.into_inner()
    }

    fn drain_t2h(&mut self) -> Result<usize> {
        let mut taken = 0;
        while taken < MAX_DRAIN && self.port.t2h_pending()? {
            let byte = self.port.t2h_data()?;
            self.port.t2h_ack()?;
            self.rx.put_u8(byte);
            taken += 1;
        }
        if taken > 0 {
            trace!(taken, "drained target bytes");
        }
        Ok(taken)
    }

    /// Wait for the host → target slot to empty, servicing the other
    /// direction meanwhile. Returns false on timeout.
    fn wait_h2t_free(&mut self) -> Result<bool> {
        let started = Instant::now();
        loop {
            if !self.port.h2t_pending()? {
                return Ok(true);
            }
            self.drain_t2h()?;
            if let Some(limit) = self.config.write_timeout {
                if started.elapsed() >= limit {
                    return Ok(false);
                }
            }
            self.delay.delay(self.config.poll_interval);
        }
    }
}

impl<I: RegisterIo, D: Delay> Read for ProbeStream<I, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        loop {
            if self.rx.is_empty() {
                self.drain_t2h()?;
            }
            if !self.rx.is_empty() {
                let n = self.rx.len().min(buf.len());
                buf[..n].copy_from_slice(&self.rx[..n]);
                self.rx.advance(n);
                return Ok(n);
            }
            if let Some(limit) = self.config.read_timeout {
                if started.elapsed() >= limit {
                    return Err(io::Error::from(io::ErrorKind::WouldBlock));
                }
            }
            self.delay.delay(self.config.poll_interval);
        }
    }
}

impl<I: RegisterIo, D: Delay> Write for ProbeStream<I, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        for &byte in buf {
            if !self.wait_h2t_free()? {
                if written > 0 {
                    return Ok(written);
                }
                debug!("target did not take byte before write timeout");
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            self.port.h2t_publish(byte)?;
            written += 1;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.wait_h2t_free()? {
            Ok(())
        } else {
            Err(io::Error::from(io::ErrorKind::TimedOut))
        }
    }
}

impl From<RegsError> for io::Error {
    fn from(err: RegsError) -> Self {
        match err {
            RegsError::Probe(io) => io,
            RegsError::Detached => {
                io::Error::new(io::ErrorKind::NotConnected, "debugger detached")
            }
            other => io::Error::other(other),
        }
    }
}

impl<I, D> std::fmt::Debug for ProbeStream<I, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeStream")
            .field("buffered", &self.rx.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::NoDelay;
    use crate::sim::SimulatedDebugger;

    #[test]
    fn read_returns_bytes_published_by_target() {
        let debugger = SimulatedDebugger::new(true);
        let mut target = DccPort::new(debugger.target());
        let mut stream = ProbeStream::new(debugger.probe(), NoDelay);

        target.t2h_publish(0x42).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0x42);
        assert!(!target.t2h_pending().unwrap());
    }

    #[test]
    fn nonblocking_read_reports_would_block() {
        let debugger = SimulatedDebugger::new(true);
        let mut stream = ProbeStream::with_config(
            debugger.probe(),
            NoDelay,
            ProbeConfig {
                read_timeout: Some(Duration::ZERO),
                ..ProbeConfig::default()
            },
        );

        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn write_times_out_when_target_never_acks() {
        let debugger = SimulatedDebugger::new(true);
        let mut stream = ProbeStream::with_config(
            debugger.probe(),
            NoDelay,
            ProbeConfig {
                write_timeout: Some(Duration::from_millis(5)),
                ..ProbeConfig::default()
            },
        );

        // First byte fits in the empty slot, second has nowhere to go.
        assert_eq!(stream.write(&[1, 2]).unwrap(), 1);
        let err = stream.write(&[2]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(debugger.overruns(), 0);
    }

    #[test]
    fn blocked_write_keeps_draining_target_output() {
        let debugger = SimulatedDebugger::new(true);
        let mut target = DccPort::new(debugger.target());
        let mut stream = ProbeStream::with_config(
            debugger.probe(),
            NoDelay,
            ProbeConfig {
                write_timeout: Some(Duration::from_millis(5)),
                ..ProbeConfig::default()
            },
        );

        stream.write_all(&[0xAA]).unwrap();
        target.t2h_publish(0x99).unwrap();
        assert!(stream.flush().is_err());

        assert_eq!(stream.buffered(), 1);
        let mut rx = BytesMut::new();
        assert_eq!(stream.take_received(&mut rx).unwrap(), 1);
        assert_eq!(rx.as_ref(), &[0x99]);
    }

    #[test]
    fn threaded_write_reaches_target_in_order() {
        let debugger = SimulatedDebugger::new(true);
        let mut stream = ProbeStream::new(debugger.probe(), NoDelay);
        let mut target = DccPort::new(debugger.target());

        let reader = std::thread::spawn(move || {
            let mut got = Vec::new();
            while got.len() < 64 {
                if target.h2t_pending().unwrap() {
                    got.push(target.h2t_data().unwrap());
                    target.h2t_ack().unwrap();
                } else {
                    std::thread::yield_now();
                }
            }
            got
        });

        let sent: Vec<u8> = (0..64).collect();
        stream.write_all(&sent).unwrap();
        stream.flush().unwrap();

        assert_eq!(reader.join().unwrap(), sent);
        assert_eq!(debugger.overruns(), 0);
    }
}
