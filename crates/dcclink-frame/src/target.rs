//! Target side of the link: the firmware's encoder and decoder.
//!
//! Both directions spin on a slot flag with the caller's [`Delay`] between
//! polls. None of the waits time out: if the host stops servicing the
//! mailbox while the link is attached, `send` and `receive` block forever.

use std::time::Duration;

use dcclink_regs::{Delay, DccPort, LinkState, MmioRegisters, RegisterIo};
use tracing::{debug, warn};

use crate::codec::{pack_words, FrameHeader, PollConfig, MAX_FRAME_PAYLOAD};
use crate::error::{FrameError, Result};
use crate::stream::RAW_PIPE;

/// The target's end of the debug communication channel.
///
/// Owns the register accessor, the delay capability and the [`LinkState`]
/// sampled at the last attach point. `&mut self` on every transfer keeps a
/// single writer per slot.
pub struct DccTarget<I, D> {
    port: DccPort<I>,
    delay: D,
    link: LinkState,
    poll: PollConfig,
    last_discarded: usize,
}

impl<I: RegisterIo, D: Delay> DccTarget<I, D> {
    /// Detect the debugger and set up the channel with default poll periods.
    pub fn attach(io: I, delay: D) -> Result<Self> {
        Self::attach_with_config(io, delay, PollConfig::default())
    }

    /// Detect the debugger and set up the channel with explicit poll periods.
    pub fn attach_with_config(mut io: I, delay: D, poll: PollConfig) -> Result<Self> {
        let link = LinkState::detect(&mut io)?;
        Ok(Self {
            port: DccPort::new(io),
            delay,
            link,
            poll,
            last_discarded: 0,
        })
    }

    /// Sample the debugger status again, e.g. after a probe reconnects.
    pub fn reattach(&mut self) -> Result<LinkState> {
        self.link = LinkState::detect(self.port.io_mut())?;
        Ok(self.link)
    }

    /// Link state from the last attach point.
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// Bytes dropped by the last `receive` because the caller's buffer was
    /// shorter than the declared packet.
    pub fn last_discarded(&self) -> usize {
        self.last_discarded
    }

    /// Send `buf` on the raw pipe stream.
    ///
    /// With no debugger attached the data is dropped and the full length is
    /// still reported.
    pub fn send(&mut self, buf: &[u8]) -> Result<usize> {
        self.send_stream(RAW_PIPE, buf)
    }

    /// Send `buf` tagged with an arbitrary stream type.
    ///
    /// Buffers longer than the 16-bit length field are sent as consecutive
    /// frames.
    pub fn send_stream(&mut self, stream: u8, buf: &[u8]) -> Result<usize> {
        if !self.link.is_attached() {
            return Ok(buf.len());
        }

        if buf.is_empty() {
            self.write_frame(stream, buf)?;
        } else {
            for chunk in buf.chunks(MAX_FRAME_PAYLOAD) {
                self.write_frame(stream, chunk)?;
            }
        }
        Ok(buf.len())
    }

    /// Receive one host packet into `buf`.
    ///
    /// Returns the number of bytes copied. Declared bytes beyond `buf.len()`
    /// are drained and dropped so the next call starts on a length prefix;
    /// see [`Self::last_discarded`].
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.link.is_attached() {
            return Err(FrameError::LinkDisabled);
        }

        let hi = self.read_byte(self.poll.data_poll)?;
        let lo = self.read_byte(self.poll.byte_poll)?;
        let declared = u16::from_be_bytes([hi, lo]) as usize;

        let copied = declared.min(buf.len());
        for slot in &mut buf[..copied] {
            *slot = self.read_byte(self.poll.byte_poll)?;
        }

        let discarded = declared - copied;
        for _ in 0..discarded {
            self.read_byte(self.poll.byte_poll)?;
        }
        self.last_discarded = discarded;

        if discarded > 0 {
            warn!(declared, copied, discarded, "host packet larger than receive buffer");
        } else {
            debug!(len = copied, "received host packet");
        }
        Ok(copied)
    }

    fn write_frame(&mut self, stream: u8, payload: &[u8]) -> Result<()> {
        let header = FrameHeader::new(payload.len() as u16, stream);
        self.write_word(header.to_word())?;
        for word in pack_words(payload) {
            self.write_word(word)?;
        }
        debug!(stream, len = payload.len(), "sent frame");
        Ok(())
    }

    /// Push one word out, low byte first, one slot handshake per byte.
    fn write_word(&mut self, word: u32) -> Result<()> {
        for byte in word.to_le_bytes() {
            while self.port.t2h_pending()? {
                self.delay.delay(self.poll.busy_poll);
            }
            self.port.t2h_publish(byte)?;
        }
        Ok(())
    }

    /// Wait for a host byte, take it and acknowledge it.
    fn read_byte(&mut self, poll: Duration) -> Result<u8> {
        while !self.port.h2t_pending()? {
            self.delay.delay(poll);
        }
        let byte = self.port.h2t_data()?;
        self.port.h2t_ack()?;
        Ok(byte)
    }
}

impl<D: Delay> DccTarget<MmioRegisters, D> {
    /// Attach to the DCC of the Cortex-M core this code runs on.
    ///
    /// # Safety
    ///
    /// Same contract as [`MmioRegisters::new`].
    pub unsafe fn cortex_m(delay: D) -> Result<Self> {
        // SAFETY: forwarded to the caller.
        let io = unsafe { MmioRegisters::new() };
        Self::attach(io, delay)
    }
}

impl<I, D> std::fmt::Debug for DccTarget<I, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DccTarget")
            .field("link", &self.link)
            .field("poll", &self.poll)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use bytes::BytesMut;
    use dcclink_regs::{NoDelay, ProbeStream, SimulatedDebugger};

    use super::*;
    use crate::codec::{decode_frame, encode_packet};

    fn attached() -> (SimulatedDebugger, DccTarget<dcclink_regs::SimRegisters, NoDelay>) {
        let debugger = SimulatedDebugger::new(true);
        let target = DccTarget::attach(debugger.target(), NoDelay).unwrap();
        (debugger, target)
    }

    /// Collect `frames` complete frames from the probe side.
    fn collect_frames(debugger: &SimulatedDebugger, frames: usize) -> thread::JoinHandle<Vec<u8>> {
        let mut probe = ProbeStream::new(debugger.probe(), NoDelay);
        thread::spawn(move || {
            let mut wire = BytesMut::new();
            let mut seen = 0;
            let mut out = Vec::new();
            while seen < frames {
                let mut chunk = [0u8; 64];
                let n = probe.read(&mut chunk).unwrap();
                wire.extend_from_slice(&chunk[..n]);
                while let Some(frame) = decode_frame(&mut wire, MAX_FRAME_PAYLOAD).unwrap() {
                    out.extend_from_slice(&frame.payload);
                    seen += 1;
                }
            }
            out
        })
    }

    #[test]
    fn detached_send_reports_full_length_without_register_access() {
        let debugger = SimulatedDebugger::new(false);
        let mut target = DccTarget::attach(debugger.target(), NoDelay).unwrap();
        let before = debugger.accesses();

        assert_eq!(target.send(&[0u8; 77]).unwrap(), 77);
        assert_eq!(debugger.accesses(), before);
        assert_eq!(debugger.mailbox(), 0);
    }

    #[test]
    fn detached_receive_fails_immediately() {
        let debugger = SimulatedDebugger::new(false);
        let mut target = DccTarget::attach(debugger.target(), NoDelay).unwrap();
        let before = debugger.accesses();

        let mut buf = [0u8; 8];
        assert!(matches!(
            target.receive(&mut buf),
            Err(FrameError::LinkDisabled)
        ));
        assert_eq!(debugger.accesses(), before);
    }

    #[test]
    fn reattach_picks_up_a_late_debugger() {
        let debugger = SimulatedDebugger::new(false);
        let mut target = DccTarget::attach(debugger.target(), NoDelay).unwrap();
        assert_eq!(target.link_state(), LinkState::Detached);

        debugger.set_attached(true);
        assert_eq!(target.link_state(), LinkState::Detached);
        assert_eq!(target.reattach().unwrap(), LinkState::Attached);
    }

    #[test]
    fn header_then_little_endian_payload_on_the_wire() {
        let (debugger, mut target) = attached();
        let mut probe = ProbeStream::new(debugger.probe(), NoDelay);

        let sender = thread::spawn(move || target.send(&[0x11, 0x22, 0x33, 0x44]).unwrap());

        let mut wire = [0u8; 8];
        probe.read_exact(&mut wire).unwrap();
        assert_eq!(sender.join().unwrap(), 4);

        assert_eq!(u32::from_le_bytes(wire[..4].try_into().unwrap()), 0x0004_0003);
        assert_eq!(u32::from_le_bytes(wire[4..].try_into().unwrap()), 0x4433_2211);
        assert_eq!(debugger.overruns(), 0);
    }

    #[test]
    fn send_roundtrips_every_tail_length() {
        let (debugger, mut target) = attached();
        let payloads: Vec<Vec<u8>> = (0..=9u8).map(|len| (0..len).collect()).collect();
        let expected: Vec<u8> = payloads.iter().flatten().copied().collect();

        let collector = collect_frames(&debugger, payloads.len());
        for payload in &payloads {
            assert_eq!(target.send(payload).unwrap(), payload.len());
        }

        assert_eq!(collector.join().unwrap(), expected);
        assert_eq!(debugger.overruns(), 0);
    }

    #[test]
    fn oversized_send_is_split_into_frames() {
        let (debugger, mut target) = attached();
        let payload: Vec<u8> = (0..MAX_FRAME_PAYLOAD + 10).map(|i| i as u8).collect();

        let collector = collect_frames(&debugger, 2);
        assert_eq!(target.send(&payload).unwrap(), payload.len());

        assert_eq!(collector.join().unwrap(), payload);
    }

    #[test]
    fn receive_reads_big_endian_length_prefix() {
        let (debugger, mut target) = attached();
        let mut probe = ProbeStream::new(debugger.probe(), NoDelay);
        let payload: Vec<u8> = (0..300u16).map(|i| i as u8).collect();

        let mut packet = BytesMut::new();
        encode_packet(&payload, &mut packet).unwrap();
        assert_eq!(&packet[..2], &[0x01, 0x2C]);

        let writer = thread::spawn(move || {
            probe.write_all(&packet).unwrap();
            probe.flush().unwrap();
        });

        let mut buf = vec![0u8; 512];
        let n = target.receive(&mut buf).unwrap();
        writer.join().unwrap();

        assert_eq!(n, 300);
        assert_eq!(&buf[..n], payload.as_slice());
        assert_eq!(target.last_discarded(), 0);
    }

    #[test]
    fn short_buffer_drains_remainder_and_stays_aligned() {
        let (debugger, mut target) = attached();
        let mut probe = ProbeStream::new(debugger.probe(), NoDelay);

        let mut wire = BytesMut::new();
        encode_packet(b"0123456789", &mut wire).unwrap();
        encode_packet(b"next", &mut wire).unwrap();

        let writer = thread::spawn(move || {
            probe.write_all(&wire).unwrap();
            probe.flush().unwrap();
        });

        let mut small = [0u8; 4];
        assert_eq!(target.receive(&mut small).unwrap(), 4);
        assert_eq!(&small, b"0123");
        assert_eq!(target.last_discarded(), 6);

        let mut buf = [0u8; 16];
        let n = target.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"next");
        assert_eq!(target.last_discarded(), 0);

        writer.join().unwrap();
    }

    #[test]
    fn concurrent_senders_never_overrun_the_slot() {
        let (debugger, target) = attached();
        let target = Arc::new(Mutex::new(target));

        let collector = collect_frames(&debugger, 8);
        let senders: Vec<_> = (0..4u8)
            .map(|id| {
                let target = Arc::clone(&target);
                thread::spawn(move || {
                    for _ in 0..2 {
                        target.lock().unwrap().send(&[id; 7]).unwrap();
                    }
                })
            })
            .collect();
        for sender in senders {
            sender.join().unwrap();
        }

        let received = collector.join().unwrap();
        assert_eq!(received.len(), 56);
        for id in 0..4u8 {
            assert_eq!(received.iter().filter(|&&b| b == id).count(), 14);
        }
        assert_eq!(debugger.overruns(), 0);
    }
}
