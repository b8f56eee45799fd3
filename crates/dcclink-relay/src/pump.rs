use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::BytesMut;
use dcclink_frame::{
    decode_frame, stream_name, Frame, FrameConfig, FrameError, PacketWriter, RAW_PIPE,
};
use dcclink_regs::{Delay, ProbeConfig, ProbeStream, RegisterIo};
use tracing::{debug, info, trace, warn};

use crate::config::RelayConfig;
use crate::connection::ClientSocket;
use crate::control::RelayControl;
use crate::error::{RelayError, Result};
use crate::session::SessionTable;

const READ_CHUNK_SIZE: usize = 1024;

/// Moves data between client sessions and the target.
///
/// Owns the link. Queued client packets go out as host → target packets;
/// raw-pipe frames from the target are written to every enabled session.
/// Frames on other streams are logged and dropped.
///
/// Reads on the link must not block: a `ProbeStream` built through
/// [`LinkPump::probe`] has a zero read timeout.
pub struct LinkPump<L> {
    writer: PacketWriter<L>,
    rx: BytesMut,
    poll_interval: Duration,
}

impl<L: Read + Write> LinkPump<L> {
    pub fn new(link: L, frame_config: FrameConfig, poll_interval: Duration) -> Self {
        Self {
            writer: PacketWriter::with_config(link, frame_config),
            rx: BytesMut::with_capacity(READ_CHUNK_SIZE),
            poll_interval,
        }
    }

    /// One service pass in both directions. Returns whether anything moved.
    pub fn pump_once<S: ClientSocket>(
        &mut self,
        sessions: &SessionTable<S>,
        control: &RelayControl,
    ) -> Result<bool> {
        let mut busy = self.forward_queued(sessions, control)?;

        busy |= self.poll_target()? > 0;
        let max = self.writer.config().max_payload_size;
        while let Some(frame) = decode_frame(&mut self.rx, max)? {
            busy = true;
            self.dispatch(&frame, sessions, control);
        }
        Ok(busy)
    }

    /// Service the link until the relay is stopped.
    pub fn run<S: ClientSocket>(
        &mut self,
        sessions: &SessionTable<S>,
        control: &RelayControl,
    ) -> Result<()> {
        info!("link pump started");
        while control.is_running() {
            if !self.pump_once(sessions, control)? {
                std::thread::sleep(self.poll_interval);
            }
        }
        info!("link pump stopped");
        Ok(())
    }

    pub fn get_ref(&self) -> &L {
        self.writer.get_ref()
    }

    pub fn into_inner(self) -> L {
        self.writer.into_inner()
    }

    /// Send queued client packets, oldest session first.
    ///
    /// A packet the target has started reading is finished on later passes
    /// before anything else goes out, so the target never loses its place in
    /// a length-prefixed packet.
    fn forward_queued<S: ClientSocket>(
        &mut self,
        sessions: &SessionTable<S>,
        control: &RelayControl,
    ) -> Result<bool> {
        let mut busy = false;
        if self.writer.in_flight() {
            if !self.writer.progress()? {
                return Ok(false);
            }
            trace!("stalled packet completed");
            busy = true;
        }

        for conn in sessions.snapshot() {
            while let Some(packet) = conn.pop_packet() {
                busy = true;
                if !control.is_enabled() || !conn.is_enabled() {
                    debug!(session = conn.id(), len = packet.len(), "relay disabled, packet dropped");
                    continue;
                }
                self.writer.begin(packet.as_slice())?;
                match self.writer.progress() {
                    Ok(true) => trace!(session = conn.id(), len = packet.len(), "packet forwarded"),
                    Ok(false) => {
                        debug!(session = conn.id(), len = packet.len(), "target slow, packet held");
                        return Ok(true);
                    }
                    Err(FrameError::Io(err)) if err.kind() == ErrorKind::TimedOut => {
                        warn!(session = conn.id(), len = packet.len(), "target not reading, packet dropped");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(busy)
    }

    fn poll_target(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match self.writer.get_mut().read(&mut chunk) {
            Ok(0) => Err(RelayError::Frame(FrameError::ConnectionClosed)),
            Ok(n) => {
                self.rx.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(RelayError::Io(err)),
        }
    }

    fn dispatch<S: ClientSocket>(
        &self,
        frame: &Frame,
        sessions: &SessionTable<S>,
        control: &RelayControl,
    ) {
        if frame.stream != RAW_PIPE {
            debug!(
                stream = stream_name(frame.stream),
                len = frame.payload.len(),
                "non-pipe frame dropped"
            );
            return;
        }
        if !control.is_enabled() {
            debug!(len = frame.payload.len(), "relay disabled, target output discarded");
            return;
        }

        for conn in sessions.snapshot() {
            if conn.is_closed() || !conn.is_enabled() {
                continue;
            }
            if conn.write(&frame.payload).is_err() {
                if let Some(conn) = sessions.remove(conn.id()) {
                    conn.shutdown();
                }
            }
        }
    }
}

impl<I: RegisterIo, D: Delay> LinkPump<ProbeStream<I, D>> {
    /// Build a pump over the debug probe using the relay's timing settings.
    pub fn probe(io: I, delay: D, config: &RelayConfig) -> Self {
        let probe_config = ProbeConfig {
            poll_interval: config.poll_interval(),
            read_timeout: Some(Duration::ZERO),
            write_timeout: config.write_timeout(),
        };
        Self::new(
            ProbeStream::with_config(io, delay, probe_config),
            FrameConfig::default(),
            config.poll_interval(),
        )
    }
}

impl<L> std::fmt::Debug for LinkPump<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkPump")
            .field("pending", &self.rx.len())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use bytes::BufMut;
    use dcclink_frame::{encode_frame, DccTarget, TRACE_MSG};
    use dcclink_regs::{DccPort, NoDelay, SimulatedDebugger};

    use super::*;
    use crate::connection::tests::MemorySocket;
    use crate::connection::DccConnection;
    use crate::packet::Packet;

    /// Link double: reads come from `incoming`, writes land in `outgoing`.
    #[derive(Default)]
    struct ScriptedLink {
        incoming: Cursor<Vec<u8>>,
        outgoing: Vec<u8>,
    }

    impl Read for ScriptedLink {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.incoming.read(buf)? {
                0 => Err(std::io::Error::from(ErrorKind::WouldBlock)),
                n => Ok(n),
            }
        }
    }

    impl Write for ScriptedLink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.outgoing.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session(id: u64) -> Arc<DccConnection<MemorySocket>> {
        Arc::new(DccConnection::open(id, MemorySocket::default(), true, ""))
    }

    fn pump_with(incoming: Vec<u8>) -> LinkPump<ScriptedLink> {
        let link = ScriptedLink {
            incoming: Cursor::new(incoming),
            outgoing: Vec::new(),
        };
        LinkPump::new(link, FrameConfig::default(), Duration::from_millis(1))
    }

    #[test]
    fn queued_packets_go_out_length_prefixed() {
        let sessions = SessionTable::new();
        let control = RelayControl::default();
        let conn = session(1);
        conn.enqueue(Packet::copy_from(b"abc", 127).unwrap());
        sessions.insert(conn);

        let mut pump = pump_with(Vec::new());
        assert!(pump.pump_once(&sessions, &control).unwrap());

        assert_eq!(pump.get_ref().outgoing, vec![0x00, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn disabled_relay_drops_queued_packets() {
        let sessions = SessionTable::new();
        let control = RelayControl::new(false);
        let conn = session(1);
        conn.enqueue(Packet::copy_from(b"abc", 127).unwrap());
        sessions.insert(Arc::clone(&conn));

        let mut pump = pump_with(Vec::new());
        pump.pump_once(&sessions, &control).unwrap();

        assert!(pump.get_ref().outgoing.is_empty());
        assert_eq!(conn.queued(), 0);
    }

    #[test]
    fn raw_pipe_frames_are_broadcast() {
        let mut wire = BytesMut::new();
        encode_frame(RAW_PIPE, b"echo", &mut wire).unwrap();

        let sessions = SessionTable::new();
        let a = session(1);
        let b = session(2);
        sessions.insert(Arc::clone(&a));
        sessions.insert(Arc::clone(&b));

        let mut pump = pump_with(wire.to_vec());
        pump.pump_once(&sessions, &RelayControl::default()).unwrap();

        assert_eq!(a.socket().written.lock().unwrap().as_slice(), b"echo");
        assert_eq!(b.socket().written.lock().unwrap().as_slice(), b"echo");
    }

    #[test]
    fn other_streams_are_not_forwarded() {
        let mut wire = BytesMut::new();
        encode_frame(TRACE_MSG, b"trace", &mut wire).unwrap();

        let sessions = SessionTable::new();
        let conn = session(1);
        sessions.insert(Arc::clone(&conn));

        let mut pump = pump_with(wire.to_vec());
        assert!(pump.pump_once(&sessions, &RelayControl::default()).unwrap());
        assert!(conn.socket().written.lock().unwrap().is_empty());
    }

    #[test]
    fn partial_frame_waits_for_rest() {
        let mut wire = BytesMut::new();
        encode_frame(RAW_PIPE, b"split", &mut wire).unwrap();
        let mut head = wire.to_vec();
        let tail = head.split_off(6);

        let sessions = SessionTable::new();
        let conn = session(1);
        sessions.insert(Arc::clone(&conn));
        let control = RelayControl::default();

        let mut pump = pump_with(head);
        pump.pump_once(&sessions, &control).unwrap();
        assert!(conn.socket().written.lock().unwrap().is_empty());

        pump.writer.get_mut().incoming = Cursor::new(tail);
        pump.pump_once(&sessions, &control).unwrap();
        assert_eq!(conn.socket().written.lock().unwrap().as_slice(), b"split");
    }

    #[test]
    fn failed_client_write_removes_session() {
        let mut wire = BytesMut::new();
        encode_frame(RAW_PIPE, b"data", &mut wire).unwrap();

        let sessions = SessionTable::new();
        let broken = Arc::new(
            DccConnection::open(
                9,
                MemorySocket {
                    limit: Some(2),
                    ..MemorySocket::default()
                },
                true,
                "",
            ),
        );
        sessions.insert(Arc::clone(&broken));

        let mut pump = pump_with(wire.to_vec());
        pump.pump_once(&sessions, &RelayControl::default()).unwrap();

        assert!(broken.is_closed());
        assert!(sessions.is_empty());
    }

    #[test]
    fn corrupt_header_stops_pump() {
        let mut wire = BytesMut::new();
        wire.put_u32_le(0x0000_FF03);

        let sessions: SessionTable<MemorySocket> = SessionTable::new();
        let mut pump = pump_with(wire.to_vec());
        let err = pump.pump_once(&sessions, &RelayControl::default()).unwrap_err();
        assert!(matches!(err, RelayError::Frame(FrameError::InvalidHeader { .. })));
    }

    #[test]
    fn stalled_packet_is_finished_before_the_next() {
        let debugger = SimulatedDebugger::new(true);
        let mut target = DccTarget::attach(debugger.target(), NoDelay).unwrap();

        let sessions = SessionTable::new();
        let control = RelayControl::default();
        let conn = session(1);
        sessions.insert(Arc::clone(&conn));
        let config = RelayConfig {
            write_timeout_ms: 20,
            ..RelayConfig::default()
        };
        let mut pump = LinkPump::probe(debugger.probe(), NoDelay, &config);

        // Target is not reading: only the first length byte fits in the slot.
        conn.enqueue(Packet::copy_from(b"abcdef", 127).unwrap());
        pump.pump_once(&sessions, &control).unwrap();
        conn.enqueue(Packet::copy_from(b"XY", 127).unwrap());
        pump.pump_once(&sessions, &control).unwrap();
        assert_eq!(conn.queued(), 1);

        let reader = std::thread::spawn(move || {
            let mut received = Vec::new();
            let mut buf = [0u8; 127];
            for _ in 0..2 {
                let n = target.receive(&mut buf).unwrap();
                received.push(buf[..n].to_vec());
            }
            received
        });

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !reader.is_finished() {
            assert!(std::time::Instant::now() < deadline, "target did not get both packets");
            pump.pump_once(&sessions, &control).unwrap();
        }

        assert_eq!(reader.join().unwrap(), vec![b"abcdef".to_vec(), b"XY".to_vec()]);
        assert_eq!(conn.queued(), 0);
        assert_eq!(debugger.overruns(), 0);
    }

    #[test]
    fn untouched_packet_is_dropped_on_timeout() {
        let debugger = SimulatedDebugger::new(true);
        let sessions = SessionTable::new();
        let control = RelayControl::default();
        let conn = session(1);
        sessions.insert(Arc::clone(&conn));
        let config = RelayConfig {
            write_timeout_ms: 5,
            ..RelayConfig::default()
        };
        let mut pump = LinkPump::probe(debugger.probe(), NoDelay, &config);
        // Slot occupied by a byte the target never takes.
        DccPort::new(debugger.probe()).h2t_publish(0).unwrap();

        conn.enqueue(Packet::copy_from(b"lost", 127).unwrap());
        assert!(pump.pump_once(&sessions, &control).unwrap());
        assert_eq!(conn.queued(), 0);
    }

    #[test]
    fn echo_through_simulated_target() {
        let debugger = SimulatedDebugger::new(true);
        let mut target = DccTarget::attach(debugger.target(), NoDelay).unwrap();
        let echo = std::thread::spawn(move || {
            let mut buf = [0u8; 127];
            let n = target.receive(&mut buf).unwrap();
            target.send(&buf[..n]).unwrap();
        });

        let sessions = SessionTable::new();
        let control = RelayControl::default();
        let conn = session(1);
        conn.enqueue(Packet::copy_from(b"round trip", 127).unwrap());
        sessions.insert(Arc::clone(&conn));

        let mut pump = LinkPump::probe(debugger.probe(), NoDelay, &RelayConfig::default());
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while conn.socket().written.lock().unwrap().len() < 10 {
            assert!(std::time::Instant::now() < deadline, "echo did not arrive");
            pump.pump_once(&sessions, &control).unwrap();
        }
        echo.join().unwrap();

        assert_eq!(conn.socket().written.lock().unwrap().as_slice(), b"round trip");
        assert_eq!(debugger.overruns(), 0);
    }
}
