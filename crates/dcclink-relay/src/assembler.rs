use std::io::Read;

use tracing::{debug, warn};

use crate::connection::{ClientSocket, DccConnection};
use crate::error::{RelayError, Result};
use crate::packet::Packet;

/// Turns client read events into queued packets.
///
/// Each read becomes exactly one packet; nothing is regrouped across reads.
#[derive(Debug, Clone, Copy)]
pub struct FrameAssembler {
    frame_size: usize,
}

impl FrameAssembler {
    pub fn new(frame_size: usize) -> Self {
        Self { frame_size }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Handle bytes already read from the client.
    ///
    /// A zero-length read means the peer closed: the session is marked closed
    /// and no packet is queued.
    pub fn on_read_event<S: ClientSocket>(
        &self,
        conn: &DccConnection<S>,
        raw: &[u8],
    ) -> Result<()> {
        if raw.is_empty() {
            conn.mark_closed();
            debug!(session = conn.id(), "client closed");
            return Err(RelayError::RemoteClosed);
        }

        let packet = Packet::copy_from(raw, self.frame_size).inspect_err(|err| {
            warn!(session = conn.id(), error = %err, "dropping client read");
        })?;
        conn.enqueue(packet);
        Ok(())
    }

    /// Read once from `reader` into a fresh packet and queue it.
    ///
    /// Returns the number of bytes queued.
    pub fn read_from<S: ClientSocket, R: Read>(
        &self,
        conn: &DccConnection<S>,
        reader: &mut R,
    ) -> Result<usize> {
        let mut packet = Packet::try_with_capacity(self.frame_size).inspect_err(|err| {
            warn!(session = conn.id(), error = %err, "no buffer for client read");
        })?;

        let read = match packet.fill_from(reader, self.frame_size) {
            Ok(n) => n,
            Err(err) => {
                conn.mark_closed();
                return Err(RelayError::Io(err));
            }
        };

        if read == 0 {
            return self.on_read_event(conn, &[]).map(|()| 0);
        }

        conn.enqueue(packet);
        Ok(read)
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FRAME_SIZE)
    }
}
