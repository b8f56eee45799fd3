use std::collections::VecDeque;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::packet::Packet;

/// The socket half a relay session writes to.
///
/// Writes take `&self` so the link pump can push target output while the
/// session's reader thread sits in a blocking read on a clone of the socket.
pub trait ClientSocket: Send + Sync {
    /// One write attempt. The return value is the number of bytes accepted.
    fn send(&self, data: &[u8]) -> io::Result<usize>;

    /// Close both directions. Errors are ignored.
    fn close(&self);
}

impl ClientSocket for TcpStream {
    fn send(&self, data: &[u8]) -> io::Result<usize> {
        let mut stream = self;
        stream.write(data)
    }

    fn close(&self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

#[derive(Debug, Default)]
struct SessionState {
    enabled: bool,
    closed: bool,
    queue: VecDeque<Packet>,
}

/// Per-client relay state: flags plus the packets waiting for the target.
///
/// The lock is taken only to touch flags or the queue. Socket writes happen
/// outside it.
pub struct DccConnection<S> {
    id: u64,
    socket: S,
    state: Mutex<SessionState>,
}

impl<S> DccConnection<S> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<S: ClientSocket> DccConnection<S> {
    /// Initialise a session and greet the client.
    ///
    /// The greeting gets one write attempt and its outcome is not returned.
    /// A client that could not take it comes back already closed, so callers
    /// check [`Self::is_closed`] before admitting it.
    pub fn open(id: u64, socket: S, enabled: bool, greeting: &str) -> Self {
        let conn = Self {
            id,
            socket,
            state: Mutex::new(SessionState {
                enabled,
                closed: false,
                queue: VecDeque::new(),
            }),
        };
        if conn.write(greeting.as_bytes()).is_err() {
            debug!(session = id, "greeting not delivered");
        }
        info!(session = id, "client connected");
        conn
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn mark_closed(&self) {
        self.lock().closed = true;
    }

    /// Append a packet to the outbound queue.
    pub fn enqueue(&self, packet: Packet) {
        let mut state = self.lock();
        state.queue.push_back(packet);
        debug!(session = self.id, queued = state.queue.len(), "packet queued");
    }

    /// Take the oldest queued packet, if any.
    pub fn pop_packet(&self) -> Option<Packet> {
        self.lock().queue.pop_front()
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Write `data` to the client in a single attempt.
    ///
    /// A short write or an I/O error closes the session.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(RelayError::RemoteClosed);
        }

        match self.socket.send(data) {
            Ok(n) if n == data.len() => Ok(()),
            Ok(n) => {
                debug!(session = self.id, wrote = n, wanted = data.len(), "short write");
                self.mark_closed();
                Err(RelayError::RemoteClosed)
            }
            Err(err) => {
                debug!(session = self.id, error = %err, "client write failed");
                self.mark_closed();
                Err(RelayError::RemoteClosed)
            }
        }
    }

    /// Drop queued packets, mark the session closed and close the socket.
    ///
    /// Returns how many packets were discarded.
    pub fn shutdown(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            state.closed = true;
            let n = state.queue.len();
            state.queue.clear();
            n
        };
        self.socket.close();
        info!(session = self.id, discarded, "client session closed");
        discarded
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> std::fmt::Debug for DccConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DccConnection").field("id", &self.id).finish()
    }
}
