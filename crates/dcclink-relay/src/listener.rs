use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::assembler::FrameAssembler;
use crate::config::RelayConfig;
use crate::connection::DccConnection;
use crate::control::RelayControl;
use crate::error::{RelayError, Result};
use crate::pump::LinkPump;
use crate::session::SessionTable;

const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// TCP front end of the relay.
///
/// One thread per client reads into packets, one pump thread owns the link,
/// and the caller's thread runs the accept loop inside [`RelayServer::run`].
pub struct RelayServer {
    listener: TcpListener,
    config: RelayConfig,
    control: Arc<RelayControl>,
    sessions: Arc<SessionTable<TcpStream>>,
    next_session_id: AtomicU64,
}

impl RelayServer {
    /// Bind the listener described by `config`.
    pub fn bind(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.listen_addr())?;
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, enabled = config.enabled, "dcc relay listening");

        Ok(Self {
            listener,
            control: Arc::new(RelayControl::new(config.enabled)),
            config,
            sessions: Arc::new(SessionTable::new()),
            next_session_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for toggling or stopping the relay from another thread.
    pub fn control(&self) -> Arc<RelayControl> {
        Arc::clone(&self.control)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Number of live client sessions.
    pub fn sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Serve clients until [`RelayControl::stop`] is called or the link fails.
    pub fn run<L>(self, mut pump: LinkPump<L>) -> Result<()>
    where
        L: std::io::Read + std::io::Write + Send + 'static,
    {
        let pump_handle = {
            let sessions = Arc::clone(&self.sessions);
            let control = Arc::clone(&self.control);
            std::thread::Builder::new()
                .name("dcc-link-pump".into())
                .spawn(move || {
                    let result = pump.run(&*sessions, &control);
                    if let Err(err) = &result {
                        warn!(error = %err, "link pump failed");
                        control.stop();
                    }
                    result
                })?
        };

        let mut readers: Vec<JoinHandle<()>> = Vec::new();
        let mut accept_result = Ok(());
        while self.control.is_running() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Some(handle) = self.admit(stream, peer) {
                        readers.push(handle);
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    self.control.stop();
                    accept_result = Err(RelayError::Io(err));
                }
            }
            readers.retain(|handle| !handle.is_finished());
        }

        info!(sessions = self.sessions.len(), "dcc relay shutting down");
        for conn in self.sessions.drain() {
            conn.shutdown();
        }
        for handle in readers {
            let _ = handle.join();
        }

        let pump_result = pump_handle
            .join()
            .unwrap_or_else(|_| Err(RelayError::Io(std::io::Error::other("link pump panicked"))));
        accept_result.and(pump_result)
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) -> Option<JoinHandle<()>> {
        if !self.control.is_enabled() {
            info!(%peer, "dcc relay disabled, connection refused");
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return None;
        }
        let live = self.sessions.len();
        if live >= self.config.max_connections {
            info!(
                %peer,
                live,
                max = self.config.max_connections,
                "session limit reached, connection refused"
            );
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return None;
        }

        let prepared = stream
            .set_nonblocking(false)
            .and_then(|()| stream.set_nodelay(true))
            .and_then(|()| stream.try_clone());
        let reader = match prepared {
            Ok(reader) => reader,
            Err(err) => {
                warn!(%peer, error = %err, "could not set up client socket");
                return None;
            }
        };

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let conn = Arc::new(DccConnection::open(id, stream, true, &self.config.greeting));
        if conn.is_closed() {
            debug!(session = id, %peer, "client gone before greeting");
            conn.shutdown();
            return None;
        }
        self.sessions.insert(Arc::clone(&conn));
        info!(session = id, %peer, "dcc session opened");

        let sessions = Arc::clone(&self.sessions);
        let assembler = FrameAssembler::new(self.config.frame_size);
        let spawned = std::thread::Builder::new()
            .name(format!("dcc-session-{id}"))
            .spawn(move || serve_session(conn, reader, assembler, &sessions));
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(session = id, error = %err, "could not start session reader");
                if let Some(conn) = self.sessions.remove(id) {
                    conn.shutdown();
                }
                None
            }
        }
    }
}

fn serve_session(
    conn: Arc<DccConnection<TcpStream>>,
    mut reader: TcpStream,
    assembler: FrameAssembler,
    sessions: &SessionTable<TcpStream>,
) {
    loop {
        match assembler.read_from(&conn, &mut reader) {
            Ok(_) => {}
            Err(RelayError::AllocationFailed { .. }) => std::thread::sleep(ACCEPT_POLL),
            Err(RelayError::RemoteClosed) => break,
            Err(err) => {
                debug!(session = conn.id(), error = %err, "client read failed");
                break;
            }
        }
    }

    if let Some(conn) = sessions.remove(conn.id()) {
        conn.shutdown();
    }
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer")
            .field("addr", &self.listener.local_addr().ok())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
