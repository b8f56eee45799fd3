use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::GREETING;
use crate::error::{RelayError, Result};

/// Connect to a relay and consume its greeting.
pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<RelayClient> {
    connect_with_greeting(addr, timeout, GREETING)
}

/// Connect to a relay that greets with `greeting`.
pub fn connect_with_greeting(
    addr: impl ToSocketAddrs,
    timeout: Duration,
    greeting: &str,
) -> Result<RelayClient> {
    let mut last_err = None;
    let mut stream = None;
    for candidate in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(err) => last_err = Some(err),
        }
    }
    let stream = match (stream, last_err) {
        (Some(stream), _) => stream,
        (None, Some(err)) => return Err(RelayError::Io(err)),
        (None, None) => {
            return Err(RelayError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "address resolved to nothing",
            )))
        }
    };

    let mut client = RelayClient { stream };
    client.expect_greeting(greeting.as_bytes(), timeout)?;
    Ok(client)
}

/// Client end of a relay session. Bytes pass through unframed.
#[derive(Debug)]
pub struct RelayClient {
    stream: TcpStream,
}

impl RelayClient {
    /// Write all of `data` to the relay.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        self.stream.flush()?;
        debug!(len = data.len(), "sent to relay");
        Ok(())
    }

    /// Collect `expected` bytes, or whatever has arrived when `timeout`
    /// runs out.
    pub fn recv_until(&mut self, expected: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::with_capacity(expected);
        let mut chunk = [0u8; 512];
        while out.len() < expected {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            self.stream.set_read_timeout(Some(left))?;
            match self.stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&chunk[..n]),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(RelayError::Io(err)),
            }
        }
        Ok(out)
    }

    pub fn peer_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Close the session.
    pub fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn expect_greeting(&mut self, greeting: &[u8], timeout: Duration) -> Result<()> {
        let got = self.recv_until(greeting.len(), timeout)?;
        if got.is_empty() {
            return Err(RelayError::RemoteClosed);
        }
        if got != greeting {
            return Err(RelayError::BadGreeting(String::from_utf8_lossy(&got).into_owned()));
        }
        Ok(())
    }
}
