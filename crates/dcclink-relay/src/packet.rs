use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::error::{RelayError, Result};

/// One client read, owned by the relay until the link pump hands it to the
/// target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    buf: Vec<u8>,
}

impl Packet {
    /// Allocate an empty packet able to hold `size` bytes.
    ///
    /// Fails with [`RelayError::AllocationFailed`] instead of aborting when
    /// the allocator refuses.
    pub fn try_with_capacity(size: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| RelayError::AllocationFailed { size })?;
        Ok(Self { buf })
    }

    /// Copy `data` into a packet allocated for at least `size` bytes.
    pub fn copy_from(data: &[u8], size: usize) -> Result<Self> {
        let mut packet = Self::try_with_capacity(size.max(data.len()))?;
        packet.buf.extend_from_slice(data);
        Ok(packet)
    }

    /// Perform one read of at most `max` bytes from `reader`.
    ///
    /// Returns the number of bytes read; zero means the peer closed.
    pub(crate) fn fill_from<R: Read>(
        &mut self,
        reader: &mut R,
        max: usize,
    ) -> std::io::Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + max, 0);
        let read = loop {
            match reader.read(&mut self.buf[start..]) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(err);
                }
            }
        };
        self.buf.truncate(start + read);
        Ok(read)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}
