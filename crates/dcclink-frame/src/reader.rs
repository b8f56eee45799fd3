use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_frame, Frame, MAX_FRAME_PAYLOAD};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Pulls target → host frames out of a byte source: a probe stream, a
/// capture file, anything `Read`.
///
/// Bytes arrive in whatever slices the source hands out. Partial frames stay
/// buffered until their declared length plus word padding is in.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_payload: usize,
    frames_read: u64,
}

impl<T: Read> FrameReader<T> {
    /// Reader accepting any payload the 16-bit length field can declare.
    pub fn new(inner: T) -> Self {
        Self::with_max_payload(inner, MAX_FRAME_PAYLOAD)
    }

    /// Reader rejecting frames that declare more than `max_payload` bytes.
    pub fn with_max_payload(inner: T, max_payload: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max_payload,
            frames_read: 0,
        }
    }

    /// Next complete frame.
    ///
    /// `Ok(None)` means the source ended on a frame boundary. Ending inside a
    /// frame is `Err(FrameError::ConnectionClosed)`, with the leftover bytes
    /// still counted by [`Self::pending`].
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.max_payload)? {
                self.frames_read += 1;
                trace!(stream = frame.stream, len = frame.payload.len(), "frame complete");
                return Ok(Some(frame));
            }
            if self.fill()? == 0 {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(FrameError::ConnectionClosed)
                };
            }
        }
    }

    /// Next complete frame from a live link, where end of input is always
    /// a failure.
    pub fn read_frame(&mut self) -> Result<Frame> {
        self.next_frame()?.ok_or(FrameError::ConnectionClosed)
    }

    /// Bytes buffered towards a frame that is not complete yet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Frames returned so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// One read from the source straight into the buffer's spare room.
    fn fill(&mut self) -> Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK_SIZE, 0);
        let read = loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(FrameError::Io(err));
                }
            }
        };
        self.buf.truncate(start + read);
        Ok(read)
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
