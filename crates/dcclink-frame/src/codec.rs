use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::stream::RAW_PIPE;

/// Every transfer on the target → host direction is a whole number of words.
pub const WORD_SIZE: usize = 4;

/// Frame header: one word holding length (16) + reserved (8) + stream tag (8).
pub const HEADER_SIZE: usize = WORD_SIZE;

/// Host → target packets start with a 2-byte big-endian length.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload a single frame or packet can declare.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload bytes that follow, regardless of padding.
    pub length: u16,
    /// Stream type tag, see [`crate::stream`].
    pub stream: u8,
}

impl FrameHeader {
    pub fn new(length: u16, stream: u8) -> Self {
        Self { length, stream }
    }

    /// Header as it travels on the wire.
    pub fn to_word(self) -> u32 {
        ((self.length as u32) << 16) | self.stream as u32
    }

    /// Parse a header word, rejecting a non-zero reserved byte.
    pub fn from_word(word: u32) -> Result<Self> {
        if word & 0x0000_FF00 != 0 {
            return Err(FrameError::InvalidHeader { word });
        }
        Ok(Self {
            length: (word >> 16) as u16,
            stream: word as u8,
        })
    }

    /// Number of payload words following this header.
    pub fn payload_words(self) -> usize {
        (self.length as usize).div_ceil(WORD_SIZE)
    }
}

/// A target → host message with its stream tag.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The stream this message belongs to.
    pub stream: u8,
    /// The message payload, trimmed to the declared length.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(stream: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            stream,
            payload: payload.into(),
        }
    }

    /// A raw-pipe frame.
    pub fn raw(payload: impl Into<Bytes>) -> Self {
        Self::new(RAW_PIPE, payload)
    }

    /// The total wire size of this frame (header + padded payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + padded_len(self.payload.len())
    }
}

/// Round a byte count up to whole words.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD_SIZE) * WORD_SIZE
}

/// Pack bytes into little-endian words, zero-filling the last one.
pub fn pack_words(payload: &[u8]) -> impl Iterator<Item = u32> + '_ {
    payload.chunks(WORD_SIZE).map(|chunk| {
        let mut word = [0u8; WORD_SIZE];
        word[..chunk.len()].copy_from_slice(chunk);
        u32::from_le_bytes(word)
    })
}

/// Encode a target → host frame as the probe sees it.
///
/// Wire format (each cell one little-endian word):
/// ```text
/// ┌──────────────────────────────┬──────────┬─────┬────────────────────┐
/// │ len:16 │ 0:8 │ stream:8       │ word 0   │ ... │ word n (zero-fill) │
/// └──────────────────────────────┴──────────┴─────┴────────────────────┘
/// ```
pub fn encode_frame(stream: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_FRAME_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + padded_len(payload.len()));
    dst.put_u32_le(FrameHeader::new(payload.len() as u16, stream).to_word());
    for word in pack_words(payload) {
        dst.put_u32_le(word);
    }
    Ok(())
}

/// Decode a target → host frame from a buffer.
///
/// Returns `Ok(None)` until the header and every padded payload word are
/// buffered. On success, consumes the frame (padding included) and trims the
/// payload to the declared length.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let word = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    let header = FrameHeader::from_word(word)?;
    let length = header.length as usize;

    if length > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }

    let padded = padded_len(length);
    if src.len() < HEADER_SIZE + padded {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let mut body = src.split_to(padded);
    body.truncate(length);

    Ok(Some(Frame {
        stream: header.stream,
        payload: body.freeze(),
    }))
}

/// Encode a host → target packet: big-endian u16 length, then raw bytes.
pub fn encode_packet(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_FRAME_PAYLOAD,
        });
    }
    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_u16(payload.len() as u16);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a host → target packet, `Ok(None)` while incomplete.
pub fn decode_packet(src: &mut BytesMut) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }
    let length = u16::from_be_bytes([src[0], src[1]]) as usize;
    if src.len() < LENGTH_PREFIX_SIZE + length {
        return Ok(None);
    }
    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(length).freeze()))
}

/// Configuration for host-side packet writers. Timeouts belong to the
/// underlying stream (see `dcclink_regs::ProbeConfig`).
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: the 16-bit length limit.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_FRAME_PAYLOAD,
        }
    }
}

/// Poll periods used by the target while it waits on the mailbox.
///
/// These only set how often a flag is sampled. No wait has an upper bound.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait for the first byte of an incoming packet.
    pub data_poll: Duration,
    /// Wait between bytes of a packet already in progress.
    pub byte_poll: Duration,
    /// Wait for the host to take the previous outgoing byte.
    pub busy_poll: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            data_poll: Duration::from_millis(10),
            byte_poll: Duration::from_millis(1),
            busy_poll: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{DEBUG_ASCII, TRACE_MSG};

    #[test]
    fn header_word_layout() {
        let header = FrameHeader::new(300, RAW_PIPE);
        assert_eq!(header.to_word(), 0x012C_0003);
        assert_eq!(FrameHeader::from_word(0x012C_0003).unwrap(), header);
    }

    #[test]
    fn header_with_reserved_bits_is_rejected() {
        let result = FrameHeader::from_word(0x0004_0103);
        assert!(matches!(
            result,
            Err(FrameError::InvalidHeader { word: 0x0004_0103 })
        ));
    }

    #[test]
    fn payload_words_are_little_endian() {
        let words: Vec<u32> = pack_words(&[0x11, 0x22, 0x33, 0x44]).collect();
        assert_eq!(words, vec![0x4433_2211]);
    }

    #[test]
    fn last_word_is_zero_filled() {
        let words: Vec<u32> = pack_words(&[1, 2, 3, 4, 5, 6]).collect();
        assert_eq!(words, vec![0x0403_0201, 0x0000_0605]);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, target!";

        encode_frame(RAW_PIPE, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 16);

        let frame = decode_frame(&mut buf, MAX_FRAME_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.stream, RAW_PIPE);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x03, 0x00, 0x05][..]);
        let result = decode_frame(&mut buf, MAX_FRAME_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_waits_for_padding() {
        let mut buf = BytesMut::new();
        encode_frame(RAW_PIPE, b"hello", &mut buf).unwrap();
        // Declared length is satisfied but the padded word is not complete.
        buf.truncate(HEADER_SIZE + 5);

        let result = decode_frame(&mut buf, MAX_FRAME_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 5);
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(FrameHeader::new(1024, RAW_PIPE).to_word());

        let result = decode_frame(&mut buf, 16);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(TRACE_MSG, b"first", &mut buf).unwrap();
        encode_frame(DEBUG_ASCII, b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, MAX_FRAME_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1.stream, TRACE_MSG);
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, MAX_FRAME_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f2.stream, DEBUG_ASCII);
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload_is_header_only() {
        let mut buf = BytesMut::new();
        encode_frame(RAW_PIPE, b"", &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let frame = decode_frame(&mut buf, MAX_FRAME_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_frame(RAW_PIPE, &payload, &mut buf),
            Err(FrameError::PayloadTooLarge { .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn packet_length_prefix_is_big_endian() {
        let payload = vec![0xEE; 300];
        let mut buf = BytesMut::new();
        encode_packet(&payload, &mut buf).unwrap();

        assert_eq!(&buf[..2], &[0x01, 0x2C]);
        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + 300);

        let decoded = decode_packet(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.as_ref(), payload.as_slice());
        assert!(buf.is_empty());
    }

    #[test]
    fn packet_decode_waits_for_body() {
        let mut buf = BytesMut::from(&[0x00, 0x03, b'a', b'b'][..]);
        assert!(decode_packet(&mut buf).unwrap().is_none());
        buf.put_u8(b'c');
        assert_eq!(decode_packet(&mut buf).unwrap().unwrap().as_ref(), b"abc");
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::raw(Bytes::from_static(b"tests"));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 8);
    }
}
