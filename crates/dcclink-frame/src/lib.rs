//! DCC wire framing.
//!
//! Target → host: every transfer is a header word followed by payload words,
//! all little-endian:
//! - 16-bit payload length in the high half of the header
//! - 8-bit stream type tag in the low byte
//! - payload packed four bytes per word, last word zero-filled
//!
//! Host → target: a big-endian 16-bit length followed by raw bytes.
//!
//! [`DccTarget`] is the firmware's side. On the host, [`FrameReader`] pulls
//! frames out of a probe stream or a saved capture and [`PacketWriter`]
//! pushes packets into a [`dcclink_regs::ProbeStream`].

pub mod codec;
pub mod error;
pub mod reader;
pub mod stream;
pub mod target;
pub mod writer;

pub use codec::{
    decode_frame, decode_packet, encode_frame, encode_packet, pack_words, Frame, FrameConfig,
    FrameHeader, PollConfig, HEADER_SIZE, MAX_FRAME_PAYLOAD, WORD_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use stream::{stream_name, DEBUG_ASCII, DEBUG_CHAR, DEBUG_HEX, RAW_PIPE, TRACE_MSG};
pub use target::DccTarget;
pub use writer::PacketWriter;
