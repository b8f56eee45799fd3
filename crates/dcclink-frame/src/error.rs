/// Errors that can occur during DCC framing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No debugger was attached when the link was set up.
    #[error("dcc link disabled (no debugger attached)")]
    LinkDisabled,

    /// The payload does not fit the 16-bit length field or the configured limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A header word has bits set where the format requires zero.
    #[error("invalid frame header {word:#010x}")]
    InvalidHeader { word: u32 },

    /// Register access failed underneath the framing layer.
    #[error("register access failed: {0}")]
    Regs(#[from] dcclink_regs::RegsError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
