/// Errors that can occur in relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The TCP peer went away (zero-length read or short write).
    #[error("remote closed connection")]
    RemoteClosed,

    /// No memory for a packet buffer; the read attempt was abandoned.
    #[error("packet allocation failed ({size} bytes)")]
    AllocationFailed { size: usize },

    /// The relay is switched off.
    #[error("dcc relay disabled")]
    Disabled,

    /// Socket-level error.
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame-level error on the link side.
    #[error("frame error: {0}")]
    Frame(#[from] dcclink_frame::FrameError),

    /// Register access error on the link side.
    #[error("register error: {0}")]
    Regs(#[from] dcclink_regs::RegsError),

    /// The peer did not open with the expected greeting.
    #[error("unexpected greeting: {0:?}")]
    BadGreeting(String),

    /// Console command not recognised or malformed.
    #[error("{0}")]
    UnknownCommand(String),

    /// Console command exists but is not available in this build.
    #[error("command '{0}' is not available")]
    Unavailable(String),

    /// Configuration file could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
