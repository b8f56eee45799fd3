use std::fmt;
use std::io;

use dcclink_frame::FrameError;
use dcclink_regs::RegsError;
use dcclink_relay::RelayError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const LINK_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG_ERROR: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrInUse => FAILURE,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn regs_error(context: &str, err: RegsError) -> CliError {
    match err {
        RegsError::Probe(source) => io_error(context, source),
        other => CliError::new(LINK_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Regs(source) => regs_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidHeader { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::LinkDisabled => CliError::new(LINK_ERROR, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn relay_error(context: &str, err: RelayError) -> CliError {
    match err {
        RelayError::Io(source) => io_error(context, source),
        RelayError::Frame(source) => frame_error(context, source),
        RelayError::Regs(source) => regs_error(context, source),
        RelayError::Config(_) | RelayError::Json(_) => {
            CliError::new(CONFIG_ERROR, format!("{context}: {err}"))
        }
        RelayError::UnknownCommand(_) | RelayError::Unavailable(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        RelayError::RemoteClosed | RelayError::BadGreeting(_) | RelayError::Disabled => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        RelayError::AllocationFailed { .. } => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}
