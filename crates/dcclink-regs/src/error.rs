/// Errors that can occur while accessing the channel registers.
#[derive(Debug, thiserror::Error)]
pub enum RegsError {
    /// The address does not belong to any register this backend exposes.
    #[error("unmapped register address {addr:#010x}")]
    Unmapped { addr: u32 },

    /// The access width is not naturally aligned for the address.
    #[error("unaligned {width}-byte access at {addr:#010x}")]
    Unaligned { addr: u32, width: u32 },

    /// The debug probe failed to complete the access.
    #[error("probe access failed: {0}")]
    Probe(#[from] std::io::Error),

    /// The debugger is no longer attached to the target.
    #[error("debugger detached")]
    Detached,
}

pub type Result<T> = std::result::Result<T, RegsError>;
