use tracing::{debug, info};

use crate::error::Result;
use crate::layout::{DBG_ATTACHED, DCRDR, DHCSR};
use crate::traits::RegisterIo;

/// Whether a debugger is on the other end of the channel.
///
/// Sampled once per attach point and then carried around as a plain value.
/// Nothing re-reads DHCSR behind the caller's back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// A debugger was attached at the last attach point.
    Attached,
    /// No debugger; writes are swallowed and reads fail.
    #[default]
    Detached,
}

impl LinkState {
    /// Sample DHCSR and, if a debugger is present, clear the mailbox so both
    /// slots start out empty.
    pub fn detect<I: RegisterIo>(io: &mut I) -> Result<Self> {
        let dhcsr = io.read_u32(DHCSR)?;
        if dhcsr & DBG_ATTACHED == 0 {
            debug!(dhcsr = format_args!("{dhcsr:#010x}"), "no debugger attached");
            return Ok(Self::Detached);
        }

        io.write_u32(DCRDR, 0)?;
        info!("debugger attached, dcc mailbox cleared");
        Ok(Self::Attached)
    }

    pub fn is_attached(self) -> bool {
        self == Self::Attached
    }
}
