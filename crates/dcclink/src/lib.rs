//! Debug Communications Channel link for Cortex-M targets.
//!
//! The DCC mailbox (DCRDR, gated by DHCSR) lets firmware and a debug probe
//! swap bytes through the core's debug registers, with no UART or USB.
//! dcclink frames that byte stream in both directions and relays the raw
//! pipe to TCP clients on the host.
//!
//! # Crate Structure
//!
//! - [`regs`]: register map, register access trait, simulated debugger
//! - [`frame`]: wire format, target encoder/decoder, host reader/writer
//! - [`relay`]: TCP relay and link pump (behind `relay` feature)

/// Re-export register types.
pub mod regs {
    pub use dcclink_regs::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dcclink_frame::*;
}

/// Re-export relay types (requires `relay` feature).
#[cfg(feature = "relay")]
pub mod relay {
    pub use dcclink_relay::*;
}
