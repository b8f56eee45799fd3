//! Fixed addresses and bit layout of the channel registers.
//!
//! ```text
//! DCRDR (0xE000EDF8), little-endian byte lanes:
//! ┌─────────┬─────────┬─────────┬─────────┐
//! │ +0 T2HF │ +1 T2HD │ +2 H2TF │ +3 H2TD │
//! └─────────┴─────────┴─────────┴─────────┘
//!   T2H (16-bit atomic)   H2T (16-bit atomic)
//! ```

/// Debug Halting Control and Status Register.
pub const DHCSR: u32 = 0xE000_EDF0;

/// Debug Core Register Data Register, reused as the DCC mailbox.
pub const DCRDR: u32 = 0xE000_EDF8;

/// Target → host flag byte.
pub const T2HF: u32 = DCRDR;
/// Target → host data byte.
pub const T2HD: u32 = DCRDR + 1;
/// Target → host flag + data as one halfword.
pub const T2H: u32 = DCRDR;
/// Host → target flag byte.
pub const H2TF: u32 = DCRDR + 2;
/// Host → target data byte.
pub const H2TD: u32 = DCRDR + 3;
/// Host → target flag + data as one halfword.
pub const H2T: u32 = DCRDR + 2;

/// DHCSR bit set while a debugger holds the core in debug mode (C_DEBUGEN).
pub const DBG_ATTACHED: u32 = 1;

/// Slot flag bit: the data byte is valid and unread.
pub const BUSY: u8 = 1;

/// Halfword written to a slot to publish `data`.
pub const fn slot_word(data: u8) -> u16 {
    ((data as u16) << 8) | BUSY as u16
}

/// Returns true if a flag byte marks its slot as occupied.
pub const fn is_busy(flag: u8) -> bool {
    flag & BUSY != 0
}
