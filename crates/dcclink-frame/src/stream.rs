//! Stream type tags carried in the low byte of a frame header.
//!
//! The values are fixed by deployed firmware. Hex debug messages share tag 1
//! with ASCII debug messages, so a receiver cannot tell them apart.

/// Trace messages.
pub const TRACE_MSG: u8 = 0;

/// ASCII debug messages.
pub const DEBUG_ASCII: u8 = 1;

/// Hex debug messages (same wire value as [`DEBUG_ASCII`]).
pub const DEBUG_HEX: u8 = 1;

/// Alternate ASCII (character) debug messages.
pub const DEBUG_CHAR: u8 = 2;

/// Raw pipe, relayed verbatim to TCP clients.
pub const RAW_PIPE: u8 = 3;

/// Returns a human-readable name for a stream tag.
pub fn stream_name(tag: u8) -> &'static str {
    match tag {
        TRACE_MSG => "TRACE",
        DEBUG_ASCII => "DBGMSG_ASCII",
        DEBUG_CHAR => "DBGMSG_CHAR",
        RAW_PIPE => "RAWPIPE",
        _ => "UNKNOWN",
    }
}

/// Returns true if the tag is one the link knows about.
pub fn is_known(tag: u8) -> bool {
    tag <= RAW_PIPE
}
