//! Register-level access to the debug communication channel.
//!
//! The channel lives in the Cortex-M debug core register data register
//! (DCRDR), split into two one-byte slots:
//! - target → host: `T2HF` flag + `T2HD` data
//! - host → target: `H2TF` flag + `H2TD` data
//!
//! Whoever sets a flag owns the slot until the other side clears it. That
//! flag discipline is the only flow control the link has.
//!
//! This is the lowest layer of dcclink. The target drives the slots through
//! [`DccPort`]; the host sees the same pair as a byte stream through
//! [`ProbeStream`]. Both are generic over [`RegisterIo`], so tests can run
//! them against the simulated register file in [`sim`].

pub mod delay;
pub mod error;
pub mod layout;
pub mod link;
pub mod mmio;
pub mod port;
pub mod probe;
pub mod sim;
pub mod traits;

pub use delay::{Delay, NoDelay, StdDelay};
pub use error::{RegsError, Result};
pub use link::LinkState;
pub use mmio::MmioRegisters;
pub use port::DccPort;
pub use probe::{ProbeConfig, ProbeStream};
pub use sim::{SimRegisters, SimulatedDebugger};
pub use traits::RegisterIo;
