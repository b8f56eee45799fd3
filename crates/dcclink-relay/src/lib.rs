//! TCP relay for the DCC raw pipe.
//!
//! External tools connect over TCP, get a greeting, and from then on every
//! byte they send is queued as a host → target packet, while every raw-pipe
//! frame the target emits is written back to them unframed.
//!
//! [`RelayServer`] runs the accept loop and per-client readers, a
//! [`LinkPump`] owns the probe, and [`connect`] is the client side.

pub mod assembler;
pub mod command;
pub mod config;
pub mod connection;
pub mod connector;
pub mod control;
pub mod error;
pub mod listener;
pub mod loopback;
pub mod packet;
pub mod pump;
pub mod session;

pub use assembler::FrameAssembler;
pub use command::{ConsoleCommand, USAGE};
pub use config::{RelayConfig, DEFAULT_FRAME_SIZE, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, GREETING};
pub use connection::{ClientSocket, DccConnection};
pub use connector::{connect, connect_with_greeting, RelayClient};
pub use control::RelayControl;
pub use error::{RelayError, Result};
pub use listener::RelayServer;
pub use loopback::spawn_echo_target;
pub use packet::Packet;
pub use pump::LinkPump;
pub use session::SessionTable;
