//! Relay backed by an in-process loopback target.
//!
//! Run with:
//!   cargo run --example loopback-relay
//!
//! In another terminal:
//!   nc 127.0.0.1 3532
//!
//! Every line typed comes back once the loopback firmware has echoed it over
//! the simulated mailbox.

use dcclink::frame::PollConfig;
use dcclink::regs::{SimulatedDebugger, StdDelay};
use dcclink::relay::{spawn_echo_target, LinkPump, RelayConfig, RelayServer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RelayConfig::default();
    let debugger = SimulatedDebugger::new(true);
    spawn_echo_target(&debugger, config.frame_size, PollConfig::default())?;

    let server = RelayServer::bind(config.clone())?;
    eprintln!("Listening on {}", server.local_addr()?);

    let pump = LinkPump::probe(debugger.probe(), StdDelay, &config);
    server.run(pump)?;
    Ok(())
}
