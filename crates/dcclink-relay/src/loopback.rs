//! In-process stand-in for a target board.
//!
//! Runs the firmware side of the link on a thread against a
//! [`SimulatedDebugger`] and echoes every host packet back on the raw pipe.

use std::thread::JoinHandle;

use dcclink_frame::{DccTarget, PollConfig, TRACE_MSG};
use dcclink_regs::{SimulatedDebugger, StdDelay};
use tracing::{debug, warn};

/// Banner the loopback target logs on the trace stream once attached.
pub const BANNER: &[u8] = b"loopback target ready";

/// Start the echo firmware. The thread runs until the process exits or the
/// link reports an error.
pub fn spawn_echo_target(
    debugger: &SimulatedDebugger,
    buffer_size: usize,
    poll: PollConfig,
) -> std::io::Result<JoinHandle<()>> {
    let io = debugger.target();
    std::thread::Builder::new()
        .name("dcc-loopback".into())
        .spawn(move || {
            let mut target = match DccTarget::attach_with_config(io, StdDelay, poll) {
                Ok(target) => target,
                Err(err) => {
                    warn!(error = %err, "loopback target failed to attach");
                    return;
                }
            };
            if let Err(err) = target.send_stream(TRACE_MSG, BANNER) {
                warn!(error = %err, "loopback banner failed");
                return;
            }

            let mut buf = vec![0u8; buffer_size];
            loop {
                let n = match target.receive(&mut buf) {
                    Ok(n) => n,
                    Err(err) => {
                        warn!(error = %err, "loopback receive failed");
                        return;
                    }
                };
                if target.last_discarded() > 0 {
                    debug!(dropped = target.last_discarded(), "loopback packet truncated");
                }
                if let Err(err) = target.send(&buf[..n]) {
                    warn!(error = %err, "loopback send failed");
                    return;
                }
            }
        })
}
