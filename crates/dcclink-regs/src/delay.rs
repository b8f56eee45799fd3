//! Delay capability used between register polls.
//!
//! The poll loops never sleep on their own; they call whatever [`Delay`] the
//! caller handed in. Tick size only changes how often a slot is sampled, it
//! never bounds how long a wait lasts.

use std::time::Duration;

/// Blocking delay between two polls of a register.
pub trait Delay {
    /// Wait roughly `period`. A zero period may return immediately.
    fn delay(&mut self, period: Duration);
}

impl<T: Delay + ?Sized> Delay for &mut T {
    fn delay(&mut self, period: Duration) {
        (**self).delay(period)
    }
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, period: Duration) {
        if period.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(period);
        }
    }
}

/// Never sleeps; only yields so the other side of a simulated link can run.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay(&mut self, _period: Duration) {
        std::thread::yield_now();
    }
}
