//! In-process register file standing in for a real target and probe.
//!
//! Both ends of a simulated link share one [`SimulatedDebugger`]. The target
//! firmware talks to [`SimulatedDebugger::target`], the host side to
//! [`SimulatedDebugger::probe`]; each handle can live on its own thread.
//! Every access is a single atomic operation on the backing word, so the
//! halfword slot writes are as indivisible as on the real bus.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::{RegsError, Result};
use crate::layout::{is_busy, DBG_ATTACHED, DCRDR, DHCSR, H2T, T2H};
use crate::traits::RegisterIo;

#[derive(Debug, Default)]
struct SimState {
    dhcsr: AtomicU32,
    dcrdr: AtomicU32,
    accesses: AtomicU64,
    overruns: AtomicU64,
}

/// Shared register file for a simulated target/probe pair.
#[derive(Debug, Clone)]
pub struct SimulatedDebugger {
    state: Arc<SimState>,
}

impl SimulatedDebugger {
    /// Create a register file with the debugger attached or not.
    pub fn new(attached: bool) -> Self {
        let debugger = Self {
            state: Arc::new(SimState::default()),
        };
        debugger.set_attached(attached);
        debugger
    }

    /// Register handle for the target firmware.
    pub fn target(&self) -> SimRegisters {
        SimRegisters {
            state: Arc::clone(&self.state),
        }
    }

    /// Register handle for the debug probe.
    pub fn probe(&self) -> SimRegisters {
        SimRegisters {
            state: Arc::clone(&self.state),
        }
    }

    /// Flip the debugger-attached bit in DHCSR.
    pub fn set_attached(&self, attached: bool) {
        if attached {
            self.state.dhcsr.fetch_or(DBG_ATTACHED, Ordering::SeqCst);
        } else {
            self.state.dhcsr.fetch_and(!DBG_ATTACHED, Ordering::SeqCst);
        }
    }

    /// Raw DCRDR contents.
    pub fn mailbox(&self) -> u32 {
        self.state.dcrdr.load(Ordering::SeqCst)
    }

    /// Total register accesses made through any handle.
    pub fn accesses(&self) -> u64 {
        self.state.accesses.load(Ordering::SeqCst)
    }

    /// Slot publishes that landed on a slot whose flag was still set.
    ///
    /// Stays zero as long as both sides respect the flag discipline.
    pub fn overruns(&self) -> u64 {
        self.state.overruns.load(Ordering::SeqCst)
    }
}

/// One side's view of a [`SimulatedDebugger`].
#[derive(Debug, Clone)]
pub struct SimRegisters {
    state: Arc<SimState>,
}

impl SimRegisters {
    fn register(&self, addr: u32) -> Result<(&AtomicU32, u32)> {
        self.state.accesses.fetch_add(1, Ordering::Relaxed);
        match addr {
            a if (DHCSR..DHCSR + 4).contains(&a) => Ok((&self.state.dhcsr, a - DHCSR)),
            a if (DCRDR..DCRDR + 4).contains(&a) => Ok((&self.state.dcrdr, a - DCRDR)),
            _ => Err(RegsError::Unmapped { addr }),
        }
    }

    fn update(cell: &AtomicU32, f: impl Fn(u32) -> u32) -> u32 {
        match cell.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |old| Some(f(old))) {
            Ok(old) | Err(old) => old,
        }
    }
}

fn check_aligned(addr: u32, width: u32) -> Result<()> {
    if addr % width != 0 {
        Err(RegsError::Unaligned { addr, width })
    } else {
        Ok(())
    }
}

impl RegisterIo for SimRegisters {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        let (cell, offset) = self.register(addr)?;
        Ok((cell.load(Ordering::SeqCst) >> (offset * 8)) as u8)
    }

    fn write_u8(&mut self, addr: u32, value: u8) -> Result<()> {
        let (cell, offset) = self.register(addr)?;
        let shift = offset * 8;
        Self::update(cell, |old| {
            (old & !(0xFF << shift)) | ((value as u32) << shift)
        });
        Ok(())
    }

    fn write_u16(&mut self, addr: u32, value: u16) -> Result<()> {
        check_aligned(addr, 2)?;
        let (cell, offset) = self.register(addr)?;
        let shift = offset * 8;
        let old = Self::update(cell, |old| {
            (old & !(0xFFFF << shift)) | ((value as u32) << shift)
        });

        if (addr == T2H || addr == H2T) && is_busy((old >> shift) as u8) && is_busy(value as u8) {
            self.state.overruns.fetch_add(1, Ordering::SeqCst);
            trace!(addr = format_args!("{addr:#010x}"), "slot overrun");
        }
        Ok(())
    }

    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        check_aligned(addr, 4)?;
        let (cell, _) = self.register(addr)?;
        Ok(cell.load(Ordering::SeqCst))
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        check_aligned(addr, 4)?;
        let (cell, _) = self.register(addr)?;
        cell.store(value, Ordering::SeqCst);
        Ok(())
    }
}
