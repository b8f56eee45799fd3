use crate::error::Result;
use crate::traits::RegisterIo;

/// Direct volatile access to the core debug registers, for code running on
/// the target itself.
#[derive(Debug)]
pub struct MmioRegisters {
    _private: (),
}

impl MmioRegisters {
    /// Create a register accessor.
    ///
    /// # Safety
    ///
    /// Only sound on a Cortex-M core where DHCSR and DCRDR are mapped at
    /// their architectural addresses, and only one `MmioRegisters` may be
    /// driving the channel at a time.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterIo for MmioRegisters {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        // SAFETY: the constructor contract guarantees `addr` is a mapped debug register.
        Ok(unsafe { core::ptr::read_volatile(addr as usize as *const u8) })
    }

    fn write_u8(&mut self, addr: u32, value: u8) -> Result<()> {
        // SAFETY: see `read_u8`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u8, value) };
        Ok(())
    }

    fn write_u16(&mut self, addr: u32, value: u16) -> Result<()> {
        // SAFETY: see `read_u8`. Halfword slots are 2-byte aligned.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u16, value) };
        Ok(())
    }

    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        // SAFETY: see `read_u8`.
        Ok(unsafe { core::ptr::read_volatile(addr as usize as *const u32) })
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        // SAFETY: see `read_u8`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) };
        Ok(())
    }
}
