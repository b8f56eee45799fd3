use crate::error::Result;

/// Access to the target's memory-mapped debug registers.
///
/// On the target this is a volatile load/store ([`crate::MmioRegisters`]).
/// On the host it is a debug probe reaching the same addresses over SWD or
/// JTAG. Each call must be a single bus access of the stated width: the
/// channel protocol relies on a halfword store publishing flag and data
/// together.
pub trait RegisterIo {
    /// Read one byte.
    fn read_u8(&mut self, addr: u32) -> Result<u8>;

    /// Write one byte.
    fn write_u8(&mut self, addr: u32, value: u8) -> Result<()>;

    /// Write one halfword atomically.
    fn write_u16(&mut self, addr: u32, value: u16) -> Result<()>;

    /// Read one word.
    fn read_u32(&mut self, addr: u32) -> Result<u32>;

    /// Write one word.
    fn write_u32(&mut self, addr: u32, value: u32) -> Result<()>;
}

impl<T: RegisterIo + ?Sized> RegisterIo for &mut T {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        (**self).read_u8(addr)
    }

    fn write_u8(&mut self, addr: u32, value: u8) -> Result<()> {
        (**self).write_u8(addr, value)
    }

    fn write_u16(&mut self, addr: u32, value: u16) -> Result<()> {
        (**self).write_u16(addr, value)
    }

    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        (**self).read_u32(addr)
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        (**self).write_u32(addr, value)
    }
}
