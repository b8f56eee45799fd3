use crate::error::Result;
use crate::layout::{is_busy, slot_word, H2T, H2TD, H2TF, T2H, T2HD, T2HF};
use crate::traits::RegisterIo;

/// Slot-level operations on the DCC mailbox.
///
/// Each method is one register access. The target uses the `t2h_*` publish
/// side and the `h2t_*` consume side; a probe uses the mirror image. Pairing
/// them correctly (check the flag, then publish or consume) is left to the
/// callers in `dcclink-frame` and [`crate::ProbeStream`].
#[derive(Debug)]
pub struct DccPort<I> {
    io: I,
}

impl<I: RegisterIo> DccPort<I> {
    pub fn new(io: I) -> Self {
        Self { io }
    }

    /// True while the last target → host byte has not been taken by the host.
    pub fn t2h_pending(&mut self) -> Result<bool> {
        Ok(is_busy(self.io.read_u8(T2HF)?))
    }

    /// Publish a target → host byte, flag and data in one halfword store.
    pub fn t2h_publish(&mut self, data: u8) -> Result<()> {
        self.io.write_u16(T2H, slot_word(data))
    }

    /// Data byte of the target → host slot.
    pub fn t2h_data(&mut self) -> Result<u8> {
        self.io.read_u8(T2HD)
    }

    /// Hand the target → host slot back to the target.
    pub fn t2h_ack(&mut self) -> Result<()> {
        self.io.write_u8(T2HF, 0)
    }

    /// True while a host → target byte is waiting for the target.
    pub fn h2t_pending(&mut self) -> Result<bool> {
        Ok(is_busy(self.io.read_u8(H2TF)?))
    }

    /// Publish a host → target byte.
    pub fn h2t_publish(&mut self, data: u8) -> Result<()> {
        self.io.write_u16(H2T, slot_word(data))
    }

    /// Data byte of the host → target slot.
    pub fn h2t_data(&mut self) -> Result<u8> {
        self.io.read_u8(H2TD)
    }

    /// Hand the host → target slot back to the host.
    pub fn h2t_ack(&mut self) -> Result<()> {
        self.io.write_u8(H2TF, 0)
    }

    pub fn io_mut(&mut self) -> &mut I {
        &mut self.io
    }

    pub fn into_inner(self) -> I {
        self.io
    }
}
