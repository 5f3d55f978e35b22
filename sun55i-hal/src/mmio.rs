//! # Register access
//!
//! The DRAM bring-up touches several register blocks, the DRAM window itself and a few
//! undocumented locations. Instead of one typed handle per block, every access goes through the
//! [RegisterAccess] trait on absolute physical addresses. This keeps the sequencing code testable
//! against a simulated SoC.
use core::ptr;

pub trait RegisterAccess {
    fn read32(&mut self, addr: usize) -> u32;
    fn write32(&mut self, addr: usize, value: u32);
    fn read16(&mut self, addr: usize) -> u16;
    fn write16(&mut self, addr: usize, value: u16);
    fn read8(&mut self, addr: usize) -> u8;
    fn write8(&mut self, addr: usize, value: u8);

    /// Read-modify-write of a 32-bit register.
    #[inline]
    fn modify32(&mut self, addr: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read32(addr);
        self.write32(addr, f(value));
    }

    #[inline]
    fn setbits32(&mut self, addr: usize, set: u32) {
        self.modify32(addr, |value| value | set);
    }

    #[inline]
    fn clrbits32(&mut self, addr: usize, clear: u32) {
        self.modify32(addr, |value| value & !clear);
    }

    #[inline]
    fn clrsetbits32(&mut self, addr: usize, clear: u32, set: u32) {
        self.modify32(addr, |value| (value & !clear) | set);
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &mut T {
    #[inline]
    fn read32(&mut self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    #[inline]
    fn write32(&mut self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }

    #[inline]
    fn read16(&mut self, addr: usize) -> u16 {
        (**self).read16(addr)
    }

    #[inline]
    fn write16(&mut self, addr: usize, value: u16) {
        (**self).write16(addr, value)
    }

    #[inline]
    fn read8(&mut self, addr: usize) -> u8 {
        (**self).read8(addr)
    }

    #[inline]
    fn write8(&mut self, addr: usize, value: u8) {
        (**self).write8(addr, value)
    }
}

/// Volatile memory mapped register access.
#[derive(Debug)]
pub struct Mmio {
    _priv: (),
}

impl Mmio {
    /// Create a new register access handle.
    ///
    /// # Safety
    ///
    /// The caller must ensure exclusive access to the CCU DRAM registers, the DRAM controller,
    /// the DRAM PHY, the NSI block and the DRAM window for the lifetime of the handle. No
    /// other code may use the DRAM while it is being brought up.
    pub const unsafe fn new() -> Self {
        Self { _priv: () }
    }
}

impl RegisterAccess for Mmio {
    #[inline]
    fn read32(&mut self, addr: usize) -> u32 {
        if addr % 4 != 0 {
            // Only used for the write leveling results at odd offsets. Whether the PHY returns
            // the same data for a byte-wise read is unverified.
            let mut bytes = [0; 4];
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = self.read8(addr + i);
            }
            return u32::from_le_bytes(bytes);
        }
        // Safety: Exclusive access guaranteed by the constructor contract.
        unsafe { ptr::read_volatile(addr as *const u32) }
    }

    #[inline]
    fn write32(&mut self, addr: usize, value: u32) {
        // Safety: Exclusive access guaranteed by the constructor contract.
        unsafe { ptr::write_volatile(addr as *mut u32, value) }
    }

    #[inline]
    fn read16(&mut self, addr: usize) -> u16 {
        // Safety: Exclusive access guaranteed by the constructor contract.
        unsafe { ptr::read_volatile(addr as *const u16) }
    }

    #[inline]
    fn write16(&mut self, addr: usize, value: u16) {
        // Safety: Exclusive access guaranteed by the constructor contract.
        unsafe { ptr::write_volatile(addr as *mut u16, value) }
    }

    #[inline]
    fn read8(&mut self, addr: usize) -> u8 {
        // Safety: Exclusive access guaranteed by the constructor contract.
        unsafe { ptr::read_volatile(addr as *const u8) }
    }

    #[inline]
    fn write8(&mut self, addr: usize, value: u8) {
        // Safety: Exclusive access guaranteed by the constructor contract.
        unsafe { ptr::write_volatile(addr as *mut u8, value) }
    }
}
