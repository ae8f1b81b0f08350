//! Register bus abstraction.
//!
//! The drivers never dereference raw pointers themselves. Every register
//! access goes through a [`RegisterBus`], which makes the peripheral
//! replaceable by a simulation in tests or by a bridge to a debug probe.

use crate::registers::RegAddr;

/// RTC base address on STM32G4 devices.
pub const STM32G4_RTC_BASE: usize = 0x4000_2800;

/// 32-bit register access to one RTC instance.
pub trait RegisterBus {
    /// Reads the register at `reg`.
    fn read(&mut self, reg: RegAddr) -> u32;

    /// Writes `value` to the register at `reg`.
    fn write(&mut self, reg: RegAddr, value: u32);
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    #[inline]
    fn read(&mut self, reg: RegAddr) -> u32 {
        T::read(self, reg)
    }

    #[inline]
    fn write(&mut self, reg: RegAddr, value: u32) {
        T::write(self, reg, value)
    }
}

/// Volatile memory-mapped access to the RTC block.
#[derive(Debug)]
pub struct Mmio {
    base: *mut u32,
}

// The pointer designates a fixed peripheral, not memory owned by a thread.
unsafe impl Send for Mmio {}

impl Mmio {
    /// Creates a bus for the RTC block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of an RTC peripheral, and no other code may
    /// access that peripheral while the returned value is alive.
    pub const unsafe fn new(base: usize) -> Self {
        Self {
            base: base as *mut u32,
        }
    }

    /// Base address of the block.
    pub fn base(&self) -> usize {
        self.base as usize
    }

    #[inline]
    fn register(&self, reg: RegAddr) -> *mut u32 {
        (self.base as usize + reg.offset()) as *mut u32
    }
}

impl RegisterBus for Mmio {
    #[inline]
    fn read(&mut self, reg: RegAddr) -> u32 {
        // SAFETY: `new` requires a valid RTC block and offsets stay inside it
        unsafe { core::ptr::read_volatile(self.register(reg)) }
    }

    #[inline]
    fn write(&mut self, reg: RegAddr, value: u32) {
        // SAFETY: as above
        unsafe { core::ptr::write_volatile(self.register(reg), value) }
    }
}
