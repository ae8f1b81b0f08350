//! Sharing one driver between thread mode and interrupt handlers.
//!
//! Every handshake sequence (unlock, init, sync wait) must run without an
//! interleaved access to the same peripheral. [`SharedRtc`] stores the driver
//! behind a `critical_section::Mutex`, so each closure passed to
//! [`SharedRtc::with`] runs a whole sequence inside one critical section.
//!
//! ```rust,ignore
//! static RTC: SharedRtc<Mmio, Delay> = SharedRtc::new();
//!
//! RTC.install(Rtc::new(bus, delay));
//!
//! #[interrupt]
//! fn RTC_ALARM() {
//!     RTC.with(|rtc| rtc.clear_status(stat::ALRA));
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;

use crate::bus::RegisterBus;
use crate::Rtc;

/// A [`Rtc`] that can live in a `static`.
pub struct SharedRtc<B: RegisterBus, D: DelayNs> {
    inner: Mutex<RefCell<Option<Rtc<B, D>>>>,
}

impl<B: RegisterBus, D: DelayNs> Default for SharedRtc<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RegisterBus, D: DelayNs> SharedRtc<B, D> {
    /// Creates an empty holder.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Stores the driver, returning the one previously installed.
    pub fn install(&self, rtc: Rtc<B, D>) -> Option<Rtc<B, D>> {
        critical_section::with(|cs| self.inner.borrow(cs).replace(Some(rtc)))
    }

    /// Removes the driver.
    pub fn take(&self) -> Option<Rtc<B, D>> {
        critical_section::with(|cs| self.inner.borrow(cs).take())
    }

    /// Runs `f` on the driver inside a critical section.
    ///
    /// Returns `None` when no driver is installed or when called re-entrantly
    /// from within `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut Rtc<B, D>) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut slot = self.inner.borrow(cs).try_borrow_mut().ok()?;
            slot.as_mut().map(f)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake::FakeRtc;
    use crate::registers::{stat, RegAddr};
    use embedded_hal_mock::eh1::delay::NoopDelay;

    #[test]
    fn test_with_requires_install() {
        let shared: SharedRtc<FakeRtc, NoopDelay> = SharedRtc::new();
        assert!(shared.with(|rtc| rtc.state()).is_none());

        assert!(shared
            .install(Rtc::new(FakeRtc::new(), NoopDelay::new()))
            .is_none());
        shared.with(|rtc| rtc.clear_status(stat::ALRA)).unwrap();

        let (fake, _) = shared.take().unwrap().free();
        assert_eq!(fake.writes_to(RegAddr::Scr), [stat::ALRA]);
        assert!(shared.take().is_none());
    }

    #[test]
    fn test_reentrant_access_is_refused() {
        let shared: SharedRtc<FakeRtc, NoopDelay> = SharedRtc::new();
        shared.install(Rtc::new(FakeRtc::new(), NoopDelay::new()));
        let nested = shared.with(|_| shared.with(|rtc| rtc.state()));
        assert_eq!(nested, Some(None));
    }
}
