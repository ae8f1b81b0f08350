//! Wakeup timer period selection.
//!
//! The wakeup timer counts down WUT+1 cycles of the clock selected by WUCKSEL.
//! With the 1 Hz ck_spre clock the period is WUT+1 seconds; the extended
//! selection adds 2<sup>16</sup> to the count, reaching 36 hours.

pub use crate::registers::WakeupClock;
use crate::RtcError;

/// Longest period reachable from ck_spre, in seconds.
pub const MAX_PERIOD_SECS: u32 = 2 << 16;

const EXTENSION: u32 = 1 << 16;

/// Clock selection and reload value for a period of `secs` seconds of
/// ck_spre.
pub fn reload_for_seconds(secs: u32) -> Result<(WakeupClock, u16), RtcError> {
    if secs == 0 || secs > MAX_PERIOD_SECS {
        return Err(RtcError::InvalidArgument(
            "wakeup period must be 1-131072 seconds",
        ));
    }
    match u16::try_from(secs - 1) {
        Ok(reload) => Ok((WakeupClock::Spre, reload)),
        Err(_) => Ok((
            WakeupClock::SpreExtended,
            u16::try_from(secs - 1 - EXTENSION).unwrap_or(u16::MAX),
        )),
    }
}

/// Number of wakeup clock cycles in one period.
pub fn period_cycles(clock: WakeupClock, reload: u16) -> u32 {
    let cycles = u32::from(reload) + 1;
    match clock {
        WakeupClock::SpreExtended => cycles + EXTENSION,
        _ => cycles,
    }
}
