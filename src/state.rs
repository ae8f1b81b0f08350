//! Peripheral state tracking and the register plumbing shared by the blocking
//! and async drivers.
//!
//! The RTC keeps its write protection, initialization mode and shadow register
//! synchronization in hardware. The driver mirrors that state in
//! [`PeripheralState`] so that every operation can check its preconditions
//! before touching a register. The mirror only knows about writes issued
//! through the handle that owns it.
//!
//! The RTC lives in the backup domain: if backup power is retained the
//! protection state, calendar and configuration survive a system reset, so the
//! state recorded at construction is an assumption until the first
//! [`unlock`](crate::Rtc::unlock) or [`lock`](crate::Rtc::lock).

use crate::alarm::{pack_alarm, pack_alarm_subsecond, AlarmConfig, AlarmId};
use crate::bus::RegisterBus;
use crate::datetime::{pack_date, pack_time, unpack_time, CalendarDate, WallTime};
use crate::registers::{
    key, Control, DateReg, Icsr, Prescaler, RegAddr, SubSecondReg, TimeReg, WakeupClock,
    WakeupTimerReg, WriteProtect,
};
use crate::{HourFormat, PrescalerConfig, RtcError};

/// Number of attempts at a coherent calendar read with shadow bypass enabled.
const BYPASS_READ_ATTEMPTS: usize = 4;

/// Write-protection state as seen by the key-sequence decoder of RTC_WPR.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockState {
    /// Configuration registers ignore writes.
    #[default]
    Locked,
    /// The first key was accepted, the second must follow immediately.
    FirstKey,
    /// Configuration registers accept writes.
    Unlocked,
}

impl LockState {
    /// State after a byte is written to RTC_WPR.
    ///
    /// `0xCA` always (re)starts the sequence, `0x53` directly after it
    /// unlocks, and any other write engages the protection.
    #[must_use]
    pub const fn after_key(self, value: u8) -> LockState {
        match (self, value) {
            (_, key::UNLOCK_1) => LockState::FirstKey,
            (LockState::FirstKey, key::UNLOCK_2) => LockState::Unlocked,
            _ => LockState::Locked,
        }
    }
}

/// Counting mode of the calendar.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Free running.
    #[default]
    Normal,
    /// Initialization mode, the calendar is frozen and writable.
    Init,
}

/// Whether the shadow registers are known to reflect the calendar counters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncStatus {
    /// RSF has not been observed since the last event that clears it.
    #[default]
    Unknown,
    /// RSF was observed set.
    Synchronized,
}

/// Hardware handshake flags the drivers poll, all in RTC_ICSR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Handshake {
    /// INITF set after an init request
    InitReady,
    /// RSF set after the shadow registers were refreshed
    RegisterSync,
    /// WUTWF set, the wakeup reload value may be written
    WakeupWrite,
    /// ALRAWF set, alarm A may be written
    AlarmAWrite,
    /// ALRBWF set, alarm B may be written
    AlarmBWrite,
    /// RECALPF clear, CALR may be written
    Recalibration,
    /// SHPF clear, SHIFTR may be written
    Shift,
}

impl Handshake {
    pub(crate) fn is_ready(self, icsr: Icsr) -> bool {
        match self {
            Handshake::InitReady => icsr.initf(),
            Handshake::RegisterSync => icsr.rsf(),
            Handshake::WakeupWrite => icsr.wutwf(),
            Handshake::AlarmAWrite => icsr.alrawf(),
            Handshake::AlarmBWrite => icsr.alrbwf(),
            Handshake::Recalibration => !icsr.recalpf(),
            Handshake::Shift => !icsr.shpf(),
        }
    }
}

/// Driver-side mirror of the peripheral handshake state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralState {
    /// Write protection
    pub lock: LockState,
    /// Calendar mode
    pub mode: Mode,
    /// Shadow register synchronization
    pub sync: SyncStatus,
}

impl PeripheralState {
    /// Returns `true` if configuration writes are accepted.
    #[inline]
    pub fn is_unlocked(&self) -> bool {
        self.lock == LockState::Unlocked
    }
}

/// Register plumbing shared by [`Rtc`](crate::Rtc) and the async driver.
///
/// Nothing here polls; the drivers sequence these steps around their own
/// handshake waits.
#[derive(Debug)]
pub(crate) struct Block<B> {
    bus: B,
    state: PeripheralState,
}

impl<B: RegisterBus> Block<B> {
    pub(crate) const fn new(bus: B) -> Self {
        Self {
            bus,
            state: PeripheralState {
                lock: LockState::Locked,
                mode: Mode::Normal,
                sync: SyncStatus::Unknown,
            },
        }
    }

    pub(crate) fn free(self) -> B {
        self.bus
    }

    #[cfg(test)]
    pub(crate) fn bus(&mut self) -> &mut B {
        &mut self.bus
    }

    pub(crate) fn state(&self) -> PeripheralState {
        self.state
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) {
        self.state.mode = mode;
    }

    pub(crate) fn set_sync(&mut self, sync: SyncStatus) {
        self.state.sync = sync;
    }

    pub(crate) fn read<T: From<u32>>(&mut self, reg: RegAddr) -> T {
        T::from(self.bus.read(reg))
    }

    pub(crate) fn write<T: Into<u32>>(&mut self, reg: RegAddr, value: T) {
        self.bus.write(reg, value.into());
    }

    pub(crate) fn control(&mut self) -> Control {
        self.read(RegAddr::Cr)
    }

    pub(crate) fn modify_control(&mut self, f: impl FnOnce(&mut Control)) {
        let mut cr = self.control();
        f(&mut cr);
        self.write(RegAddr::Cr, cr);
    }

    pub(crate) fn icsr(&mut self) -> Icsr {
        self.read(RegAddr::Icsr)
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<(), RtcError> {
        if self.state.is_unlocked() {
            Ok(())
        } else {
            Err(RtcError::WriteProtected)
        }
    }

    pub(crate) fn ensure_init(&self) -> Result<(), RtcError> {
        if self.state.mode == Mode::Init {
            Ok(())
        } else {
            Err(RtcError::NotInitMode)
        }
    }

    fn write_key(&mut self, value: u8) {
        let mut wpr = WriteProtect::default();
        wpr.set_key(value);
        self.write(RegAddr::Wpr, wpr);
        self.state.lock = self.state.lock.after_key(value);
        trace!("rtc: wpr <- {:#x}, {:?}", value, self.state.lock);
    }

    pub(crate) fn unlock(&mut self) {
        self.write_key(key::UNLOCK_1);
        self.write_key(key::UNLOCK_2);
        debug!("rtc: write protection disabled");
    }

    pub(crate) fn lock(&mut self) {
        self.write_key(key::LOCK);
        debug!("rtc: write protection enabled");
    }

    /// Unlocks unless already unlocked; returns whether the caller must lock
    /// again when done.
    pub(crate) fn begin_protected(&mut self) -> bool {
        if self.state.is_unlocked() {
            false
        } else {
            self.unlock();
            true
        }
    }

    pub(crate) fn end_protected(&mut self, relock: bool) {
        if relock {
            self.lock();
        }
    }

    pub(crate) fn request_init(&mut self) {
        let mut icsr = self.icsr();
        icsr.set_init(true);
        icsr.set_rsf(true);
        self.write(RegAddr::Icsr, icsr);
    }

    /// Clears INIT, restarting the calendar from the written values.
    pub(crate) fn release_init(&mut self) {
        let mut icsr = self.icsr();
        icsr.set_init(false);
        icsr.set_rsf(true);
        self.write(RegAddr::Icsr, icsr);
        self.state.mode = Mode::Normal;
        self.state.sync = SyncStatus::Unknown;
        debug!("rtc: left initialization mode");
    }

    /// Whether a shadow register read must wait for RSF first.
    pub(crate) fn needs_sync(&mut self) -> bool {
        self.state.mode == Mode::Normal
            && self.state.sync != SyncStatus::Synchronized
            && !self.control().bypshad()
    }

    pub(crate) fn clear_rsf(&mut self) {
        let mut icsr = self.icsr();
        icsr.set_rsf(false);
        self.write(RegAddr::Icsr, icsr);
        self.state.sync = SyncStatus::Unknown;
    }

    /// Reads SSR, TR and DR as one coherent snapshot.
    ///
    /// With shadow registers in use, reading SSR freezes TR and DR until DR
    /// is read. With bypass enabled the counters are live, so the read is
    /// repeated until neither SSR nor TR changed across it. TR is compared as
    /// well because SSR stays at zero when PREDIV_S is zero.
    pub(crate) fn read_calendar(&mut self) -> Result<(SubSecondReg, TimeReg, DateReg), RtcError> {
        if !self.control().bypshad() {
            let ssr: SubSecondReg = self.read(RegAddr::Ssr);
            let tr: TimeReg = self.read(RegAddr::Tr);
            let dr: DateReg = self.read(RegAddr::Dr);
            return Ok((ssr, tr, dr));
        }

        for _ in 0..BYPASS_READ_ATTEMPTS {
            let before: SubSecondReg = self.read(RegAddr::Ssr);
            let tr: TimeReg = self.read(RegAddr::Tr);
            let dr: DateReg = self.read(RegAddr::Dr);
            let after: SubSecondReg = self.read(RegAddr::Ssr);
            let tr_after: TimeReg = self.read(RegAddr::Tr);
            if before == after && tr == tr_after {
                return Ok((after, tr, dr));
            }
        }
        error!("rtc: calendar changed during every bypass read");
        Err(RtcError::InvalidHardwareState)
    }

    pub(crate) fn write_time(&mut self, time: &WallTime) -> Result<(), RtcError> {
        self.ensure_init()?;
        if time.format() != self.control().hour_format() {
            return Err(RtcError::InvalidArgument(
                "time hour format does not match FMT",
            ));
        }
        let raw = pack_time(time)?;
        debug!("rtc: tr <- {:#x}", raw);
        self.write(RegAddr::Tr, raw);
        Ok(())
    }

    pub(crate) fn write_date(&mut self, date: &CalendarDate) -> Result<(), RtcError> {
        self.ensure_init()?;
        let raw = pack_date(date)?;
        debug!("rtc: dr <- {:#x}", raw);
        self.write(RegAddr::Dr, raw);
        Ok(())
    }

    pub(crate) fn write_prescaler(&mut self, prescaler: &PrescalerConfig) -> Result<(), RtcError> {
        self.ensure_init()?;
        let prer: Prescaler = prescaler.pack()?;
        self.write(RegAddr::Prer, prer);
        Ok(())
    }

    /// Switches FMT and rewrites TR so the frozen time keeps its meaning.
    pub(crate) fn write_hour_format(&mut self, format: HourFormat) -> Result<WallTime, RtcError> {
        self.ensure_init()?;
        let current = self.control().hour_format();
        let time = unpack_time(self.read(RegAddr::Tr), current)?;
        if current == format {
            return Ok(time);
        }
        let time = time.to_format(format);
        let raw = pack_time(&time)?;
        self.modify_control(|cr| cr.set_fmt(format.into()));
        self.write(RegAddr::Tr, raw);
        debug!("rtc: hour format {:?}, tr <- {:#x}", format, raw);
        Ok(time)
    }

    pub(crate) fn write_bypass_shadow(&mut self, bypass: bool) -> Result<(), RtcError> {
        self.ensure_init()?;
        self.modify_control(|cr| cr.set_bypshad(bypass));
        Ok(())
    }

    /// Validates and packs an alarm against the current hour format.
    pub(crate) fn prepare_alarm(&mut self, alarm: &AlarmConfig) -> Result<(u32, u32), RtcError> {
        if alarm.hour.is_some() && alarm.hour_format() != self.control().hour_format() {
            return Err(RtcError::InvalidArgument(
                "alarm hour format does not match FMT",
            ));
        }
        Ok((pack_alarm(alarm)?, pack_alarm_subsecond(&alarm.subseconds)?))
    }

    pub(crate) fn set_alarm_enable(&mut self, id: AlarmId, enable: bool) {
        self.modify_control(|cr| match id {
            AlarmId::A => cr.set_alrae(enable),
            AlarmId::B => cr.set_alrbe(enable),
        });
    }

    /// First step of a wakeup timer update: stop the timer so that WUTWF
    /// can assert.
    pub(crate) fn stop_wakeup_timer(&mut self) {
        self.modify_control(|cr| cr.set_wute(false));
    }

    pub(crate) fn start_wakeup_timer(&mut self, reload: u16, clock: WakeupClock, interrupt: bool) {
        self.modify_control(|cr| {
            cr.set_wucksel(clock);
            cr.set_wutie(interrupt);
        });
        let mut wutr = WakeupTimerReg::default();
        wutr.set_wut(reload);
        self.write(RegAddr::Wutr, wutr);
        self.modify_control(|cr| cr.set_wute(true));
        debug!("rtc: wakeup timer {:?} reload {}", clock, reload);
    }

    pub(crate) fn write_alarm(&mut self, id: AlarmId, alrm: u32, ssr: u32) {
        debug!("rtc: alarm {:?} <- {:#x} / {:#x}", id, alrm, ssr);
        self.write(id.register(), alrm);
        self.write(id.subsecond_register(), ssr);
    }
}
