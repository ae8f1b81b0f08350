//! Typed driver for the "version 3" STM32 RTC block (STM32G4 and relatives).
//!
//! The crate gives validated access to the calendar, alarms, wakeup timer,
//! timestamp, calibration and shift units while following the peripheral's
//! handshake protocol:
//!
//! - configuration registers are written between an unlock (0xCA, 0x53 to
//!   RTC_WPR) and a lock;
//! - calendar and prescaler writes happen in initialization mode, entered by
//!   setting INIT and waiting for INITF;
//! - shadow register reads wait for RSF after any event that invalidates
//!   the shadow copies;
//! - wakeup, alarm, calibration and shift writes wait for their write flags.
//!
//! Every wait is bounded by a timeout in microseconds and reported as
//! [`RtcError::Timeout`].
//!
//! # Example
//!
//! ```rust,ignore
//! use stm32_rtc3::{bus::Mmio, datetime::{CalendarDate, WallTime, Weekday}, Config, Rtc};
//!
//! let bus = unsafe { Mmio::new(stm32_rtc3::bus::STM32G4_RTC_BASE) };
//! let mut rtc = Rtc::new(bus, delay);
//! rtc.init(&Config::default())?;
//! rtc.set_date_time(
//!     &CalendarDate::new(24, 4, 3, Weekday::Wednesday),
//!     &WallTime::new(13, 45, 30),
//! )?;
//! let (date, time) = rtc.date_time()?;
//! ```
//!
//! # Features
//!
//! - `async`: [`asynch::Rtc`], whose handshake waits use
//!   `embedded_hal_async::delay::DelayNs`
//! - `log`: log through the `log` crate
//! - `defmt`: log through `defmt` and derive `defmt::Format`
//!
//! # Sharing
//!
//! The handle owns the peripheral and every sequence takes `&mut self`.
//! When the RTC is also used from interrupt handlers, keep it in a
//! [`shared::SharedRtc`] so that each sequence runs inside one critical
//! section.
#![no_std]

#[macro_use]
mod fmt;

pub mod alarm;
#[cfg(feature = "async")]
pub mod asynch;
pub mod bus;
pub mod calibration;
pub mod datetime;
pub mod registers;
pub mod shared;
pub mod state;
pub mod wakeup;

use chrono::{NaiveDateTime, Timelike};
use embedded_hal::delay::DelayNs;

use crate::alarm::{unpack_alarm, unpack_alarm_subsecond, AlarmConfig, AlarmId};
use crate::bus::RegisterBus;
use crate::calibration::CalibrationConfig;
use crate::datetime::{
    unpack_date, unpack_time, unpack_timestamp_date, CalendarDate, Meridiem, Timestamp, WallTime,
    Weekday,
};
pub use crate::registers::{stat, HourFormat, OutputSelect, WakeupClock};
use crate::registers::{
    Control, DateReg, Icsr, Prescaler, RegAddr, Shift, Status, StatusClear, SubSecondReg,
    TimeReg, WakeupTimerReg,
};
use crate::state::{Block, Mode, SyncStatus};
pub use crate::state::{Handshake, PeripheralState};

/// Interval between two reads of a polled flag.
pub const POLL_INTERVAL_US: u32 = 1;

/// Handshake timeout used until [`Rtc::init`] or [`Rtc::set_timeout_us`].
pub const DEFAULT_TIMEOUT_US: u32 = 10_000;

/// Errors reported by the drivers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcError {
    /// A caller supplied value is out of range; the message names it.
    InvalidArgument(&'static str),
    /// A hardware flag did not reach its expected state in time.
    Timeout(Handshake),
    /// A register holds a value that does not decode.
    InvalidHardwareState,
    /// The operation needs the write protection disabled.
    WriteProtected,
    /// The operation needs initialization mode.
    NotInitMode,
}

/// Prescaler factors producing the 1 Hz calendar clock.
///
/// The calendar runs at RTCCLK / ((async_factor + 1) * (sync_factor + 1)).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrescalerConfig {
    /// PREDIV_A, 0-127
    pub async_factor: u8,
    /// PREDIV_S, 0-32767
    pub sync_factor: u16,
}

impl Default for PrescalerConfig {
    fn default() -> Self {
        Self::for_lse()
    }
}

impl PrescalerConfig {
    pub const fn new(async_factor: u8, sync_factor: u16) -> Self {
        Self {
            async_factor,
            sync_factor,
        }
    }

    /// 32.768 kHz LSE, the reset value.
    pub const fn for_lse() -> Self {
        Self::new(127, 255)
    }

    /// 32 kHz LSI.
    pub const fn for_lsi() -> Self {
        Self::new(99, 319)
    }

    /// 1 MHz HSE-derived clock.
    pub const fn for_hse_1mhz() -> Self {
        Self::new(99, 9999)
    }

    /// Total division ratio.
    pub fn divider(&self) -> u32 {
        (u32::from(self.async_factor) + 1) * (u32::from(self.sync_factor) + 1)
    }

    pub fn validate(&self) -> Result<(), RtcError> {
        if self.async_factor > 127 {
            return Err(RtcError::InvalidArgument("PREDIV_A must be 0-127"));
        }
        if self.sync_factor > 0x7FFF {
            return Err(RtcError::InvalidArgument("PREDIV_S must be 0-32767"));
        }
        Ok(())
    }

    pub(crate) fn pack(&self) -> Result<Prescaler, RtcError> {
        self.validate()?;
        let mut prer = Prescaler::default();
        prer.set_prediv_a(self.async_factor);
        prer.set_prediv_s(self.sync_factor);
        Ok(prer)
    }

    pub(crate) fn unpack(prer: Prescaler) -> Self {
        Self::new(prer.prediv_a(), prer.prediv_s())
    }
}

/// Settings applied by [`Rtc::init`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub hour_format: HourFormat,
    pub prescaler: PrescalerConfig,
    /// Read the calendar counters directly instead of the shadow registers
    pub bypass_shadow: bool,
    /// Bound on every handshake wait
    pub timeout_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hour_format: HourFormat::TwentyFourHour,
            prescaler: PrescalerConfig::for_lse(),
            bypass_shadow: false,
            timeout_us: DEFAULT_TIMEOUT_US,
        }
    }
}

/// Interrupt enable bits of RTC_CR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    /// TSIE
    Timestamp,
    /// WUTIE
    Wakeup,
    /// ALRAIE
    AlarmA,
    /// ALRBIE
    AlarmB,
}

/// Active edge of the timestamp input.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimestampEdge {
    #[default]
    Rising,
    Falling,
}

pub(crate) fn set_interrupt_bit(cr: &mut Control, irq: Interrupt, enabled: bool) {
    match irq {
        Interrupt::Timestamp => cr.set_tsie(enabled),
        Interrupt::Wakeup => cr.set_wutie(enabled),
        Interrupt::AlarmA => cr.set_alraie(enabled),
        Interrupt::AlarmB => cr.set_alrbie(enabled),
    }
}

/// Sub-second fraction in nanoseconds, following the down-counting SSR.
pub(crate) fn subsecond_nanos(ss: u16, prescaler: &PrescalerConfig) -> u32 {
    let sync = u64::from(prescaler.sync_factor);
    let ss = u64::from(ss);
    if ss > sync {
        // SSR runs past PREDIV_S after a shift; the fraction is negative
        return 0;
    }
    ((sync - ss) * 1_000_000_000 / (sync + 1)) as u32
}

pub(crate) fn to_naive_date_time(
    date: &CalendarDate,
    time: &WallTime,
    nanos: u32,
) -> Result<NaiveDateTime, RtcError> {
    let time = time.to_naive()?;
    let time = time.with_nanosecond(nanos).unwrap_or(time);
    Ok(date.to_naive()?.and_time(time))
}

// Generates plain register readers for registers without read side effects.
macro_rules! read_register {
    ($(($name:ident, $regaddr:expr, $typ:ty, $doc:literal)),+ $(,)?) => {
        $(
            #[doc = $doc]
            pub fn $name(&mut self) -> $typ {
                self.block.read($regaddr)
            }
        )+
    };
}
#[allow(unused_imports)]
pub(crate) use read_register;

/// Blocking RTC driver.
///
/// Handshake waits poll every [`POLL_INTERVAL_US`] using `D`.
pub struct Rtc<B: RegisterBus, D: DelayNs> {
    block: Block<B>,
    delay: D,
    timeout_us: u32,
}

impl<B: RegisterBus, D: DelayNs> Rtc<B, D> {
    /// Creates a driver. No register is accessed.
    ///
    /// The write protection is assumed engaged, which holds after a backup
    /// domain reset.
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            block: Block::new(bus),
            delay,
            timeout_us: DEFAULT_TIMEOUT_US,
        }
    }

    /// Releases the bus and the delay.
    pub fn free(self) -> (B, D) {
        (self.block.free(), self.delay)
    }

    pub fn state(&self) -> PeripheralState {
        self.block.state()
    }

    pub fn timeout_us(&self) -> u32 {
        self.timeout_us
    }

    pub fn set_timeout_us(&mut self, timeout_us: u32) {
        self.timeout_us = timeout_us;
    }

    read_register!(
        (icsr, RegAddr::Icsr, Icsr, "Reads RTC_ICSR."),
        (control, RegAddr::Cr, Control, "Reads RTC_CR."),
        (status, RegAddr::Sr, Status, "Reads the event flags (RTC_SR)."),
        (
            masked_status,
            RegAddr::Misr,
            Status,
            "Reads the flags with an enabled interrupt (RTC_MISR)."
        ),
    );

    #[cfg(test)]
    pub(crate) fn bus(&mut self) -> &mut B {
        self.block.bus()
    }

    fn poll(&mut self, handshake: Handshake, timeout_us: u32) -> Result<(), RtcError> {
        let mut waited_us: u32 = 0;
        loop {
            if handshake.is_ready(self.block.icsr()) {
                trace!("rtc: {:?} ready after {} us", handshake, waited_us);
                return Ok(());
            }
            if waited_us >= timeout_us {
                warn!("rtc: {:?} timed out after {} us", handshake, waited_us);
                return Err(RtcError::Timeout(handshake));
            }
            self.delay.delay_us(POLL_INTERVAL_US);
            waited_us = waited_us.saturating_add(POLL_INTERVAL_US);
        }
    }

    /// Runs `f` with the write protection disabled, restoring it afterwards
    /// if it was engaged.
    fn protected<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, RtcError>,
    ) -> Result<T, RtcError> {
        let relock = self.block.begin_protected();
        let result = f(self);
        self.block.end_protected(relock);
        result
    }

    /// Disables the write protection of the configuration registers.
    ///
    /// The two keys are written back to back; nothing else touches the
    /// peripheral in between.
    pub fn unlock(&mut self) {
        self.block.unlock();
    }

    /// Engages the write protection.
    pub fn lock(&mut self) {
        self.block.lock();
    }

    /// Requests initialization mode and waits for INITF.
    ///
    /// Requires the unlocked state. On timeout nothing is written after the
    /// request; INIT stays set until [`exit_init_mode`](Self::exit_init_mode).
    /// Calendar and prescaler writes issued while in init mode leave it
    /// active.
    pub fn enter_init_mode(&mut self, timeout_us: u32) -> Result<(), RtcError> {
        self.block.ensure_unlocked()?;
        if !self.block.icsr().initf() {
            self.block.request_init();
            self.poll(Handshake::InitReady, timeout_us)?;
        }
        self.block.set_mode(Mode::Init);
        debug!("rtc: in initialization mode");
        Ok(())
    }

    /// Clears INIT; the calendar restarts from the written values.
    ///
    /// The shadow registers are stale until RSF is set again.
    pub fn exit_init_mode(&mut self) -> Result<(), RtcError> {
        self.block.ensure_unlocked()?;
        self.block.release_init();
        Ok(())
    }

    /// Clears RSF and waits until the hardware sets it again.
    ///
    /// Clearing RSF is a protected write; the protection state is restored
    /// before waiting.
    pub fn wait_for_register_sync(&mut self, timeout_us: u32) -> Result<(), RtcError> {
        let relock = self.block.begin_protected();
        self.block.clear_rsf();
        self.block.end_protected(relock);
        self.poll(Handshake::RegisterSync, timeout_us)?;
        self.block.set_sync(SyncStatus::Synchronized);
        Ok(())
    }

    /// Forgets that the shadow registers were synchronized.
    ///
    /// Call after waking from a low-power mode that stops the APB clock;
    /// the next calendar read then waits for RSF.
    pub fn invalidate_register_sync(&mut self) {
        self.block.set_sync(SyncStatus::Unknown);
    }

    /// Runs `f` in one unlock, init mode, exit, lock transaction.
    ///
    /// Init mode is left and the protection restored even when entering init
    /// mode times out or `f` fails; the first error is returned. If init mode
    /// was entered through [`enter_init_mode`](Self::enter_init_mode) before,
    /// it is kept and only `f` runs.
    pub fn configure<T, F>(&mut self, f: F) -> Result<T, RtcError>
    where
        F: FnOnce(&mut InitSession<'_, B, D>) -> Result<T, RtcError>,
    {
        let relock = self.block.begin_protected();
        let keep_init = self.block.state().mode == Mode::Init;
        let result = if keep_init {
            f(&mut InitSession::new(self))
        } else {
            match self.enter_init_mode(self.timeout_us) {
                Ok(()) => f(&mut InitSession::new(self)),
                Err(e) => Err(e),
            }
        };
        if !keep_init {
            self.block.release_init();
        }
        self.block.end_protected(relock);
        result
    }

    /// Applies `config` and adopts its timeout.
    pub fn init(&mut self, config: &Config) -> Result<(), RtcError> {
        config.prescaler.validate()?;
        self.timeout_us = config.timeout_us;
        self.configure(|session| {
            session.set_prescaler(&config.prescaler)?;
            session.set_hour_format(config.hour_format)?;
            session.set_bypass_shadow(config.bypass_shadow)
        })?;
        debug!("rtc: initialized, {:?}", config.hour_format);
        Ok(())
    }

    /// Returns `true` once a non-zero year was written (INITS).
    pub fn is_calendar_initialized(&mut self) -> bool {
        self.block.icsr().inits()
    }

    pub fn hour_format(&mut self) -> HourFormat {
        self.block.control().hour_format()
    }

    pub fn prescaler(&mut self) -> PrescalerConfig {
        PrescalerConfig::unpack(self.block.read(RegAddr::Prer))
    }

    pub fn set_prescaler(&mut self, prescaler: &PrescalerConfig) -> Result<(), RtcError> {
        prescaler.validate()?;
        self.configure(|session| session.set_prescaler(prescaler))
    }

    /// Switches between 12 and 24-hour format, keeping the current time.
    pub fn set_hour_format(&mut self, format: HourFormat) -> Result<(), RtcError> {
        self.configure(|session| session.set_hour_format(format).map(|_| ()))
    }

    pub fn set_bypass_shadow(&mut self, bypass: bool) -> Result<(), RtcError> {
        self.configure(|session| session.set_bypass_shadow(bypass))
    }

    pub fn set_time(&mut self, time: &WallTime) -> Result<(), RtcError> {
        time.validate()?;
        self.configure(|session| session.set_time(time))
    }

    pub fn set_date(&mut self, date: &CalendarDate) -> Result<(), RtcError> {
        date.validate()?;
        self.configure(|session| session.set_date(date))
    }

    /// Writes date and time in a single init-mode transaction.
    pub fn set_date_time(&mut self, date: &CalendarDate, time: &WallTime) -> Result<(), RtcError> {
        date.validate()?;
        time.validate()?;
        self.configure(|session| {
            session.set_date(date)?;
            session.set_time(time)
        })
    }

    /// Writes a chrono date and time, in the current hour format.
    ///
    /// Fractions of a second are dropped.
    pub fn set_naive_date_time(&mut self, date_time: &NaiveDateTime) -> Result<(), RtcError> {
        let format = self.hour_format();
        let date = CalendarDate::from_naive(&date_time.date())?;
        let time = WallTime::from_naive(&date_time.time(), format);
        self.set_date_time(&date, &time)
    }

    fn read_calendar(&mut self) -> Result<(SubSecondReg, TimeReg, DateReg), RtcError> {
        if self.block.needs_sync() {
            self.wait_for_register_sync(self.timeout_us)?;
        }
        self.block.read_calendar()
    }

    /// Reads date and time as one coherent snapshot.
    pub fn date_time(&mut self) -> Result<(CalendarDate, WallTime), RtcError> {
        let format = self.hour_format();
        let (_, tr, dr) = self.read_calendar()?;
        Ok((unpack_date(dr.into())?, unpack_time(tr.into(), format)?))
    }

    pub fn time(&mut self) -> Result<WallTime, RtcError> {
        self.date_time().map(|(_, time)| time)
    }

    pub fn date(&mut self) -> Result<CalendarDate, RtcError> {
        self.date_time().map(|(date, _)| date)
    }

    /// Sub-second counter; counts down from PREDIV_S.
    pub fn sub_second(&mut self) -> Result<u16, RtcError> {
        self.read_calendar().map(|(ssr, _, _)| ssr.ss())
    }

    /// Reads the calendar as a chrono date and time in 2000-2099, with the
    /// sub-second counter converted to nanoseconds.
    pub fn naive_date_time(&mut self) -> Result<NaiveDateTime, RtcError> {
        let format = self.hour_format();
        let prescaler = self.prescaler();
        let (ssr, tr, dr) = self.read_calendar()?;
        let date = unpack_date(dr.into())?;
        let time = unpack_time(tr.into(), format)?;
        to_naive_date_time(&date, &time, subsecond_nanos(ssr.ss(), &prescaler))
    }

    /// Programs an alarm and leaves it disabled.
    ///
    /// The alarm is disabled first so that its write flag can assert; use
    /// [`enable_alarm`](Self::enable_alarm) afterwards.
    pub fn set_alarm(&mut self, id: AlarmId, alarm: &AlarmConfig) -> Result<(), RtcError> {
        let (alrm, ssr) = self.block.prepare_alarm(alarm)?;
        self.protected(|rtc| {
            rtc.block.set_alarm_enable(id, false);
            rtc.poll(id.write_handshake(), rtc.timeout_us)?;
            rtc.block.write_alarm(id, alrm, ssr);
            Ok(())
        })
    }

    pub fn alarm(&mut self, id: AlarmId) -> Result<AlarmConfig, RtcError> {
        let format = self.hour_format();
        let mut alarm = unpack_alarm(self.block.read(id.register()), format)?;
        alarm.subseconds = unpack_alarm_subsecond(self.block.read(id.subsecond_register()));
        Ok(alarm)
    }

    /// Enables an alarm, with or without its interrupt.
    pub fn enable_alarm(&mut self, id: AlarmId, interrupt: bool) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.modify_control(|cr| match id {
                AlarmId::A => {
                    cr.set_alraie(interrupt);
                    cr.set_alrae(true);
                }
                AlarmId::B => {
                    cr.set_alrbie(interrupt);
                    cr.set_alrbe(true);
                }
            });
            Ok(())
        })
    }

    /// Disables an alarm and its interrupt.
    pub fn disable_alarm(&mut self, id: AlarmId) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.modify_control(|cr| match id {
                AlarmId::A => {
                    cr.set_alraie(false);
                    cr.set_alrae(false);
                }
                AlarmId::B => {
                    cr.set_alrbie(false);
                    cr.set_alrbe(false);
                }
            });
            Ok(())
        })
    }

    pub fn is_alarm_enabled(&mut self, id: AlarmId) -> bool {
        let cr = self.block.control();
        match id {
            AlarmId::A => cr.alrae(),
            AlarmId::B => cr.alrbe(),
        }
    }

    /// Programs and starts the wakeup timer.
    ///
    /// The timer fires every `reload + 1` cycles of `clock` (plus 2<sup>16</sup>
    /// with [`WakeupClock::SpreExtended`]). WUTWF is waited for unless the
    /// calendar is in initialization mode.
    pub fn set_wakeup_timer(
        &mut self,
        reload: u16,
        clock: WakeupClock,
        interrupt: bool,
    ) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.stop_wakeup_timer();
            if !rtc.block.icsr().initf() {
                rtc.poll(Handshake::WakeupWrite, rtc.timeout_us)?;
            }
            rtc.block.start_wakeup_timer(reload, clock, interrupt);
            Ok(())
        })
    }

    /// Starts the wakeup timer with a period in seconds of ck_spre.
    pub fn set_wakeup_period_secs(&mut self, secs: u32, interrupt: bool) -> Result<(), RtcError> {
        let (clock, reload) = wakeup::reload_for_seconds(secs)?;
        self.set_wakeup_timer(reload, clock, interrupt)
    }

    pub fn disable_wakeup_timer(&mut self) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.stop_wakeup_timer();
            Ok(())
        })
    }

    pub fn is_wakeup_timer_enabled(&mut self) -> bool {
        self.block.control().wute()
    }

    /// Wakeup clock cycles per period of the programmed timer.
    pub fn wakeup_period_cycles(&mut self) -> u32 {
        let wutr: WakeupTimerReg = self.block.read(RegAddr::Wutr);
        wakeup::period_cycles(self.block.control().wucksel(), wutr.wut())
    }

    pub fn set_interrupt(&mut self, irq: Interrupt, enabled: bool) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block
                .modify_control(|cr| set_interrupt_bit(cr, irq, enabled));
            Ok(())
        })
    }

    /// Clears event flags through RTC_SCR.
    ///
    /// `mask` uses the [`stat`] constants; other bits are ignored.
    pub fn clear_status(&mut self, mask: u32) {
        self.block
            .write(RegAddr::Scr, StatusClear::from(mask & stat::ALL));
    }

    /// Enables timestamping on the given edge of the timestamp input.
    pub fn enable_timestamp(&mut self, edge: TimestampEdge, interrupt: bool) -> Result<(), RtcError> {
        self.protected(|rtc| {
            // TSEDGE may only change while TSE is clear
            rtc.block.modify_control(|cr| cr.set_tse(false));
            rtc.block.modify_control(|cr| {
                cr.set_tsedge(edge == TimestampEdge::Falling);
                cr.set_tsie(interrupt);
                cr.set_tse(true);
            });
            Ok(())
        })
    }

    pub fn disable_timestamp(&mut self) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.modify_control(|cr| {
                cr.set_tse(false);
                cr.set_tsie(false);
            });
            Ok(())
        })
    }

    /// The calendar captured by the last timestamp event, if TSF is set.
    ///
    /// TSF is left set; clear it with [`stat::TS`] once the value is used.
    pub fn timestamp(&mut self) -> Result<Option<Timestamp>, RtcError> {
        if !self.status().tsf() {
            return Ok(None);
        }
        let format = self.hour_format();
        let time = unpack_time(self.block.read(RegAddr::Tstr), format)?;
        let date = unpack_timestamp_date(self.block.read(RegAddr::Tsdr))?;
        let ssr: SubSecondReg = self.block.read(RegAddr::Tsssr);
        Ok(Some(Timestamp {
            date,
            time,
            subsecond: ssr.ss(),
        }))
    }

    /// Writes the smooth calibration once no recalibration is pending.
    pub fn calibrate(&mut self, config: &CalibrationConfig) -> Result<(), RtcError> {
        let calr = config.pack()?;
        self.protected(|rtc| {
            rtc.poll(Handshake::Recalibration, rtc.timeout_us)?;
            rtc.block.write(RegAddr::Calr, calr);
            debug!("rtc: calr <- {:#x}", u32::from(calr));
            Ok(())
        })
    }

    pub fn calibration(&mut self) -> CalibrationConfig {
        CalibrationConfig::unpack(self.block.read(RegAddr::Calr))
    }

    /// Shifts the calendar by `add_one_second` seconds minus
    /// `subtract_fraction` / (PREDIV_S + 1) seconds.
    pub fn shift(&mut self, add_one_second: bool, subtract_fraction: u16) -> Result<(), RtcError> {
        if subtract_fraction > 0x7FFF {
            return Err(RtcError::InvalidArgument("SUBFS must be 0-32767"));
        }
        let mut shiftr = Shift::default();
        shiftr.set_add1s(add_one_second);
        shiftr.set_subfs(subtract_fraction);
        self.protected(|rtc| {
            rtc.poll(Handshake::Shift, rtc.timeout_us)?;
            rtc.block.write(RegAddr::Shiftr, shiftr);
            // a shift clears RSF
            rtc.block.set_sync(SyncStatus::Unknown);
            Ok(())
        })
    }

    /// Adds one hour to the calendar (summer time change).
    pub fn add_one_hour(&mut self) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.modify_control(|cr| cr.set_add1h(true));
            Ok(())
        })
    }

    /// Subtracts one hour from the calendar (winter time change).
    pub fn subtract_one_hour(&mut self) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.modify_control(|cr| cr.set_sub1h(true));
            Ok(())
        })
    }

    /// Sets the BKP bit, free for software use (e.g. "summer time applied").
    pub fn set_backup_flag(&mut self, flag: bool) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.modify_control(|cr| cr.set_bkp(flag));
            Ok(())
        })
    }

    pub fn backup_flag(&mut self) -> bool {
        self.block.control().bkp()
    }

    /// Routes a flag to the RTC_ALARM output; `active_low` sets POL.
    pub fn set_output(&mut self, output: OutputSelect, active_low: bool) -> Result<(), RtcError> {
        self.protected(|rtc| {
            rtc.block.modify_control(|cr| {
                cr.set_osel(output);
                cr.set_pol(active_low);
            });
            Ok(())
        })
    }
}

/// Writes allowed while the calendar is in initialization mode.
///
/// Obtained from [`Rtc::configure`]. The field helpers read the frozen time
/// or date once, then work on the last written value.
pub struct InitSession<'a, B: RegisterBus, D: DelayNs> {
    rtc: &'a mut Rtc<B, D>,
    time: Option<WallTime>,
    date: Option<CalendarDate>,
}

impl<'a, B: RegisterBus, D: DelayNs> InitSession<'a, B, D> {
    fn new(rtc: &'a mut Rtc<B, D>) -> Self {
        Self {
            rtc,
            time: None,
            date: None,
        }
    }

    pub fn set_time(&mut self, time: &WallTime) -> Result<(), RtcError> {
        self.rtc.block.write_time(time)?;
        self.time = Some(*time);
        Ok(())
    }

    pub fn set_date(&mut self, date: &CalendarDate) -> Result<(), RtcError> {
        self.rtc.block.write_date(date)?;
        self.date = Some(*date);
        Ok(())
    }

    pub fn set_prescaler(&mut self, prescaler: &PrescalerConfig) -> Result<(), RtcError> {
        self.rtc.block.write_prescaler(prescaler)
    }

    /// Changes FMT and rewrites the time in the new format.
    pub fn set_hour_format(&mut self, format: HourFormat) -> Result<WallTime, RtcError> {
        let time = self.rtc.block.write_hour_format(format)?;
        self.time = Some(time);
        Ok(time)
    }

    pub fn set_bypass_shadow(&mut self, bypass: bool) -> Result<(), RtcError> {
        self.rtc.block.write_bypass_shadow(bypass)
    }

    /// The time as it will be when init mode is left.
    pub fn time(&mut self) -> Result<WallTime, RtcError> {
        match self.time {
            Some(time) => Ok(time),
            None => {
                let format = self.rtc.block.control().hour_format();
                let time = unpack_time(self.rtc.block.read(RegAddr::Tr), format)?;
                self.time = Some(time);
                Ok(time)
            }
        }
    }

    /// The date as it will be when init mode is left.
    pub fn date(&mut self) -> Result<CalendarDate, RtcError> {
        match self.date {
            Some(date) => Ok(date),
            None => {
                let date = unpack_date(self.rtc.block.read(RegAddr::Dr))?;
                self.date = Some(date);
                Ok(date)
            }
        }
    }

    /// Sets the hour; `meridiem` must be given in 12-hour format.
    pub fn set_hour(&mut self, hour: u8, meridiem: Option<Meridiem>) -> Result<(), RtcError> {
        let mut time = self.time()?;
        time.hour = hour;
        time.meridiem = meridiem;
        self.set_time(&time)
    }

    pub fn set_minute(&mut self, minute: u8) -> Result<(), RtcError> {
        let mut time = self.time()?;
        time.minute = minute;
        self.set_time(&time)
    }

    pub fn set_second(&mut self, second: u8) -> Result<(), RtcError> {
        let mut time = self.time()?;
        time.second = second;
        self.set_time(&time)
    }

    pub fn set_year(&mut self, year: u8) -> Result<(), RtcError> {
        let mut date = self.date()?;
        date.year = year;
        self.set_date(&date)
    }

    /// Sets the month; the current day must exist in it.
    pub fn set_month(&mut self, month: u8) -> Result<(), RtcError> {
        let mut date = self.date()?;
        date.month = month;
        self.set_date(&date)
    }

    pub fn set_day(&mut self, day: u8) -> Result<(), RtcError> {
        let mut date = self.date()?;
        date.day = day;
        self.set_date(&date)
    }

    pub fn set_weekday(&mut self, weekday: Weekday) -> Result<(), RtcError> {
        let mut date = self.date()?;
        date.weekday = weekday;
        self.set_date(&date)
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;
    use crate::bus::fake::FakeRtc;
    use crate::state::LockState;
    use alloc::vec;
    use chrono::NaiveDate;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    #[derive(Default)]
    struct CountingDelay {
        ns: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.ns += u64::from(ns);
        }
    }

    fn rtc() -> Rtc<FakeRtc, NoopDelay> {
        Rtc::new(FakeRtc::new(), NoopDelay::new())
    }

    #[test]
    fn test_unlock_and_lock() {
        let mut rtc = rtc();
        assert_eq!(rtc.state().lock, LockState::Locked);
        rtc.unlock();
        assert!(rtc.state().is_unlocked());
        assert!(rtc.bus().is_unlocked());
        rtc.lock();
        assert!(!rtc.state().is_unlocked());
        assert!(!rtc.bus().is_unlocked());
        assert_eq!(rtc.bus().writes_to(RegAddr::Wpr), vec![0xCA, 0x53, 0x00]);
    }

    #[test]
    fn test_enter_init_mode_requires_unlock() {
        let mut rtc = rtc();
        assert_eq!(rtc.enter_init_mode(100), Err(RtcError::WriteProtected));
        assert!(rtc.bus().writes().is_empty());
        assert_eq!(rtc.exit_init_mode(), Err(RtcError::WriteProtected));
    }

    #[test]
    fn test_enter_init_mode_timeout() {
        let mut fake = FakeRtc::new();
        fake.initf_stuck = true;
        let mut rtc = Rtc::new(fake, CountingDelay::default());
        rtc.unlock();
        rtc.bus().clear_writes();

        assert_eq!(
            rtc.enter_init_mode(50),
            Err(RtcError::Timeout(Handshake::InitReady))
        );
        assert_eq!(rtc.state().mode, Mode::Normal);

        let (fake, delay) = rtc.free();
        assert!(delay.ns >= 50_000);
        // only the INIT request itself
        assert_eq!(fake.write_order(), vec![RegAddr::Icsr]);
        assert_ne!(fake.writes()[0].1 & (1 << 7), 0);
    }

    #[test]
    fn test_enter_and_exit_init_mode() {
        let mut rtc = rtc();
        rtc.unlock();
        rtc.enter_init_mode(100).unwrap();
        assert_eq!(rtc.state().mode, Mode::Init);
        assert!(rtc.bus().in_init());
        rtc.exit_init_mode().unwrap();
        assert_eq!(rtc.state().mode, Mode::Normal);
        assert_eq!(rtc.state().sync, SyncStatus::Unknown);
        assert!(!rtc.bus().in_init());
    }

    #[test]
    fn test_set_date_time_sequence() {
        let mut rtc = rtc();
        rtc.set_date_time(
            &CalendarDate::new(24, 4, 3, Weekday::Wednesday),
            &WallTime::new(13, 45, 30),
        )
        .unwrap();

        let fake = rtc.bus();
        assert_eq!(
            fake.write_order(),
            vec![
                RegAddr::Wpr,
                RegAddr::Wpr,
                RegAddr::Icsr,
                RegAddr::Dr,
                RegAddr::Tr,
                RegAddr::Icsr,
                RegAddr::Wpr,
            ]
        );
        assert_eq!(fake.peek(RegAddr::Dr), 0x0024_6403);
        assert_eq!(fake.peek(RegAddr::Tr), 0x0013_4530);
        assert!(!fake.in_init());
        assert!(!fake.is_unlocked());
        assert_eq!(rtc.state().lock, LockState::Locked);
        assert!(rtc.is_calendar_initialized());
    }

    #[test]
    fn test_transaction_keeps_caller_unlock() {
        let mut rtc = rtc();
        rtc.unlock();
        rtc.set_time(&WallTime::new(1, 2, 3)).unwrap();
        assert!(rtc.state().is_unlocked());
        assert_eq!(rtc.bus().writes_to(RegAddr::Wpr), vec![0xCA, 0x53]);
    }

    #[test]
    fn test_transaction_keeps_caller_init_mode() {
        let mut rtc = rtc();
        rtc.unlock();
        rtc.enter_init_mode(100).unwrap();
        rtc.bus().clear_writes();

        rtc.set_time(&WallTime::new(8, 0, 0)).unwrap();
        rtc.set_date(&CalendarDate::new(24, 1, 2, Weekday::Tuesday)).unwrap();
        assert_eq!(rtc.bus().write_order(), vec![RegAddr::Tr, RegAddr::Dr]);
        assert_eq!(rtc.state().mode, Mode::Init);
        assert!(rtc.bus().in_init());

        rtc.exit_init_mode().unwrap();
        assert!(!rtc.bus().in_init());
        assert_eq!(rtc.bus().peek(RegAddr::Tr), 0x0008_0000);
        assert!(rtc.state().is_unlocked());
    }

    #[test]
    fn test_transaction_failure_exits_and_locks() {
        let mut rtc = rtc();
        assert_eq!(
            rtc.set_time(&WallTime::new_12h(1, 0, 0, Meridiem::Am)),
            Err(RtcError::InvalidArgument("time hour format does not match FMT"))
        );
        let fake = rtc.bus();
        assert_eq!(
            fake.write_order(),
            vec![
                RegAddr::Wpr,
                RegAddr::Wpr,
                RegAddr::Icsr,
                RegAddr::Icsr,
                RegAddr::Wpr,
            ]
        );
        assert_eq!(fake.peek(RegAddr::Tr), 0);
        assert!(!fake.in_init());
        assert!(!fake.is_unlocked());
    }

    #[test]
    fn test_transaction_init_timeout_releases() {
        let mut fake = FakeRtc::new();
        fake.initf_stuck = true;
        let mut rtc = Rtc::new(fake, NoopDelay::new());
        rtc.set_timeout_us(10);
        assert_eq!(
            rtc.set_date(&CalendarDate::new(24, 1, 1, Weekday::Monday)),
            Err(RtcError::Timeout(Handshake::InitReady))
        );
        assert_eq!(rtc.bus().peek(RegAddr::Dr), 0);
        assert!(!rtc.bus().in_init());
        assert!(!rtc.bus().is_unlocked());
        assert_eq!(rtc.state().mode, Mode::Normal);
    }

    #[test]
    fn test_invalid_arguments_touch_nothing() {
        let mut rtc = rtc();
        assert!(rtc.set_time(&WallTime::new(25, 0, 0)).is_err());
        assert!(rtc
            .set_date(&CalendarDate::new(24, 13, 1, Weekday::Monday))
            .is_err());
        assert!(rtc.set_prescaler(&PrescalerConfig::new(128, 0)).is_err());
        assert!(rtc.bus().writes().is_empty());
    }

    #[test]
    fn test_date_time_waits_for_sync_once() {
        let mut rtc = rtc();
        rtc.bus().poke(RegAddr::Tr, 0x0013_4530);
        rtc.bus().poke(RegAddr::Dr, 0x0024_6403);

        let (date, time) = rtc.date_time().unwrap();
        assert_eq!(date, CalendarDate::new(24, 4, 3, Weekday::Wednesday));
        assert_eq!(time, WallTime::new(13, 45, 30));
        assert_eq!(rtc.state().sync, SyncStatus::Synchronized);

        // RSF was cleared by writing zero to it
        let icsr_writes = rtc.bus().writes_to(RegAddr::Icsr);
        assert_eq!(icsr_writes.len(), 1);
        assert_eq!(icsr_writes[0] & (1 << 5), 0);
        assert!(!rtc.bus().is_unlocked());

        rtc.bus().clear_writes();
        rtc.time().unwrap();
        assert!(rtc.bus().writes().is_empty());

        rtc.invalidate_register_sync();
        rtc.date().unwrap();
        assert_eq!(rtc.bus().writes_to(RegAddr::Icsr).len(), 1);
    }

    #[test]
    fn test_register_sync_timeout() {
        let mut fake = FakeRtc::new();
        fake.rsf_latency = None;
        let mut rtc = Rtc::new(fake, CountingDelay::default());
        assert_eq!(
            rtc.wait_for_register_sync(20),
            Err(RtcError::Timeout(Handshake::RegisterSync))
        );
        assert_eq!(
            rtc.date_time(),
            Err(RtcError::Timeout(Handshake::RegisterSync))
        );
        assert!(!rtc.bus().is_unlocked());
        let (_, delay) = rtc.free();
        assert!(delay.ns >= 20_000);
    }

    #[test]
    fn test_bypass_shadow_reads_without_sync() {
        let mut fake = FakeRtc::new();
        fake.rsf_latency = None;
        fake.poke(RegAddr::Cr, 1 << 5);
        fake.poke(RegAddr::Tr, 0x0000_0059);
        fake.poke(RegAddr::Dr, 0x0000_2101);
        let mut rtc = Rtc::new(fake, NoopDelay::new());
        assert_eq!(rtc.time(), Ok(WallTime::new(0, 0, 59)));
        assert!(rtc.bus().writes().is_empty());
    }

    #[test]
    fn test_corrupt_calendar_is_reported() {
        let mut rtc = rtc();
        rtc.bus().poke(RegAddr::Tr, 0x0000_00AA);
        rtc.bus().poke(RegAddr::Dr, 0x0000_2101);
        assert_eq!(rtc.time(), Err(RtcError::InvalidHardwareState));
    }

    #[test]
    fn test_init_applies_config() {
        let mut rtc = rtc();
        let config = Config {
            hour_format: HourFormat::TwelveHour,
            prescaler: PrescalerConfig::for_lsi(),
            bypass_shadow: true,
            timeout_us: 500,
        };
        rtc.init(&config).unwrap();
        assert_eq!(rtc.prescaler(), PrescalerConfig::for_lsi());
        assert_eq!(rtc.hour_format(), HourFormat::TwelveHour);
        assert!(rtc.control().bypshad());
        assert_eq!(rtc.timeout_us(), 500);
        // midnight in 12-hour notation
        assert_eq!(rtc.bus().peek(RegAddr::Tr), 0x0012_0000);
        assert!(!rtc.bus().in_init());
        assert!(!rtc.bus().is_unlocked());
    }

    #[test]
    fn test_set_hour_format_keeps_time() {
        let mut rtc = rtc();
        rtc.bus().poke(RegAddr::Tr, 0x0013_4530);
        rtc.set_hour_format(HourFormat::TwelveHour).unwrap();
        assert_eq!(rtc.bus().peek(RegAddr::Tr), 0x0041_4530);
        rtc.set_hour_format(HourFormat::TwentyFourHour).unwrap();
        assert_eq!(rtc.bus().peek(RegAddr::Tr), 0x0013_4530);
    }

    #[test]
    fn test_session_field_helpers() {
        let mut rtc = rtc();
        rtc.bus().poke(RegAddr::Dr, 0x0024_6403);
        rtc.bus().poke(RegAddr::Tr, 0x0013_4530);
        rtc.configure(|s| {
            s.set_year(25)?;
            s.set_day(9)?;
            s.set_weekday(Weekday::Wednesday)?;
            s.set_hour(8, None)?;
            s.set_second(0)
        })
        .unwrap();
        assert_eq!(rtc.bus().peek(RegAddr::Dr), 0x0025_6409);
        assert_eq!(rtc.bus().peek(RegAddr::Tr), 0x0008_4500);

        // April 31st does not exist
        assert!(rtc.configure(|s| s.set_day(31)).is_err());
        assert!(!rtc.bus().in_init());
    }

    #[test]
    fn test_naive_date_time_roundtrip() {
        let mut rtc = rtc();
        let dt = NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        rtc.set_naive_date_time(&dt).unwrap();
        // SSR at PREDIV_S, start of the second
        rtc.bus().ssr_sequence(&[255]);
        assert_eq!(rtc.naive_date_time(), Ok(dt));

        rtc.bus().ssr_sequence(&[127]);
        let half = rtc.naive_date_time().unwrap();
        assert_eq!(half.nanosecond(), 500_000_000);
    }

    #[test]
    fn test_alarm_programming() {
        let mut rtc = rtc();
        let alarm = AlarmConfig::daily(&WallTime::new(7, 30, 0)).with_subseconds(3, 2);
        rtc.set_alarm(AlarmId::A, &alarm).unwrap();
        assert_eq!(rtc.alarm(AlarmId::A), Ok(alarm));
        assert!(!rtc.is_alarm_enabled(AlarmId::A));

        rtc.enable_alarm(AlarmId::A, true).unwrap();
        assert!(rtc.is_alarm_enabled(AlarmId::A));
        assert!(rtc.control().alraie());

        // reprogramming disables the alarm first
        rtc.set_alarm(AlarmId::A, &AlarmConfig::EVERY_SECOND).unwrap();
        assert!(!rtc.is_alarm_enabled(AlarmId::A));
        assert_eq!(rtc.bus().peek(RegAddr::Alrmar), 0x8080_8080);
        assert!(!rtc.bus().is_unlocked());

        rtc.enable_alarm(AlarmId::B, false).unwrap();
        rtc.disable_alarm(AlarmId::B).unwrap();
        assert!(!rtc.is_alarm_enabled(AlarmId::B));
    }

    #[test]
    fn test_alarm_format_mismatch() {
        let mut rtc = rtc();
        let alarm = AlarmConfig::daily(&WallTime::new_12h(7, 0, 0, Meridiem::Pm));
        assert!(matches!(
            rtc.set_alarm(AlarmId::B, &alarm),
            Err(RtcError::InvalidArgument(_))
        ));
        assert!(rtc.bus().writes().is_empty());
    }

    #[test]
    fn test_twelve_hour_alarm_reads_back() {
        let mut rtc = rtc();
        rtc.set_hour_format(HourFormat::TwelveHour).unwrap();
        rtc.set_alarm(AlarmId::A, &AlarmConfig::EVERY_SECOND).unwrap();
        assert_eq!(rtc.alarm(AlarmId::A), Ok(AlarmConfig::EVERY_SECOND));

        let alarm = AlarmConfig::at_seconds(15).with_subseconds(0, 0);
        rtc.set_alarm(AlarmId::B, &alarm).unwrap();
        assert_eq!(rtc.alarm(AlarmId::B), Ok(alarm));

        let alarm = AlarmConfig::on_date(&WallTime::new_12h(11, 0, 0, Meridiem::Pm), 5);
        rtc.set_alarm(AlarmId::A, &alarm).unwrap();
        assert_eq!(rtc.alarm(AlarmId::A), Ok(alarm));
    }

    #[test]
    fn test_alarm_write_flag_timeout() {
        let mut fake = FakeRtc::new();
        fake.alarm_wf_stuck = true;
        let mut rtc = Rtc::new(fake, NoopDelay::new());
        rtc.set_timeout_us(5);
        assert_eq!(
            rtc.set_alarm(AlarmId::B, &AlarmConfig::at_seconds(5)),
            Err(RtcError::Timeout(Handshake::AlarmBWrite))
        );
        assert!(rtc.bus().writes_to(RegAddr::Alrmbr).is_empty());
        assert!(!rtc.bus().is_unlocked());
    }

    #[test]
    fn test_wakeup_timer_sequence() {
        let mut rtc = rtc();
        rtc.set_wakeup_period_secs(60, true).unwrap();
        let fake = rtc.bus();
        assert_eq!(
            fake.write_order(),
            vec![
                RegAddr::Wpr,
                RegAddr::Wpr,
                RegAddr::Cr,
                RegAddr::Cr,
                RegAddr::Wutr,
                RegAddr::Cr,
                RegAddr::Wpr,
            ]
        );
        assert_eq!(fake.peek(RegAddr::Wutr), 59);
        assert!(rtc.is_wakeup_timer_enabled());
        assert_eq!(rtc.control().wucksel(), WakeupClock::Spre);
        assert!(rtc.control().wutie());
        assert_eq!(rtc.wakeup_period_cycles(), 60);

        rtc.disable_wakeup_timer().unwrap();
        assert!(!rtc.is_wakeup_timer_enabled());
    }

    #[test]
    fn test_wakeup_write_flag_timeout() {
        let mut fake = FakeRtc::new();
        fake.wutwf_stuck = true;
        let mut rtc = Rtc::new(fake, CountingDelay::default());
        rtc.set_timeout_us(30);
        assert_eq!(
            rtc.set_wakeup_timer(100, WakeupClock::RtcDiv16, false),
            Err(RtcError::Timeout(Handshake::WakeupWrite))
        );
        assert!(rtc.bus().writes_to(RegAddr::Wutr).is_empty());
        assert!(!rtc.is_wakeup_timer_enabled());
        assert!(!rtc.bus().is_unlocked());
        let (_, delay) = rtc.free();
        assert!(delay.ns >= 30_000);
    }

    #[test]
    fn test_clear_status_uses_scr() {
        let mut rtc = rtc();
        rtc.bus().raise(stat::ALRA | stat::WUT);
        rtc.clear_status(stat::ALRA | (1 << 10));
        assert_eq!(rtc.bus().writes_to(RegAddr::Scr), vec![stat::ALRA]);
        assert!(rtc.bus().writes_to(RegAddr::Sr).is_empty());
        assert!(rtc.bus().writes_to(RegAddr::Wpr).is_empty());
        let sr = rtc.status();
        assert!(!sr.alraf());
        assert!(sr.wutf());
    }

    #[test]
    fn test_masked_status_follows_interrupts() {
        let mut rtc = rtc();
        rtc.bus().raise(stat::ALRA | stat::ALRB);
        assert_eq!(u32::from(rtc.masked_status()), 0);
        rtc.set_interrupt(Interrupt::AlarmA, true).unwrap();
        let misr = rtc.masked_status();
        assert!(misr.alraf());
        assert!(!misr.alrbf());
        rtc.set_interrupt(Interrupt::AlarmA, false).unwrap();
        assert!(!rtc.control().alraie());
    }

    #[test]
    fn test_timestamp() {
        let mut rtc = rtc();
        rtc.enable_timestamp(TimestampEdge::Falling, true).unwrap();
        let cr = rtc.control();
        assert!(cr.tse() && cr.tsedge() && cr.tsie());
        assert_eq!(rtc.timestamp(), Ok(None));

        rtc.bus().poke(RegAddr::Tstr, 0x0010_2030);
        rtc.bus().poke(RegAddr::Tsdr, 0x0000_B231);
        rtc.bus().poke(RegAddr::Tsssr, 42);
        rtc.bus().raise(stat::TS);
        let ts = rtc.timestamp().unwrap().unwrap();
        assert_eq!(ts.time, WallTime::new(10, 20, 30));
        assert_eq!(ts.date.month, 12);
        assert_eq!(ts.date.day, 31);
        assert_eq!(ts.date.weekday, Weekday::Friday);
        assert_eq!(ts.subsecond, 42);

        rtc.disable_timestamp().unwrap();
        assert!(!rtc.control().tse());
    }

    #[test]
    fn test_calibration() {
        let mut rtc = rtc();
        let config = CalibrationConfig::from_ppm_steps(-20);
        rtc.calibrate(&config).unwrap();
        assert_eq!(rtc.bus().peek(RegAddr::Calr), 20);
        assert_eq!(rtc.calibration(), config);

        rtc.bus().recalpf_stuck = true;
        rtc.set_timeout_us(3);
        assert_eq!(
            rtc.calibrate(&CalibrationConfig::NONE),
            Err(RtcError::Timeout(Handshake::Recalibration))
        );
        assert_eq!(rtc.bus().writes_to(RegAddr::Calr).len(), 1);
    }

    #[test]
    fn test_shift() {
        let mut rtc = rtc();
        rtc.bus().poke(RegAddr::Dr, 0x0024_6403);
        rtc.date().unwrap();
        assert_eq!(rtc.state().sync, SyncStatus::Synchronized);

        rtc.shift(true, 100).unwrap();
        assert_eq!(rtc.bus().peek(RegAddr::Shiftr), (1 << 31) | 100);
        assert_eq!(rtc.state().sync, SyncStatus::Unknown);
        assert!(rtc.shift(false, 0x8000).is_err());

        rtc.bus().shpf_stuck = true;
        rtc.set_timeout_us(1);
        assert_eq!(
            rtc.shift(false, 1),
            Err(RtcError::Timeout(Handshake::Shift))
        );
    }

    #[test]
    fn test_daylight_saving_and_backup_flag() {
        let mut rtc = rtc();
        rtc.add_one_hour().unwrap();
        rtc.subtract_one_hour().unwrap();
        let cr_writes = rtc.bus().writes_to(RegAddr::Cr);
        assert_eq!(cr_writes, vec![1 << 16, 1 << 17]);

        rtc.set_backup_flag(true).unwrap();
        assert!(rtc.backup_flag());
        rtc.set_backup_flag(false).unwrap();
        assert!(!rtc.backup_flag());
    }

    #[test]
    fn test_output_selection() {
        let mut rtc = rtc();
        rtc.set_output(OutputSelect::Wakeup, true).unwrap();
        let cr = rtc.control();
        assert_eq!(cr.osel(), OutputSelect::Wakeup);
        assert!(cr.pol());
    }

    #[test]
    fn test_prescaler_presets() {
        assert_eq!(PrescalerConfig::for_lse().divider(), 32_768);
        assert_eq!(PrescalerConfig::for_lsi().divider(), 32_000);
        assert_eq!(PrescalerConfig::for_hse_1mhz().divider(), 1_000_000);
        assert!(PrescalerConfig::new(127, 0x7FFF).validate().is_ok());
        assert!(PrescalerConfig::new(127, 0x8000).validate().is_err());
        assert_eq!(PrescalerConfig::default(), PrescalerConfig::for_lse());
    }

    #[test]
    fn test_subsecond_nanos() {
        let p = PrescalerConfig::for_lse();
        assert_eq!(subsecond_nanos(255, &p), 0);
        assert_eq!(subsecond_nanos(127, &p), 500_000_000);
        assert_eq!(subsecond_nanos(300, &p), 0);
    }
}
