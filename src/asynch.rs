//! Async implementation of the RTC driver.
//!
//! Register accesses are plain memory accesses, so only the handshake waits
//! are asynchronous: they yield through `embedded_hal_async::delay::DelayNs`
//! between two reads of the polled flag. It is only available when the
//! `async` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use stm32_rtc3::asynch::Rtc;
//!
//! let mut rtc = Rtc::new(bus, delay);
//! rtc.init(&config).await?;
//! let (date, time) = rtc.date_time().await?;
//! ```

use chrono::NaiveDateTime;
use embedded_hal_async::delay::DelayNs;

use crate::alarm::{unpack_alarm, unpack_alarm_subsecond, AlarmConfig, AlarmId};
use crate::bus::RegisterBus;
use crate::calibration::CalibrationConfig;
use crate::datetime::{unpack_date, unpack_time, CalendarDate, WallTime};
use crate::registers::{
    stat, Control, DateReg, Icsr, RegAddr, Shift, Status, StatusClear, SubSecondReg, TimeReg,
    WakeupClock,
};
use crate::state::{Block, Handshake, Mode, PeripheralState, SyncStatus};
use crate::{
    set_interrupt_bit, subsecond_nanos, to_naive_date_time, wakeup, Config, HourFormat, Interrupt,
    PrescalerConfig, RtcError, DEFAULT_TIMEOUT_US, POLL_INTERVAL_US,
};

#[derive(Copy, Clone)]
struct InitTransaction {
    relock: bool,
    keep_init: bool,
}

/// Async RTC driver.
///
/// Same state model and sequences as [`crate::Rtc`]; init-mode writes are
/// offered as whole transactions only.
pub struct Rtc<B: RegisterBus, D: DelayNs> {
    block: Block<B>,
    delay: D,
    timeout_us: u32,
}

impl<B: RegisterBus, D: DelayNs> Rtc<B, D> {
    /// Creates a driver. No register is accessed.
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            block: Block::new(bus),
            delay,
            timeout_us: DEFAULT_TIMEOUT_US,
        }
    }

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

    crate::read_register!(
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

    async fn poll(&mut self, handshake: Handshake, timeout_us: u32) -> Result<(), RtcError> {
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
            self.delay.delay_us(POLL_INTERVAL_US).await;
            waited_us = waited_us.saturating_add(POLL_INTERVAL_US);
        }
    }

    pub fn unlock(&mut self) {
        self.block.unlock();
    }

    pub fn lock(&mut self) {
        self.block.lock();
    }

    /// Requests initialization mode and waits for INITF.
    pub async fn enter_init_mode(&mut self, timeout_us: u32) -> Result<(), RtcError> {
        self.block.ensure_unlocked()?;
        if !self.block.icsr().initf() {
            self.block.request_init();
            self.poll(Handshake::InitReady, timeout_us).await?;
        }
        self.block.set_mode(Mode::Init);
        debug!("rtc: in initialization mode");
        Ok(())
    }

    pub fn exit_init_mode(&mut self) -> Result<(), RtcError> {
        self.block.ensure_unlocked()?;
        self.block.release_init();
        Ok(())
    }

    /// Clears RSF and waits until the hardware sets it again.
    pub async fn wait_for_register_sync(&mut self, timeout_us: u32) -> Result<(), RtcError> {
        let relock = self.block.begin_protected();
        self.block.clear_rsf();
        self.block.end_protected(relock);
        self.poll(Handshake::RegisterSync, timeout_us).await?;
        self.block.set_sync(SyncStatus::Synchronized);
        Ok(())
    }

    pub fn invalidate_register_sync(&mut self) {
        self.block.set_sync(SyncStatus::Unknown);
    }

    // Unlock and enter init mode unless already in it; the caller must pass
    // the returned transaction to `close_init` whatever the outcome.
    async fn open_init(&mut self) -> (InitTransaction, Result<(), RtcError>) {
        let txn = InitTransaction {
            relock: self.block.begin_protected(),
            keep_init: self.block.state().mode == Mode::Init,
        };
        let entered = if txn.keep_init {
            Ok(())
        } else {
            self.enter_init_mode(self.timeout_us).await
        };
        (txn, entered)
    }

    fn close_init(&mut self, txn: InitTransaction) {
        if !txn.keep_init {
            self.block.release_init();
        }
        self.block.end_protected(txn.relock);
    }

    /// Applies `config` and adopts its timeout.
    pub async fn init(&mut self, config: &Config) -> Result<(), RtcError> {
        config.prescaler.validate()?;
        self.timeout_us = config.timeout_us;
        let (txn, entered) = self.open_init().await;
        let result = entered.and_then(|()| {
            self.block.write_prescaler(&config.prescaler)?;
            self.block.write_hour_format(config.hour_format)?;
            self.block.write_bypass_shadow(config.bypass_shadow)
        });
        self.close_init(txn);
        result
    }

    pub fn hour_format(&mut self) -> HourFormat {
        self.block.control().hour_format()
    }

    pub fn prescaler(&mut self) -> PrescalerConfig {
        PrescalerConfig::unpack(self.block.read(RegAddr::Prer))
    }

    pub async fn set_prescaler(&mut self, prescaler: &PrescalerConfig) -> Result<(), RtcError> {
        prescaler.validate()?;
        let (txn, entered) = self.open_init().await;
        let result = entered.and_then(|()| self.block.write_prescaler(prescaler));
        self.close_init(txn);
        result
    }

    /// Switches between 12 and 24-hour format, keeping the current time.
    pub async fn set_hour_format(&mut self, format: HourFormat) -> Result<(), RtcError> {
        let (txn, entered) = self.open_init().await;
        let result = entered.and_then(|()| self.block.write_hour_format(format).map(|_| ()));
        self.close_init(txn);
        result
    }

    pub async fn set_time(&mut self, time: &WallTime) -> Result<(), RtcError> {
        time.validate()?;
        let (txn, entered) = self.open_init().await;
        let result = entered.and_then(|()| self.block.write_time(time));
        self.close_init(txn);
        result
    }

    pub async fn set_date(&mut self, date: &CalendarDate) -> Result<(), RtcError> {
        date.validate()?;
        let (txn, entered) = self.open_init().await;
        let result = entered.and_then(|()| self.block.write_date(date));
        self.close_init(txn);
        result
    }

    pub async fn set_date_time(
        &mut self,
        date: &CalendarDate,
        time: &WallTime,
    ) -> Result<(), RtcError> {
        date.validate()?;
        time.validate()?;
        let (txn, entered) = self.open_init().await;
        let result = entered.and_then(|()| {
            self.block.write_date(date)?;
            self.block.write_time(time)
        });
        self.close_init(txn);
        result
    }

    pub async fn set_naive_date_time(&mut self, date_time: &NaiveDateTime) -> Result<(), RtcError> {
        let format = self.hour_format();
        let date = CalendarDate::from_naive(&date_time.date())?;
        let time = WallTime::from_naive(&date_time.time(), format);
        self.set_date_time(&date, &time).await
    }

    async fn read_calendar(&mut self) -> Result<(SubSecondReg, TimeReg, DateReg), RtcError> {
        if self.block.needs_sync() {
            self.wait_for_register_sync(self.timeout_us).await?;
        }
        self.block.read_calendar()
    }

    pub async fn date_time(&mut self) -> Result<(CalendarDate, WallTime), RtcError> {
        let format = self.hour_format();
        let (_, tr, dr) = self.read_calendar().await?;
        Ok((unpack_date(dr.into())?, unpack_time(tr.into(), format)?))
    }

    pub async fn time(&mut self) -> Result<WallTime, RtcError> {
        self.date_time().await.map(|(_, time)| time)
    }

    pub async fn date(&mut self) -> Result<CalendarDate, RtcError> {
        self.date_time().await.map(|(date, _)| date)
    }

    pub async fn naive_date_time(&mut self) -> Result<NaiveDateTime, RtcError> {
        let format = self.hour_format();
        let prescaler = self.prescaler();
        let (ssr, tr, dr) = self.read_calendar().await?;
        let date = unpack_date(dr.into())?;
        let time = unpack_time(tr.into(), format)?;
        to_naive_date_time(&date, &time, subsecond_nanos(ssr.ss(), &prescaler))
    }

    /// Programs an alarm and leaves it disabled.
    pub async fn set_alarm(&mut self, id: AlarmId, alarm: &AlarmConfig) -> Result<(), RtcError> {
        let (alrm, ssr) = self.block.prepare_alarm(alarm)?;
        let relock = self.block.begin_protected();
        self.block.set_alarm_enable(id, false);
        let result = self.poll(id.write_handshake(), self.timeout_us).await;
        if result.is_ok() {
            self.block.write_alarm(id, alrm, ssr);
        }
        self.block.end_protected(relock);
        result
    }

    pub fn alarm(&mut self, id: AlarmId) -> Result<AlarmConfig, RtcError> {
        let format = self.hour_format();
        let mut alarm = unpack_alarm(self.block.read(id.register()), format)?;
        alarm.subseconds = unpack_alarm_subsecond(self.block.read(id.subsecond_register()));
        Ok(alarm)
    }

    pub fn enable_alarm(&mut self, id: AlarmId, interrupt: bool) -> Result<(), RtcError> {
        let irq = match id {
            AlarmId::A => Interrupt::AlarmA,
            AlarmId::B => Interrupt::AlarmB,
        };
        let relock = self.block.begin_protected();
        self.block
            .modify_control(|cr| set_interrupt_bit(cr, irq, interrupt));
        self.block.set_alarm_enable(id, true);
        self.block.end_protected(relock);
        Ok(())
    }

    pub fn disable_alarm(&mut self, id: AlarmId) -> Result<(), RtcError> {
        let irq = match id {
            AlarmId::A => Interrupt::AlarmA,
            AlarmId::B => Interrupt::AlarmB,
        };
        let relock = self.block.begin_protected();
        self.block.set_alarm_enable(id, false);
        self.block.modify_control(|cr| set_interrupt_bit(cr, irq, false));
        self.block.end_protected(relock);
        Ok(())
    }

    /// Programs and starts the wakeup timer.
    pub async fn set_wakeup_timer(
        &mut self,
        reload: u16,
        clock: WakeupClock,
        interrupt: bool,
    ) -> Result<(), RtcError> {
        let relock = self.block.begin_protected();
        self.block.stop_wakeup_timer();
        let result = if self.block.icsr().initf() {
            Ok(())
        } else {
            self.poll(Handshake::WakeupWrite, self.timeout_us).await
        };
        if result.is_ok() {
            self.block.start_wakeup_timer(reload, clock, interrupt);
        }
        self.block.end_protected(relock);
        result
    }

    pub async fn set_wakeup_period_secs(
        &mut self,
        secs: u32,
        interrupt: bool,
    ) -> Result<(), RtcError> {
        let (clock, reload) = wakeup::reload_for_seconds(secs)?;
        self.set_wakeup_timer(reload, clock, interrupt).await
    }

    pub fn disable_wakeup_timer(&mut self) -> Result<(), RtcError> {
        let relock = self.block.begin_protected();
        self.block.stop_wakeup_timer();
        self.block.end_protected(relock);
        Ok(())
    }

    pub fn set_interrupt(&mut self, irq: Interrupt, enabled: bool) -> Result<(), RtcError> {
        let relock = self.block.begin_protected();
        self.block
            .modify_control(|cr| set_interrupt_bit(cr, irq, enabled));
        self.block.end_protected(relock);
        Ok(())
    }

    /// Clears event flags through RTC_SCR.
    pub fn clear_status(&mut self, mask: u32) {
        self.block
            .write(RegAddr::Scr, StatusClear::from(mask & stat::ALL));
    }

    pub async fn calibrate(&mut self, config: &CalibrationConfig) -> Result<(), RtcError> {
        let calr = config.pack()?;
        let relock = self.block.begin_protected();
        let result = self.poll(Handshake::Recalibration, self.timeout_us).await;
        if result.is_ok() {
            self.block.write(RegAddr::Calr, calr);
        }
        self.block.end_protected(relock);
        result
    }

    pub fn calibration(&mut self) -> CalibrationConfig {
        CalibrationConfig::unpack(self.block.read(RegAddr::Calr))
    }

    /// Shifts the calendar by `add_one_second` seconds minus
    /// `subtract_fraction` / (PREDIV_S + 1) seconds.
    pub async fn shift(&mut self, add_one_second: bool, subtract_fraction: u16) -> Result<(), RtcError> {
        if subtract_fraction > 0x7FFF {
            return Err(RtcError::InvalidArgument("SUBFS must be 0-32767"));
        }
        let mut shiftr = Shift::default();
        shiftr.set_add1s(add_one_second);
        shiftr.set_subfs(subtract_fraction);
        let relock = self.block.begin_protected();
        let result = self.poll(Handshake::Shift, self.timeout_us).await;
        if result.is_ok() {
            self.block.write(RegAddr::Shiftr, shiftr);
            self.block.set_sync(SyncStatus::Unknown);
        }
        self.block.end_protected(relock);
        result
    }

    #[cfg(test)]
    pub(crate) fn bus(&mut self) -> &mut B {
        self.block.bus()
    }
}
