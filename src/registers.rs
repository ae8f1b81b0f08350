//! Register definitions and bitfield structures for the version 3 RTC.
//!
//! This module contains the register offsets, the write-protection keys, status
//! flag masks and one bitfield type per register layout. Offsets are relative
//! to the RTC base address of the device memory map.
//!
//! Reserved bits are never named here. Every writer in this crate starts from a
//! value read from the register (or from zero for registers whose reserved bits
//! reset to zero), so reserved bits keep their reset value.

use bitfield::bitfield;

/// Register offsets from the RTC base address.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Time register (RTC_TR)
    Tr = 0x00,
    /// Date register (RTC_DR)
    Dr = 0x04,
    /// Sub-second register (RTC_SSR)
    Ssr = 0x08,
    /// Initialization control and status register (RTC_ICSR)
    Icsr = 0x0C,
    /// Prescaler register (RTC_PRER)
    Prer = 0x10,
    /// Wakeup timer register (RTC_WUTR)
    Wutr = 0x14,
    /// Control register (RTC_CR)
    Cr = 0x18,
    /// Write protection register (RTC_WPR)
    Wpr = 0x24,
    /// Calibration register (RTC_CALR)
    Calr = 0x28,
    /// Shift control register (RTC_SHIFTR)
    Shiftr = 0x2C,
    /// Timestamp time register (RTC_TSTR)
    Tstr = 0x30,
    /// Timestamp date register (RTC_TSDR)
    Tsdr = 0x34,
    /// Timestamp sub-second register (RTC_TSSSR)
    Tsssr = 0x38,
    /// Alarm A register (RTC_ALRMAR)
    Alrmar = 0x40,
    /// Alarm A sub-second register (RTC_ALRMASSR)
    Alrmassr = 0x44,
    /// Alarm B register (RTC_ALRMBR)
    Alrmbr = 0x48,
    /// Alarm B sub-second register (RTC_ALRMBSSR)
    Alrmbssr = 0x4C,
    /// Status register (RTC_SR)
    Sr = 0x50,
    /// Masked interrupt status register (RTC_MISR)
    Misr = 0x54,
    /// Status clear register (RTC_SCR)
    Scr = 0x5C,
}

impl RegAddr {
    /// Byte offset of the register from the peripheral base.
    #[inline]
    pub const fn offset(self) -> usize {
        self as usize
    }

    /// Returns `true` if writes to this register are ignored while the
    /// write protection is engaged.
    pub const fn is_write_protected(self) -> bool {
        !matches!(self, RegAddr::Wpr | RegAddr::Scr)
    }

    /// Returns `true` if the register only accepts writes in initialization
    /// mode.
    pub const fn requires_init_mode(self) -> bool {
        matches!(self, RegAddr::Tr | RegAddr::Dr | RegAddr::Prer)
    }
}

/// Write-protection keys for RTC_WPR.
pub mod key {
    /// First unlock key.
    pub const UNLOCK_1: u8 = 0xCA;
    /// Second unlock key.
    pub const UNLOCK_2: u8 = 0x53;
    /// Canonical lock value; any non-key write locks.
    pub const LOCK: u8 = 0x00;
}

/// Status (interrupt) flag masks.
///
/// The same bit positions are used by RTC_SR, RTC_MISR and RTC_SCR.
/// Used for [`Rtc::clear_status`](crate::Rtc::clear_status).
pub mod stat {
    /// Internal timestamp flag
    pub const ITS: u32 = 1 << 5;
    /// Timestamp overflow flag
    pub const TSOV: u32 = 1 << 4;
    /// Timestamp flag
    pub const TS: u32 = 1 << 3;
    /// Wakeup timer flag
    pub const WUT: u32 = 1 << 2;
    /// Alarm B flag
    pub const ALRB: u32 = 1 << 1;
    /// Alarm A flag
    pub const ALRA: u32 = 1 << 0;

    /// All status flags.
    pub const ALL: u32 = ITS | TSOV | TS | WUT | ALRB | ALRA;

    /// Alarm A & B flags.
    pub const ALR_ALL: u32 = ALRA | ALRB;
}

/// Hour format selected by the FMT bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HourFormat {
    /// 24-hour format (0-23)
    #[default]
    TwentyFourHour = 0,
    /// 12-hour format (1-12 + AM/PM)
    TwelveHour = 1,
}

impl From<bool> for HourFormat {
    fn from(fmt: bool) -> Self {
        if fmt {
            HourFormat::TwelveHour
        } else {
            HourFormat::TwentyFourHour
        }
    }
}

impl From<HourFormat> for bool {
    fn from(v: HourFormat) -> Self {
        v == HourFormat::TwelveHour
    }
}

/// Wakeup timer clock selection (WUCKSEL).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeupClock {
    /// RTCCLK / 16
    RtcDiv16 = 0b000,
    /// RTCCLK / 8
    RtcDiv8 = 0b001,
    /// RTCCLK / 4
    RtcDiv4 = 0b010,
    /// RTCCLK / 2
    RtcDiv2 = 0b011,
    /// ck_spre (usually 1 Hz)
    Spre = 0b100,
    /// ck_spre with 2<sup>16</sup> added to the reload value
    SpreExtended = 0b110,
}

impl From<u8> for WakeupClock {
    /// Creates a `WakeupClock` from the 3-bit WUCKSEL field.
    ///
    /// The hardware treats `0b101` like `0b100` and `0b111` like `0b110`.
    fn from(v: u8) -> Self {
        match v & 0b111 {
            0b000 => WakeupClock::RtcDiv16,
            0b001 => WakeupClock::RtcDiv8,
            0b010 => WakeupClock::RtcDiv4,
            0b011 => WakeupClock::RtcDiv2,
            0b100 | 0b101 => WakeupClock::Spre,
            _ => WakeupClock::SpreExtended,
        }
    }
}

impl From<WakeupClock> for u8 {
    fn from(v: WakeupClock) -> Self {
        v as u8
    }
}

/// Flag routed to the RTC_ALARM output (OSEL).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputSelect {
    /// Output disabled
    Disabled = 0b00,
    /// Alarm A output enabled
    AlarmA = 0b01,
    /// Alarm B output enabled
    AlarmB = 0b10,
    /// Wakeup output enabled
    Wakeup = 0b11,
}

impl From<u8> for OutputSelect {
    fn from(v: u8) -> Self {
        match v & 0b11 {
            0b00 => OutputSelect::Disabled,
            0b01 => OutputSelect::AlarmA,
            0b10 => OutputSelect::AlarmB,
            _ => OutputSelect::Wakeup,
        }
    }
}

impl From<OutputSelect> for u8 {
    fn from(v: OutputSelect) -> Self {
        v as u8
    }
}

// This macro generates the From<u32> and Into<u32> implementations for the
// register type
macro_rules! from_register_u32 {
    ($typ:ty) => {
        impl From<u32> for $typ {
            fn from(v: u32) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u32 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Time layout shared by RTC_TR and RTC_TSTR.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct TimeReg(u32);
    impl Debug;
    /// PM notation (12-hour format only)
    pub pm, set_pm: 22;
    /// Hour tens (0-2)
    pub u8, hour_tens, set_hour_tens: 21, 20;
    /// Hour units (0-9)
    pub u8, hour_units, set_hour_units: 19, 16;
    /// Minute tens (0-5)
    pub u8, minute_tens, set_minute_tens: 14, 12;
    /// Minute units (0-9)
    pub u8, minute_units, set_minute_units: 11, 8;
    /// Second tens (0-5)
    pub u8, second_tens, set_second_tens: 6, 4;
    /// Second units (0-9)
    pub u8, second_units, set_second_units: 3, 0;
}
from_register_u32!(TimeReg);

#[cfg(feature = "defmt")]
impl defmt::Format for TimeReg {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "TimeReg({}{}:{}{}:{}{}",
            self.hour_tens(),
            self.hour_units(),
            self.minute_tens(),
            self.minute_units(),
            self.second_tens(),
            self.second_units()
        );
        if self.pm() {
            defmt::write!(f, " PM");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Date layout shared by RTC_DR and RTC_TSDR (the year reads as zero in
    /// RTC_TSDR).
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct DateReg(u32);
    impl Debug;
    /// Year tens (0-9)
    pub u8, year_tens, set_year_tens: 23, 20;
    /// Year units (0-9)
    pub u8, year_units, set_year_units: 19, 16;
    /// Weekday code (1-7, 0 forbidden)
    pub u8, weekday, set_weekday: 15, 13;
    /// Month tens (0-1)
    pub month_tens, set_month_tens: 12;
    /// Month units (0-9)
    pub u8, month_units, set_month_units: 11, 8;
    /// Date tens (0-3)
    pub u8, day_tens, set_day_tens: 5, 4;
    /// Date units (0-9)
    pub u8, day_units, set_day_units: 3, 0;
}
from_register_u32!(DateReg);

#[cfg(feature = "defmt")]
impl defmt::Format for DateReg {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "DateReg({}{}-{}{}-{}{} wd {})",
            self.year_tens(),
            self.year_units(),
            u8::from(self.month_tens()),
            self.month_units(),
            self.day_tens(),
            self.day_units(),
            self.weekday()
        );
    }
}

bitfield! {
    /// Sub-second layout shared by RTC_SSR and RTC_TSSSR.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct SubSecondReg(u32);
    impl Debug;
    /// Synchronous prescaler counter value
    pub u16, ss, _: 15, 0;
}
from_register_u32!(SubSecondReg);

bitfield! {
    /// Initialization control and status register (RTC_ICSR).
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Icsr(u32);
    impl Debug;
    /// Recalibration pending flag
    pub recalpf, _: 16;
    /// Initialization mode request
    pub init, set_init: 7;
    /// Initialization flag (calendar may be written)
    pub initf, _: 6;
    /// Registers synchronization flag (read, clear by writing zero)
    pub rsf, set_rsf: 5;
    /// Calendar initialized (year differs from zero)
    pub inits, _: 4;
    /// Shift operation pending
    pub shpf, _: 3;
    /// Wakeup timer write flag
    pub wutwf, _: 2;
    /// Alarm B write flag
    pub alrbwf, _: 1;
    /// Alarm A write flag
    pub alrawf, _: 0;
}
from_register_u32!(Icsr);

bitfield! {
    /// Prescaler register (RTC_PRER).
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Prescaler(u32);
    impl Debug;
    /// Asynchronous prescaler factor (0-127)
    pub u8, prediv_a, set_prediv_a: 22, 16;
    /// Synchronous prescaler factor (0-32767)
    pub u16, prediv_s, set_prediv_s: 14, 0;
}
from_register_u32!(Prescaler);

bitfield! {
    /// Wakeup timer register (RTC_WUTR).
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct WakeupTimerReg(u32);
    impl Debug;
    /// Wakeup auto-reload value
    pub u16, wut, set_wut: 15, 0;
}
from_register_u32!(WakeupTimerReg);

bitfield! {
    /// Control register (RTC_CR).
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Control(u32);
    impl Debug;
    /// RTC_OUT2 output enable
    pub out2en, set_out2en: 31;
    /// TAMPALRM output type
    pub tampalrm_type, set_tampalrm_type: 30;
    /// TAMPALRM pull-up enable
    pub tampalrm_pu, set_tampalrm_pu: 29;
    /// Tamper detection output enable on TAMPALRM
    pub tampoe, set_tampoe: 26;
    /// Timestamp on tamper detection event
    pub tampts, set_tampts: 25;
    /// Timestamp on internal event enable
    pub itse, set_itse: 24;
    /// Calibration output enable
    pub coe, set_coe: 23;
    /// Output selection
    pub u8, from into OutputSelect, osel, set_osel: 22, 21;
    /// Output polarity
    pub pol, set_pol: 20;
    /// Calibration output selection
    pub cosel, set_cosel: 19;
    /// Backup (user flag, e.g. daylight saving already applied)
    pub bkp, set_bkp: 18;
    /// Subtract 1 hour (winter time change)
    pub sub1h, set_sub1h: 17;
    /// Add 1 hour (summer time change)
    pub add1h, set_add1h: 16;
    /// Timestamp interrupt enable
    pub tsie, set_tsie: 15;
    /// Wakeup timer interrupt enable
    pub wutie, set_wutie: 14;
    /// Alarm B interrupt enable
    pub alrbie, set_alrbie: 13;
    /// Alarm A interrupt enable
    pub alraie, set_alraie: 12;
    /// Timestamp enable
    pub tse, set_tse: 11;
    /// Wakeup timer enable
    pub wute, set_wute: 10;
    /// Alarm B enable
    pub alrbe, set_alrbe: 9;
    /// Alarm A enable
    pub alrae, set_alrae: 8;
    /// Hour format (init mode only)
    pub fmt, set_fmt: 6;
    /// Bypass the shadow registers (init mode only)
    pub bypshad, set_bypshad: 5;
    /// Reference clock detection enable (init mode only)
    pub refckon, set_refckon: 4;
    /// Timestamp event active edge (1 = falling)
    pub tsedge, set_tsedge: 3;
    /// Wakeup clock selection
    pub u8, from into WakeupClock, wucksel, set_wucksel: 2, 0;
}
from_register_u32!(Control);

impl Control {
    /// Hour format selected by the FMT bit.
    pub fn hour_format(&self) -> HourFormat {
        HourFormat::from(self.fmt())
    }
}

bitfield! {
    /// Write protection register (RTC_WPR).
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct WriteProtect(u32);
    impl Debug;
    /// Write protection key
    pub u8, key, set_key: 7, 0;
}
from_register_u32!(WriteProtect);

bitfield! {
    /// Calibration register (RTC_CALR).
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Calibration(u32);
    impl Debug;
    /// Increase frequency by 488.5 ppm
    pub calp, set_calp: 15;
    /// Use an 8-second calibration cycle period
    pub calw8, set_calw8: 14;
    /// Use a 16-second calibration cycle period
    pub calw16, set_calw16: 13;
    /// Calibration minus (pulses masked per cycle)
    pub u16, calm, set_calm: 8, 0;
}
from_register_u32!(Calibration);

bitfield! {
    /// Shift control register (RTC_SHIFTR).
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Shift(u32);
    impl Debug;
    /// Add one second
    pub add1s, set_add1s: 31;
    /// Subtract a fraction of a second
    pub u16, subfs, set_subfs: 14, 0;
}
from_register_u32!(Shift);

bitfield! {
    /// Alarm layout shared by RTC_ALRMAR and RTC_ALRMBR.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct AlarmReg(u32);
    impl Debug;
    /// Date/weekday mask ("don't care")
    pub msk4, set_msk4: 31;
    /// Week day selection (1 = units hold a weekday)
    pub wdsel, set_wdsel: 30;
    /// Date tens (0-3)
    pub u8, day_tens, set_day_tens: 29, 28;
    /// Date or weekday units
    pub u8, day_units, set_day_units: 27, 24;
    /// Hours mask
    pub msk3, set_msk3: 23;
    /// PM notation
    pub pm, set_pm: 22;
    /// Hour tens (0-2)
    pub u8, hour_tens, set_hour_tens: 21, 20;
    /// Hour units (0-9)
    pub u8, hour_units, set_hour_units: 19, 16;
    /// Minutes mask
    pub msk2, set_msk2: 15;
    /// Minute tens (0-5)
    pub u8, minute_tens, set_minute_tens: 14, 12;
    /// Minute units (0-9)
    pub u8, minute_units, set_minute_units: 11, 8;
    /// Seconds mask
    pub msk1, set_msk1: 7;
    /// Second tens (0-5)
    pub u8, second_tens, set_second_tens: 6, 4;
    /// Second units (0-9)
    pub u8, second_units, set_second_units: 3, 0;
}
from_register_u32!(AlarmReg);

#[cfg(feature = "defmt")]
impl defmt::Format for AlarmReg {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "AlarmReg(msk {}{}{}{}, raw {:#x})",
            u8::from(self.msk4()),
            u8::from(self.msk3()),
            u8::from(self.msk2()),
            u8::from(self.msk1()),
            self.0
        );
    }
}

bitfield! {
    /// Alarm sub-second layout shared by RTC_ALRMASSR and RTC_ALRMBSSR.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct AlarmSubSecondReg(u32);
    impl Debug;
    /// Number of compared sub-second bits (0 = not compared)
    pub u8, maskss, set_maskss: 27, 24;
    /// Sub-second value
    pub u16, ss, set_ss: 14, 0;
}
from_register_u32!(AlarmSubSecondReg);

bitfield! {
    /// Status layout shared by RTC_SR and RTC_MISR.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Status(u32);
    impl Debug;
    /// Internal timestamp flag
    pub itsf, _: 5;
    /// Timestamp overflow flag
    pub tsovf, _: 4;
    /// Timestamp flag
    pub tsf, _: 3;
    /// Wakeup timer flag
    pub wutf, _: 2;
    /// Alarm B flag
    pub alrbf, _: 1;
    /// Alarm A flag
    pub alraf, _: 0;
}
from_register_u32!(Status);

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Status({:#x})", self.0 & stat::ALL);
    }
}

bitfield! {
    /// Status clear register (RTC_SCR), write 1 to clear.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct StatusClear(u32);
    impl Debug;
    /// Clear internal timestamp flag
    pub citsf, set_citsf: 5;
    /// Clear timestamp overflow flag
    pub ctsovf, set_ctsovf: 4;
    /// Clear timestamp flag
    pub ctsf, set_ctsf: 3;
    /// Clear wakeup timer flag
    pub cwutf, set_cwutf: 2;
    /// Clear alarm B flag
    pub calrbf, set_calrbf: 1;
    /// Clear alarm A flag
    pub calraf, set_calraf: 0;
}
from_register_u32!(StatusClear);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_offsets() {
        assert_eq!(RegAddr::Tr.offset(), 0x00);
        assert_eq!(RegAddr::Dr.offset(), 0x04);
        assert_eq!(RegAddr::Ssr.offset(), 0x08);
        assert_eq!(RegAddr::Icsr.offset(), 0x0C);
        assert_eq!(RegAddr::Prer.offset(), 0x10);
        assert_eq!(RegAddr::Wutr.offset(), 0x14);
        assert_eq!(RegAddr::Cr.offset(), 0x18);
        assert_eq!(RegAddr::Wpr.offset(), 0x24);
        assert_eq!(RegAddr::Calr.offset(), 0x28);
        assert_eq!(RegAddr::Shiftr.offset(), 0x2C);
        assert_eq!(RegAddr::Tstr.offset(), 0x30);
        assert_eq!(RegAddr::Tsdr.offset(), 0x34);
        assert_eq!(RegAddr::Tsssr.offset(), 0x38);
        assert_eq!(RegAddr::Alrmar.offset(), 0x40);
        assert_eq!(RegAddr::Alrmassr.offset(), 0x44);
        assert_eq!(RegAddr::Alrmbr.offset(), 0x48);
        assert_eq!(RegAddr::Alrmbssr.offset(), 0x4C);
        assert_eq!(RegAddr::Sr.offset(), 0x50);
        assert_eq!(RegAddr::Misr.offset(), 0x54);
        assert_eq!(RegAddr::Scr.offset(), 0x5C);
    }

    #[test]
    fn test_protection_classes() {
        assert!(!RegAddr::Wpr.is_write_protected());
        assert!(!RegAddr::Scr.is_write_protected());
        assert!(RegAddr::Cr.is_write_protected());
        assert!(RegAddr::Tr.requires_init_mode());
        assert!(RegAddr::Prer.requires_init_mode());
        assert!(!RegAddr::Alrmar.requires_init_mode());
    }

    #[test]
    fn test_time_register_fields() {
        // 13:45:30, 24-hour
        let tr = TimeReg::from(0x0013_4530);
        assert!(!tr.pm());
        assert_eq!(tr.hour_tens(), 1);
        assert_eq!(tr.hour_units(), 3);
        assert_eq!(tr.minute_tens(), 4);
        assert_eq!(tr.minute_units(), 5);
        assert_eq!(tr.second_tens(), 3);
        assert_eq!(tr.second_units(), 0);
        assert_eq!(u32::from(tr), 0x0013_4530);

        let mut tr = TimeReg::default();
        tr.set_pm(true);
        assert_eq!(tr.0, 1 << 22);
    }

    #[test]
    fn test_date_register_fields() {
        // 24-04-03, Wednesday
        let mut dr = DateReg::default();
        dr.set_year_tens(2);
        dr.set_year_units(4);
        dr.set_weekday(3);
        dr.set_month_tens(false);
        dr.set_month_units(4);
        dr.set_day_tens(0);
        dr.set_day_units(3);
        assert_eq!(dr.0, 0x0024_6403);

        let dr = DateReg::from(0x0099_F231);
        assert_eq!(dr.year_tens(), 9);
        assert_eq!(dr.year_units(), 9);
        assert_eq!(dr.weekday(), 7);
        assert!(dr.month_tens());
        assert_eq!(dr.month_units(), 2);
        assert_eq!(dr.day_tens(), 3);
        assert_eq!(dr.day_units(), 1);
    }

    #[test]
    fn test_icsr_flags() {
        let icsr = Icsr::from((1 << 16) | (1 << 7) | (1 << 6) | (1 << 5) | (1 << 2));
        assert!(icsr.recalpf());
        assert!(icsr.init());
        assert!(icsr.initf());
        assert!(icsr.rsf());
        assert!(!icsr.inits());
        assert!(!icsr.shpf());
        assert!(icsr.wutwf());
        assert!(!icsr.alrbwf());
        assert!(!icsr.alrawf());
    }

    #[test]
    fn test_prescaler_fields() {
        let mut prer = Prescaler::default();
        prer.set_prediv_a(127);
        prer.set_prediv_s(255);
        assert_eq!(prer.0, 0x007F_00FF);
        assert_eq!(Prescaler::from(0x007F_7FFF).prediv_s(), 0x7FFF);
    }

    #[test]
    fn test_control_fields() {
        let mut cr = Control::default();
        cr.set_fmt(true);
        cr.set_wucksel(WakeupClock::Spre);
        cr.set_osel(OutputSelect::Wakeup);
        cr.set_alraie(true);
        assert_eq!(cr.0, (1 << 6) | 0b100 | (0b11 << 21) | (1 << 12));
        assert_eq!(cr.hour_format(), HourFormat::TwelveHour);
        assert_eq!(cr.wucksel(), WakeupClock::Spre);
        assert_eq!(cr.osel(), OutputSelect::Wakeup);

        let cr = Control::from((1 << 15) | (1 << 14) | (1 << 13) | (1 << 11) | (1 << 10));
        assert!(cr.tsie());
        assert!(cr.wutie());
        assert!(cr.alrbie());
        assert!(!cr.alraie());
        assert!(cr.tse());
        assert!(cr.wute());
    }

    #[test]
    fn test_wakeup_clock_conversions() {
        assert_eq!(WakeupClock::from(0b000), WakeupClock::RtcDiv16);
        assert_eq!(WakeupClock::from(0b011), WakeupClock::RtcDiv2);
        assert_eq!(WakeupClock::from(0b101), WakeupClock::Spre);
        assert_eq!(WakeupClock::from(0b111), WakeupClock::SpreExtended);
        assert_eq!(u8::from(WakeupClock::SpreExtended), 0b110);
    }

    #[test]
    fn test_alarm_register_fields() {
        let mut alrm = AlarmReg::default();
        alrm.set_msk4(true);
        alrm.set_msk3(true);
        alrm.set_msk2(true);
        alrm.set_msk1(true);
        assert_eq!(alrm.0, 0x8080_8080);

        let alrm = AlarmReg::from(0x4512_3456);
        assert!(!alrm.msk4());
        assert!(alrm.wdsel());
        assert_eq!(alrm.day_tens(), 0);
        assert_eq!(alrm.day_units(), 5);
        assert_eq!(alrm.hour_tens(), 1);
        assert_eq!(alrm.hour_units(), 2);
        assert_eq!(alrm.minute_tens(), 3);
        assert_eq!(alrm.minute_units(), 4);
        assert_eq!(alrm.second_tens(), 5);
        assert_eq!(alrm.second_units(), 6);
    }

    #[test]
    fn test_alarm_subsecond_fields() {
        let mut ssr = AlarmSubSecondReg::default();
        ssr.set_maskss(15);
        ssr.set_ss(0x7FFF);
        assert_eq!(ssr.0, 0x0F00_7FFF);
    }

    #[test]
    fn test_status_and_clear_share_layout() {
        let sr = Status::from(stat::ALL);
        assert!(sr.itsf());
        assert!(sr.tsovf());
        assert!(sr.tsf());
        assert!(sr.wutf());
        assert!(sr.alrbf());
        assert!(sr.alraf());

        let mut scr = StatusClear::default();
        scr.set_calraf(true);
        scr.set_cwutf(true);
        assert_eq!(scr.0, stat::ALRA | stat::WUT);
    }

    #[test]
    fn test_calibration_and_shift_fields() {
        let mut calr = Calibration::default();
        calr.set_calp(true);
        calr.set_calw16(true);
        calr.set_calm(0x1FF);
        assert_eq!(calr.0, (1 << 15) | (1 << 13) | 0x1FF);

        let mut shift = Shift::default();
        shift.set_add1s(true);
        shift.set_subfs(100);
        assert_eq!(shift.0, (1 << 31) | 100);
    }

    #[test]
    fn test_write_protect_keys() {
        let mut wpr = WriteProtect::default();
        wpr.set_key(key::UNLOCK_1);
        assert_eq!(wpr.0, 0xCA);
        wpr.set_key(key::UNLOCK_2);
        assert_eq!(wpr.0, 0x53);
        assert_eq!(key::LOCK, 0x00);
    }
}
