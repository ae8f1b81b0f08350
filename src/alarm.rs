//! Alarm configuration for alarm A and alarm B.
//!
//! Both alarms share one register layout: a comparison register (RTC_ALRMxR)
//! with an independent "don't care" mask bit per field, and a sub-second
//! register (RTC_ALRMxSSR) selecting how many low sub-second bits take part
//! in the comparison.
//!
//! An [`AlarmConfig`] field set to `None` is masked. Masked fields are written
//! with zero digits.
//!
//! # Examples
//!
//! - [`AlarmConfig::EVERY_SECOND`] masks every field
//! - [`AlarmConfig::at_seconds`] fires once a minute
//! - [`AlarmConfig::daily`] fires every day at a time
//! - [`AlarmConfig::on_date`] and [`AlarmConfig::on_weekday`] add the day

use crate::datetime::{from_bcd, make_bcd, Meridiem, WallTime, Weekday};
use crate::registers::{stat, AlarmReg, AlarmSubSecondReg, HourFormat, RegAddr};
use crate::state::Handshake;
use crate::RtcError;

/// One of the two alarm units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmId {
    A,
    B,
}

impl AlarmId {
    pub(crate) const fn register(self) -> RegAddr {
        match self {
            AlarmId::A => RegAddr::Alrmar,
            AlarmId::B => RegAddr::Alrmbr,
        }
    }

    pub(crate) const fn subsecond_register(self) -> RegAddr {
        match self {
            AlarmId::A => RegAddr::Alrmassr,
            AlarmId::B => RegAddr::Alrmbssr,
        }
    }

    pub(crate) const fn write_handshake(self) -> Handshake {
        match self {
            AlarmId::A => Handshake::AlarmAWrite,
            AlarmId::B => Handshake::AlarmBWrite,
        }
    }

    /// Status flag mask (SR/MISR/SCR) of this alarm.
    pub const fn flag(self) -> u32 {
        match self {
            AlarmId::A => stat::ALRA,
            AlarmId::B => stat::ALRB,
        }
    }
}

/// Day compared by an alarm.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmDay {
    /// Day of the month, 1-31
    Date(u8),
    Weekday(Weekday),
}

impl From<Weekday> for AlarmDay {
    fn from(wd: Weekday) -> Self {
        AlarmDay::Weekday(wd)
    }
}

/// Sub-second comparison of an alarm.
///
/// Only the `compared_bits` least significant bits of the sub-second counter
/// are compared with `value`; 0 disables the comparison.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubSecondMatch {
    /// Compared value, 0-32767
    pub value: u16,
    /// Number of compared bits, 0-15
    pub compared_bits: u8,
}

/// Alarm comparison settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmConfig {
    pub day: Option<AlarmDay>,
    pub hour: Option<u8>,
    /// AM/PM of `hour`; `Some` only when the calendar runs in 12-hour format
    pub meridiem: Option<Meridiem>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub subseconds: SubSecondMatch,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self::EVERY_SECOND
    }
}

impl AlarmConfig {
    /// Every field masked.
    pub const EVERY_SECOND: Self = Self {
        day: None,
        hour: None,
        meridiem: None,
        minute: None,
        second: None,
        subseconds: SubSecondMatch {
            value: 0,
            compared_bits: 0,
        },
    };

    /// Fires each minute when the seconds match.
    pub const fn at_seconds(second: u8) -> Self {
        Self {
            second: Some(second),
            ..Self::EVERY_SECOND
        }
    }

    /// Fires every day at `time`.
    pub const fn daily(time: &WallTime) -> Self {
        Self {
            day: None,
            hour: Some(time.hour),
            meridiem: time.meridiem,
            minute: Some(time.minute),
            second: Some(time.second),
            subseconds: SubSecondMatch {
                value: 0,
                compared_bits: 0,
            },
        }
    }

    /// Fires at `time` on a day of the month.
    pub const fn on_date(time: &WallTime, date: u8) -> Self {
        let mut alarm = Self::daily(time);
        alarm.day = Some(AlarmDay::Date(date));
        alarm
    }

    /// Fires at `time` on a day of the week.
    pub const fn on_weekday(time: &WallTime, weekday: Weekday) -> Self {
        let mut alarm = Self::daily(time);
        alarm.day = Some(AlarmDay::Weekday(weekday));
        alarm
    }

    #[must_use]
    pub const fn with_subseconds(mut self, value: u16, compared_bits: u8) -> Self {
        self.subseconds = SubSecondMatch {
            value,
            compared_bits,
        };
        self
    }

    /// Hour format implied by `meridiem`.
    pub fn hour_format(&self) -> HourFormat {
        match self.meridiem {
            None => HourFormat::TwentyFourHour,
            Some(_) => HourFormat::TwelveHour,
        }
    }

    pub fn validate(&self) -> Result<(), RtcError> {
        if let Some(AlarmDay::Date(date)) = self.day {
            make_bcd(date, 1, 31, "alarm date must be 1-31")?;
        }
        match (self.hour, self.meridiem) {
            (Some(hour), None) => {
                make_bcd(hour, 0, 23, "alarm hour must be 0-23")?;
            }
            (Some(hour), Some(_)) => {
                make_bcd(hour, 1, 12, "12-hour alarm hour must be 1-12")?;
            }
            (None, Some(_)) => {
                return Err(RtcError::InvalidArgument(
                    "alarm meridiem needs a compared hour",
                ));
            }
            (None, None) => {}
        }
        if let Some(minute) = self.minute {
            make_bcd(minute, 0, 59, "alarm minute must be 0-59")?;
        }
        if let Some(second) = self.second {
            make_bcd(second, 0, 59, "alarm second must be 0-59")?;
        }
        if self.subseconds.value > 0x7FFF {
            return Err(RtcError::InvalidArgument("alarm sub-second must be 0-32767"));
        }
        if self.subseconds.compared_bits > 15 {
            return Err(RtcError::InvalidArgument(
                "alarm sub-second mask must be 0-15",
            ));
        }
        Ok(())
    }
}

/// Packs the comparison fields into the RTC_ALRMxR layout.
pub fn pack_alarm(alarm: &AlarmConfig) -> Result<u32, RtcError> {
    alarm.validate()?;
    let mut reg = AlarmReg::default();

    match alarm.day {
        None => reg.set_msk4(true),
        Some(AlarmDay::Date(date)) => {
            let (tens, units) = make_bcd(date, 1, 31, "alarm date must be 1-31")?;
            reg.set_day_tens(tens);
            reg.set_day_units(units);
        }
        Some(AlarmDay::Weekday(weekday)) => {
            reg.set_wdsel(true);
            reg.set_day_units(weekday.number());
        }
    }

    match alarm.hour {
        None => reg.set_msk3(true),
        Some(hour) => {
            let (tens, units) = make_bcd(hour, 0, 23, "alarm hour must be 0-23")?;
            reg.set_pm(alarm.meridiem == Some(Meridiem::Pm));
            reg.set_hour_tens(tens);
            reg.set_hour_units(units);
        }
    }

    match alarm.minute {
        None => reg.set_msk2(true),
        Some(minute) => {
            let (tens, units) = make_bcd(minute, 0, 59, "alarm minute must be 0-59")?;
            reg.set_minute_tens(tens);
            reg.set_minute_units(units);
        }
    }

    match alarm.second {
        None => reg.set_msk1(true),
        Some(second) => {
            let (tens, units) = make_bcd(second, 0, 59, "alarm second must be 0-59")?;
            reg.set_second_tens(tens);
            reg.set_second_units(units);
        }
    }

    Ok(reg.into())
}

/// Decodes an RTC_ALRMxR value. The sub-second match is left at its default.
pub fn unpack_alarm(raw: u32, format: HourFormat) -> Result<AlarmConfig, RtcError> {
    let reg = AlarmReg::from(raw);

    let day = if reg.msk4() {
        None
    } else if reg.wdsel() {
        let weekday = Weekday::from_number(reg.day_units()).ok_or(RtcError::InvalidHardwareState)?;
        Some(AlarmDay::Weekday(weekday))
    } else {
        let date = from_bcd(reg.day_tens(), reg.day_units())?;
        if !(1..=31).contains(&date) {
            return Err(RtcError::InvalidHardwareState);
        }
        Some(AlarmDay::Date(date))
    };

    // PM is only part of the comparison when the hour is
    let meridiem = match format {
        HourFormat::TwelveHour if !reg.msk3() => Some(Meridiem::from(reg.pm())),
        _ => None,
    };

    let hour = if reg.msk3() {
        None
    } else {
        let hour = from_bcd(reg.hour_tens(), reg.hour_units())?;
        let valid = match format {
            HourFormat::TwentyFourHour => hour <= 23,
            HourFormat::TwelveHour => (1..=12).contains(&hour),
        };
        if !valid {
            return Err(RtcError::InvalidHardwareState);
        }
        Some(hour)
    };

    let minute = if reg.msk2() {
        None
    } else {
        Some(from_bcd(reg.minute_tens(), reg.minute_units())?)
    };
    let second = if reg.msk1() {
        None
    } else {
        Some(from_bcd(reg.second_tens(), reg.second_units())?)
    };
    if minute.is_some_and(|m| m > 59) || second.is_some_and(|s| s > 59) {
        return Err(RtcError::InvalidHardwareState);
    }

    Ok(AlarmConfig {
        day,
        hour,
        meridiem,
        minute,
        second,
        subseconds: SubSecondMatch::default(),
    })
}

/// Packs the sub-second match into the RTC_ALRMxSSR layout.
pub fn pack_alarm_subsecond(ss: &SubSecondMatch) -> Result<u32, RtcError> {
    if ss.value > 0x7FFF {
        return Err(RtcError::InvalidArgument("alarm sub-second must be 0-32767"));
    }
    if ss.compared_bits > 15 {
        return Err(RtcError::InvalidArgument(
            "alarm sub-second mask must be 0-15",
        ));
    }
    let mut reg = AlarmSubSecondReg::default();
    reg.set_maskss(ss.compared_bits);
    reg.set_ss(ss.value);
    Ok(reg.into())
}

pub fn unpack_alarm_subsecond(raw: u32) -> SubSecondMatch {
    let reg = AlarmSubSecondReg::from(raw);
    SubSecondMatch {
        value: reg.ss(),
        compared_bits: reg.maskss(),
    }
}
