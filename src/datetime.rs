//! Calendar value types and the RTC_TR / RTC_DR codecs.
//!
//! The RTC keeps time and date as packed BCD digits. This module converts
//! between those layouts and validated value types, and between the value
//! types and chrono's naive date and time.
//!
//! # Register Model
//!
//! - RTC_TR: PM flag, hour, minute and second digits
//! - RTC_DR: two-digit year, weekday, month and day digits
//!
//! The year register only holds 00-99; conversions to chrono assume the
//! 2000-2099 century.
//!
//! # Error Handling
//!
//! Out-of-range inputs are reported as [`RtcError::InvalidArgument`]. Register
//! contents that do not decode to a valid value (a digit above 9, a zero
//! weekday, an hour outside the selected format) are reported as
//! [`RtcError::InvalidHardwareState`].

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::registers::{DateReg, HourFormat, TimeReg};
use crate::RtcError;

/// Splits `value` into its (tens, units) BCD digits after a range check.
pub(crate) fn make_bcd(value: u8, min: u8, max: u8, what: &'static str) -> Result<(u8, u8), RtcError> {
    if value < min || value > max {
        return Err(RtcError::InvalidArgument(what));
    }
    Ok((value / 10, value % 10))
}

/// Joins BCD digits read from a register.
pub(crate) fn from_bcd(tens: u8, units: u8) -> Result<u8, RtcError> {
    if tens > 9 || units > 9 {
        return Err(RtcError::InvalidHardwareState);
    }
    Ok(tens * 10 + units)
}

/// Encodes a decimal value 0-99 as one packed BCD byte.
pub fn encode_bcd_field(value: u8) -> Result<u8, RtcError> {
    let (tens, units) = make_bcd(value, 0, 99, "BCD value must be 0-99")?;
    Ok(tens << 4 | units)
}

/// Decodes one packed BCD byte.
///
/// A nibble above 9 is rejected rather than decoded to a value above 99.
pub fn decode_bcd_field(packed: u8) -> Result<u8, RtcError> {
    from_bcd(packed >> 4, packed & 0x0F)
}

fn decoded(value: u8, min: u8, max: u8) -> Result<u8, RtcError> {
    if value < min || value > max {
        Err(RtcError::InvalidHardwareState)
    } else {
        Ok(value)
    }
}

/// Day of the week as numbered by the RTC (0 is forbidden).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Weekday {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

impl Weekday {
    /// The RTC numbering, Monday = 1.
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Weekday from the RTC numbering, `None` for 0 and values above 7.
    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Weekday::Monday),
            2 => Some(Weekday::Tuesday),
            3 => Some(Weekday::Wednesday),
            4 => Some(Weekday::Thursday),
            5 => Some(Weekday::Friday),
            6 => Some(Weekday::Saturday),
            7 => Some(Weekday::Sunday),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Weekday {
    type Error = RtcError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Weekday::from_number(v).ok_or(RtcError::InvalidArgument("weekday must be 1-7"))
    }
}

impl From<Weekday> for u8 {
    fn from(v: Weekday) -> Self {
        v as u8
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(v: chrono::Weekday) -> Self {
        match v {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(v: Weekday) -> Self {
        match v {
            Weekday::Monday => chrono::Weekday::Mon,
            Weekday::Tuesday => chrono::Weekday::Tue,
            Weekday::Wednesday => chrono::Weekday::Wed,
            Weekday::Thursday => chrono::Weekday::Thu,
            Weekday::Friday => chrono::Weekday::Fri,
            Weekday::Saturday => chrono::Weekday::Sat,
            Weekday::Sunday => chrono::Weekday::Sun,
        }
    }
}

/// AM/PM marker of a 12-hour time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Meridiem {
    Am,
    Pm,
}

impl From<bool> for Meridiem {
    /// Maps the PM bit of a time or alarm register.
    fn from(pm: bool) -> Self {
        if pm {
            Meridiem::Pm
        } else {
            Meridiem::Am
        }
    }
}

impl From<Meridiem> for bool {
    fn from(v: Meridiem) -> Self {
        v == Meridiem::Pm
    }
}

/// Time of day as held by RTC_TR.
///
/// `meridiem` is `None` for a 24-hour time (hour 0-23) and `Some` for a
/// 12-hour time (hour 1-12).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WallTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub meridiem: Option<Meridiem>,
}

impl WallTime {
    /// A 24-hour time.
    pub const fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour,
            minute,
            second,
            meridiem: None,
        }
    }

    /// A 12-hour time.
    pub const fn new_12h(hour: u8, minute: u8, second: u8, meridiem: Meridiem) -> Self {
        Self {
            hour,
            minute,
            second,
            meridiem: Some(meridiem),
        }
    }

    /// Hour format this value is expressed in.
    pub fn format(&self) -> HourFormat {
        match self.meridiem {
            None => HourFormat::TwentyFourHour,
            Some(_) => HourFormat::TwelveHour,
        }
    }

    pub fn validate(&self) -> Result<(), RtcError> {
        match self.meridiem {
            None if self.hour > 23 => return Err(RtcError::InvalidArgument("hour must be 0-23")),
            Some(_) if !(1..=12).contains(&self.hour) => {
                return Err(RtcError::InvalidArgument("12-hour hour must be 1-12"))
            }
            _ => {}
        }
        if self.minute > 59 {
            return Err(RtcError::InvalidArgument("minute must be 0-59"));
        }
        if self.second > 59 {
            return Err(RtcError::InvalidArgument("second must be 0-59"));
        }
        Ok(())
    }

    /// Hour on the 24-hour clock.
    pub fn hour_24(&self) -> u8 {
        match self.meridiem {
            None => self.hour,
            Some(Meridiem::Am) => self.hour % 12,
            Some(Meridiem::Pm) => self.hour % 12 + 12,
        }
    }

    /// Expresses `self` in `format`.
    #[must_use]
    pub fn to_format(&self, format: HourFormat) -> WallTime {
        let hour = self.hour_24();
        match format {
            HourFormat::TwentyFourHour => WallTime::new(hour, self.minute, self.second),
            HourFormat::TwelveHour => {
                let meridiem = Meridiem::from(hour >= 12);
                let hour = match hour % 12 {
                    0 => 12,
                    h => h,
                };
                WallTime::new_12h(hour, self.minute, self.second, meridiem)
            }
        }
    }

    pub fn to_naive(&self) -> Result<NaiveTime, RtcError> {
        self.validate()?;
        NaiveTime::from_hms_opt(
            u32::from(self.hour_24()),
            u32::from(self.minute),
            u32::from(self.second),
        )
        .ok_or(RtcError::InvalidArgument("invalid time"))
    }

    /// Converts a chrono time, dropping fractions of a second.
    pub fn from_naive(time: &NaiveTime, format: HourFormat) -> Self {
        // chrono guarantees hour < 24 and minute, second < 60
        WallTime::new(time.hour() as u8, time.minute() as u8, time.second() as u8).to_format(format)
    }
}

/// Calendar date as held by RTC_DR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarDate {
    /// Year within the century, 0-99
    pub year: u8,
    /// Month, 1-12
    pub month: u8,
    /// Day of the month, 1-31
    pub day: u8,
    pub weekday: Weekday,
}

impl CalendarDate {
    pub const fn new(year: u8, month: u8, day: u8, weekday: Weekday) -> Self {
        Self {
            year,
            month,
            day,
            weekday,
        }
    }

    /// Checks the field ranges and that the day exists in the month.
    ///
    /// The weekday is not cross-checked against the date; the RTC counts it
    /// independently.
    pub fn validate(&self) -> Result<(), RtcError> {
        if self.year > 99 {
            return Err(RtcError::InvalidArgument("year must be 0-99"));
        }
        if !(1..=12).contains(&self.month) {
            return Err(RtcError::InvalidArgument("month must be 1-12"));
        }
        if !(1..=31).contains(&self.day) {
            return Err(RtcError::InvalidArgument("day must be 1-31"));
        }
        self.to_naive().map(|_| ())
    }

    /// The date in the 2000-2099 century.
    pub fn to_naive(&self) -> Result<NaiveDate, RtcError> {
        NaiveDate::from_ymd_opt(
            2000 + i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .ok_or(RtcError::InvalidArgument("day does not exist in month"))
    }

    /// Converts a chrono date in 2000-2099, taking the weekday from it.
    pub fn from_naive(date: &NaiveDate) -> Result<Self, RtcError> {
        let year = date.year() - 2000;
        if !(0..=99).contains(&year) {
            return Err(RtcError::InvalidArgument("year must be 2000-2099"));
        }
        Ok(Self {
            year: year as u8,
            month: date.month() as u8,
            day: date.day() as u8,
            weekday: date.weekday().into(),
        })
    }
}

/// Packs a time into the RTC_TR layout.
pub fn pack_time(time: &WallTime) -> Result<u32, RtcError> {
    time.validate()?;
    let (hour_tens, hour_units) = make_bcd(time.hour, 0, 23, "hour must be 0-23")?;
    let (minute_tens, minute_units) = make_bcd(time.minute, 0, 59, "minute must be 0-59")?;
    let (second_tens, second_units) = make_bcd(time.second, 0, 59, "second must be 0-59")?;

    let mut tr = TimeReg::default();
    tr.set_pm(time.meridiem == Some(Meridiem::Pm));
    tr.set_hour_tens(hour_tens);
    tr.set_hour_units(hour_units);
    tr.set_minute_tens(minute_tens);
    tr.set_minute_units(minute_units);
    tr.set_second_tens(second_tens);
    tr.set_second_units(second_units);
    Ok(tr.into())
}

/// Decodes an RTC_TR value in the given hour format.
pub fn unpack_time(raw: u32, format: HourFormat) -> Result<WallTime, RtcError> {
    let tr = TimeReg::from(raw);
    let hour = from_bcd(tr.hour_tens(), tr.hour_units())?;
    let minute = decoded(from_bcd(tr.minute_tens(), tr.minute_units())?, 0, 59)?;
    let second = decoded(from_bcd(tr.second_tens(), tr.second_units())?, 0, 59)?;
    match format {
        HourFormat::TwentyFourHour => {
            Ok(WallTime::new(decoded(hour, 0, 23)?, minute, second))
        }
        HourFormat::TwelveHour => Ok(WallTime::new_12h(
            decoded(hour, 1, 12)?,
            minute,
            second,
            Meridiem::from(tr.pm()),
        )),
    }
}

/// Packs a date into the RTC_DR layout.
pub fn pack_date(date: &CalendarDate) -> Result<u32, RtcError> {
    date.validate()?;
    let (year_tens, year_units) = make_bcd(date.year, 0, 99, "year must be 0-99")?;
    let (month_tens, month_units) = make_bcd(date.month, 1, 12, "month must be 1-12")?;
    let (day_tens, day_units) = make_bcd(date.day, 1, 31, "day must be 1-31")?;

    let mut dr = DateReg::default();
    dr.set_year_tens(year_tens);
    dr.set_year_units(year_units);
    dr.set_weekday(date.weekday.number());
    dr.set_month_tens(month_tens == 1);
    dr.set_month_units(month_units);
    dr.set_day_tens(day_tens);
    dr.set_day_units(day_units);
    Ok(dr.into())
}

/// Decodes an RTC_DR value.
pub fn unpack_date(raw: u32) -> Result<CalendarDate, RtcError> {
    let dr = DateReg::from(raw);
    let year = from_bcd(dr.year_tens(), dr.year_units())?;
    let month = from_bcd(u8::from(dr.month_tens()), dr.month_units())?;
    let day = from_bcd(dr.day_tens(), dr.day_units())?;
    let weekday = Weekday::from_number(dr.weekday()).ok_or(RtcError::InvalidHardwareState)?;
    let date = CalendarDate::new(year, month, day, weekday);
    date.validate().map_err(|_| RtcError::InvalidHardwareState)?;
    Ok(date)
}

/// Date part of a timestamp; RTC_TSDR carries no year.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimestampDate {
    pub month: u8,
    pub day: u8,
    pub weekday: Weekday,
}

/// Calendar captured on a timestamp event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    pub date: TimestampDate,
    pub time: WallTime,
    /// Sub-second counter at the event
    pub subsecond: u16,
}

pub(crate) fn unpack_timestamp_date(raw: u32) -> Result<TimestampDate, RtcError> {
    let dr = DateReg::from(raw);
    let month = decoded(from_bcd(u8::from(dr.month_tens()), dr.month_units())?, 1, 12)?;
    let day = decoded(from_bcd(dr.day_tens(), dr.day_units())?, 1, 31)?;
    let weekday = Weekday::from_number(dr.weekday()).ok_or(RtcError::InvalidHardwareState)?;
    Ok(TimestampDate {
        month,
        day,
        weekday,
    })
}
