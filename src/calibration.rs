//! Smooth digital calibration (RTC_CALR).
//!
//! Over each calibration window the RTC masks CALM pulses of the 32 kHz clock
//! and, with CALP, inserts one pulse every 2<sup>11</sup> cycles. One CALM
//! step is about 0.9537 ppm, CALP adds 512 steps (488.5 ppm).

use crate::registers::Calibration;
use crate::RtcError;

/// Length of the calibration cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationWindow {
    /// 32 s, all CALM bits usable
    #[default]
    Seconds32,
    /// 16 s, CALM bit 0 must be zero
    Seconds16,
    /// 8 s, CALM bits 1:0 must be zero
    Seconds8,
}

impl CalibrationWindow {
    const fn calm_reserved(self) -> u16 {
        match self {
            CalibrationWindow::Seconds32 => 0,
            CalibrationWindow::Seconds16 => 0b01,
            CalibrationWindow::Seconds8 => 0b11,
        }
    }
}

/// Settings written to RTC_CALR.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationConfig {
    pub window: CalibrationWindow,
    /// Insert 512 pulses per window (CALP)
    pub add_pulses: bool,
    /// Pulses masked per window (CALM), 0-511
    pub mask_pulses: u16,
}

impl CalibrationConfig {
    /// No correction.
    pub const NONE: Self = Self {
        window: CalibrationWindow::Seconds32,
        add_pulses: false,
        mask_pulses: 0,
    };

    /// Correction in steps of 0.9537 ppm over a 32 s window.
    ///
    /// Positive values speed the clock up. The range is -511 to 512, values
    /// outside of it saturate.
    pub fn from_ppm_steps(steps: i16) -> Self {
        let (add_pulses, mask_pulses) = if steps > 0 {
            (true, 512_u16.saturating_sub(steps.unsigned_abs()))
        } else {
            (false, steps.unsigned_abs().min(511))
        };
        Self {
            window: CalibrationWindow::Seconds32,
            add_pulses,
            mask_pulses,
        }
    }

    /// Net correction in 0.9537 ppm steps.
    pub fn ppm_steps(&self) -> i16 {
        let plus: i16 = if self.add_pulses { 512 } else { 0 };
        plus - self.mask_pulses.min(511) as i16
    }

    pub(crate) fn pack(&self) -> Result<Calibration, RtcError> {
        if self.mask_pulses > 511 {
            return Err(RtcError::InvalidArgument("CALM must be 0-511"));
        }
        if self.mask_pulses & self.window.calm_reserved() != 0 {
            return Err(RtcError::InvalidArgument(
                "CALM low bits must be zero for the window",
            ));
        }
        let mut calr = Calibration::default();
        calr.set_calp(self.add_pulses);
        calr.set_calw16(self.window == CalibrationWindow::Seconds16);
        calr.set_calw8(self.window == CalibrationWindow::Seconds8);
        calr.set_calm(self.mask_pulses);
        Ok(calr)
    }

    pub(crate) fn unpack(calr: Calibration) -> Self {
        let window = if calr.calw8() {
            CalibrationWindow::Seconds8
        } else if calr.calw16() {
            CalibrationWindow::Seconds16
        } else {
            CalibrationWindow::Seconds32
        };
        Self {
            window,
            add_pulses: calr.calp(),
            mask_pulses: calr.calm(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ppm_steps() {
        assert_eq!(CalibrationConfig::from_ppm_steps(0), CalibrationConfig::NONE);
        let c = CalibrationConfig::from_ppm_steps(-100);
        assert!(!c.add_pulses);
        assert_eq!(c.mask_pulses, 100);
        assert_eq!(c.ppm_steps(), -100);

        let c = CalibrationConfig::from_ppm_steps(100);
        assert!(c.add_pulses);
        assert_eq!(c.mask_pulses, 412);
        assert_eq!(c.ppm_steps(), 100);
    }

    #[test]
    fn test_from_ppm_steps_saturates() {
        assert_eq!(CalibrationConfig::from_ppm_steps(i16::MIN).ppm_steps(), -511);
        assert_eq!(CalibrationConfig::from_ppm_steps(i16::MAX).ppm_steps(), 512);
    }

    #[test]
    fn test_pack() {
        let calr = CalibrationConfig::from_ppm_steps(-1).pack().unwrap();
        assert_eq!(u32::from(calr), 1);

        let calr = CalibrationConfig {
            window: CalibrationWindow::Seconds8,
            add_pulses: true,
            mask_pulses: 0x1FC,
        }
        .pack()
        .unwrap();
        assert_eq!(u32::from(calr), (1 << 15) | (1 << 14) | 0x1FC);
        assert_eq!(
            CalibrationConfig::unpack(calr),
            CalibrationConfig {
                window: CalibrationWindow::Seconds8,
                add_pulses: true,
                mask_pulses: 0x1FC,
            }
        );
    }

    #[test]
    fn test_pack_rejects_reserved_calm_bits() {
        let config = CalibrationConfig {
            window: CalibrationWindow::Seconds16,
            add_pulses: false,
            mask_pulses: 3,
        };
        assert!(config.pack().is_err());
        let config = CalibrationConfig {
            mask_pulses: 512,
            ..CalibrationConfig::NONE
        };
        assert!(config.pack().is_err());
    }
}
