//! Battery gauge - raw ADC counts to volts to a charge estimate.
//!
//! Single Li-ion cell behind a resistor divider. The divider ratio and ADC
//! reference are folded into [`BATTERY_FULL_SCALE_VOLTS`]; the charge curve
//! is approximated linearly between [`BATTERY_EMPTY_VOLTS`] and
//! [`BATTERY_FULL_VOLTS`].

use crate::config::{
    BATTERY_ADC_FULL_SCALE, BATTERY_EMPTY_VOLTS, BATTERY_FULL_SCALE_VOLTS, BATTERY_FULL_VOLTS,
};

/// One battery measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryLevel {
    /// Estimated charge, 0-100.
    pub percent: u8,
    /// Cell voltage.
    pub volts: f32,
}

impl BatteryLevel {
    pub fn from_volts(volts: f32) -> Self {
        Self {
            percent: percentage_from_voltage(volts),
            volts,
        }
    }

    pub fn from_adc(raw: u16) -> Self {
        Self::from_volts(volts_from_adc(raw))
    }
}

/// Scale a raw ADC sample to cell volts. Samples above full scale saturate.
pub fn volts_from_adc(raw: u16) -> f32 {
    let raw = raw.min(BATTERY_ADC_FULL_SCALE);
    f32::from(raw) / f32::from(BATTERY_ADC_FULL_SCALE) * BATTERY_FULL_SCALE_VOLTS
}

/// Linear charge estimate, clamped to 0-100. NaN reads as empty.
pub fn percentage_from_voltage(volts: f32) -> u8 {
    let span = BATTERY_FULL_VOLTS - BATTERY_EMPTY_VOLTS;
    let fraction = (volts - BATTERY_EMPTY_VOLTS) / span;
    if !(fraction > 0.0) {
        0
    } else if fraction >= 1.0 {
        100
    } else {
        (fraction * 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_endpoints_clamp() {
        assert_eq!(percentage_from_voltage(3.3), 0);
        assert_eq!(percentage_from_voltage(2.9), 0);
        assert_eq!(percentage_from_voltage(4.2), 100);
        assert_eq!(percentage_from_voltage(4.35), 100);
        assert_eq!(percentage_from_voltage(f32::NAN), 0);
    }

    #[test]
    fn percentage_is_linear_between_endpoints() {
        assert_eq!(percentage_from_voltage(3.75), 50);
        // 3.98 V -> 75.5 %, truncated.
        assert_eq!(percentage_from_voltage(3.98), 75);
    }

    #[test]
    fn adc_scaling() {
        assert_eq!(volts_from_adc(0), 0.0);
        assert!((volts_from_adc(BATTERY_ADC_FULL_SCALE) - BATTERY_FULL_SCALE_VOLTS).abs() < 1e-4);
        // Half scale.
        assert!((volts_from_adc(2048) - 2.9837).abs() < 1e-3);
        // Saturates.
        assert_eq!(volts_from_adc(u16::MAX), volts_from_adc(BATTERY_ADC_FULL_SCALE));
    }

    #[test]
    fn level_from_adc_combines_both_steps() {
        // 2800 counts -> ~4.079 V -> ~86 %.
        let level = BatteryLevel::from_adc(2800);
        assert!((level.volts - 4.0794).abs() < 1e-3);
        assert_eq!(level.percent, 86);
    }
}
