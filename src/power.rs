//! Battery sampling - one SAADC channel on the divided cell voltage.
//!
//! Conversion to volts and percent lives in [`pulsepace::battery`]; this
//! module only owns the converter.
//!
//! Input: P0.03 / AIN1, single ended, default gain (1/6) against the
//! internal 0.6 V reference, 12-bit.

use defmt::{debug, info};
use embassy_nrf::saadc::Saadc;

use pulsepace::battery::BatteryLevel;

pub struct BatteryMonitor {
    saadc: Saadc<'static, 1>,
}

impl BatteryMonitor {
    /// Take ownership of the converter and run its offset calibration.
    pub async fn new(saadc: Saadc<'static, 1>) -> Self {
        saadc.calibrate().await;
        info!("battery: SAADC calibrated");
        Self { saadc }
    }

    /// One conversion. Negative readings (noise around 0 V) count as 0.
    pub async fn sample(&mut self) -> BatteryLevel {
        let mut buf = [0i16; 1];
        self.saadc.sample(&mut buf).await;
        let level = BatteryLevel::from_adc(buf[0].max(0) as u16);
        debug!("battery: raw={} {}% {}V", buf[0], level.percent, level.volts);
        level
    }
}
