//! Telemetry loop - sample, encode, notify, once per period.
//!
//! Sensor bring-up happens here; if the probe fails the sensor subsystem
//! stays down for this boot and the task ends (BLE and the pace marker keep
//! running). A failed read skips that cycle's notification.

use defmt::{debug, error, info, warn};
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::twim::Twim;
use embassy_time::{Delay, Duration, Ticker};

use pulsepace::codec;
use pulsepace::config::TELEMETRY_PERIOD_MS;
use pulsepace::sensor::{self, Sen0344};

use crate::ble::{with_link, SharedLink};
use crate::power::BatteryMonitor;

pub type Sensor = Sen0344<Twim<'static, TWISPI0>, Delay>;

#[embassy_executor::task]
pub async fn telemetry_task(
    mut sensor: Sensor,
    mut battery: BatteryMonitor,
    link: &'static SharedLink,
) {
    if let Err(e) = sensor::bring_up(&mut sensor).await {
        error!("sensor: init failed: {:?}", e);
        return;
    }
    info!("sensor: measuring");

    let mut ticker = Ticker::every(Duration::from_millis(TELEMETRY_PERIOD_MS));
    loop {
        ticker.next().await;

        let reading = match sensor.read().await {
            Ok(reading) => reading,
            Err(e) => {
                debug!("sensor: read skipped: {:?}", e);
                continue;
            }
        };
        let level = battery.sample().await;
        debug!(
            "sensor: hr={} spo2={} temp={}C",
            reading.heart_rate,
            reading.spo2,
            reading.temperature.as_celsius()
        );

        let payload = codec::encode(&reading, level.percent, level.volts);
        match with_link(link, |l| l.notify(payload.as_bytes())) {
            Ok(true) => debug!("notify: {}", payload.as_str()),
            Ok(false) => {}
            Err(e) => warn!("notify failed: {:?}", e),
        }
    }
}
