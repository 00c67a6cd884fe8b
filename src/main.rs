//! pulsepace - wearable pulse oximeter telemetry firmware for nRF52840.
//!
//! Samples a SEN0344 (MAX30102) heart-rate / SpO2 sensor over I²C, streams
//! the readings to one BLE central as ASCII notifications and plays a
//! periodic pace marker on a buzzer, with the period set by the central.
//!
//! Task layout (single thread-mode executor):
//!
//! ```text
//!   softdevice_task   SoftDevice event pump
//!   ble_task          advertise / GATT server / link state machine
//!   telemetry_task    sensor + battery → codec → notify (1 Hz)
//!   pace_timer_task   marker ticks → audio queue
//!   audio_task        audio queue → PWM buzzer
//! ```

#![no_std]
#![no_main]

mod audio;
mod ble;
mod pace_timer;
mod power;
mod telemetry;

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::pwm::SimplePwm;
use embassy_nrf::saadc::{self, ChannelConfig, Saadc};
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_time::Delay;
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use pulsepace::feedback::CueSink;
use pulsepace::marker::PaceMarker;
use pulsepace::melody::Cue;
use pulsepace::sensor::Sen0344;

bind_interrupts!(struct Irqs {
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
    SAADC => saadc::InterruptHandler;
});

/// Pace marker configuration, written from BLE writes, read by the timer.
pub static PACE_MARKER: PaceMarker = PaceMarker::new();

static SERVER: StaticCell<ble::Server> = StaticCell::new();
static LINK: StaticCell<ble::SharedLink> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("pulsepace starting");

    // SoftDevice owns priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);
    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0.set_priority(Priority::P3);
    interrupt::SAADC.set_priority(Priority::P3);

    // Sensor on TWIM0 (SDA P0.26, SCL P0.27).
    let bus = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim::Config::default());
    let sensor = Sen0344::new(bus, Delay);

    // Battery sense on AIN1.
    let saadc = Saadc::new(
        p.SAADC,
        Irqs,
        saadc::Config::default(),
        [ChannelConfig::single_ended(p.P0_03)],
    );
    let battery = power::BatteryMonitor::new(saadc).await;

    // Buzzer on PWM0.
    let buzzer = SimplePwm::new_1ch(p.PWM0, p.P0_13);

    let sd = Softdevice::enable(&ble::softdevice_config());
    let server: &'static ble::Server = SERVER.init(unwrap!(ble::Server::new(sd)));
    let sd: &'static Softdevice = sd;
    let link: &'static ble::SharedLink = LINK.init(ble::shared_link(server));

    unwrap!(spawner.spawn(ble::softdevice_task(sd)));
    unwrap!(spawner.spawn(audio::audio_task(buzzer)));
    audio::AudioQueue.play(Cue::PowerOn);

    unwrap!(spawner.spawn(pace_timer::pace_timer_task(&PACE_MARKER)));
    unwrap!(spawner.spawn(ble::ble_task(sd, server, link)));
    unwrap!(spawner.spawn(telemetry::telemetry_task(sensor, battery, link)));

    info!("all tasks running");
}
