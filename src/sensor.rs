//! Pulse oximeter driver (DFRobot SEN0344 / MAX30102 module).
//!
//! The module exposes a small register interface on I²C:
//! ```text
//! 0x04  diagnostic register, read once to confirm wiring
//! 0x20  control register, 2-byte start command begins sampling
//! 0x0C  8-byte data block:
//!         Byte 0:   SpO2 (%)
//!         Byte 1:   unused
//!         Byte 2-5: heart rate (u32, big-endian)
//!         Byte 6-7: unused
//! 0x14  2-byte temperature block:
//!         Byte 0:   whole degrees Celsius
//!         Byte 1:   hundredths of a degree
//! ```
//!
//! A raw value of zero means the module has no valid estimate yet. Those
//! are replaced with sentinels (255 / `u32::MAX`) that clients of the
//! notification stream rely on.
//!
//! Every transaction races a [`BUS_TIMEOUT_MS`] delay; losing the race is
//! reported as [`BusError::Timeout`]. Errors are never retried here.

use crate::config::{
    BUS_TIMEOUT_MS, SENSOR_I2C_ADDR, SENSOR_REG_DATA, SENSOR_REG_PROBE, SENSOR_REG_START,
    SENSOR_REG_TEMPERATURE, SENSOR_START_COMMAND,
};
use crate::error::BusError;
use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{Error as _, I2c};

/// SpO2 value reported when the module has no valid estimate.
pub const SPO2_INVALID: u8 = 255;

/// Heart-rate value reported when the module has no valid estimate.
pub const HEART_RATE_INVALID: u32 = u32::MAX;

/// Size of the SpO2 / heart-rate register block.
pub const DATA_BLOCK_SIZE: usize = 8;

/// Size of the temperature register block.
pub const TEMPERATURE_BLOCK_SIZE: usize = 2;

/// Apply the invalid-reading sentinel to a raw SpO2 byte.
pub fn decode_spo2(raw: u8) -> u8 {
    if raw == 0 {
        SPO2_INVALID
    } else {
        raw
    }
}

/// Apply the invalid-reading sentinel to a raw heart-rate value.
pub fn decode_heart_rate(raw: u32) -> u32 {
    if raw == 0 {
        HEART_RATE_INVALID
    } else {
        raw
    }
}

/// Board temperature in fixed point (hundredths of a degree Celsius).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature {
    centi_celsius: u16,
}

impl Temperature {
    /// Build from the two temperature register bytes.
    ///
    /// The fraction byte is added as hundredths even when it exceeds 99,
    /// matching how the module reports it.
    pub const fn from_raw(whole: u8, hundredths: u8) -> Self {
        Self {
            centi_celsius: whole as u16 * 100 + hundredths as u16,
        }
    }

    pub const fn centi_celsius(&self) -> u16 {
        self.centi_celsius
    }

    pub fn as_celsius(&self) -> f32 {
        self.centi_celsius as f32 / 100.0
    }
}

/// One decoded sample. Sentinel values are kept as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// Oxygen saturation (%), or [`SPO2_INVALID`].
    pub spo2: u8,
    /// Beats per minute, or [`HEART_RATE_INVALID`].
    pub heart_rate: u32,
    pub temperature: Temperature,
}

impl Reading {
    /// Decode the raw data and temperature register blocks.
    pub fn from_registers(
        data: &[u8; DATA_BLOCK_SIZE],
        temperature: &[u8; TEMPERATURE_BLOCK_SIZE],
    ) -> Self {
        let raw_heart_rate = u32::from_be_bytes([data[2], data[3], data[4], data[5]]);
        Self {
            spo2: decode_spo2(data[0]),
            heart_rate: decode_heart_rate(raw_heart_rate),
            temperature: Temperature::from_raw(temperature[0], temperature[1]),
        }
    }

    /// SpO2 percentage, `None` when the module reported no estimate.
    pub fn spo2_percent(&self) -> Option<u8> {
        (self.spo2 != SPO2_INVALID).then_some(self.spo2)
    }

    /// Heart rate, `None` when the module reported no estimate.
    pub fn heart_rate_bpm(&self) -> Option<u32> {
        (self.heart_rate != HEART_RATE_INVALID).then_some(self.heart_rate)
    }
}

/// Register-level driver for the pulse oximeter.
///
/// `D` only bounds transaction time; it is never used to pace sampling.
pub struct Sen0344<I2C, D> {
    i2c: I2C,
    delay: D,
}

impl<I2C: I2c, D: DelayNs> Sen0344<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { i2c, delay }
    }

    /// Read the diagnostic register. Succeeds iff the device acknowledges.
    pub async fn probe(&mut self) -> Result<(), BusError> {
        let mut scratch = [0u8; 1];
        self.read_register(SENSOR_REG_PROBE, &mut scratch).await
    }

    /// Write the start command so the module samples continuously.
    pub async fn start_measurement(&mut self) -> Result<(), BusError> {
        let frame = [
            SENSOR_REG_START,
            SENSOR_START_COMMAND[0],
            SENSOR_START_COMMAND[1],
        ];
        let Self { i2c, delay } = self;
        bounded(i2c.write(SENSOR_I2C_ADDR, &frame), delay).await
    }

    /// Read and decode one sample. Either transaction failing aborts the
    /// whole read.
    pub async fn read(&mut self) -> Result<Reading, BusError> {
        let mut data = [0u8; DATA_BLOCK_SIZE];
        self.read_register(SENSOR_REG_DATA, &mut data).await?;

        let mut temperature = [0u8; TEMPERATURE_BLOCK_SIZE];
        self.read_register(SENSOR_REG_TEMPERATURE, &mut temperature)
            .await?;

        Ok(Reading::from_registers(&data, &temperature))
    }

    /// Give the bus and delay back to the caller.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    async fn read_register(&mut self, register: u8, buf: &mut [u8]) -> Result<(), BusError> {
        let address_frame = [register];
        let Self { i2c, delay } = self;
        bounded(i2c.write_read(SENSOR_I2C_ADDR, &address_frame, buf), delay).await
    }
}

/// Probe the sensor and, only if it answers, start continuous sampling.
///
/// This is the only initialization path: a failed probe is returned
/// before any start command reaches the bus, and the caller must not
/// `read()` afterwards.
pub async fn bring_up<I2C: I2c, D: DelayNs>(
    sensor: &mut Sen0344<I2C, D>,
) -> Result<(), BusError> {
    sensor.probe().await?;
    sensor.start_measurement().await
}

async fn bounded<F, E>(transaction: F, delay: &mut impl DelayNs) -> Result<(), BusError>
where
    F: core::future::Future<Output = Result<(), E>>,
    E: embedded_hal_async::i2c::Error,
{
    match select(transaction, delay.delay_ms(BUS_TIMEOUT_MS)).await {
        Either::First(result) => result.map_err(|e| BusError::from(e.kind())),
        Either::Second(()) => Err(BusError::Timeout),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};

    /// Register-map fake. Records every register touched, in order.
    struct FakeBus {
        data: [u8; DATA_BLOCK_SIZE],
        temperature: [u8; TEMPERATURE_BLOCK_SIZE],
        failing_register: Option<u8>,
        touched: Vec<u8>,
        writes: Vec<Vec<u8>>,
    }

    impl FakeBus {
        fn new(data: [u8; DATA_BLOCK_SIZE], temperature: [u8; TEMPERATURE_BLOCK_SIZE]) -> Self {
            Self {
                data,
                temperature,
                failing_register: None,
                touched: Vec::new(),
                writes: Vec::new(),
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            if address != SENSOR_I2C_ADDR {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            let mut register = 0u8;
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        register = bytes[0];
                        self.touched.push(register);
                        if self.failing_register == Some(register) {
                            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
                        }
                        self.writes.push(bytes.to_vec());
                    }
                    Operation::Read(buf) => {
                        let source: &[u8] = match register {
                            SENSOR_REG_DATA => &self.data,
                            SENSOR_REG_TEMPERATURE => &self.temperature,
                            _ => &[0x11],
                        };
                        buf.copy_from_slice(&source[..buf.len()]);
                    }
                }
            }
            Ok(())
        }
    }

    /// Bus that never completes a transaction.
    struct StalledBus;

    impl ErrorType for StalledBus {
        type Error = ErrorKind;
    }

    impl I2c for StalledBus {
        async fn transaction(
            &mut self,
            _address: u8,
            _operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            core::future::pending().await
        }
    }

    /// Timeout that never elapses, so the bus always wins the race.
    struct NeverElapses;

    impl DelayNs for NeverElapses {
        async fn delay_ns(&mut self, _ns: u32) {
            core::future::pending::<()>().await
        }
    }

    /// Timeout that elapses immediately.
    struct Elapsed;

    impl DelayNs for Elapsed {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    const GOOD_DATA: [u8; 8] = [98, 0, 0x00, 0x00, 0x00, 72, 0, 0];

    #[test]
    fn spo2_sentinel_only_for_zero() {
        assert_eq!(decode_spo2(0), SPO2_INVALID);
        for v in 1..=u8::MAX {
            assert_eq!(decode_spo2(v), v);
        }
    }

    #[test]
    fn heart_rate_sentinel_only_for_zero() {
        assert_eq!(decode_heart_rate(0), 0xFFFF_FFFF);
        for v in [1, 72, 180, 0x0001_0000, u32::MAX - 1, u32::MAX] {
            assert_eq!(decode_heart_rate(v), v);
        }
    }

    #[test]
    fn heart_rate_is_big_endian() {
        let data = [97, 0xAA, 0x00, 0x00, 0x01, 0x02, 0xBB, 0xCC];
        let reading = Reading::from_registers(&data, &[36, 50]);
        assert_eq!(reading.heart_rate, 0x0102);
        assert_eq!(reading.spo2, 97);
    }

    #[test]
    fn temperature_adds_hundredths() {
        let t = Temperature::from_raw(36, 75);
        assert_eq!(t.centi_celsius(), 3675);
        assert!((t.as_celsius() - 36.75).abs() < 0.001);
        // Out-of-range fraction byte still adds as hundredths.
        assert_eq!(Temperature::from_raw(20, 150).centi_celsius(), 2150);
    }

    #[test]
    fn invalid_fields_map_to_none() {
        let reading = Reading::from_registers(&[0; 8], &[0, 0]);
        assert_eq!(reading.spo2, SPO2_INVALID);
        assert_eq!(reading.heart_rate, HEART_RATE_INVALID);
        assert_eq!(reading.spo2_percent(), None);
        assert_eq!(reading.heart_rate_bpm(), None);
    }

    #[test]
    fn read_decodes_both_blocks() {
        let mut sensor = Sen0344::new(FakeBus::new(GOOD_DATA, [36, 6]), NeverElapses);
        let reading = block_on(sensor.read()).unwrap();
        assert_eq!(reading.spo2_percent(), Some(98));
        assert_eq!(reading.heart_rate_bpm(), Some(72));
        assert_eq!(reading.temperature.centi_celsius(), 3606);

        let (bus, _) = sensor.release();
        assert_eq!(bus.touched, vec![SENSOR_REG_DATA, SENSOR_REG_TEMPERATURE]);
    }

    #[test]
    fn temperature_failure_aborts_read() {
        let mut bus = FakeBus::new(GOOD_DATA, [36, 6]);
        bus.failing_register = Some(SENSOR_REG_TEMPERATURE);
        let mut sensor = Sen0344::new(bus, NeverElapses);
        assert_eq!(block_on(sensor.read()), Err(BusError::NoAcknowledge));
    }

    #[test]
    fn data_failure_skips_temperature() {
        let mut bus = FakeBus::new(GOOD_DATA, [36, 6]);
        bus.failing_register = Some(SENSOR_REG_DATA);
        let mut sensor = Sen0344::new(bus, NeverElapses);
        assert!(block_on(sensor.read()).is_err());
        let (bus, _) = sensor.release();
        assert_eq!(bus.touched, vec![SENSOR_REG_DATA]);
    }

    #[test]
    fn start_measurement_writes_command() {
        let mut sensor = Sen0344::new(FakeBus::new(GOOD_DATA, [0, 0]), NeverElapses);
        block_on(sensor.start_measurement()).unwrap();
        let (bus, _) = sensor.release();
        assert_eq!(bus.writes, vec![vec![SENSOR_REG_START, 0x00, 0x01]]);
    }

    #[test]
    fn bring_up_probes_then_starts() {
        let mut sensor = Sen0344::new(FakeBus::new(GOOD_DATA, [0, 0]), NeverElapses);
        block_on(bring_up(&mut sensor)).unwrap();
        let (bus, _) = sensor.release();
        assert_eq!(bus.touched, vec![SENSOR_REG_PROBE, SENSOR_REG_START]);
    }

    #[test]
    fn failed_probe_never_starts_measurement() {
        let mut bus = FakeBus::new(GOOD_DATA, [0, 0]);
        bus.failing_register = Some(SENSOR_REG_PROBE);
        let mut sensor = Sen0344::new(bus, NeverElapses);
        assert_eq!(block_on(bring_up(&mut sensor)), Err(BusError::NoAcknowledge));
        let (bus, _) = sensor.release();
        assert!(!bus.touched.contains(&SENSOR_REG_START));
    }

    #[test]
    fn stalled_bus_times_out() {
        let mut sensor = Sen0344::new(StalledBus, Elapsed);
        assert_eq!(block_on(sensor.probe()), Err(BusError::Timeout));
        assert_eq!(block_on(sensor.read()), Err(BusError::Timeout));
    }

    #[test]
    fn hal_error_kinds_are_mapped() {
        assert_eq!(BusError::from(ErrorKind::Bus), BusError::Bus);
        assert_eq!(BusError::from(ErrorKind::ArbitrationLoss), BusError::ArbitrationLoss);
        assert_eq!(BusError::from(ErrorKind::Overrun), BusError::Overrun);
        assert_eq!(BusError::from(ErrorKind::Other), BusError::Other);
    }
}
