//! Application-wide constants and compile-time configuration.
//!
//! All pin notes, timing parameters, register addresses and protocol
//! constants live here so they can be tuned in one place. Nothing in
//! this module is configurable at runtime.

// BLE

/// Advertised complete local name.
pub const BLE_DEVICE_NAME: &str = "PulsePace";

/// 16-bit UUID of the primary telemetry service.
pub const BLE_SERVICE_UUID: u16 = 0x00FF;

/// 16-bit UUID of the telemetry characteristic (read, write, notify).
pub const BLE_CHAR_UUID: u16 = 0xFF01;

/// Advertising interval (in 0.625 ms units). 160 = 100 ms, narrow on
/// purpose so a dropped peer finds us again quickly.
pub const BLE_ADV_INTERVAL: u32 = 160;

/// Length of one advertising window (in 10 ms units). 1000 = 10 s.
/// When it elapses without a connection the window is reported complete
/// and advertising is re-issued.
pub const BLE_ADV_WINDOW: u16 = 1000;

/// Delay before re-issuing advertising after the SoftDevice refused to
/// start it (ms).
pub const BLE_ADV_RETRY_MS: u64 = 1000;

/// Maximum size of a single notification / characteristic value.
pub const BLE_MAX_PAYLOAD: usize = 64;

/// ATT MTU offered to the central during MTU exchange.
pub const BLE_ATT_MTU: u16 = 128;

/// ATT MTU in effect until the central runs an MTU exchange.
pub const BLE_DEFAULT_ATT_MTU: u16 = 23;

// Sensor (DFRobot SEN0344 / MAX30102 module, I²C)

/// 7-bit I²C address of the pulse oximeter.
pub const SENSOR_I2C_ADDR: u8 = 0x57;

/// Diagnostic register read once to confirm wiring.
pub const SENSOR_REG_PROBE: u8 = 0x04;

/// Control register that starts continuous sampling.
pub const SENSOR_REG_START: u8 = 0x20;

/// Payload written to [`SENSOR_REG_START`].
pub const SENSOR_START_COMMAND: [u8; 2] = [0x00, 0x01];

/// Base register of the 8-byte SpO2 / heart-rate block.
pub const SENSOR_REG_DATA: u8 = 0x0C;

/// Register of the 2-byte temperature block.
pub const SENSOR_REG_TEMPERATURE: u8 = 0x14;

/// Upper bound for a single bus transaction (ms). Exceeding it is a
/// bus error, never a hang.
pub const BUS_TIMEOUT_MS: u32 = 100;

// Telemetry

/// Sampling / notification period of the telemetry loop (ms).
pub const TELEMETRY_PERIOD_MS: u64 = 1000;

// Remote commands

/// Decode buffer for characteristic writes. Input is clamped to one byte
/// less than this before parsing.
pub const COMMAND_BUFFER_SIZE: usize = 16;

// Battery

/// ADC full-scale reading (12-bit SAADC).
pub const BATTERY_ADC_FULL_SCALE: u16 = 4095;

/// Cell voltage at ADC full scale, divider included. Depends on the
/// external voltage divider; not computed here.
pub const BATTERY_FULL_SCALE_VOLTS: f32 = 5.966;

/// Cell voltage reported as 0 %.
pub const BATTERY_EMPTY_VOLTS: f32 = 3.3;

/// Cell voltage reported as 100 %.
pub const BATTERY_FULL_VOLTS: f32 = 4.2;

// Audio feedback

/// Depth of the queue between event/timer callbacks and the buzzer task.
pub const AUDIO_QUEUE_DEPTH: usize = 4;

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Sensor SDA     → P0.26
//   Sensor SCL     → P0.27
//   Buzzer (PWM0)  → P0.13
//   Battery sense  → P0.03 (AIN1)
