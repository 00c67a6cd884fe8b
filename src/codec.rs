//! Notification payload encoding.
//!
//! Wire format (ASCII, no trailing delimiter):
//! ```text
//! heart_rate,spo2,battery_percent,battery_voltage
//! 72,98,85,3.98
//! ```
//!
//! Field widths are bounded: heart rate ≤ 10 digits (`u32`), SpO2 ≤ 3,
//! battery percent clamped to 0-100, voltage clamped to 0.00-99.99.
//! The longest payload is 24 bytes, well inside the 64-byte buffer, so
//! the truncate-on-overflow behaviour of `heapless::String` never kicks
//! in. Sentinel readings are written as their numeric values.
//!
//! A notification carries at most ATT MTU - 3 bytes. The sentinel payload
//! (22 bytes) is longer than the 20 bytes of the default MTU, so the link
//! needs an MTU exchange before every payload goes out intact; see
//! [`fits_att_mtu`].

use crate::config::BLE_MAX_PAYLOAD;
use crate::sensor::Reading;
use core::fmt::Write;
use heapless::String;

/// Longest payload [`encode`] can produce.
pub const MAX_ENCODED_LEN: usize = 10 + 1 + 3 + 1 + 3 + 1 + 5;

/// Encoded notification payload.
pub type Payload = String<BLE_MAX_PAYLOAD>;

const _: () = assert!(MAX_ENCODED_LEN <= BLE_MAX_PAYLOAD);

/// Format a reading plus battery telemetry into a notification payload.
pub fn encode(reading: &Reading, battery_percent: u8, battery_volts: f32) -> Payload {
    let centivolts = centivolts(battery_volts);
    let mut out = Payload::new();
    // Cannot overflow, see MAX_ENCODED_LEN.
    let _ = write!(
        out,
        "{},{},{},{}.{:02}",
        reading.heart_rate,
        reading.spo2,
        battery_percent.min(100),
        centivolts / 100,
        centivolts % 100
    );
    out
}

/// Opcode plus attribute handle in front of a notification value.
const ATT_NOTIFY_HEADER_LEN: usize = 3;

/// True when a `len`-byte payload fits one notification at `att_mtu`.
pub fn fits_att_mtu(len: usize, att_mtu: u16) -> bool {
    len + ATT_NOTIFY_HEADER_LEN <= usize::from(att_mtu)
}

/// Round to hundredths of a volt, clamped to 0.00-99.99. NaN maps to 0.
fn centivolts(volts: f32) -> u16 {
    if !(volts > 0.0) {
        return 0;
    }
    let scaled = volts * 100.0 + 0.5;
    if scaled >= 9999.0 {
        9999
    } else {
        scaled as u16
    }
}
