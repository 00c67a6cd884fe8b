//! GATT layout: one primary service carrying one telemetry characteristic.
//!
//! | Item           | UUID     | Properties          |
//! |----------------|----------|---------------------|
//! | PulseService   | `0x00FF` | primary             |
//! | data           | `0xFF01` | read, write, notify |
//!
//! Notifications carry the ASCII telemetry payload; writes carry the pace
//! marker command. Keep the UUID literals in sync with `config`.

use pulsepace::config::BLE_MAX_PAYLOAD;

#[nrf_softdevice::gatt_service(uuid = "00ff")]
pub struct PulseService {
    #[characteristic(uuid = "ff01", read, write, notify)]
    pub data: heapless::Vec<u8, BLE_MAX_PAYLOAD>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub pulse: PulseService,
}
