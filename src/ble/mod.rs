//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Advertiser** - connectable undirected advertising in fixed windows;
//!    every closed window is fed back to the link state machine, which
//!    decides whether to re-issue it.
//! 2. **GATT server** - one service with the telemetry characteristic
//!    (see [`gatt`]). Writes are remote commands, CCCD writes gate
//!    notifications.
//! 3. **Transport** - [`SoftdeviceTransport`], the radio side of
//!    [`pulsepace::link::Transport`], shared with the telemetry task through
//!    [`SharedLink`].

pub mod gatt;

use core::cell::RefCell;

use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Instant, Timer};
use nrf_softdevice::ble::peripheral::{self, AdvertiseError};
use nrf_softdevice::ble::{gatt_server, Connection};
use nrf_softdevice::{raw, Softdevice};

use pulsepace::config::{
    BLE_ADV_INTERVAL, BLE_ADV_RETRY_MS, BLE_ADV_WINDOW, BLE_ATT_MTU, BLE_DEVICE_NAME,
    BLE_SERVICE_UUID,
};
use pulsepace::{codec, command};
use pulsepace::error::TransportError;
use pulsepace::feedback::LinkFeedback;
use pulsepace::link::{ConnectionStateMachine, LinkEvent, LinkObserver, PeerHandle, Transport};

use crate::audio::AudioQueue;
use crate::PACE_MARKER;
pub use gatt::Server;
use gatt::{PulseServiceEvent, ServerEvent};

// ═══════════════════════════════════════════════════════════════════════════
// Advertising payload
// ═══════════════════════════════════════════════════════════════════════════

const NAME: &[u8] = BLE_DEVICE_NAME.as_bytes();
const ADV_HEADER_LEN: usize = 3 + 4 + 2;
const ADV_LEN: usize = ADV_HEADER_LEN + NAME.len();

const _: () = assert!(ADV_LEN <= 31, "advertising payload exceeds 31 bytes");

/// Flags, complete list of 16-bit services, complete local name.
static ADV_DATA: [u8; ADV_LEN] = adv_data();

const fn adv_data() -> [u8; ADV_LEN] {
    let uuid = BLE_SERVICE_UUID.to_le_bytes();
    #[rustfmt::skip]
    let header: [u8; ADV_HEADER_LEN] = [
        0x02, 0x01, raw::BLE_GAP_ADV_FLAGS_LE_ONLY_GENERAL_DISC_MODE as u8,
        0x03, 0x03, uuid[0], uuid[1],
        1 + NAME.len() as u8, 0x09,
    ];

    let mut out = [0u8; ADV_LEN];
    let mut i = 0;
    while i < ADV_HEADER_LEN {
        out[i] = header[i];
        i += 1;
    }
    let mut j = 0;
    while j < NAME.len() {
        out[ADV_HEADER_LEN + j] = NAME[j];
        j += 1;
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════
// SoftDevice bring-up
// ═══════════════════════════════════════════════════════════════════════════

/// SoftDevice configuration for a single peripheral link.
pub fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: BLE_ATT_MTU }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: BLE_DEVICE_NAME.as_ptr() as *const u8 as _,
            current_len: BLE_DEVICE_NAME.len() as u16,
            max_len: BLE_DEVICE_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

// ═══════════════════════════════════════════════════════════════════════════
// Transport
// ═══════════════════════════════════════════════════════════════════════════

/// Radio side of the link: remembers the live connection and whether the
/// state machine asked for advertising.
pub struct SoftdeviceTransport {
    server: &'static Server,
    conn: Option<Connection>,
    advertising_requested: bool,
    notifications_enabled: bool,
    mtu_warned: bool,
}

impl SoftdeviceTransport {
    fn new(server: &'static Server) -> Self {
        Self {
            server,
            conn: None,
            advertising_requested: false,
            notifications_enabled: false,
            mtu_warned: false,
        }
    }

    fn attach(&mut self, conn: Connection) {
        self.conn = Some(conn);
        self.notifications_enabled = false;
        self.mtu_warned = false;
    }

    fn detach(&mut self) {
        self.conn = None;
        self.notifications_enabled = false;
    }

    fn take_advertising_request(&mut self) -> bool {
        core::mem::take(&mut self.advertising_requested)
    }
}

impl Transport for SoftdeviceTransport {
    fn start_advertising(&mut self) -> Result<(), TransportError> {
        // Picked up by the BLE task on its next loop iteration.
        self.advertising_requested = true;
        Ok(())
    }

    fn notify(&mut self, peer: PeerHandle, payload: &[u8]) -> Result<(), TransportError> {
        let conn = self
            .conn
            .as_ref()
            .filter(|c| c.handle() == Some(peer.raw()))
            .ok_or(TransportError::NotifyFailed)?;
        let value = heapless::Vec::from_slice(payload).map_err(|_| TransportError::NotifyFailed)?;

        // Keep the readable value current even while the peer is not subscribed.
        if let Err(e) = self.server.pulse.data_set(&value) {
            warn!("BLE: value update failed: {:?}", e);
        }
        if !self.notifications_enabled {
            return Ok(());
        }
        // The SoftDevice would cut the payload short; the peer can still read it.
        let att_mtu = conn.att_mtu();
        if !codec::fits_att_mtu(value.len(), att_mtu) {
            if !self.mtu_warned {
                warn!(
                    "BLE: ATT MTU {} too small for {} byte payload, notifications held until MTU exchange",
                    att_mtu,
                    value.len()
                );
                self.mtu_warned = true;
            }
            return Ok(());
        }
        self.server
            .pulse
            .data_notify(conn, &value)
            .map_err(|_| TransportError::NotifyFailed)
    }
}

/// Link state machine plus the transport it drives.
pub struct LinkCell {
    machine: ConnectionStateMachine,
    transport: SoftdeviceTransport,
}

impl LinkCell {
    fn dispatch(&mut self, event: LinkEvent, observer: &mut impl LinkObserver) {
        let before = self.machine.state();
        if let Err(e) = self.machine.dispatch(event, &mut self.transport, observer) {
            warn!("advertising start failed: {:?}", e);
        }
        let after = self.machine.state();
        if before != after {
            info!("link: {:?} -> {:?}", before, after);
        }
    }

    /// Push a telemetry payload. `Ok(false)` when no peer is attached.
    pub fn notify(&mut self, payload: &[u8]) -> Result<bool, TransportError> {
        self.machine.notify(payload, &mut self.transport)
    }
}

/// Link state shared between the BLE task and the telemetry task.
pub type SharedLink = Mutex<CriticalSectionRawMutex, RefCell<LinkCell>>;

pub fn shared_link(server: &'static Server) -> SharedLink {
    Mutex::new(RefCell::new(LinkCell {
        machine: ConnectionStateMachine::new(),
        transport: SoftdeviceTransport::new(server),
    }))
}

/// Run `f` on the link inside its critical section.
pub fn with_link<R>(link: &SharedLink, f: impl FnOnce(&mut LinkCell) -> R) -> R {
    link.lock(|cell| f(&mut cell.borrow_mut()))
}

// ═══════════════════════════════════════════════════════════════════════════
// BLE task
// ═══════════════════════════════════════════════════════════════════════════

/// Advertise, serve one connection, repeat. Never returns.
#[embassy_executor::task]
pub async fn ble_task(sd: &'static Softdevice, server: &'static Server, link: &'static SharedLink) {
    let mut feedback = LinkFeedback::new(&PACE_MARKER, AudioQueue, || Instant::now().as_millis());

    with_link(link, |l| l.dispatch(LinkEvent::Start, &mut feedback));
    info!("BLE: advertising as \"{}\"", BLE_DEVICE_NAME);

    loop {
        if !with_link(link, |l| l.transport.take_advertising_request()) {
            Timer::after_millis(BLE_ADV_RETRY_MS).await;
            with_link(link, |l| l.dispatch(LinkEvent::AdvertisingComplete, &mut feedback));
            continue;
        }

        let config = peripheral::Config {
            interval: BLE_ADV_INTERVAL,
            timeout: Some(BLE_ADV_WINDOW),
            ..Default::default()
        };
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &[],
        };

        match peripheral::advertise_connectable(sd, adv, &config).await {
            Ok(conn) => serve(conn, server, link, &mut feedback).await,
            Err(AdvertiseError::Timeout) => {
                debug!("BLE: advertising window closed");
                with_link(link, |l| l.dispatch(LinkEvent::AdvertisingComplete, &mut feedback));
            }
            Err(e) => {
                warn!("BLE: advertising failed: {:?}", e);
                // No window-complete follows a refused start; synthesize one.
                Timer::after_millis(BLE_ADV_RETRY_MS).await;
                with_link(link, |l| l.dispatch(LinkEvent::AdvertisingComplete, &mut feedback));
            }
        }

        if let Some(ms) = feedback.take_downtime() {
            info!("BLE: peer back after {} ms", ms);
        }
    }
}

/// Run the GATT server on `conn` until the peer goes away.
async fn serve<O: LinkObserver>(
    conn: Connection,
    server: &'static Server,
    link: &'static SharedLink,
    feedback: &mut O,
) {
    let Some(handle) = conn.handle() else {
        // Dropped before the SoftDevice assigned a handle.
        with_link(link, |l| l.dispatch(LinkEvent::ConnectFailed, feedback));
        return;
    };

    with_link(link, |l| {
        l.transport.attach(conn.clone());
        l.dispatch(LinkEvent::Accepted(PeerHandle::new(handle)), feedback);
    });

    let _ = gatt_server::run(&conn, server, |e| match e {
        ServerEvent::Pulse(PulseServiceEvent::DataWrite(value)) => on_data_write(&value),
        ServerEvent::Pulse(PulseServiceEvent::DataCccdWrite { notifications }) => {
            info!("BLE: notifications {}", if notifications { "on" } else { "off" });
            with_link(link, |l| l.transport.notifications_enabled = notifications);
        }
    })
    .await;

    info!("BLE: connection {} closed", handle);
    with_link(link, |l| {
        l.transport.detach();
        l.dispatch(LinkEvent::Disconnected, feedback);
    });
}

fn on_data_write(value: &[u8]) {
    info!("BLE: write {=[u8]:a}", value);
    match command::on_write(value, &PACE_MARKER) {
        Ok(cmd) => info!("command accepted: {:?}", cmd),
        Err(e) => warn!("command dropped: {:?}", e),
    }
}
