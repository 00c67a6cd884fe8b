//! BLE link lifecycle - single-peer connection / advertising state machine.
//!
//! ```text
//!            Start                 Accepted(peer)
//!   Idle ───────────► Advertising ───────────────► Connected(peer)
//!                      ▲   │  ▲                          │
//!                      │   └──┘ AdvertisingComplete      │ Disconnected /
//!                      │        ConnectFailed            │ ConnectFailed
//!                      └─────────────────────────────────┘
//! ```
//!
//! The machine is driven by one [`dispatch`](ConnectionStateMachine::dispatch)
//! call per transport event. It never touches the radio itself: the
//! [`Transport`] it is handed starts advertising and sends notifications,
//! and the [`LinkObserver`] hears about every attach / detach exactly once.
//!
//! Guarantees:
//! - a notification reaches the transport only while `Connected`;
//! - every exit from `Connected` issues exactly one advertising request;
//! - advertising is re-issued whenever a window closes without a peer.

use crate::error::TransportError;

/// Opaque identifier of the connected peer (SoftDevice connection handle).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerHandle(u16);

impl PeerHandle {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }
}

/// Link state. `Connected` carries the only valid peer handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Idle,
    Advertising,
    Connected(PeerHandle),
}

/// Events reported by the transport, in the order they happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Transport and GATT service registration finished.
    Start,
    /// A central connected.
    Accepted(PeerHandle),
    /// A connection attempt failed before it was usable.
    ConnectFailed,
    /// The peer went away (any reason).
    Disconnected,
    /// An advertising window closed without a connection.
    AdvertisingComplete,
}

/// Radio operations the state machine needs.
pub trait Transport {
    /// Request (re)advertising. Must not block.
    fn start_advertising(&mut self) -> Result<(), TransportError>;

    /// Push `payload` to `peer`. Fire-and-forget; must not wait for an
    /// acknowledgement.
    fn notify(&mut self, peer: PeerHandle, payload: &[u8]) -> Result<(), TransportError>;
}

/// Receives connection status changes.
///
/// Called synchronously from the event context; implementations must
/// return promptly.
pub trait LinkObserver {
    fn on_connect_status_changed(&mut self, connected: bool);
}

impl<F: FnMut(bool)> LinkObserver for F {
    fn on_connect_status_changed(&mut self, connected: bool) {
        self(connected)
    }
}

/// Owner of the process-wide [`ConnectionState`].
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl ConnectionStateMachine {
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// The attached peer, if any.
    pub fn peer(&self) -> Option<PeerHandle> {
        match self.state {
            ConnectionState::Connected(peer) => Some(peer),
            _ => None,
        }
    }

    /// Apply one transport event.
    ///
    /// Returns the advertising-start failure, if one happened, so the owner
    /// can log it. The machine stays in `Advertising` either way; the next
    /// window-complete or connect event retries.
    pub fn dispatch<T, O>(
        &mut self,
        event: LinkEvent,
        transport: &mut T,
        observer: &mut O,
    ) -> Result<(), TransportError>
    where
        T: Transport + ?Sized,
        O: LinkObserver + ?Sized,
    {
        match (self.state, event) {
            (ConnectionState::Idle, LinkEvent::Start) => self.advertise(transport),

            (ConnectionState::Advertising, LinkEvent::Accepted(peer)) => {
                self.state = ConnectionState::Connected(peer);
                observer.on_connect_status_changed(true);
                Ok(())
            }

            (ConnectionState::Connected(_), LinkEvent::Disconnected)
            | (ConnectionState::Connected(_), LinkEvent::ConnectFailed) => {
                // Peer handle is dropped before anyone hears about it.
                self.state = ConnectionState::Advertising;
                observer.on_connect_status_changed(false);
                self.advertise(transport)
            }

            (ConnectionState::Advertising, LinkEvent::AdvertisingComplete)
            | (ConnectionState::Advertising, LinkEvent::ConnectFailed) => {
                self.advertise(transport)
            }

            // Stale or duplicate events: nothing changes, nobody is told.
            _ => Ok(()),
        }
    }

    /// Send `payload` to the attached peer.
    ///
    /// Returns `Ok(false)` without touching the transport unless a peer is
    /// attached.
    pub fn notify<T: Transport + ?Sized>(
        &self,
        payload: &[u8],
        transport: &mut T,
    ) -> Result<bool, TransportError> {
        match self.state {
            ConnectionState::Connected(peer) => transport.notify(peer, payload).map(|()| true),
            _ => Ok(false),
        }
    }

    fn advertise<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<(), TransportError> {
        self.state = ConnectionState::Advertising;
        transport.start_advertising()
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
