//! Host-testable core of the pulsepace firmware.
//!
//! Everything here is hardware independent: the sensor driver is generic
//! over the `embedded-hal-async` bus traits, the link state machine talks to
//! the radio through the [`link::Transport`] trait, and the marker only
//! needs a critical section.
//!
//! Usage: `cargo test` (host) or
//! `cargo build --release --features embedded --target thumbv7em-none-eabihf`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and pulls these modules in as a regular dependency.

#![cfg_attr(not(test), no_std)]

// ═══════════════════════════════════════════════════════════════════════════
// Configuration & Errors
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════════════════
// Sensor & Telemetry Encoding
// ═══════════════════════════════════════════════════════════════════════════

pub mod battery;
pub mod codec;
pub mod sensor;

// ═══════════════════════════════════════════════════════════════════════════
// Link, Commands & Pace Marker
// ═══════════════════════════════════════════════════════════════════════════

pub mod command;
pub mod feedback;
pub mod link;
pub mod marker;
pub mod melody;

pub use error::{BusError, Error, ParseError, TransportError};

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - cross-module behaviour
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::battery::BatteryLevel;
    use super::codec;
    use super::command;
    use super::feedback::LinkFeedback;
    use super::link::*;
    use super::marker::PaceMarker;
    use super::melody::Cue;
    use super::sensor::{Reading, Temperature};
    use super::*;

    #[derive(Default)]
    struct Radio {
        advertise_requests: usize,
        sent: Vec<String>,
    }

    impl Transport for Radio {
        fn start_advertising(&mut self) -> Result<(), TransportError> {
            self.advertise_requests += 1;
            Ok(())
        }

        fn notify(&mut self, _peer: PeerHandle, payload: &[u8]) -> Result<(), TransportError> {
            self.sent.push(String::from_utf8_lossy(payload).into_owned());
            Ok(())
        }
    }

    fn reading() -> Reading {
        Reading {
            spo2: 98,
            heart_rate: 72,
            temperature: Temperature::from_raw(36, 40),
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Link ↔ Marker
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn disconnect_stops_marker_and_readvertises() {
        let marker = PaceMarker::new();
        let mut cues = Vec::new();
        let mut radio = Radio::default();
        let mut link = ConnectionStateMachine::new();
        {
            let mut feedback = LinkFeedback::new(&marker, |c: Cue| cues.push(c), || 0);

            link.dispatch(LinkEvent::Start, &mut radio, &mut feedback).unwrap();
            link.dispatch(LinkEvent::Accepted(PeerHandle::new(1)), &mut radio, &mut feedback)
                .unwrap();
            command::on_write(b"5", &marker).unwrap();
            assert!(marker.config().enabled);

            link.dispatch(LinkEvent::Disconnected, &mut radio, &mut feedback).unwrap();
        }
        assert!(!marker.config().enabled);
        assert_eq!(radio.advertise_requests, 2);
        assert_eq!(cues, vec![Cue::Connected, Cue::Disconnected]);
    }

    #[test]
    fn stale_tick_from_previous_connection_is_suppressed() {
        let marker = PaceMarker::new();
        let mut radio = Radio::default();
        let mut link = ConnectionStateMachine::new();
        let mut feedback = LinkFeedback::new(&marker, |_: Cue| {}, || 0);

        link.dispatch(LinkEvent::Start, &mut radio, &mut feedback).unwrap();
        link.dispatch(LinkEvent::Accepted(PeerHandle::new(1)), &mut radio, &mut feedback)
            .unwrap();
        command::on_write(b"2", &marker).unwrap();
        let arm = marker.arm().unwrap();

        link.dispatch(LinkEvent::ConnectFailed, &mut radio, &mut feedback).unwrap();
        link.dispatch(LinkEvent::Accepted(PeerHandle::new(2)), &mut radio, &mut feedback)
            .unwrap();

        assert!(!marker.fire(arm, || panic!("tick from the old link")));
        assert!(marker.arm().is_none());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Telemetry Path
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn telemetry_only_reaches_an_attached_peer() {
        let mut radio = Radio::default();
        let mut link = ConnectionStateMachine::new();
        let battery = BatteryLevel::from_volts(3.98);
        let payload = codec::encode(&reading(), battery.percent, battery.volts);

        link.dispatch(LinkEvent::Start, &mut radio, &mut |_: bool| {}).unwrap();
        assert_eq!(link.notify(payload.as_bytes(), &mut radio), Ok(false));

        link.dispatch(LinkEvent::Accepted(PeerHandle::new(4)), &mut radio, &mut |_: bool| {})
            .unwrap();
        assert_eq!(link.notify(payload.as_bytes(), &mut radio), Ok(true));
        assert_eq!(radio.sent, vec!["72,98,75,3.98".to_string()]);
    }

    #[test]
    fn errors_convert_into_top_level_error() {
        let err: Error = ParseError::InvalidDigit.into();
        assert_eq!(err, Error::Parse(ParseError::InvalidDigit));
        let err: Error = BusError::Timeout.into();
        assert_eq!(err, Error::Bus(BusError::Timeout));
        let err: Error = TransportError::NotifyFailed.into();
        assert_eq!(err, Error::Transport(TransportError::NotifyFailed));
    }
}
