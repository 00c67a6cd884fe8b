//! User feedback on link changes.
//!
//! [`LinkFeedback`] is the firmware's [`LinkObserver`]. It queues the
//! matching [`Cue`] on every attach or detach, stops the pace marker when
//! the link drops, and measures how long the peer was away.

use crate::link::LinkObserver;
use crate::marker::PaceMarker;
use crate::melody::Cue;

/// Destination for audible cues. Must not block.
pub trait CueSink {
    fn play(&mut self, cue: Cue);
}

impl<F: FnMut(Cue)> CueSink for F {
    fn play(&mut self, cue: Cue) {
        self(cue)
    }
}

/// Measures the outage between a disconnect and the next connect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconnectTracker {
    disconnected_at_ms: Option<u64>,
}

impl ReconnectTracker {
    pub const fn new() -> Self {
        Self {
            disconnected_at_ms: None,
        }
    }

    /// Record a status change at `now_ms`. On reconnect, returns the
    /// downtime in ms if a previous disconnect was seen.
    pub fn record(&mut self, connected: bool, now_ms: u64) -> Option<u64> {
        if connected {
            self.disconnected_at_ms
                .take()
                .map(|since| now_ms.saturating_sub(since))
        } else {
            self.disconnected_at_ms = Some(now_ms);
            None
        }
    }
}

/// Connection-status observer wiring marker, buzzer and outage tracking.
pub struct LinkFeedback<'a, S, C> {
    marker: &'a PaceMarker,
    cues: S,
    clock: C,
    tracker: ReconnectTracker,
    last_downtime_ms: Option<u64>,
}

impl<'a, S, C> LinkFeedback<'a, S, C>
where
    S: CueSink,
    C: FnMut() -> u64,
{
    /// `clock` returns a monotonic timestamp in ms.
    pub fn new(marker: &'a PaceMarker, cues: S, clock: C) -> Self {
        Self {
            marker,
            cues,
            clock,
            tracker: ReconnectTracker::new(),
            last_downtime_ms: None,
        }
    }

    /// Outage length measured at the most recent reconnect, cleared on read.
    pub fn take_downtime(&mut self) -> Option<u64> {
        self.last_downtime_ms.take()
    }
}

impl<S, C> LinkObserver for LinkFeedback<'_, S, C>
where
    S: CueSink,
    C: FnMut() -> u64,
{
    fn on_connect_status_changed(&mut self, connected: bool) {
        if !connected {
            self.marker.stop();
        }
        self.last_downtime_ms = self.tracker.record(connected, (self.clock)());
        self.cues.play(if connected {
            Cue::Connected
        } else {
            Cue::Disconnected
        });
    }
}
