//! Pace marker timer.
//!
//! Runs [`PaceMarker::run`] on the `embassy-time` clock and routes each tick
//! to the audio queue. Whether a tick is still valid is decided by the
//! marker, not by this task.

use defmt::debug;
use embassy_time::{Instant, Timer};

use pulsepace::feedback::CueSink;
use pulsepace::marker::{MarkerClock, PaceMarker};
use pulsepace::melody::Cue;

use crate::audio::AudioQueue;

/// `embassy-time` as a [`MarkerClock`].
struct EmbassyClock;

impl MarkerClock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn wait_until(&mut self, deadline_ms: u64) {
        Timer::at(Instant::from_millis(deadline_ms)).await
    }
}

#[embassy_executor::task]
pub async fn pace_timer_task(marker: &'static PaceMarker) {
    marker
        .run(&mut EmbassyClock, |arm| {
            debug!("pace marker: tick ({} s)", arm.period_seconds());
            AudioQueue.play(Cue::PaceMark);
        })
        .await
}
