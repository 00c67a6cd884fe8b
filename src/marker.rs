//! Remote-configurable periodic pace marker.
//!
//! The peer sets a period in seconds; every period the device plays a
//! short marker sound. The configuration is written from the BLE event
//! context while ticks are produced by a separate timer task, so every
//! change goes through one critical section:
//!
//! - each reconfiguration bumps a generation counter and wakes the timer
//!   task through a [`Signal`];
//! - the timer task takes a [`MarkerArm`] snapshot, waits one period, then
//!   calls [`PaceMarker::fire`], which runs the tick callback (inside the
//!   lock) only if the generation is unchanged and the marker is enabled.
//!
//! A tick armed under an old period therefore never fires after the new
//! period took effect, and nothing fires once [`PaceMarker::stop`] has
//! returned. [`PaceMarker::run`] is that timer loop, generic over a
//! [`MarkerClock`] so the firmware drives it from `embassy-time`.

use core::cell::RefCell;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

/// Current marker configuration. `period_seconds == 0` means disabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MarkerTimerConfig {
    pub period_seconds: u32,
    pub enabled: bool,
}

impl MarkerTimerConfig {
    pub const DISABLED: Self = Self {
        period_seconds: 0,
        enabled: false,
    };
}

/// Snapshot of an armed period, handed back to [`PaceMarker::fire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MarkerArm {
    generation: u32,
    period_seconds: u32,
}

impl MarkerArm {
    pub fn period_seconds(&self) -> u32 {
        self.period_seconds
    }

    pub fn period_ms(&self) -> u64 {
        u64::from(self.period_seconds) * 1000
    }
}

/// Monotonic millisecond time source for [`PaceMarker::run`].
#[allow(async_fn_in_trait)]
pub trait MarkerClock {
    fn now_ms(&self) -> u64;

    /// Complete once `now_ms() >= deadline_ms`.
    async fn wait_until(&mut self, deadline_ms: u64);
}

struct Schedule {
    config: MarkerTimerConfig,
    generation: u32,
}

/// Owner of the [`MarkerTimerConfig`]. Lives for the whole program.
pub struct PaceMarker {
    schedule: Mutex<CriticalSectionRawMutex, RefCell<Schedule>>,
    changed: Signal<CriticalSectionRawMutex, ()>,
}

impl PaceMarker {
    pub const fn new() -> Self {
        Self {
            schedule: Mutex::new(RefCell::new(Schedule {
                config: MarkerTimerConfig::DISABLED,
                generation: 0,
            })),
            changed: Signal::new(),
        }
    }

    /// Start (or restart) the marker with a new period. Non-positive
    /// values stop it.
    pub fn set_interval(&self, seconds: i32) {
        if seconds <= 0 {
            self.stop();
            return;
        }
        self.reconfigure(MarkerTimerConfig {
            period_seconds: seconds as u32,
            enabled: true,
        });
    }

    /// Disable the marker. Idempotent.
    pub fn stop(&self) {
        self.reconfigure(MarkerTimerConfig::DISABLED);
    }

    pub fn config(&self) -> MarkerTimerConfig {
        self.schedule.lock(|s| s.borrow().config)
    }

    /// Snapshot the active period, or `None` while disabled.
    pub fn arm(&self) -> Option<MarkerArm> {
        self.schedule.lock(|s| {
            let s = s.borrow();
            s.config.enabled.then_some(MarkerArm {
                generation: s.generation,
                period_seconds: s.config.period_seconds,
            })
        })
    }

    /// Deliver one tick for `arm`. Returns whether `on_tick` ran.
    ///
    /// `on_tick` runs inside the critical section and must return promptly.
    pub fn fire(&self, arm: MarkerArm, on_tick: impl FnOnce()) -> bool {
        self.schedule.lock(|s| {
            let s = s.borrow();
            let current = s.config.enabled && s.generation == arm.generation;
            if current {
                on_tick();
            }
            current
        })
    }

    /// Wait until the configuration changes.
    pub async fn wait_changed(&self) {
        self.changed.wait().await
    }

    /// Drop a pending change notification before taking a fresh snapshot.
    pub fn clear_changed(&self) {
        self.changed.reset();
    }

    /// Timer loop: arm, wait one period, fire, repeat. Any reconfiguration
    /// drops the pending deadline and re-arms from the new snapshot.
    ///
    /// Deadlines advance by whole periods from the arm time, so the cadence
    /// does not drift with task latency. `on_tick` runs inside the critical
    /// section (see [`PaceMarker::fire`]).
    pub async fn run<C: MarkerClock>(
        &self,
        clock: &mut C,
        mut on_tick: impl FnMut(MarkerArm),
    ) -> ! {
        loop {
            self.clear_changed();
            let Some(arm) = self.arm() else {
                self.wait_changed().await;
                continue;
            };

            let mut deadline = clock.now_ms().saturating_add(arm.period_ms());
            loop {
                match select(clock.wait_until(deadline), self.wait_changed()).await {
                    Either::First(()) => {
                        if !self.fire(arm, || on_tick(arm)) {
                            break;
                        }
                        deadline = deadline.saturating_add(arm.period_ms());
                    }
                    Either::Second(()) => break,
                }
            }
        }
    }

    fn reconfigure(&self, config: MarkerTimerConfig) {
        self.schedule.lock(|s| {
            let mut s = s.borrow_mut();
            s.config = config;
            s.generation = s.generation.wrapping_add(1);
        });
        self.changed.signal(());
    }
}

impl Default for PaceMarker {
    fn default() -> Self {
        Self::new()
    }
}
