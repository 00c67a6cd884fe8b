//! Piezo buzzer player.
//!
//! Cues are queued from the BLE event context and the pace timer through
//! [`AUDIO`] and rendered here one melody at a time on PWM0. Pitch is set
//! by the PWM period (1 MHz clock), volume is a fixed 50 % duty.

use defmt::{debug, warn};
use embassy_nrf::peripherals::PWM0;
use embassy_nrf::pwm::{Prescaler, SimplePwm};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Timer;

use pulsepace::config::AUDIO_QUEUE_DEPTH;
use pulsepace::feedback::CueSink;
use pulsepace::melody::{self, Cue, Melody};

/// PWM counter clock after [`Prescaler::Div16`].
const PWM_CLOCK_HZ: u32 = 1_000_000;

/// Largest PWM COUNTERTOP value.
const MAX_COUNTERTOP: u32 = 0x7FFF;

/// Cues waiting to be played.
pub static AUDIO: Channel<CriticalSectionRawMutex, Cue, AUDIO_QUEUE_DEPTH> = Channel::new();

/// Non-blocking handle onto [`AUDIO`]. A full queue drops the cue.
#[derive(Clone, Copy)]
pub struct AudioQueue;

impl CueSink for AudioQueue {
    fn play(&mut self, cue: Cue) {
        if AUDIO.try_send(cue).is_err() {
            warn!("audio: queue full, {:?} dropped", cue);
        }
    }
}

#[embassy_executor::task]
pub async fn audio_task(mut pwm: SimplePwm<'static, PWM0>) {
    pwm.set_prescaler(Prescaler::Div16);
    pwm.disable();

    loop {
        let cue = AUDIO.receive().await;
        debug!("audio: {:?} ({} ms)", cue, melody::duration_ms(cue.melody()));
        play(&mut pwm, cue.melody()).await;
    }
}

async fn play(pwm: &mut SimplePwm<'static, PWM0>, melody: Melody) {
    for tone in melody {
        let top = countertop(tone.freq_hz);
        pwm.enable();
        pwm.set_max_duty(top);
        pwm.set_duty(0, top / 2);
        Timer::after_millis(u64::from(tone.duration_ms)).await;
        pwm.disable();

        if tone.pause_ms > 0 {
            Timer::after_millis(u64::from(tone.pause_ms)).await;
        }
    }
}

/// PWM period in counter ticks for `freq_hz`, clamped to the counter range.
fn countertop(freq_hz: u16) -> u16 {
    let ticks = PWM_CLOCK_HZ / u32::from(freq_hz.max(1));
    ticks.clamp(3, MAX_COUNTERTOP) as u16
}
