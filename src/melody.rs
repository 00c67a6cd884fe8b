//! Buzzer melodies.
//!
//! Pure data: the `audio` task of the firmware renders a melody by playing
//! each [`Tone`] for `duration_ms`, then staying silent for `pause_ms`.

/// One note of a melody.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tone {
    pub freq_hz: u16,
    pub duration_ms: u16,
    /// Silence after the note.
    pub pause_ms: u16,
}

impl Tone {
    pub const fn new(freq_hz: u16, duration_ms: u16, pause_ms: u16) -> Self {
        Self {
            freq_hz,
            duration_ms,
            pause_ms,
        }
    }
}

pub type Melody = &'static [Tone];

/// Rising C-E-G arpeggio at boot.
pub const POWER_ON: Melody = &[
    Tone::new(523, 60, 0),
    Tone::new(659, 60, 0),
    Tone::new(784, 150, 0),
];

/// Same arpeggio an octave up, played when a peer attaches.
pub const CONNECTED: Melody = &[
    Tone::new(1047, 80, 20),
    Tone::new(1319, 80, 20),
    Tone::new(1568, 200, 0),
];

/// Falling fifth when the peer goes away.
pub const DISCONNECTED: Melody = &[Tone::new(784, 80, 0), Tone::new(392, 250, 0)];

/// Double chirp at the piezo's resonant frequency for every pace tick.
pub const PACE_MARK: Melody = &[Tone::new(2730, 70, 80), Tone::new(2730, 70, 0)];

/// What the device should sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cue {
    PowerOn,
    Connected,
    Disconnected,
    PaceMark,
}

impl Cue {
    pub fn melody(self) -> Melody {
        match self {
            Cue::PowerOn => POWER_ON,
            Cue::Connected => CONNECTED,
            Cue::Disconnected => DISCONNECTED,
            Cue::PaceMark => PACE_MARK,
        }
    }
}

/// Total playing time of a melody including pauses (ms).
pub fn duration_ms(melody: Melody) -> u32 {
    melody
        .iter()
        .map(|t| u32::from(t.duration_ms) + u32::from(t.pause_ms))
        .sum()
}
