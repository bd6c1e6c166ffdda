// Tempo - BPM and the tick interval derived from it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Clock ticks per quarter-note beat
pub const TICKS_PER_BEAT: u32 = 8;

pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 999.0;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    /// BPM is clamped to [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
        }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Set BPM value (clamped)
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = clamp_bpm(bpm);
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Time between two clock ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.beat_duration_seconds() / TICKS_PER_BEAT as f64)
    }
}

fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() {
        return 120.0;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}
