//! MIDI clock tempo estimation.

use std::collections::VecDeque;

/// Number of pulse timestamps kept for the rolling average.
pub const TEMPO_SAMPLES_LIMIT: usize = 20;

/// MIDI clock resolution.
pub const PULSES_PER_QUARTER_NOTE: f64 = 24.0;

/// Rolling window of clock pulse timestamps (milliseconds).
///
/// Cleared on clock start/continue. Clock stop leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct TempoEstimator {
    samples: VecDeque<f64>,
}

impl TempoEstimator {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(TEMPO_SAMPLES_LIMIT + 1),
        }
    }

    /// Record a pulse, evicting the oldest sample past the limit.
    pub fn record_pulse(&mut self, timestamp_ms: f64) {
        self.samples.push_back(timestamp_ms);
        if self.samples.len() > TEMPO_SAMPLES_LIMIT {
            self.samples.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Current tempo in BPM, or 0.0 with fewer than two samples.
    pub fn bpm(&self) -> f64 {
        ticks_to_bpm(self.samples.iter().copied())
    }
}

/// Average the inter-arrival deltas of `ticks` and convert them to BPM.
pub fn ticks_to_bpm(ticks: impl IntoIterator<Item = f64>) -> f64 {
    let mut previous: Option<f64> = None;
    let mut total = 0.0;
    let mut intervals = 0usize;
    for tick in ticks {
        if let Some(prev) = previous {
            total += tick - prev;
            intervals += 1;
        }
        previous = Some(tick);
    }
    if intervals == 0 {
        return 0.0;
    }
    quarter_note_to_bpm(total / intervals as f64)
}

/// Convert an average pulse interval into BPM.
#[inline]
pub fn quarter_note_to_bpm(pulse_interval_ms: f64) -> f64 {
    60_000.0 / (pulse_interval_ms * PULSES_PER_QUARTER_NOTE)
}
