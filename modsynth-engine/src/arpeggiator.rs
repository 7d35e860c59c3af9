//! Arpeggiator: steps through a note pool on its own clock tick.

use std::ops::RangeInclusive;

use modsynth_types::{ArpDirection, Note};

use crate::voices::{NoteToken, VoiceLifecycleManager};

pub const RATE_RANGE: RangeInclusive<f64> = 20.0..=600.0;

/// One note played by [`Arpeggiator::on_tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpStep {
    pub index: usize,
    pub note: Note,
    /// Start time after swing.
    pub time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub struct Arpeggiator {
    pool: Vec<Note>,
    current_index: usize,
    direction: ArpDirection,
    rate_bpm: f64,
    gate_percent: f64,
    swing_percent: f64,
    running: bool,
    /// Next tick plays `current_index` as-is instead of advancing.
    fresh: bool,
    ascending: bool,
    tick_count: u64,
    rng_state: u64,
    /// Last attack this arpeggiator started.
    sounding: Option<NoteToken>,
}

impl Default for Arpeggiator {
    fn default() -> Self {
        Self::new(ArpDirection::Up, 120.0, 50.0, 0.0)
    }
}

impl Arpeggiator {
    pub fn new(direction: ArpDirection, rate_bpm: f64, gate_percent: f64, swing_percent: f64) -> Self {
        let mut arp = Self {
            pool: Vec::new(),
            current_index: 0,
            direction,
            rate_bpm: 120.0,
            gate_percent: 50.0,
            swing_percent: 0.0,
            running: false,
            fresh: true,
            ascending: true,
            tick_count: 0,
            rng_state: 0x2545_f491_4f6c_dd1d,
            sounding: None,
        };
        arp.set_rate(rate_bpm);
        arp.set_gate(gate_percent);
        arp.set_swing(swing_percent);
        arp
    }

    /// Seed the random direction's generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_state = seed;
        self
    }

    // ─── Pool ───────────────────────────────────────────────────────

    /// Add `note` to the pool. Returns false if it was already present.
    /// The first note into an empty pool starts the arpeggiator from index 0.
    pub fn add_note(&mut self, note: Note) -> bool {
        if self.pool.contains(&note) {
            return false;
        }
        self.pool.push(note);
        if !self.running {
            self.running = true;
            self.restart();
            log::debug!(target: "modsynth::arp", "started with {}", note);
        }
        true
    }

    /// Remove `note` from the pool. Emptying the pool stops the
    /// arpeggiator and releases whatever it is sounding.
    pub fn remove_note(&mut self, note: Note, time: f64, voices: &mut VoiceLifecycleManager) -> bool {
        let Some(pos) = self.pool.iter().position(|n| *n == note) else {
            return false;
        };
        self.pool.remove(pos);

        if self.pool.is_empty() {
            self.running = false;
            self.current_index = 0;
            self.release(time, voices);
            log::debug!(target: "modsynth::arp", "stopped: pool empty");
            return true;
        }
        if pos < self.current_index {
            self.current_index -= 1;
        }
        if self.current_index >= self.pool.len() {
            self.current_index = 0;
        }
        true
    }

    /// Release the note this arpeggiator is sounding, if its gate has not
    /// closed yet, and rewind so the next tick plays index 0. The pool is kept.
    pub fn release(&mut self, time: f64, voices: &mut VoiceLifecycleManager) {
        if let Some(token) = self.sounding.take() {
            voices.release_token(token, time);
        }
        self.restart();
    }

    fn restart(&mut self) {
        self.current_index = 0;
        self.fresh = true;
        self.ascending = true;
        self.tick_count = 0;
    }

    /// Transpose the pool by `(new - old)` octaves without sounding anything.
    /// Refused, leaving the pool untouched, if any note would leave MIDI range.
    pub fn update_octave(&mut self, old_octave: i32, new_octave: i32) -> bool {
        let semitones = (new_octave - old_octave) * 12;
        if semitones == 0 {
            return true;
        }
        let moved: Option<Vec<Note>> = self.pool.iter().map(|n| n.transposed(semitones)).collect();
        match moved {
            Some(moved) => {
                self.pool = moved;
                true
            }
            None => {
                log::warn!(
                    target: "modsynth::arp",
                    "octave {} -> {} would leave MIDI range; pool unchanged",
                    old_octave,
                    new_octave
                );
                false
            }
        }
    }

    // ─── Tick ───────────────────────────────────────────────────────

    /// Advance one step and trigger it for `gate` of the interval.
    /// Odd ticks are pushed back by `swing/100 * interval/2`.
    pub fn on_tick(&mut self, time: f64, voices: &mut VoiceLifecycleManager) -> Option<ArpStep> {
        if !self.running || self.pool.is_empty() {
            return None;
        }
        let index = self.advance();
        let note = self.pool[index];

        let interval = self.interval_secs();
        let swing = if self.tick_count % 2 == 1 {
            self.swing_percent / 100.0 * interval / 2.0
        } else {
            0.0
        };
        self.tick_count += 1;

        let step = ArpStep {
            index,
            note,
            time: time + swing,
            duration: self.gate_percent / 100.0 * interval,
        };
        match voices.trigger_note_for(note, step.duration, step.time) {
            Ok(token) => self.sounding = Some(token),
            Err(e) => log::debug!(target: "modsynth::arp", "step {} ({}) dropped: {}", index, note, e),
        }
        Some(step)
    }

    fn advance(&mut self) -> usize {
        let n = self.pool.len();
        if self.fresh {
            self.fresh = false;
            self.current_index = 0;
            return 0;
        }
        self.current_index = match self.direction {
            ArpDirection::Up => (self.current_index + 1) % n,
            ArpDirection::Down => (self.current_index + n - 1) % n,
            ArpDirection::UpDown => {
                if n <= 1 {
                    0
                } else if self.ascending {
                    if self.current_index + 1 >= n {
                        self.ascending = false;
                        n - 2
                    } else {
                        self.current_index + 1
                    }
                } else if self.current_index == 0 {
                    self.ascending = true;
                    1
                } else {
                    self.current_index - 1
                }
            }
            ArpDirection::Random => {
                if n <= 1 {
                    0
                } else {
                    // uniform over the other n-1 indices
                    let r = (self.next_random() as usize) % (n - 1);
                    if r >= self.current_index { r + 1 } else { r }
                }
            }
        };
        self.current_index
    }

    fn next_random(&mut self) -> u64 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.rng_state >> 33
    }

    // ─── Settings ───────────────────────────────────────────────────

    pub fn set_direction(&mut self, direction: ArpDirection) {
        self.direction = direction;
        if direction == ArpDirection::UpDown {
            self.ascending = true;
        }
    }

    /// Set the step rate in BPM, clamped to [`RATE_RANGE`]. Non-finite
    /// input is ignored.
    pub fn set_rate(&mut self, rate_bpm: f64) {
        if rate_bpm.is_finite() {
            self.rate_bpm = rate_bpm.clamp(*RATE_RANGE.start(), *RATE_RANGE.end());
        }
    }

    pub fn set_gate(&mut self, gate_percent: f64) {
        if gate_percent.is_finite() {
            self.gate_percent = gate_percent.clamp(0.0, 100.0);
        }
    }

    pub fn set_swing(&mut self, swing_percent: f64) {
        if swing_percent.is_finite() {
            self.swing_percent = swing_percent.clamp(0.0, 100.0);
        }
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Seconds between ticks: one step per beat at `rate`.
    pub fn interval_secs(&self) -> f64 {
        60.0 / self.rate_bpm
    }

    pub fn pool(&self) -> &[Note] {
        &self.pool
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The note this arpeggiator is sounding, until its gate closes or it
    /// is released.
    pub fn sounding(&self, voices: &VoiceLifecycleManager) -> Option<Note> {
        self.sounding
            .filter(|token| voices.is_held(*token))
            .map(|token| token.note)
    }

    pub fn direction(&self) -> ArpDirection {
        self.direction
    }

    pub fn rate(&self) -> f64 {
        self.rate_bpm
    }

    pub fn gate(&self) -> f64 {
        self.gate_percent
    }

    pub fn swing(&self) -> f64 {
        self.swing_percent
    }
}
