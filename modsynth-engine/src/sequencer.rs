//! 16-step melodic sequencer and drum machine pattern holders.
//!
//! Both only own pattern data and a running flag; the transport decides
//! when a step is evaluated.

use modsynth_types::{DrumLane, DrumPattern, Note, SequencerStep, STEP_COUNT};

#[derive(Debug, Clone)]
pub struct StepSequencer {
    steps: [SequencerStep; STEP_COUNT],
    running: bool,
    /// Fraction of the step a note is held, 0..100.
    gate_percent: f64,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSequencer {
    pub fn new() -> Self {
        Self {
            steps: SequencerStep::default_pattern(),
            running: false,
            gate_percent: 100.0,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Note to play at `index`, if the sequencer is running and the step is on.
    pub fn evaluate(&self, index: usize) -> Option<Note> {
        if !self.running {
            return None;
        }
        self.steps.get(index).filter(|s| s.enabled).map(|s| s.note)
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(step) = self.steps.get_mut(index) {
            step.enabled = !step.enabled;
        }
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(step) = self.steps.get_mut(index) {
            step.enabled = enabled;
        }
    }

    pub fn set_note(&mut self, index: usize, note: Note) {
        if let Some(step) = self.steps.get_mut(index) {
            step.note = note;
        }
    }

    /// Disable every step, keeping notes.
    pub fn clear(&mut self) {
        for step in &mut self.steps {
            step.enabled = false;
        }
    }

    pub fn step(&self, index: usize) -> Option<&SequencerStep> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[SequencerStep; STEP_COUNT] {
        &self.steps
    }

    /// Overwrite steps from a stored pattern. Steps are placed by position;
    /// missing ones keep their current value and extras are dropped.
    pub fn load(&mut self, steps: &[SequencerStep]) {
        for (i, (slot, stored)) in self.steps.iter_mut().zip(steps).enumerate() {
            *slot = SequencerStep {
                index: i,
                ..*stored
            };
        }
    }

    pub fn gate(&self) -> f64 {
        self.gate_percent
    }

    pub fn set_gate(&mut self, gate_percent: f64) {
        if gate_percent.is_finite() {
            self.gate_percent = gate_percent.clamp(0.0, 100.0);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrumMachine {
    pattern: DrumPattern,
    running: bool,
}

impl DrumMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Lanes to fire at `step`; empty while stopped.
    pub fn evaluate(&self, step: usize) -> Vec<DrumLane> {
        if !self.running {
            return Vec::new();
        }
        self.pattern.lanes_at(step).collect()
    }

    pub fn toggle(&mut self, lane: DrumLane, step: usize) {
        let on = self.pattern.is_set(lane, step);
        self.pattern.set(lane, step, !on);
    }

    pub fn set(&mut self, lane: DrumLane, step: usize, on: bool) {
        self.pattern.set(lane, step, on);
    }

    pub fn clear(&mut self) {
        self.pattern = DrumPattern::default();
    }

    pub fn pattern(&self) -> &DrumPattern {
        &self.pattern
    }

    /// Overwrite one lane; same length tolerance as [`StepSequencer::load`].
    pub fn load_lane(&mut self, lane: DrumLane, steps: &[bool]) {
        for (i, on) in steps.iter().take(STEP_COUNT).enumerate() {
            self.pattern.set(lane, i, *on);
        }
    }
}
