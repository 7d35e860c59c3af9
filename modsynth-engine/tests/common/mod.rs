#![allow(dead_code)]
//! Test harness utilities for modsynth-engine integration tests.

use std::sync::Arc;

use modsynth_engine::{Config, ManualClock, TestBackend, TransportEvent, Workstation};
use modsynth_types::Note;

/// A workstation on the embedded default config, recording into a shared
/// `TestBackend`.
pub fn make_workstation() -> (Workstation<ManualClock>, Arc<TestBackend>) {
    make_workstation_with(&Config::load_from(None))
}

pub fn make_workstation_with(config: &Config) -> (Workstation<ManualClock>, Arc<TestBackend>) {
    let backend = Arc::new(TestBackend::new());
    let ws = Workstation::new(config, Box::new(Arc::clone(&backend)), ManualClock::new());
    (ws, backend)
}

/// Advance the clock to `until`, delivering every firing and running due
/// timers. Returns the transport events produced on the way.
pub fn drive_until(ws: &mut Workstation<ManualClock>, until: f64) -> Vec<TransportEvent> {
    let firings = ws.clock_mut().advance_to(until);
    let mut events = Vec::new();
    for firing in firings {
        events.extend(ws.on_clock_tick(firing.handle, firing.time));
    }
    ws.poll(until);
    events
}

/// Step indices of the `Step` events, in order.
pub fn steps(events: &[TransportEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            TransportEvent::Step { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

pub fn note(name: &str) -> Note {
    name.parse().unwrap()
}

/// Small deterministic generator for interleaving tests.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}
