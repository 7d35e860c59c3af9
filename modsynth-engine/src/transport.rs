//! Transport scheduler: the step clock that drives sequencer, drums and
//! arpeggiator.
//!
//! Two repeating registrations live on the external clock while playing:
//! the step tick (one per eighth note at the transport tempo) and the
//! arpeggiator tick (at the arpeggiator's own rate). Firings are delivered
//! back through [`TransportScheduler::on_clock_tick`]; firings for handles
//! no longer owned are dropped.

use std::ops::RangeInclusive;

use crossbeam_channel::{Receiver, Sender};
use modsynth_types::{DrumLane, Note, STEP_COUNT};

use crate::arpeggiator::{ArpStep, Arpeggiator};
use crate::clock::{TickHandle, TransportClock};
use crate::sequencer::{DrumMachine, StepSequencer};
use crate::voices::VoiceLifecycleManager;

pub const BPM_RANGE: RangeInclusive<f64> = 20.0..=300.0;

/// What happened on one clock firing, for display collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    /// The playhead moved; `note` is set when the sequencer played one.
    Step {
        index: usize,
        time: f64,
        note: Option<Note>,
    },
    Drum {
        lane: DrumLane,
        step: usize,
        time: f64,
    },
    Arp(ArpStep),
}

pub struct TransportScheduler {
    bpm: f64,
    step_index: Option<usize>,
    step_handle: Option<TickHandle>,
    arp_handle: Option<TickHandle>,
    sequencer: StepSequencer,
    drums: DrumMachine,
    arpeggiator: Arpeggiator,
    observers: Vec<Sender<TransportEvent>>,
}

impl TransportScheduler {
    pub fn new(bpm: f64, arpeggiator: Arpeggiator) -> Self {
        let mut transport = Self {
            bpm: 120.0,
            step_index: None,
            step_handle: None,
            arp_handle: None,
            sequencer: StepSequencer::new(),
            drums: DrumMachine::new(),
            arpeggiator,
            observers: Vec::new(),
        };
        transport.bpm = transport.clamp_bpm(bpm);
        transport
    }

    fn clamp_bpm(&self, bpm: f64) -> f64 {
        if bpm.is_finite() {
            bpm.clamp(*BPM_RANGE.start(), *BPM_RANGE.end())
        } else {
            self.bpm
        }
    }

    /// Seconds per step: an eighth note.
    pub fn step_interval_secs(&self) -> f64 {
        60.0 / self.bpm / 2.0
    }

    // ─── Play state ─────────────────────────────────────────────────

    /// Start (or restart) the clock. Previously owned registrations are
    /// cancelled before new ones are made, and the next step is step 0.
    pub fn start(&mut self, clock: &mut dyn TransportClock) {
        self.cancel_handles(clock);
        let now = clock.now();
        self.step_index = None;
        self.step_handle = Some(clock.schedule_repeating(self.step_interval_secs(), now));
        self.arp_handle = Some(clock.schedule_repeating(self.arpeggiator.interval_secs(), now));
        log::info!(target: "modsynth::transport", "started at {:.1} BPM", self.bpm);
    }

    /// Stop the clock and release the arpeggiator's sounding note.
    pub fn stop(&mut self, clock: &mut dyn TransportClock, voices: &mut VoiceLifecycleManager) {
        self.cancel_handles(clock);
        self.step_index = None;
        self.arpeggiator.release(clock.now(), voices);
        log::info!(target: "modsynth::transport", "stopped");
    }

    fn cancel_handles(&mut self, clock: &mut dyn TransportClock) {
        if let Some(handle) = self.step_handle.take() {
            clock.cancel_repeating(handle);
        }
        if let Some(handle) = self.arp_handle.take() {
            clock.cancel_repeating(handle);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.step_handle.is_some()
    }

    /// Current step, `None` before the first tick after a start.
    pub fn position(&self) -> Option<usize> {
        self.step_index
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Change tempo; while playing the step tick is re-armed at the new
    /// interval, continuing one interval from now.
    pub fn set_bpm(&mut self, bpm: f64, clock: &mut dyn TransportClock) {
        self.bpm = self.clamp_bpm(bpm);
        if let Some(old) = self.step_handle.take() {
            clock.cancel_repeating(old);
            let interval = self.step_interval_secs();
            self.step_handle = Some(clock.schedule_repeating(interval, clock.now() + interval));
        }
    }

    /// Change the arpeggiator rate, re-arming its tick while playing.
    pub fn set_arp_rate(&mut self, rate_bpm: f64, clock: &mut dyn TransportClock) {
        self.arpeggiator.set_rate(rate_bpm);
        if let Some(old) = self.arp_handle.take() {
            clock.cancel_repeating(old);
            let interval = self.arpeggiator.interval_secs();
            self.arp_handle = Some(clock.schedule_repeating(interval, clock.now() + interval));
        }
    }

    // ─── Ticks ──────────────────────────────────────────────────────

    /// Handle one clock firing. Returns what was played.
    pub fn on_clock_tick(
        &mut self,
        handle: TickHandle,
        time: f64,
        voices: &mut VoiceLifecycleManager,
    ) -> Vec<TransportEvent> {
        let events = if Some(handle) == self.step_handle {
            self.on_step(time, voices)
        } else if Some(handle) == self.arp_handle {
            self.arpeggiator
                .on_tick(time, voices)
                .map(TransportEvent::Arp)
                .into_iter()
                .collect()
        } else {
            log::trace!(target: "modsynth::transport", "ignoring stale tick {:?} @{:.3}", handle, time);
            return Vec::new();
        };
        for event in &events {
            self.observers.retain(|tx| tx.send(*event).is_ok());
        }
        events
    }

    fn on_step(&mut self, time: f64, voices: &mut VoiceLifecycleManager) -> Vec<TransportEvent> {
        let index = self.step_index.map_or(0, |s| (s + 1) % STEP_COUNT);
        self.step_index = Some(index);

        let mut events = Vec::new();
        let note = self.sequencer.evaluate(index);
        if let Some(note) = note {
            let duration = self.step_interval_secs() * self.sequencer.gate() / 100.0;
            if let Err(e) = voices.trigger_note_for(note, duration, time) {
                log::debug!(target: "modsynth::transport", "step {} ({}) dropped: {}", index, note, e);
            }
        }
        events.push(TransportEvent::Step { index, time, note });

        for lane in self.drums.evaluate(index) {
            voices.trigger_drum(lane, time);
            events.push(TransportEvent::Drum { lane, step: index, time });
        }
        events
    }

    // ─── Components ─────────────────────────────────────────────────

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut StepSequencer {
        &mut self.sequencer
    }

    pub fn drums(&self) -> &DrumMachine {
        &self.drums
    }

    pub fn drums_mut(&mut self) -> &mut DrumMachine {
        &mut self.drums
    }

    pub fn arpeggiator(&self) -> &Arpeggiator {
        &self.arpeggiator
    }

    /// Rate changes made here take effect at the next start; use
    /// [`set_arp_rate`](Self::set_arp_rate) while playing.
    pub fn arpeggiator_mut(&mut self) -> &mut Arpeggiator {
        &mut self.arpeggiator
    }

    pub fn subscribe(&mut self) -> Receiver<TransportEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.observers.push(tx);
        rx
    }
}
