//! Voice engine lifecycle: creation, supersession and deferred disposal.
//!
//! Every voice engine instance is a *generation* that moves through
//! `Active -> Superseded -> Disposed`. Exactly one generation is current.
//! A replaced generation keeps sounding its release tail and is only freed
//! once no notes are held on it and its disposal deadline has passed.
//! Deadlines are cancellable timers checked from `poll`, never blocking
//! waits.

use std::collections::BTreeMap;

use crossbeam_channel::{Receiver, Sender};
use modsynth_types::{DrumLane, GenerationId, Note, VoiceEngineConfig};

use crate::backend::{AudioBackend, EngineRef};
use crate::error::{EngineError, EngineResult};
use crate::modulation::ParameterSink;
use crate::registry::ParameterEntry;
use crate::timers::{TimerId, TimerQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Active,
    Superseded,
    Disposed,
}

/// Read-only view of one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceEngineHandle {
    pub generation: GenerationId,
    pub engine: EngineRef,
    pub state: GenerationState,
    pub active_note_count: usize,
}

/// Note lifecycle notification for display collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteEvent {
    Attack {
        generation: GenerationId,
        note: Note,
        time: f64,
    },
    Release {
        generation: GenerationId,
        note: Note,
        time: f64,
    },
}

/// One attack on one generation. Releasing through the token targets that
/// attack only, even when the same pitch is held elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteToken {
    pub generation: GenerationId,
    pub note: Note,
    attack: u64,
}

/// Timing of deferred disposal, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisposalTiming {
    /// Lower bound on the first disposal check after supersession.
    pub min_deadline: f64,
    /// Added to the release time before the first check.
    pub release_margin: f64,
    /// Delay between re-checks while notes are still held.
    pub followup: f64,
    /// After this long superseded, held notes are forced off.
    pub max_wait: f64,
}

impl Default for DisposalTiming {
    fn default() -> Self {
        Self {
            min_deadline: 0.5,
            release_margin: 0.1,
            followup: 0.1,
            max_wait: 10.0,
        }
    }
}

impl DisposalTiming {
    /// Delay from supersession to the first disposal check.
    pub fn deadline_for(&self, release_secs: f64) -> f64 {
        self.min_deadline.max(release_secs.max(0.0) + self.release_margin)
    }
}

struct HeldNote {
    attack: u64,
    note: Note,
    /// Gate timer of a timed note.
    release_timer: Option<TimerId>,
}

struct Generation {
    engine: EngineRef,
    state: GenerationState,
    /// One entry per attack; the same pitch may appear more than once.
    held: Vec<HeldNote>,
    superseded_at: Option<f64>,
    disposal_timer: Option<TimerId>,
}

enum Pending {
    Disposal(GenerationId),
    Release { token: NoteToken, at: f64 },
}

pub struct VoiceLifecycleManager {
    backend: Box<dyn AudioBackend>,
    /// Used when a generation has to be recreated without an explicit config.
    config: VoiceEngineConfig,
    release_secs: f64,
    timing: DisposalTiming,
    next_generation: u64,
    next_attack: u64,
    current: Option<GenerationId>,
    generations: BTreeMap<GenerationId, Generation>,
    timers: TimerQueue<Pending>,
    creation_failure: Option<String>,
    observers: Vec<Sender<NoteEvent>>,
}

impl VoiceLifecycleManager {
    pub fn new(backend: Box<dyn AudioBackend>, config: VoiceEngineConfig, timing: DisposalTiming) -> Self {
        let release_secs = config.release_secs();
        Self {
            backend,
            config,
            release_secs,
            timing,
            next_generation: 1,
            next_attack: 0,
            current: None,
            generations: BTreeMap::new(),
            timers: TimerQueue::new(),
            creation_failure: None,
            observers: Vec::new(),
        }
    }

    // ─── Generations ────────────────────────────────────────────────

    /// Build a new voice engine and make it current. The previous current
    /// generation, if any, is superseded in the same step.
    ///
    /// On failure the previous generation stays current and the failure is
    /// latched (see [`creation_failure`](Self::creation_failure)).
    pub fn create_generation(&mut self, config: VoiceEngineConfig, now: f64) -> EngineResult<VoiceEngineHandle> {
        let engine = match self.backend.create_voice_engine(&config) {
            Ok(engine) => engine,
            Err(e) => {
                if self.creation_failure.is_none() {
                    log::error!(target: "modsynth::voices", "voice engine creation failed: {}", e);
                }
                self.creation_failure = Some(e.0.clone());
                return Err(EngineError::CreationFailed(e.0));
            }
        };
        self.creation_failure = None;

        let id = GenerationId::new(self.next_generation);
        self.next_generation += 1;
        self.generations.insert(
            id,
            Generation {
                engine,
                state: GenerationState::Active,
                held: Vec::new(),
                superseded_at: None,
                disposal_timer: None,
            },
        );
        let previous = self.current.replace(id);
        log::info!(target: "modsynth::voices", "{} is current ({})", id, engine);

        // the outgoing generation's tail uses the release time it was playing with
        if let Some(previous) = previous {
            self.supersede_generation(previous, now);
        }
        self.release_secs = config.release_secs();
        self.config = config;
        self.handle(id)
            .ok_or_else(|| EngineError::EngineUnavailable(format!("{} vanished", id)))
    }

    /// Retire the current generation. No generation is current afterwards
    /// until one is created, explicitly or by recovery on the next note.
    pub fn supersede(&mut self, now: f64) {
        if let Some(id) = self.current.take() {
            self.supersede_generation(id, now);
        }
    }

    fn supersede_generation(&mut self, id: GenerationId, now: f64) {
        let deadline = self.timing.deadline_for(self.release_secs);
        let Some(generation) = self.generations.get_mut(&id) else {
            return;
        };
        if generation.state != GenerationState::Active {
            return;
        }
        generation.state = GenerationState::Superseded;
        generation.superseded_at = Some(now);

        if let Err(e) = self.backend.trigger_release(generation.engine, None, now) {
            log::warn!(target: "modsynth::voices", "release-all on {} failed: {}", id, e);
        }
        if let Some(old) = generation.disposal_timer.take() {
            self.timers.cancel(old);
        }
        generation.disposal_timer = Some(self.timers.schedule(now + deadline, Pending::Disposal(id)));
        log::debug!(
            target: "modsynth::voices",
            "{} superseded with {} held notes, first disposal check in {:.0} ms",
            id,
            generation.held.len(),
            deadline * 1000.0
        );
    }

    /// Run every timer due at `now`: disposal checks and timed note releases.
    pub fn poll(&mut self, now: f64) {
        for (_, pending) in self.timers.drain_due(now) {
            match pending {
                Pending::Disposal(id) => self.on_disposal_due(id, now),
                // released at its scheduled time, however late the poll
                Pending::Release { token, at } => {
                    self.release_token(token, at);
                }
            }
        }
    }

    fn on_disposal_due(&mut self, id: GenerationId, now: f64) {
        let timing = self.timing;
        let Some(generation) = self.generations.get_mut(&id) else {
            return;
        };
        generation.disposal_timer = None;
        if generation.state != GenerationState::Superseded {
            return;
        }

        if !generation.held.is_empty() {
            let waited = generation.superseded_at.map_or(0.0, |at| now - at);
            if waited < timing.max_wait {
                generation.disposal_timer = Some(self.timers.schedule(now + timing.followup, Pending::Disposal(id)));
                return;
            }
            log::warn!(
                target: "modsynth::voices",
                "{} still holds {} notes after {:.1}s; forcing release",
                id,
                generation.held.len(),
                waited
            );
            let engine = generation.engine;
            let stuck: Vec<HeldNote> = generation.held.drain(..).collect();
            for HeldNote { note, release_timer, .. } in stuck {
                if let Some(timer) = release_timer {
                    self.timers.cancel(timer);
                }
                if let Err(e) = self.backend.trigger_release(engine, Some(note), now) {
                    log::warn!(target: "modsynth::voices", "forced release of {} failed: {}", note, e);
                }
                self.notify(NoteEvent::Release { generation: id, note, time: now });
            }
        }
        self.dispose(id);
    }

    fn dispose(&mut self, id: GenerationId) {
        let Some(generation) = self.generations.remove(&id) else {
            return;
        };
        debug_assert!(generation.held.is_empty());
        if let Err(e) = self.backend.dispose_voice_engine(generation.engine) {
            log::warn!(target: "modsynth::voices", "disposing {} failed: {}", id, e);
        }
        log::debug!(target: "modsynth::voices", "{} disposed", id);
    }

    /// Forget the current generation after the backend reported it dead.
    fn abandon_current(&mut self, time: f64) {
        if let Some(id) = self.current.take() {
            if let Some(generation) = self.generations.remove(&id) {
                if let Some(timer) = generation.disposal_timer {
                    self.timers.cancel(timer);
                }
                for held in generation.held {
                    if let Some(timer) = held.release_timer {
                        self.timers.cancel(timer);
                    }
                    self.notify(NoteEvent::Release { generation: id, note: held.note, time });
                }
            }
            log::warn!(target: "modsynth::voices", "{} abandoned after backend failure", id);
        }
    }

    /// The current generation, recreating one if none is live and no
    /// creation failure is latched.
    fn ensure_current(&mut self, now: f64) -> EngineResult<GenerationId> {
        if let Some(id) = self.current {
            return Ok(id);
        }
        if let Some(reason) = &self.creation_failure {
            return Err(EngineError::EngineUnavailable(format!(
                "voice engine failed to start ({}); waiting for user retry",
                reason
            )));
        }
        log::info!(target: "modsynth::voices", "no current voice engine; recreating");
        let config = self.config.clone();
        self.create_generation(config, now).map(|h| h.generation)
    }

    // ─── Notes ──────────────────────────────────────────────────────

    /// Start `note` on the current generation.
    ///
    /// If the backend rejects the call, the generation is abandoned, a new
    /// one is created and the note retried once.
    pub fn trigger_note(&mut self, note: Note, time: f64) -> EngineResult<GenerationId> {
        self.start_note(note, time).map(|token| token.generation)
    }

    /// Like [`trigger_note`](Self::trigger_note), returning the attack's token.
    pub fn start_note(&mut self, note: Note, time: f64) -> EngineResult<NoteToken> {
        match self.try_attack(note, time) {
            Ok(id) => Ok(id),
            Err(EngineError::EngineUnavailable(reason)) if self.creation_failure.is_none() => {
                log::warn!(target: "modsynth::voices", "attack {} failed ({}); retrying on a new engine", note, reason);
                self.abandon_current(time);
                self.try_attack(note, time)
            }
            Err(e) => {
                // the latched failure was reported once already
                if self.creation_failure.is_some() {
                    log::trace!(target: "modsynth::voices", "attack {} dropped: {}", note, e);
                } else {
                    log::warn!(target: "modsynth::voices", "attack {} dropped: {}", note, e);
                }
                Err(e)
            }
        }
    }

    fn try_attack(&mut self, note: Note, time: f64) -> EngineResult<NoteToken> {
        let id = self.ensure_current(time)?;
        let generation = self
            .generations
            .get_mut(&id)
            .ok_or_else(|| EngineError::EngineUnavailable(format!("{} is gone", id)))?;
        self.backend.trigger_attack(generation.engine, note, time)?;
        let attack = self.next_attack;
        self.next_attack += 1;
        generation.held.push(HeldNote {
            attack,
            note,
            release_timer: None,
        });
        self.notify(NoteEvent::Attack { generation: id, note, time });
        Ok(NoteToken {
            generation: id,
            note,
            attack,
        })
    }

    /// Start `note` only if `generation` is still the current, active one.
    pub fn trigger_note_on(&mut self, generation: GenerationId, note: Note, time: f64) -> EngineResult<GenerationId> {
        match self.generation_state(generation) {
            Some(GenerationState::Active) if self.current == Some(generation) => self.trigger_note(note, time),
            state => {
                log::debug!(target: "modsynth::voices", "rejecting {} on {} ({:?})", note, generation, state);
                Err(EngineError::EngineUnavailable(format!("{} is not current", generation)))
            }
        }
    }

    /// Start `note` and schedule its release `duration` seconds later.
    pub fn trigger_note_for(&mut self, note: Note, duration: f64, time: f64) -> EngineResult<NoteToken> {
        let token = self.start_note(note, time)?;
        let at = time + duration.max(0.0);
        let timer = self.timers.schedule(at, Pending::Release { token, at });
        if let Some(held) = self.held_mut(token) {
            held.release_timer = Some(timer);
        }
        Ok(token)
    }

    /// Release exactly the attack behind `token`, cancelling its gate timer.
    /// Returns false if that attack already ended.
    pub fn release_token(&mut self, token: NoteToken, time: f64) -> bool {
        let Some(generation) = self.generations.get(&token.generation) else {
            return false;
        };
        match generation.held.iter().position(|h| h.attack == token.attack) {
            Some(pos) => {
                self.release_at(token.generation, pos, time);
                true
            }
            None => false,
        }
    }

    /// Whether the attack behind `token` is still held.
    pub fn is_held(&self, token: NoteToken) -> bool {
        self.generations
            .get(&token.generation)
            .is_some_and(|g| g.held.iter().any(|h| h.attack == token.attack))
    }

    /// Release `note` on whichever generation holds it, current first.
    /// Untimed attacks (keys) are released before timed ones. Releasing a
    /// note that is not held is a no-op.
    pub fn release_note(&mut self, note: Note, time: f64) {
        let holder = self
            .current
            .filter(|id| self.holds(*id, note))
            .or_else(|| {
                self.generations
                    .iter()
                    .find(|(_, g)| g.held.iter().any(|h| h.note == note))
                    .map(|(id, _)| *id)
            });
        let Some(id) = holder else {
            log::trace!(target: "modsynth::voices", "release {} ignored: not held", note);
            return;
        };
        let Some(generation) = self.generations.get(&id) else {
            return;
        };
        let untimed = generation
            .held
            .iter()
            .rposition(|h| h.note == note && h.release_timer.is_none());
        let pos = untimed.or_else(|| generation.held.iter().position(|h| h.note == note));
        if let Some(pos) = pos {
            self.release_at(id, pos, time);
        }
    }

    fn holds(&self, id: GenerationId, note: Note) -> bool {
        self.generations
            .get(&id)
            .is_some_and(|g| g.held.iter().any(|h| h.note == note))
    }

    fn held_mut(&mut self, token: NoteToken) -> Option<&mut HeldNote> {
        self.generations
            .get_mut(&token.generation)?
            .held
            .iter_mut()
            .find(|h| h.attack == token.attack)
    }

    fn release_at(&mut self, id: GenerationId, pos: usize, time: f64) {
        let Some(generation) = self.generations.get_mut(&id) else {
            return;
        };
        let held = generation.held.remove(pos);
        if let Some(timer) = held.release_timer {
            self.timers.cancel(timer);
        }
        if let Err(e) = self.backend.trigger_release(generation.engine, Some(held.note), time) {
            log::warn!(target: "modsynth::voices", "release {} on {} failed: {}", held.note, id, e);
        }
        self.notify(NoteEvent::Release { generation: id, note: held.note, time });
    }

    /// Fire a drum voice. Drums are one-shots outside the generation
    /// lifecycle; failures are logged and dropped.
    pub fn trigger_drum(&self, lane: DrumLane, time: f64) {
        if let Err(e) = self.backend.trigger_drum(lane, time) {
            log::warn!(target: "modsynth::voices", "drum {} failed: {}", lane.name(), e);
        }
    }

    // ─── Queries ────────────────────────────────────────────────────

    pub fn current(&self) -> Option<VoiceEngineHandle> {
        self.current.and_then(|id| self.handle(id))
    }

    pub fn handle(&self, id: GenerationId) -> Option<VoiceEngineHandle> {
        self.generations.get(&id).map(|g| VoiceEngineHandle {
            generation: id,
            engine: g.engine,
            state: g.state,
            active_note_count: g.held.len(),
        })
    }

    /// State of any generation ever created; `None` for ids never issued.
    pub fn generation_state(&self, id: GenerationId) -> Option<GenerationState> {
        match self.generations.get(&id) {
            Some(g) => Some(g.state),
            None if id.get() > 0 && id.get() < self.next_generation => Some(GenerationState::Disposed),
            None => None,
        }
    }

    /// Superseded generations still waiting for disposal.
    pub fn pending_disposals(&self) -> usize {
        self.generations
            .values()
            .filter(|g| g.state == GenerationState::Superseded)
            .count()
    }

    pub fn creation_failure(&self) -> Option<&str> {
        self.creation_failure.as_deref()
    }

    /// Acknowledge a creation failure so the next note may recreate.
    pub fn clear_failure(&mut self) {
        self.creation_failure = None;
    }

    pub fn config(&self) -> &VoiceEngineConfig {
        &self.config
    }

    /// Release time used for the next supersession's disposal deadline.
    pub fn set_release_secs(&mut self, secs: f64) {
        self.release_secs = secs.max(0.0);
    }

    pub fn next_timer_due(&self) -> Option<f64> {
        self.timers.next_due()
    }

    // ─── Observers ──────────────────────────────────────────────────

    /// Receive every attack and release from now on.
    pub fn subscribe(&mut self) -> Receiver<NoteEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.observers.push(tx);
        rx
    }

    fn notify(&mut self, event: NoteEvent) {
        self.observers.retain(|tx| tx.send(event).is_ok());
    }
}

impl ParameterSink for VoiceLifecycleManager {
    fn write_parameter(&mut self, entry: &ParameterEntry, value: f64) -> EngineResult {
        let handle = self
            .current()
            .ok_or_else(|| EngineError::EngineUnavailable("no current voice engine".to_string()))?;
        self.backend
            .set_parameter(handle.engine, &entry.apply.path, entry.engine_value(value))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{TestBackend, TestOp};
    use std::sync::Arc;

    fn note(s: &str) -> Note {
        s.parse().unwrap()
    }

    fn manager() -> (VoiceLifecycleManager, Arc<TestBackend>) {
        let backend = Arc::new(TestBackend::new());
        let config = VoiceEngineConfig::default(); // release 0.8s
        let mgr = VoiceLifecycleManager::new(Box::new(Arc::clone(&backend)), config, DisposalTiming::default());
        (mgr, backend)
    }

    #[test]
    fn deadline_respects_floor_and_release() {
        let t = DisposalTiming::default();
        assert!((t.deadline_for(0.1) - 0.5).abs() < 1e-12);
        assert!((t.deadline_for(2.0) - 2.1).abs() < 1e-12);
    }

    #[test]
    fn create_makes_new_generation_current_and_supersedes_old() {
        let (mut mgr, _backend) = manager();
        let first = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        let second = mgr.create_generation(VoiceEngineConfig::default(), 1.0).unwrap();

        assert!(second.generation > first.generation);
        assert_eq!(mgr.current().unwrap().generation, second.generation);
        assert_eq!(mgr.generation_state(first.generation), Some(GenerationState::Superseded));
    }

    #[test]
    fn superseded_generation_rejects_targeted_triggers() {
        let (mut mgr, backend) = manager();
        let first = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        backend.clear();

        assert!(mgr.trigger_note_on(first.generation, note("C4"), 0.1).is_err());
        assert!(backend.attacks().is_empty());
    }

    #[test]
    fn disposal_waits_for_deadline_then_frees() {
        let (mut mgr, backend) = manager();
        let first = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.create_generation(VoiceEngineConfig::default(), 1.0).unwrap();

        mgr.poll(1.85);
        assert!(backend.disposed().is_empty());
        mgr.poll(1.95);
        assert_eq!(backend.disposed(), vec![first.engine]);
        assert_eq!(mgr.generation_state(first.generation), Some(GenerationState::Disposed));
        assert_eq!(mgr.pending_disposals(), 0);
    }

    #[test]
    fn disposal_defers_while_notes_are_held() {
        let (mut mgr, backend) = manager();
        let first = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.trigger_note(note("C4"), 0.0).unwrap();
        mgr.trigger_note(note("E4"), 0.0).unwrap();
        mgr.create_generation(VoiceEngineConfig::default(), 1.0).unwrap();
        assert_eq!(mgr.handle(first.generation).unwrap().active_note_count, 2);

        mgr.poll(2.0);
        mgr.release_note(note("C4"), 2.5);
        mgr.poll(3.0);
        assert!(backend.disposed().is_empty());
        assert_eq!(mgr.handle(first.generation).unwrap().active_note_count, 1);

        mgr.release_note(note("E4"), 3.2);
        mgr.poll(3.35);
        assert_eq!(backend.disposed(), vec![first.engine]);
    }

    #[test]
    fn stuck_notes_are_forced_off_after_max_wait() {
        let (mut mgr, backend) = manager();
        let first = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.trigger_note(note("A3"), 0.0).unwrap();
        mgr.supersede(0.0);

        for i in 1..=99 {
            mgr.poll(i as f64 * 0.1);
        }
        assert!(backend.disposed().is_empty());
        mgr.poll(10.5);
        assert_eq!(backend.disposed(), vec![first.engine]);
        assert!(backend.count(|op| matches!(op, TestOp::Release { note: Some(_), .. })) == 1);
    }

    #[test]
    fn trigger_after_supersede_recreates_lazily() {
        let (mut mgr, backend) = manager();
        let first = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.supersede(0.0);
        assert!(mgr.current().is_none());

        let generation = mgr.trigger_note(note("G4"), 0.2).unwrap();
        assert_ne!(generation, first.generation);
        assert_eq!(mgr.current().unwrap().active_note_count, 1);
        assert_eq!(backend.count(|op| matches!(op, TestOp::CreateEngine { .. })), 2);
    }

    #[test]
    fn backend_failure_recovers_once_on_new_engine() {
        let (mut mgr, backend) = manager();
        let first = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        // engine torn down underneath us
        backend.dispose_voice_engine(first.engine).unwrap();

        let generation = mgr.trigger_note(note("C4"), 0.1).unwrap();
        assert_ne!(generation, first.generation);
        assert_eq!(backend.attacks(), vec![note("C4")]);
    }

    #[test]
    fn creation_failure_latches_without_retry_storm() {
        let (mut mgr, backend) = manager();
        backend.set_fail_create(true);
        assert!(matches!(
            mgr.create_generation(VoiceEngineConfig::default(), 0.0),
            Err(EngineError::CreationFailed(_))
        ));
        assert!(mgr.creation_failure().is_some());

        backend.set_fail_create(false);
        for i in 0..16 {
            assert!(mgr.trigger_note(note("C4"), i as f64 * 0.1).is_err());
        }
        assert_eq!(backend.count(|op| matches!(op, TestOp::CreateEngine { .. })), 0);

        // explicit user action retries
        mgr.create_generation(VoiceEngineConfig::default(), 2.0).unwrap();
        assert!(mgr.creation_failure().is_none());
        assert!(mgr.trigger_note(note("C4"), 2.1).is_ok());
    }

    #[test]
    fn failed_creation_keeps_previous_generation_current() {
        let (mut mgr, backend) = manager();
        let first = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        backend.set_fail_create(true);
        assert!(mgr.create_generation(VoiceEngineConfig::default(), 1.0).is_err());
        assert_eq!(mgr.current().unwrap().generation, first.generation);
        assert_eq!(mgr.current().unwrap().state, GenerationState::Active);
    }

    #[test]
    fn timed_note_releases_on_poll() {
        let (mut mgr, backend) = manager();
        mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.trigger_note_for(note("D4"), 0.25, 1.0).unwrap();
        mgr.poll(1.2);
        assert_eq!(mgr.current().unwrap().active_note_count, 1);
        mgr.poll(1.25);
        assert_eq!(mgr.current().unwrap().active_note_count, 0);
        assert!(backend.operations().contains(&TestOp::Release {
            engine: mgr.current().unwrap().engine,
            note: Some(note("D4")),
            time: 1.25,
        }));
    }

    #[test]
    fn early_release_cancels_gate_timer() {
        let (mut mgr, _backend) = manager();
        mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.trigger_note_for(note("C4"), 1.0, 0.0).unwrap();
        mgr.release_note(note("C4"), 0.1);

        // a later key on the same pitch is not cut off by the old gate
        mgr.trigger_note(note("C4"), 0.2).unwrap();
        mgr.poll(1.0);
        assert_eq!(mgr.current().unwrap().active_note_count, 1);
        assert_eq!(mgr.next_timer_due(), None);
    }

    #[test]
    fn token_release_targets_one_attack() {
        let (mut mgr, backend) = manager();
        mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.trigger_note(note("C4"), 0.0).unwrap();
        let token = mgr.trigger_note_for(note("C4"), 1.0, 0.0).unwrap();
        assert_eq!(mgr.current().unwrap().active_note_count, 2);

        assert!(mgr.release_token(token, 0.1));
        assert!(!mgr.is_held(token));
        assert!(!mgr.release_token(token, 0.2));
        mgr.poll(2.0);
        assert_eq!(mgr.current().unwrap().active_note_count, 1);
        assert_eq!(
            backend.count(|op| matches!(op, TestOp::Release { note: Some(_), .. })),
            1
        );
    }

    #[test]
    fn key_release_prefers_untimed_attack() {
        let (mut mgr, _backend) = manager();
        mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.trigger_note(note("C4"), 0.0).unwrap();
        let timed = mgr.trigger_note_for(note("C4"), 0.25, 0.1).unwrap();

        mgr.release_note(note("C4"), 0.2);
        assert!(mgr.is_held(timed));
        assert_eq!(mgr.current().unwrap().active_note_count, 1);

        mgr.poll(0.35);
        assert!(!mgr.is_held(timed));
        assert_eq!(mgr.current().unwrap().active_note_count, 0);
    }

    #[test]
    fn observers_see_attack_and_release() {
        let (mut mgr, _backend) = manager();
        let rx = mgr.subscribe();
        let g = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap().generation;
        mgr.trigger_note(note("C4"), 0.5).unwrap();
        mgr.release_note(note("C4"), 0.75);
        mgr.release_note(note("C4"), 0.8); // not held anymore

        let events: Vec<NoteEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                NoteEvent::Attack { generation: g, note: note("C4"), time: 0.5 },
                NoteEvent::Release { generation: g, note: note("C4"), time: 0.75 },
            ]
        );
    }

    #[test]
    fn dropped_observer_is_pruned() {
        let (mut mgr, _backend) = manager();
        drop(mgr.subscribe());
        mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.trigger_note(note("C4"), 0.0).unwrap();
        assert!(mgr.observers.is_empty());
    }

    #[test]
    fn parameter_writes_go_to_current_engine() {
        use crate::registry::ParameterRegistry;

        let (mut mgr, backend) = manager();
        let registry = ParameterRegistry::with_defaults();
        let entry = registry.entry("envelope.sustain").unwrap();
        assert!(mgr.write_parameter(entry, 50.0).is_err());

        let h = mgr.create_generation(VoiceEngineConfig::default(), 0.0).unwrap();
        mgr.write_parameter(entry, 50.0).unwrap();
        assert_eq!(
            backend.operations().last(),
            Some(&TestOp::SetParameter { engine: h.engine, path: "envelope.sustain".into(), value: 0.5 })
        );
    }
}
