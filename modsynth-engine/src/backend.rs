//! Audio backend trait: the semantic surface of the external audio engine.
//!
//! `AudioBackend` captures what the core *means* to do (build a voice engine,
//! start a note, set a parameter) independently of how the host does it.
//! Everything in this crate talks to sound through this trait, which keeps
//! the lifecycle and scheduling logic testable without an audio device.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use modsynth_types::{DrumLane, Note, VoiceEngineConfig};

/// Result type for backend operations.
pub type BackendResult<T = ()> = Result<T, BackendError>;

/// Error from a backend operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError(pub String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

/// Opaque reference to a live voice engine inside the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineRef(pub u32);

impl fmt::Display for EngineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine:{}", self.0)
    }
}

/// Semantic-level audio backend trait.
///
/// `time` arguments are absolute audio-clock seconds, as handed out by the
/// transport clock.
pub trait AudioBackend: Send {
    /// Build a polyphonic voice engine and connect it to the output.
    fn create_voice_engine(&self, config: &VoiceEngineConfig) -> BackendResult<EngineRef>;

    /// Disconnect and free a voice engine.
    fn dispose_voice_engine(&self, engine: EngineRef) -> BackendResult;

    /// Start a note.
    fn trigger_attack(&self, engine: EngineRef, note: Note, time: f64) -> BackendResult;

    /// Release one note, or every sounding note when `note` is `None`.
    fn trigger_release(&self, engine: EngineRef, note: Option<Note>, time: f64) -> BackendResult;

    /// Write a live parameter on a voice engine.
    fn set_parameter(&self, engine: EngineRef, path: &str, value: f64) -> BackendResult;

    /// Fire one drum voice.
    fn trigger_drum(&self, lane: DrumLane, time: f64) -> BackendResult;
}

impl<B: AudioBackend + Sync> AudioBackend for Arc<B> {
    fn create_voice_engine(&self, config: &VoiceEngineConfig) -> BackendResult<EngineRef> {
        (**self).create_voice_engine(config)
    }
    fn dispose_voice_engine(&self, engine: EngineRef) -> BackendResult {
        (**self).dispose_voice_engine(engine)
    }
    fn trigger_attack(&self, engine: EngineRef, note: Note, time: f64) -> BackendResult {
        (**self).trigger_attack(engine, note, time)
    }
    fn trigger_release(&self, engine: EngineRef, note: Option<Note>, time: f64) -> BackendResult {
        (**self).trigger_release(engine, note, time)
    }
    fn set_parameter(&self, engine: EngineRef, path: &str, value: f64) -> BackendResult {
        (**self).set_parameter(engine, path, value)
    }
    fn trigger_drum(&self, lane: DrumLane, time: f64) -> BackendResult {
        (**self).trigger_drum(lane, time)
    }
}

// ─── Logging Backend ────────────────────────────────────────────────

/// Backend that only logs what it is asked to do. Used by the headless
/// driver when no audio device is attached.
#[derive(Default)]
pub struct LogBackend {
    next_engine: Mutex<u32>,
}

impl LogBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for LogBackend {
    fn create_voice_engine(&self, config: &VoiceEngineConfig) -> BackendResult<EngineRef> {
        let mut next = self.next_engine.lock().map_err(|e| BackendError(e.to_string()))?;
        *next += 1;
        log::info!(
            target: "modsynth::backend",
            "create engine:{} ({} voices, {})",
            *next,
            config.polyphony,
            config.waveform.name()
        );
        Ok(EngineRef(*next))
    }

    fn dispose_voice_engine(&self, engine: EngineRef) -> BackendResult {
        log::info!(target: "modsynth::backend", "dispose {}", engine);
        Ok(())
    }

    fn trigger_attack(&self, engine: EngineRef, note: Note, time: f64) -> BackendResult {
        log::debug!(target: "modsynth::backend", "{} attack {} @{:.3}", engine, note, time);
        Ok(())
    }

    fn trigger_release(&self, engine: EngineRef, note: Option<Note>, time: f64) -> BackendResult {
        match note {
            Some(note) => log::debug!(target: "modsynth::backend", "{} release {} @{:.3}", engine, note, time),
            None => log::debug!(target: "modsynth::backend", "{} release all @{:.3}", engine, time),
        }
        Ok(())
    }

    fn set_parameter(&self, engine: EngineRef, path: &str, value: f64) -> BackendResult {
        log::trace!(target: "modsynth::backend", "{} {} = {:.4}", engine, path, value);
        Ok(())
    }

    fn trigger_drum(&self, lane: DrumLane, time: f64) -> BackendResult {
        log::debug!(target: "modsynth::backend", "drum {} @{:.3}", lane.name(), time);
        Ok(())
    }
}

// ─── Test Backend ───────────────────────────────────────────────────

/// An operation recorded by `TestBackend` for assertion in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOp {
    CreateEngine {
        engine: EngineRef,
        config: VoiceEngineConfig,
    },
    DisposeEngine(EngineRef),
    Attack {
        engine: EngineRef,
        note: Note,
        time: f64,
    },
    Release {
        engine: EngineRef,
        note: Option<Note>,
        time: f64,
    },
    SetParameter {
        engine: EngineRef,
        path: String,
        value: f64,
    },
    Drum {
        lane: DrumLane,
        time: f64,
    },
}

#[derive(Default)]
struct TestBackendState {
    ops: Vec<TestOp>,
    next_engine: u32,
    disposed: HashSet<EngineRef>,
    fail_create: bool,
    fail_set_parameter: bool,
}

/// A backend that records every operation for assertions.
///
/// Calls against a disposed engine fail the way a real audio engine does,
/// and creation / parameter writes can be made to fail on demand.
#[derive(Default)]
pub struct TestBackend {
    state: Mutex<TestBackendState>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TestBackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return all recorded operations.
    pub fn operations(&self) -> Vec<TestOp> {
        self.lock().ops.clone()
    }

    /// Clear recorded operations.
    pub fn clear(&self) {
        self.lock().ops.clear();
    }

    /// Count operations matching a predicate.
    pub fn count<F: Fn(&TestOp) -> bool>(&self, f: F) -> usize {
        self.lock().ops.iter().filter(|op| f(op)).count()
    }

    /// Notes attacked, in order, across all engines.
    pub fn attacks(&self) -> Vec<Note> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                TestOp::Attack { note, .. } => Some(*note),
                _ => None,
            })
            .collect()
    }

    /// Engines disposed, in order.
    pub fn disposed(&self) -> Vec<EngineRef> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                TestOp::DisposeEngine(engine) => Some(*engine),
                _ => None,
            })
            .collect()
    }

    /// Parameter writes as (path, value), in order.
    pub fn parameter_writes(&self) -> Vec<(String, f64)> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                TestOp::SetParameter { path, value, .. } => Some((path.clone(), *value)),
                _ => None,
            })
            .collect()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn set_fail_set_parameter(&self, fail: bool) {
        self.lock().fail_set_parameter = fail;
    }

    fn check_live(state: &TestBackendState, engine: EngineRef) -> BackendResult {
        if state.disposed.contains(&engine) {
            Err(BackendError(format!("{} has been disposed", engine)))
        } else {
            Ok(())
        }
    }
}

impl AudioBackend for TestBackend {
    fn create_voice_engine(&self, config: &VoiceEngineConfig) -> BackendResult<EngineRef> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(BackendError("audio context not running".to_string()));
        }
        state.next_engine += 1;
        let engine = EngineRef(state.next_engine);
        state.ops.push(TestOp::CreateEngine {
            engine,
            config: config.clone(),
        });
        Ok(engine)
    }

    fn dispose_voice_engine(&self, engine: EngineRef) -> BackendResult {
        let mut state = self.lock();
        Self::check_live(&state, engine)?;
        state.disposed.insert(engine);
        state.ops.push(TestOp::DisposeEngine(engine));
        Ok(())
    }

    fn trigger_attack(&self, engine: EngineRef, note: Note, time: f64) -> BackendResult {
        let mut state = self.lock();
        Self::check_live(&state, engine)?;
        state.ops.push(TestOp::Attack { engine, note, time });
        Ok(())
    }

    fn trigger_release(&self, engine: EngineRef, note: Option<Note>, time: f64) -> BackendResult {
        let mut state = self.lock();
        Self::check_live(&state, engine)?;
        state.ops.push(TestOp::Release { engine, note, time });
        Ok(())
    }

    fn set_parameter(&self, engine: EngineRef, path: &str, value: f64) -> BackendResult {
        let mut state = self.lock();
        Self::check_live(&state, engine)?;
        if state.fail_set_parameter {
            return Err(BackendError(format!("{} rejected {}", engine, path)));
        }
        state.ops.push(TestOp::SetParameter {
            engine,
            path: path.to_string(),
            value,
        });
        Ok(())
    }

    fn trigger_drum(&self, lane: DrumLane, time: f64) -> BackendResult {
        self.lock().ops.push(TestOp::Drum { lane, time });
        Ok(())
    }
}

// ─── NullBackend ────────────────────────────────────────────────────

/// A no-op backend that silently succeeds.
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn create_voice_engine(&self, _: &VoiceEngineConfig) -> BackendResult<EngineRef> { Ok(EngineRef(0)) }
    fn dispose_voice_engine(&self, _: EngineRef) -> BackendResult { Ok(()) }
    fn trigger_attack(&self, _: EngineRef, _: Note, _: f64) -> BackendResult { Ok(()) }
    fn trigger_release(&self, _: EngineRef, _: Option<Note>, _: f64) -> BackendResult { Ok(()) }
    fn set_parameter(&self, _: EngineRef, _: &str, _: f64) -> BackendResult { Ok(()) }
    fn trigger_drum(&self, _: DrumLane, _: f64) -> BackendResult { Ok(()) }
}
