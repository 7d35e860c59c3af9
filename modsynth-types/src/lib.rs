//! # modsynth-types
//!
//! Shared type definitions for the modsynth engine.
//! Plain data only: descriptors, shapes, notes and step data that the engine,
//! presets and host collaborators all agree on.

mod arpeggiator;
mod drum;
mod lfo;
mod note;
mod param;
mod sequencer;
mod voice;

pub use arpeggiator::ArpDirection;
pub use drum::{DrumLane, DrumPattern};
pub use lfo::{LfoSettings, LfoShape};
pub use note::{Note, NoteParseError};
pub use param::{ParamScaling, ParamUnit, ParameterDescriptor};
pub use sequencer::{SequencerStep, STEP_COUNT};
pub use voice::{Envelope, VoiceEngineConfig, Waveform};

/// Identifies one instance-lifetime of a voice engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct GenerationId(u64);

impl GenerationId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}
