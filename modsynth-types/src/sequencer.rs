use serde::{Deserialize, Serialize};

use crate::Note;

/// Number of steps in a sequencer or drum pattern.
pub const STEP_COUNT: usize = 16;

/// One slot of the 16-step melodic sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerStep {
    pub index: usize,
    pub note: Note,
    pub enabled: bool,
}

impl SequencerStep {
    pub fn new(index: usize, note: Note) -> Self {
        Self {
            index,
            note,
            enabled: false,
        }
    }

    /// The default pattern: every step on C4, all disabled.
    pub fn default_pattern() -> [SequencerStep; STEP_COUNT] {
        std::array::from_fn(|i| SequencerStep::new(i, Note::C4))
    }
}
