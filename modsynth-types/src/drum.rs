use serde::{Deserialize, Serialize};

use crate::STEP_COUNT;

/// The drum machine's fixed lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DrumLane {
    Kick,
    Snare,
    HiHat,
    Clap,
}

impl DrumLane {
    pub const COUNT: usize = 4;

    pub fn all() -> [DrumLane; Self::COUNT] {
        [DrumLane::Kick, DrumLane::Snare, DrumLane::HiHat, DrumLane::Clap]
    }

    pub fn index(&self) -> usize {
        match self {
            DrumLane::Kick => 0,
            DrumLane::Snare => 1,
            DrumLane::HiHat => 2,
            DrumLane::Clap => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DrumLane::Kick => "kick",
            DrumLane::Snare => "snare",
            DrumLane::HiHat => "hihat",
            DrumLane::Clap => "clap",
        }
    }
}

/// On/off grid of lanes × steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrumPattern {
    pub steps: [[bool; STEP_COUNT]; DrumLane::COUNT],
}

impl DrumPattern {
    pub fn is_set(&self, lane: DrumLane, step: usize) -> bool {
        self.steps[lane.index()].get(step).copied().unwrap_or(false)
    }

    pub fn set(&mut self, lane: DrumLane, step: usize, on: bool) {
        if let Some(slot) = self.steps[lane.index()].get_mut(step) {
            *slot = on;
        }
    }

    /// Lanes with a hit at `step`, in lane order.
    pub fn lanes_at(&self, step: usize) -> impl Iterator<Item = DrumLane> + '_ {
        DrumLane::all()
            .into_iter()
            .filter(move |lane| self.is_set(*lane, step))
    }
}
