use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LfoShape {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
    Random,
}

impl LfoShape {
    pub fn name(&self) -> &'static str {
        match self {
            LfoShape::Sine => "sine",
            LfoShape::Triangle => "triangle",
            LfoShape::Square => "square",
            LfoShape::Sawtooth => "sawtooth",
            LfoShape::Random => "random",
        }
    }

    pub fn all() -> [LfoShape; 5] {
        [
            LfoShape::Sine,
            LfoShape::Triangle,
            LfoShape::Square,
            LfoShape::Sawtooth,
            LfoShape::Random,
        ]
    }

    pub fn from_name(name: &str) -> Option<LfoShape> {
        match name {
            "sine" => Some(LfoShape::Sine),
            "triangle" => Some(LfoShape::Triangle),
            "square" => Some(LfoShape::Square),
            "sawtooth" | "saw" => Some(LfoShape::Sawtooth),
            "random" => Some(LfoShape::Random),
            _ => None,
        }
    }

    /// Unrecognised shape names are treated as sine.
    pub fn from_name_or_sine(name: &str) -> LfoShape {
        Self::from_name(name).unwrap_or(LfoShape::Sine)
    }
}

/// Knob state of the single LFO.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LfoSettings {
    pub rate_hz: f64,
    pub shape: LfoShape,
    /// Modulation depth, 0..100 percent of half the destination range.
    pub amount_percent: f64,
}

impl Default for LfoSettings {
    fn default() -> Self {
        Self {
            rate_hz: 2.0,
            shape: LfoShape::Sine,
            amount_percent: 50.0,
        }
    }
}
