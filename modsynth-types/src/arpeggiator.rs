use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArpDirection {
    #[default]
    Up,
    Down,
    UpDown,
    Random,
}

impl ArpDirection {
    pub fn name(&self) -> &'static str {
        match self {
            ArpDirection::Up => "up",
            ArpDirection::Down => "down",
            ArpDirection::UpDown => "updown",
            ArpDirection::Random => "random",
        }
    }

    pub fn from_name(name: &str) -> Option<ArpDirection> {
        match name {
            "up" => Some(ArpDirection::Up),
            "down" => Some(ArpDirection::Down),
            "updown" | "up-down" => Some(ArpDirection::UpDown),
            "random" => Some(ArpDirection::Random),
            _ => None,
        }
    }
}
