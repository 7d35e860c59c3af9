use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// A MIDI pitch addressed by scientific note name (`C4` = 60).
///
/// Serialises as its name so presets stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note(u8);

impl Note {
    pub const MAX_PITCH: u8 = 127;
    pub const C4: Note = Note(60);

    pub fn from_midi(pitch: u8) -> Option<Self> {
        (pitch <= Self::MAX_PITCH).then_some(Self(pitch))
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    /// Octave number in scientific pitch notation (C4 is octave 4).
    pub fn octave(self) -> i8 {
        (self.0 / 12) as i8 - 1
    }

    /// Shift by `semitones`; `None` if the result leaves the MIDI range.
    pub fn transposed(self, semitones: i32) -> Option<Self> {
        let pitch = self.0 as i32 + semitones;
        if (0..=Self::MAX_PITCH as i32).contains(&pitch) {
            Some(Self(pitch as u8))
        } else {
            None
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NAMES[(self.0 % 12) as usize], self.octave())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteParseError(pub String);

impl fmt::Display for NoteParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid note name '{}'", self.0)
    }
}

impl std::error::Error for NoteParseError {}

impl FromStr for Note {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || NoteParseError(s.to_string());
        let mut chars = s.trim().chars().peekable();

        let letter = chars.next().ok_or_else(err)?.to_ascii_uppercase();
        let base: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(err()),
        };
        let accidental = match chars.peek() {
            Some('#') => {
                chars.next();
                1
            }
            Some('b') => {
                chars.next();
                -1
            }
            _ => 0,
        };
        let octave: i32 = chars.collect::<String>().parse().map_err(|_| err())?;

        let pitch = (octave + 1) * 12 + base + accidental;
        if (0..=Note::MAX_PITCH as i32).contains(&pitch) {
            Ok(Note(pitch as u8))
        } else {
            Err(err())
        }
    }
}

impl TryFrom<String> for Note {
    type Error = NoteParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Note {
        s.parse().unwrap()
    }

    #[test]
    fn parses_naturals_and_accidentals() {
        assert_eq!(n("C4").midi(), 60);
        assert_eq!(n("A4").midi(), 69);
        assert_eq!(n("F#3").midi(), 54);
        assert_eq!(n("Bb2").midi(), 46);
        assert_eq!(n("C-1").midi(), 0);
        assert_eq!(n("G9").midi(), 127);
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        assert!("H4".parse::<Note>().is_err());
        assert!("C".parse::<Note>().is_err());
        assert!("".parse::<Note>().is_err());
        assert!("G#9".parse::<Note>().is_err());
        assert!("Cb-1".parse::<Note>().is_err());
    }

    #[test]
    fn displays_with_sharps() {
        assert_eq!(n("Bb2").to_string(), "A#2");
        assert_eq!(n("C4").to_string(), "C4");
        assert_eq!(n("C-1").to_string(), "C-1");
    }

    #[test]
    fn transposition_stays_in_midi_range() {
        assert_eq!(n("C4").transposed(12), Some(n("C5")));
        assert_eq!(n("C4").transposed(-60), Some(n("C-1")));
        assert_eq!(n("C4").transposed(-61), None);
        assert_eq!(n("G9").transposed(1), None);
    }

    #[test]
    fn string_conversions_use_note_names() {
        assert_eq!(String::from(n("E4")), "E4");
        assert_eq!(Note::try_from("E4".to_string()).unwrap(), n("E4"));
        assert!(Note::try_from("E".to_string()).is_err());
    }
}
