use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Sawtooth,
    Square,
    Triangle,
    Sine,
}

impl Waveform {
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sawtooth => "sawtooth",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Sine => "sine",
        }
    }
}

/// Amplitude envelope times in seconds; sustain is a 0..1 level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.2,
            sustain: 0.6,
            release: 0.8,
        }
    }
}

/// Everything needed to build one polyphonic voice engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEngineConfig {
    pub waveform: Waveform,
    pub polyphony: u8,
    pub envelope: Envelope,
}

impl VoiceEngineConfig {
    /// Release tail in seconds; a replaced engine must outlive this.
    pub fn release_secs(&self) -> f64 {
        self.envelope.release.max(0.0)
    }
}

impl Default for VoiceEngineConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sawtooth,
            polyphony: 8,
            envelope: Envelope::default(),
        }
    }
}
