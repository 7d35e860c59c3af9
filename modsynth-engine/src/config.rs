use std::path::{Path, PathBuf};

use modsynth_types::{ArpDirection, Envelope, LfoSettings, LfoShape, VoiceEngineConfig, Waveform};
use serde::Deserialize;

use crate::arpeggiator::Arpeggiator;
use crate::voices::DisposalTiming;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    transport: TransportConfig,
    #[serde(default)]
    arpeggiator: ArpConfig,
    #[serde(default)]
    lfo: LfoConfig,
    #[serde(default)]
    voice: VoiceConfig,
    #[serde(default)]
    disposal: DisposalConfig,
    #[serde(default)]
    display: DisplayConfig,
}

#[derive(Deserialize, Default)]
struct TransportConfig {
    bpm: Option<f64>,
}

#[derive(Deserialize, Default)]
struct ArpConfig {
    direction: Option<String>,
    rate: Option<f64>,
    gate: Option<f64>,
    swing: Option<f64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Default)]
struct LfoConfig {
    shape: Option<String>,
    rate_hz: Option<f64>,
    amount: Option<f64>,
}

#[derive(Deserialize, Default)]
struct VoiceConfig {
    waveform: Option<String>,
    polyphony: Option<u8>,
    attack: Option<f64>,
    decay: Option<f64>,
    sustain: Option<f64>,
    release: Option<f64>,
}

#[derive(Deserialize, Default)]
struct DisposalConfig {
    min_deadline_ms: Option<u64>,
    release_margin_ms: Option<u64>,
    followup_ms: Option<u64>,
    max_wait_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct DisplayConfig {
    frame_throttle_ms: Option<u64>,
}

/// Engine settings: embedded defaults overlaid field by field with the
/// user's config file.
pub struct Config {
    file: ConfigFile,
}

impl Config {
    /// Embedded defaults merged with `~/.config/modsynth/config.toml`.
    pub fn load() -> Self {
        Self::load_from(user_config_path().as_deref())
    }

    /// Embedded defaults merged with the file at `user_path`, if it exists.
    /// Unreadable or malformed files are logged and ignored.
    pub fn load_from(user_path: Option<&Path>) -> Self {
        let mut config = Self::embedded();
        let Some(path) = user_path else {
            return config;
        };
        if !path.exists() {
            return config;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => {
                    config.merge(user);
                    log::info!(target: "modsynth::config", "loaded {}", path.display());
                }
                Err(e) => {
                    log::warn!(target: "modsynth::config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "modsynth::config", "could not read config {}: {}", path.display(), e)
            }
        }
        config
    }

    /// Embedded defaults merged with `toml`.
    pub fn from_toml_str(toml: &str) -> Result<Self, toml::de::Error> {
        let user: ConfigFile = toml::from_str(toml)?;
        let mut config = Self::embedded();
        config.merge(user);
        Ok(config)
    }

    fn embedded() -> Self {
        match toml::from_str(DEFAULT_CONFIG) {
            Ok(file) => Self { file },
            Err(e) => {
                log::error!(target: "modsynth::config", "embedded config.toml is invalid: {}", e);
                Self { file: ConfigFile::default() }
            }
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        let base = &mut self.file;
        merge_opt(&mut base.transport.bpm, user.transport.bpm);

        merge_opt(&mut base.arpeggiator.direction, user.arpeggiator.direction);
        merge_opt(&mut base.arpeggiator.rate, user.arpeggiator.rate);
        merge_opt(&mut base.arpeggiator.gate, user.arpeggiator.gate);
        merge_opt(&mut base.arpeggiator.swing, user.arpeggiator.swing);
        merge_opt(&mut base.arpeggiator.seed, user.arpeggiator.seed);

        merge_opt(&mut base.lfo.shape, user.lfo.shape);
        merge_opt(&mut base.lfo.rate_hz, user.lfo.rate_hz);
        merge_opt(&mut base.lfo.amount, user.lfo.amount);

        merge_opt(&mut base.voice.waveform, user.voice.waveform);
        merge_opt(&mut base.voice.polyphony, user.voice.polyphony);
        merge_opt(&mut base.voice.attack, user.voice.attack);
        merge_opt(&mut base.voice.decay, user.voice.decay);
        merge_opt(&mut base.voice.sustain, user.voice.sustain);
        merge_opt(&mut base.voice.release, user.voice.release);

        merge_opt(&mut base.disposal.min_deadline_ms, user.disposal.min_deadline_ms);
        merge_opt(&mut base.disposal.release_margin_ms, user.disposal.release_margin_ms);
        merge_opt(&mut base.disposal.followup_ms, user.disposal.followup_ms);
        merge_opt(&mut base.disposal.max_wait_ms, user.disposal.max_wait_ms);

        merge_opt(&mut base.display.frame_throttle_ms, user.display.frame_throttle_ms);
    }

    pub fn bpm(&self) -> f64 {
        self.file.transport.bpm.unwrap_or(120.0)
    }

    /// A stopped arpeggiator with the configured direction, rate, gate and swing.
    pub fn arpeggiator(&self) -> Arpeggiator {
        let arp = &self.file.arpeggiator;
        let direction = arp
            .direction
            .as_deref()
            .and_then(|name| {
                let parsed = ArpDirection::from_name(name);
                if parsed.is_none() {
                    log::warn!(target: "modsynth::config", "unknown arpeggiator direction '{}'", name);
                }
                parsed
            })
            .unwrap_or(ArpDirection::Up);
        let built = Arpeggiator::new(
            direction,
            arp.rate.unwrap_or(120.0),
            arp.gate.unwrap_or(50.0),
            arp.swing.unwrap_or(0.0),
        );
        match arp.seed {
            Some(seed) => built.with_seed(seed),
            None => built,
        }
    }

    /// Unknown shape names fall back to sine.
    pub fn lfo(&self) -> LfoSettings {
        let fallback = LfoSettings::default();
        let lfo = &self.file.lfo;
        LfoSettings {
            rate_hz: lfo.rate_hz.unwrap_or(fallback.rate_hz),
            shape: lfo
                .shape
                .as_deref()
                .map(LfoShape::from_name_or_sine)
                .unwrap_or(fallback.shape),
            amount_percent: lfo.amount.unwrap_or(fallback.amount_percent).clamp(0.0, 100.0),
        }
    }

    pub fn voice(&self) -> VoiceEngineConfig {
        let fallback = VoiceEngineConfig::default();
        let voice = &self.file.voice;
        VoiceEngineConfig {
            waveform: voice
                .waveform
                .as_deref()
                .and_then(parse_waveform)
                .unwrap_or(fallback.waveform),
            polyphony: voice.polyphony.unwrap_or(fallback.polyphony).max(1),
            envelope: Envelope {
                attack: voice.attack.unwrap_or(fallback.envelope.attack),
                decay: voice.decay.unwrap_or(fallback.envelope.decay),
                sustain: voice.sustain.unwrap_or(fallback.envelope.sustain),
                release: voice.release.unwrap_or(fallback.envelope.release),
            },
        }
    }

    pub fn disposal(&self) -> DisposalTiming {
        let fallback = DisposalTiming::default();
        let d = &self.file.disposal;
        let secs = |ms: Option<u64>, default: f64| ms.map_or(default, |ms| ms as f64 / 1000.0);
        DisposalTiming {
            min_deadline: secs(d.min_deadline_ms, fallback.min_deadline),
            release_margin: secs(d.release_margin_ms, fallback.release_margin),
            followup: secs(d.followup_ms, fallback.followup).max(0.01),
            max_wait: secs(d.max_wait_ms, fallback.max_wait),
        }
    }

    pub fn frame_throttle_ms(&self) -> u64 {
        self.file.display.frame_throttle_ms.unwrap_or(16)
    }
}

fn merge_opt<T>(base: &mut Option<T>, user: Option<T>) {
    if user.is_some() {
        *base = user;
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("modsynth").join("config.toml"))
}

fn parse_waveform(s: &str) -> Option<Waveform> {
    match s {
        "sawtooth" | "saw" => Some(Waveform::Sawtooth),
        "square" => Some(Waveform::Square),
        "triangle" => Some(Waveform::Triangle),
        "sine" => Some(Waveform::Sine),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_config() {
        let config = Config::load_from(None);
        assert_eq!(config.bpm(), 120.0);
        assert_eq!(config.lfo(), LfoSettings::default());
        assert_eq!(config.voice(), VoiceEngineConfig::default());
        assert_eq!(config.disposal(), DisposalTiming::default());
        assert_eq!(config.frame_throttle_ms(), 16);

        let arp = config.arpeggiator();
        assert_eq!(arp.direction(), ArpDirection::Up);
        assert_eq!(arp.rate(), 120.0);
        assert!(!arp.is_running());
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [transport]
            bpm = 90

            [voice]
            release = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.bpm(), 90.0);
        assert_eq!(config.voice().envelope.release, 2.5);
        assert_eq!(config.voice().envelope.attack, 0.01);
        assert_eq!(config.voice().polyphony, 8);
    }

    #[test]
    fn test_unknown_names_fall_back() {
        let config = Config::from_toml_str(
            r#"
            [lfo]
            shape = "wobble"
            amount = 400

            [arpeggiator]
            direction = "sideways"

            [voice]
            waveform = "noise"
            "#,
        )
        .unwrap();
        assert_eq!(config.lfo().shape, LfoShape::Sine);
        assert_eq!(config.lfo().amount_percent, 100.0);
        assert_eq!(config.arpeggiator().direction(), ArpDirection::Up);
        assert_eq!(config.voice().waveform, Waveform::Sawtooth);
    }

    #[test]
    fn test_disposal_timings_in_millis() {
        let config = Config::from_toml_str("[disposal]\nmin_deadline_ms = 250\nmax_wait_ms = 3000\n").unwrap();
        let d = config.disposal();
        assert_eq!(d.min_deadline, 0.25);
        assert_eq!(d.max_wait, 3.0);
        assert_eq!(d.followup, 0.1);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(Config::from_toml_str("[transport\nbpm = ").is_err());
    }
}
