//! Exportable workstation state.
//!
//! A preset is whatever shape an earlier export produced. Application is
//! tolerant: values are clamped, unknown parameter ids are skipped and step
//! arrays of any length are accepted.

use std::collections::BTreeMap;

use modsynth_types::{ArpDirection, DrumLane, LfoSettings, SequencerStep};
use serde::{Deserialize, Serialize};

use crate::registry::ParameterRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArpPreset {
    pub direction: ArpDirection,
    pub rate: f64,
    pub gate: f64,
    #[serde(default)]
    pub swing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LfoPreset {
    #[serde(flatten)]
    pub settings: LfoSettings,
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetState {
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    #[serde(default)]
    pub sequencer: Vec<SequencerStep>,
    #[serde(default)]
    pub drums: BTreeMap<DrumLane, Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arpeggiator: Option<ArpPreset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lfo: Option<LfoPreset>,
}

impl PresetState {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parameter values known to `registry`, clamped to their ranges, in
    /// id order. Unknown ids are logged and left out.
    pub fn resolved_parameters(&self, registry: &ParameterRegistry) -> Vec<(String, f64)> {
        self.parameters
            .iter()
            .filter_map(|(id, value)| match registry.get(id) {
                Ok(descriptor) => Some((id.clone(), descriptor.clamp(*value))),
                Err(_) => {
                    log::warn!(target: "modsynth::preset", "skipping unknown parameter '{}'", id);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modsynth_types::{LfoShape, Note};

    #[test]
    fn resolved_parameters_clamp_and_skip_unknown() {
        let registry = ParameterRegistry::with_defaults();
        let mut preset = PresetState::default();
        preset.parameters.insert("reverb.wet".into(), 180.0);
        preset.parameters.insert("filter.slope".into(), 12.0);
        preset.parameters.insert("filter.frequency".into(), 440.0);

        assert_eq!(
            preset.resolved_parameters(&registry),
            vec![("filter.frequency".to_string(), 440.0), ("reverb.wet".to_string(), 100.0)]
        );
    }

    #[test]
    fn minimal_json_is_accepted() {
        let preset = PresetState::from_json(r#"{ "parameters": { "master.volume": -6 } }"#).unwrap();
        assert_eq!(preset.parameters["master.volume"], -6.0);
        assert!(preset.sequencer.is_empty());
        assert!(preset.arpeggiator.is_none());
    }

    #[test]
    fn json_shape_uses_note_and_lane_names() {
        let mut preset = PresetState::default();
        preset.sequencer.push(SequencerStep {
            index: 0,
            note: Note::C4,
            enabled: true,
        });
        preset.drums.insert(DrumLane::Kick, vec![true, false]);
        preset.lfo = Some(LfoPreset {
            settings: LfoSettings {
                rate_hz: 4.0,
                shape: LfoShape::Square,
                amount_percent: 30.0,
            },
            destination: Some("filter.frequency".into()),
        });

        let json = preset.to_json().unwrap();
        assert!(json.contains("\"C4\""));
        assert!(json.contains("\"Kick\""));
        assert!(json.contains("\"rate_hz\": 4.0"));
        assert_eq!(PresetState::from_json(&json).unwrap(), preset);
    }
}
