//! Declarative table of modulatable parameters.
//!
//! Each id maps to its descriptor plus an apply strategy describing where
//! the value lands on the voice engine and how it is converted on the way.
//! Adding a parameter is one `register` call; nothing dispatches on ids.

use std::collections::HashMap;

use modsynth_types::{ParamScaling, ParamUnit, ParameterDescriptor};

use crate::error::{EngineError, EngineResult};

/// Conversion from the user-facing value to the engine's native value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    Identity,
    /// 0..100 percent to 0..1.
    PercentToUnit,
    /// Decibels to linear gain.
    DbToGain,
    /// Semitones to cents.
    SemitonesToCents,
}

impl ValueTransform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            ValueTransform::Identity => value,
            ValueTransform::PercentToUnit => value / 100.0,
            ValueTransform::DbToGain => 10f64.powf(value / 20.0),
            ValueTransform::SemitonesToCents => value * 100.0,
        }
    }
}

/// Where and how a parameter is written on the voice engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamApply {
    pub path: String,
    pub transform: ValueTransform,
}

impl ParamApply {
    pub fn new(path: impl Into<String>, transform: ValueTransform) -> Self {
        Self {
            path: path.into(),
            transform,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEntry {
    pub descriptor: ParameterDescriptor,
    /// Resting value before anything sets the parameter.
    pub default_value: f64,
    pub apply: ParamApply,
}

impl ParameterEntry {
    /// Clamp `value` to the descriptor's range and convert it for the engine.
    pub fn engine_value(&self, value: f64) -> f64 {
        self.apply.transform.apply(self.descriptor.clamp(value))
    }
}

/// Process-wide parameter table. Populated once, then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    entries: HashMap<String, ParameterEntry>,
    order: Vec<String>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The workstation's standard synth parameters.
    pub fn with_defaults() -> Self {
        use ParamScaling::*;
        use ParamUnit::*;
        use ValueTransform::*;

        let table: [(&str, f64, f64, f64, ParamUnit, ParamScaling, &str, ValueTransform); 13] = [
            ("filter.frequency", 20.0, 20000.0, 2000.0, Hz, Logarithmic, "filter.frequency", Identity),
            ("filter.q", 0.1, 20.0, 1.0, Ratio, Exponential, "filter.Q", Identity),
            ("oscillator.detune", -24.0, 24.0, 0.0, Semitone, Linear, "detune", SemitonesToCents),
            ("envelope.attack", 0.001, 2.0, 0.01, Seconds, Exponential, "envelope.attack", Identity),
            ("envelope.decay", 0.01, 2.0, 0.2, Seconds, Exponential, "envelope.decay", Identity),
            ("envelope.sustain", 0.0, 100.0, 60.0, Percent, Linear, "envelope.sustain", PercentToUnit),
            ("envelope.release", 0.01, 5.0, 0.8, Seconds, Exponential, "envelope.release", Identity),
            ("master.volume", -60.0, 0.0, -12.0, Db, Linear, "output.gain", DbToGain),
            ("reverb.wet", 0.0, 100.0, 20.0, Percent, Linear, "reverb.wet", PercentToUnit),
            ("delay.time", 0.01, 1.0, 0.25, Seconds, Linear, "delay.delayTime", Identity),
            ("delay.feedback", 0.0, 95.0, 30.0, Percent, Linear, "delay.feedback", PercentToUnit),
            ("distortion.amount", 0.0, 100.0, 0.0, Percent, Linear, "distortion.distortion", PercentToUnit),
            ("chorus.depth", 0.0, 100.0, 0.0, Percent, Linear, "chorus.depth", PercentToUnit),
        ];

        let mut registry = Self::new();
        for (id, min, max, default, unit, scaling, path, transform) in table {
            let descriptor = ParameterDescriptor::new(id, min, max, unit, scaling);
            if let Err(e) = registry.register(descriptor, default, ParamApply::new(path, transform)) {
                log::error!(target: "modsynth::registry", "built-in parameter table: {}", e);
            }
        }
        registry
    }

    /// Add a parameter. `default_value` is clamped into the descriptor's range.
    pub fn register(&mut self, descriptor: ParameterDescriptor, default_value: f64, apply: ParamApply) -> EngineResult {
        if self.entries.contains_key(&descriptor.id) {
            return Err(EngineError::DuplicateParameter(descriptor.id));
        }
        let default_value = descriptor.clamp(default_value);
        self.order.push(descriptor.id.clone());
        self.entries.insert(
            descriptor.id.clone(),
            ParameterEntry {
                descriptor,
                default_value,
                apply,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> EngineResult<&ParameterDescriptor> {
        self.entry(id).map(|e| &e.descriptor)
    }

    pub fn entry(&self, id: &str) -> EngineResult<&ParameterEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| EngineError::UnknownParameter(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
