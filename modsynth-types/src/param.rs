use serde::{Deserialize, Serialize};

/// Physical unit a parameter value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamUnit {
    Hz,
    Db,
    Seconds,
    Percent,
    Semitone,
    Ratio,
}

impl ParamUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            ParamUnit::Hz => "Hz",
            ParamUnit::Db => "dB",
            ParamUnit::Seconds => "s",
            ParamUnit::Percent => "%",
            ParamUnit::Semitone => "st",
            ParamUnit::Ratio => "",
        }
    }
}

/// How a control position maps onto a parameter's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParamScaling {
    #[default]
    Linear,
    Logarithmic,
    Exponential,
}

/// Declarative description of one modulatable parameter.
///
/// Descriptors are immutable once registered; every value written to the
/// audio engine for this parameter passes through [`ParameterDescriptor::clamp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub id: String,
    pub min: f64,
    pub max: f64,
    pub unit: ParamUnit,
    #[serde(default)]
    pub scaling: ParamScaling,
}

impl ParameterDescriptor {
    pub fn new(id: impl Into<String>, min: f64, max: f64, unit: ParamUnit, scaling: ParamScaling) -> Self {
        Self {
            id: id.into(),
            min,
            max,
            unit,
            scaling,
        }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Clamp into `[min, max]`. NaN collapses to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Map a value onto a 0..1 control position according to the scaling.
    pub fn normalize(&self, value: f64) -> f64 {
        let value = self.clamp(value);
        let range = self.range();
        if range <= 0.0 {
            return 0.0;
        }
        let linear = (value - self.min) / range;
        match self.scaling {
            ParamScaling::Linear => linear,
            ParamScaling::Logarithmic if self.min > 0.0 => {
                (value / self.min).ln() / (self.max / self.min).ln()
            }
            ParamScaling::Logarithmic => linear,
            ParamScaling::Exponential => linear.sqrt(),
        }
    }

    /// Inverse of [`normalize`](Self::normalize).
    pub fn denormalize(&self, position: f64) -> f64 {
        let position = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };
        let value = match self.scaling {
            ParamScaling::Linear => self.min + position * self.range(),
            ParamScaling::Logarithmic if self.min > 0.0 => {
                self.min * (self.max / self.min).powf(position)
            }
            ParamScaling::Logarithmic => self.min + position * self.range(),
            ParamScaling::Exponential => self.min + position * position * self.range(),
        };
        self.clamp(value)
    }

    /// Human-readable value with the unit suffix, for display formatters.
    pub fn format_value(&self, value: f64) -> String {
        match self.unit {
            ParamUnit::Hz if value >= 1000.0 => format!("{:.2} kHz", value / 1000.0),
            ParamUnit::Seconds if value < 1.0 => format!("{:.0} ms", value * 1000.0),
            ParamUnit::Ratio => format!("{:.2}", value),
            unit => format!("{:.1} {}", value, unit.suffix()),
        }
    }
}
