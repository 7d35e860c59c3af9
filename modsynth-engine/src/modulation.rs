//! Single-slot LFO modulation routing.
//!
//! One destination parameter at a time is driven by the LFO around a
//! baseline captured when the destination was selected. The baseline is the
//! user's resting value; modulated values are never fed back into it.

use std::sync::Arc;

use modsynth_types::{LfoShape, ParameterDescriptor};

use crate::error::EngineResult;
use crate::lfo;
use crate::registry::{ParameterEntry, ParameterRegistry};

/// Receives the router's parameter writes. Implemented by the voice
/// lifecycle manager; tests substitute recorders.
pub trait ParameterSink {
    /// Write `value` (already clamped to the descriptor's range) to the
    /// parameter described by `entry`.
    fn write_parameter(&mut self, entry: &ParameterEntry, value: f64) -> EngineResult;
}

/// Display hook invoked with every value the router writes.
pub type DisplayFormatter = Box<dyn FnMut(&ParameterDescriptor, f64)>;

#[derive(Debug, Clone, PartialEq)]
pub struct ModulationBinding {
    pub destination_id: String,
    pub baseline_value: f64,
    pub active: bool,
}

pub struct ModulationRouter {
    registry: Arc<ParameterRegistry>,
    binding: Option<ModulationBinding>,
    formatter: Option<DisplayFormatter>,
    last_output: f64,
}

impl ModulationRouter {
    pub fn new(registry: Arc<ParameterRegistry>) -> Self {
        Self {
            registry,
            binding: None,
            formatter: None,
            last_output: 0.0,
        }
    }

    /// Route the LFO to `destination_id`, capturing `current_value` as the
    /// baseline. Replaces any existing binding.
    pub fn bind(&mut self, destination_id: &str, current_value: f64) -> EngineResult<ModulationBinding> {
        let descriptor = self.registry.get(destination_id)?;
        let binding = ModulationBinding {
            destination_id: destination_id.to_string(),
            baseline_value: descriptor.clamp(current_value),
            active: true,
        };
        if let Some(old) = &self.binding {
            log::debug!(
                target: "modsynth::modulation",
                "rebinding LFO {} -> {}",
                old.destination_id,
                destination_id
            );
        }
        self.binding = Some(binding.clone());
        Ok(binding)
    }

    /// Drop the active binding. No-op when unbound.
    pub fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            log::debug!(target: "modsynth::modulation", "unbound LFO from {}", binding.destination_id);
        }
    }

    /// Drop the binding and write its baseline back, so the destination
    /// comes to rest where the user left it.
    pub fn unbind_and_restore(&mut self, sink: &mut dyn ParameterSink) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        if let Ok(entry) = self.registry.entry(&binding.destination_id) {
            if let Err(e) = sink.write_parameter(entry, binding.baseline_value) {
                log::warn!(
                    target: "modsynth::modulation",
                    "restoring {} failed: {}",
                    binding.destination_id,
                    e
                );
            }
        }
    }

    /// Move the resting value of the bound destination. Ignored unless
    /// `destination_id` is the one currently bound.
    pub fn update_baseline(&mut self, destination_id: &str, value: f64) {
        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        if binding.destination_id != destination_id {
            return;
        }
        if let Ok(descriptor) = self.registry.get(destination_id) {
            binding.baseline_value = descriptor.clamp(value);
        }
    }

    /// Advance one frame. Returns the value written, if any.
    ///
    /// The LFO output is refreshed for [`current_output`](Self::current_output)
    /// on every call; a parameter write happens only while bound. A failing
    /// write unbinds the router instead of propagating.
    pub fn tick(
        &mut self,
        time_secs: f64,
        rate_hz: f64,
        shape: LfoShape,
        amount_percent: f64,
        sink: &mut dyn ParameterSink,
    ) -> Option<f64> {
        let output = lfo::sample(time_secs, rate_hz, shape);
        self.last_output = output;

        let binding = self.binding.as_ref()?;
        let entry = match self.registry.entry(&binding.destination_id) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!(target: "modsynth::modulation", "{}; unbinding", e);
                self.binding = None;
                return None;
            }
        };

        let descriptor = &entry.descriptor;
        let amount = if amount_percent.is_nan() { 0.0 } else { amount_percent.clamp(0.0, 100.0) };
        let offset = output * (amount / 100.0) * (descriptor.range() / 2.0);
        let value = descriptor.clamp(binding.baseline_value + offset);

        if let Err(e) = sink.write_parameter(entry, value) {
            log::warn!(
                target: "modsynth::modulation",
                "modulating {} failed: {}; unbinding",
                descriptor.id,
                e
            );
            self.binding = None;
            return None;
        }
        if let Some(formatter) = self.formatter.as_mut() {
            formatter(descriptor, value);
        }
        Some(value)
    }

    /// Most recent LFO output in `[-1, 1]`.
    pub fn current_output(&self) -> f64 {
        self.last_output
    }

    pub fn binding(&self) -> Option<&ModulationBinding> {
        self.binding.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn set_formatter(&mut self, formatter: DisplayFormatter) {
        self.formatter = Some(formatter);
    }

    pub fn clear_formatter(&mut self) {
        self.formatter = None;
    }
}
