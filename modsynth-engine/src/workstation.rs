//! The assembled engine.
//!
//! `Workstation` owns every component and is the single entry point for the
//! host: display frames, clock firings, timer polls and user actions all
//! come in here. Nothing is global, so independent instances can coexist.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use modsynth_types::{DrumLane, LfoSettings, Note, STEP_COUNT, VoiceEngineConfig};

use crate::backend::AudioBackend;
use crate::clock::{TickHandle, TransportClock};
use crate::config::Config;
use crate::error::EngineResult;
use crate::frame_loop::{FrameLoop, FrameRequest, Throttled};
use crate::modulation::{ModulationRouter, ParameterSink};
use crate::preset::{ArpPreset, LfoPreset, PresetState};
use crate::registry::ParameterRegistry;
use crate::transport::{TransportEvent, TransportScheduler};
use crate::voices::{NoteEvent, VoiceLifecycleManager};

pub struct Workstation<C: TransportClock> {
    registry: Arc<ParameterRegistry>,
    /// Resting value of every parameter, as the user last set it.
    values: HashMap<String, f64>,
    router: ModulationRouter,
    voices: VoiceLifecycleManager,
    transport: TransportScheduler,
    clock: C,
    lfo: LfoSettings,
    frames: FrameLoop,
    voice_config: VoiceEngineConfig,
}

impl<C: TransportClock> Workstation<C> {
    pub fn new(config: &Config, backend: Box<dyn AudioBackend>, clock: C) -> Self {
        let registry = Arc::new(ParameterRegistry::with_defaults());
        let values = registry
            .ids()
            .filter_map(|id| registry.entry(id).ok().map(|e| (id.to_string(), e.default_value)))
            .collect();
        let voice_config = config.voice();
        Self {
            router: ModulationRouter::new(Arc::clone(&registry)),
            voices: VoiceLifecycleManager::new(backend, voice_config.clone(), config.disposal()),
            transport: TransportScheduler::new(config.bpm(), config.arpeggiator()),
            clock,
            lfo: config.lfo(),
            frames: FrameLoop::new(Box::new(Throttled::from_millis(config.frame_throttle_ms()))),
            registry,
            values,
            voice_config,
        }
    }

    // ─── Voice engine ───────────────────────────────────────────────

    /// Build a fresh voice engine generation from `config`, superseding the
    /// current one, and bring it up to the current parameter values.
    pub fn rebuild_voice_engine(&mut self, config: VoiceEngineConfig) -> EngineResult {
        let now = self.clock.now();
        self.voice_config = config.clone();
        self.voices.create_generation(config, now)?;
        self.reapply_parameters();
        Ok(())
    }

    /// Make sure a voice engine exists. A latched creation failure is
    /// retried here, since this runs on explicit user action.
    pub fn ensure_voice_engine(&mut self) -> EngineResult {
        if self.voices.current().is_some() {
            return Ok(());
        }
        if let Some(reason) = self.voices.creation_failure() {
            log::info!(target: "modsynth::voices", "retrying voice engine after failure: {}", reason);
            self.voices.clear_failure();
        }
        self.rebuild_voice_engine(self.voice_config.clone())
    }

    fn reapply_parameters(&mut self) {
        let release = self.values.get("envelope.release").copied();
        for id in self.registry.ids() {
            let (Ok(entry), Some(value)) = (self.registry.entry(id), self.values.get(id)) else {
                continue;
            };
            if let Err(e) = self.voices.write_parameter(entry, *value) {
                log::warn!(target: "modsynth::voices", "could not apply {}: {}", id, e);
            }
        }
        if let Some(release) = release {
            self.voices.set_release_secs(release);
        }
    }

    // ─── Parameters ─────────────────────────────────────────────────

    /// Set a parameter's resting value. Out-of-range input is clamped.
    /// While the LFO drives this parameter, the value becomes the new
    /// modulation baseline and the next frame writes it.
    pub fn set_parameter(&mut self, id: &str, value: f64) -> EngineResult<f64> {
        let entry = self.registry.entry(id)?;
        let value = entry.descriptor.clamp(value);
        self.values.insert(id.to_string(), value);
        self.router.update_baseline(id, value);
        if id == "envelope.release" {
            self.voices.set_release_secs(value);
        }

        let modulated = self.router.binding().is_some_and(|b| b.destination_id == id);
        if !modulated {
            if let Err(e) = self.voices.write_parameter(entry, value) {
                log::debug!(target: "modsynth::voices", "{} stored, not applied: {}", id, e);
            }
        }
        Ok(value)
    }

    pub fn parameter_value(&self, id: &str) -> Option<f64> {
        self.values.get(id).copied()
    }

    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.registry
    }

    // ─── Modulation ─────────────────────────────────────────────────

    /// Route the LFO to `destination`, or disconnect it with `None`. The
    /// previous destination is put back to its resting value.
    pub fn select_lfo_destination(&mut self, destination: Option<&str>) -> EngineResult {
        if let Some(id) = destination {
            // validate before disturbing the current binding
            self.registry.get(id)?;
        }
        self.router.unbind_and_restore(&mut self.voices);
        if let Some(id) = destination {
            let current = self.values.get(id).copied().unwrap_or_default();
            self.router.bind(id, current)?;
            log::info!(target: "modsynth::modulation", "LFO -> {}", id);
        }
        Ok(())
    }

    pub fn set_lfo(&mut self, settings: LfoSettings) {
        self.lfo = LfoSettings {
            amount_percent: settings.amount_percent.clamp(0.0, 100.0),
            ..settings
        };
    }

    pub fn lfo(&self) -> LfoSettings {
        self.lfo
    }

    pub fn router(&self) -> &ModulationRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut ModulationRouter {
        &mut self.router
    }

    // ─── Display frames ─────────────────────────────────────────────

    pub fn start_frames(&mut self) -> Option<FrameRequest> {
        self.frames.start()
    }

    pub fn stop_frames(&mut self) {
        self.frames.stop();
    }

    pub fn set_visible(&mut self, visible: bool) -> Option<FrameRequest> {
        self.frames.set_visible(visible)
    }

    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.frames.pending()
    }

    /// Run one display frame at wall-clock `timestamp` seconds. Returns
    /// whether the frame did any work.
    pub fn on_animation_frame(&mut self, request: FrameRequest, timestamp: f64) -> bool {
        if !self.frames.on_frame(request, timestamp) {
            return false;
        }
        let LfoSettings {
            rate_hz,
            shape,
            amount_percent,
        } = self.lfo;
        self.router
            .tick(timestamp, rate_hz, shape, amount_percent, &mut self.voices);
        true
    }

    // ─── Transport ──────────────────────────────────────────────────

    /// Start playback of sequencer, drums and arpeggiator.
    pub fn start_transport(&mut self) -> EngineResult {
        self.ensure_voice_engine()?;
        self.transport.sequencer_mut().start();
        self.transport.drums_mut().start();
        self.transport.start(&mut self.clock);
        Ok(())
    }

    pub fn stop_transport(&mut self) {
        self.transport.stop(&mut self.clock, &mut self.voices);
        self.transport.sequencer_mut().stop();
        self.transport.drums_mut().stop();
    }

    /// Deliver one clock firing. Due timers run first so releases land
    /// before the next attacks.
    pub fn on_clock_tick(&mut self, handle: TickHandle, time: f64) -> Vec<TransportEvent> {
        self.voices.poll(time);
        self.transport.on_clock_tick(handle, time, &mut self.voices)
    }

    /// Run disposal checks and timed releases due at `now`.
    pub fn poll(&mut self, now: f64) {
        self.voices.poll(now);
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.transport.set_bpm(bpm, &mut self.clock);
    }

    pub fn set_arp_rate(&mut self, rate_bpm: f64) {
        self.transport.set_arp_rate(rate_bpm, &mut self.clock);
    }

    // ─── Notes ──────────────────────────────────────────────────────

    pub fn note_on(&mut self, note: Note) -> EngineResult {
        let now = self.clock.now();
        self.voices.trigger_note(note, now).map(|_| ())
    }

    pub fn note_off(&mut self, note: Note) {
        let now = self.clock.now();
        self.voices.release_note(note, now);
    }

    pub fn arp_add(&mut self, note: Note) -> bool {
        self.transport.arpeggiator_mut().add_note(note)
    }

    pub fn arp_remove(&mut self, note: Note) -> bool {
        let now = self.clock.now();
        let (transport, voices) = (&mut self.transport, &mut self.voices);
        transport.arpeggiator_mut().remove_note(note, now, voices)
    }

    pub fn arp_update_octave(&mut self, old_octave: i32, new_octave: i32) -> bool {
        self.transport.arpeggiator_mut().update_octave(old_octave, new_octave)
    }

    // ─── Presets ────────────────────────────────────────────────────

    /// Apply a previously exported preset. Values are clamped, unknown
    /// parameters skipped and partial step arrays applied as far as they go.
    pub fn apply_preset(&mut self, preset: &PresetState) {
        for (id, value) in preset.resolved_parameters(&self.registry) {
            // ids were resolved against the registry above
            let _ = self.set_parameter(&id, value);
        }

        if !preset.sequencer.is_empty() {
            self.transport.sequencer_mut().load(&preset.sequencer);
        }
        for (lane, steps) in &preset.drums {
            self.transport.drums_mut().load_lane(*lane, steps);
        }

        if let Some(arp) = &preset.arpeggiator {
            self.set_arp_rate(arp.rate);
            let a = self.transport.arpeggiator_mut();
            a.set_direction(arp.direction);
            a.set_gate(arp.gate);
            a.set_swing(arp.swing);
        }

        if let Some(lfo) = &preset.lfo {
            self.set_lfo(lfo.settings);
            let destination = lfo.destination.as_deref().filter(|id| {
                let known = self.registry.contains(id);
                if !known {
                    log::warn!(target: "modsynth::preset", "skipping unknown LFO destination '{}'", id);
                }
                known
            });
            if let Err(e) = self.select_lfo_destination(destination) {
                log::warn!(target: "modsynth::preset", "LFO destination not applied: {}", e);
            }
        }
        log::info!(
            target: "modsynth::preset",
            "applied preset ({} parameters, {} steps)",
            preset.parameters.len(),
            preset.sequencer.len()
        );
    }

    pub fn export_preset(&self) -> PresetState {
        let parameters = self.values.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let pattern = self.transport.drums().pattern();
        let drums = DrumLane::all()
            .into_iter()
            .map(|lane| {
                let steps: Vec<bool> = (0..STEP_COUNT).map(|i| pattern.is_set(lane, i)).collect();
                (lane, steps)
            })
            .collect();
        let arp = self.transport.arpeggiator();
        PresetState {
            parameters,
            sequencer: self.transport.sequencer().steps().to_vec(),
            drums,
            arpeggiator: Some(ArpPreset {
                direction: arp.direction(),
                rate: arp.rate(),
                gate: arp.gate(),
                swing: arp.swing(),
            }),
            lfo: Some(LfoPreset {
                settings: self.lfo,
                destination: self.router.binding().map(|b| b.destination_id.clone()),
            }),
        }
    }

    // ─── Access ─────────────────────────────────────────────────────

    pub fn subscribe_notes(&mut self) -> Receiver<NoteEvent> {
        self.voices.subscribe()
    }

    pub fn subscribe_transport(&mut self) -> Receiver<TransportEvent> {
        self.transport.subscribe()
    }

    pub fn voices(&self) -> &VoiceLifecycleManager {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut VoiceLifecycleManager {
        &mut self.voices
    }

    pub fn transport(&self) -> &TransportScheduler {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut TransportScheduler {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{TestBackend, TestOp};
    use crate::clock::ManualClock;
    use modsynth_types::LfoShape;

    fn workstation() -> (Workstation<ManualClock>, Arc<TestBackend>) {
        let backend = Arc::new(TestBackend::new());
        let ws = Workstation::new(&Config::load_from(None), Box::new(Arc::clone(&backend)), ManualClock::new());
        (ws, backend)
    }

    #[test]
    fn rebuild_reapplies_parameter_values() {
        let (mut ws, backend) = workstation();
        ws.set_parameter("reverb.wet", 70.0).unwrap();
        assert!(backend.parameter_writes().is_empty());

        ws.ensure_voice_engine().unwrap();
        let writes = backend.parameter_writes();
        assert_eq!(writes.len(), ws.registry().len());
        assert!(writes.contains(&("reverb.wet".to_string(), 0.7)));
    }

    #[test]
    fn set_parameter_clamps_and_rejects_unknown() {
        let (mut ws, _) = workstation();
        assert_eq!(ws.set_parameter("delay.feedback", 120.0).unwrap(), 95.0);
        assert!(ws.set_parameter("delay.slope", 1.0).is_err());
    }

    #[test]
    fn lfo_frames_modulate_bound_parameter() {
        let (mut ws, backend) = workstation();
        ws.ensure_voice_engine().unwrap();
        ws.set_lfo(LfoSettings {
            rate_hz: 1.0,
            shape: LfoShape::Square,
            amount_percent: 100.0,
        });
        ws.set_parameter("reverb.wet", 50.0).unwrap();
        ws.select_lfo_destination(Some("reverb.wet")).unwrap();
        backend.clear();

        let req = ws.start_frames().unwrap();
        assert!(ws.on_animation_frame(req, 0.1));
        assert_eq!(backend.parameter_writes(), vec![("reverb.wet".to_string(), 1.0)]);

        // moving the knob while modulated shifts the baseline only
        ws.set_parameter("reverb.wet", 20.0).unwrap();
        assert_eq!(backend.parameter_writes().len(), 1);

        ws.select_lfo_destination(None).unwrap();
        assert_eq!(backend.parameter_writes().last(), Some(&("reverb.wet".to_string(), 0.2)));
    }

    #[test]
    fn unknown_destination_keeps_existing_binding() {
        let (mut ws, _) = workstation();
        ws.select_lfo_destination(Some("filter.frequency")).unwrap();
        assert!(ws.select_lfo_destination(Some("nope")).is_err());
        assert_eq!(ws.router().binding().unwrap().destination_id, "filter.frequency");
    }

    #[test]
    fn start_transport_retries_latched_failure() {
        let (mut ws, backend) = workstation();
        backend.set_fail_create(true);
        assert!(ws.start_transport().is_err());
        assert!(!ws.transport().is_playing());

        backend.set_fail_create(false);
        ws.start_transport().unwrap();
        assert!(ws.transport().is_playing());
        assert_eq!(backend.count(|op| matches!(op, TestOp::CreateEngine { .. })), 1);
    }

    #[test]
    fn preset_round_trip_through_export() {
        let (mut ws, _) = workstation();
        ws.set_parameter("filter.frequency", 880.0).unwrap();
        ws.transport_mut().sequencer_mut().set_enabled(4, true);
        ws.transport_mut().drums_mut().set(DrumLane::Clap, 12, true);
        ws.select_lfo_destination(Some("chorus.depth")).unwrap();
        let exported = ws.export_preset();

        let (mut other, _) = workstation();
        other.apply_preset(&exported);
        assert_eq!(other.parameter_value("filter.frequency"), Some(880.0));
        assert!(other.transport().sequencer().step(4).unwrap().enabled);
        assert!(other.transport().drums().pattern().is_set(DrumLane::Clap, 12));
        assert_eq!(other.router().binding().unwrap().destination_id, "chorus.depth");
        assert_eq!(other.export_preset(), exported);
    }
}
