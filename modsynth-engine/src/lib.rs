pub mod arpeggiator;
pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame_loop;
pub mod lfo;
pub mod modulation;
pub mod preset;
pub mod registry;
pub mod sequencer;
pub mod timers;
pub mod transport;
pub mod voices;
pub mod workstation;

pub use arpeggiator::{ArpStep, Arpeggiator};
pub use backend::{AudioBackend, BackendError, EngineRef, LogBackend, NullBackend, TestBackend, TestOp};
pub use clock::{ClockFiring, ManualClock, TickHandle, TransportClock};
pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use frame_loop::{EveryFrame, FrameLoop, FramePolicy, FrameRequest, Throttled};
pub use modulation::{ModulationBinding, ModulationRouter, ParameterSink};
pub use preset::PresetState;
pub use registry::{ParameterEntry, ParameterRegistry};
pub use sequencer::{DrumMachine, StepSequencer};
pub use transport::{TransportEvent, TransportScheduler};
pub use voices::{DisposalTiming, GenerationState, NoteEvent, NoteToken, VoiceEngineHandle, VoiceLifecycleManager};
pub use workstation::Workstation;
