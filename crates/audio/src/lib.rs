//! voxlink-audio - Audio-Engine des Sprachclients
//!
//! - Mikrofon-Capture via cpal mit fester Framegroesse
//! - Lineares Resampling zwischen Geraete- und Transportrate
//! - Energie-VAD (Sprachbeginn, Sprachende, Fehlausloesung)
//! - Batching fuer den Uplink
//! - Lueckenlose, zeitgenaue Wiedergabe mit Abbruch (Barge-in)

pub mod batcher;
pub mod capture;
pub mod clock;
pub mod device;
pub mod error;
pub mod playback;
pub mod resampler;
pub mod scheduler;
pub mod vad;

// Bequeme Re-Exporte der wichtigsten Typen
pub use batcher::{AudioBatcher, BatchStats};
pub use capture::{
    AudioCapture, CaptureStats, CpalMicrophone, FrameAssembler, MicrophoneSource, SampleCallback,
    DEFAULT_FRAME_SIZE,
};
pub use clock::{Clock, DeviceClock, ManualClock, MonotonicClock};
pub use device::{list_input_devices, list_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
pub use playback::{
    CpalPlayback, CpalPlaybackSink, MixerBefehl, OutputDevice, PlaybackConfig, TimelineMixer,
};
pub use resampler::{resample, resample_frame};
pub use scheduler::{
    ChunkId, CompletionFn, PlaybackQueueEntry, PlaybackScheduler, PlaybackSink, SchedulerConfig,
    SchedulerPhase,
};
pub use vad::{EnergyVad, VadConfig, VoiceDetector};
