//! voxlink-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Voxlink-Crates gemeinsam genutzt werden: Audio-Frames,
//! Gespraechszustand und VAD-Ereignisse.

pub mod error;
pub mod event;
pub mod frame;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::FrameError;
pub use event::VadEvent;
pub use frame::AudioFrame;
pub use types::{SessionId, TurnState};
