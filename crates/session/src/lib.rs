//! # voxlink-session
//!
//! Verbindet Mikrofon, Agent und Lautsprecher zu einer Sprachsession:
//!
//! - [`connection`]: persistente WebSocket-Verbindung zum Agenten
//! - [`turn`]: Zustandsautomat fuer Benutzer- und Agent-Turns (Barge-in)
//! - [`uplink`]: Mikrofon-Frames umtasten, VAD, buendeln, senden
//! - [`session`]: Lebenszyklus und Koordinationsschleife

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod session;
pub mod turn;
pub mod uplink;

pub use config::{SessionConfig, AGENT_RATE};
pub use connection::{CloseReason, Connection, ConnectionSender, Inbound};
pub use error::{SessionError, SessionResult, TransportError};
pub use event::SessionEvent;
pub use session::{AudioDevices, SessionHandle, StreamSession};
pub use turn::TurnCoordinator;
pub use uplink::Uplink;
