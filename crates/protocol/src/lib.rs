//! voxlink-protocol – Nachrichten der persistenten Agent-Verbindung
//!
//! Dieses Crate definiert alle Nachrichtentypen die zwischen Client und
//! Agent ausgetauscht werden, sowie den verlustfreien Base64-Transportcodec
//! fuer Audio im JSON-Pfad.

pub mod audio;
pub mod codec;
pub mod control;
pub mod error;

pub use audio::AudioPayload;
pub use codec::TransportCodec;
pub use control::{ControlMessage, ErrorPayload, FunctionCall};
pub use error::ProtocolError;
