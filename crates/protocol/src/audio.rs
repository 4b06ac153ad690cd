//! Audio-Payload der Agent-Verbindung
//!
//! Agent-Audio kommt auf zwei Wegen: als binaerer WebSocket-Frame oder als
//! Base64-String im JSON-Feld `data`. Beide Wege landen im selben
//! PCM16-Dekodierpfad (Little-Endian, Mono, ausgehandelte Rate).

use bytes::Bytes;
use voxlink_core::{AudioFrame, FrameError};

use crate::codec::TransportCodec;

/// Roh-Audio wie es ueber die Leitung kam
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPayload {
    /// Binaerer Frame: rohes PCM16
    Binary(Bytes),
    /// JSON-Pfad: Base64-kodiertes PCM16
    Base64(String),
}

impl AudioPayload {
    /// Kodiert einen Frame fuer den JSON-Pfad
    pub fn from_frame(frame: &AudioFrame) -> Self {
        AudioPayload::Base64(TransportCodec::encode(&frame.to_le_bytes()))
    }

    /// Dekodiert den Payload in einen Frame der gegebenen Rate.
    ///
    /// Leere oder ungueltige Payloads sind ein Fehler fuer genau diesen Chunk.
    pub fn decode(&self, sample_rate: u32) -> Result<AudioFrame, FrameError> {
        match self {
            AudioPayload::Binary(bytes) => AudioFrame::from_le_bytes(bytes, sample_rate),
            AudioPayload::Base64(text) => {
                let bytes =
                    TransportCodec::decode(text).map_err(|e| FrameError::kodierung(e.to_string()))?;
                AudioFrame::from_le_bytes(&bytes, sample_rate)
            }
        }
    }

    /// Liefert den Base64-Text fuer den JSON-Pfad
    pub fn als_base64(&self) -> String {
        match self {
            AudioPayload::Binary(bytes) => TransportCodec::encode(bytes),
            AudioPayload::Base64(text) => text.clone(),
        }
    }

    /// Groesse auf der Leitung in Bytes
    pub fn len(&self) -> usize {
        match self {
            AudioPayload::Binary(bytes) => bytes.len(),
            AudioPayload::Base64(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
