//! Fehlertypen fuer Audio-Frames
//!
//! Ein `FrameError` betrifft immer genau einen Chunk. Die Session
//! verwirft den betroffenen Chunk und laeuft weiter.

use thiserror::Error;

/// Fehler beim Dekodieren eines Audio-Chunks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Leerer Audio-Chunk")]
    Leer,

    #[error("PCM16-Daten mit ungerader Laenge: {0} Bytes")]
    UngeradeLaenge(usize),

    #[error("Ungueltige Abtastrate: {0} Hz")]
    UngueltigeRate(u32),

    #[error("Audio-Payload nicht dekodierbar: {0}")]
    Kodierung(String),
}

impl FrameError {
    /// Erstellt einen Kodierungsfehler aus einer beliebigen Nachricht
    pub fn kodierung(msg: impl Into<String>) -> Self {
        Self::Kodierung(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehlermeldungen_lesbar() {
        assert_eq!(FrameError::Leer.to_string(), "Leerer Audio-Chunk");
        assert!(FrameError::UngeradeLaenge(3).to_string().contains('3'));
        assert!(FrameError::kodierung("kaputt").to_string().contains("kaputt"));
    }
}
