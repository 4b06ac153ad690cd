//! Transportcodec fuer Audio im Text-Pfad
//!
//! Binaer <-> Base64 (Standard-Alphabet mit Padding). Die Kodierung laeuft
//! intern in Bloecken, um bei sehr grossen Puffern keine riesigen
//! Einzelaufrufe zu erzeugen. Das Ergebnis ist trotzdem ein einziger
//! zusammenhaengender String, identisch zur Kodierung am Stueck.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ProtocolError;

/// Blockgroesse fuer die Kodierung in Bytes.
///
/// Vielfaches von 3, damit an Blockgrenzen kein Padding entsteht
/// (32 KiB abgerundet).
pub const ENCODE_BLOCK_BYTES: usize = 32 * 1024 - (32 * 1024) % 3;

/// Verlustfreier Binaer/Text-Codec
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportCodec;

impl TransportCodec {
    /// Kodiert Bytes als Base64-String
    pub fn encode(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
        for block in bytes.chunks(ENCODE_BLOCK_BYTES) {
            STANDARD.encode_string(block, &mut out);
        }
        out
    }

    /// Dekodiert einen Base64-String. Exakte Umkehrung von [`encode`](Self::encode).
    pub fn decode(text: &str) -> Result<Vec<u8>, ProtocolError> {
        Ok(STANDARD.decode(text.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn muster(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn blockgroesse_vielfaches_von_drei() {
        assert_eq!(ENCODE_BLOCK_BYTES % 3, 0);
        assert!(ENCODE_BLOCK_BYTES > 32_000);
    }

    #[test]
    fn leerer_puffer() {
        assert_eq!(TransportCodec::encode(&[]), "");
        assert_eq!(TransportCodec::decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn kleine_puffer_umkehrbar() {
        for len in 0..10 {
            let daten = muster(len);
            let text = TransportCodec::encode(&daten);
            assert_eq!(TransportCodec::decode(&text).unwrap(), daten, "Laenge {len}");
        }
    }

    #[test]
    fn mehrere_bloecke_umkehrbar() {
        // Ueber Blockgrenzen hinweg, mit Rest
        let daten = muster(ENCODE_BLOCK_BYTES * 3 + 7);
        let text = TransportCodec::encode(&daten);
        assert_eq!(TransportCodec::decode(&text).unwrap(), daten);
    }

    #[test]
    fn blockweise_gleich_am_stueck() {
        let daten = muster(ENCODE_BLOCK_BYTES * 2 + 1);
        assert_eq!(TransportCodec::encode(&daten), STANDARD.encode(&daten));
    }

    #[test]
    fn ungueltiges_base64() {
        assert!(matches!(
            TransportCodec::decode("@@nicht base64@@"),
            Err(ProtocolError::Base64(_))
        ));
    }
}
