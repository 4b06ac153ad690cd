//! Unveraenderlicher PCM16-Audio-Frame
//!
//! Ein `AudioFrame` haelt Mono-Samples (signed 16 Bit) und die Abtastrate,
//! mit der sie erzeugt wurden. Die Rate aendert sich nach der Erzeugung nie.
//! Klonen ist billig (`Arc<[i16]>`), die Samples werden nie kopiert.

use std::sync::Arc;
use std::time::Duration;

use crate::error::FrameError;

/// Bytes pro PCM16-Sample
pub const BYTES_PRO_SAMPLE: usize = 2;

/// Unveraenderlicher Puffer aus PCM16-Samples mit fester Abtastrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Arc<[i16]>,
    sample_rate: u32,
}

impl AudioFrame {
    /// Erstellt einen Frame aus Samples und Abtastrate
    pub fn new(samples: impl Into<Arc<[i16]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Dekodiert Little-Endian PCM16-Bytes (Mono) in einen Frame.
    ///
    /// Leere Puffer und ungerade Laengen sind ungueltig.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Result<Self, FrameError> {
        if sample_rate == 0 {
            return Err(FrameError::UngueltigeRate(sample_rate));
        }
        if bytes.is_empty() {
            return Err(FrameError::Leer);
        }
        if bytes.len() % BYTES_PRO_SAMPLE != 0 {
            return Err(FrameError::UngeradeLaenge(bytes.len()));
        }

        let samples: Vec<i16> = bytes
            .chunks_exact(BYTES_PRO_SAMPLE)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        Ok(Self::new(samples, sample_rate))
    }

    /// Serialisiert die Samples als Little-Endian PCM16
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * BYTES_PRO_SAMPLE);
        for s in self.samples.iter() {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// Die Samples des Frames
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Abtastrate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Anzahl Samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Abspieldauer des Frames.
    ///
    /// Ganzzahlig in Nanosekunden berechnet, damit gleich lange Frames
    /// exakt gleich lange Dauern ergeben.
    pub fn duration(&self) -> Duration {
        samples_zu_dauer(self.samples.len(), self.sample_rate)
    }
}

/// Rechnet eine Sample-Anzahl bei gegebener Rate in eine Dauer um
pub fn samples_zu_dauer(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = samples as u128 * 1_000_000_000u128 / sample_rate as u128;
    Duration::from_nanos(nanos as u64)
}
