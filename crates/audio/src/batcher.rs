//! Zusammenfassen kleiner Frames zu groesseren Sendeeinheiten
//!
//! Mit `batch_ms = 0` werden Frames unveraendert durchgereicht.

use std::time::Duration;

use voxlink_core::AudioFrame;

use crate::capture::FrameAssembler;

/// Zaehler des Batchers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub frames_empfangen: u64,
    pub batches_gesendet: u64,
}

/// Sammelt Frames bis zur Zieldauer
#[derive(Debug)]
pub struct AudioBatcher {
    ziel: Duration,
    assembler: Option<FrameAssembler>,
    stats: BatchStats,
}

impl AudioBatcher {
    pub fn new(batch_ms: u32) -> Self {
        Self {
            ziel: Duration::from_millis(batch_ms as u64),
            assembler: None,
            stats: BatchStats::default(),
        }
    }

    /// Nimmt einen Frame an; volle Batches gehen an `emit`
    pub fn push(&mut self, frame: AudioFrame, mut emit: impl FnMut(AudioFrame)) {
        self.stats.frames_empfangen += 1;
        if self.ziel.is_zero() {
            self.stats.batches_gesendet += 1;
            emit(frame);
            return;
        }

        let ziel_samples =
            ((frame.sample_rate() as u128 * self.ziel.as_millis() / 1000) as usize).max(1);
        if self.assembler.as_ref().map(FrameAssembler::frame_size) != Some(ziel_samples) {
            self.assembler = Some(FrameAssembler::new(ziel_samples));
        }
        let Some(assembler) = self.assembler.as_mut() else {
            return;
        };

        let gesendet = &mut self.stats.batches_gesendet;
        assembler.push(frame.samples(), frame.sample_rate(), |batch| {
            *gesendet += 1;
            emit(batch);
        });
    }

    /// Gibt den angefangenen Rest aus
    pub fn flush(&mut self) -> Option<AudioFrame> {
        let rest = self.assembler.as_mut()?.flush()?;
        self.stats.batches_gesendet += 1;
        Some(rest)
    }

    /// Verwirft gepufferte Samples
    pub fn reset(&mut self) {
        if let Some(a) = self.assembler.as_mut() {
            a.clear();
        }
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }
}
