//! Voice Activity Detection (VAD)
//!
//! Energie-basierte VAD mit adaptivem Rauschboden. Liefert Ereignisse
//! statt eines Dauerzustands: Sprachbeginn, Sprachende nach genug Stille,
//! und Fehlausloesung, wenn die "Sprache" zu kurz war.

use std::collections::VecDeque;
use std::time::Duration;

use voxlink_core::{AudioFrame, VadEvent};

/// Austauschbare Spracherkennung
pub trait VoiceDetector: Send {
    /// Analysiert einen Frame. Veraendert die Samples nicht.
    fn process(&mut self, frame: &AudioFrame) -> Option<VadEvent>;

    /// Setzt den internen Zustand zurueck
    fn reset(&mut self);
}

/// Konfiguration fuer die Energie-VAD
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Mindest-Energie (RMS, normalisiert 0.0..1.0) fuer Sprache
    pub schwellwert: f32,
    /// Kuerzere Sprache gilt als Fehlausloesung
    pub min_sprache: Duration,
    /// Stille, nach der Sprache als beendet gilt
    pub stille: Duration,
    /// Anzahl Frames fuer die Rauschboden-Schaetzung
    pub verlauf: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            schwellwert: 0.02,
            min_sprache: Duration::from_millis(100),
            stille: Duration::from_millis(200),
            verlauf: 50,
        }
    }
}

/// Ab so vielen Frames im Verlauf wird der Rauschboden geschaetzt
const MIN_VERLAUF_FUER_BODEN: usize = 10;
/// Sprache muss den Rauschboden um diesen Faktor uebersteigen
const BODEN_FAKTOR: f32 = 3.0;

/// Energie-VAD mit adaptivem Rauschboden
pub struct EnergyVad {
    config: VadConfig,
    spricht: bool,
    sprechdauer: Duration,
    stilledauer: Duration,
    verlauf: VecDeque<f32>,
    sortiert: Vec<f32>,
    rauschboden: f32,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Self {
        let kapazitaet = config.verlauf.max(1);
        Self {
            config,
            spricht: false,
            sprechdauer: Duration::ZERO,
            stilledauer: Duration::ZERO,
            verlauf: VecDeque::with_capacity(kapazitaet),
            sortiert: Vec::with_capacity(kapazitaet),
            rauschboden: 0.0,
        }
    }

    /// Gibt zurueck ob gerade Sprache erkannt ist
    pub fn is_voice_active(&self) -> bool {
        self.spricht
    }

    /// Aktuell wirksame Schwelle (Konfiguration oder Rauschboden)
    pub fn schwelle(&self) -> f32 {
        self.config.schwellwert.max(self.rauschboden * BODEN_FAKTOR)
    }

    fn aktualisiere_boden(&mut self, energie: f32) {
        if self.verlauf.len() == self.config.verlauf.max(1) {
            self.verlauf.pop_front();
        }
        self.verlauf.push_back(energie);

        if self.verlauf.len() > MIN_VERLAUF_FUER_BODEN {
            self.sortiert.clear();
            self.sortiert.extend(self.verlauf.iter().copied());
            self.sortiert.sort_unstable_by(|a, b| a.total_cmp(b));
            // 25. Perzentil
            self.rauschboden = self.sortiert[self.sortiert.len() / 4];
        }
    }
}

impl VoiceDetector for EnergyVad {
    fn process(&mut self, frame: &AudioFrame) -> Option<VadEvent> {
        if frame.is_empty() {
            return None;
        }

        let energie = rms_energy(frame.samples());
        self.aktualisiere_boden(energie);
        let ist_sprache = energie > self.schwelle();
        let dauer = frame.duration();

        if ist_sprache {
            self.stilledauer = Duration::ZERO;
            if !self.spricht {
                self.spricht = true;
                self.sprechdauer = dauer;
                return Some(VadEvent::SpeechStart);
            }
            self.sprechdauer += dauer;
            return None;
        }

        if !self.spricht {
            return None;
        }

        self.stilledauer += dauer;
        if self.stilledauer < self.config.stille {
            return None;
        }

        let event = if self.sprechdauer >= self.config.min_sprache {
            VadEvent::SpeechEnd
        } else {
            VadEvent::Misfire
        };
        self.spricht = false;
        self.sprechdauer = Duration::ZERO;
        self.stilledauer = Duration::ZERO;
        Some(event)
    }

    fn reset(&mut self) {
        self.spricht = false;
        self.sprechdauer = Duration::ZERO;
        self.stilledauer = Duration::ZERO;
        self.verlauf.clear();
        self.rauschboden = 0.0;
    }
}

/// RMS-Energie eines PCM16-Puffers, normalisiert auf 0.0..1.0
pub fn rms_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let x = s as f64 / 32768.0;
            x * x
        })
        .sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 24000;

    fn frame(amplitude: i16, ms: u32) -> AudioFrame {
        let n = (RATE * ms / 1000) as usize;
        // Rechteck, damit RMS == Amplitude
        let samples: Vec<i16> = (0..n)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect();
        AudioFrame::new(samples, RATE)
    }

    #[test]
    fn stille_ohne_ereignis() {
        let mut vad = EnergyVad::new(VadConfig::default());
        for _ in 0..20 {
            assert_eq!(vad.process(&frame(0, 20)), None);
        }
        assert!(!vad.is_voice_active());
    }

    #[test]
    fn sprache_dann_stille_ergibt_ende() {
        let mut vad = EnergyVad::new(VadConfig::default());
        assert_eq!(vad.process(&frame(8000, 100)), Some(VadEvent::SpeechStart));
        assert_eq!(vad.process(&frame(8000, 100)), None);
        assert_eq!(vad.process(&frame(0, 100)), None);
        assert_eq!(vad.process(&frame(0, 100)), Some(VadEvent::SpeechEnd));
        assert!(!vad.is_voice_active());
    }

    #[test]
    fn kurzer_knack_ist_fehlausloesung() {
        let mut vad = EnergyVad::new(VadConfig::default());
        assert_eq!(vad.process(&frame(8000, 20)), Some(VadEvent::SpeechStart));
        assert_eq!(vad.process(&frame(0, 100)), None);
        assert_eq!(vad.process(&frame(0, 100)), Some(VadEvent::Misfire));
    }

    #[test]
    fn kurze_pause_beendet_nicht() {
        let mut vad = EnergyVad::new(VadConfig::default());
        vad.process(&frame(8000, 100));
        assert_eq!(vad.process(&frame(0, 100)), None);
        // Sprache setzt die Stille zurueck
        assert_eq!(vad.process(&frame(8000, 100)), None);
        assert_eq!(vad.process(&frame(0, 100)), None);
        assert!(vad.is_voice_active());
    }

    #[test]
    fn rauschboden_hebt_schwelle() {
        let mut vad = EnergyVad::new(VadConfig::default());
        // Konstantes Rauschen bei ~0.05
        for _ in 0..MIN_VERLAUF_FUER_BODEN + 1 {
            vad.process(&frame(1638, 20));
        }
        assert!(vad.schwelle() > 0.14 && vad.schwelle() < 0.16);
    }

    #[test]
    fn reset_vergisst_zustand() {
        let mut vad = EnergyVad::new(VadConfig::default());
        vad.process(&frame(8000, 100));
        vad.reset();
        assert!(!vad.is_voice_active());
        assert_eq!(vad.schwelle(), VadConfig::default().schwellwert);
    }

    #[test]
    fn rms_normalisiert() {
        assert_eq!(rms_energy(&[]), 0.0);
        let e = rms_energy(&[16384, -16384]);
        assert!((e - 0.5).abs() < 1e-6);
    }
}
