//! Audio-Geraete: Auflistung, Auswahl und Fehlerabbildung
//!
//! Geraete werden ueber einen Namensteil gewaehlt (`None` = Standardgeraet).
//! Fehler von cpal werden hier in [`AudioError`] uebersetzt, damit
//! Berechtigungs- und Geraeteprobleme unterscheidbar bleiben.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BuildStreamError, DefaultStreamConfigError, Device};
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

/// Abtastraten, die bei der Auflistung geprueft werden
const GAENGIGE_RATEN: [u32; 5] = [16000, 22050, 24000, 44100, 48000];

/// Ein Audio-Geraet mit seinen Eigenschaften
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Anzeigename des Geraets
    pub name: String,
    /// Unterstuetzte gaengige Abtastraten
    pub sample_rates: Vec<u32>,
    /// Maximale Kanalanzahl
    pub channels: u16,
    /// Ist das Standardgeraet des Hosts
    pub standard: bool,
}

/// Richtung eines Geraets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Richtung {
    Eingabe,
    Ausgabe,
}

/// Listet alle verfuegbaren Eingabegeraete auf
pub fn list_input_devices() -> AudioResult<Vec<AudioDevice>> {
    list_devices(Richtung::Eingabe)
}

/// Listet alle verfuegbaren Ausgabegeraete auf
pub fn list_output_devices() -> AudioResult<Vec<AudioDevice>> {
    list_devices(Richtung::Ausgabe)
}

fn list_devices(richtung: Richtung) -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let (devices, standard) = match richtung {
        Richtung::Eingabe => (
            host.input_devices(),
            host.default_input_device().and_then(|d| d.name().ok()),
        ),
        Richtung::Ausgabe => (
            host.output_devices(),
            host.default_output_device().and_then(|d| d.name().ok()),
        ),
    };
    let devices = devices.map_err(|e| AudioError::aus_backend(e.to_string()))?;

    let mut result = Vec::new();
    for device in devices {
        match beschreibe(&device, richtung) {
            Ok(mut ad) => {
                ad.standard = standard.as_deref() == Some(ad.name.as_str());
                result.push(ad);
            }
            Err(e) => warn!(?richtung, fehler = %e, "Geraet konnte nicht gelesen werden"),
        }
    }
    debug!(?richtung, anzahl = result.len(), "Geraete aufgelistet");
    Ok(result)
}

/// Laedt ein cpal-Device fuer die Eingabe
pub fn load_cpal_input_device(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or(AudioError::KeinStandardEingabegeraet),
        Some(n) => {
            let devices = host
                .input_devices()
                .map_err(|e| AudioError::aus_backend(e.to_string()))?;
            finde(devices, n)
        }
    }
}

/// Laedt ein cpal-Device fuer die Ausgabe
pub fn load_cpal_output_device(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or(AudioError::KeinStandardAusgabegeraet),
        Some(n) => {
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::aus_backend(e.to_string()))?;
            finde(devices, n)
        }
    }
}

fn finde(devices: impl Iterator<Item = Device>, name: &str) -> AudioResult<Device> {
    for device in devices {
        if let Ok(dev_name) = device.name() {
            if dev_name.contains(name) {
                return Ok(device);
            }
        }
    }
    Err(AudioError::GeraetNichtGefunden(name.to_string()))
}

/// Uebersetzt Fehler beim Stream-Aufbau
pub(crate) fn build_fehler(err: BuildStreamError) -> AudioError {
    match err {
        BuildStreamError::DeviceNotAvailable => {
            AudioError::GeraetNichtGefunden("Geraet nicht mehr verfuegbar".into())
        }
        BuildStreamError::BackendSpecific { err } => AudioError::aus_backend(err.description),
        other => AudioError::StreamFehler(other.to_string()),
    }
}

/// Uebersetzt Fehler beim Abfragen der Standardkonfiguration
pub(crate) fn config_fehler(err: DefaultStreamConfigError) -> AudioError {
    match err {
        DefaultStreamConfigError::DeviceNotAvailable => {
            AudioError::GeraetNichtGefunden("Geraet nicht mehr verfuegbar".into())
        }
        DefaultStreamConfigError::BackendSpecific { err } => {
            AudioError::aus_backend(err.description)
        }
        other => AudioError::StreamFehler(other.to_string()),
    }
}

fn beschreibe(device: &Device, richtung: Richtung) -> AudioResult<AudioDevice> {
    let name = device
        .name()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let configs: Vec<_> = match richtung {
        Richtung::Eingabe => device
            .supported_input_configs()
            .map(|c| c.collect())
            .unwrap_or_default(),
        Richtung::Ausgabe => device
            .supported_output_configs()
            .map(|c| c.collect())
            .unwrap_or_default(),
    };

    let mut sample_rates = Vec::new();
    let mut channels = 1u16;
    for cfg in &configs {
        let (min, max) = (cfg.min_sample_rate().0, cfg.max_sample_rate().0);
        for rate in GAENGIGE_RATEN {
            if (min..=max).contains(&rate) && !sample_rates.contains(&rate) {
                sample_rates.push(rate);
            }
        }
        channels = channels.max(cfg.channels());
    }
    sample_rates.sort_unstable();

    Ok(AudioDevice {
        name,
        sample_rates,
        channels,
        standard: false,
    })
}
