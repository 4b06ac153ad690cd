//! Prometheus-kompatible Metriken einer Sprachsession
//!
//! Jede Session hat ihre eigene Registry, damit parallele Sessions (und
//! Tests) sich nicht gegenseitig zaehlen.
//!
//! Registrierte Metriken:
//! - `voxlink_frames_captured_total` - Counter: Aufgenommene Frames
//! - `voxlink_frames_dropped_total` - Counter: Verworfene Frames (Rueckstau)
//! - `voxlink_audio_chunks_sent_total` - Counter: Gesendete Audio-Chunks
//! - `voxlink_audio_chunks_scheduled_total` - Counter: Geplante Agent-Chunks
//! - `voxlink_decode_errors_total` - Counter: Nicht dekodierbare Agent-Chunks
//! - `voxlink_protocol_errors_total` - Counter: Verworfene Nachrichten
//! - `voxlink_interruptions_total` - Counter: Barge-ins
//! - `voxlink_turns_completed_total` - Counter: Abgeschlossene Agent-Turns
//! - `voxlink_playback_pending_chunks` - Gauge: Noch nicht abgespielte Chunks
//! - `voxlink_schedule_lead_seconds` - Histogram: Vorlauf geplanter Chunks

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Metriken einer Session
#[derive(Clone)]
pub struct SessionMetrics {
    pub registry: Arc<Registry>,

    // Uplink
    pub frames_captured: IntCounter,
    pub frames_dropped: IntCounter,
    pub audio_chunks_sent: IntCounter,

    // Downlink
    pub audio_chunks_scheduled: IntCounter,
    pub decode_errors: IntCounter,
    pub protocol_errors: IntCounter,
    pub playback_pending_chunks: IntGauge,
    pub schedule_lead_seconds: Histogram,

    // Turns
    pub interruptions: IntCounter,
    pub turns_completed: IntCounter,
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl SessionMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Uplink ---
        let frames_captured = zaehler(
            &registry,
            "voxlink_frames_captured_total",
            "Anzahl aufgenommener Mikrofon-Frames",
        )?;
        let frames_dropped = zaehler(
            &registry,
            "voxlink_frames_dropped_total",
            "Anzahl verworfener Frames wegen Rueckstau",
        )?;
        let audio_chunks_sent = zaehler(
            &registry,
            "voxlink_audio_chunks_sent_total",
            "Anzahl an den Agent gesendeter Audio-Chunks",
        )?;

        // --- Downlink ---
        let audio_chunks_scheduled = zaehler(
            &registry,
            "voxlink_audio_chunks_scheduled_total",
            "Anzahl zur Wiedergabe geplanter Agent-Chunks",
        )?;
        let decode_errors = zaehler(
            &registry,
            "voxlink_decode_errors_total",
            "Anzahl nicht dekodierbarer Agent-Chunks",
        )?;
        let protocol_errors = zaehler(
            &registry,
            "voxlink_protocol_errors_total",
            "Anzahl verworfener ungueltiger Nachrichten",
        )?;

        let playback_pending_chunks = IntGauge::with_opts(Opts::new(
            "voxlink_playback_pending_chunks",
            "Geplante, noch nicht abgespielte Chunks",
        ))?;
        registry.register(Box::new(playback_pending_chunks.clone()))?;

        let schedule_lead_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "voxlink_schedule_lead_seconds",
                "Abstand zwischen Planung und Start eines Chunks in Sekunden",
            )
            .buckets(vec![0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(schedule_lead_seconds.clone()))?;

        // --- Turns ---
        let interruptions = zaehler(
            &registry,
            "voxlink_interruptions_total",
            "Anzahl Unterbrechungen des Agents durch den Benutzer",
        )?;
        let turns_completed = zaehler(
            &registry,
            "voxlink_turns_completed_total",
            "Anzahl abgeschlossener Agent-Turns",
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            frames_captured,
            frames_dropped,
            audio_chunks_sent,
            audio_chunks_scheduled,
            decode_errors,
            protocol_errors,
            playback_pending_chunks,
            schedule_lead_seconds,
            interruptions,
            turns_completed,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for SessionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMetrics")
            .field("audio_chunks_sent", &self.audio_chunks_sent.get())
            .field("audio_chunks_scheduled", &self.audio_chunks_scheduled.get())
            .field("interruptions", &self.interruptions.get())
            .finish_non_exhaustive()
    }
}
