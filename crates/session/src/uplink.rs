//! Uplink: Mikrofon-Frames zum Agenten
//!
//! Laeuft auf dem Pump-Thread der Aufnahme. Pro Frame: auf die Agent-Rate
//! umtasten, VAD fuettern, buendeln, Base64-kodiert senden. Jeder Schritt
//! ist O(Frame) und blockiert nicht.

use tokio::sync::mpsc;
use tracing::trace;
use voxlink_audio::{resample_frame, AudioBatcher, VoiceDetector};
use voxlink_core::{AudioFrame, VadEvent};
use voxlink_observability::SessionMetrics;
use voxlink_protocol::{AudioPayload, ControlMessage};

use crate::connection::ConnectionSender;

/// Verarbeitungskette fuer Mikrofon-Audio
pub struct Uplink {
    ziel_rate: u32,
    vad: Option<Box<dyn VoiceDetector>>,
    vad_tx: mpsc::UnboundedSender<VadEvent>,
    batcher: AudioBatcher,
    sender: ConnectionSender,
    metrics: SessionMetrics,
}

impl Uplink {
    pub fn neu(
        ziel_rate: u32,
        vad: Option<Box<dyn VoiceDetector>>,
        vad_tx: mpsc::UnboundedSender<VadEvent>,
        batch_ms: u32,
        sender: ConnectionSender,
        metrics: SessionMetrics,
    ) -> Self {
        Self {
            ziel_rate,
            vad,
            vad_tx,
            batcher: AudioBatcher::new(batch_ms),
            sender,
            metrics,
        }
    }

    /// Verarbeitet einen aufgenommenen Frame
    pub fn verarbeiten(&mut self, frame: AudioFrame) {
        self.metrics.frames_captured.inc();
        let frame = resample_frame(&frame, self.ziel_rate);

        if let Some(vad) = self.vad.as_mut() {
            if let Some(event) = vad.process(&frame) {
                trace!(%event, "VAD-Ereignis");
                let _ = self.vad_tx.send(event);
            }
        }

        let (sender, metrics) = (&self.sender, &self.metrics);
        self.batcher.push(frame, |batch| senden(sender, metrics, &batch));
    }
}

fn senden(sender: &ConnectionSender, metrics: &SessionMetrics, batch: &AudioFrame) {
    match sender.send(ControlMessage::Audio(AudioPayload::from_frame(batch))) {
        Ok(()) => metrics.audio_chunks_sent.inc(),
        // Nach dem Schliessen laeuft die Pumpe noch kurz weiter
        Err(e) => trace!(fehler = %e, "Audio-Chunk verworfen"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Ausgehend;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use voxlink_audio::{EnergyVad, VadConfig};

    fn aufbau(
        vad: bool,
        batch_ms: u32,
    ) -> (
        Uplink,
        mpsc::UnboundedReceiver<Ausgehend>,
        mpsc::UnboundedReceiver<VadEvent>,
    ) {
        let (aus_tx, aus_rx) = mpsc::unbounded_channel();
        let (vad_tx, vad_rx) = mpsc::unbounded_channel();
        let vad: Option<Box<dyn VoiceDetector>> = if vad {
            Some(Box::new(EnergyVad::new(VadConfig::default())))
        } else {
            None
        };
        let uplink = Uplink::neu(
            24000,
            vad,
            vad_tx,
            batch_ms,
            ConnectionSender::neu(aus_tx, Arc::new(AtomicBool::new(false))),
            SessionMetrics::neu().unwrap(),
        );
        (uplink, aus_rx, vad_rx)
    }

    fn audio_laengen(rx: &mut mpsc::UnboundedReceiver<Ausgehend>) -> Vec<usize> {
        let mut out = Vec::new();
        while let Ok(Ausgehend::Nachricht(ControlMessage::Audio(p))) = rx.try_recv() {
            out.push(p.decode(24000).unwrap().len());
        }
        out
    }

    #[test]
    fn frame_wird_umgetastet_und_gesendet() {
        let (mut uplink, mut rx, _) = aufbau(false, 0);
        uplink.verarbeiten(AudioFrame::new(vec![0i16; 2048], 48000));
        assert_eq!(audio_laengen(&mut rx), vec![1024]);
        assert_eq!(uplink.metrics.frames_captured.get(), 1);
        assert_eq!(uplink.metrics.audio_chunks_sent.get(), 1);
    }

    #[test]
    fn audio_geht_als_base64() {
        let (mut uplink, mut rx, _) = aufbau(false, 0);
        uplink.verarbeiten(AudioFrame::new(vec![1i16; 16], 24000));
        match rx.try_recv() {
            Ok(Ausgehend::Nachricht(ControlMessage::Audio(AudioPayload::Base64(_)))) => {}
            other => panic!("unerwartet: {other:?}"),
        }
    }

    #[test]
    fn batching_buendelt() {
        let (mut uplink, mut rx, _) = aufbau(false, 100);
        for _ in 0..3 {
            uplink.verarbeiten(AudioFrame::new(vec![0i16; 1024], 24000));
        }
        assert_eq!(audio_laengen(&mut rx), vec![2400]);
    }

    #[test]
    fn vad_ereignisse_gehen_an_schleife() {
        let (mut uplink, _rx, mut vad_rx) = aufbau(true, 0);
        let laut: Vec<i16> = (0..2400).map(|i| if i % 2 == 0 { 8000 } else { -8000 }).collect();
        uplink.verarbeiten(AudioFrame::new(laut, 24000));
        assert_eq!(vad_rx.try_recv().ok(), Some(VadEvent::SpeechStart));
    }
}
