//! Turn-Koordination
//!
//! Genau eine Partei ist logisch aktiv. Der Koordinator ist die einzige
//! Stelle, die den Zustand aendert; er wird nur von der
//! Koordinationsschleife der Session benutzt.
//!
//! ## Zustandsautomat
//! ```text
//!            Agent-Audio                  VAD Sprachbeginn
//!   Idle ----------------> AgentSpeaking -----------------> Interrupted
//!    ^  ^                   |  turn_complete                   |
//!    |  +-------------------+                                  v
//!    |        end / text / interrupted                   UserSpeaking
//!    +-----------------------------------------------------------+
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use voxlink_audio::PlaybackScheduler;
use voxlink_core::{SessionId, TurnState, VadEvent};
use voxlink_observability::SessionMetrics;
use voxlink_protocol::{AudioPayload, ControlMessage};

use crate::connection::ConnectionSender;
use crate::event::SessionEvent;

/// Zustandsautomat fuer Benutzer- und Agent-Turns
pub struct TurnCoordinator {
    session: SessionId,
    state: TurnState,
    scheduler: PlaybackScheduler,
    sender: ConnectionSender,
    events: mpsc::UnboundedSender<SessionEvent>,
    metrics: SessionMetrics,
    /// Rate des Agent-Audios
    ausgangs_rate: u32,
    ende_bei_stille: bool,
}

impl TurnCoordinator {
    pub fn neu(
        session: SessionId,
        mut scheduler: PlaybackScheduler,
        sender: ConnectionSender,
        events: mpsc::UnboundedSender<SessionEvent>,
        metrics: SessionMetrics,
        ausgangs_rate: u32,
        ende_bei_stille: bool,
    ) -> Self {
        let idle_events = events.clone();
        scheduler.set_on_idle(move || {
            let _ = idle_events.send(SessionEvent::PlaybackIdle);
        });
        Self {
            session,
            state: TurnState::Idle,
            scheduler,
            sender,
            events,
            metrics,
            ausgangs_rate,
            ende_bei_stille,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    /// Ereignis der lokalen VAD
    pub fn on_vad(&mut self, event: VadEvent) {
        match event {
            VadEvent::SpeechStart => self.sprachbeginn(),
            VadEvent::SpeechEnd => {
                if self.ende_bei_stille && self.state == TurnState::UserSpeaking {
                    debug!(session = %self.session, "Sprachende erkannt, Turn wird beendet");
                    self.end_turn();
                }
            }
            VadEvent::Misfire => {
                debug!(session = %self.session, state = %self.state, "VAD-Fehlausloesung ignoriert");
            }
        }
    }

    fn sprachbeginn(&mut self) {
        match self.state {
            TurnState::AgentSpeaking => {
                info!(session = %self.session, "Barge-in: Agent wird unterbrochen");
                self.wechsel(TurnState::Interrupted);
                self.scheduler.stop();
                self.scheduler.reset();
                self.metrics.interruptions.inc();
                self.metrics.playback_pending_chunks.set(0);
                self.senden(ControlMessage::Interruption);
                self.wechsel(TurnState::UserSpeaking);
            }
            TurnState::Idle | TurnState::UserSpeaking | TurnState::Interrupted => {
                self.wechsel(TurnState::UserSpeaking);
            }
        }
    }

    /// Benutzer beendet seinen Turn explizit
    pub fn end_turn(&mut self) {
        self.senden(ControlMessage::End);
        self.wechsel(TurnState::Idle);
    }

    /// Text-Eingabe des Benutzers; gilt als vollstaendiger Turn
    pub fn send_text(&mut self, text: String) {
        self.senden(ControlMessage::Text(text));
        self.wechsel(TurnState::Idle);
    }

    /// Nachricht des Agenten, strikt in Ankunftsreihenfolge
    pub fn on_inbound(&mut self, nachricht: ControlMessage) {
        match nachricht {
            ControlMessage::Audio(payload) => self.agent_audio(payload),
            ControlMessage::TurnComplete => {
                self.scheduler.reset();
                self.metrics.playback_pending_chunks.set(0);
                if self.state == TurnState::AgentSpeaking {
                    self.metrics.turns_completed.inc();
                    self.wechsel(TurnState::Idle);
                }
            }
            ControlMessage::Interrupted { reason } => {
                info!(session = %self.session, grund = ?reason, "Agent hat unterbrochen");
                self.scheduler.stop();
                self.scheduler.reset();
                self.metrics.playback_pending_chunks.set(0);
                self.wechsel(TurnState::Idle);
                self.melden(SessionEvent::AgentInterrupted { reason });
            }
            ControlMessage::Text(text) => self.melden(SessionEvent::AgentText(text)),
            ControlMessage::Transcription(text) => self.melden(SessionEvent::Transcription(text)),
            ControlMessage::FunctionCall(aufruf) => {
                debug!(session = %self.session, name = %aufruf.name, "Funktionsaufruf des Agenten");
                self.melden(SessionEvent::FunctionCall(aufruf));
            }
            ControlMessage::Error(payload) => {
                warn!(session = %self.session, meldung = %payload.message, "Fehler vom Agenten");
                self.melden(SessionEvent::AgentError(payload));
            }
            ControlMessage::Ready
            | ControlMessage::End
            | ControlMessage::Interruption
            | ControlMessage::Unknown { .. } => {
                debug!(session = %self.session, typ = nachricht.typ(), "Nachricht ignoriert");
            }
        }
    }

    fn agent_audio(&mut self, payload: AudioPayload) {
        let frame = match payload.decode(self.ausgangs_rate) {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.decode_errors.inc();
                warn!(session = %self.session, fehler = %e, "Agent-Audio verworfen");
                return;
            }
        };

        if self.state != TurnState::AgentSpeaking {
            self.wechsel(TurnState::AgentSpeaking);
        }

        let jetzt = self.scheduler.clock().now();
        match self.scheduler.schedule(frame, None) {
            Ok(start) => {
                self.metrics.audio_chunks_scheduled.inc();
                self.metrics
                    .schedule_lead_seconds
                    .observe(start.saturating_sub(jetzt).as_secs_f64());
                self.metrics
                    .playback_pending_chunks
                    .set(self.scheduler.pending() as i64);
            }
            Err(e) => {
                self.metrics.decode_errors.inc();
                warn!(session = %self.session, fehler = %e, "Chunk nicht planbar");
            }
        }
    }

    /// Raeumt abgespielte Chunks ab (Takt der Koordinationsschleife)
    pub fn tick(&mut self) {
        if self.scheduler.tick() > 0 {
            self.metrics
                .playback_pending_chunks
                .set(self.scheduler.pending() as i64);
        }
    }

    /// Bricht die Wiedergabe ab (Teardown). Liefert die Ausblendzeit.
    pub fn stop_playback(&mut self) -> Duration {
        self.scheduler.stop();
        self.metrics.playback_pending_chunks.set(0);
        self.scheduler.config().fade_out
    }

    fn wechsel(&mut self, neu: TurnState) {
        let alt = self.state;
        if alt == neu {
            return;
        }
        self.state = neu;
        debug!(session = %self.session, von = %alt, nach = %neu, "Turn-Wechsel");
        self.melden(SessionEvent::TurnChanged { from: alt, to: neu });
    }

    fn senden(&self, nachricht: ControlMessage) {
        let typ = nachricht.typ().to_owned();
        if let Err(e) = self.sender.send(nachricht) {
            warn!(session = %self.session, typ = %typ, fehler = %e, "Nachricht nicht gesendet");
        }
    }

    fn melden(&self, event: SessionEvent) {
        // Ohne Empfaenger gehen Ereignisse verloren, die Session laeuft weiter
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Ausgehend;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use voxlink_audio::{ChunkId, ManualClock, PlaybackSink, SchedulerConfig};
    use voxlink_core::AudioFrame;
    use voxlink_protocol::ErrorPayload;

    #[derive(Debug, Clone, PartialEq)]
    enum Aufruf {
        Play(Duration),
        FadeOut,
        Gain(f32),
    }

    #[derive(Clone, Default)]
    struct Senke(Arc<Mutex<Vec<Aufruf>>>);

    impl PlaybackSink for Senke {
        fn play(&mut self, _id: ChunkId, _frame: &AudioFrame, start_at: Duration) {
            self.0.lock().push(Aufruf::Play(start_at));
        }
        fn fade_out(&mut self, _window: Duration) {
            self.0.lock().push(Aufruf::FadeOut);
        }
        fn set_gain(&mut self, gain: f32) {
            self.0.lock().push(Aufruf::Gain(gain));
        }
    }

    struct Aufbau {
        koordinator: TurnCoordinator,
        ausgehend: mpsc::UnboundedReceiver<Ausgehend>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        senke: Senke,
        metrics: SessionMetrics,
    }

    impl Aufbau {
        fn neu() -> Self {
            let uhr = Arc::new(ManualClock::new());
            let senke = Senke::default();
            let scheduler =
                PlaybackScheduler::new(SchedulerConfig::default(), uhr, Box::new(senke.clone()));
            let (aus_tx, ausgehend) = mpsc::unbounded_channel();
            let (ev_tx, events) = mpsc::unbounded_channel();
            let metrics = SessionMetrics::neu().unwrap();
            let koordinator = TurnCoordinator::neu(
                SessionId::new(),
                scheduler,
                ConnectionSender::neu(aus_tx, Arc::new(AtomicBool::new(false))),
                ev_tx,
                metrics.clone(),
                24000,
                true,
            );
            Self {
                koordinator,
                ausgehend,
                events,
                senke,
                metrics,
            }
        }

        fn gesendet(&mut self) -> Vec<ControlMessage> {
            let mut out = Vec::new();
            while let Ok(Ausgehend::Nachricht(n)) = self.ausgehend.try_recv() {
                out.push(n);
            }
            out
        }

        fn events(&mut self) -> Vec<SessionEvent> {
            let mut out = Vec::new();
            while let Ok(e) = self.events.try_recv() {
                out.push(e);
            }
            out
        }

        fn aufrufe(&self) -> Vec<Aufruf> {
            self.senke.0.lock().clone()
        }
    }

    /// 100 ms Stille bei 24 kHz als Binaer-Frame
    fn chunk() -> ControlMessage {
        ControlMessage::Audio(AudioPayload::Binary(Bytes::from(vec![0u8; 4800])))
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn agent_audio_startet_agent_turn() {
        let mut a = Aufbau::neu();
        a.koordinator.on_inbound(chunk());
        assert_eq!(a.koordinator.state(), TurnState::AgentSpeaking);
        assert_eq!(
            a.events(),
            vec![SessionEvent::TurnChanged {
                from: TurnState::Idle,
                to: TurnState::AgentSpeaking
            }]
        );
        // Weitere Chunks ohne neuen Wechsel
        a.koordinator.on_inbound(chunk());
        assert!(a.events().is_empty());
        assert_eq!(a.metrics.audio_chunks_scheduled.get(), 2);
    }

    #[test]
    fn chunks_lueckenlos_geplant() {
        let mut a = Aufbau::neu();
        for _ in 0..4 {
            a.koordinator.on_inbound(chunk());
        }
        assert_eq!(
            a.aufrufe(),
            vec![
                Aufruf::Play(ms(50)),
                Aufruf::Play(ms(150)),
                Aufruf::Play(ms(250)),
                Aufruf::Play(ms(350)),
            ]
        );
    }

    #[test]
    fn barge_in_unterbricht_agent() {
        let mut a = Aufbau::neu();
        for _ in 0..3 {
            a.koordinator.on_inbound(chunk());
        }
        assert_eq!(a.koordinator.scheduler().pending(), 3);
        a.events();

        a.koordinator.on_vad(VadEvent::SpeechStart);

        assert_eq!(a.koordinator.state(), TurnState::UserSpeaking);
        assert_eq!(a.koordinator.scheduler().pending(), 0);
        assert!(a.koordinator.scheduler().is_stale());
        assert_eq!(a.gesendet(), vec![ControlMessage::Interruption]);
        assert_eq!(
            a.events(),
            vec![
                SessionEvent::TurnChanged {
                    from: TurnState::AgentSpeaking,
                    to: TurnState::Interrupted
                },
                SessionEvent::TurnChanged {
                    from: TurnState::Interrupted,
                    to: TurnState::UserSpeaking
                },
            ]
        );
        let aufrufe = a.aufrufe();
        assert!(aufrufe.contains(&Aufruf::FadeOut));
        assert_eq!(aufrufe.last(), Some(&Aufruf::Gain(1.0)));
        assert_eq!(a.metrics.interruptions.get(), 1);

        // Weiterer Sprachbeginn sendet nichts mehr
        a.koordinator.on_vad(VadEvent::SpeechStart);
        assert!(a.gesendet().is_empty());
    }

    #[test]
    fn sprachbeginn_im_leerlauf_ohne_nachricht() {
        let mut a = Aufbau::neu();
        a.koordinator.on_vad(VadEvent::SpeechStart);
        assert_eq!(a.koordinator.state(), TurnState::UserSpeaking);
        assert!(a.gesendet().is_empty());
        assert!(a.aufrufe().is_empty());
    }

    #[test]
    fn sprachende_beendet_benutzer_turn() {
        let mut a = Aufbau::neu();
        a.koordinator.on_vad(VadEvent::SpeechStart);
        a.koordinator.on_vad(VadEvent::Misfire);
        assert_eq!(a.koordinator.state(), TurnState::UserSpeaking);

        a.koordinator.on_vad(VadEvent::SpeechEnd);
        assert_eq!(a.koordinator.state(), TurnState::Idle);
        assert_eq!(a.gesendet(), vec![ControlMessage::End]);
    }

    #[test]
    fn sprachende_im_leerlauf_ignoriert() {
        let mut a = Aufbau::neu();
        a.koordinator.on_vad(VadEvent::SpeechEnd);
        assert!(a.gesendet().is_empty());
    }

    #[test]
    fn turn_complete_ohne_chunks_setzt_zurueck() {
        let mut a = Aufbau::neu();
        a.koordinator.on_inbound(ControlMessage::TurnComplete);
        assert_eq!(a.koordinator.state(), TurnState::Idle);
        assert_eq!(a.aufrufe(), vec![Aufruf::Gain(1.0)]);
        assert_eq!(a.metrics.turns_completed.get(), 0);
    }

    #[test]
    fn turn_complete_beendet_agent_turn() {
        let mut a = Aufbau::neu();
        a.koordinator.on_inbound(chunk());
        a.koordinator.on_inbound(ControlMessage::TurnComplete);
        assert_eq!(a.koordinator.state(), TurnState::Idle);
        assert!(a.koordinator.scheduler().is_stale());
        assert_eq!(a.metrics.turns_completed.get(), 1);
        // Kein Ausblenden: der Rest spielt aus
        assert!(!a.aufrufe().contains(&Aufruf::FadeOut));
    }

    #[test]
    fn agent_unterbricht_selbst() {
        let mut a = Aufbau::neu();
        a.koordinator.on_inbound(chunk());
        a.events();
        a.koordinator.on_inbound(ControlMessage::Interrupted {
            reason: Some("neue Eingabe".into()),
        });
        assert_eq!(a.koordinator.state(), TurnState::Idle);
        assert!(a.aufrufe().contains(&Aufruf::FadeOut));
        assert_eq!(
            a.events(),
            vec![
                SessionEvent::TurnChanged {
                    from: TurnState::AgentSpeaking,
                    to: TurnState::Idle
                },
                SessionEvent::AgentInterrupted {
                    reason: Some("neue Eingabe".into())
                },
            ]
        );
        // Keine Barge-in-Nachricht an den Agenten
        assert!(a.gesendet().is_empty());
    }

    #[test]
    fn kaputtes_audio_wird_uebersprungen() {
        let mut a = Aufbau::neu();
        a.koordinator
            .on_inbound(ControlMessage::Audio(AudioPayload::Binary(Bytes::new())));
        a.koordinator
            .on_inbound(ControlMessage::Audio(AudioPayload::Base64("%%%".into())));
        assert_eq!(a.koordinator.state(), TurnState::Idle);
        assert_eq!(a.metrics.decode_errors.get(), 2);
        assert!(a.aufrufe().is_empty());
    }

    #[test]
    fn end_turn_aus_jedem_zustand() {
        let mut a = Aufbau::neu();
        a.koordinator.on_inbound(chunk());
        a.koordinator.end_turn();
        assert_eq!(a.koordinator.state(), TurnState::Idle);
        assert_eq!(a.gesendet(), vec![ControlMessage::End]);
    }

    #[test]
    fn text_eingabe_wird_gesendet() {
        let mut a = Aufbau::neu();
        a.koordinator.on_vad(VadEvent::SpeechStart);
        a.koordinator.send_text("Hallo".into());
        assert_eq!(a.koordinator.state(), TurnState::Idle);
        assert_eq!(a.gesendet(), vec![ControlMessage::Text("Hallo".into())]);
    }

    #[test]
    fn agent_nachrichten_werden_gemeldet() {
        let mut a = Aufbau::neu();
        a.koordinator.on_inbound(ControlMessage::Text("Antwort".into()));
        a.koordinator
            .on_inbound(ControlMessage::Transcription("gesprochen".into()));
        a.koordinator
            .on_inbound(ControlMessage::Error(ErrorPayload::new("Quota")));
        a.koordinator.on_inbound(ControlMessage::Ready);
        a.koordinator.on_inbound(ControlMessage::End);

        assert_eq!(
            a.events(),
            vec![
                SessionEvent::AgentText("Antwort".into()),
                SessionEvent::Transcription("gesprochen".into()),
                SessionEvent::AgentError(ErrorPayload::new("Quota")),
            ]
        );
        assert_eq!(a.koordinator.state(), TurnState::Idle);
    }

    #[test]
    fn senden_nach_schliessen_bricht_nicht_ab() {
        let mut a = Aufbau::neu();
        a.ausgehend.close();
        a.koordinator.end_turn();
        assert_eq!(a.koordinator.state(), TurnState::Idle);
    }
}
