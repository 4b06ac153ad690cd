//! StreamSession - Lebenszyklus einer Sprachsession
//!
//! Besitzt alle Teilsysteme: Verbindung, Aufnahme, Wiedergabe und den
//! Turn-Koordinator. Eine einzige Koordinationsschleife verarbeitet
//! Steuerbefehle, VAD-Ereignisse, Agent-Nachrichten und den
//! Wiedergabetakt. Jeder Ausstieg aus der Schleife fuehrt genau einmal
//! den Abbau durch: Aufnahme stoppen, Wiedergabe stoppen, Verbindung
//! schliessen.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn, Instrument};
use voxlink_audio::{
    AudioCapture, AudioResult, Clock, CpalMicrophone, CpalPlayback, EnergyVad, MicrophoneSource,
    OutputDevice, PlaybackConfig, PlaybackScheduler, PlaybackSink, VoiceDetector,
};
use voxlink_core::{SessionId, VadEvent};
use voxlink_observability::SessionMetrics;

use crate::config::SessionConfig;
use crate::connection::{CloseReason, Connection, Inbound};
use crate::error::{SessionError, SessionResult, TransportError};
use crate::event::SessionEvent;
use crate::turn::TurnCoordinator;
use crate::uplink::Uplink;

/// Audio-Geraete einer Session
pub struct AudioDevices {
    /// Mikrofonquelle (wird erst beim Start geoeffnet)
    pub mikrofon: Box<dyn MicrophoneSource>,
    /// Senke fuer geplante Wiedergabe
    pub senke: Box<dyn PlaybackSink>,
    /// Zeitachse der Wiedergabe
    pub uhr: Arc<dyn Clock>,
    /// Geoeffnetes Ausgabegeraet, wird beim Abbau freigegeben
    pub ausgabe: Option<Box<dyn OutputDevice>>,
}

impl AudioDevices {
    /// Oeffnet die Ausgabe ueber cpal und bereitet das Mikrofon vor
    pub fn cpal(config: &SessionConfig) -> AudioResult<Self> {
        let (ausgabe, senke, uhr) = CpalPlayback::open(PlaybackConfig {
            geraet: config.wiedergabe_geraet.clone(),
            max_ausblenden: config.scheduler.fade_out,
        })?;
        Ok(Self {
            mikrofon: Box::new(CpalMicrophone::new(config.aufnahme_geraet.clone())),
            senke: Box::new(senke),
            uhr: Arc::new(uhr),
            ausgabe: Some(Box::new(ausgabe)),
        })
    }
}

/// Befehle an die Koordinationsschleife
enum Steuerung {
    EndTurn,
    SendText(String),
    Vad(VadEvent),
    Disconnect(oneshot::Sender<()>),
}

/// Klonbarer Zugriff auf eine laufende Session
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::UnboundedSender<Steuerung>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Beendet den Benutzer-Turn explizit
    pub fn end_turn(&self) -> SessionResult<()> {
        self.senden(Steuerung::EndTurn)
    }

    /// Sendet eine Text-Eingabe als vollstaendigen Turn
    pub fn send_text(&self, text: impl Into<String>) -> SessionResult<()> {
        self.senden(Steuerung::SendText(text.into()))
    }

    /// Speist ein VAD-Ereignis ein (externe VAD)
    pub fn inject_vad(&self, event: VadEvent) -> SessionResult<()> {
        self.senden(Steuerung::Vad(event))
    }

    /// Beendet die Session und wartet auf den Abbau. Idempotent.
    pub async fn disconnect(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Steuerung::Disconnect(tx)).is_ok() {
            // Fehler heisst: Schleife ist bereits beendet
            let _ = rx.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn senden(&self, befehl: Steuerung) -> SessionResult<()> {
        self.tx.send(befehl).map_err(|_| SessionError::Beendet)
    }
}

/// Eine laufende Sprachsession
pub struct StreamSession {
    id: SessionId,
    handle: SessionHandle,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    metrics: SessionMetrics,
    schleife: Option<JoinHandle<Option<TransportError>>>,
}

impl StreamSession {
    /// Baut die Session auf: Verbindung (bis "ready"), Wiedergabe,
    /// Koordinationsschleife, Aufnahme.
    pub async fn connect(config: SessionConfig, devices: AudioDevices) -> SessionResult<Self> {
        config.validieren()?;
        let id = SessionId::new();
        let span = tracing::info_span!("session", id = %id);

        let metrics = SessionMetrics::neu().map_err(|e| SessionError::intern(e.to_string()))?;
        let AudioDevices {
            mikrofon,
            senke,
            uhr,
            mut ausgabe,
        } = devices;

        let verbindung = Connection::connect(
            &config.agent_url,
            config.schliessen_timeout,
            metrics.clone(),
        )
        .instrument(span.clone())
        .await;
        let (mut connection, inbound_rx) = match verbindung {
            Ok(v) => v,
            Err(e) => {
                if let Some(mut ausgabe) = ausgabe.take() {
                    ausgabe.close();
                }
                return Err(e.into());
            }
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (steuer_tx, steuer_rx) = mpsc::unbounded_channel();
        let (vad_tx, vad_rx) = mpsc::unbounded_channel();

        let scheduler = PlaybackScheduler::new(config.scheduler.clone(), uhr, senke);
        let koordinator = TurnCoordinator::neu(
            id,
            scheduler,
            connection.sender(),
            event_tx.clone(),
            metrics.clone(),
            config.ausgangs_rate,
            config.ende_bei_stille,
        );

        let vad: Option<Box<dyn VoiceDetector>> = config
            .vad
            .clone()
            .map(|c| Box::new(EnergyVad::new(c)) as Box<dyn VoiceDetector>);
        let mut uplink = Uplink::neu(
            config.eingangs_rate,
            vad,
            vad_tx,
            config.batch_ms,
            connection.sender(),
            metrics.clone(),
        );

        let mut capture = AudioCapture::new(mikrofon, config.frame_groesse);
        if let Err(e) = capture.start(move |frame| uplink.verarbeiten(frame)) {
            error!(session = %id, fehler = %e, "Aufnahme konnte nicht gestartet werden");
            connection.close().await;
            if let Some(mut ausgabe) = ausgabe.take() {
                ausgabe.close();
            }
            return Err(e.into());
        }

        let _ = event_tx.send(SessionEvent::Ready);
        info!(session = %id, url = %config.agent_url, "Session gestartet");

        let schleife = Koordination {
            id,
            koordinator,
            connection,
            capture: Some(capture),
            ausgabe,
            steuer_rx,
            vad_rx,
            inbound_rx,
            events: event_tx,
            metrics: metrics.clone(),
            tick: config.tick,
        };
        let schleife = tokio::spawn(schleife.laufen().instrument(span));

        Ok(Self {
            id,
            handle: SessionHandle { id, tx: steuer_tx },
            events: Some(event_rx),
            metrics,
            schleife: Some(schleife),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Empfaenger der Session-Ereignisse (nur einmal abholbar)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events.take()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Beendet die Session. Idempotent.
    pub async fn disconnect(&self) {
        self.handle.disconnect().await;
    }

    /// Wartet auf das Ende der Session.
    ///
    /// Liefert den Transportfehler, falls die Verbindung abgebrochen ist.
    pub async fn wait(&mut self) -> SessionResult<()> {
        let Some(schleife) = self.schleife.take() else {
            return Ok(());
        };
        match schleife.await {
            Ok(None) => Ok(()),
            Ok(Some(e)) => Err(e.into()),
            Err(e) => Err(SessionError::intern(format!(
                "Koordinationsschleife abgebrochen: {e}"
            ))),
        }
    }
}

/// Zustand der Koordinationsschleife
struct Koordination {
    id: SessionId,
    koordinator: TurnCoordinator,
    connection: Connection,
    capture: Option<AudioCapture>,
    ausgabe: Option<Box<dyn OutputDevice>>,
    steuer_rx: mpsc::UnboundedReceiver<Steuerung>,
    vad_rx: mpsc::UnboundedReceiver<VadEvent>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    events: mpsc::UnboundedSender<SessionEvent>,
    metrics: SessionMetrics,
    tick: Duration,
}

impl Koordination {
    async fn laufen(mut self) -> Option<TransportError> {
        let mut takt = tokio::time::interval(self.tick);
        takt.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut wartende: Vec<oneshot::Sender<()>> = Vec::new();

        let fehler = loop {
            tokio::select! {
                biased;

                befehl = self.steuer_rx.recv() => match befehl {
                    Some(Steuerung::EndTurn) => self.koordinator.end_turn(),
                    Some(Steuerung::SendText(text)) => self.koordinator.send_text(text),
                    Some(Steuerung::Vad(event)) => self.koordinator.on_vad(event),
                    Some(Steuerung::Disconnect(antwort)) => {
                        info!(session = %self.id, "Trennen angefordert");
                        wartende.push(antwort);
                        break None;
                    }
                    None => {
                        debug!(session = %self.id, "Alle Handles verworfen");
                        break None;
                    }
                },

                Some(event) = self.vad_rx.recv() => self.koordinator.on_vad(event),

                inbound = self.inbound_rx.recv() => match inbound {
                    Some(Inbound::Message(nachricht)) => self.koordinator.on_inbound(nachricht),
                    Some(Inbound::Closed(CloseReason::Clean)) => {
                        info!(session = %self.id, "Agent hat die Verbindung geschlossen");
                        break None;
                    }
                    Some(Inbound::Closed(CloseReason::Abrupt(grund))) => {
                        error!(session = %self.id, grund = %grund, "Verbindung abgebrochen");
                        break Some(TransportError::UnerwartetGeschlossen(grund));
                    }
                    None => {
                        break Some(TransportError::UnerwartetGeschlossen(
                            "Lese-Task beendet".into(),
                        ));
                    }
                },

                _ = takt.tick() => self.koordinator.tick(),
            }
        };

        self.abbauen().await;
        let _ = self.events.send(SessionEvent::Closed {
            error: fehler.as_ref().map(ToString::to_string),
        });
        for antwort in wartende {
            let _ = antwort.send(());
        }
        fehler
    }

    /// Gibt Geraete und Verbindung frei. Laeuft genau einmal.
    async fn abbauen(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            let stats = capture.stats();
            // Stop joint Geraete- und Pump-Thread
            if let Err(e) = tokio::task::spawn_blocking(move || capture.stop()).await {
                warn!(session = %self.id, fehler = %e, "Aufnahme-Stopp fehlgeschlagen");
            }
            self.metrics.frames_dropped.inc_by(stats.frames_verworfen());
        }

        let ausblenden = self.koordinator.stop_playback();

        self.connection.close().await;

        if let Some(mut ausgabe) = self.ausgabe.take() {
            // Ausblenden noch hoerbar machen, dann Geraet freigeben
            tokio::time::sleep(ausblenden).await;
            if let Err(e) = tokio::task::spawn_blocking(move || ausgabe.close()).await {
                warn!(session = %self.id, fehler = %e, "Ausgabe-Freigabe fehlgeschlagen");
            }
        }

        info!(
            session = %self.id,
            gesendet = self.metrics.audio_chunks_sent.get(),
            geplant = self.metrics.audio_chunks_scheduled.get(),
            unterbrechungen = self.metrics.interruptions.get(),
            "Session beendet"
        );
    }
}
