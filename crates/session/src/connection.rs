//! Persistente Agent-Verbindung ueber WebSocket
//!
//! Nach dem Handshake wird der Socket in Lese- und Schreibhaelfte geteilt,
//! jede Haelfte laeuft in einem eigenen tokio-Task.
//!
//! ## Ablauf
//! ```text
//! connect() -> Handshake -> warten auf "ready" -> Connection
//!                              |
//!                 fruehe Nachrichten werden gepuffert und
//!                 nach "ready" in Ankunftsreihenfolge zugestellt
//! ```
//!
//! - Binaer-Frames sind immer Agent-Audio
//! - Text-Frames werden als `ControlMessage` gelesen; unbekannte Typen und
//!   kaputtes JSON werden protokolliert und verworfen
//! - Der Leser meldet sein Ende genau einmal als `Inbound::Closed`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};
use voxlink_observability::SessionMetrics;
use voxlink_protocol::{AudioPayload, ControlMessage};

use crate::error::TransportError;

/// Eingehendes Ereignis der Verbindung
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Gueltige Nachricht des Agenten
    Message(ControlMessage),
    /// Verbindung beendet (letztes Ereignis)
    Closed(CloseReason),
}

/// Wie die Verbindung endete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Close-Frame oder lokales Schliessen
    Clean,
    /// Fehler oder Abbruch ohne Close-Frame
    Abrupt(String),
}

/// Auftraege an den Schreib-Task
#[derive(Debug)]
pub(crate) enum Ausgehend {
    Nachricht(ControlMessage),
    Schliessen,
}

/// Sendeseite der Verbindung. Klonbar, blockiert nie.
#[derive(Debug, Clone)]
pub struct ConnectionSender {
    tx: mpsc::UnboundedSender<Ausgehend>,
    geschlossen: Arc<AtomicBool>,
}

impl ConnectionSender {
    pub(crate) fn neu(tx: mpsc::UnboundedSender<Ausgehend>, geschlossen: Arc<AtomicBool>) -> Self {
        Self { tx, geschlossen }
    }

    /// Stellt eine Nachricht zum Senden ein
    pub fn send(&self, nachricht: ControlMessage) -> Result<(), TransportError> {
        if self.geschlossen.load(Ordering::Acquire) {
            return Err(TransportError::NichtVerbunden);
        }
        self.tx
            .send(Ausgehend::Nachricht(nachricht))
            .map_err(|_| TransportError::NichtVerbunden)
    }

    pub fn is_closed(&self) -> bool {
        self.geschlossen.load(Ordering::Acquire) || self.tx.is_closed()
    }
}

/// Aufgebaute Verbindung zum Agenten
#[derive(Debug)]
pub struct Connection {
    sender: ConnectionSender,
    leser: Option<JoinHandle<()>>,
    schreiber: Option<JoinHandle<()>>,
    schliessen_timeout: Duration,
}

impl Connection {
    /// Verbindet sich mit dem Agenten und wartet auf "ready".
    ///
    /// Liefert die Verbindung und den Empfaenger fuer eingehende Ereignisse.
    pub async fn connect(
        url: &str,
        schliessen_timeout: Duration,
        metrics: SessionMetrics,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Inbound>), TransportError> {
        debug!(url, "Verbinde mit Agent");
        let (ws, antwort) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            TransportError::Verbindung {
                url: url.to_string(),
                grund: e.to_string(),
            }
        })?;
        debug!(status = %antwort.status(), "WebSocket-Handshake abgeschlossen");

        Self::from_stream(ws, schliessen_timeout, metrics).await
    }

    /// Wie [`connect`](Self::connect), auf einem bereits aufgebauten Socket
    pub async fn from_stream<S>(
        ws: WebSocketStream<S>,
        schliessen_timeout: Duration,
        metrics: SessionMetrics,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Inbound>), TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let geschlossen = Arc::new(AtomicBool::new(false));

        let (aus_tx, aus_rx) = mpsc::unbounded_channel();
        let (ein_tx, ein_rx) = mpsc::unbounded_channel();
        let (bereit_tx, bereit_rx) = oneshot::channel();

        let schreiber = tokio::spawn(schreiben(sink, aus_rx));
        let leser = tokio::spawn(lesen(
            stream,
            ein_tx,
            bereit_tx,
            Arc::clone(&geschlossen),
            metrics,
        ));

        let mut connection = Self {
            sender: ConnectionSender::neu(aus_tx, geschlossen),
            leser: Some(leser),
            schreiber: Some(schreiber),
            schliessen_timeout,
        };

        let bereit = bereit_rx.await.unwrap_or_else(|_| {
            Err(TransportError::VorBereitGeschlossen(
                "Lese-Task abgebrochen".into(),
            ))
        });
        if let Err(e) = bereit {
            connection.close().await;
            return Err(e);
        }

        info!("Agent bereit");
        Ok((connection, ein_rx))
    }

    /// Sendet eine Nachricht, ohne zu blockieren
    pub fn send(&self, nachricht: ControlMessage) -> Result<(), TransportError> {
        self.sender.send(nachricht)
    }

    /// Klonbare Sendeseite fuer andere Threads
    pub fn sender(&self) -> ConnectionSender {
        self.sender.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Schliesst die Verbindung geordnet. Idempotent.
    ///
    /// Sendet einen Close-Frame und wartet hoechstens `schliessen_timeout`
    /// auf das Ende beider Tasks; danach werden sie abgebrochen.
    pub async fn close(&mut self) {
        if self.sender.geschlossen.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.sender.tx.send(Ausgehend::Schliessen);

        for (name, task) in [("Schreiber", self.schreiber.take()), ("Leser", self.leser.take())] {
            let Some(mut task) = task else {
                continue;
            };
            if tokio::time::timeout(self.schliessen_timeout, &mut task)
                .await
                .is_err()
            {
                debug!(task = name, "Task nach Timeout abgebrochen");
                task.abort();
            }
        }
        info!("Verbindung geschlossen");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for task in [self.schreiber.take(), self.leser.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

async fn schreiben<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut rx: mpsc::UnboundedReceiver<Ausgehend>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(auftrag) = rx.recv().await {
        match auftrag {
            Ausgehend::Nachricht(nachricht) => {
                if let Err(e) = sink.send(Message::Text(nachricht.to_json())).await {
                    warn!(fehler = %e, typ = nachricht.typ(), "Senden fehlgeschlagen");
                    break;
                }
            }
            Ausgehend::Schliessen => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!(fehler = %e, "Close-Frame nicht gesendet");
                }
                break;
            }
        }
    }
    let _ = sink.close().await;
    debug!("Schreib-Task beendet");
}

async fn lesen<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    tx: mpsc::UnboundedSender<Inbound>,
    bereit: oneshot::Sender<Result<(), TransportError>>,
    geschlossen: Arc<AtomicBool>,
    metrics: SessionMetrics,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut bereit = Some(bereit);
    let mut vorab: Vec<ControlMessage> = Vec::new();

    let grund = loop {
        let nachricht = match stream.next().await {
            Some(Ok(Message::Text(text))) => match ControlMessage::parse(&text) {
                Ok(ControlMessage::Unknown { typ }) => {
                    debug!(typ = %typ, "Unbekannter Nachrichtentyp verworfen");
                    continue;
                }
                Ok(nachricht) => nachricht,
                Err(e) => {
                    metrics.protocol_errors.inc();
                    warn!(fehler = %e, "Ungueltige Nachricht verworfen");
                    continue;
                }
            },
            Some(Ok(Message::Binary(daten))) => {
                ControlMessage::Audio(AudioPayload::Binary(Bytes::from(daten)))
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "Close-Frame empfangen");
                break CloseReason::Clean;
            }
            // Ping/Pong beantwortet tungstenite selbst
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                break if geschlossen.load(Ordering::Acquire) {
                    CloseReason::Clean
                } else {
                    CloseReason::Abrupt(e.to_string())
                };
            }
            None => {
                break if geschlossen.load(Ordering::Acquire) {
                    CloseReason::Clean
                } else {
                    CloseReason::Abrupt("Verbindung ohne Close-Frame beendet".into())
                };
            }
        };

        if let Some(signal) = bereit.take() {
            if nachricht == ControlMessage::Ready {
                let _ = signal.send(Ok(()));
                for frueh in vorab.drain(..) {
                    let _ = tx.send(Inbound::Message(frueh));
                }
            } else {
                debug!(typ = nachricht.typ(), "Nachricht vor 'ready' gepuffert");
                vorab.push(nachricht);
                bereit = Some(signal);
            }
            continue;
        }

        if tx.send(Inbound::Message(nachricht)).is_err() {
            debug!("Empfaenger beendet, Lese-Task endet");
            break CloseReason::Clean;
        }
    };

    if let Some(signal) = bereit.take() {
        let text = match grund {
            CloseReason::Clean => "Agent hat geschlossen".to_string(),
            CloseReason::Abrupt(grund) => grund,
        };
        let _ = signal.send(Err(TransportError::VorBereitGeschlossen(text)));
        return;
    }

    debug!(?grund, "Lese-Task beendet");
    let _ = tx.send(Inbound::Closed(grund));
}
