//! Konsolen-Ein- und Ausgabe
//!
//! Eine Zeile auf stdin ist ein Befehl, Session-Ereignisse werden als
//! einzeilige Meldungen auf stdout ausgegeben.

use voxlink_session::SessionEvent;

/// Befehl aus einer Eingabezeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Befehl {
    /// Benutzer-Turn beenden
    EndTurn,
    /// Text an den Agenten senden
    Text(String),
    /// Session beenden
    Beenden,
}

impl Befehl {
    /// Leere Zeile oder "ende" beendet den Turn, "quit" die Session,
    /// alles andere geht als Text an den Agenten
    pub fn lesen(zeile: &str) -> Self {
        match zeile.trim() {
            "" | "ende" | "/ende" => Befehl::EndTurn,
            "quit" | "/quit" | "exit" => Befehl::Beenden,
            text => Befehl::Text(text.to_string()),
        }
    }
}

/// Text fuer die Konsole, `None` fuer Ereignisse ohne Ausgabe
pub fn anzeige(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Ready => Some("[bereit] Agent verbunden, sprich los".into()),
        SessionEvent::TurnChanged { to, .. } => Some(format!("[turn] {to}")),
        SessionEvent::AgentText(text) => Some(format!("agent> {text}")),
        SessionEvent::Transcription(text) => Some(format!("agent (gesprochen)> {text}")),
        SessionEvent::FunctionCall(aufruf) => {
            Some(format!("[funktion] {}({})", aufruf.name, aufruf.args))
        }
        SessionEvent::AgentError(fehler) => Some(format!("[agent-fehler] {}", fehler.message)),
        SessionEvent::AgentInterrupted { reason: Some(grund) } => {
            Some(format!("[unterbrochen] {grund}"))
        }
        SessionEvent::AgentInterrupted { reason: None } => Some("[unterbrochen]".into()),
        SessionEvent::PlaybackIdle => None,
        SessionEvent::Closed { error: Some(fehler) } => {
            Some(format!("[getrennt] Verbindung abgebrochen: {fehler}"))
        }
        SessionEvent::Closed { error: None } => Some("[getrennt]".into()),
    }
}
