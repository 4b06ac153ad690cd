//! Gemeinsame Zustands- und Identifikationstypen fuer Voxlink

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Session-ID (nur fuer Log-Korrelation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Wer gerade spricht.
///
/// Pro Session ist zu jedem Zeitpunkt genau ein Wert aktiv.
/// `Interrupted` ist transient und wird nur waehrend eines Barge-In
/// durchlaufen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Niemand spricht, Session ist bereit
    #[default]
    Idle,
    /// Der Benutzer spricht (lokale VAD)
    UserSpeaking,
    /// Agent-Audio wird abgespielt
    AgentSpeaking,
    /// Agent wurde vom Benutzer unterbrochen
    Interrupted,
}

impl TurnState {
    /// Kurzname fuer Logs
    pub fn als_str(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::UserSpeaking => "user_speaking",
            TurnState::AgentSpeaking => "agent_speaking",
            TurnState::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_eindeutig() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn session_id_anzeige() {
        let id = SessionId::new();
        assert!(id.to_string().starts_with("session:"));
    }

    #[test]
    fn turn_state_standard_ist_idle() {
        assert_eq!(TurnState::default(), TurnState::Idle);
        assert_eq!(TurnState::AgentSpeaking.to_string(), "agent_speaking");
    }
}
