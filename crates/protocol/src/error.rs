//! Fehlertypen des Protokolls
//!
//! Protokollfehler sind nie fatal: die betroffene Nachricht wird
//! protokolliert und verworfen.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Ungueltiges JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Nachricht ist kein JSON-Objekt")]
    KeinObjekt,

    #[error("Feld '{feld}' fehlt oder hat falschen Typ in '{typ}'")]
    Feld { typ: &'static str, feld: &'static str },

    #[error("Base64-Dekodierung fehlgeschlagen: {0}")]
    Base64(#[from] base64::DecodeError),
}
