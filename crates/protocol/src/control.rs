//! Control-Protokoll (Text-Frames)
//!
//! Jeder Text-Frame ist ein JSON-Objekt, entweder `{"ready": true}` oder
//! `{"type": <string>, "data": <beliebig>}`.
//!
//! ## Design
//! - Tagged Enum fuer typsichere Nachrichtentypen
//! - Unbekannte `type`-Werte sind die eigene Variante `Unknown`, nie ein Fehler
//! - Das nackte `{"ready": true}` wird aus Kompatibilitaetsgruenden als
//!   `Ready` gelesen

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::audio::AudioPayload;
use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Payload-Strukturen
// ---------------------------------------------------------------------------

/// Funktionsaufruf des Agenten (nur zur Anzeige, Ausfuehrung passiert remote)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Fehlermeldung des Agenten
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    /// Weitere Felder, unveraendert durchgereicht
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ControlMessage
// ---------------------------------------------------------------------------

/// Alle Nachrichten der Agent-Verbindung
///
/// Eingehend (vom Agenten): `Ready`, `Audio`, `Text`, `Transcription`,
/// `TurnComplete`, `Interrupted`, `FunctionCall`, `Error`.
/// Ausgehend (vom Client): `Audio`, `Text`, `End`, `Interruption`.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Agent ist bereit
    Ready,
    /// PCM16-Audio (binaer oder Base64)
    Audio(AudioPayload),
    /// Text-Antwort des Agenten bzw. Text-Eingabe des Benutzers
    Text(String),
    /// Transkription der Agent-Sprachausgabe
    Transcription(String),
    /// Agent hat seinen Turn beendet
    TurnComplete,
    /// Agent hat selbst unterbrochen
    Interrupted { reason: Option<String> },
    /// Agent ruft ein Werkzeug auf
    FunctionCall(FunctionCall),
    /// Fehler auf Agent-Seite
    Error(ErrorPayload),
    /// Expliziter Turn-Abschluss des Benutzers
    End,
    /// Barge-In: Benutzer hat den Agenten unterbrochen
    Interruption,
    /// Unbekannter `type`, wird ignoriert
    Unknown { typ: String },
}

impl ControlMessage {
    /// Liest einen Text-Frame.
    ///
    /// Fehler nur bei kaputtem JSON oder fehlenden Pflichtfeldern eines
    /// bekannten Typs. Unbekannte Typen liefern `Unknown`.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let obj = value.as_object().ok_or(ProtocolError::KeinObjekt)?;
        let data = obj.get("data");

        let typ = match obj.get("type") {
            Some(Value::String(t)) => t.as_str(),
            Some(_) => {
                return Err(ProtocolError::Feld {
                    typ: "<unbekannt>",
                    feld: "type",
                })
            }
            None => {
                // Altes Format: {"ready": true}
                if obj.get("ready").and_then(Value::as_bool) == Some(true) {
                    return Ok(ControlMessage::Ready);
                }
                return Err(ProtocolError::Feld {
                    typ: "<unbekannt>",
                    feld: "type",
                });
            }
        };

        let nachricht = match typ {
            "ready" => ControlMessage::Ready,
            "audio" => ControlMessage::Audio(AudioPayload::Base64(
                string_feld(data, "audio")?.to_string(),
            )),
            "text" => ControlMessage::Text(string_feld(data, "text")?.to_string()),
            "transcription" => {
                ControlMessage::Transcription(string_feld(data, "transcription")?.to_string())
            }
            "turn_complete" => ControlMessage::TurnComplete,
            "interrupted" => ControlMessage::Interrupted {
                reason: unterbrechungsgrund(data),
            },
            "function_call" => {
                let data = data.ok_or(ProtocolError::Feld {
                    typ: "function_call",
                    feld: "data",
                })?;
                ControlMessage::FunctionCall(serde_json::from_value(data.clone())?)
            }
            "error" => ControlMessage::Error(fehler_payload(data)?),
            "end" => ControlMessage::End,
            "interruption" => ControlMessage::Interruption,
            andere => ControlMessage::Unknown {
                typ: andere.to_string(),
            },
        };

        Ok(nachricht)
    }

    /// Serialisiert als JSON-Text-Frame `{"type": ..., "data": ...}`
    pub fn to_json(&self) -> String {
        let value = match self {
            ControlMessage::Ready => json!({ "type": "ready" }),
            ControlMessage::Audio(payload) => {
                json!({ "type": "audio", "data": payload.als_base64() })
            }
            ControlMessage::Text(text) => json!({ "type": "text", "data": text }),
            ControlMessage::Transcription(text) => {
                json!({ "type": "transcription", "data": text })
            }
            ControlMessage::TurnComplete => json!({ "type": "turn_complete" }),
            ControlMessage::Interrupted { reason: Some(r) } => {
                json!({ "type": "interrupted", "data": r })
            }
            ControlMessage::Interrupted { reason: None } => json!({ "type": "interrupted" }),
            ControlMessage::FunctionCall(call) => json!({ "type": "function_call", "data": call }),
            ControlMessage::Error(payload) => json!({ "type": "error", "data": payload }),
            ControlMessage::End => json!({ "type": "end" }),
            ControlMessage::Interruption => json!({ "type": "interruption" }),
            ControlMessage::Unknown { typ } => json!({ "type": typ }),
        };
        value.to_string()
    }

    /// Wert des `type`-Felds
    pub fn typ(&self) -> &str {
        match self {
            ControlMessage::Ready => "ready",
            ControlMessage::Audio(_) => "audio",
            ControlMessage::Text(_) => "text",
            ControlMessage::Transcription(_) => "transcription",
            ControlMessage::TurnComplete => "turn_complete",
            ControlMessage::Interrupted { .. } => "interrupted",
            ControlMessage::FunctionCall(_) => "function_call",
            ControlMessage::Error(_) => "error",
            ControlMessage::End => "end",
            ControlMessage::Interruption => "interruption",
            ControlMessage::Unknown { typ } => typ,
        }
    }
}

fn string_feld<'a>(data: Option<&'a Value>, typ: &'static str) -> Result<&'a str, ProtocolError> {
    data.and_then(Value::as_str)
        .ok_or(ProtocolError::Feld { typ, feld: "data" })
}

/// `data` darf fehlen, ein String oder ein Objekt mit `message` sein
fn unterbrechungsgrund(data: Option<&Value>) -> Option<String> {
    match data? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn fehler_payload(data: Option<&Value>) -> Result<ErrorPayload, ProtocolError> {
    match data {
        Some(Value::String(s)) => Ok(ErrorPayload::new(s.clone())),
        Some(v @ Value::Object(_)) => Ok(serde_json::from_value(v.clone())?),
        _ => Err(ProtocolError::Feld {
            typ: "error",
            feld: "data",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_beide_formen() {
        assert_eq!(
            ControlMessage::parse(r#"{"ready": true}"#).unwrap(),
            ControlMessage::Ready
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type": "ready"}"#).unwrap(),
            ControlMessage::Ready
        );
    }

    #[test]
    fn ready_false_ist_kein_ready() {
        assert!(ControlMessage::parse(r#"{"ready": false}"#).is_err());
    }

    #[test]
    fn audio_base64() {
        let msg = ControlMessage::parse(r#"{"type":"audio","data":"AQACAA=="}"#).unwrap();
        match msg {
            ControlMessage::Audio(payload) => {
                let frame = payload.decode(24000).unwrap();
                assert_eq!(frame.samples(), &[1, 2]);
            }
            other => panic!("Audio erwartet, erhalten: {:?}", other),
        }
    }

    #[test]
    fn audio_ohne_data_ist_fehler() {
        assert!(matches!(
            ControlMessage::parse(r#"{"type":"audio"}"#),
            Err(ProtocolError::Feld { typ: "audio", .. })
        ));
    }

    #[test]
    fn text_und_transkription() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"text","data":"Hallo"}"#).unwrap(),
            ControlMessage::Text("Hallo".into())
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type":"transcription","data":"Hallo Welt"}"#).unwrap(),
            ControlMessage::Transcription("Hallo Welt".into())
        );
    }

    #[test]
    fn turn_complete_ohne_data() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"turn_complete"}"#).unwrap(),
            ControlMessage::TurnComplete
        );
    }

    #[test]
    fn interrupted_varianten() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"interrupted"}"#).unwrap(),
            ControlMessage::Interrupted { reason: None }
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type":"interrupted","data":"user"}"#).unwrap(),
            ControlMessage::Interrupted {
                reason: Some("user".into())
            }
        );
        assert_eq!(
            ControlMessage::parse(
                r#"{"type":"interrupted","data":{"message":"Response interrupted by user input"}}"#
            )
            .unwrap(),
            ControlMessage::Interrupted {
                reason: Some("Response interrupted by user input".into())
            }
        );
    }

    #[test]
    fn function_call() {
        let msg = ControlMessage::parse(
            r#"{"type":"function_call","data":{"name":"kalender","args":{"tag":"montag"}}}"#,
        )
        .unwrap();
        match msg {
            ControlMessage::FunctionCall(call) => {
                assert_eq!(call.name, "kalender");
                assert_eq!(call.args["tag"], "montag");
            }
            other => panic!("FunctionCall erwartet, erhalten: {:?}", other),
        }
    }

    #[test]
    fn error_mit_details() {
        let msg =
            ControlMessage::parse(r#"{"type":"error","data":{"message":"kaputt","code":1011}}"#)
                .unwrap();
        match msg {
            ControlMessage::Error(payload) => {
                assert_eq!(payload.message, "kaputt");
                assert_eq!(payload.details["code"], 1011);
            }
            other => panic!("Error erwartet, erhalten: {:?}", other),
        }
    }

    #[test]
    fn unbekannter_typ_ist_kein_fehler() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"telemetry","data":42}"#).unwrap(),
            ControlMessage::Unknown {
                typ: "telemetry".into()
            }
        );
    }

    #[test]
    fn kaputtes_json_ist_protokollfehler() {
        assert!(matches!(
            ControlMessage::parse("{nicht json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            ControlMessage::parse("[1,2,3]"),
            Err(ProtocolError::KeinObjekt)
        ));
        assert!(ControlMessage::parse(r#"{"data":"ohne typ"}"#).is_err());
    }

    #[test]
    fn ausgehende_nachrichten_serialisieren() {
        assert_eq!(ControlMessage::End.to_json(), r#"{"type":"end"}"#);
        assert_eq!(
            ControlMessage::Interruption.to_json(),
            r#"{"type":"interruption"}"#
        );

        let audio = ControlMessage::Audio(AudioPayload::Base64("AQA=".into()));
        let value: Value = serde_json::from_str(&audio.to_json()).unwrap();
        assert_eq!(value["type"], "audio");
        assert_eq!(value["data"], "AQA=");
    }

    #[test]
    fn serialisieren_und_wieder_lesen() {
        let nachrichten = vec![
            ControlMessage::Text("hi".into()),
            ControlMessage::TurnComplete,
            ControlMessage::Interrupted {
                reason: Some("grund".into()),
            },
            ControlMessage::FunctionCall(FunctionCall {
                name: "mail".into(),
                args: json!({"an": "x"}),
            }),
            ControlMessage::Error(ErrorPayload::new("boom")),
        ];
        for msg in nachrichten {
            assert_eq!(ControlMessage::parse(&msg.to_json()).unwrap(), msg);
        }
    }

    #[test]
    fn typ_namen() {
        assert_eq!(ControlMessage::TurnComplete.typ(), "turn_complete");
        assert_eq!(
            ControlMessage::Unknown { typ: "x".into() }.typ(),
            "x"
        );
    }
}
