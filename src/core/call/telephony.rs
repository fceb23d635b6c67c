//! Telephony media-stream wire messages.
//!
//! Inbound frames are tagged by `event`: `connected`, `start`, `media`,
//! `mark`, `stop`. Outbound frames are `media`, `mark` and `clear`, each
//! addressed with the `streamSid` captured at call start.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Inbound
// =============================================================================

/// Events received on the telephony leg.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// Socket handshake acknowledgement
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },

    /// Call started; carries the stream identifier
    Start { start: StartPayload },

    /// One frame of caller audio
    Media { media: MediaPayload },

    /// Echo of a previously requested playback acknowledgement
    Mark { mark: MarkPayload },

    /// Call ended
    Stop,

    /// Any event type the bridge does not act on
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StartPayload {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MediaPayload {
    /// Base64 mu-law audio
    pub payload: String,
    /// Milliseconds since the stream started
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: u64,
    #[serde(default)]
    pub track: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkPayload {
    pub name: String,
}

/// Accepts the timestamp as either a JSON number or a numeric string.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(ms) => Ok(ms),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// Messages sent to the telephony leg.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundMedia {
    /// Base64 mu-law audio
    pub payload: String,
}

impl TelephonyMessage {
    pub fn media(stream_sid: &str, payload: String) -> Self {
        TelephonyMessage::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia { payload },
        }
    }

    pub fn mark(stream_sid: &str, name: String) -> Self {
        TelephonyMessage::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkPayload { name },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        TelephonyMessage::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start() {
        let raw = r#"{"event":"start","sequenceNumber":"1","start":{"accountSid":"AC1","streamSid":"MZ1","callSid":"CA1","tracks":["inbound"],"customParameters":{"voice":"alloy"}},"streamSid":"MZ1"}"#;
        match serde_json::from_str::<TelephonyEvent>(raw).unwrap() {
            TelephonyEvent::Start { start } => {
                assert_eq!(start.stream_sid, "MZ1");
                assert_eq!(start.call_sid.as_deref(), Some("CA1"));
                assert_eq!(start.custom_parameters.get("voice").unwrap(), "alloy");
            }
            other => panic!("Expected Start, got {other:?}"),
        }
    }

    #[test]
    fn test_media_timestamp_string_or_number() {
        let as_string = r#"{"event":"media","media":{"track":"inbound","chunk":"2","timestamp":"5","payload":"/w=="}}"#;
        let as_number = r#"{"event":"media","media":{"timestamp":5,"payload":"/w=="}}"#;
        for raw in [as_string, as_number] {
            match serde_json::from_str::<TelephonyEvent>(raw).unwrap() {
                TelephonyEvent::Media { media } => {
                    assert_eq!(media.timestamp, 5);
                    assert_eq!(media.payload, "/w==");
                }
                other => panic!("Expected Media, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_non_numeric_timestamp_is_rejected() {
        let raw = r#"{"event":"media","media":{"timestamp":"soon","payload":""}}"#;
        assert!(serde_json::from_str::<TelephonyEvent>(raw).is_err());
    }

    #[test]
    fn test_stop_mark_connected_and_unknown() {
        let stop = r#"{"event":"stop","sequenceNumber":"9","stop":{"callSid":"CA1"},"streamSid":"MZ1"}"#;
        assert_eq!(serde_json::from_str::<TelephonyEvent>(stop).unwrap(), TelephonyEvent::Stop);

        let mark = r#"{"event":"mark","streamSid":"MZ1","mark":{"name":"part-3"}}"#;
        assert_eq!(
            serde_json::from_str::<TelephonyEvent>(mark).unwrap(),
            TelephonyEvent::Mark {
                mark: MarkPayload {
                    name: "part-3".to_string()
                }
            }
        );

        let connected = r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#;
        assert!(matches!(
            serde_json::from_str::<TelephonyEvent>(connected).unwrap(),
            TelephonyEvent::Connected { .. }
        ));

        let dtmf = r#"{"event":"dtmf","dtmf":{"digit":"1"}}"#;
        assert_eq!(serde_json::from_str::<TelephonyEvent>(dtmf).unwrap(), TelephonyEvent::Other);
    }

    #[test]
    fn test_outbound_shapes() {
        assert_eq!(
            serde_json::to_value(TelephonyMessage::media("MZ1", "AAA=".to_string())).unwrap(),
            json!({"event": "media", "streamSid": "MZ1", "media": {"payload": "AAA="}})
        );
        assert_eq!(
            serde_json::to_value(TelephonyMessage::mark("MZ1", "part-0".to_string())).unwrap(),
            json!({"event": "mark", "streamSid": "MZ1", "mark": {"name": "part-0"}})
        );
        assert_eq!(
            serde_json::to_value(TelephonyMessage::clear("MZ1")).unwrap(),
            json!({"event": "clear", "streamSid": "MZ1"})
        );
    }
}
