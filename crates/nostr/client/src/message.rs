//! Nostr relay message types.
//!
//! This module implements the relay protocol messages as specified in NIP-01:
//! - Client to Relay: EVENT, REQ, CLOSE
//! - Relay to Client: EVENT, OK, EOSE, CLOSED, NOTICE

use nostr::Event;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur when parsing relay messages.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("unexpected message type: {0}")]
    UnexpectedType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field: {0}")]
    MissingField(String),
}

/// Messages sent from client to relay.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// Publish an event: ["EVENT", <event JSON>]
    Event(Event),

    /// Subscribe to events: ["REQ", <subscription_id>, <filter1>, <filter2>, ...]
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },

    /// Close a subscription: ["CLOSE", <subscription_id>]
    Close { subscription_id: String },
}

impl ClientMessage {
    /// Serialize to JSON array for sending to relay.
    pub fn to_json(&self) -> Result<String, MessageError> {
        let value = match self {
            ClientMessage::Event(event) => {
                serde_json::json!(["EVENT", event])
            }
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let mut arr: Vec<Value> = vec![
                    Value::String("REQ".to_string()),
                    Value::String(subscription_id.clone()),
                ];
                for filter in filters {
                    arr.push(Value::Object(filter.encode()));
                }
                Value::Array(arr)
            }
            ClientMessage::Close { subscription_id } => {
                serde_json::json!(["CLOSE", subscription_id])
            }
        };
        Ok(serde_json::to_string(&value)?)
    }
}

/// Messages sent from relay to client.
#[derive(Debug, Clone)]
pub enum RelayMessage {
    /// Event matching a subscription: ["EVENT", <subscription_id>, <event JSON>]
    Event {
        subscription_id: String,
        event: Event,
    },

    /// Command result: ["OK", <event_id>, <true|false>, <message>]
    Ok {
        event_id: String,
        success: bool,
        message: String,
    },

    /// End of stored events: ["EOSE", <subscription_id>]
    Eose { subscription_id: String },

    /// Subscription closed by relay: ["CLOSED", <subscription_id>, <message>]
    Closed {
        subscription_id: String,
        message: String,
    },

    /// Human-readable notice: ["NOTICE", <message>]
    Notice { message: String },
}

impl RelayMessage {
    /// Parse a JSON message from the relay.
    ///
    /// Parsing is lenient about trailing elements; callers that need an exact
    /// shape (publish acknowledgements) use [`parse_ok_message`] instead.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let arr: Vec<Value> =
            serde_json::from_str(json).map_err(|e| MessageError::InvalidFormat(e.to_string()))?;

        if arr.is_empty() {
            return Err(MessageError::InvalidFormat("empty array".to_string()));
        }

        let msg_type = arr[0]
            .as_str()
            .ok_or_else(|| MessageError::InvalidFormat("first element not a string".to_string()))?;

        match msg_type {
            "EVENT" => {
                if arr.len() < 3 {
                    return Err(MessageError::MissingField(
                        "event or subscription_id".to_string(),
                    ));
                }
                let subscription_id = string_at(&arr, 1, "subscription_id")?;
                let event: Event = serde_json::from_value(arr[2].clone())?;
                Ok(RelayMessage::Event {
                    subscription_id,
                    event,
                })
            }
            "OK" => {
                if arr.len() < 4 {
                    return Err(MessageError::MissingField("OK fields".to_string()));
                }
                let event_id = string_at(&arr, 1, "event_id")?;
                let success = arr[2].as_bool().ok_or_else(|| {
                    MessageError::InvalidFormat("success not a boolean".to_string())
                })?;
                let message = arr[3].as_str().unwrap_or("").to_string();
                Ok(RelayMessage::Ok {
                    event_id,
                    success,
                    message,
                })
            }
            "EOSE" => {
                if arr.len() < 2 {
                    return Err(MessageError::MissingField("subscription_id".to_string()));
                }
                let subscription_id = string_at(&arr, 1, "subscription_id")?;
                Ok(RelayMessage::Eose { subscription_id })
            }
            "CLOSED" => {
                if arr.len() < 2 {
                    return Err(MessageError::MissingField("subscription_id".to_string()));
                }
                let subscription_id = string_at(&arr, 1, "subscription_id")?;
                let message = arr
                    .get(2)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                Ok(RelayMessage::Closed {
                    subscription_id,
                    message,
                })
            }
            "NOTICE" => {
                if arr.len() < 2 {
                    return Err(MessageError::MissingField("message".to_string()));
                }
                let message = string_at(&arr, 1, "message")?;
                Ok(RelayMessage::Notice { message })
            }
            _ => Err(MessageError::UnknownType(msg_type.to_string())),
        }
    }
}

fn string_at(arr: &[Value], index: usize, field: &str) -> Result<String, MessageError> {
    arr[index]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MessageError::InvalidFormat(format!("{} not a string", field)))
}

/// A relay's verdict on a published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkResult {
    /// Event id echoed by the relay (may be empty)
    pub event_id: String,
    /// Whether the relay accepted the event
    pub accepted: bool,
    /// Human-readable reason, verbatim from the relay
    pub message: String,
}

/// Strictly parse `["OK", <event_id>, <bool>, <message>]`.
///
/// Exactly four elements are required and each must have the expected JSON
/// type.
pub fn parse_ok_message(json: &str) -> Result<OkResult, MessageError> {
    let arr: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| MessageError::InvalidFormat(format!("unmarshal OK payload: {}", e)))?;

    if arr.len() != 4 {
        return Err(MessageError::InvalidFormat(format!(
            "invalid OK message: expected 4 elements, got {}: {}",
            arr.len(),
            json
        )));
    }

    match arr[0].as_str() {
        Some("OK") => {}
        Some(other) => return Err(MessageError::UnexpectedType(other.to_string())),
        None => {
            return Err(MessageError::InvalidFormat(
                "first element not a string".to_string(),
            ));
        }
    }

    let event_id = string_at(&arr, 1, "event_id")?;
    let accepted = arr[2]
        .as_bool()
        .ok_or_else(|| MessageError::InvalidFormat("OK flag not a boolean".to_string()))?;
    let message = string_at(&arr, 3, "message")?;

    Ok(OkResult {
        event_id,
        accepted,
        message,
    })
}

/// Filter for subscription requests.
///
/// Empty lists, unset bounds and a zero limit are left out of the wire form
/// entirely; relays treat `"limit":0` or `"authors":[]` as real constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Authors (pubkeys)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    /// Event kinds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u16>,

    /// Events since timestamp
    #[serde(default, skip_serializing_if = "is_unset")]
    pub since: Option<u64>,

    /// Events until timestamp
    #[serde(default, skip_serializing_if = "is_unset")]
    pub until: Option<u64>,

    /// Maximum number of events
    #[serde(default, skip_serializing_if = "is_unset")]
    pub limit: Option<u64>,
}

fn is_unset(value: &Option<u64>) -> bool {
    matches!(value, None | Some(0))
}

impl Filter {
    /// Create a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by authors.
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    /// Filter by kinds.
    pub fn kinds(mut self, kinds: Vec<u16>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Filter by events since timestamp.
    pub fn since(mut self, timestamp: u64) -> Self {
        self.since = Some(timestamp);
        self
    }

    /// Filter by events until timestamp.
    pub fn until(mut self, timestamp: u64) -> Self {
        self.until = Some(timestamp);
        self
    }

    /// Limit number of results.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Wire form of this filter as a JSON object.
    pub fn encode(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Strings and integers always serialize to an object.
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_client_message_event() {
        let event = Event {
            id: "abc123".to_string(),
            pubkey: "pubkey123".to_string(),
            created_at: 1234567890,
            kind: 1,
            tags: vec![],
            content: "Hello".to_string(),
            sig: "sig123".to_string(),
            origin: Some("wss://relay.example.com".to_string()),
        };

        let msg = ClientMessage::Event(event);
        let json = msg.to_json().unwrap();

        assert!(json.starts_with(r#"["EVENT",{"#));
        assert!(json.contains("abc123"));
        assert!(!json.contains("relay.example.com"));
    }

    #[test]
    fn test_client_message_req() {
        let filter = Filter::new().kinds(vec![1]).since(1_700_000_000);

        let msg = ClientMessage::Req {
            subscription_id: "sub1".to_string(),
            filters: vec![filter],
        };

        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!(["REQ", "sub1", {"kinds": [1], "since": 1_700_000_000}])
        );
    }

    #[test]
    fn test_client_message_close() {
        let msg = ClientMessage::Close {
            subscription_id: "sub1".to_string(),
        };

        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"["CLOSE","sub1"]"#);
    }

    #[test]
    fn test_relay_message_event() {
        let json = r#"["EVENT","sub1",{"id":"abc","pubkey":"pk","created_at":123,"kind":1,"tags":[],"content":"Hello","sig":"sig"}]"#;
        let msg = RelayMessage::from_json(json).unwrap();

        match msg {
            RelayMessage::Event {
                subscription_id,
                event,
            } => {
                assert_eq!(subscription_id, "sub1");
                assert_eq!(event.id, "abc");
                assert_eq!(event.content, "Hello");
                assert_eq!(event.origin, None);
            }
            _ => panic!("wrong message type"),
        }
    }

    #[test]
    fn test_relay_message_event_missing_fields() {
        let result = RelayMessage::from_json(r#"["EVENT","sub1"]"#);
        assert!(matches!(result, Err(MessageError::MissingField(_))));

        let result = RelayMessage::from_json(r#"["EVENT","sub1",{"id":"abc"}]"#);
        assert!(matches!(result, Err(MessageError::Json(_))));
    }

    #[test]
    fn test_relay_message_ok_failure() {
        let json = r#"["OK","event123",false,"duplicate: already have this event"]"#;
        let msg = RelayMessage::from_json(json).unwrap();

        match msg {
            RelayMessage::Ok {
                event_id,
                success,
                message,
            } => {
                assert_eq!(event_id, "event123");
                assert!(!success);
                assert!(message.contains("duplicate"));
            }
            _ => panic!("wrong message type"),
        }
    }

    #[test]
    fn test_relay_message_eose() {
        let json = r#"["EOSE","sub1"]"#;
        let msg = RelayMessage::from_json(json).unwrap();

        match msg {
            RelayMessage::Eose { subscription_id } => {
                assert_eq!(subscription_id, "sub1");
            }
            _ => panic!("wrong message type"),
        }
    }

    #[test]
    fn test_relay_message_closed() {
        let json = r#"["CLOSED","sub1","error: too many subscriptions"]"#;
        let msg = RelayMessage::from_json(json).unwrap();

        match msg {
            RelayMessage::Closed {
                subscription_id,
                message,
            } => {
                assert_eq!(subscription_id, "sub1");
                assert!(message.contains("too many subscriptions"));
            }
            _ => panic!("wrong message type"),
        }
    }

    #[test]
    fn test_relay_message_notice() {
        let json = r#"["NOTICE","rate limited"]"#;
        let msg = RelayMessage::from_json(json).unwrap();

        match msg {
            RelayMessage::Notice { message } => {
                assert_eq!(message, "rate limited");
            }
            _ => panic!("wrong message type"),
        }
    }

    #[test]
    fn test_invalid_message() {
        assert!(RelayMessage::from_json("not valid json").is_err());
        assert!(RelayMessage::from_json("[]").is_err());
        assert!(RelayMessage::from_json("{}").is_err());
        assert!(RelayMessage::from_json("[1,2]").is_err());
        assert!(matches!(
            RelayMessage::from_json(r#"["AUTH","challenge"]"#),
            Err(MessageError::UnknownType(_))
        ));
    }

    #[test]
    fn test_parse_ok_message() {
        let cases: &[(&str, Option<OkResult>)] = &[
            (
                r#"["OK","event-id",true,"accepted"]"#,
                Some(OkResult {
                    event_id: "event-id".to_string(),
                    accepted: true,
                    message: "accepted".to_string(),
                }),
            ),
            (
                r#"["OK","event-id",false,"reason"]"#,
                Some(OkResult {
                    event_id: "event-id".to_string(),
                    accepted: false,
                    message: "reason".to_string(),
                }),
            ),
            (
                r#"["OK","",true,""]"#,
                Some(OkResult {
                    event_id: String::new(),
                    accepted: true,
                    message: String::new(),
                }),
            ),
            ("{not-json", None),
            (r#"["OK","event-id",true]"#, None),
            (r#"["OK","event-id",true,"msg","extra"]"#, None),
            (r#"["EVENT","event-id",true,"msg"]"#, None),
            (r#"["OK","event-id","true","msg"]"#, None),
            (r#"["OK",42,true,"msg"]"#, None),
            (r#"["OK","event-id",true,null]"#, None),
            (r#"[1,"event-id",true,"msg"]"#, None),
        ];

        for (input, expected) in cases {
            match (parse_ok_message(input), expected) {
                (Ok(got), Some(want)) => assert_eq!(&got, want, "input {}", input),
                (Err(_), None) => {}
                (got, want) => panic!("input {}: got {:?}, want {:?}", input, got, want),
            }
        }
    }

    #[test]
    fn test_parse_ok_message_errors_are_descriptive() {
        let err = parse_ok_message(r#"["OK","event-id",true]"#).unwrap_err();
        assert!(err.to_string().contains("invalid OK message"));

        let err = parse_ok_message(r#"["EVENT","event-id",true,"msg"]"#).unwrap_err();
        assert!(err.to_string().contains("unexpected message type: EVENT"));

        let err = parse_ok_message("{not-json").unwrap_err();
        assert!(err.to_string().contains("unmarshal OK payload"));
    }

    #[test]
    fn test_filter_builder() {
        let filter = Filter::new()
            .kinds(vec![1, 4])
            .authors(vec!["author1".to_string()])
            .since(1000)
            .until(2000)
            .limit(100);

        assert_eq!(filter.kinds, vec![1, 4]);
        assert_eq!(filter.authors, vec!["author1".to_string()]);
        assert_eq!(filter.since, Some(1000));
        assert_eq!(filter.until, Some(2000));
        assert_eq!(filter.limit, Some(100));
    }

    #[test]
    fn test_filter_encode_empty() {
        assert!(Filter::new().encode().is_empty());
        assert_eq!(serde_json::to_string(&Filter::new()).unwrap(), "{}");
    }

    #[test]
    fn test_filter_encode_limit_only() {
        let encoded = Filter::new().limit(42).encode();
        assert_eq!(Value::Object(encoded), json!({"limit": 42}));
    }

    #[test]
    fn test_filter_encode_authors_and_kinds() {
        let encoded = Filter::new()
            .authors(vec!["author1".to_string(), "author2".to_string()])
            .kinds(vec![1, 2])
            .encode();
        assert_eq!(
            Value::Object(encoded),
            json!({"authors": ["author1", "author2"], "kinds": [1, 2]})
        );
    }

    #[test]
    fn test_filter_encode_all_fields() {
        let encoded = Filter::new()
            .authors(vec!["pub".to_string()])
            .kinds(vec![1])
            .since(100)
            .until(3700)
            .limit(42)
            .encode();
        assert_eq!(
            Value::Object(encoded),
            json!({
                "authors": ["pub"],
                "kinds": [1],
                "since": 100,
                "until": 3700,
                "limit": 42
            })
        );
    }

    #[test]
    fn test_filter_encode_omits_zero_values() {
        let filter = Filter {
            authors: vec![],
            kinds: vec![],
            since: Some(0),
            until: Some(0),
            limit: Some(0),
        };
        assert!(filter.encode().is_empty());
    }

    #[test]
    fn test_filter_encode_never_emits_null() {
        let filter = Filter::new().kinds(vec![1]);
        let json = serde_json::to_string(&filter).unwrap();
        assert_eq!(json, r#"{"kinds":[1]}"#);
        assert!(!json.contains("null"));
    }
}
