//! Chat payload model
//!
//! Inbound payloads are JSON objects classified by [`InboundPayload::parse`];
//! outbound chat messages are built with [`OutboundChatMessage`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value of `type` marking a full history snapshot
pub const SNAPSHOT_TYPE: &str = "all_histories";

/// Rank tier reported when none is known
pub const UNRANKED: i32 = -1;

fn unknown_user() -> String {
    "???".to_string()
}

fn unranked() -> i32 {
    UNRANKED
}

/// One chat message as stored in history.
///
/// Missing fields take the defaults the renderer expects; fields this crate
/// does not know about are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Channel the message was posted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Display name of the sender
    #[serde(default = "unknown_user")]
    pub user: String,
    /// Message body
    #[serde(default)]
    pub text: String,
    /// Sender's highest competitive rank tier, -1 when unknown
    #[serde(default = "unranked")]
    pub highest_rank: i32,
    /// Sender's platform, as reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Any other fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Short rank tag for the sender ("GC2", "UNR", ...)
    pub fn rank_tag(&self) -> &'static str {
        rank_tag(self.highest_rank)
    }
}

/// Game client platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Epic Games store build
    Epic,
    /// Steam build
    Steam,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epic => f.write_str("epic"),
            Self::Steam => f.write_str("steam"),
        }
    }
}

/// Identity attached to every outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSender {
    /// Player display name
    pub user: String,
    /// Client platform
    pub platform: Platform,
    /// Highest rank tier across the ranked playlists, -1 when unknown
    pub highest_rank: i32,
}

impl ChatSender {
    /// Sender with an unknown rank
    pub fn new(user: impl Into<String>, platform: Platform) -> Self {
        Self {
            user: user.into(),
            platform,
            highest_rank: UNRANKED,
        }
    }

    /// Set the highest rank from per-playlist tiers
    pub fn with_ranks(mut self, tiers: impl IntoIterator<Item = i32>) -> Self {
        self.highest_rank = highest_rank_of(tiers);
        self
    }
}

/// Outbound chat payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundChatMessage {
    /// Sender platform
    pub platform: Platform,
    /// Destination channel
    pub channel: String,
    /// Sender's highest rank tier
    pub highest_rank: i32,
    /// Sender display name
    pub user: String,
    /// Message body
    pub text: String,
}

impl OutboundChatMessage {
    /// Build the payload for `sender` posting `text` to `channel`
    pub fn new(sender: &ChatSender, channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            platform: sender.platform,
            channel: channel.into(),
            highest_rank: sender.highest_rank,
            user: sender.user.clone(),
            text: text.into(),
        }
    }

    /// Serialize to the wire format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Maximum of the given tiers, or -1 when there are none
pub fn highest_rank_of(tiers: impl IntoIterator<Item = i32>) -> i32 {
    tiers.into_iter().fold(UNRANKED, i32::max)
}

/// Short display tag for a rank tier
pub fn rank_tag(tier: i32) -> &'static str {
    match tier {
        22..=25 => "SSL",
        21 => "GC3",
        20 => "GC2",
        19 => "GC1",
        18 => "C3",
        17 => "C2",
        16 => "C1",
        15 => "D3",
        14 => "D2",
        13 => "D1",
        12 => "P3",
        11 => "P2",
        10 => "P1",
        9 => "G3",
        8 => "G2",
        7 => "G1",
        6 => "S3",
        5 => "S2",
        4 => "S1",
        3 => "B3",
        2 => "B2",
        1 => "B1",
        _ => "UNR",
    }
}

/// Full history replacement: channels sorted by name with their messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Channel name and its messages, oldest first
    pub channels: Vec<(String, Vec<ChatMessage>)>,
    /// Entries dropped because they could not be parsed
    pub skipped: usize,
}

impl Snapshot {
    fn from_data(data: Option<&Value>) -> Self {
        let mut snapshot = Snapshot::default();
        let entries = match data {
            Some(Value::Object(entries)) => entries,
            Some(Value::Null) | None => return snapshot,
            Some(other) => {
                tracing::warn!(kind = value_kind(other), "snapshot data is not an object");
                return snapshot;
            }
        };

        for (channel, messages) in entries {
            let mut parsed = Vec::new();
            match messages {
                Value::Array(items) => {
                    for item in items {
                        match parse_snapshot_entry(item) {
                            Ok(message) => parsed.push(message),
                            Err(e) => {
                                tracing::warn!(%channel, error = %e, "skipping snapshot entry");
                                snapshot.skipped += 1;
                            }
                        }
                    }
                }
                other => {
                    tracing::warn!(
                        %channel,
                        kind = value_kind(other),
                        "snapshot channel is not a list"
                    );
                    snapshot.skipped += 1;
                }
            }
            snapshot.channels.push((channel.clone(), parsed));
        }
        snapshot
    }
}

/// Snapshot entries are JSON documents encoded as strings
fn parse_snapshot_entry(item: &Value) -> Result<ChatMessage> {
    match item {
        Value::String(encoded) => Ok(serde_json::from_str(encoded)?),
        other => Err(Error::Protocol(format!(
            "snapshot entry is {}, expected string",
            value_kind(other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Classified inbound payload
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// Non-fatal error reported by the server
    ServerError(String),
    /// Replacement of all channels and history
    Snapshot(Snapshot),
    /// One new message for `channel`
    Chat {
        /// Destination channel
        channel: String,
        /// The message itself
        message: ChatMessage,
    },
    /// Valid JSON that matches no known shape
    Ignored,
}

impl InboundPayload {
    /// Classify an inbound text payload.
    ///
    /// Shapes are checked in order: `error`, then `type == "all_histories"`,
    /// then `channel` plus `user`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] when `text` is not JSON or a chat message has
    /// mistyped fields, and [`Error::Protocol`] when a chat message's channel
    /// is not a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use globalchat_wire::chat::InboundPayload;
    ///
    /// let payload = InboundPayload::parse(r#"{"error":"rate limited"}"#).unwrap();
    /// assert_eq!(payload, InboundPayload::ServerError("rate limited".into()));
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(object) = value else {
            return Ok(Self::Ignored);
        };

        if let Some(error) = object.get("error") {
            let error = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(Self::ServerError(error));
        }

        if object.get("type").and_then(Value::as_str) == Some(SNAPSHOT_TYPE) {
            return Ok(Self::Snapshot(Snapshot::from_data(object.get("data"))));
        }

        if object.contains_key("channel") && object.contains_key("user") {
            let channel = match object.get("channel") {
                Some(Value::String(channel)) => channel.clone(),
                _ => {
                    return Err(Error::Protocol(
                        "chat message channel is not a string".into(),
                    ))
                }
            };
            let message: ChatMessage = serde_json::from_value(Value::Object(object))?;
            return Ok(Self::Chat { channel, message });
        }

        Ok(Self::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_defaults() {
        let message: ChatMessage = serde_json::from_str(r#"{"channel":"general"}"#).unwrap();
        assert_eq!(message.user, "???");
        assert_eq!(message.text, "");
        assert_eq!(message.highest_rank, -1);
        assert_eq!(message.rank_tag(), "UNR");
        assert!(message.platform.is_none());
    }

    #[test]
    fn test_chat_message_keeps_unknown_fields() {
        let message: ChatMessage =
            serde_json::from_str(r#"{"user":"a","text":"b","timestamp":17}"#).unwrap();
        assert_eq!(message.extra.get("timestamp"), Some(&json!(17)));
    }

    #[test]
    fn test_parse_server_error() {
        let payload =
            InboundPayload::parse(r#"{"error":"rate limited","channel":"x","user":"y"}"#).unwrap();
        assert_eq!(payload, InboundPayload::ServerError("rate limited".into()));

        let payload = InboundPayload::parse(r#"{"error":{"code":429}}"#).unwrap();
        assert_eq!(payload, InboundPayload::ServerError(r#"{"code":429}"#.into()));
    }

    #[test]
    fn test_parse_chat() {
        let payload =
            InboundPayload::parse(r#"{"channel":"general","user":"alice","text":"hi"}"#).unwrap();
        match payload {
            InboundPayload::Chat { channel, message } => {
                assert_eq!(channel, "general");
                assert_eq!(message.user, "alice");
                assert_eq!(message.text, "hi");
                assert_eq!(message.channel.as_deref(), Some("general"));
            }
            other => panic!("expected chat, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_chat_with_non_string_channel() {
        let err = InboundPayload::parse(r#"{"channel":5,"user":"alice"}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_parse_snapshot() {
        let text = json!({
            "type": "all_histories",
            "data": {
                "trading": [],
                "general": [
                    r#"{"user":"alice","text":"one","highest_rank":20}"#,
                    "not json",
                    r#"{"user":"bob","text":"two"}"#
                ]
            }
        })
        .to_string();

        let InboundPayload::Snapshot(snapshot) = InboundPayload::parse(&text).unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.skipped, 1);
        let names: Vec<_> = snapshot.channels.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(names, vec!["general", "trading"]);
        let general = &snapshot.channels[0].1;
        assert_eq!(general.len(), 2);
        assert_eq!(general[0].rank_tag(), "GC2");
        assert_eq!(general[1].user, "bob");
    }

    #[test]
    fn test_parse_snapshot_without_data_is_empty() {
        let payload = InboundPayload::parse(r#"{"type":"all_histories"}"#).unwrap();
        assert_eq!(payload, InboundPayload::Snapshot(Snapshot::default()));
    }

    #[test]
    fn test_parse_ignored_and_malformed() {
        assert_eq!(
            InboundPayload::parse(r#"{"type":"ping"}"#).unwrap(),
            InboundPayload::Ignored
        );
        assert_eq!(InboundPayload::parse("[1,2]").unwrap(), InboundPayload::Ignored);
        assert!(matches!(
            InboundPayload::parse("{not json").unwrap_err(),
            Error::Json(_)
        ));
    }

    #[test]
    fn test_outbound_payload() {
        let sender = ChatSender::new("alice", Platform::Epic).with_ranks([12, 19, 4]);
        let json = OutboundChatMessage::new(&sender, "general", "hello")
            .to_json()
            .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            json!({
                "platform": "epic",
                "channel": "general",
                "highest_rank": 19,
                "user": "alice",
                "text": "hello"
            })
        );
    }

    #[test]
    fn test_highest_rank_of() {
        assert_eq!(highest_rank_of(Vec::new()), -1);
        assert_eq!(highest_rank_of([3, 21, 7]), 21);
        assert_eq!(highest_rank_of([-5]), -1);
    }

    #[test]
    fn test_rank_tags() {
        assert_eq!(rank_tag(0), "UNR");
        assert_eq!(rank_tag(1), "B1");
        assert_eq!(rank_tag(16), "C1");
        assert_eq!(rank_tag(22), "SSL");
        assert_eq!(rank_tag(25), "SSL");
        assert_eq!(rank_tag(26), "UNR");
    }
}
