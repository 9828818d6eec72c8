//! Decoding of live stream envelopes.
//!
//! Wire format: `{ "event": <kind>, "data": {...}, "timestamp": <ISO-8601> }`.
//! The `event` field is checked against a closed set of kinds and each kind's
//! payload is validated here, so nothing downstream handles untyped JSON
//! except the opaque Activity payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{parse_timestamp, Activity, ActivityType, AgentEvent, Thought};

/// Reply sent for every server heartbeat probe.
pub const PONG: &str = r#"{"event":"pong"}"#;

/// Every event kind the dashboard server broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AgentEvent,
    AgentThought,
    NewMessage,
    UserMessage,
    MessageSent,
    MailboxMessage,
    SessionCreated,
    SessionTerminated,
    SessionStatusChanged,
    StatusChange,
    WebhookReceived,
    TaskStatusUpdate,
    HeartbeatUpdate,
    AgentArchived,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AgentEvent => "agent_event",
            EventKind::AgentThought => "agent_thought",
            EventKind::NewMessage => "new_message",
            EventKind::UserMessage => "user_message",
            EventKind::MessageSent => "message_sent",
            EventKind::MailboxMessage => "mailbox_message",
            EventKind::SessionCreated => "session_created",
            EventKind::SessionTerminated => "session_terminated",
            EventKind::SessionStatusChanged => "session_status_changed",
            EventKind::StatusChange => "status_change",
            EventKind::WebhookReceived => "webhook_received",
            EventKind::TaskStatusUpdate => "task_status_update",
            EventKind::HeartbeatUpdate => "heartbeat_update",
            EventKind::AgentArchived => "agent_archived",
        }
    }

    /// Feed type for this kind. Kinds without a dedicated type fall back to
    /// `tool_call`.
    pub fn activity_type(&self) -> ActivityType {
        match self {
            EventKind::MessageSent => ActivityType::MessageSent,
            EventKind::NewMessage => ActivityType::MessageReceived,
            EventKind::UserMessage => ActivityType::UserMessage,
            EventKind::MailboxMessage => ActivityType::MailboxMessage,
            EventKind::WebhookReceived => ActivityType::WebhookReceived,
            EventKind::StatusChange
            | EventKind::SessionCreated
            | EventKind::SessionTerminated
            | EventKind::SessionStatusChanged
            | EventKind::AgentArchived => ActivityType::StatusChange,
            EventKind::AgentEvent
            | EventKind::AgentThought
            | EventKind::TaskStatusUpdate
            | EventKind::HeartbeatUpdate => ActivityType::ToolCall,
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "agent_event" => EventKind::AgentEvent,
            "agent_thought" => EventKind::AgentThought,
            "new_message" => EventKind::NewMessage,
            "user_message" => EventKind::UserMessage,
            "message_sent" => EventKind::MessageSent,
            "mailbox_message" => EventKind::MailboxMessage,
            "session_created" => EventKind::SessionCreated,
            "session_terminated" => EventKind::SessionTerminated,
            "session_status_changed" => EventKind::SessionStatusChanged,
            "status_change" => EventKind::StatusChange,
            "webhook_received" => EventKind::WebhookReceived,
            "task_status_update" => EventKind::TaskStatusUpdate,
            "heartbeat_update" => EventKind::HeartbeatUpdate,
            "agent_archived" => EventKind::AgentArchived,
            other => return Err(Error::envelope(other, "unknown event kind")),
        })
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated per-kind payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    ToolEvent(AgentEvent),
    Thought(Thought),
    /// The chat message list changed on the server
    MessagesStale,
    /// The session list changed on the server
    SessionsStale,
    AgentArchived { agent_id: String },
    /// Kinds that only feed the activity stream
    FeedOnly,
}

/// A decoded data envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: EventKind,
    pub payload: Payload,
    /// Raw `data` object, kept as the activity payload
    pub data: serde_json::Value,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Anything that can arrive on the live stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Server heartbeat probe; answer with [`PONG`]
    Ping,
    Data(Envelope),
}

#[derive(Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct ArchivedPayload {
    agent_id: String,
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<Inbound> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    if raw.event == "ping" {
        return Ok(Inbound::Ping);
    }

    let kind: EventKind = raw.event.parse()?;
    let payload = match kind {
        EventKind::AgentEvent => {
            let mut event: AgentEvent = serde_json::from_value(raw.data.clone())
                .map_err(|e| Error::envelope(kind.as_str(), e))?;
            event.ensure_id();
            Payload::ToolEvent(event)
        }
        EventKind::AgentThought => {
            let mut thought: Thought = serde_json::from_value(raw.data.clone())
                .map_err(|e| Error::envelope(kind.as_str(), e))?;
            thought.ensure_id();
            Payload::Thought(thought)
        }
        EventKind::NewMessage | EventKind::UserMessage => Payload::MessagesStale,
        EventKind::SessionCreated
        | EventKind::SessionTerminated
        | EventKind::SessionStatusChanged => Payload::SessionsStale,
        EventKind::AgentArchived => {
            let archived: ArchivedPayload = serde_json::from_value(raw.data.clone())
                .map_err(|e| Error::envelope(kind.as_str(), e))?;
            Payload::AgentArchived {
                agent_id: archived.agent_id,
            }
        }
        _ => Payload::FeedOnly,
    };

    let timestamp = match raw.timestamp.as_deref() {
        Some(ts) => Some(
            parse_timestamp(ts).ok_or_else(|| Error::envelope(kind.as_str(), "bad timestamp"))?,
        ),
        None => None,
    };

    Ok(Inbound::Data(Envelope {
        kind,
        payload,
        data: raw.data,
        timestamp,
    }))
}

impl Envelope {
    /// Normalize into an activity feed entry.
    pub fn to_activity(&self) -> Activity {
        match &self.payload {
            Payload::ToolEvent(event) => Activity::from_agent_event(event),
            Payload::Thought(thought) => Activity {
                id: thought.id.clone(),
                timestamp: thought.timestamp,
                activity_type: self.kind.activity_type(),
                agent_id: thought.agent_name.clone(),
                data: self.data.clone(),
            },
            _ => Activity {
                id: self
                    .string_field(&["id"])
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                timestamp: self.timestamp.unwrap_or_else(Utc::now),
                activity_type: self.kind.activity_type(),
                agent_id: self
                    .string_field(&["agent_id", "agent_name", "from_agent", "session_id"])
                    .unwrap_or_else(|| "system".to_string()),
                data: self.data.clone(),
            },
        }
    }

    fn string_field(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.data.get(*key).and_then(|v| v.as_str()))
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }
}
