//! Core domain types for agentdeck
//!
//! These types mirror the dashboard's wire model. Timestamps are parsed once at
//! the ingestion boundary into `DateTime<Utc>` so every ordering decision in the
//! engine compares instants, never strings.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Activity** | Normalized feed entry for any dashboard-visible event |
//! | **Tool-Event** | A `PostToolUse` or `Stop` hook record, scoped to a session |
//! | **Thought** | A reasoning trace (or raw tool echo) emitted by an agent |
//! | **Message** | A chat message owned by the REST collaborator |
//! | **Session** | The id grouping Tool-Events of one running agent process |

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

// ============================================
// Timestamps
// ============================================

/// Parse an ISO-8601 timestamp, treating offset-less values as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// 32-char hex digest over `|`-joined parts.
pub(crate) fn content_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

// ============================================
// Activity
// ============================================

/// Kind of feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    ToolCall,
    MessageSent,
    MessageReceived,
    StatusChange,
    WebhookReceived,
    UserMessage,
    MailboxMessage,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::ToolCall => "tool_call",
            ActivityType::MessageSent => "message_sent",
            ActivityType::MessageReceived => "message_received",
            ActivityType::StatusChange => "status_change",
            ActivityType::WebhookReceived => "webhook_received",
            ActivityType::UserMessage => "user_message",
            ActivityType::MailboxMessage => "mailbox_message",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized activity feed entry. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub agent_id: String,
    /// Opaque payload of the originating event
    pub data: serde_json::Value,
}

impl Activity {
    /// Content fingerprint used as a secondary dedup key.
    ///
    /// Catches the same event arriving from REST and from the socket under
    /// different ids.
    pub fn fingerprint(&self) -> String {
        content_hash(&[
            self.activity_type.as_str(),
            &self.agent_id,
            &self.timestamp.to_rfc3339(),
        ])
    }

    /// Build the feed entry for a persisted or live tool-event.
    pub fn from_agent_event(event: &AgentEvent) -> Self {
        let activity_type = match event.event_type {
            AgentEventType::Stop => ActivityType::StatusChange,
            AgentEventType::PostToolUse => ActivityType::ToolCall,
        };
        Activity {
            id: event.id.clone(),
            timestamp: event.timestamp,
            activity_type,
            agent_id: event.agent_identity().to_string(),
            data: serde_json::json!({
                "tool_name": event.tool_name,
                "tool_input": event.tool_input,
                "tool_output": event.tool_output,
            }),
        }
    }
}

// ============================================
// Tool-Events
// ============================================

/// Hook lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentEventType {
    PostToolUse,
    Stop,
}

/// A tool invocation record reported by an agent hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(default)]
    pub id: String,
    pub event_type: AgentEventType,
    pub session_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_output: Option<serde_json::Value>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    /// The agent this event belongs to: `agent_id`, or the session id when the
    /// hook could not name the agent.
    pub fn agent_identity(&self) -> &str {
        match self.agent_id.as_deref() {
            Some(id) if !id.is_empty() && id != "unknown" => id,
            _ => &self.session_id,
        }
    }

    /// Fill in a deterministic id when the payload carried none.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            let event_type = format!("{:?}", self.event_type);
            let tool = self.tool_name.as_deref().unwrap_or_default();
            self.id = content_hash(&[
                &event_type,
                &self.session_id,
                tool,
                &self.timestamp.to_rfc3339(),
            ]);
        }
    }
}

/// Tool call as shown under a chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub tool_name: Option<String>,
    pub tool_input: Option<serde_json::Value>,
    pub tool_output: Option<serde_json::Value>,
}

impl From<&AgentEvent> for ToolCall {
    fn from(event: &AgentEvent) -> Self {
        ToolCall {
            id: event.id.clone(),
            timestamp: event.timestamp,
            agent_id: event.agent_identity().to_string(),
            tool_name: event.tool_name.clone(),
            tool_input: event.tool_input.clone(),
            tool_output: event.tool_output.clone(),
        }
    }
}

// ============================================
// Thoughts
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtType {
    Reasoning,
    ToolResult,
}

impl ThoughtType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtType::Reasoning => "reasoning",
            ThoughtType::ToolResult => "tool_result",
        }
    }
}

/// A captured reasoning or tool-echo trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    #[serde(default)]
    pub id: String,
    pub agent_name: String,
    pub thought_type: ThoughtType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<String>,
    #[serde(default)]
    pub tool_response: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Thought {
    /// Only reasoning thoughts with content belong in narrative views.
    pub fn is_narrative(&self) -> bool {
        self.thought_type == ThoughtType::Reasoning
            && self.content.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Fill in a deterministic id when the payload carried none.
    ///
    /// Live thoughts are broadcast without an id; hashing the stable fields
    /// lets a later REST copy of the same thought dedup against it.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = content_hash(&[
                &self.agent_name,
                self.thought_type.as_str(),
                &self.timestamp.to_rfc3339(),
                self.content.as_deref().unwrap_or_default(),
            ]);
        }
    }
}

// ============================================
// Messages
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Task,
    Status,
    Response,
    Error,
    User,
    Mailbox,
    System,
}

/// A chat message. Read-only context for correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub from_agent: String,
    #[serde(default)]
    pub to_agent: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Whether a human wrote this message.
    pub fn is_user(&self) -> bool {
        self.message_type == MessageType::User || self.from_agent == "user"
    }
}
