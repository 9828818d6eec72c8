//! Correlator
//!
//! Attributes tool calls and thoughts to the chat message that most plausibly
//! produced them. With messages sorted by time, message `i` owns the
//! half-open window `(ts[i-1], ts[i]]` and every item in that window whose
//! agent matches the message's sender.
//!
//! - Thoughts are windowed for every non-user message.
//! - Persisted tool calls arrive already joined to a message id and are
//!   taken as-is.
//! - Live tool calls go only to the newest non-user message, and only if
//!   that message has no persisted tool calls yet.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::history::MessageHistory;
use crate::types::{Message, Thought, ToolCall};

/// Per-message attribution result.
#[derive(Debug, Clone, Default)]
pub struct Correlation {
    /// Messages sorted oldest first
    pub messages: Vec<Message>,
    tool_calls: HashMap<String, Vec<ToolCall>>,
    thoughts: HashMap<String, Vec<Thought>>,
}

impl Correlation {
    /// Tool calls attributed to a message, oldest first.
    pub fn tool_calls(&self, message_id: &str) -> &[ToolCall] {
        self.tool_calls
            .get(message_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Thoughts attributed to a message, oldest first.
    pub fn thoughts(&self, message_id: &str) -> &[Thought] {
        self.thoughts
            .get(message_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether anything at all was attributed to a message.
    pub fn has_activity(&self, message_id: &str) -> bool {
        !self.tool_calls(message_id).is_empty() || !self.thoughts(message_id).is_empty()
    }
}

/// Something that can be placed in a message window.
trait Attributable {
    fn at(&self) -> DateTime<Utc>;
    fn agent(&self) -> &str;
}

impl Attributable for ToolCall {
    fn at(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn agent(&self) -> &str {
        &self.agent_id
    }
}

impl Attributable for Thought {
    fn at(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn agent(&self) -> &str {
        &self.agent_name
    }
}

/// Whether an event's agent identity matches a message sender.
///
/// An empty or `user` sender matches anything; otherwise the identity must
/// equal the sender or contain it case-insensitively.
pub fn agent_matches(identity: &str, from_agent: &str) -> bool {
    if from_agent.is_empty() || from_agent == "user" {
        return true;
    }
    identity == from_agent || identity.to_lowercase().contains(&from_agent.to_lowercase())
}

/// Window owned by `sorted[index]`: exclusive start, inclusive end.
fn window(sorted: &[Message], index: usize) -> (Option<DateTime<Utc>>, DateTime<Utc>) {
    let start = index
        .checked_sub(1)
        .and_then(|prev| sorted.get(prev))
        .map(|m| m.timestamp);
    (start, sorted[index].timestamp)
}

fn in_window<T: Attributable + Clone>(items: &[T], sorted: &[Message], index: usize) -> Vec<T> {
    let (start, end) = window(sorted, index);
    let from_agent = &sorted[index].from_agent;
    items
        .iter()
        .filter(|item| {
            let at = item.at();
            start.map_or(true, |start| at > start) && at <= end
        })
        .filter(|item| agent_matches(item.agent(), from_agent))
        .cloned()
        .collect()
}

/// Attribute a merged history to its messages.
pub fn correlate(history: &MessageHistory) -> Correlation {
    let mut messages = history.messages.clone();
    messages.sort_by_key(|m| m.timestamp);

    let mut thoughts_sorted = history.thoughts.clone();
    thoughts_sorted.sort_by_key(|t| t.timestamp);
    let mut live_sorted = history.live_events.clone();
    live_sorted.sort_by_key(|c| c.timestamp);

    let mut tool_calls: HashMap<String, Vec<ToolCall>> = history
        .persisted_events
        .iter()
        .filter(|(_, calls)| !calls.is_empty())
        .map(|(id, calls)| (id.clone(), calls.clone()))
        .collect();

    // Newest non-user message only
    if let Some(index) = messages.iter().rposition(|m| !m.is_user()) {
        let message_id = &messages[index].id;
        if !tool_calls.contains_key(message_id) {
            let relevant = in_window(&live_sorted, &messages, index);
            if !relevant.is_empty() {
                tracing::trace!(
                    message_id = %message_id,
                    count = relevant.len(),
                    "Attributed live tool calls"
                );
                tool_calls.insert(message_id.clone(), relevant);
            }
        }
    }

    let mut thoughts = HashMap::new();
    for (index, message) in messages.iter().enumerate() {
        if message.is_user() {
            continue;
        }
        let relevant = in_window(&thoughts_sorted, &messages, index);
        if !relevant.is_empty() {
            thoughts.insert(message.id.clone(), relevant);
        }
    }

    Correlation {
        messages,
        tool_calls,
        thoughts,
    }
}
