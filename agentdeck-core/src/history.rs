//! History Merger
//!
//! Reconciles REST-fetched history with the live stores. Everything here is
//! keyed by id and re-sorted by timestamp, so fetches may resolve before or
//! after the live copies of the same events arrive.

use std::collections::{HashMap, HashSet};

use crate::client::{ApiClient, MessagePage};
use crate::config::HistoryConfig;
use crate::error::Result;
use crate::store::{self, SharedStores, Stores};
use crate::types::{Activity, AgentEvent, AgentEventType, Message, Thought, ToolCall};

/// Merge live and persisted thoughts.
///
/// Live thoughts win: a persisted thought is kept only if no live thought has
/// its id. The result is sorted by timestamp, ties in input order.
pub fn merge_thoughts<'a>(
    live: impl IntoIterator<Item = &'a Thought>,
    persisted: impl IntoIterator<Item = Thought>,
) -> Vec<Thought> {
    let mut merged: Vec<Thought> = Vec::new();
    let mut seen = HashSet::new();
    for thought in live {
        if seen.insert(thought.id.clone()) {
            merged.push(thought.clone());
        }
    }
    for thought in persisted {
        if seen.insert(thought.id.clone()) {
            merged.push(thought);
        }
    }
    merged.sort_by_key(|t| t.timestamp);
    merged
}

/// Accumulates paginated chat messages, deduplicated by id.
#[derive(Debug)]
pub struct MessageFeed {
    messages: Vec<Message>,
    ids: HashSet<String>,
    next_offset: usize,
    has_more: bool,
    page_size: usize,
}

impl MessageFeed {
    pub fn new(page_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            ids: HashSet::new(),
            next_offset: 0,
            has_more: true,
            page_size,
        }
    }

    /// Append a fetched page. Returns how many messages were new.
    pub fn push_page(&mut self, page: MessagePage) -> usize {
        self.next_offset += page.messages.len();
        self.has_more = page.has_more;
        let before = self.messages.len();
        for message in page.messages {
            if self.ids.insert(message.id.clone()) {
                self.messages.push(message);
            }
        }
        self.messages.len() - before
    }

    /// Fetch the next page. Returns the number of new messages, 0 once
    /// the server reports no more pages.
    pub async fn load_next(&mut self, client: &ApiClient) -> Result<usize> {
        if !self.has_more {
            return Ok(0);
        }
        let page = client.messages(self.page_size, self.next_offset).await?;
        Ok(self.push_page(page))
    }

    pub fn next_offset(&self) -> usize {
        self.next_offset
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Everything the Correlator needs for one page of messages.
#[derive(Debug, Clone, Default)]
pub struct MessageHistory {
    pub messages: Vec<Message>,
    /// Server-attributed tool calls by message id
    pub persisted_events: HashMap<String, Vec<ToolCall>>,
    /// Live tool calls not yet attributed, oldest first
    pub live_events: Vec<ToolCall>,
    /// Live and persisted thoughts, merged
    pub thoughts: Vec<Thought>,
}

impl MessageHistory {
    /// Combine fetched history with the current live store contents.
    pub fn assemble(
        messages: Vec<Message>,
        persisted_events: HashMap<String, Vec<AgentEvent>>,
        persisted_thoughts: Vec<Thought>,
        stores: &Stores,
    ) -> Self {
        let persisted_events: HashMap<String, Vec<ToolCall>> = persisted_events
            .into_iter()
            .map(|(message_id, events)| {
                let mut calls: Vec<ToolCall> = events
                    .iter()
                    .filter(|e| e.event_type == AgentEventType::PostToolUse)
                    .map(ToolCall::from)
                    .collect();
                calls.sort_by_key(|c| c.timestamp);
                (message_id, calls)
            })
            .filter(|(_, calls)| !calls.is_empty())
            .collect();

        let mut seen: HashSet<&str> = persisted_events
            .values()
            .flatten()
            .map(|c| c.id.as_str())
            .collect();
        let mut live_events: Vec<ToolCall> = stores
            .agent_events
            .all_events()
            .filter(|e| e.event_type == AgentEventType::PostToolUse)
            .filter(|e| seen.insert(e.id.as_str()))
            .map(ToolCall::from)
            .collect();
        live_events.sort_by_key(|c| c.timestamp);

        let thoughts = merge_thoughts(stores.thoughts.iter(), persisted_thoughts);

        Self {
            messages,
            persisted_events,
            live_events,
            thoughts,
        }
    }

    /// Fetch persisted tool calls for `messages` plus recent thoughts, then
    /// merge with the live stores.
    ///
    /// On a fetch error nothing is merged and the stores are untouched.
    pub async fn load(
        client: &ApiClient,
        stores: &SharedStores,
        messages: Vec<Message>,
        config: &HistoryConfig,
    ) -> Result<Self> {
        let message_ids: Vec<String> = messages
            .iter()
            .filter(|m| !m.is_user())
            .map(|m| m.id.clone())
            .collect();

        let (events, thoughts) = tokio::try_join!(
            client.events_by_messages(&message_ids),
            client.thoughts(config.thought_limit, None),
        )?;
        tracing::debug!(
            messages = messages.len(),
            attributed = events.len(),
            thoughts = thoughts.len(),
            "Loaded message history"
        );

        let stores = store::lock(stores);
        Ok(Self::assemble(messages, events, thoughts, &stores))
    }
}

/// Counts of what a backfill actually inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub activities: usize,
    pub agent_events: usize,
    pub thoughts: usize,
}

/// Bulk-load recent history into the stores.
pub fn apply_backfill(stores: &mut Stores, events: Vec<AgentEvent>, thoughts: Vec<Thought>) -> BackfillReport {
    let activities = stores
        .activities
        .add_many(events.iter().map(Activity::from_agent_event));
    let agent_events = events
        .into_iter()
        .map(|event| stores.agent_events.add(event))
        .filter(|added| *added)
        .count();
    let thoughts = stores.thoughts.add_many(thoughts);
    BackfillReport {
        activities,
        agent_events,
        thoughts,
    }
}

/// Fetch recent tool-events and thoughts and merge them into the stores.
///
/// Run at startup and after every reconnect to recover events emitted while
/// the stream was down.
pub async fn backfill(
    client: &ApiClient,
    stores: &SharedStores,
    config: &HistoryConfig,
) -> Result<BackfillReport> {
    let (events, thoughts) = tokio::try_join!(
        client.agent_events(None, config.event_backfill_limit),
        client.thoughts(config.thought_limit, None),
    )?;
    let report = apply_backfill(&mut store::lock(stores), events, thoughts);
    tracing::info!(
        activities = report.activities,
        agent_events = report.agent_events,
        thoughts = report.thoughts,
        "Backfilled history"
    );
    Ok(report)
}
