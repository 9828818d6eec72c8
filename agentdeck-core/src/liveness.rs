//! Agent liveness derived from Tool-Event recency.
//!
//! A session is *active* while its latest event is a `PostToolUse` younger
//! than the activity timeout. A `Stop` event ends activity immediately.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::LivenessConfig;
use crate::store::AgentEventStore;
use crate::types::{AgentEvent, AgentEventType};

/// Answers "is this agent working right now?" from the Tool-Event store.
#[derive(Debug, Clone, Copy)]
pub struct LivenessOracle {
    timeout: chrono::Duration,
}

impl LivenessOracle {
    pub fn new(timeout: Duration) -> Self {
        let timeout =
            chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::weeks(52));
        Self { timeout }
    }

    pub fn from_config(config: &LivenessConfig) -> Self {
        Self::new(config.activity_timeout())
    }

    fn event_is_active(&self, event: &AgentEvent, now: DateTime<Utc>) -> bool {
        event.event_type == AgentEventType::PostToolUse && now - event.timestamp < self.timeout
    }

    pub fn is_active(&self, store: &AgentEventStore, session_id: &str) -> bool {
        self.is_active_at(store, session_id, Utc::now())
    }

    pub fn is_active_at(&self, store: &AgentEventStore, session_id: &str, now: DateTime<Utc>) -> bool {
        store
            .latest(session_id)
            .is_some_and(|event| self.event_is_active(event, now))
    }

    /// All currently active session ids.
    pub fn active_sessions(&self, store: &AgentEventStore, now: DateTime<Utc>) -> Vec<String> {
        let mut sessions: Vec<String> = store
            .latest_by_session()
            .filter(|(_, event)| self.event_is_active(event, now))
            .map(|(session_id, _)| session_id.to_string())
            .collect();
        sessions.sort();
        sessions
    }

    /// Latest active event for an agent, matched by session id substring or
    /// exact agent id. With no agent given, any active session counts.
    pub fn active_for_agent<'a>(
        &self,
        store: &'a AgentEventStore,
        agent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<&'a AgentEvent> {
        let needle = agent_id.map(str::to_lowercase);
        store
            .latest_by_session()
            .filter(|(session_id, event)| match (&needle, agent_id) {
                (Some(needle), Some(agent_id)) => {
                    session_id.to_lowercase().contains(needle.as_str())
                        || event.agent_id.as_deref() == Some(agent_id)
                }
                _ => true,
            })
            .map(|(_, event)| event)
            .filter(|event| self.event_is_active(event, now))
            .max_by_key(|event| event.timestamp)
    }
}

impl Default for LivenessOracle {
    fn default() -> Self {
        Self::from_config(&LivenessConfig::default())
    }
}

/// Human-readable description of what an active agent is doing.
pub fn activity_description(tool_name: Option<&str>) -> String {
    let Some(tool) = tool_name else {
        return "Working".to_string();
    };
    match tool {
        "Read" => "Reading files",
        "Write" => "Writing files",
        "Edit" => "Editing files",
        "Bash" => "Running command",
        "Glob" => "Searching files",
        "Grep" => "Searching code",
        "Task" => "Running task",
        "WebFetch" => "Fetching web content",
        "WebSearch" => "Searching the web",
        "AskUserQuestion" => "Waiting for input",
        "TodoRead" => "Reading tasks",
        "TodoWrite" => "Updating tasks",
        other => return format!("Using {}", other),
    }
    .to_string()
}
