//! Per-session Tool-Event history with a latest-event projection.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::AgentEvent;

/// Buffer for a single session's events
#[derive(Debug, Default)]
struct SessionLog {
    /// Newest first
    events: VecDeque<AgentEvent>,
    ids: HashSet<String>,
}

/// Tool-Events keyed by `session_id`, each session capped independently.
#[derive(Debug)]
pub struct AgentEventStore {
    sessions: HashMap<String, SessionLog>,
    latest: HashMap<String, AgentEvent>,
    per_session_cap: usize,
}

impl AgentEventStore {
    pub fn new(per_session_cap: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            latest: HashMap::new(),
            per_session_cap,
        }
    }

    /// Insert an event. Returns false if its id was already stored.
    pub fn add(&mut self, event: AgentEvent) -> bool {
        let log = self.sessions.entry(event.session_id.clone()).or_default();
        if log.ids.contains(&event.id) {
            return false;
        }

        // Historical events may land after newer live ones
        let newer_than_latest = self
            .latest
            .get(&event.session_id)
            .map_or(true, |current| event.timestamp >= current.timestamp);
        if newer_than_latest {
            self.latest.insert(event.session_id.clone(), event.clone());
        }

        let pos = log
            .events
            .iter()
            .position(|e| e.timestamp <= event.timestamp)
            .unwrap_or(log.events.len());
        log.ids.insert(event.id.clone());
        log.events.insert(pos, event);

        while log.events.len() > self.per_session_cap {
            if let Some(old) = log.events.pop_back() {
                log.ids.remove(&old.id);
            }
        }
        true
    }

    /// Events for a session, newest first.
    pub fn events_for_session(&self, session_id: &str) -> impl Iterator<Item = &AgentEvent> {
        self.sessions
            .get(session_id)
            .into_iter()
            .flat_map(|log| log.events.iter())
    }

    /// Every stored event across sessions, in no particular order.
    pub fn all_events(&self) -> impl Iterator<Item = &AgentEvent> {
        self.sessions.values().flat_map(|log| log.events.iter())
    }

    pub fn latest(&self, session_id: &str) -> Option<&AgentEvent> {
        self.latest.get(session_id)
    }

    /// Latest event of every session that has reported one.
    pub fn latest_by_session(&self) -> impl Iterator<Item = (&str, &AgentEvent)> {
        self.latest.iter().map(|(id, event)| (id.as_str(), event))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn clear_session(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
        self.latest.remove(session_id);
    }

    pub fn clear_all(&mut self) {
        self.sessions.clear();
        self.latest.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentEventType;
    use chrono::{Duration, TimeZone, Utc};

    fn event(id: &str, session: &str, secs: i64, event_type: AgentEventType) -> AgentEvent {
        AgentEvent {
            id: id.to_string(),
            event_type,
            session_id: session.to_string(),
            agent_id: None,
            tool_name: Some("Bash".to_string()),
            tool_input: None,
            tool_output: None,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs),
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = AgentEventStore::new(100);
        assert!(store.add(event("e1", "s1", 1, AgentEventType::PostToolUse)));
        assert!(!store.add(event("e1", "s1", 1, AgentEventType::PostToolUse)));
        assert_eq!(store.events_for_session("s1").count(), 1);
    }

    #[test]
    fn test_sessions_capped_independently() {
        let mut store = AgentEventStore::new(3);
        for i in 0..5 {
            store.add(event(&format!("a{}", i), "s1", i, AgentEventType::PostToolUse));
        }
        store.add(event("b0", "s2", 0, AgentEventType::PostToolUse));

        let s1: Vec<_> = store.events_for_session("s1").map(|e| e.id.as_str()).collect();
        assert_eq!(s1, vec!["a4", "a3", "a2"]);
        assert_eq!(store.events_for_session("s2").count(), 1);
        assert_eq!(store.session_count(), 2);
    }

    #[test]
    fn test_latest_tracks_newest_event() {
        let mut store = AgentEventStore::new(10);
        store.add(event("new", "s1", 50, AgentEventType::Stop));
        store.add(event("old", "s1", 10, AgentEventType::PostToolUse));

        assert_eq!(store.latest("s1").map(|e| e.id.as_str()), Some("new"));
        let ids: Vec<_> = store.events_for_session("s1").map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_clear_session() {
        let mut store = AgentEventStore::new(10);
        store.add(event("e1", "s1", 1, AgentEventType::PostToolUse));
        store.add(event("e2", "s2", 1, AgentEventType::PostToolUse));
        store.clear_session("s1");
        assert!(store.latest("s1").is_none());
        assert_eq!(store.latest_by_session().count(), 1);
        store.clear_all();
        assert_eq!(store.all_events().count(), 0);
    }
}
